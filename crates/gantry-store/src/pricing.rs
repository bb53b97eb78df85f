//! Price table and session cost rollup.
//!
//! Rates are USD per million tokens, with separate cache-read and
//! cache-write rates. Unknown models contribute nothing to the rollup (no
//! implicit fallback pricing).

use gantry_core::models::strip_cri_prefix;
use tracing::warn;

use crate::errors::StoreError;
use crate::ledger::{LedgerEntry, TokenLedger};
use crate::sessions::{SessionPatch, SessionStore};

/// Pricing for one model family, per million tokens.
#[derive(Clone, Copy, Debug)]
pub struct ModelPricing {
    /// Uncached input rate.
    pub input_per_mtok: f64,
    /// Output rate.
    pub output_per_mtok: f64,
    /// Cache-read rate.
    pub cache_read_per_mtok: f64,
    /// Cache-write rate.
    pub cache_write_per_mtok: f64,
}

const SONNET: ModelPricing = ModelPricing {
    input_per_mtok: 3.0,
    output_per_mtok: 15.0,
    cache_read_per_mtok: 0.3,
    cache_write_per_mtok: 3.75,
};

const OPUS_4_5: ModelPricing = ModelPricing {
    input_per_mtok: 5.0,
    output_per_mtok: 25.0,
    cache_read_per_mtok: 0.5,
    cache_write_per_mtok: 6.25,
};

const OPUS_LEGACY: ModelPricing = ModelPricing {
    input_per_mtok: 15.0,
    output_per_mtok: 75.0,
    cache_read_per_mtok: 1.5,
    cache_write_per_mtok: 18.75,
};

const HAIKU_4_5: ModelPricing = ModelPricing {
    input_per_mtok: 1.0,
    output_per_mtok: 5.0,
    cache_read_per_mtok: 0.1,
    cache_write_per_mtok: 1.25,
};

const HAIKU_3_5: ModelPricing = ModelPricing {
    input_per_mtok: 0.8,
    output_per_mtok: 4.0,
    cache_read_per_mtok: 0.08,
    cache_write_per_mtok: 1.0,
};

/// Look up pricing for a model id by family substring. Returns `None` for
/// unknown models.
#[must_use]
pub fn pricing_for(model_id: &str) -> Option<&'static ModelPricing> {
    let lower = strip_cri_prefix(model_id).to_lowercase();
    if lower.contains("opus-4-5") {
        return Some(&OPUS_4_5);
    }
    if lower.contains("opus") {
        return Some(&OPUS_LEGACY);
    }
    if lower.contains("sonnet") {
        return Some(&SONNET);
    }
    if lower.contains("haiku-4-5") {
        return Some(&HAIKU_4_5);
    }
    if lower.contains("haiku") {
        return Some(&HAIKU_3_5);
    }
    None
}

/// Cost of one ledger entry in USD, or `None` for unknown models.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn entry_cost(entry: &LedgerEntry) -> Option<f64> {
    let pricing = pricing_for(&entry.model_id)?;
    let input = (entry.input_tokens as f64 / 1_000_000.0) * pricing.input_per_mtok;
    let output = (entry.output_tokens as f64 / 1_000_000.0) * pricing.output_per_mtok;
    let cache_read =
        (entry.cache_read_input_tokens as f64 / 1_000_000.0) * pricing.cache_read_per_mtok;
    let cache_write =
        (entry.cache_write_input_tokens as f64 / 1_000_000.0) * pricing.cache_write_per_mtok;
    Some(input + output + cache_read + cache_write)
}

/// Recompute a session's cost from its ledger and write it back.
///
/// Runs after every LLM call; callers treat failures as non-fatal.
pub async fn rollup_session_cost(
    ledger: &TokenLedger,
    sessions: &SessionStore,
    worker_id: &str,
) -> Result<f64, StoreError> {
    let entries = ledger.list(worker_id).await?;
    let mut total = 0.0;
    for entry in &entries {
        match entry_cost(entry) {
            Some(cost) => total += cost,
            None => warn!(model = %entry.model_id, "no pricing for model, skipping in rollup"),
        }
    }
    sessions
        .update(
            worker_id,
            SessionPatch {
                cost: Some(total),
                ..SessionPatch::default()
            },
        )
        .await?;
    Ok(total)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
