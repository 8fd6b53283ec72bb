//! Runtime tuning knobs.

/// Garbage collector settings.
#[derive(Clone, Debug, PartialEq)]
pub struct GcConfig {
    /// Allocations between collections right after startup.
    pub collection_threshold: usize,
    /// After a collection the next threshold is `live * growth_factor`,
    /// never below `collection_threshold`.
    pub growth_factor: f64,
    /// When false, collection only happens on explicit request.
    pub enabled: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            collection_threshold: 4096,
            growth_factor: 2.0,
            enabled: true,
        }
    }
}

impl GcConfig {
    /// Defaults overridden by `MU_GC_THRESHOLD` and `MU_GC_DISABLE`.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("MU_GC_THRESHOLD") {
            match raw.trim().parse::<usize>() {
                Ok(threshold) if threshold > 0 => config.collection_threshold = threshold,
                _ => tracing::warn!(value = %raw, "ignoring invalid MU_GC_THRESHOLD"),
            }
        }
        if let Ok(raw) = std::env::var("MU_GC_DISABLE") {
            config.enabled = matches!(raw.trim(), "" | "0" | "false");
        }
        config
    }

    /// Next allocation threshold given the number of objects that
    /// survived a collection.
    pub(crate) fn next_threshold(&self, live: usize) -> usize {
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss,
            reason = "threshold is a heuristic; saturation on huge heaps is fine"
        )]
        let scaled = (live as f64 * self.growth_factor.max(1.0)) as usize;
        scaled.max(self.collection_threshold)
    }
}

/// Limits applied to every thread.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EvalLimits {
    /// Deepest allowed function call nesting.
    pub max_call_depth: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            max_call_depth: 10_000,
        }
    }
}
