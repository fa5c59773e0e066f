//! Process-wide feature flags
//!
//! The flag set is fixed at build time; there is no mutation API.

/// Features enabled in this build
const ENABLED_FEATURES: &[&str] = &["test"];

/// Whether `feature_name` is enabled (exact, case-sensitive match)
#[must_use]
pub fn is_feature_enabled(feature_name: &str) -> bool {
    ENABLED_FEATURES.contains(&feature_name)
}

/// All enabled features
#[must_use]
pub fn enabled_features() -> &'static [&'static str] {
    ENABLED_FEATURES
}
