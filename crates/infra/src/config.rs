//! Engine configuration, read from the environment.

use serde::{Deserialize, Serialize};

pub const ALLOW_REVERIFY_VAR: &str = "PLANTFLOW_ALLOW_REVERIFY";
pub const QUANTITY_SCALE_VAR: &str = "PLANTFLOW_QUANTITY_SCALE";
pub const STORE_LOCATION_VAR: &str = "PLANTFLOW_STORE_LOCATION";
pub const PRODUCTION_LOCATION_VAR: &str = "PLANTFLOW_PRODUCTION_LOCATION";

const MAX_SCALE: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether a batch's remaining quantity may be verified more than once.
    pub allow_reverify: bool,
    /// Decimal places kept on converted and derived quantities.
    pub quantity_scale: u32,
    /// Location code of the main store.
    pub store_location: String,
    /// Location code of the production floor.
    pub production_location: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_reverify: false,
            quantity_scale: 3,
            store_location: "STORE".to_string(),
            production_location: "PRODUCTION".to_string(),
        }
    }
}

impl EngineConfig {
    /// Read configuration from `PLANTFLOW_*` variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let allow_reverify = match lookup(ALLOW_REVERIFY_VAR) {
            None => defaults.allow_reverify,
            Some(raw) => raw.trim().parse::<bool>().unwrap_or_else(|_| {
                tracing::warn!(var = ALLOW_REVERIFY_VAR, value = %raw, "not a bool; using default");
                defaults.allow_reverify
            }),
        };

        let quantity_scale = match lookup(QUANTITY_SCALE_VAR) {
            None => defaults.quantity_scale,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(scale) if scale <= MAX_SCALE => scale,
                _ => {
                    tracing::warn!(var = QUANTITY_SCALE_VAR, value = %raw, "invalid scale; using default");
                    defaults.quantity_scale
                }
            },
        };

        let store_location = lookup(STORE_LOCATION_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.store_location);
        let production_location = lookup(PRODUCTION_LOCATION_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.production_location);

        Self {
            allow_reverify,
            quantity_scale,
            store_location,
            production_location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(EngineConfig::from_lookup(lookup(&[])), EngineConfig::default());
    }

    #[test]
    fn reads_all_variables() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            (ALLOW_REVERIFY_VAR, "true"),
            (QUANTITY_SCALE_VAR, "4"),
            (STORE_LOCATION_VAR, "MAIN"),
            (PRODUCTION_LOCATION_VAR, "FLOOR-1"),
        ]));
        assert!(cfg.allow_reverify);
        assert_eq!(cfg.quantity_scale, 4);
        assert_eq!(cfg.store_location, "MAIN");
        assert_eq!(cfg.production_location, "FLOOR-1");
    }

    #[test]
    fn malformed_values_fall_back() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            (ALLOW_REVERIFY_VAR, "yes please"),
            (QUANTITY_SCALE_VAR, "99"),
        ]));
        assert!(!cfg.allow_reverify);
        assert_eq!(cfg.quantity_scale, 3);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"allow_reverify": true}"#).unwrap();
        assert!(cfg.allow_reverify);
        assert_eq!(cfg.quantity_scale, 3);
    }
}
