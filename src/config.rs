//! Plugin options and their resolution into a finalized configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{invalid_counter_id, missing_counter_id, MetrikaResult};

/// Caller-supplied options. Field names follow the JS plugin's camelCase
/// config surface, so a JSON block written for the original plugin
/// deserializes unchanged (`devWarnings` also accepts the short `dev` key).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginOptions {
    /// Vendor-assigned numeric counter identifier. Required; its absence is
    /// only surfaced when `initialize` runs.
    pub counter_id: Option<u64>,
    pub enabled: Option<bool>,
    #[serde(alias = "dev")]
    pub dev_warnings: Option<bool>,
    /// Generic event name -> Metrika goal identifier.
    pub event_name_map: BTreeMap<String, String>,
}

impl PluginOptions {
    pub fn new(counter_id: u64) -> Self {
        Self {
            counter_id: Some(counter_id),
            ..Default::default()
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = Some(false);
        self
    }

    pub fn with_dev_warnings(mut self) -> Self {
        self.dev_warnings = Some(true);
        self
    }

    pub fn map_event(mut self, event: impl Into<String>, goal: impl Into<String>) -> Self {
        self.event_name_map.insert(event.into(), goal.into());
        self
    }

    /// Overlays the supplied fields onto the defaults (`enabled: true`).
    /// Never fails; counter validation happens at initialize time.
    pub fn resolve(self) -> PluginConfig {
        PluginConfig {
            counter_id: self.counter_id,
            enabled: self.enabled.unwrap_or(true),
            dev_warnings: self.dev_warnings.unwrap_or(false),
            event_name_map: self.event_name_map,
        }
    }
}

/// Finalized configuration. Immutable for the lifetime of the plugin.
#[derive(Clone, Debug, PartialEq)]
pub struct PluginConfig {
    pub counter_id: Option<u64>,
    pub enabled: bool,
    pub dev_warnings: bool,
    pub event_name_map: BTreeMap<String, String>,
}

impl PluginConfig {
    pub(crate) fn require_counter_id(&self) -> MetrikaResult<u64> {
        match self.counter_id {
            None => Err(missing_counter_id("counterId is required")),
            Some(0) => Err(invalid_counter_id(
                "counterId must be a positive Metrika counter number",
            )),
            Some(counter_id) => Ok(counter_id),
        }
    }

    /// Goal identifier mapped to `event`, if a mapping was configured.
    pub fn goal_for(&self, event: &str) -> Option<&str> {
        self.event_name_map.get(event).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_overlays_defaults() {
        let config = PluginOptions::new(42).resolve();
        assert_eq!(config.counter_id, Some(42));
        assert!(config.enabled);
        assert!(!config.dev_warnings);
        assert!(config.event_name_map.is_empty());

        let config = PluginOptions::new(42).disabled().with_dev_warnings().resolve();
        assert!(!config.enabled);
        assert!(config.dev_warnings);
    }

    #[test]
    fn options_deserialize_from_js_config_shape() {
        let options: PluginOptions = serde_json::from_str(
            r#"{"counterId": 12345, "dev": true, "eventNameMap": {"purchase": "goal42"}}"#,
        )
        .unwrap();
        let config = options.resolve();
        assert_eq!(config.counter_id, Some(12345));
        assert!(config.dev_warnings);
        assert_eq!(config.goal_for("purchase"), Some("goal42"));
        assert_eq!(config.goal_for("signup"), None);
    }

    #[test]
    fn missing_counter_is_a_configuration_error() {
        let config = PluginOptions::default().resolve();
        let err = config.require_counter_id().unwrap_err();
        assert_eq!(err.code_str(), "yandex-metrika/missing-counter-id");
    }

    #[test]
    fn zero_counter_is_rejected() {
        let config = PluginOptions::new(0).resolve();
        let err = config.require_counter_id().unwrap_err();
        assert_eq!(err.code_str(), "yandex-metrika/invalid-counter-id");
    }
}
