use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::channel::{Command, CommandKind};
use crate::config::{PluginConfig, PluginOptions};
use crate::constants::{init_options, PLUGIN_NAME, TAG_SCRIPT_URL, USER_ID_PARAM};
use crate::error::MetrikaResult;
use crate::loader::{self, MetrikaDriver};
use crate::payload::{first_party_params, properties_to_json, EventPayload, PropertyValue};
use crate::plugin::AnalyticsPlugin;

/// The Yandex Metrika plugin instance.
pub struct YandexMetrika {
    config: PluginConfig,
    driver: Arc<dyn MetrikaDriver>,
}

impl fmt::Debug for YandexMetrika {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YandexMetrika")
            .field("counter_id", &self.config.counter_id)
            .field("enabled", &self.config.enabled)
            .finish()
    }
}

/// Plugin factory. Resolves the options over the defaults and binds the
/// target's default browser driver.
pub fn yandex_metrika(options: PluginOptions) -> YandexMetrika {
    YandexMetrika {
        config: options.resolve(),
        driver: loader::default_driver(),
    }
}

impl YandexMetrika {
    /// Builds the plugin against an explicit driver. This is how tests (and
    /// hosts testing their own wiring) run the full lifecycle without a DOM.
    pub fn with_driver(options: PluginOptions, driver: Arc<dyn MetrikaDriver>) -> Self {
        Self {
            config: options.resolve(),
            driver,
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// The shared dispatch guard: enabled, and something callable occupies
    /// the global slot.
    fn ym_available(&self) -> bool {
        self.config.enabled && self.driver.has_callable()
    }

    /// Bootstraps the tag: installs the queueing stub, inserts the script
    /// tag, and issues `init` — synchronously, without waiting for the
    /// network fetch. A no-op when disabled, outside a browser, or when the
    /// slot is already callable (so repeated calls never insert a second
    /// script tag or reset vendor state).
    ///
    /// # Errors
    ///
    /// Fails when the counter id is missing or zero; that is a caller bug
    /// and is meant to reach the host dispatcher.
    pub fn initialize(&self) -> MetrikaResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        if !self.driver.is_browser_context() {
            return Ok(());
        }
        if self.driver.has_callable() {
            return Ok(());
        }
        let counter_id = self.config.require_counter_id()?;

        self.driver.ensure_stub();
        self.driver.inject_tag_script(TAG_SCRIPT_URL);
        self.driver.invoke(Command::new(
            counter_id,
            CommandKind::Init,
            vec![init_options()],
        ));
        Ok(())
    }

    /// True once the global slot holds a callable. A still-unresolved stub
    /// is indistinguishable from the live tag — callability is all this
    /// plugin can observe. Always false outside a browser.
    pub fn loaded(&self) -> bool {
        self.ym_available()
    }

    /// Forwards an event as a `reachGoal` command. The goal id comes from
    /// the configured event-name map, falling back to the event name
    /// verbatim.
    pub fn track(&self, payload: &EventPayload) {
        if !self.ym_available() {
            return;
        }
        let Some(counter_id) = self.config.counter_id else {
            return;
        };
        let goal = match self.config.goal_for(&payload.event) {
            Some(goal) => goal.to_owned(),
            None => {
                if self.config.dev_warnings {
                    log::warn!(
                        "yandexMetrika: no goal mapping for event {:?}, sending the event name as the goal id",
                        payload.event
                    );
                }
                payload.event.clone()
            }
        };
        self.driver.invoke(Command::new(
            counter_id,
            CommandKind::ReachGoal,
            vec![Value::String(goal), properties_to_json(&payload.properties)],
        ));
    }

    /// Registers a page view as a `hit` command, preferring an explicit
    /// `url` property over the current page location.
    pub fn page(&self, payload: &EventPayload) {
        if !self.ym_available() {
            return;
        }
        let Some(counter_id) = self.config.counter_id else {
            return;
        };
        let url = payload
            .properties
            .get("url")
            .and_then(PropertyValue::as_text)
            .map(str::to_owned)
            .or_else(|| self.driver.current_url());
        let Some(url) = url else {
            return;
        };
        self.driver.invoke(Command::new(
            counter_id,
            CommandKind::Hit,
            vec![Value::String(url), properties_to_json(&payload.properties)],
        ));
    }

    /// Sets the user id (`setUserID`) and, when traits are present, mirrors
    /// them into `userParams` (with the id under `UserID`) followed by the
    /// `firstPartyParams` projection. The projection call fires whenever
    /// traits are non-empty, even when it projects to an empty object.
    pub fn identify(&self, payload: &EventPayload) {
        if !self.ym_available() {
            return;
        }
        let Some(counter_id) = self.config.counter_id else {
            return;
        };

        let user_id = match &payload.user_id {
            Some(user_id) => Value::String(user_id.clone()),
            None => Value::Null,
        };
        self.driver.invoke(Command::new(
            counter_id,
            CommandKind::SetUserId,
            vec![user_id],
        ));

        if payload.traits.is_empty() {
            return;
        }

        let mut user_params = Map::new();
        for (key, value) in &payload.traits {
            user_params.insert(key.clone(), value.to_json());
        }
        if let Some(user_id) = &payload.user_id {
            user_params.insert(USER_ID_PARAM.to_owned(), Value::String(user_id.clone()));
        }
        self.driver.invoke(Command::new(
            counter_id,
            CommandKind::UserParams,
            vec![Value::Object(user_params)],
        ));
        self.driver.invoke(Command::new(
            counter_id,
            CommandKind::FirstPartyParams,
            vec![first_party_params(&payload.traits)],
        ));
    }
}

impl AnalyticsPlugin for YandexMetrika {
    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn initialize(&self) -> MetrikaResult<()> {
        YandexMetrika::initialize(self)
    }

    fn loaded(&self) -> bool {
        YandexMetrika::loaded(self)
    }

    fn track(&self, payload: &EventPayload) {
        YandexMetrika::track(self, payload)
    }

    fn page(&self, payload: &EventPayload) {
        YandexMetrika::page(self, payload)
    }

    fn identify(&self, payload: &EventPayload) {
        YandexMetrika::identify(self, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelPhase;
    use crate::loader::{HeadlessDriver, SimulatedBrowser};
    use serde_json::json;

    fn plugin_on(browser: &SimulatedBrowser, options: PluginOptions) -> YandexMetrika {
        YandexMetrika::with_driver(options, Arc::new(browser.clone()))
    }

    #[test]
    fn initialize_requires_a_counter_id() {
        let browser = SimulatedBrowser::new();
        let plugin = plugin_on(&browser, PluginOptions::default());
        let err = plugin.initialize().unwrap_err();
        assert_eq!(err.code_str(), "yandex-metrika/missing-counter-id");
        assert_eq!(browser.script_insertions(), 0);
        assert_eq!(browser.phase(), ChannelPhase::Vacant);
    }

    #[test]
    fn initialize_installs_stub_and_queues_init() {
        let browser = SimulatedBrowser::new();
        let plugin = plugin_on(&browser, PluginOptions::new(12345));
        plugin.initialize().unwrap();

        assert_eq!(browser.phase(), ChannelPhase::Stub);
        assert!(browser.stub_marker_ms().is_some());
        assert_eq!(
            browser.injected_urls(),
            ["https://mc.yandex.ru/metrika/tag.js"]
        );

        let commands = browser.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].counter_id, 12345);
        assert_eq!(commands[0].kind, CommandKind::Init);
        assert_eq!(
            commands[0].args[0],
            json!({
                "clickmap": true,
                "trackLinks": true,
                "accurateTrackBounce": true,
                "webvisor": true,
            })
        );
    }

    #[test]
    fn initialize_is_idempotent_across_repeated_calls() {
        let browser = SimulatedBrowser::new();
        let plugin = plugin_on(&browser, PluginOptions::new(1));
        for _ in 0..5 {
            plugin.initialize().unwrap();
        }
        assert_eq!(browser.script_insertions(), 1);
        assert_eq!(browser.commands().len(), 1);

        // Same when the vendor implementation is already live.
        browser.go_live();
        plugin.initialize().unwrap();
        assert_eq!(browser.script_insertions(), 1);
    }

    #[test]
    fn initialize_skips_disabled_configs_without_validation() {
        let browser = SimulatedBrowser::new();
        let plugin = plugin_on(&browser, PluginOptions::default().disabled());
        plugin.initialize().unwrap();
        assert_eq!(browser.phase(), ChannelPhase::Vacant);
    }

    #[test]
    fn lifecycle_is_a_safe_no_op_without_a_browser() {
        let plugin = YandexMetrika::with_driver(PluginOptions::new(7), Arc::new(HeadlessDriver));
        plugin.initialize().unwrap();
        assert!(!plugin.loaded());
        plugin.track(&EventPayload::new("purchase"));
        plugin.page(&EventPayload::default());
        plugin.identify(&EventPayload::new("identify").with_user_id("u1"));
    }

    #[test]
    fn loaded_reflects_slot_callability() {
        let browser = SimulatedBrowser::new();
        let plugin = plugin_on(&browser, PluginOptions::new(7));
        assert!(!plugin.loaded());
        plugin.initialize().unwrap();
        // A queueing stub already counts as callable; the real takeover is
        // not observable beyond that.
        assert!(plugin.loaded());
        browser.go_live();
        assert!(plugin.loaded());
        browser.clear_channel();
        assert!(!plugin.loaded());
    }

    #[test]
    fn disabled_plugin_never_touches_the_channel() {
        let browser = SimulatedBrowser::new();
        browser.ensure_stub();
        let plugin = plugin_on(&browser, PluginOptions::new(7).disabled());
        assert!(!plugin.loaded());
        plugin.track(&EventPayload::new("purchase").with_property("total", 10));
        plugin.page(&EventPayload::default());
        plugin.identify(&EventPayload::new("identify").with_user_id("u1"));
        assert!(browser.commands().is_empty());
    }

    #[test]
    fn track_maps_events_to_goals_and_falls_back_verbatim() {
        let browser = SimulatedBrowser::new();
        browser.ensure_stub();
        let plugin = plugin_on(
            &browser,
            PluginOptions::new(42).map_event("purchase", "goal42"),
        );

        plugin.track(&EventPayload::new("purchase").with_property("total", 99));
        plugin.track(&EventPayload::new("signup"));

        let commands = browser.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].kind, CommandKind::ReachGoal);
        assert_eq!(commands[0].args, vec![json!("goal42"), json!({"total": 99})]);
        assert_eq!(commands[1].args, vec![json!("signup"), json!({})]);
    }

    #[test]
    fn page_prefers_the_url_property_over_the_location() {
        let browser = SimulatedBrowser::with_location("https://shop.test/landing");
        browser.ensure_stub();
        let plugin = plugin_on(&browser, PluginOptions::new(9));

        plugin.page(&EventPayload::default().with_property("url", "https://x/y"));
        plugin.page(&EventPayload::default());

        let commands = browser.commands();
        assert_eq!(commands[0].kind, CommandKind::Hit);
        assert_eq!(commands[0].args[0], json!("https://x/y"));
        assert_eq!(commands[1].args[0], json!("https://shop.test/landing"));
        assert_eq!(commands[1].args[1], json!({}));
    }

    #[test]
    fn identify_with_traits_sends_all_three_commands() {
        let browser = SimulatedBrowser::new();
        browser.ensure_stub();
        let plugin = plugin_on(&browser, PluginOptions::new(3));

        plugin.identify(
            &EventPayload::new("identify")
                .with_user_id("u1")
                .with_trait("email", "a@b.com")
                .with_trait("unknown_field", "x"),
        );

        let commands = browser.commands();
        let kinds: Vec<_> = commands.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            [
                CommandKind::SetUserId,
                CommandKind::UserParams,
                CommandKind::FirstPartyParams,
            ]
        );
        assert_eq!(commands[0].args, vec![json!("u1")]);
        assert_eq!(
            commands[1].args,
            vec![json!({"email": "a@b.com", "unknown_field": "x", "UserID": "u1"})]
        );
        assert_eq!(commands[2].args, vec![json!({"email": "a@b.com"})]);
    }

    #[test]
    fn identify_without_traits_only_sets_the_user_id() {
        let browser = SimulatedBrowser::new();
        browser.ensure_stub();
        let plugin = plugin_on(&browser, PluginOptions::new(3));

        plugin.identify(&EventPayload::new("identify").with_user_id("u1"));

        let commands = browser.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].kind, CommandKind::SetUserId);
    }

    #[test]
    fn identify_fires_an_empty_projection_when_no_trait_is_recognized() {
        let browser = SimulatedBrowser::new();
        browser.ensure_stub();
        let plugin = plugin_on(&browser, PluginOptions::new(3));

        plugin.identify(&EventPayload::new("identify").with_trait("company", "acme"));

        let commands = browser.commands();
        assert_eq!(commands.len(), 3);
        // No user id: setUserID carries null and userParams has no UserID.
        assert_eq!(commands[0].args, vec![Value::Null]);
        assert_eq!(commands[1].args, vec![json!({"company": "acme"})]);
        assert_eq!(commands[2].args, vec![json!({})]);
    }

    #[test]
    fn commands_queued_before_the_takeover_replay_in_order() {
        let browser = SimulatedBrowser::new();
        let plugin = plugin_on(&browser, PluginOptions::new(8).map_event("purchase", "g1"));
        plugin.initialize().unwrap();
        plugin.page(&EventPayload::default());
        plugin.track(&EventPayload::new("purchase"));

        browser.go_live();
        plugin.track(&EventPayload::new("signup"));

        let kinds: Vec<_> = browser.dispatched().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            [
                CommandKind::Init,
                CommandKind::Hit,
                CommandKind::ReachGoal,
                CommandKind::ReachGoal,
            ]
        );
    }

    #[test]
    fn plugin_trait_object_exposes_the_lifecycle() {
        let browser = SimulatedBrowser::new();
        let plugin: Arc<dyn AnalyticsPlugin> =
            Arc::new(plugin_on(&browser, PluginOptions::new(21)));
        assert_eq!(plugin.name(), "yandexMetrika");
        plugin.initialize().unwrap();
        assert!(plugin.loaded());
        plugin.track(&EventPayload::new("purchase"));
        assert_eq!(browser.commands().len(), 2);
    }
}
