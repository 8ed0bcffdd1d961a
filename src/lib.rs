//! Yandex Metrika plugin for an `analytics`-style dispatch framework,
//! ported to Rust.
//!
//! The plugin injects the Metrika tag script into the page, installs the
//! queueing `ym` stub until the remote script takes the slot over, and
//! translates the generic `track`/`page`/`identify` vocabulary into Metrika
//! commands (`reachGoal`, `hit`, `setUserID`, `userParams`,
//! `firstPartyParams`). On non-browser targets the whole lifecycle is a
//! safe no-op; real DOM access lives behind the `wasm-web` feature.
//!
//! ```
//! use std::sync::Arc;
//! use analytics_plugin_yandex_metrika::{
//!     EventPayload, PluginOptions, SimulatedBrowser, YandexMetrika,
//! };
//!
//! let browser = SimulatedBrowser::new();
//! let plugin = YandexMetrika::with_driver(
//!     PluginOptions::new(12345).map_event("purchase", "goal42"),
//!     Arc::new(browser.clone()),
//! );
//!
//! plugin.initialize()?;
//! plugin.track(&EventPayload::new("purchase").with_property("total", 99));
//! assert!(plugin.loaded());
//! assert_eq!(browser.commands().len(), 2); // init + reachGoal
//! # Ok::<(), analytics_plugin_yandex_metrika::MetrikaError>(())
//! ```

mod api;
pub mod channel;
pub mod config;
pub mod constants;
pub mod error;
pub mod loader;
pub mod payload;
pub mod plugin;

pub use api::{yandex_metrika, YandexMetrika};
pub use channel::{ChannelPhase, Command, CommandChannel, CommandKind, CommandSink};
pub use config::{PluginConfig, PluginOptions};
pub use error::{MetrikaError, MetrikaErrorCode, MetrikaResult};
pub use loader::{HeadlessDriver, MetrikaDriver, SimulatedBrowser};
pub use payload::{EventPayload, Properties, PropertyValue};
pub use plugin::AnalyticsPlugin;
