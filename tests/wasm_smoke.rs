#![cfg(all(target_arch = "wasm32", feature = "wasm-web"))]

use analytics_plugin_yandex_metrika::{yandex_metrika, EventPayload, PluginOptions};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn initialize_installs_the_global_stub() {
    let plugin = yandex_metrika(PluginOptions::new(12345));
    plugin.initialize().expect("initialize");

    // The stub occupies window.ym, so the plugin reports loaded and a
    // second initialize is a no-op.
    assert!(plugin.loaded());
    plugin.initialize().expect("repeat initialize");

    let window = web_sys::window().expect("window");
    let document = window.document().expect("document");
    let tags = document
        .query_selector_all("script[src=\"https://mc.yandex.ru/metrika/tag.js\"]")
        .expect("query");
    assert_eq!(tags.length(), 1);

    // Dispatching against the stub must not throw.
    plugin.track(&EventPayload::new("smoke").with_property("ok", true));
}
