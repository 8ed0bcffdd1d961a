//! Fixed values of the Metrika tag protocol.

use serde_json::{json, Value};

/// Plugin name reported to the host dispatcher.
pub const PLUGIN_NAME: &str = "yandexMetrika";

/// Conventional name of the global command channel installed on the page.
pub const GLOBAL_CHANNEL_NAME: &str = "ym";

/// Remote location of the Metrika tag script.
pub const TAG_SCRIPT_URL: &str = "https://mc.yandex.ru/metrika/tag.js";

/// Key under which the user id is mirrored into `userParams` objects.
pub const USER_ID_PARAM: &str = "UserID";

/// Trait keys accepted by the `firstPartyParams` command. Anything else is
/// dropped from the projection.
pub const FIRST_PARTY_PARAM_KEYS: [&str; 5] = [
    "email",
    "phone_number",
    "first_name",
    "last_name",
    "yandex_cid",
];

/// Feature flags sent with the `init` command. All four are always on.
pub(crate) fn init_options() -> Value {
    json!({
        "clickmap": true,
        "trackLinks": true,
        "accurateTrackBounce": true,
        "webvisor": true,
    })
}
