//! Payload types delivered by the host dispatcher with every lifecycle call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::FIRST_PARTY_PARAM_KEYS;

/// A property or trait value: string, number or boolean, matching what the
/// host framework accepts for event properties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Text(text) => Value::String(text.clone()),
            PropertyValue::Integer(number) => Value::from(*number),
            PropertyValue::Float(number) => Value::from(*number),
            PropertyValue::Bool(flag) => Value::Bool(*flag),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Integer(value as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// Property map shared by event properties and identify traits.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Per-call payload. Constructed by the caller, discarded after the call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventPayload {
    /// Generic event name as known to the host framework.
    pub event: String,
    /// Page name. Carried for host parity; the `hit` command uses the URL.
    pub name: Option<String>,
    pub user_id: Option<String>,
    pub properties: Properties,
    pub traits: Properties,
}

impl EventPayload {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_trait(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.traits.insert(key.into(), value.into());
        self
    }
}

pub(crate) fn properties_to_json(properties: &Properties) -> Value {
    let mut object = Map::new();
    for (key, value) in properties {
        object.insert(key.clone(), value.to_json());
    }
    Value::Object(object)
}

/// Projects `traits` onto the keys accepted by `firstPartyParams`. Only the
/// keys present in `traits` appear; the result may be an empty object.
pub(crate) fn first_party_params(traits: &Properties) -> Value {
    let mut object = Map::new();
    for key in FIRST_PARTY_PARAM_KEYS {
        if let Some(value) = traits.get(key) {
            object.insert(key.to_owned(), value.to_json());
        }
    }
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn property_values_serialize_untagged() {
        let payload = EventPayload::new("purchase")
            .with_property("plan", "pro")
            .with_property("seats", 4)
            .with_property("trial", false);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json["properties"],
            json!({"plan": "pro", "seats": 4, "trial": false})
        );
    }

    #[test]
    fn payload_deserializes_from_host_shape() {
        let payload: EventPayload = serde_json::from_str(
            r#"{"event":"signup","userId":"u1","traits":{"email":"a@b.com","beta":true}}"#,
        )
        .unwrap();
        assert_eq!(payload.event, "signup");
        assert_eq!(payload.user_id.as_deref(), Some("u1"));
        assert_eq!(
            payload.traits.get("email"),
            Some(&PropertyValue::Text("a@b.com".into()))
        );
        assert_eq!(payload.traits.get("beta"), Some(&PropertyValue::Bool(true)));
    }

    #[test]
    fn first_party_projection_keeps_recognized_keys_only() {
        let payload = EventPayload::new("identify")
            .with_trait("email", "a@b.com")
            .with_trait("unknown_field", "x")
            .with_trait("phone_number", "+100");
        let projected = first_party_params(&payload.traits);
        assert_eq!(
            projected,
            json!({"email": "a@b.com", "phone_number": "+100"})
        );
    }

    #[test]
    fn first_party_projection_of_foreign_traits_is_empty_object() {
        let payload = EventPayload::new("identify").with_trait("company", "acme");
        assert_eq!(first_party_params(&payload.traits), json!({}));
    }
}
