//! `#[serde(deserialize_with = "polyschema_runtime::nullable::deserialize")]`
//! for required fields that may hold `null`. Plain `Option` fields accept a
//! missing member; these do not.

use serde::{Deserialize, Deserializer};

pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Reading {
        #[serde(deserialize_with = "super::deserialize")]
        maybe: Option<f64>,
    }

    #[test]
    fn null_is_a_value_but_absence_is_an_error() {
        let reading: Reading = serde_json::from_value(json!({ "maybe": null })).unwrap();
        assert_eq!(reading, Reading { maybe: None });
        let reading: Reading = serde_json::from_value(json!({ "maybe": 2.5 })).unwrap();
        assert_eq!(reading, Reading { maybe: Some(2.5) });
        let err = serde_json::from_value::<Reading>(json!({})).unwrap_err();
        assert_eq!(err.to_string(), "missing field `maybe`");
    }
}
