//! The shared JSON codec used for request bodies, response decoding, and deep-cloning objects.
//!
//! Null-valued fields are omitted on encode because every Kubernetes type in `k8s_openapi`
//! derives its `Serialize` impl with `skip_serializing_if` on optional fields; this module simply
//! gives the rest of the crate one place to call so that choice isn't duplicated at each call
//! site, and so that `Clone`-via-codec (S3's "deeply cloneable" requirement for a `Request` whose
//! body is an arbitrary object) has exactly one code path to get right.

use serde::{de::DeserializeOwned, Serialize};

/// Encode a value to its JSON wire representation.
pub fn encode<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(value)
}

/// Encode a value to an in-memory JSON tree, deferring wire serialization.
///
/// Used by the request builder to capture an arbitrary body at call time while still rendering
/// its bytes (null-omitted, enums in string form) lazily at execution time via [`encode`].
pub fn encode_value<T: Serialize>(value: &T) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(value)
}

/// Decode a JSON wire representation into a value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<T> {
    serde_json::from_slice(bytes)
}

/// Deep-clone any JSON-representable value by round-tripping it through the codec.
///
/// Used by the request builder's `clone()` to copy an arbitrary boxed request body without
/// requiring it to implement `Clone` itself -- only `Serialize + DeserializeOwned`.
pub fn clone_via_codec<T: Serialize + DeserializeOwned>(value: &T) -> serde_json::Result<T> {
    decode(&encode(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Example {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        optional: Option<String>,
    }

    #[test]
    fn omits_null_fields_on_encode() {
        let value = Example {
            name: "foo".into(),
            optional: None,
        };
        let bytes = encode(&value).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("optional"));
    }

    #[test]
    fn encode_value_omits_null_fields_too() {
        let value = Example {
            name: "foo".into(),
            optional: None,
        };
        let v = encode_value(&value).unwrap();
        assert!(v.as_object().unwrap().get("optional").is_none());
    }

    #[test]
    fn clone_via_codec_round_trips() {
        let value = Example {
            name: "foo".into(),
            optional: Some("bar".into()),
        };
        let cloned = clone_via_codec(&value).unwrap();
        assert_eq!(value, cloned);
    }
}
