use serde::{Deserialize, Serialize};

use crate::Format;

/// The [JSON](https://www.json.org/json-en.html) data format, written pretty-printed.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Json;

impl Format for Json {
    type EncodingError = serde_json::Error;
    type DecodingError = serde_json::Error;

    fn extension(&self) -> String {
        "json".to_string()
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, Self::EncodingError> {
        serde_json::to_vec_pretty(value)
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T, Self::DecodingError> {
        serde_json::from_slice(bytes)
    }
}
