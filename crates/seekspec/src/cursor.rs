//! Opaque keyset cursors.
//!
//! A cursor records the sort-key values of one boundary record as a JSON
//! object keyed by canonical field path. The JSON text runs through the
//! codec's transform chain (compression, encryption, ...) and is finally
//! base64url-encoded without padding. Tokens carry no server-side state.

use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::clause::ClauseValue;
use crate::coerce::coerce;
use crate::error::{Result, SeekError};
use crate::ordering::SortSpec;
use crate::schema::{FieldDef, FieldKind};
use crate::traits::Seekable;
use crate::value::Value;

/// Upper bound on accepted token length.
const MAX_TOKEN_LEN: usize = 16 * 1024;

/// Sort-key values of a boundary record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor {
    values: BTreeMap<String, JsonValue>,
}

impl Cursor {
    /// Captures the value of every key in `sort` from `record`.
    pub fn capture(record: &dyn Seekable, sort: &SortSpec) -> Cursor {
        let values = sort
            .keys()
            .iter()
            .map(|key| {
                let value = key.meta.get_value(record);
                (key.path(), to_json(&value, key.meta.kind()))
            })
            .collect();
        Cursor { values }
    }

    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        self.values.get(path)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Typed boundary values in key order.
    ///
    /// The cursor must name exactly the keys of `sort`, and every value must
    /// coerce to its key's type (null always allowed).
    pub fn boundary(&self, sort: &SortSpec) -> Result<Vec<ClauseValue>> {
        let keys = sort.keys();
        if self.values.len() != keys.len() {
            return Err(reject(format!(
                "cursor has {} keys, sort has {}",
                self.values.len(),
                keys.len()
            )));
        }

        keys.iter()
            .map(|key| {
                let path = key.path();
                let raw = self
                    .values
                    .get(&path)
                    .ok_or_else(|| reject(format!("cursor does not cover sort key '{path}'")))?;
                let def = FieldDef {
                    nullable: true,
                    ..*key.meta.leaf()
                };
                coerce(raw, &def).map_err(|e| reject(format!("value for '{path}': {e}")))
            })
            .collect()
    }
}

fn to_json(value: &Value<'_>, kind: FieldKind) -> JsonValue {
    match value {
        Value::String(s) => JsonValue::String((*s).to_string()),
        Value::Number(n) => n.to_json(),
        Value::Timestamp(t) => JsonValue::String(t.to_rfc3339()),
        Value::Uuid(id) => JsonValue::String(id.to_string()),
        Value::Enum(d) => match kind {
            FieldKind::Enum(variants) => match variants.get(*d as usize) {
                Some(name) => JsonValue::String((*name).to_string()),
                None => JsonValue::from(*d),
            },
            _ => JsonValue::from(*d),
        },
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Object(_) | Value::List(_) | Value::None => JsonValue::Null,
    }
}

fn reject(reason: String) -> SeekError {
    warn!(reason = %reason, "rejected cursor");
    SeekError::MalformedCursor(reason)
}

/// One reversible text transformation applied to cursor payloads.
///
/// Implement this for compression or encryption; the codec base64url-encodes
/// the output of the last layer, so layers may emit any text.
pub trait CursorTransform: Send + Sync {
    fn encode(&self, text: &str) -> Result<String>;

    fn decode(&self, text: &str) -> Result<String>;
}

/// Encodes and decodes cursor tokens through a chain of transforms.
///
/// ```
/// use seekspec::{Cursor, CursorCodec};
///
/// let codec = CursorCodec::new();
/// let cursor: Cursor = serde_json::from_str(r#"{"id": 7}"#).unwrap();
/// let token = codec.encode(&cursor).unwrap();
/// assert_eq!(codec.decode(&token).unwrap(), cursor);
/// assert!(codec.decode("%%%").is_err());
/// ```
#[derive(Default)]
pub struct CursorCodec {
    layers: Vec<Box<dyn CursorTransform>>,
}

impl CursorCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transform. Encoding applies layers in insertion order,
    /// decoding in reverse.
    pub fn with_transform(mut self, layer: impl CursorTransform + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn encode(&self, cursor: &Cursor) -> Result<String> {
        let mut text = serde_json::to_string(cursor)
            .map_err(|e| SeekError::MalformedCursor(e.to_string()))?;
        for layer in &self.layers {
            text = layer.encode(&text)?;
        }
        Ok(URL_SAFE_NO_PAD.encode(text.as_bytes()))
    }

    /// Decodes a token. Every failure is reported as
    /// [`SeekError::MalformedCursor`].
    pub fn decode(&self, token: &str) -> Result<Cursor> {
        let token = token.trim();
        if token.is_empty() {
            return Err(reject("cursor token is empty".to_string()));
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(reject(format!(
                "cursor token exceeds {MAX_TOKEN_LEN} characters"
            )));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| reject(format!("invalid base64: {e}")))?;
        let mut text =
            String::from_utf8(bytes).map_err(|_| reject("payload is not UTF-8".to_string()))?;
        for layer in self.layers.iter().rev() {
            text = layer
                .decode(&text)
                .map_err(|e| reject(format!("transform failed: {e}")))?;
        }

        let cursor: Cursor =
            serde_json::from_str(&text).map_err(|e| reject(format!("invalid payload: {e}")))?;
        debug!(keys = cursor.len(), "decoded cursor");
        Ok(cursor)
    }

    /// Decodes `token` and converts it to boundary values for `sort`.
    pub fn boundary(&self, token: &str, sort: &SortSpec) -> Result<Vec<ClauseValue>> {
        self.decode(token)?.boundary(sort)
    }
}

impl fmt::Debug for CursorCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorCodec")
            .field("layers", &self.layers.len())
            .finish()
    }
}
