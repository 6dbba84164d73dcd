//! Type-tagged textual encoding of session field values.
//!
//! Every field is stored as a type tag followed by a JSON body:
//!
//! ```text
//! |!a_SysInt_a!|42
//! |!a_SysString_a!|"hello"
//! |!a_"Shop.Cart"_a!|{"items":[1,2]}
//! ```
//!
//! Built-in kinds use their short alias (see [`ValueKind::alias`]) as the tag.
//! Application values ([`SessionValue::Json`]) use their JSON-quoted type
//! name. On decode the tag is resolved through the alias table, then the
//! [`TypeRegistry`] resolution cache, then the registry's decoders, falling
//! back to keeping the body as a generic JSON document.
//!
//! ```
//! use sessionbox_backend::format::SessionCodec;
//! use sessionbox_core::SessionValue;
//!
//! let codec = SessionCodec::new();
//! let encoded = codec.encode(&SessionValue::from(42)).unwrap();
//! assert_eq!(encoded, "|!a_SysInt_a!|42");
//! assert_eq!(codec.decode(&encoded).unwrap(), SessionValue::from(42));
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use sessionbox_core::{SessionValue, SmolStr, ValueKind};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use crate::backend::HashFields;

mod registry;

pub use registry::{Resolution, TypeDecoder, TypeRegistry};

const TAG_OPEN: &str = "|!a_";
const TAG_CLOSE: &str = "_a!|";

/// Tags of tabular values written by legacy deployments. Their XML payload
/// is not understood.
pub const LEGACY_TABULAR_TAGS: [&str; 2] = ["System.Data.DataTable", "System.Data.DataSet"];

lazy_static! {
    static ref TAG_PATTERN: Regex = Regex::new(r"^\|!a_(.*?)_a!\|").expect("valid tag pattern");
}

/// Field encoding and decoding errors.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The value body could not be serialized.
    #[error(transparent)]
    Serialize(Box<dyn std::error::Error + Send>),

    /// The value body could not be parsed as the tagged kind.
    #[error(transparent)]
    Deserialize(Box<dyn std::error::Error + Send>),

    /// The encoded text does not start with a type tag.
    #[error("encoded value has no type tag")]
    MissingTag,

    /// The tag is neither an alias nor a JSON-quoted type name.
    #[error("unrecognized type tag `{0}`")]
    UnknownTag(String),

    /// The tag names a kind this codec cannot represent.
    #[error("values of type `{0}` are not supported")]
    UnsupportedKind(SmolStr),

    /// Application type names must not contain the tag delimiter.
    #[error("type name `{0}` cannot be used as a tag")]
    InvalidTypeName(SmolStr),

    /// NaN and infinities have no JSON representation.
    #[error("non-finite float cannot be encoded")]
    NonFinite,
}

impl FormatError {
    fn serialize(err: serde_json::Error) -> Self {
        Self::Serialize(Box::new(err))
    }

    fn deserialize(err: serde_json::Error) -> Self {
        Self::Deserialize(Box::new(err))
    }
}

/// One successfully decoded field.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    /// Field name.
    pub name: SmolStr,
    /// Decoded value.
    pub value: SessionValue,
    /// The value re-encoded by this codec.
    pub encoded: String,
}

/// Result of decoding a whole record: the good fields and the failures.
#[derive(Debug, Default)]
pub struct DecodedFields {
    /// Fields that decoded.
    pub fields: Vec<DecodedField>,
    /// Fields that were skipped, with the reason.
    pub errors: Vec<(SmolStr, FormatError)>,
}

/// Codec for session field values.
///
/// Cheap to clone; clones share the same [`TypeRegistry`].
#[derive(Clone)]
pub struct SessionCodec {
    registry: Arc<TypeRegistry>,
}

impl Default for SessionCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("registry", &self.registry)
            .finish()
    }
}

impl SessionCodec {
    /// Codec backed by the process-wide [`TypeRegistry::global`].
    pub fn new() -> Self {
        Self {
            registry: TypeRegistry::global(),
        }
    }

    /// Codec backed by a private registry.
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this codec resolves tags with.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Encodes a value as `|!a_<tag>_a!|<json>`.
    pub fn encode(&self, value: &SessionValue) -> Result<String, FormatError> {
        let body = match value {
            SessionValue::Int(v) => v.to_string(),
            SessionValue::Long(v) => v.to_string(),
            SessionValue::Byte(v) => v.to_string(),
            SessionValue::Bool(v) => v.to_string(),
            SessionValue::Double(v) => {
                if !v.is_finite() {
                    return Err(FormatError::NonFinite);
                }
                serde_json::to_string(v).map_err(FormatError::serialize)?
            }
            SessionValue::Float(v) => {
                if !v.is_finite() {
                    return Err(FormatError::NonFinite);
                }
                serde_json::to_string(v).map_err(FormatError::serialize)?
            }
            SessionValue::String(v) => serde_json::to_string(v).map_err(FormatError::serialize)?,
            SessionValue::IntArray(v) => serde_json::to_string(v).map_err(FormatError::serialize)?,
            SessionValue::StringArray(v) => {
                serde_json::to_string(v).map_err(FormatError::serialize)?
            }
            SessionValue::DateTime(v) => serde_json::to_string(v).map_err(FormatError::serialize)?,
            SessionValue::Json { type_name, value } => {
                let tag = serde_json::to_string(type_name.as_str()).map_err(FormatError::serialize)?;
                if tag.contains(TAG_CLOSE) {
                    return Err(FormatError::InvalidTypeName(type_name.clone()));
                }
                let body = serde_json::to_string(value).map_err(FormatError::serialize)?;
                return Ok(format!("{TAG_OPEN}{tag}{TAG_CLOSE}{body}"));
            }
        };
        // Every non-JSON kind has an alias.
        let alias = value.kind().alias().unwrap_or_default();
        Ok(format!("{TAG_OPEN}{alias}{TAG_CLOSE}{body}"))
    }

    /// Decodes one encoded field value.
    pub fn decode(&self, encoded: &str) -> Result<SessionValue, FormatError> {
        let captures = TAG_PATTERN
            .captures(encoded)
            .ok_or(FormatError::MissingTag)?;
        let (Some(whole), Some(tag)) = (captures.get(0), captures.get(1)) else {
            return Err(FormatError::MissingTag);
        };
        let body = &encoded[whole.end()..];

        match self.registry.resolve(tag.as_str())? {
            Resolution::Builtin(kind) => decode_builtin(kind, body),
            Resolution::Registered(type_name, decoder) => decoder.decode(&type_name, body),
            Resolution::Generic(type_name) => {
                let value = serde_json::from_str(body).map_err(FormatError::deserialize)?;
                Ok(SessionValue::Json { type_name, value })
            }
        }
    }

    /// Decodes a value, logging and discarding failures.
    pub fn decode_lossy(&self, encoded: &str) -> Option<SessionValue> {
        match self.decode(encoded) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(%error, "Skipping undecodable session value");
                None
            }
        }
    }

    /// Decodes every field of a record. A bad field never fails the batch.
    pub fn decode_fields(&self, raw: HashFields) -> DecodedFields {
        let mut decoded = DecodedFields::default();
        for (name, text) in raw {
            let result = self
                .decode(&text)
                .and_then(|value| self.encode(&value).map(|encoded| (value, encoded)));
            match result {
                Ok((value, encoded)) => decoded.fields.push(DecodedField {
                    name,
                    value,
                    encoded,
                }),
                Err(error) => {
                    warn!(field = %name, %error, "Skipping undecodable session field");
                    decoded.errors.push((name, error));
                }
            }
        }
        decoded
    }
}

fn parse<T: DeserializeOwned>(body: &str) -> Result<T, FormatError> {
    serde_json::from_str(body).map_err(FormatError::deserialize)
}

fn decode_builtin(kind: ValueKind, body: &str) -> Result<SessionValue, FormatError> {
    Ok(match kind {
        ValueKind::Int => SessionValue::Int(parse(body)?),
        ValueKind::Long => SessionValue::Long(parse(body)?),
        ValueKind::Double => SessionValue::Double(parse(body)?),
        ValueKind::Float => SessionValue::Float(parse(body)?),
        ValueKind::Bool => SessionValue::Bool(parse(body)?),
        ValueKind::Byte => SessionValue::Byte(parse(body)?),
        ValueKind::String => SessionValue::String(parse(body)?),
        ValueKind::IntArray => SessionValue::IntArray(parse(body)?),
        ValueKind::StringArray => SessionValue::StringArray(parse(body)?),
        ValueKind::DateTime => SessionValue::DateTime(parse::<DateTime<Utc>>(body)?),
        ValueKind::Json => return Err(FormatError::UnknownTag(body.to_owned())),
    })
}
