use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use sessionbox_core::{SessionValue, SmolStr, ValueKind};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use super::{FormatError, LEGACY_TABULAR_TAGS};

lazy_static! {
    static ref GLOBAL: Arc<TypeRegistry> = Arc::new(TypeRegistry::new());
}

/// Decoder for the body of an application type tag.
pub trait TypeDecoder: Send + Sync {
    /// Decodes `body` for a value tagged with `type_name`.
    fn decode(&self, type_name: &SmolStr, body: &str) -> Result<SessionValue, FormatError>;
}

impl<F> TypeDecoder for F
where
    F: Fn(&SmolStr, &str) -> Result<SessionValue, FormatError> + Send + Sync,
{
    fn decode(&self, type_name: &SmolStr, body: &str) -> Result<SessionValue, FormatError> {
        self(type_name, body)
    }
}

/// What a type tag resolved to.
#[derive(Clone)]
pub enum Resolution {
    /// One of the aliased built-in kinds.
    Builtin(ValueKind),
    /// An application type with a registered decoder.
    Registered(SmolStr, Arc<dyn TypeDecoder>),
    /// An application type kept as a generic JSON document.
    Generic(SmolStr),
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(kind) => f.debug_tuple("Builtin").field(kind).finish(),
            Self::Registered(name, _) => f.debug_tuple("Registered").field(name).finish(),
            Self::Generic(name) => f.debug_tuple("Generic").field(name).finish(),
        }
    }
}

/// Extension table of application type decoders, plus a cache of resolved
/// tags so each distinct tag is parsed once.
#[derive(Default)]
pub struct TypeRegistry {
    decoders: DashMap<SmolStr, Arc<dyn TypeDecoder>>,
    resolved: DashMap<String, Resolution>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("decoders", &self.decoders.len())
            .field("resolved", &self.resolved.len())
            .finish()
    }
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by [`SessionCodec::new`](super::SessionCodec::new).
    pub fn global() -> Arc<TypeRegistry> {
        GLOBAL.clone()
    }

    /// Registers a decoder for values tagged with `type_name`.
    pub fn register<D>(&self, type_name: impl Into<SmolStr>, decoder: D)
    where
        D: TypeDecoder + 'static,
    {
        let type_name = type_name.into();
        debug!(%type_name, "Registering session type decoder");
        self.decoders.insert(type_name, Arc::new(decoder));
        // Earlier lookups may have cached a generic fallback for this name.
        self.resolved.clear();
    }

    /// Registers `T` as the shape of values tagged with `type_name`.
    ///
    /// Bodies are validated against `T` and stored normalized to its
    /// serialized form.
    pub fn register_serde<T>(&self, type_name: impl Into<SmolStr>)
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.register(
            type_name,
            |type_name: &SmolStr, body: &str| -> Result<SessionValue, FormatError> {
                let typed: T = serde_json::from_str(body).map_err(FormatError::deserialize)?;
                let value = serde_json::to_value(&typed).map_err(FormatError::serialize)?;
                Ok(SessionValue::Json {
                    type_name: type_name.clone(),
                    value,
                })
            },
        );
    }

    /// Whether a decoder is registered for `type_name`.
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.decoders.contains_key(type_name)
    }

    /// Number of distinct tags resolved so far.
    pub fn resolved_len(&self) -> usize {
        self.resolved.len()
    }

    /// Resolves a type tag.
    pub fn resolve(&self, tag: &str) -> Result<Resolution, FormatError> {
        if let Some(kind) = ValueKind::from_alias(tag) {
            return Ok(Resolution::Builtin(kind));
        }
        if let Some(hit) = self.resolved.get(tag) {
            return Ok(hit.clone());
        }
        if LEGACY_TABULAR_TAGS.contains(&tag) {
            return Err(FormatError::UnsupportedKind(SmolStr::new(tag)));
        }

        let type_name: SmolStr = serde_json::from_str::<String>(tag)
            .map_err(|_| FormatError::UnknownTag(tag.to_owned()))?
            .into();
        let resolution = match self.decoders.get(&type_name) {
            Some(decoder) => Resolution::Registered(type_name, decoder.clone()),
            None => Resolution::Generic(type_name),
        };
        self.resolved.insert(tag.to_owned(), resolution.clone());
        Ok(resolution)
    }
}
