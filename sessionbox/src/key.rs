//! Mapping from host session identifiers to backend session keys.

use std::fmt;

use sessionbox_core::SessionKey;
use smol_str::SmolStr;

/// What the host knows about the request a session is used in.
///
/// Passed to [`KeyDerivation`] so several applications can share one backend
/// without their session identifiers colliding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    /// Name of the application serving the request.
    pub application: Option<SmolStr>,
    /// Host name the request was addressed to.
    pub host: Option<SmolStr>,
}

impl RequestIdentity {
    /// Identity for requests of the given application.
    pub fn application(application: impl Into<SmolStr>) -> Self {
        Self {
            application: Some(application.into()),
            host: None,
        }
    }

    /// Sets the request host.
    pub fn with_host(mut self, host: impl Into<SmolStr>) -> Self {
        self.host = Some(host.into());
        self
    }
}

/// Turns a host session identifier into the backend key of its record.
pub trait KeyDerivation: Send + Sync {
    /// Derives the session key.
    fn derive(&self, session_id: &str, request: &RequestIdentity) -> SessionKey;
}

impl<F> KeyDerivation for F
where
    F: Fn(&str, &RequestIdentity) -> SessionKey + Send + Sync,
{
    fn derive(&self, session_id: &str, request: &RequestIdentity) -> SessionKey {
        self(session_id, request)
    }
}

/// Uses the session identifier unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityKey;

impl KeyDerivation for IdentityKey {
    fn derive(&self, session_id: &str, _request: &RequestIdentity) -> SessionKey {
        SessionKey::new(session_id)
    }
}

/// Prepends a fixed prefix to the session identifier.
#[derive(Clone)]
pub struct PrefixedKey {
    prefix: SmolStr,
}

impl PrefixedKey {
    /// Creates the derivation, e.g. `PrefixedKey::new("sess:")`.
    pub fn new(prefix: impl Into<SmolStr>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl fmt::Debug for PrefixedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrefixedKey").field(&self.prefix).finish()
    }
}

impl KeyDerivation for PrefixedKey {
    fn derive(&self, session_id: &str, _request: &RequestIdentity) -> SessionKey {
        SessionKey::new(format!("{}{}", self.prefix, session_id))
    }
}

/// Scopes keys by application: `<application>:<session id>`.
///
/// Requests without an application name fall back to the bare identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationScopedKey;

impl KeyDerivation for ApplicationScopedKey {
    fn derive(&self, session_id: &str, request: &RequestIdentity) -> SessionKey {
        match &request.application {
            Some(application) => SessionKey::new(format!("{application}:{session_id}")),
            None => SessionKey::new(session_id),
        }
    }
}
