//! Error taxonomy for the extraction engine.
//!
//! Field-level misses are never errors; they surface as `None` fields on a
//! snapshot. Errors here are either retryable transport failures or hard
//! configuration/session problems the caller must act on.

use crate::model::Platform;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Navigation timeout, DNS failure, dropped connection. Retryable.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Browser process could not be launched or the CDP channel broke
    /// during setup. Retryable (the pool relaunches on next acquire).
    #[error("browser failure: {0}")]
    Browser(String),

    /// A login-gated extraction was attempted with no stored cookies.
    /// Not retryable; only a manual login flow can fix it.
    #[error("no stored login session for {0}")]
    NoSession(Platform),

    /// A required API credential is absent from config and environment.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("unsupported platform: {0:?}")]
    UnknownPlatform(String),

    /// Waited longer than the configured bound for a concurrency slot.
    #[error("timed out waiting for a {0} extraction slot")]
    SlotTimeout(Platform),

    /// Persisting or reading login cookies failed.
    #[error("session storage: {0}")]
    SessionStorage(#[source] std::io::Error),

    #[error("cookie serialization: {0}")]
    CookieFormat(#[from] serde_json::Error),

    #[error("configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the retry controller may usefully attempt again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Browser(_))
    }
}
