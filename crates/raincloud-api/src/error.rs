use thiserror::Error;

/// Top-level error type for the `raincloud-api` crate.
///
/// Covers every failure mode a device-access client can report:
/// authentication, transport, remote service, writes and payload decoding.
/// `raincloud-core` maps these into its own error enum.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, locked account, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The session token is no longer accepted by the service.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// The service could not be reached at all.
    #[error("Cannot reach {service}: {reason}")]
    Connect { service: String, reason: String },

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Remote service ──────────────────────────────────────────────
    /// Generic failure while reading state from the service.
    #[error("Remote service error: {message}")]
    Remote { message: String },

    /// A single write was rejected by the service.
    #[error("Write to {target} rejected: {message}")]
    Mutate { target: String, message: String },

    /// The addressed controller, faucet or zone does not exist.
    #[error("Unknown object: {0}")]
    UnknownObject(String),

    // ── Data ────────────────────────────────────────────────────────
    /// A payload could not be decoded, or decoded into an invalid tree.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String },

    /// Reading a fixture or payload from disk failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the credentials or session were rejected and
    /// re-authentication might resolve it.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error the next poll may not hit.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Deserialization {
            message: err.to_string(),
        }
    }
}
