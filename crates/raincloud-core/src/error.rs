// ── Core error types ──
//
// User-facing errors from raincloud-core. Consumers never see raw
// device-client errors; the `From<raincloud_api::Error>` impl translates
// them into domain variants.

use raincloud_api::ObjectId;
use thiserror::Error;

/// One failed zone of a fan-out write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutFailure {
    pub zone: ObjectId,
    pub reason: String,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cannot connect to {service}: {reason}")]
    ConnectionFailed { service: String, reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Poll errors ──────────────────────────────────────────────────
    #[error("Refresh failed: {message}")]
    FetchFailed { message: String },

    #[error("No topology available yet -- the first refresh has not completed")]
    NotReady,

    #[error("Setup failed: {source}")]
    SetupFailed {
        #[source]
        source: Box<CoreError>,
    },

    // ── Command errors ───────────────────────────────────────────────
    #[error("Write to {target} failed: {message}")]
    MutateFailed { target: String, message: String },

    #[error(
        "Write failed on {} zone(s), {} succeeded",
        .failed.len(),
        .succeeded.len()
    )]
    PartialFanOut {
        failed: Vec<FanOutFailure>,
        succeeded: Vec<ObjectId>,
    },

    #[error("Zone not found: {zone}")]
    ZoneNotFound { zone: String },

    // ── Entity errors ────────────────────────────────────────────────
    #[error("Entity not found: {unique_id}")]
    EntityNotFound { unique_id: String },

    #[error("{unique_id} is a {platform}, not a switch")]
    NotAControl { unique_id: String, platform: String },

    #[error("Duplicate entity id: {unique_id}")]
    DuplicateEntity { unique_id: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Credentials or session were rejected; re-authentication is needed.
    pub fn is_auth(&self) -> bool {
        match self {
            Self::AuthenticationFailed { .. } => true,
            Self::SetupFailed { source } => source.is_auth(),
            _ => false,
        }
    }

    /// Network-level failure the next scheduled poll may not hit.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::SetupFailed { source } => source.is_transient(),
            _ => false,
        }
    }

    pub(crate) fn setup(source: CoreError) -> Self {
        match source {
            already @ Self::SetupFailed { .. } => already,
            other => Self::SetupFailed {
                source: Box::new(other),
            },
        }
    }
}

// ── Conversion from device-client errors ─────────────────────────────

impl From<raincloud_api::Error> for CoreError {
    fn from(err: raincloud_api::Error) -> Self {
        use raincloud_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            Api::Connect { service, reason } => CoreError::ConnectionFailed { service, reason },
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::Remote { message } => CoreError::FetchFailed { message },
            Api::Mutate { target, message } => CoreError::MutateFailed { target, message },
            Api::UnknownObject(zone) => CoreError::ZoneNotFound { zone },
            Api::Deserialization { message } => CoreError::FetchFailed {
                message: format!("invalid payload: {message}"),
            },
            Api::Io(e) => CoreError::Internal(format!("I/O error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expiry_maps_to_auth_failure() {
        let err = CoreError::from(raincloud_api::Error::SessionExpired);
        assert!(err.is_auth());
        assert!(CoreError::setup(err).is_auth());
    }

    #[test]
    fn fan_out_message_counts_zones() {
        let err = CoreError::PartialFanOut {
            failed: vec![FanOutFailure {
                zone: ObjectId::zone("F1", 2),
                reason: "rejected".into(),
            }],
            succeeded: vec![ObjectId::zone("F1", 1), ObjectId::zone("F1", 3)],
        };
        assert_eq!(err.to_string(), "Write failed on 1 zone(s), 2 succeeded");
    }
}
