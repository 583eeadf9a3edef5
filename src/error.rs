//! Error taxonomy
//!
//! Adapters report provider-native failures as [`AdapterError`]. The core
//! classifies them into [`GovernanceError`], which is what policy authors and
//! the invoking framework see.

use thiserror::Error;

/// HTTP statuses that indicate a retryable provider fault
const RETRYABLE_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Provider-native failure reported by a [`ResourceClient`](crate::resource::ResourceClient)
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The provider answered with a non-success status
    #[error("API request failed with status {status}: {message}")]
    Status {
        status: u16,
        /// Provider error code, e.g. `ResourceGroupNotFound`
        code: Option<String>,
        message: String,
    },

    /// The call did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection could not be established or was reset
    #[error("connection error: {0}")]
    Connection(String),

    /// Anything the adapter could not classify
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AdapterError {
    /// Shorthand for a status failure without a provider error code
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            code: None,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Rate limiting, timeouts, gateway and availability errors
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Other(_) => false,
        }
    }
}

/// Errors surfaced by the governance pipeline
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// Filter or action parameters do not match the declared schema
    #[error("invalid parameters for {target}: {}", issues.join("; "))]
    SchemaValidation { target: String, issues: Vec<String> },

    /// Retryable provider fault (rate limiting, timeouts)
    #[error("transient API error during {operation}: {source}")]
    TransientApi {
        operation: String,
        #[source]
        source: AdapterError,
    },

    /// Non-retryable provider fault (authorization, not-found on a required call)
    #[error("API error during {operation}: {source}")]
    FatalApi {
        operation: String,
        #[source]
        source: AdapterError,
    },

    /// A per-id lookup did not resolve
    #[error("resource '{id}' not found")]
    NotFound {
        id: String,
        #[source]
        source: Option<AdapterError>,
    },

    #[error("{registry} '{name}' is already registered to a different implementation")]
    DuplicateRegistration { registry: String, name: String },

    #[error("unknown {registry} '{name}'")]
    UnknownName { registry: String, name: String },

    /// Enumeration was cut short by an external deadline
    #[error("deadline exceeded after collecting {collected} records")]
    DeadlineExceeded { collected: usize },

    /// The adapter returned an object that cannot become a record
    #[error("invalid record returned by {operation}: {reason}")]
    InvalidRecord { operation: String, reason: String },

    /// Several problems found while compiling one policy, each kept whole
    #[error("{target} is invalid: {}", join(errors))]
    PolicyInvalid {
        target: String,
        errors: Vec<GovernanceError>,
    },
}

fn join(errors: &[GovernanceError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T, E = GovernanceError> = std::result::Result<T, E>;

impl GovernanceError {
    /// Classify an adapter failure as transient or fatal
    pub fn from_adapter(operation: impl Into<String>, source: AdapterError) -> Self {
        let operation = operation.into();
        if source.is_retryable() {
            Self::TransientApi { operation, source }
        } else {
            Self::FatalApi { operation, source }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientApi { .. })
    }

    /// Gather construction errors into one; a single error is returned unchanged
    pub fn combine(target: impl Into<String>, mut errors: Vec<GovernanceError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::PolicyInvalid {
                target: target.into(),
                errors,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_transient() {
        let err = GovernanceError::from_adapter("delete", AdapterError::status(429, "slow down"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_forbidden_is_fatal() {
        let err = GovernanceError::from_adapter("list", AdapterError::status(403, "denied"));
        assert!(matches!(err, GovernanceError::FatalApi { .. }));
    }

    #[test]
    fn test_unclassified_is_fatal_and_keeps_source() {
        let err = GovernanceError::from_adapter(
            "get",
            AdapterError::Other(anyhow::anyhow!("socket exploded")),
        );
        assert!(matches!(err, GovernanceError::FatalApi { .. }));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("socket exploded"));
    }

    #[test]
    fn test_timeouts_are_retryable() {
        assert!(AdapterError::Timeout("10s".into()).is_retryable());
        assert!(AdapterError::Connection("reset".into()).is_retryable());
        assert!(!AdapterError::status(404, "gone").is_retryable());
    }

    #[test]
    fn test_combine_single_error_is_passed_through() {
        let err = GovernanceError::combine(
            "policy",
            vec![GovernanceError::UnknownName {
                registry: "filter".into(),
                name: "nope".into(),
            }],
        );
        assert!(matches!(err, Some(GovernanceError::UnknownName { .. })));
        assert!(GovernanceError::combine("policy", Vec::new()).is_none());
    }

    #[test]
    fn test_combine_lists_every_error() {
        let err = GovernanceError::combine(
            "policy 'p'",
            vec![
                GovernanceError::UnknownName {
                    registry: "filter".into(),
                    name: "a".into(),
                },
                GovernanceError::UnknownName {
                    registry: "action".into(),
                    name: "b".into(),
                },
            ],
        );
        let err = err.unwrap();
        assert_eq!(
            err.to_string(),
            "policy 'p' is invalid: unknown filter 'a'; unknown action 'b'"
        );
        match err {
            GovernanceError::PolicyInvalid { target, errors } => {
                assert_eq!(target, "policy 'p'");
                assert!(errors
                    .iter()
                    .all(|e| matches!(e, GovernanceError::UnknownName { .. })));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
