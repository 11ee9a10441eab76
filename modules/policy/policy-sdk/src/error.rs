//! Error types for the policy SDK.

use thiserror::Error;

/// Errors raised while decoding a policy from its JSON wire format.
///
/// Decode errors are fatal: a document that fails to decode is rejected as a
/// whole and no partial policy is ever returned.
#[derive(Debug, Error)]
pub enum PolicyDecodeError {
    /// A rule map did not contain exactly one subject.
    #[error("failed to parse RuleMap: should have exactly one entry, has {entries}")]
    RuleMapArity { entries: usize },

    /// A comparison object had neither a `value` nor a `target` key.
    #[error("malformed comparison object")]
    MalformedComparison,

    /// A comparison object had the right keys but ill-typed contents.
    #[error("failed to parse comparison: {reason}")]
    InvalidComparison { reason: String },

    /// An operation rule was neither a boolean nor an array.
    #[error("unexpected primitive type for operation {operation:?} rule: {type_name}")]
    UnexpectedRuleType {
        operation: String,
        type_name: &'static str,
    },

    /// One of the rule maps of an operation failed to decode.
    #[error("could not parse rule mappings for operation {operation:?}: {source}")]
    RuleMappings {
        operation: String,
        #[source]
        source: Box<PolicyDecodeError>,
    },

    /// A JSON value that must be an object was something else.
    #[error("expected {expected} to be a JSON object, got {found}")]
    NotAnObject {
        expected: &'static str,
        found: &'static str,
    },

    /// The payload was not valid JSON (or failed inside a serde impl).
    #[error("invalid policy JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl PolicyDecodeError {
    pub fn invalid_comparison(reason: impl Into<String>) -> Self {
        Self::InvalidComparison {
            reason: reason.into(),
        }
    }

    pub fn rule_mappings(operation: impl Into<String>, source: Self) -> Self {
        Self::RuleMappings {
            operation: operation.into(),
            source: Box::new(source),
        }
    }
}

/// Errors returned by [`crate::PolicyClient`] and [`crate::AccountClient`].
#[derive(Debug, Error)]
pub enum PolicyClientError {
    /// The API answered with an error status.
    #[error("{message} (status {status})")]
    Api { status: u16, message: String },

    /// The request never produced an API response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with a body that is not a valid policy payload.
    #[error("failed to decode response: {0}")]
    Decode(#[from] PolicyDecodeError),

    /// A next page was requested from the last page of a listing.
    #[error("no next page to fetch")]
    NoNextPage,
}

impl PolicyClientError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Whether the API reported that the addressed resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

impl From<serde_json::Error> for PolicyClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(PolicyDecodeError::Json(e))
    }
}

/// Errors returned by [`crate::MarketplaceClient`] and [`crate::AppStoreClient`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The addressed module or listing does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The service rejected the call.
    #[error("{0}")]
    Rejected(String),

    /// The call never produced a service response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ServiceError {
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
