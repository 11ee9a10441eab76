use policy_sdk::{PolicyClientError, ServiceError};

use super::diagnostics::{AttributePath, Diagnostics};

/// Errors of the policy resource handlers.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("invalid policy configuration: {0}")]
    Validation(Diagnostics),

    #[error("failed to {action} policy {name:?}: {source}")]
    Remote {
        action: &'static str,
        name: String,
        #[source]
        source: PolicyClientError,
    },

    /// A marketplace or app-store call failed.
    #[error("{summary}: {source}")]
    Service {
        summary: &'static str,
        #[source]
        source: ServiceError,
    },

    /// The remote resource could not be turned into state.
    #[error("{0}")]
    Failed(Diagnostics),
}

impl DomainError {
    pub fn remote(action: &'static str, name: impl Into<String>, source: PolicyClientError) -> Self {
        Self::Remote {
            action,
            name: name.into(),
            source,
        }
    }

    pub fn service(summary: &'static str, source: ServiceError) -> Self {
        Self::Service { summary, source }
    }

    /// State of a `kind` resource that lacks the id it is addressed by.
    #[must_use]
    pub fn missing_id(kind: &str) -> Self {
        let mut diags = Diagnostics::new();
        diags.add_attribute_error(
            AttributePath::root("id"),
            format!("{kind} state has no id"),
            "Import the resource by id to recover its state",
        );
        Self::Failed(diags)
    }

    /// The diagnostics behind a `Validation` or `Failed` error.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::Validation(diags) | Self::Failed(diags) => Some(diags),
            Self::Remote { .. } | Self::Service { .. } => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Remote { source, .. } => source.is_not_found(),
            Self::Service { source, .. } => source.is_not_found(),
            Self::Validation(_) | Self::Failed(_) => false,
        }
    }
}

impl From<Diagnostics> for DomainError {
    fn from(diags: Diagnostics) -> Self {
        Self::Validation(diags)
    }
}
