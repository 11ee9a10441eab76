//! Policy module wiring.

use std::sync::Arc;

use policy_sdk::{AccountClient, PolicyClient, PolicyClientError};
use tracing::info;

use crate::config::ProviderConfig;
use crate::domain::PolicyResource;
use crate::infra::{HttpTransport, RestPolicyClient};

/// Configured clients and resource handlers for one API endpoint.
pub struct PolicyModule {
    resource: PolicyResource,
    policies: Arc<dyn PolicyClient>,
    accounts: Arc<dyn AccountClient>,
}

impl PolicyModule {
    /// Connect to the API described by `config`.
    ///
    /// # Errors
    ///
    /// `Transport` if the HTTP client cannot be initialized.
    #[tracing::instrument(skip_all, fields(host = %config.host))]
    pub fn init(config: &ProviderConfig) -> Result<Self, PolicyClientError> {
        if config.token.is_none() {
            tracing::warn!("No API token configured; requests will be unauthenticated");
        }
        let transport = Arc::new(HttpTransport::new(config)?);
        let client = Arc::new(RestPolicyClient::new(transport));
        info!(base_url = %config.base_url(), account = ?config.account(), "Initialized policy module");
        Ok(Self::with_clients(client.clone(), client))
    }

    /// Build the module over existing clients.
    #[must_use]
    pub fn with_clients(policies: Arc<dyn PolicyClient>, accounts: Arc<dyn AccountClient>) -> Self {
        Self {
            resource: PolicyResource::new(policies.clone()),
            policies,
            accounts,
        }
    }

    #[must_use]
    pub fn resource(&self) -> &PolicyResource {
        &self.resource
    }

    #[must_use]
    pub fn policies(&self) -> &Arc<dyn PolicyClient> {
        &self.policies
    }

    #[must_use]
    pub fn accounts(&self) -> &Arc<dyn AccountClient> {
        &self.accounts
    }
}
