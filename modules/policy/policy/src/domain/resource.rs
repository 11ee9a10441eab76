use std::sync::Arc;

use policy_sdk::{Policy, PolicyClient};
use tracing::{debug, info, instrument, warn};

use super::bridge::{expand, flatten};
use super::diagnostics::Diagnostics;
use super::error::DomainError;
use super::schema::{PolicyConfig, PolicyRuleBlock, validate};

/// New resource state together with the warnings produced while computing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState<S = PolicyConfig> {
    pub state: S,
    pub diagnostics: Diagnostics,
}

impl<S> ResourceState<S> {
    #[must_use]
    pub fn new(state: S) -> Self {
        Self {
            state,
            diagnostics: Diagnostics::new(),
        }
    }
}

impl ResourceState {
    fn settle(declared: &PolicyConfig, policy: Policy) -> Self {
        let (state, diagnostics) = flatten(declared, policy);
        Self { state, diagnostics }
    }
}

/// Lifecycle handlers of the policy resource.
pub struct PolicyResource {
    client: Arc<dyn PolicyClient>,
}

impl PolicyResource {
    #[must_use]
    pub fn new(client: Arc<dyn PolicyClient>) -> Self {
        Self { client }
    }

    /// Check a configuration without touching the API.
    #[must_use]
    pub fn validate(config: &PolicyConfig) -> Diagnostics {
        validate(config)
    }

    /// Create the policy described by `plan`.
    ///
    /// # Errors
    ///
    /// `Validation` if `plan` is invalid, `Remote` if the API refuses it.
    #[instrument(skip_all, fields(policy = %plan.name))]
    pub async fn create(&self, plan: &PolicyConfig) -> Result<ResourceState, DomainError> {
        info!("Creating policy");
        let policy = expand(plan)?;

        let created = self
            .client
            .create(&policy)
            .await
            .map_err(|e| DomainError::remote("create", &policy.name, e))?;

        info!(operations = created.policy.rules.len(), "Created policy");
        Ok(ResourceState::settle(plan, created))
    }

    /// Refresh `state` from the API.
    ///
    /// Returns `None` when the policy no longer exists remotely, in which case
    /// the caller should forget the resource.
    ///
    /// # Errors
    ///
    /// `Remote` for any API failure other than a missing policy.
    #[instrument(skip_all, fields(policy = %state.name))]
    pub async fn read(&self, state: &PolicyConfig) -> Result<Option<ResourceState>, DomainError> {
        debug!("Reading policy");
        match self.client.get(&state.name).await {
            Ok(policy) => Ok(Some(ResourceState::settle(state, policy))),
            Err(e) if e.is_not_found() => {
                warn!("Policy no longer exists remotely");
                Ok(None)
            }
            Err(e) => Err(DomainError::remote("get", &state.name, e)),
        }
    }

    /// Replace the remote policy recorded in `state` with `plan`.
    ///
    /// # Errors
    ///
    /// `Validation` if `plan` is invalid, `Remote` if the API refuses it.
    #[instrument(skip_all, fields(policy = %state.name))]
    pub async fn update(
        &self,
        plan: &PolicyConfig,
        state: &PolicyConfig,
    ) -> Result<ResourceState, DomainError> {
        info!("Updating policy");
        let policy = expand(plan)?;

        let updated = self
            .client
            .update(&state.name, &policy)
            .await
            .map_err(|e| DomainError::remote("update", &state.name, e))?;

        info!(operations = updated.policy.rules.len(), "Updated policy");
        Ok(ResourceState::settle(plan, updated))
    }

    /// Delete the remote policy recorded in `state`.
    ///
    /// # Errors
    ///
    /// `Remote` if the API refuses the deletion.
    #[instrument(skip_all, fields(policy = %state.name))]
    pub async fn delete(&self, state: &PolicyConfig) -> Result<(), DomainError> {
        info!("Deleting policy");
        self.client
            .delete(&state.name)
            .await
            .map_err(|e| DomainError::remote("delete", &state.name, e))
    }

    /// Build state for an existing remote policy that has no recorded state.
    ///
    /// Every remote operation becomes a rule block, in operation-name order.
    ///
    /// # Errors
    ///
    /// `Remote` if the policy cannot be fetched.
    #[instrument(skip_all, fields(policy = %name))]
    pub async fn import(&self, name: &str) -> Result<ResourceState, DomainError> {
        info!("Importing policy");
        let policy = self
            .client
            .get(name)
            .await
            .map_err(|e| DomainError::remote("get", name, e))?;

        let declared = PolicyConfig::new(
            policy.name.clone(),
            policy
                .policy
                .rules
                .operations()
                .map(|operation| PolicyRuleBlock {
                    operation: operation.to_owned(),
                    ..PolicyRuleBlock::default()
                })
                .collect(),
        );
        Ok(ResourceState::settle(&declared, policy))
    }
}
