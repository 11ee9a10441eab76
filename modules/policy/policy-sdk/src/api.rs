//! Public API traits for the policy module.

use async_trait::async_trait;

use crate::error::{PolicyClientError, ServiceError};
use crate::marketplace::{
    AppStoreListing, CreateDraftModuleInput, DraftModule, DraftWellnessOfferingModule,
    PublishDraftModuleInput, PublishedModule, SetDraftModuleSourceInput, WellnessOfferingModule,
};
use crate::models::{Account, ListOptions, Page, Policy};

/// Remote policy API.
///
/// Implemented over HTTP by the `policy` module and by in-memory doubles in
/// tests:
///
/// ```ignore
/// let client: Arc<dyn PolicyClient> = Arc::new(RestPolicyClient::new(transport));
///
/// let policy = client.get("data-readers").await?;
/// ```
#[async_trait]
pub trait PolicyClient: Send + Sync {
    /// List one page of policies.
    ///
    /// # Errors
    ///
    /// - `Api` if the API rejects the request
    /// - `Transport` if the API cannot be reached
    /// - `Decode` if a returned policy is malformed
    async fn list(&self, options: ListOptions) -> Result<Page<Policy>, PolicyClientError>;

    /// List every policy, following pages until the last one.
    ///
    /// # Errors
    ///
    /// Any error of [`PolicyClient::list`] for any page.
    async fn list_all(&self) -> Result<Vec<Policy>, PolicyClientError> {
        let mut options = ListOptions::default();
        let mut policies = Vec::new();
        loop {
            let page = self.list(options.clone()).await?;
            if !page.has_next_page() {
                policies.extend(page.items);
                return Ok(policies);
            }
            options = page.next_options(&options)?;
            policies.extend(page.items);
        }
    }

    /// Create a policy.
    ///
    /// # Errors
    ///
    /// - `Api` if the policy is rejected (e.g. the name is taken)
    /// - `Transport` / `Decode` as for [`PolicyClient::list`]
    async fn create(&self, policy: &Policy) -> Result<Policy, PolicyClientError>;

    /// Get a policy by name.
    ///
    /// # Errors
    ///
    /// - `Api` with status 404 if no such policy exists
    /// - `Transport` / `Decode` as for [`PolicyClient::list`]
    async fn get(&self, name: &str) -> Result<Policy, PolicyClientError>;

    /// Replace the policy called `name` with `policy`.
    ///
    /// # Errors
    ///
    /// - `Api` if the policy does not exist or is rejected
    /// - `Transport` / `Decode` as for [`PolicyClient::list`]
    async fn update(&self, name: &str, policy: &Policy) -> Result<Policy, PolicyClientError>;

    /// Delete a policy by name.
    ///
    /// # Errors
    ///
    /// - `Api` if the policy does not exist
    /// - `Transport` if the API cannot be reached
    async fn delete(&self, name: &str) -> Result<(), PolicyClientError>;
}

/// Remote account API.
#[async_trait]
pub trait AccountClient: Send + Sync {
    /// Accounts the caller has access to.
    ///
    /// # Errors
    ///
    /// - `Api` if the API rejects the request
    /// - `Transport` if the API cannot be reached
    async fn list_accounts(&self) -> Result<Vec<Account>, PolicyClientError>;
}

/// Marketplace service, consumed as named RPCs.
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// Create a draft module.
    ///
    /// # Errors
    ///
    /// - `Rejected` if the service refuses the draft
    /// - `Transport` if the service cannot be reached
    async fn create_draft_module(
        &self,
        input: &CreateDraftModuleInput,
    ) -> Result<DraftModule, ServiceError>;

    /// Attach a wellness-offering source to a draft.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the draft does not exist
    /// - `Rejected` / `Transport` as for [`MarketplaceClient::create_draft_module`]
    async fn set_wellness_offering_draft_module_source(
        &self,
        input: &SetDraftModuleSourceInput,
    ) -> Result<(), ServiceError>;

    /// Publish a draft; test modules are approved right away.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the draft does not exist
    /// - `Rejected` / `Transport` as for [`MarketplaceClient::create_draft_module`]
    async fn publish_module_v3(
        &self,
        input: &PublishDraftModuleInput,
    ) -> Result<PublishedModule, ServiceError>;

    /// The approved module `module_id`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no approved module has that id
    /// - `Transport` if the service cannot be reached
    async fn get_wellness_offering_module(
        &self,
        module_id: &str,
    ) -> Result<WellnessOfferingModule, ServiceError>;

    /// The published module `module_id` still awaiting review.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no module under review has that id
    /// - `Transport` if the service cannot be reached
    async fn get_draft_wellness_offering_module(
        &self,
        module_id: &str,
    ) -> Result<DraftWellnessOfferingModule, ServiceError>;

    /// Delete a module and all of its versions.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the module does not exist
    /// - `Transport` if the service cannot be reached
    async fn delete_module(&self, module_id: &str) -> Result<(), ServiceError>;
}

/// App-store listing service.
///
/// Every method fails with `NotFound` for an unknown listing id, `Rejected`
/// when the service refuses the call and `Transport` when it cannot be
/// reached.
#[async_trait]
pub trait AppStoreClient: Send + Sync {
    /// Create a listing and return its id.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    async fn create_app_store_listing(
        &self,
        listing: &AppStoreListing,
    ) -> Result<String, ServiceError>;

    /// # Errors
    ///
    /// See the trait documentation.
    async fn get_app_store_listing(&self, id: &str) -> Result<AppStoreListing, ServiceError>;

    /// # Errors
    ///
    /// See the trait documentation.
    async fn edit_app_store_listing(
        &self,
        id: &str,
        listing: &AppStoreListing,
    ) -> Result<(), ServiceError>;

    /// # Errors
    ///
    /// See the trait documentation.
    async fn delete_app_store_listing(&self, id: &str) -> Result<(), ServiceError>;
}
