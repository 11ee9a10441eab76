//! In-memory platform services for handler tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use policy_sdk::{
    AppStoreClient, AppStoreListing, CreateDraftModuleInput, DraftModule,
    DraftWellnessOfferingModule, ListOptions, MarketplaceClient, ModuleSource, Page, Policy,
    PolicyClient, PolicyClientError, PublishDraftModuleInput, PublishedModule, ServiceError,
    SetDraftModuleSourceInput, WellnessOfferingModule,
};

#[derive(Default)]
pub struct InMemoryPolicyClient {
    policies: Mutex<BTreeMap<String, Policy>>,
    page_size: Option<usize>,
}

impl InMemoryPolicyClient {
    /// Serve listings at most `page_size` policies at a time unless the
    /// caller asks for another size.
    pub fn paged(page_size: usize) -> Self {
        Self {
            page_size: Some(page_size),
            ..Self::default()
        }
    }

    /// Store `policy` directly, bypassing the API rules.
    pub fn put(&self, policy: Policy) {
        self.policies
            .lock()
            .unwrap()
            .insert(policy.name.clone(), policy);
    }

    pub fn stored(&self, name: &str) -> Option<Policy> {
        self.policies.lock().unwrap().get(name).cloned()
    }
}

fn not_found() -> PolicyClientError {
    PolicyClientError::api(404, "Policy not found")
}

#[async_trait]
impl PolicyClient for InMemoryPolicyClient {
    async fn list(&self, options: ListOptions) -> Result<Page<Policy>, PolicyClientError> {
        let policies = self.policies.lock().unwrap();
        let start: usize = match options.next_page_token.as_deref() {
            Some(token) => token
                .parse()
                .map_err(|_| PolicyClientError::api(400, "Invalid nextPageToken"))?,
            None => 0,
        };
        let size = options
            .page_size
            .map(|s| s as usize)
            .or(self.page_size)
            .unwrap_or(usize::MAX);
        let items: Vec<Policy> = policies.values().skip(start).take(size).cloned().collect();
        let end = start + items.len();
        Ok(Page {
            items,
            next_page_token: (end < policies.len()).then(|| end.to_string()),
        })
    }

    async fn create(&self, policy: &Policy) -> Result<Policy, PolicyClientError> {
        let mut policies = self.policies.lock().unwrap();
        if policies.contains_key(&policy.name) {
            return Err(PolicyClientError::api(409, "Policy already exists"));
        }
        policies.insert(policy.name.clone(), policy.clone());
        Ok(policy.clone())
    }

    async fn get(&self, name: &str) -> Result<Policy, PolicyClientError> {
        self.stored(name).ok_or_else(not_found)
    }

    async fn update(&self, name: &str, policy: &Policy) -> Result<Policy, PolicyClientError> {
        let mut policies = self.policies.lock().unwrap();
        let slot = policies.get_mut(name).ok_or_else(not_found)?;
        slot.policy = policy.policy.clone();
        Ok(slot.clone())
    }

    async fn delete(&self, name: &str) -> Result<(), PolicyClientError> {
        self.policies
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(not_found)
    }
}

#[derive(Default)]
struct MarketplaceState {
    next_draft: usize,
    drafts: BTreeMap<String, (CreateDraftModuleInput, Option<ModuleSource>)>,
    approved: BTreeMap<String, WellnessOfferingModule>,
    in_review: BTreeMap<String, WellnessOfferingModule>,
}

/// Marketplace that approves test modules on publish and keeps every other
/// module under review.
#[derive(Default)]
pub struct InMemoryMarketplace {
    state: Mutex<MarketplaceState>,
}

impl InMemoryMarketplace {
    /// Drafts created and not yet published.
    pub fn draft_count(&self) -> usize {
        self.state.lock().unwrap().drafts.len()
    }

    pub fn approved(&self, module_id: &str) -> Option<WellnessOfferingModule> {
        self.state.lock().unwrap().approved.get(module_id).cloned()
    }

    /// Store an approved module directly, bypassing the publish flow.
    pub fn put_approved(&self, module: WellnessOfferingModule) {
        self.state
            .lock()
            .unwrap()
            .approved
            .insert(module.id.clone(), module);
    }
}

#[async_trait]
impl MarketplaceClient for InMemoryMarketplace {
    async fn create_draft_module(
        &self,
        input: &CreateDraftModuleInput,
    ) -> Result<DraftModule, ServiceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(parent) = &input.parent_module_id
            && !state.approved.contains_key(parent)
            && !state.in_review.contains_key(parent)
        {
            return Err(ServiceError::not_found(format!("module {parent}")));
        }
        state.next_draft += 1;
        let id = format!("draft-{}", state.next_draft);
        state.drafts.insert(id.clone(), (input.clone(), None));
        Ok(DraftModule { id })
    }

    async fn set_wellness_offering_draft_module_source(
        &self,
        input: &SetDraftModuleSourceInput,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        let (_, source) = state
            .drafts
            .get_mut(&input.module_id)
            .ok_or_else(|| ServiceError::not_found(format!("draft {}", input.module_id)))?;
        *source = Some(ModuleSource::WellnessOffering(input.source_info.clone()));
        Ok(())
    }

    async fn publish_module_v3(
        &self,
        input: &PublishDraftModuleInput,
    ) -> Result<PublishedModule, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let (draft, source) = state
            .drafts
            .remove(&input.module_id)
            .ok_or_else(|| ServiceError::not_found(format!("draft {}", input.module_id)))?;
        let source = source.ok_or_else(|| ServiceError::rejected("draft has no source"))?;

        let id = draft
            .parent_module_id
            .or(draft.id)
            .unwrap_or_else(|| input.module_id.clone());
        let module = WellnessOfferingModule {
            id: id.clone(),
            title: draft.title,
            description: draft.description,
            version: input.version.clone(),
            source,
        };

        if input.is_test_module {
            state.in_review.remove(&id);
            state.approved.insert(id.clone(), module);
        } else {
            state.in_review.insert(id.clone(), module);
        }
        Ok(PublishedModule {
            id,
            version: input.version.clone(),
        })
    }

    async fn get_wellness_offering_module(
        &self,
        module_id: &str,
    ) -> Result<WellnessOfferingModule, ServiceError> {
        self.approved(module_id)
            .ok_or_else(|| ServiceError::not_found(format!("module {module_id}")))
    }

    async fn get_draft_wellness_offering_module(
        &self,
        module_id: &str,
    ) -> Result<DraftWellnessOfferingModule, ServiceError> {
        let state = self.state.lock().unwrap();
        let module = state
            .in_review
            .get(module_id)
            .ok_or_else(|| ServiceError::not_found(format!("module {module_id}")))?;
        Ok(DraftWellnessOfferingModule {
            id: module.id.clone(),
            title: module.title.clone(),
            description: module.description.clone(),
            source: module.source.clone(),
        })
    }

    async fn delete_module(&self, module_id: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        let approved = state.approved.remove(module_id).is_some();
        let in_review = state.in_review.remove(module_id).is_some();
        if approved || in_review {
            Ok(())
        } else {
            Err(ServiceError::not_found(format!("module {module_id}")))
        }
    }
}

#[derive(Default)]
pub struct InMemoryAppStore {
    listings: Mutex<(usize, BTreeMap<String, AppStoreListing>)>,
}

impl InMemoryAppStore {
    pub fn stored(&self, id: &str) -> Option<AppStoreListing> {
        self.listings.lock().unwrap().1.get(id).cloned()
    }

    pub fn listing_count(&self) -> usize {
        self.listings.lock().unwrap().1.len()
    }
}

fn missing_listing(id: &str) -> ServiceError {
    ServiceError::not_found(format!("app store listing {id}"))
}

#[async_trait]
impl AppStoreClient for InMemoryAppStore {
    async fn create_app_store_listing(
        &self,
        listing: &AppStoreListing,
    ) -> Result<String, ServiceError> {
        let mut guard = self.listings.lock().unwrap();
        let (next, listings) = &mut *guard;
        *next += 1;
        let id = format!("app-{next}");
        listings.insert(id.clone(), listing.clone());
        Ok(id)
    }

    async fn get_app_store_listing(&self, id: &str) -> Result<AppStoreListing, ServiceError> {
        self.stored(id).ok_or_else(|| missing_listing(id))
    }

    async fn edit_app_store_listing(
        &self,
        id: &str,
        listing: &AppStoreListing,
    ) -> Result<(), ServiceError> {
        let mut guard = self.listings.lock().unwrap();
        let slot = guard.1.get_mut(id).ok_or_else(|| missing_listing(id))?;
        *slot = listing.clone();
        Ok(())
    }

    async fn delete_app_store_listing(&self, id: &str) -> Result<(), ServiceError> {
        self.listings
            .lock()
            .unwrap()
            .1
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| missing_listing(id))
    }
}
