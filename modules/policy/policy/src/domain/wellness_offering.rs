//! Marketplace wellness offering resource.
//!
//! Every create or update publishes a new module version: a draft is created
//! (as a child of the current module on update), given the offering's source
//! and published. Test modules are approved on publish. Other modules wait
//! for a manual review and their state is built from the module under review.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use policy_sdk::{
    CreateDraftModuleInput, DraftWellnessOfferingModule, MarketplaceClient, ModuleSource,
    PublishDraftModuleInput, PublishedModule, SetDraftModuleSourceInput, SubsidyType,
    WELLNESS_OFFERING_CATEGORY, WellnessOfferingModule, WellnessOfferingSource,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::diagnostics::{AttributePath, Diagnostics};
use super::error::DomainError;
use super::resource::ResourceState;

/// Version of a module's first publication.
pub const INITIAL_VERSION: &str = "1.0.0";

const RESOURCE_KIND: &str = "wellness offering";

/// Declared (or recorded) state of one wellness offering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WellnessOfferingConfig {
    /// Module id, chosen by the marketplace when not declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_module_id: Option<String>,
    pub title: String,
    pub description: String,
    pub marketplace_provider: String,
    /// Computed. Published module version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub image_url: String,
    pub info_url: String,
    /// Approximate per-unit cost in USD pennies.
    pub approximate_unit_cost: i64,
    /// One of `SERVICE`, `REDEMPTION`, `LIFE_LEAGUE_PARTNER`, `LIFE_LEAGUE_PARENT`.
    pub subsidy_type: String,
    pub install_url: String,
    /// JSON document describing the offering's configuration fields.
    pub configuration_schema: String,
    pub is_enabled: bool,
    #[serde(default)]
    pub is_test_module: bool,
    /// Computed.
    #[serde(default)]
    pub is_approved: bool,
}

impl WellnessOfferingConfig {
    fn draft_input(&self, parent_module_id: Option<String>) -> CreateDraftModuleInput {
        CreateDraftModuleInput {
            category: WELLNESS_OFFERING_CATEGORY.to_owned(),
            title: self.title.clone(),
            description: self.description.clone(),
            id: self.id.clone(),
            parent_module_id,
        }
    }
}

/// `major.minor.patch` version of a published module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModuleVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ModuleVersion {
    /// The next minor version; the patch number is reset.
    #[must_use]
    pub fn next_minor(self) -> Self {
        Self {
            minor: self.minor.saturating_add(1),
            patch: 0,
            ..self
        }
    }
}

impl FromStr for ModuleVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let mut component = |name: &str| -> Result<u64, String> {
            let part = parts
                .next()
                .ok_or_else(|| format!("version {s:?} has no {name} number"))?;
            let canonical = !part.is_empty()
                && part.bytes().all(|b| b.is_ascii_digit())
                && (part == "0" || !part.starts_with('0'));
            if !canonical {
                return Err(format!("invalid {name} number {part:?} in version {s:?}"));
            }
            part.parse()
                .map_err(|e| format!("invalid {name} number {part:?} in version {s:?}: {e}"))
        };

        let version = Self {
            major: component("major")?,
            minor: component("minor")?,
            patch: component("patch")?,
        };
        if parts.next().is_some() {
            return Err(format!("version {s:?} has more than three numbers"));
        }
        Ok(version)
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Validate a wellness offering configuration, reporting every defect.
#[must_use]
pub fn validate_offering(config: &WellnessOfferingConfig) -> Diagnostics {
    let mut diags = Diagnostics::new();

    for (name, value) in [
        ("title", &config.title),
        ("description", &config.description),
        ("marketplace_provider", &config.marketplace_provider),
        ("image_url", &config.image_url),
        ("info_url", &config.info_url),
        ("install_url", &config.install_url),
    ] {
        if value.trim().is_empty() {
            diags.add_attribute_error(
                AttributePath::root(name),
                format!("{name} must not be empty"),
                "",
            );
        }
    }

    if config.approximate_unit_cost < 0 {
        diags.add_attribute_error(
            AttributePath::root("approximate_unit_cost"),
            "approximate_unit_cost must not be negative",
            "The cost is given in USD pennies",
        );
    }

    if config.subsidy_type.parse::<SubsidyType>().is_err() {
        diags.add_attribute_error(
            AttributePath::root("subsidy_type"),
            format!("Unsupported subsidy type {:?}", config.subsidy_type),
            format!("Use one of: {}", SubsidyType::SUPPORTED.join(", ")),
        );
    }

    if let Err(e) = serde_json::from_str::<serde_json::Value>(&config.configuration_schema) {
        diags.add_attribute_error(
            AttributePath::root("configuration_schema"),
            "configuration_schema must be a JSON document",
            e.to_string(),
        );
    }

    diags
}

/// Validate `plan` and build the module source it declares.
fn planned_source(plan: &WellnessOfferingConfig) -> Result<WellnessOfferingSource, DomainError> {
    let diags = validate_offering(plan);
    match plan.subsidy_type.parse::<SubsidyType>() {
        Ok(subsidy_type) if !diags.has_error() => Ok(WellnessOfferingSource {
            provider: plan.marketplace_provider.clone(),
            image_url: plan.image_url.clone(),
            info_url: plan.info_url.clone(),
            install_url: plan.install_url.clone(),
            approximate_unit_cost: plan.approximate_unit_cost,
            configuration_schema: plan.configuration_schema.clone(),
            subsidy_type,
        }),
        _ => Err(DomainError::Validation(diags)),
    }
}

/// Build state for `module`, keeping the attributes the marketplace does not
/// store from `config`.
fn settle(
    config: &WellnessOfferingConfig,
    module: WellnessOfferingModule,
    is_approved: bool,
) -> Result<ResourceState<WellnessOfferingConfig>, DomainError> {
    let source = match module.source {
        ModuleSource::WellnessOffering(source) => source,
        ModuleSource::Other { typename } => {
            let mut diags = Diagnostics::new();
            diags.add_error("expected module source to be a wellness module", typename);
            return Err(DomainError::Failed(diags));
        }
    };

    Ok(ResourceState::new(WellnessOfferingConfig {
        id: Some(module.id),
        parent_module_id: config.parent_module_id.clone(),
        title: module.title,
        description: module.description,
        marketplace_provider: source.provider,
        version: Some(module.version),
        image_url: source.image_url,
        info_url: source.info_url,
        approximate_unit_cost: source.approximate_unit_cost,
        subsidy_type: source.subsidy_type.to_string(),
        install_url: config.install_url.clone(),
        configuration_schema: source.configuration_schema,
        is_enabled: config.is_enabled,
        is_test_module: config.is_test_module,
        is_approved,
    }))
}

fn under_review(draft: DraftWellnessOfferingModule, version: &str) -> WellnessOfferingModule {
    WellnessOfferingModule {
        id: draft.id,
        title: draft.title,
        description: draft.description,
        version: version.to_owned(),
        source: draft.source,
    }
}

/// Lifecycle handlers of the wellness offering resource.
pub struct WellnessOfferingResource {
    client: Arc<dyn MarketplaceClient>,
}

impl WellnessOfferingResource {
    #[must_use]
    pub fn new(client: Arc<dyn MarketplaceClient>) -> Self {
        Self { client }
    }

    /// Check a configuration without touching the marketplace.
    #[must_use]
    pub fn validate(config: &WellnessOfferingConfig) -> Diagnostics {
        validate_offering(config)
    }

    /// Publish version 1.0.0 of the module described by `plan`.
    ///
    /// # Errors
    ///
    /// `Validation` if `plan` is invalid, `Service` if a marketplace call
    /// fails, `Failed` if the published module is not a wellness offering.
    #[instrument(skip_all, fields(title = %plan.title))]
    pub async fn create(
        &self,
        plan: &WellnessOfferingConfig,
    ) -> Result<ResourceState<WellnessOfferingConfig>, DomainError> {
        info!("Creating wellness offering module");
        let source = planned_source(plan)?;
        let input = plan.draft_input(plan.parent_module_id.clone());
        self.publish(plan, &input, source, INITIAL_VERSION.to_owned())
            .await
    }

    /// Refresh `state` from the marketplace.
    ///
    /// A module that is still under review is read from its review copy.
    /// Returns `None` when the module no longer exists.
    ///
    /// # Errors
    ///
    /// `Failed` if `state` has no id or the module is not a wellness
    /// offering, `Service` for any other marketplace failure.
    #[instrument(skip_all, fields(module = ?state.id))]
    pub async fn read(
        &self,
        state: &WellnessOfferingConfig,
    ) -> Result<Option<ResourceState<WellnessOfferingConfig>>, DomainError> {
        debug!("Reading wellness offering module");
        let id = recorded_id(state)?;

        match self.client.get_wellness_offering_module(id).await {
            Ok(module) => return settle(state, module, true).map(Some),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                return Err(DomainError::service(
                    "failed to get wellness offering module",
                    e,
                ));
            }
        }

        match self.client.get_draft_wellness_offering_module(id).await {
            Ok(draft) => {
                let version = state.version.as_deref().unwrap_or(INITIAL_VERSION);
                settle(state, under_review(draft, version), false).map(Some)
            }
            Err(e) if e.is_not_found() => {
                warn!("Wellness offering module no longer exists");
                Ok(None)
            }
            Err(e) => Err(DomainError::service(
                "failed to get draft wellness offering module",
                e,
            )),
        }
    }

    /// Publish the next minor version of the module recorded in `state`.
    ///
    /// # Errors
    ///
    /// As for [`WellnessOfferingResource::create`]; also `Failed` when the
    /// recorded version is not a `major.minor.patch` version.
    #[instrument(skip_all, fields(module = ?state.id))]
    pub async fn update(
        &self,
        plan: &WellnessOfferingConfig,
        state: &WellnessOfferingConfig,
    ) -> Result<ResourceState<WellnessOfferingConfig>, DomainError> {
        info!("Updating wellness offering module");
        let source = planned_source(plan)?;
        let id = recorded_id(state)?;

        let current = state.version.as_deref().unwrap_or_default();
        let version = current
            .parse::<ModuleVersion>()
            .map_err(|e| {
                let mut diags = Diagnostics::new();
                diags.add_error("unable to parse module version in state", e);
                DomainError::Failed(diags)
            })?
            .next_minor();

        let input = plan.draft_input(Some(id.to_owned()));
        self.publish(plan, &input, source, version.to_string()).await
    }

    /// Delete the module recorded in `state` with all of its versions.
    ///
    /// # Errors
    ///
    /// `Failed` if `state` has no id, `Service` if the deletion fails.
    #[instrument(skip_all, fields(module = ?state.id))]
    pub async fn delete(&self, state: &WellnessOfferingConfig) -> Result<(), DomainError> {
        info!("Deleting wellness offering module");
        let id = recorded_id(state)?;
        self.client
            .delete_module(id)
            .await
            .map_err(|e| DomainError::service("failed to delete wellness offering module", e))?;
        info!(title = %state.title, "Deleted wellness offering");
        Ok(())
    }

    /// Build state for an existing approved module.
    ///
    /// `parent_module_id`, `is_enabled` and `is_test_module` are not stored
    /// by the marketplace and are left at their defaults.
    ///
    /// # Errors
    ///
    /// `Service` if the module cannot be fetched, `Failed` if it is not a
    /// wellness offering.
    #[instrument(skip_all, fields(module = %id))]
    pub async fn import(
        &self,
        id: &str,
    ) -> Result<ResourceState<WellnessOfferingConfig>, DomainError> {
        info!("Importing wellness offering module");
        let module = self
            .client
            .get_wellness_offering_module(id)
            .await
            .map_err(|e| DomainError::service("failed to get wellness offering module", e))?;

        let install_url = match &module.source {
            ModuleSource::WellnessOffering(source) => source.install_url.clone(),
            ModuleSource::Other { .. } => String::new(),
        };
        let declared = WellnessOfferingConfig {
            install_url,
            ..WellnessOfferingConfig::default()
        };
        settle(&declared, module, true)
    }

    async fn publish(
        &self,
        plan: &WellnessOfferingConfig,
        input: &CreateDraftModuleInput,
        source: WellnessOfferingSource,
        version: String,
    ) -> Result<ResourceState<WellnessOfferingConfig>, DomainError> {
        let draft = self
            .client
            .create_draft_module(input)
            .await
            .map_err(|e| DomainError::service("failed to create wellness draft module", e))?;
        info!(draft = %draft.id, "Created draft module");

        self.client
            .set_wellness_offering_draft_module_source(&SetDraftModuleSourceInput {
                module_id: draft.id.clone(),
                source_info: source,
            })
            .await
            .map_err(|e| DomainError::service("failed to set source of wellness draft module", e))?;

        let published = self
            .client
            .publish_module_v3(&PublishDraftModuleInput {
                module_id: draft.id,
                version,
                is_test_module: plan.is_test_module,
            })
            .await
            .map_err(|e| DomainError::service("failed to publish wellness offering module", e))?;
        info!(module = %published.id, version = %published.version, "Published module");

        self.settle_published(plan, &published).await
    }

    async fn settle_published(
        &self,
        plan: &WellnessOfferingConfig,
        published: &PublishedModule,
    ) -> Result<ResourceState<WellnessOfferingConfig>, DomainError> {
        if plan.is_test_module {
            let module = self
                .client
                .get_wellness_offering_module(&published.id)
                .await
                .map_err(|e| {
                    DomainError::service("failed to get published wellness offering module", e)
                })?;
            return settle(plan, module, true);
        }

        let draft = self
            .client
            .get_draft_wellness_offering_module(&published.id)
            .await
            .map_err(|e| DomainError::service("failed to get draft wellness offering module", e))?;
        warn!(module = %published.id, "Module left for manual approval");

        let mut result = settle(plan, under_review(draft, &published.version), false)?;
        result.diagnostics.add_warning(
            "Module requires manual approval",
            "unable to automatically approve module. Module will be left in ready to review state and requires manual approval.",
        );
        Ok(result)
    }
}

fn recorded_id(state: &WellnessOfferingConfig) -> Result<&str, DomainError> {
    state
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DomainError::missing_id(RESOURCE_KIND))
}
