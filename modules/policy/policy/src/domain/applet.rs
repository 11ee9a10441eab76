//! App-store applet resource.

use std::sync::Arc;

use policy_sdk::{AppStoreClient, AppStoreListing};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::diagnostics::{AttributePath, Diagnostics};
use super::error::DomainError;
use super::resource::ResourceState;

const RESOURCE_KIND: &str = "applet";

/// Declared (or recorded) state of one app-store listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppletConfig {
    /// Computed. Listing id assigned by the app store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub author_display: String,
    pub image: String,
    pub url: String,
}

impl AppletConfig {
    fn listing(&self) -> AppStoreListing {
        AppStoreListing {
            name: self.name.clone(),
            description: self.description.clone(),
            author_display: self.author_display.clone(),
            image: self.image.clone(),
            url: self.url.clone(),
        }
    }

    fn from_listing(id: &str, listing: AppStoreListing) -> Self {
        Self {
            id: Some(id.to_owned()),
            name: listing.name,
            description: listing.description,
            author_display: listing.author_display,
            image: listing.image,
            url: listing.url,
        }
    }
}

/// Validate an applet configuration, reporting every defect.
#[must_use]
pub fn validate_applet(config: &AppletConfig) -> Diagnostics {
    let mut diags = Diagnostics::new();

    for (name, value) in [
        ("name", &config.name),
        ("description", &config.description),
        ("author_display", &config.author_display),
        ("image", &config.image),
    ] {
        if value.trim().is_empty() {
            diags.add_attribute_error(
                AttributePath::root(name),
                format!("{name} must not be empty"),
                "",
            );
        }
    }

    if let Err(e) = Url::parse(&config.url) {
        diags.add_attribute_error(
            AttributePath::root("url"),
            "url must be an absolute URL",
            e.to_string(),
        );
    }

    diags
}

/// Lifecycle handlers of the applet resource.
pub struct AppletResource {
    client: Arc<dyn AppStoreClient>,
}

impl AppletResource {
    #[must_use]
    pub fn new(client: Arc<dyn AppStoreClient>) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn validate(config: &AppletConfig) -> Diagnostics {
        validate_applet(config)
    }

    /// # Errors
    ///
    /// `Validation` if `plan` is invalid, `Service` if the app store refuses it.
    #[instrument(skip_all, fields(applet = %plan.name))]
    pub async fn create(
        &self,
        plan: &AppletConfig,
    ) -> Result<ResourceState<AppletConfig>, DomainError> {
        info!("Creating applet");
        checked(plan)?;

        let id = self
            .client
            .create_app_store_listing(&plan.listing())
            .await
            .map_err(|e| DomainError::service("failed to create app store listing", e))?;

        info!(id = %id, "Created applet");
        Ok(ResourceState::new(AppletConfig {
            id: Some(id),
            ..plan.clone()
        }))
    }

    /// Refresh `state`; `None` when the listing no longer exists.
    ///
    /// # Errors
    ///
    /// `Failed` if `state` has no id, `Service` for any other failure.
    #[instrument(skip_all, fields(applet = ?state.id))]
    pub async fn read(
        &self,
        state: &AppletConfig,
    ) -> Result<Option<ResourceState<AppletConfig>>, DomainError> {
        debug!("Reading applet");
        let id = recorded_id(state)?;
        self.fetch(id).await
    }

    /// # Errors
    ///
    /// `Validation` if `plan` is invalid, `Failed` if `state` has no id,
    /// `Service` if the app store refuses the edit.
    #[instrument(skip_all, fields(applet = ?state.id))]
    pub async fn update(
        &self,
        plan: &AppletConfig,
        state: &AppletConfig,
    ) -> Result<ResourceState<AppletConfig>, DomainError> {
        info!("Updating applet");
        checked(plan)?;
        let id = recorded_id(state)?;

        self.client
            .edit_app_store_listing(id, &plan.listing())
            .await
            .map_err(|e| DomainError::service("failed to edit app store listing", e))?;

        Ok(ResourceState::new(AppletConfig {
            id: Some(id.to_owned()),
            ..plan.clone()
        }))
    }

    /// # Errors
    ///
    /// `Failed` if `state` has no id, `Service` if the deletion fails.
    #[instrument(skip_all, fields(applet = ?state.id))]
    pub async fn delete(&self, state: &AppletConfig) -> Result<(), DomainError> {
        info!("Deleting applet");
        let id = recorded_id(state)?;
        self.client
            .delete_app_store_listing(id)
            .await
            .map_err(|e| DomainError::service("failed to delete app store listing", e))
    }

    /// Build state for the existing listing `id`.
    ///
    /// # Errors
    ///
    /// `Service` if the listing does not exist or cannot be fetched.
    #[instrument(skip_all, fields(applet = %id))]
    pub async fn import(&self, id: &str) -> Result<ResourceState<AppletConfig>, DomainError> {
        info!("Importing applet");
        let listing = self
            .client
            .get_app_store_listing(id)
            .await
            .map_err(|e| DomainError::service("failed to get app store listing", e))?;
        Ok(ResourceState::new(AppletConfig::from_listing(id, listing)))
    }

    async fn fetch(&self, id: &str) -> Result<Option<ResourceState<AppletConfig>>, DomainError> {
        match self.client.get_app_store_listing(id).await {
            Ok(listing) => Ok(Some(ResourceState::new(AppletConfig::from_listing(id, listing)))),
            Err(e) if e.is_not_found() => {
                warn!("Applet no longer exists");
                Ok(None)
            }
            Err(e) => Err(DomainError::service("failed to get app store listing", e)),
        }
    }
}

fn checked(plan: &AppletConfig) -> Result<(), DomainError> {
    let diags = validate_applet(plan);
    if diags.has_error() {
        return Err(DomainError::Validation(diags));
    }
    Ok(())
}

fn recorded_id(state: &AppletConfig) -> Result<&str, DomainError> {
    state
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DomainError::missing_id(RESOURCE_KIND))
}
