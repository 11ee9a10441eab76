//! Policy Module
//!
//! Manages ABAC policies on the platform API as declarative resources, along
//! with marketplace wellness offerings and app-store applets:
//!
//! - [`config`] - provider configuration (YAML file plus `LIFEOMIC_*` environment)
//! - [`domain`] - configuration schema, validation, the expand/flatten bridge and
//!   the create/read/update/delete handlers of every resource
//! - [`infra`] - HTTP transport and REST client
//! - [`module`] - wiring of the above for one API endpoint
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod module;

#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, ProviderConfig};
pub use domain::{
    AppletConfig, AppletResource, ComparisonBlock, Diagnostic, Diagnostics, DomainError,
    PolicyConfig, PolicyResource, PolicyRuleBlock, ResourceState, Severity,
    WellnessOfferingConfig, WellnessOfferingResource,
};
pub use module::PolicyModule;
