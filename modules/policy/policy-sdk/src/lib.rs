#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Policy SDK
//!
//! This crate provides the public API for the `policy` module:
//!
//! - [`Policy`], [`PolicyDocument`], [`PolicyRules`] - ABAC policy documents
//! - [`RuleExpression`], [`RuleMap`], [`Comparison`] - rule building blocks
//! - [`codec`] - the polymorphic JSON wire codec behind the serde impls
//! - [`PolicyClient`], [`AccountClient`] - remote API traits
//! - [`MarketplaceClient`], [`AppStoreClient`] - marketplace and app-store RPCs
//!   behind wellness offerings and applets
//! - [`PolicyDecodeError`], [`PolicyClientError`], [`ServiceError`] - error types
//!
//! ## Usage
//!
//! ```ignore
//! use policy_sdk::{Comparison, ComparisonType, Policy, PolicyRules, RuleExpression, RuleMap};
//!
//! let mut rules = PolicyRules::new();
//! rules.insert(
//!     "readData",
//!     RuleExpression::RuleMappings(vec![RuleMap::new(
//!         "user.groups",
//!         Comparison::value(ComparisonType::Includes, "admin"),
//!     )]),
//! );
//! let policy = Policy::new("data-readers", rules);
//!
//! let created = client.create(&policy).await?;
//! ```

pub mod api;
pub mod codec;
pub mod error;
pub mod marketplace;
pub mod models;

pub use api::{AccountClient, AppStoreClient, MarketplaceClient, PolicyClient};
pub use error::{PolicyClientError, PolicyDecodeError, ServiceError};
pub use marketplace::{
    AppStoreListing, CreateDraftModuleInput, DraftModule, DraftWellnessOfferingModule,
    ModuleSource, PublishDraftModuleInput, PublishedModule, SetDraftModuleSourceInput,
    SubsidyType, WELLNESS_OFFERING_CATEGORY, WellnessOfferingModule, WellnessOfferingSource,
};
pub use models::{
    Account, Comparison, ComparisonType, ListLinks, ListOptions, MultivalueComparison, Page,
    Policy, PolicyDocument, PolicyRules, RuleExpression, RuleMap, RuleMappings, TargetComparison,
    ValueComparison,
};
