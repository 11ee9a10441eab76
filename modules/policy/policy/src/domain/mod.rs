//! Domain layer of the policy module.

pub mod applet;
pub mod bridge;
pub mod diagnostics;
pub mod error;
pub mod resource;
pub mod schema;
pub mod wellness_offering;

pub use applet::{AppletConfig, AppletResource, validate_applet};
pub use bridge::{expand, flatten};
pub use diagnostics::{AttributePath, Diagnostic, Diagnostics, Severity};
pub use error::DomainError;
pub use resource::{PolicyResource, ResourceState};
pub use schema::{ComparisonBlock, PolicyConfig, PolicyRuleBlock, validate};
pub use wellness_offering::{
    ModuleVersion, WellnessOfferingConfig, WellnessOfferingResource, validate_offering,
};
