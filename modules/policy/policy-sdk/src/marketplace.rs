//! Marketplace and app-store models.
//!
//! Wellness offerings are marketplace modules: a draft is created, given a
//! wellness-offering source, then published under a semantic version. Test
//! modules are approved on publish; other modules wait for a manual review.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Draft module category of wellness offerings.
pub const WELLNESS_OFFERING_CATEGORY: &str = "WELLNESS_OFFERING";

/// How a wellness offering is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubsidyType {
    Service,
    Redemption,
    LifeLeaguePartner,
    LifeLeagueParent,
}

impl SubsidyType {
    /// Wire names of every subsidy type.
    pub const SUPPORTED: &'static [&'static str] = &[
        "SERVICE",
        "REDEMPTION",
        "LIFE_LEAGUE_PARTNER",
        "LIFE_LEAGUE_PARENT",
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Service => "SERVICE",
            Self::Redemption => "REDEMPTION",
            Self::LifeLeaguePartner => "LIFE_LEAGUE_PARTNER",
            Self::LifeLeagueParent => "LIFE_LEAGUE_PARENT",
        }
    }
}

impl FromStr for SubsidyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SERVICE" => Ok(Self::Service),
            "REDEMPTION" => Ok(Self::Redemption),
            "LIFE_LEAGUE_PARTNER" => Ok(Self::LifeLeaguePartner),
            "LIFE_LEAGUE_PARENT" => Ok(Self::LifeLeagueParent),
            other => Err(format!("unknown subsidy type {other:?}")),
        }
    }
}

impl fmt::Display for SubsidyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input of `CreateDraftModule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraftModuleInput {
    pub category: String,
    pub title: String,
    pub description: String,
    /// Requested module id; the service picks one when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Module this draft is a new version of.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_module_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftModule {
    pub id: String,
}

/// Source info of a wellness offering module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessOfferingSource {
    pub provider: String,
    pub image_url: String,
    pub info_url: String,
    pub install_url: String,
    /// Approximate per-unit cost in USD pennies.
    pub approximate_unit_cost: i64,
    /// JSON document describing the offering's configuration fields.
    pub configuration_schema: String,
    pub subsidy_type: SubsidyType,
}

/// Input of `SetWellnessOfferingDraftModuleSource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDraftModuleSourceInput {
    pub module_id: String,
    pub source_info: WellnessOfferingSource,
}

/// Input of `PublishModuleV3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishDraftModuleInput {
    pub module_id: String,
    pub version: String,
    pub is_test_module: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedModule {
    pub id: String,
    pub version: String,
}

/// Source of a marketplace module, keyed by its GraphQL type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    WellnessOffering(WellnessOfferingSource),
    Other { typename: String },
}

impl ModuleSource {
    #[must_use]
    pub fn typename(&self) -> &str {
        match self {
            Self::WellnessOffering(_) => "WellnessOffering",
            Self::Other { typename } => typename,
        }
    }
}

/// A published wellness offering module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellnessOfferingModule {
    pub id: String,
    pub title: String,
    pub description: String,
    pub version: String,
    pub source: ModuleSource,
}

/// A wellness offering module awaiting review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftWellnessOfferingModule {
    pub id: String,
    pub title: String,
    pub description: String,
    pub source: ModuleSource,
}

/// An app-store listing (applet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStoreListing {
    pub name: String,
    pub description: String,
    pub author_display: String,
    pub image: String,
    pub url: String,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn subsidy_types_parse_from_wire_names() {
        for name in SubsidyType::SUPPORTED {
            let parsed: SubsidyType = name.parse().unwrap();
            assert_eq!(parsed.as_str(), *name);
            assert_eq!(
                serde_json::to_value(parsed).unwrap(),
                serde_json::Value::from(*name)
            );
        }
        assert!("service".parse::<SubsidyType>().is_err());
    }

    #[test]
    fn draft_input_omits_unset_ids() {
        let input = CreateDraftModuleInput {
            category: WELLNESS_OFFERING_CATEGORY.to_owned(),
            title: "Yoga".to_owned(),
            description: "Classes".to_owned(),
            id: None,
            parent_module_id: Some("m-1".to_owned()),
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            serde_json::json!({
                "category": "WELLNESS_OFFERING",
                "title": "Yoga",
                "description": "Classes",
                "parentModuleId": "m-1"
            })
        );
    }
}
