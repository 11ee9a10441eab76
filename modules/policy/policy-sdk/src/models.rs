//! Domain models for the policy module.
//!
//! Follows the platform ABAC syntax: a policy maps operations to rules, a
//! rule is either a static boolean or a list of attribute comparisons that
//! must all hold.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::PolicyClientError;

/// ABAC comparison type.
///
/// Unknown type strings are kept verbatim in [`ComparisonType::Other`] so
/// that policies fetched from the API always decode; only user-authored
/// configuration is checked against the supported set.
///
/// Equality and hashing go by wire name, so `Other("equals")` is equal to
/// [`ComparisonType::Equals`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComparisonType {
    Equals,
    NotEquals,
    Includes,
    NotIncludes,
    In,
    NotIn,
    Exists,
    Superset,
    Subset,
    StartsWith,
    PrefixOf,
    EndsWith,
    SuffixOf,
    /// A type string outside the supported set.
    Other(String),
}

impl ComparisonType {
    /// Wire names of every supported comparison type.
    pub const SUPPORTED: &'static [&'static str] = &[
        "equals",
        "notEquals",
        "includes",
        "notIncludes",
        "in",
        "notIn",
        "exists",
        "superset",
        "subset",
        "startsWith",
        "prefixOf",
        "endsWith",
        "suffixOf",
    ];

    /// The wire name of this comparison type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "notEquals",
            Self::Includes => "includes",
            Self::NotIncludes => "notIncludes",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Exists => "exists",
            Self::Superset => "superset",
            Self::Subset => "subset",
            Self::StartsWith => "startsWith",
            Self::PrefixOf => "prefixOf",
            Self::EndsWith => "endsWith",
            Self::SuffixOf => "suffixOf",
            Self::Other(name) => name,
        }
    }

    /// Whether this is one of the [`ComparisonType::SUPPORTED`] types.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        Self::SUPPORTED.contains(&self.as_str())
    }
}

impl PartialEq for ComparisonType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for ComparisonType {}

impl Hash for ComparisonType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl From<&str> for ComparisonType {
    fn from(name: &str) -> Self {
        match name {
            "equals" => Self::Equals,
            "notEquals" => Self::NotEquals,
            "includes" => Self::Includes,
            "notIncludes" => Self::NotIncludes,
            "in" => Self::In,
            "notIn" => Self::NotIn,
            "exists" => Self::Exists,
            "superset" => Self::Superset,
            "subset" => Self::Subset,
            "startsWith" => Self::StartsWith,
            "prefixOf" => Self::PrefixOf,
            "endsWith" => Self::EndsWith,
            "suffixOf" => Self::SuffixOf,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for ComparisonType {
    fn from(name: String) -> Self {
        match Self::from(name.as_str()) {
            Self::Other(_) => Self::Other(name),
            known => known,
        }
    }
}

impl From<ComparisonType> for String {
    fn from(value: ComparisonType) -> Self {
        match value {
            ComparisonType::Other(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison between an attribute and a single value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueComparison {
    #[serde(rename = "comparison")]
    pub comparison_type: ComparisonType,
    pub value: String,
}

/// Comparison between an attribute and a list of values.
///
/// Serialized under the `value` key, like [`ValueComparison`]; the JSON type
/// of that key is what tells the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultivalueComparison {
    #[serde(rename = "comparison")]
    pub comparison_type: ComparisonType,
    #[serde(rename = "value")]
    pub values: Vec<String>,
}

/// Comparison between an attribute and another attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetComparison {
    #[serde(rename = "comparison")]
    pub comparison_type: ComparisonType,
    pub target: String,
}

/// A single ABAC comparison.
///
/// Serde impls live in [`crate::codec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Value(ValueComparison),
    Multivalue(MultivalueComparison),
    Target(TargetComparison),
}

impl Comparison {
    pub fn value(comparison_type: ComparisonType, value: impl Into<String>) -> Self {
        Self::Value(ValueComparison {
            comparison_type,
            value: value.into(),
        })
    }

    pub fn values<I, S>(comparison_type: ComparisonType, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Multivalue(MultivalueComparison {
            comparison_type,
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn target(comparison_type: ComparisonType, target: impl Into<String>) -> Self {
        Self::Target(TargetComparison {
            comparison_type,
            target: target.into(),
        })
    }

    #[must_use]
    pub fn comparison_type(&self) -> &ComparisonType {
        match self {
            Self::Value(c) => &c.comparison_type,
            Self::Multivalue(c) => &c.comparison_type,
            Self::Target(c) => &c.comparison_type,
        }
    }
}

/// Maps an attribute (the subject, e.g. `user.id`) to a comparison.
///
/// A well-formed rule map has exactly one entry; the decoder rejects any
/// other arity. Maps built in code may still hold zero or several entries,
/// which is why [`RuleMap::comparison`] returns an `Option`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleMap(BTreeMap<String, Comparison>);

impl RuleMap {
    /// Create a single-entry rule map.
    pub fn new(subject: impl Into<String>, comparison: Comparison) -> Self {
        let mut map = BTreeMap::new();
        map.insert(subject.into(), comparison);
        Self(map)
    }

    /// The subject/comparison pair of a well-formed rule map, `None` for
    /// malformed ones.
    #[must_use]
    pub fn comparison(&self) -> Option<(&str, &Comparison)> {
        if self.0.len() != 1 {
            return None;
        }
        self.0.iter().next().map(|(s, c)| (s.as_str(), c))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Comparison)> {
        self.0.iter().map(|(s, c)| (s.as_str(), c))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Comparison)> for RuleMap {
    fn from_iter<I: IntoIterator<Item = (S, Comparison)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(s, c)| (s.into(), c)).collect())
    }
}

/// Comparisons evaluated as a logical AND.
pub type RuleMappings = Vec<RuleMap>;

/// The rule governing one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleExpression {
    /// Allow (or deny) the operation unconditionally. Only `true` is
    /// supported by the policy service; `false` still decodes.
    StaticRule(bool),
    /// Allow the operation when every comparison holds.
    RuleMappings(RuleMappings),
}

/// Operation name to rule mapping.
///
/// Kept sorted so encoding is deterministic. Declaration order is a concern
/// of the configuration layer, not of the wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyRules(BTreeMap<String, RuleExpression>);

impl PolicyRules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rule for `operation`, returning the one it replaced.
    pub fn insert(
        &mut self,
        operation: impl Into<String>,
        rule: RuleExpression,
    ) -> Option<RuleExpression> {
        self.0.insert(operation.into(), rule)
    }

    #[must_use]
    pub fn get(&self, operation: &str) -> Option<&RuleExpression> {
        self.0.get(operation)
    }

    pub fn remove(&mut self, operation: &str) -> Option<RuleExpression> {
        self.0.remove(operation)
    }

    /// Operation names in sorted order.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, RuleExpression> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, RuleExpression)> for PolicyRules {
    fn from_iter<I: IntoIterator<Item = (S, RuleExpression)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(s, r)| (s.into(), r)).collect())
    }
}

impl IntoIterator for PolicyRules {
    type Item = (String, RuleExpression);
    type IntoIter = btree_map::IntoIter<String, RuleExpression>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PolicyRules {
    type Item = (&'a String, &'a RuleExpression);
    type IntoIter = btree_map::Iter<'a, String, RuleExpression>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An ABAC policy document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub rules: PolicyRules,
}

/// A named ABAC policy, the unit of persistence.
///
/// The name is the remote identifier and never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub policy: PolicyDocument,
}

impl Policy {
    pub fn new(name: impl Into<String>, rules: PolicyRules) -> Self {
        Self {
            name: name.into(),
            policy: PolicyDocument { rules },
        }
    }
}

/// A platform account visible to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub owner: String,
}

/// Parameters of a paginated list request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// Links attached to a list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListLinks {
    #[serde(rename = "self", default)]
    pub self_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token of the following page, `None` on the last page.
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        self.next_page_token.is_some()
    }

    /// Options requesting the page after this one.
    ///
    /// # Errors
    ///
    /// [`PolicyClientError::NoNextPage`] on the last page.
    pub fn next_options(&self, current: &ListOptions) -> Result<ListOptions, PolicyClientError> {
        let token = self
            .next_page_token
            .clone()
            .ok_or(PolicyClientError::NoNextPage)?;
        Ok(ListOptions {
            next_page_token: Some(token),
            page_size: current.page_size,
        })
    }
}
