//! Configuration surface of the policy resource and its validation.
//!
//! A [`PolicyConfig`] is what a user writes: a name plus an ordered list of
//! `rule` blocks, each either a static grant (`allowed = true`) or a list of
//! `comparison` blocks. Validation collects every problem into
//! [`Diagnostics`] instead of stopping at the first one.

use std::collections::HashMap;

use policy_sdk::{Comparison, ComparisonType};
use serde::{Deserialize, Serialize};

use super::diagnostics::{AttributePath, Diagnostics};

pub const RULE_ATTRIBUTE: &str = "rule";
pub const COMPARISON_ATTRIBUTE: &str = "comparison";

/// Declared (or recorded) state of one policy resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Computed. Always equal to `name` once the policy exists remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub rule: Vec<PolicyRuleBlock>,
}

impl PolicyConfig {
    pub fn new(name: impl Into<String>, rule: Vec<PolicyRuleBlock>) -> Self {
        Self {
            id: None,
            name: name.into(),
            rule,
        }
    }
}

/// One `rule` block: the rule for a single operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRuleBlock {
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comparison: Vec<ComparisonBlock>,
}

impl PolicyRuleBlock {
    /// A static grant for `operation`.
    pub fn allowed(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            allowed: Some(true),
            comparison: Vec::new(),
        }
    }

    /// A conditional grant for `operation`.
    pub fn with_comparisons(operation: impl Into<String>, comparison: Vec<ComparisonBlock>) -> Self {
        Self {
            operation: operation.into(),
            allowed: None,
            comparison,
        }
    }
}

/// One `comparison` block. Exactly one operand must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparisonBlock {
    #[serde(rename = "type")]
    pub comparison_type: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl ComparisonBlock {
    pub fn value(
        comparison_type: impl Into<String>,
        subject: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            comparison_type: comparison_type.into(),
            subject: subject.into(),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn values<I, S>(comparison_type: impl Into<String>, subject: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            comparison_type: comparison_type.into(),
            subject: subject.into(),
            values: Some(values.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn target(
        comparison_type: impl Into<String>,
        subject: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            comparison_type: comparison_type.into(),
            subject: subject.into(),
            target: Some(target.into()),
            ..Self::default()
        }
    }

    /// Block describing `comparison` on `subject`.
    pub fn from_comparison(subject: &str, comparison: &Comparison) -> Self {
        let comparison_type = comparison.comparison_type().as_str();
        match comparison {
            Comparison::Value(c) => Self::value(comparison_type, subject, c.value.clone()),
            Comparison::Multivalue(c) => Self::values(comparison_type, subject, c.values.clone()),
            Comparison::Target(c) => Self::target(comparison_type, subject, c.target.clone()),
        }
    }

    /// The wire comparison for this block, `None` when no operand is set.
    ///
    /// When several operands are set `value` wins over `target`, which wins
    /// over `values`; validation rejects such blocks before they get here.
    #[must_use]
    pub fn to_comparison(&self) -> Option<Comparison> {
        let comparison_type = ComparisonType::from(self.comparison_type.as_str());
        if let Some(value) = &self.value {
            Some(Comparison::value(comparison_type, value.clone()))
        } else if let Some(target) = &self.target {
            Some(Comparison::target(comparison_type, target.clone()))
        } else {
            self.values
                .as_ref()
                .map(|values| Comparison::values(comparison_type, values.iter().cloned()))
        }
    }

    /// Names of the operands that are set. An empty `values` list counts.
    fn set_operands(&self) -> Vec<&'static str> {
        let mut set = Vec::with_capacity(3);
        if self.value.is_some() {
            set.push("value");
        }
        if self.values.is_some() {
            set.push("values");
        }
        if self.target.is_some() {
            set.push("target");
        }
        set
    }
}

/// Walk `rules` in declared order, calling `visit` for every well-formed block.
///
/// A block is skipped with an error when its operation repeats an earlier
/// well-formed block, when it sets both or neither of `allowed` and
/// `comparison`, or when it sets `allowed = false`.
pub fn walk_rule_blocks<'a>(
    base: &AttributePath,
    rules: &'a [PolicyRuleBlock],
    mut visit: impl FnMut(usize, &'a PolicyRuleBlock),
) -> Diagnostics {
    let mut diags = Diagnostics::new();
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(rules.len());

    for (i, rule) in rules.iter().enumerate() {
        let path = base.at_index(i);
        let operation = rule.operation.as_str();

        if let Some(first) = seen.get(operation) {
            diags.add_attribute_error(
                path,
                format!("Duplicate occurrence of rule for operation {operation:?}"),
                format!("Consolidate {operation:?} rules with block at index {first}"),
            );
            continue;
        }

        if rule.comparison.is_empty() == rule.allowed.is_none() {
            diags.add_attribute_error(path, "Exactly one of comparison and allowed should be set", "");
            continue;
        }

        if rule.allowed == Some(false) {
            diags.add_attribute_error(
                path.at_name("allowed"),
                "allowed must either be true or null",
                "Remove the rule block to deny the operation",
            );
            continue;
        }

        seen.insert(operation, i);
        visit(i, rule);
    }

    diags
}

/// Validate the comparison blocks of one rule block.
pub fn validate_comparisons(base: &AttributePath, comparisons: &[ComparisonBlock]) -> Diagnostics {
    let mut diags = Diagnostics::new();

    for (i, comparison) in comparisons.iter().enumerate() {
        let path = base.at_index(i);

        let set = comparison.set_operands();
        if set.len() != 1 {
            let detail = if set.is_empty() {
                "None of [value, values, target] are set".to_owned()
            } else {
                format!("Unset one of [{}]", set.join(", "))
            };
            diags.add_attribute_error(
                path.clone(),
                "Exactly one of value, values, or target must be set",
                detail,
            );
        }

        if !ComparisonType::from(comparison.comparison_type.as_str()).is_supported() {
            diags.add_attribute_error(
                path.at_name("type"),
                format!("Unsupported comparison type {:?}", comparison.comparison_type),
                format!("Use one of: {}", ComparisonType::SUPPORTED.join(", ")),
            );
        }
    }

    diags
}

/// Validate a whole configuration, reporting every defect.
#[must_use]
pub fn validate(config: &PolicyConfig) -> Diagnostics {
    let mut diags = Diagnostics::new();

    if config.name.trim().is_empty() {
        diags.add_attribute_error(AttributePath::root("name"), "name must not be empty", "");
    }

    let base = AttributePath::root(RULE_ATTRIBUTE);
    diags.append(walk_rule_blocks(&base, &config.rule, |_, _| {}));
    for (i, rule) in config.rule.iter().enumerate() {
        let path = base.at_index(i).at_name(COMPARISON_ATTRIBUTE);
        diags.append(validate_comparisons(&path, &rule.comparison));
    }

    diags
}
