//! Conversion between resource configuration and wire policies.
//!
//! [`expand`] turns a validated [`PolicyConfig`] into a [`Policy`] for the API.
//! [`flatten`] turns a policy read back from the API into state shaped like
//! the declared configuration, so that operation order matches the user's
//! blocks and remote drift surfaces as warnings instead of silent diffs.

use std::collections::HashSet;

use policy_sdk::{Policy, PolicyDocument, RuleExpression, RuleMap};
use tracing::warn;

use super::diagnostics::{AttributePath, Diagnostics};
use super::schema::{
    COMPARISON_ATTRIBUTE, ComparisonBlock, PolicyConfig, PolicyRuleBlock, RULE_ATTRIBUTE, validate,
};

/// Build the wire policy for `config`.
///
/// # Errors
///
/// Every validation defect of `config`; nothing is sent when any exist.
pub fn expand(config: &PolicyConfig) -> Result<Policy, Diagnostics> {
    let diags = validate(config);
    if diags.has_error() {
        return Err(diags);
    }

    let rules = config
        .rule
        .iter()
        .map(|block| (block.operation.clone(), expand_rule(block)))
        .collect();
    Ok(Policy::new(config.name.clone(), rules))
}

fn expand_rule(block: &PolicyRuleBlock) -> RuleExpression {
    if let Some(allowed) = block.allowed {
        return RuleExpression::StaticRule(allowed);
    }
    RuleExpression::RuleMappings(
        block
            .comparison
            .iter()
            .filter_map(|c| {
                c.to_comparison()
                    .map(|comparison| RuleMap::new(c.subject.clone(), comparison))
            })
            .collect(),
    )
}

/// Shape `policy` after `declared`, reporting drift.
///
/// One rule block is produced per distinct operation of `declared`, in
/// declared order. Operations missing remotely become operation-only blocks;
/// remote operations absent from `declared` are dropped with a single
/// warning naming them.
pub fn flatten(declared: &PolicyConfig, policy: Policy) -> (PolicyConfig, Diagnostics) {
    let Policy {
        name,
        policy: PolicyDocument { mut rules },
    } = policy;

    let mut diags = Diagnostics::new();
    let mut blocks = Vec::with_capacity(declared.rule.len());
    let mut seen = HashSet::with_capacity(declared.rule.len());
    let base = AttributePath::root(RULE_ATTRIBUTE);

    for (i, declared_block) in declared.rule.iter().enumerate() {
        let operation = declared_block.operation.as_str();
        if !seen.insert(operation) {
            continue;
        }
        let path = base.at_index(i);
        let mut block = PolicyRuleBlock {
            operation: operation.to_owned(),
            ..PolicyRuleBlock::default()
        };

        match rules.remove(operation) {
            Some(RuleExpression::StaticRule(allowed)) => {
                if !allowed {
                    diags.add_attribute_warning(
                        path.at_name("allowed"),
                        "Static deny rule",
                        format!(
                            "The remote policy denies {operation:?} with a static false rule, \
                             which cannot be declared in configuration"
                        ),
                    );
                }
                block.allowed = Some(allowed);
            }
            Some(RuleExpression::RuleMappings(mappings)) => {
                block.comparison = flatten_rule_mappings(&path, &mappings, &mut diags);
            }
            None => {
                diags.add_attribute_warning(
                    path,
                    "Rule removed outside of configuration",
                    format!("The remote policy has no rule for operation {operation:?}"),
                );
            }
        }

        blocks.push(block);
    }

    if !rules.is_empty() {
        let leftover: Vec<&str> = rules.operations().collect();
        warn!(policy = %name, operations = ?leftover, "Remote policy has rules missing from configuration");
        diags.add_warning(
            "Detected state drift",
            format!(
                "Found rules for {leftover:?} operations that don't exist in config. \
                 These changes happened outside of this provider"
            ),
        );
    }

    let state = PolicyConfig {
        id: Some(name.clone()),
        name,
        rule: blocks,
    };
    (state, diags)
}

fn flatten_rule_mappings(
    path: &AttributePath,
    mappings: &[RuleMap],
    diags: &mut Diagnostics,
) -> Vec<ComparisonBlock> {
    let base = path.at_name(COMPARISON_ATTRIBUTE);
    mappings
        .iter()
        .enumerate()
        .filter_map(|(j, rule_map)| {
            let Some((subject, comparison)) = rule_map.comparison() else {
                diags.add_attribute_warning(
                    base.at_index(j),
                    "Malformed rule map",
                    format!(
                        "Expected exactly one subject in the remote rule map, found {}",
                        rule_map.len()
                    ),
                );
                return None;
            };
            Some(ComparisonBlock::from_comparison(subject, comparison))
        })
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use policy_sdk::{Comparison, ComparisonType, PolicyRules};
    use tracing_test::traced_test;

    use super::*;
    use crate::domain::diagnostics::Severity;

    fn declared() -> PolicyConfig {
        PolicyConfig::new(
            "clinicians",
            vec![
                PolicyRuleBlock::with_comparisons(
                    "writeData",
                    vec![
                        ComparisonBlock::values("subset", "user.groups", ["admin", "doctor"]),
                        ComparisonBlock::value("equals", "user.id", "bob"),
                    ],
                ),
                PolicyRuleBlock::allowed("readData"),
            ],
        )
    }

    #[test]
    fn expand_builds_wire_rules() {
        let policy = expand(&declared()).unwrap();

        assert_eq!(policy.name, "clinicians");
        assert_eq!(
            policy.policy.rules.get("readData"),
            Some(&RuleExpression::StaticRule(true))
        );
        assert_eq!(
            policy.policy.rules.get("writeData"),
            Some(&RuleExpression::RuleMappings(vec![
                RuleMap::new(
                    "user.groups",
                    Comparison::values(ComparisonType::Subset, ["admin", "doctor"])
                ),
                RuleMap::new("user.id", Comparison::value(ComparisonType::Equals, "bob")),
            ]))
        );
    }

    #[test]
    fn expand_refuses_invalid_config() {
        let mut config = declared();
        config.rule.push(PolicyRuleBlock::allowed("readData"));

        let diags = expand(&config).unwrap_err();
        assert!(diags.has_error());
        assert_eq!(
            diags.errors().next().map(|d| d.summary.as_str()),
            Some("Duplicate occurrence of rule for operation \"readData\"")
        );
    }

    #[test]
    fn flatten_restores_declared_order() {
        let config = declared();
        let (state, diags) = flatten(&config, expand(&config).unwrap());

        assert!(diags.is_empty(), "unexpected diagnostics: {diags}");
        assert_eq!(state.id.as_deref(), Some("clinicians"));
        assert_eq!(state.name, "clinicians");
        assert_eq!(state.rule, config.rule);
    }

    #[test]
    fn flatten_follows_declared_order_not_wire_order() {
        let config = PolicyConfig::new(
            "p",
            vec![
                PolicyRuleBlock::allowed("zeta"),
                PolicyRuleBlock::allowed("alpha"),
                PolicyRuleBlock::allowed("mu"),
            ],
        );
        let remote: Policy = serde_json::from_str(
            r#"{"name": "p", "policy": {"rules": {"mu": true, "alpha": true, "zeta": true}}}"#,
        )
        .unwrap();

        let (state, _) = flatten(&config, remote);

        let order: Vec<&str> = state.rule.iter().map(|b| b.operation.as_str()).collect();
        assert_eq!(order, ["zeta", "alpha", "mu"]);
    }

    #[test]
    fn expanded_policy_survives_the_wire() {
        let config = PolicyConfig::new(
            "admins",
            vec![PolicyRuleBlock::with_comparisons(
                "readData",
                vec![ComparisonBlock::value("includes", "user.groups", "admin")],
            )],
        );
        let policy = expand(&config).unwrap();
        assert_eq!(
            policy.policy.rules.get("readData"),
            Some(&RuleExpression::RuleMappings(vec![RuleMap::new(
                "user.groups",
                Comparison::value(ComparisonType::Includes, "admin"),
            )]))
        );

        let text = serde_json::to_string(&policy).unwrap();
        let decoded: Policy = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, policy);
    }

    #[test]
    fn operation_missing_remotely_becomes_empty_block() {
        let config = declared();
        let remote: PolicyRules = [("writeData", RuleExpression::RuleMappings(vec![]))]
            .into_iter()
            .collect();
        let (state, diags) = flatten(&config, Policy::new("clinicians", remote));

        assert_eq!(state.rule[1], PolicyRuleBlock {
            operation: "readData".to_owned(),
            ..PolicyRuleBlock::default()
        });
        let warning = diags.warnings().next().unwrap();
        assert_eq!(warning.summary, "Rule removed outside of configuration");
        assert_eq!(warning.path.as_ref().map(ToString::to_string).as_deref(), Some("rule[1]"));
        assert!(!diags.has_error());
    }

    #[test]
    fn static_deny_from_remote_is_kept_with_warning() {
        let config = PolicyConfig::new("p", vec![PolicyRuleBlock::allowed("readData")]);
        let remote: PolicyRules = [("readData", RuleExpression::StaticRule(false))]
            .into_iter()
            .collect();
        let (state, diags) = flatten(&config, Policy::new("p", remote));

        assert_eq!(state.rule[0].allowed, Some(false));
        let warning = diags.warnings().next().unwrap();
        assert_eq!(warning.summary, "Static deny rule");
        assert_eq!(
            warning.path.as_ref().map(ToString::to_string).as_deref(),
            Some("rule[0].allowed")
        );
    }

    #[test]
    fn malformed_rule_maps_are_skipped() {
        let config = PolicyConfig::new(
            "p",
            vec![PolicyRuleBlock::with_comparisons(
                "readData",
                vec![ComparisonBlock::value("equals", "user.id", "bob")],
            )],
        );
        let two_subjects: RuleMap = [
            ("user.id", Comparison::value(ComparisonType::Equals, "bob")),
            ("user.name", Comparison::value(ComparisonType::Equals, "Bob")),
        ]
        .into_iter()
        .collect();
        let remote: PolicyRules = [(
            "readData",
            RuleExpression::RuleMappings(vec![
                two_subjects,
                RuleMap::new("user.id", Comparison::value(ComparisonType::Equals, "bob")),
            ]),
        )]
        .into_iter()
        .collect();
        let (state, diags) = flatten(&config, Policy::new("p", remote));

        assert_eq!(state.rule[0].comparison, config.rule[0].comparison);
        let warning = diags.warnings().next().unwrap();
        assert_eq!(warning.summary, "Malformed rule map");
        assert_eq!(
            warning.path.as_ref().map(ToString::to_string).as_deref(),
            Some("rule[0].comparison[0]")
        );
    }

    #[traced_test]
    #[test]
    fn extra_remote_operations_produce_one_drift_warning() {
        let config = PolicyConfig::new("p", vec![PolicyRuleBlock::allowed("readData")]);
        let remote: PolicyRules = [
            ("readData", RuleExpression::StaticRule(true)),
            ("writeData", RuleExpression::StaticRule(true)),
            ("deleteData", RuleExpression::StaticRule(true)),
        ]
        .into_iter()
        .collect();
        let (state, diags) = flatten(&config, Policy::new("p", remote));

        assert_eq!(state.rule, config.rule);
        assert_eq!(diags.len(), 1);
        let warning = diags.iter().next().unwrap();
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(warning.summary, "Detected state drift");
        assert!(warning.path.is_none());
        assert!(warning.detail.contains(r#"["deleteData", "writeData"]"#));
        assert!(logs_contain("Remote policy has rules missing from configuration"));
    }

    #[test]
    fn repeated_declared_operation_is_flattened_once() {
        let config = PolicyConfig::new(
            "p",
            vec![
                PolicyRuleBlock::allowed("readData"),
                PolicyRuleBlock::allowed("readData"),
            ],
        );
        let remote: PolicyRules = [("readData", RuleExpression::StaticRule(true))]
            .into_iter()
            .collect();
        let (state, diags) = flatten(&config, Policy::new("p", remote));

        assert_eq!(state.rule.len(), 1);
        assert!(diags.is_empty());
    }
}
