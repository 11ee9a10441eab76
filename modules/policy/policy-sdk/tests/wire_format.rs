#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Whole-document wire format tests.

use policy_sdk::{
    Comparison, ComparisonType, Policy, PolicyRules, RuleExpression, RuleMap,
};
use serde_json::json;

fn sample_policy() -> Policy {
    let rules: PolicyRules = [
        (
            "readMaskedData",
            RuleExpression::RuleMappings(vec![
                RuleMap::new(
                    "user.patients",
                    Comparison::target(ComparisonType::In, "resource.subject"),
                ),
                RuleMap::new("user.id", Comparison::value(ComparisonType::Equals, "bob")),
            ]),
        ),
        (
            "writeData",
            RuleExpression::RuleMappings(vec![RuleMap::new(
                "user.groups",
                Comparison::values(ComparisonType::Subset, ["admin", "doctor"]),
            )]),
        ),
        ("readData", RuleExpression::StaticRule(true)),
    ]
    .into_iter()
    .collect();
    Policy::new("clinicians", rules)
}

#[test]
fn policy_encodes_to_documented_wire_shape() {
    let encoded = serde_json::to_value(sample_policy()).unwrap();
    assert_eq!(
        encoded,
        json!({
            "name": "clinicians",
            "policy": {
                "rules": {
                    "readData": true,
                    "readMaskedData": [
                        {"user.patients": {"comparison": "in", "target": "resource.subject"}},
                        {"user.id": {"comparison": "equals", "value": "bob"}}
                    ],
                    "writeData": [
                        {"user.groups": {"comparison": "subset", "value": ["admin", "doctor"]}}
                    ]
                }
            }
        })
    );
}

#[test]
fn policy_round_trips_through_text() {
    let policy = sample_policy();
    let text = serde_json::to_string_pretty(&policy).unwrap();
    let decoded: Policy = serde_json::from_str(&text).unwrap();
    assert_eq!(decoded, policy);
}

#[test]
fn rule_map_order_within_an_operation_is_preserved() {
    let decoded: Policy = serde_json::from_value(json!({
        "name": "ordered",
        "policy": {"rules": {"readData": [
            {"z.last": {"comparison": "exists", "value": "true"}},
            {"a.first": {"comparison": "exists", "value": "true"}}
        ]}}
    }))
    .unwrap();

    let Some(RuleExpression::RuleMappings(mappings)) = decoded.policy.rules.get("readData") else {
        panic!("expected rule mappings");
    };
    let subjects: Vec<&str> = mappings
        .iter()
        .filter_map(|m| m.comparison().map(|(subject, _)| subject))
        .collect();
    assert_eq!(subjects, ["z.last", "a.first"]);
}

#[test]
fn malformed_rule_map_rejects_the_document() {
    let result = serde_json::from_value::<Policy>(json!({
        "name": "broken",
        "policy": {"rules": {
            "readData": true,
            "writeData": [{
                "user.id": {"comparison": "equals", "value": "bob"},
                "user.name": {"comparison": "equals", "value": "Bob"}
            }]
        }}
    }));

    let err = result.unwrap_err().to_string();
    assert!(err.contains("could not parse rule mappings for operation \"writeData\""));
    assert!(err.contains("should have exactly one entry, has 2"));
}
