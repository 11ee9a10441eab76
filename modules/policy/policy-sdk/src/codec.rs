//! JSON wire codec for policy rules.
//!
//! The wire format has no discriminator fields: an operation rule is either
//! a bare boolean or an array of rule maps, and a comparison is told apart by
//! which keys it carries and by the JSON type of its `value`. Decoding is
//! therefore done in two phases. The payload is first parsed into a generic
//! [`serde_json::Value`] tree, then each node is inspected and turned into
//! the typed model. Everything outside this module only ever sees the typed
//! enums.
//!
//! The serde impls of [`Comparison`], [`RuleMap`], [`RuleExpression`] and
//! [`PolicyRules`] delegate here, so `serde_json::from_str::<Policy>` applies
//! the same rules as the explicit `from_json` constructors.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::PolicyDecodeError;
use crate::models::{
    Comparison, ComparisonType, MultivalueComparison, PolicyRules, RuleExpression, RuleMap,
    RuleMappings, TargetComparison, ValueComparison,
};

const COMPARISON_KEY: &str = "comparison";
const VALUE_KEY: &str = "value";
const TARGET_KEY: &str = "target";

/// Name of the JSON type of `value`, as used in decode error messages.
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expect_object<'a>(
    value: &'a Value,
    expected: &'static str,
) -> Result<&'a Map<String, Value>, PolicyDecodeError> {
    value.as_object().ok_or(PolicyDecodeError::NotAnObject {
        expected,
        found: json_type_name(value),
    })
}

impl Comparison {
    /// Decode a comparison object.
    ///
    /// `value` holding a string selects [`Comparison::Value`], `value`
    /// holding anything else selects [`Comparison::Multivalue`], otherwise a
    /// `target` key selects [`Comparison::Target`].
    ///
    /// A missing or `null` `comparison` tag decodes as an empty
    /// [`ComparisonType::Other`]. A `null` operand decodes as an empty list
    /// or an empty target.
    ///
    /// # Errors
    ///
    /// - `MalformedComparison` when neither `value` nor `target` is present
    /// - `InvalidComparison` when the keys are present but ill-typed
    /// - `NotAnObject` when `value` is not a JSON object
    pub fn from_json(value: &Value) -> Result<Self, PolicyDecodeError> {
        let object = expect_object(value, "comparison")?;

        if let Some(raw) = object.get(VALUE_KEY) {
            let comparison_type = comparison_type(object)?;
            return match raw {
                Value::String(value) => Ok(Self::Value(ValueComparison {
                    comparison_type,
                    value: value.clone(),
                })),
                Value::Array(items) => {
                    let values = items
                        .iter()
                        .map(|item| {
                            item.as_str().map(str::to_owned).ok_or_else(|| {
                                PolicyDecodeError::invalid_comparison(format!(
                                    "\"value\" array elements must be strings, got {}",
                                    json_type_name(item)
                                ))
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Self::Multivalue(MultivalueComparison {
                        comparison_type,
                        values,
                    }))
                }
                Value::Null => Ok(Self::Multivalue(MultivalueComparison {
                    comparison_type,
                    values: Vec::new(),
                })),
                other => Err(PolicyDecodeError::invalid_comparison(format!(
                    "\"value\" must be a string or an array of strings, got {}",
                    json_type_name(other)
                ))),
            };
        }

        if let Some(raw) = object.get(TARGET_KEY) {
            let comparison_type = comparison_type(object)?;
            let target = match raw {
                Value::String(target) => target.clone(),
                Value::Null => String::new(),
                other => {
                    return Err(PolicyDecodeError::invalid_comparison(format!(
                        "\"target\" must be a string, got {}",
                        json_type_name(other)
                    )));
                }
            };
            return Ok(Self::Target(TargetComparison {
                comparison_type,
                target,
            }));
        }

        Err(PolicyDecodeError::MalformedComparison)
    }

    /// Encode into the wire object accepted by [`Comparison::from_json`].
    #[must_use]
    pub fn to_json(&self) -> Value {
        let (comparison_type, key, operand) = match self {
            Self::Value(c) => (&c.comparison_type, VALUE_KEY, Value::from(c.value.clone())),
            Self::Multivalue(c) => (
                &c.comparison_type,
                VALUE_KEY,
                Value::from(c.values.clone()),
            ),
            Self::Target(c) => (
                &c.comparison_type,
                TARGET_KEY,
                Value::from(c.target.clone()),
            ),
        };

        let mut object = Map::with_capacity(2);
        object.insert(
            COMPARISON_KEY.to_owned(),
            Value::from(comparison_type.as_str()),
        );
        object.insert(key.to_owned(), operand);
        Value::Object(object)
    }
}

fn comparison_type(object: &Map<String, Value>) -> Result<ComparisonType, PolicyDecodeError> {
    match object.get(COMPARISON_KEY) {
        Some(Value::String(name)) => Ok(ComparisonType::from(name.as_str())),
        None | Some(Value::Null) => Ok(ComparisonType::Other(String::new())),
        Some(other) => Err(PolicyDecodeError::invalid_comparison(format!(
            "\"comparison\" must be a string, got {}",
            json_type_name(other)
        ))),
    }
}

impl RuleMap {
    /// Decode a single-subject rule map.
    ///
    /// # Errors
    ///
    /// - `RuleMapArity` unless the object has exactly one key
    /// - any [`Comparison::from_json`] error for the sole value
    pub fn from_json(value: &Value) -> Result<Self, PolicyDecodeError> {
        let object = expect_object(value, "rule map")?;
        if object.len() != 1 {
            return Err(PolicyDecodeError::RuleMapArity {
                entries: object.len(),
            });
        }

        let mut entries = object.iter();
        let Some((subject, raw)) = entries.next() else {
            return Err(PolicyDecodeError::RuleMapArity { entries: 0 });
        };
        Ok(Self::new(subject.clone(), Comparison::from_json(raw)?))
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries()
                .map(|(subject, comparison)| (subject.to_owned(), comparison.to_json()))
                .collect(),
        )
    }
}

impl RuleExpression {
    /// Decode the rule of `operation`, inferring the variant from the JSON
    /// type of `value`.
    ///
    /// # Errors
    ///
    /// - `UnexpectedRuleType` for anything but a boolean or an array
    /// - `RuleMappings` wrapping the first rule map that fails to decode
    pub fn from_json(operation: &str, value: &Value) -> Result<Self, PolicyDecodeError> {
        match value {
            Value::Bool(allowed) => Ok(Self::StaticRule(*allowed)),
            Value::Array(items) => items
                .iter()
                .map(RuleMap::from_json)
                .collect::<Result<RuleMappings, _>>()
                .map(Self::RuleMappings)
                .map_err(|e| PolicyDecodeError::rule_mappings(operation, e)),
            other => Err(PolicyDecodeError::UnexpectedRuleType {
                operation: operation.to_owned(),
                type_name: json_type_name(other),
            }),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::StaticRule(allowed) => Value::Bool(*allowed),
            Self::RuleMappings(mappings) => {
                Value::Array(mappings.iter().map(RuleMap::to_json).collect())
            }
        }
    }
}

impl PolicyRules {
    /// Decode an operation to rule object. The first failing operation
    /// aborts the decode.
    ///
    /// # Errors
    ///
    /// - `NotAnObject` when `value` is not a JSON object
    /// - any [`RuleExpression::from_json`] error
    pub fn from_json(value: &Value) -> Result<Self, PolicyDecodeError> {
        expect_object(value, "policy rules")?
            .iter()
            .map(|(operation, raw)| {
                RuleExpression::from_json(operation, raw).map(|rule| (operation.clone(), rule))
            })
            .collect()
    }

    /// Parse and decode a raw JSON rules payload.
    ///
    /// # Errors
    ///
    /// - `Json` when `bytes` is not valid JSON
    /// - any [`PolicyRules::from_json`] error
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PolicyDecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_json(&value)
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(operation, rule)| (operation.clone(), rule.to_json()))
                .collect(),
        )
    }
}

impl Serialize for Comparison {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(c) => c.serialize(serializer),
            Self::Multivalue(c) => c.serialize(serializer),
            Self::Target(c) => c.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Comparison {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(D::Error::custom)
    }
}

impl Serialize for RuleMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries())
    }
}

impl<'de> Deserialize<'de> for RuleMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(D::Error::custom)
    }
}

impl Serialize for RuleExpression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::StaticRule(allowed) => serializer.serialize_bool(*allowed),
            Self::RuleMappings(mappings) => mappings.serialize(serializer),
        }
    }
}

impl Serialize for PolicyRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for PolicyRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(D::Error::custom)
    }
}
