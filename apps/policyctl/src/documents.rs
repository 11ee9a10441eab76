//! Reading and writing configuration and state files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use policy::PolicyConfig;

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Load a policy configuration; `.json` files are JSON, anything else YAML.
pub fn load_config(path: &Path) -> Result<PolicyConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = if is_json(path) {
        serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))?
    } else {
        serde_saphyr::from_str(&text).with_context(|| format!("invalid YAML in {}", path.display()))?
    };
    Ok(config)
}

/// Load recorded state, `None` if the state file does not exist.
pub fn load_state(path: &Path) -> Result<Option<PolicyConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read state {}", path.display()))?;
    let state = serde_json::from_str(&text)
        .with_context(|| format!("invalid state file {}", path.display()))?;
    Ok(Some(state))
}

pub fn require_state(path: &Path) -> Result<PolicyConfig> {
    load_state(path)?.with_context(|| format!("no state recorded at {}", path.display()))
}

pub fn save_state(path: &Path, state: &PolicyConfig) -> Result<()> {
    let text = serde_json::to_string_pretty(state)?;
    fs::write(path, text + "\n")
        .with_context(|| format!("failed to write state {}", path.display()))
}

pub fn remove_state(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("failed to remove state {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use policy::PolicyRuleBlock;

    use super::*;

    #[test]
    fn yaml_and_json_configs_load_alike() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("readers.yaml");
        fs::write(
            &yaml,
            "name: readers\nrule:\n  - operation: readData\n    allowed: true\n",
        )
        .unwrap();
        let json = dir.path().join("readers.json");
        fs::write(
            &json,
            r#"{"name": "readers", "rule": [{"operation": "readData", "allowed": true}]}"#,
        )
        .unwrap();

        let expected = PolicyConfig::new("readers", vec![PolicyRuleBlock::allowed("readData")]);
        assert_eq!(load_config(&yaml).unwrap(), expected);
        assert_eq!(load_config(&json).unwrap(), expected);
    }

    #[test]
    fn unknown_config_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo.json");
        fs::write(&path, r#"{"name": "p", "rules": []}"#).unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn state_round_trips_and_can_be_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        assert!(load_state(&path).unwrap().is_none());
        assert!(require_state(&path).is_err());

        let state = PolicyConfig {
            id: Some("readers".to_owned()),
            ..PolicyConfig::new("readers", vec![PolicyRuleBlock::allowed("readData")])
        };
        save_state(&path, &state).unwrap();
        assert_eq!(require_state(&path).unwrap(), state);

        remove_state(&path).unwrap();
        assert!(!path.exists());
    }
}
