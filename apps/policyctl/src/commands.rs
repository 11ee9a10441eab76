//! Subcommand handlers.

use std::path::Path;

use anyhow::{Context, Result, bail};
use policy::domain::expand;
use policy::{
    Diagnostics, PolicyConfig, PolicyModule, PolicyResource, ProviderConfig, ResourceState,
};
use tracing::info;

use crate::documents::{load_config, load_state, remove_state, require_state, save_state};

fn connect(config: Option<&Path>) -> Result<PolicyModule> {
    let provider = ProviderConfig::load(config).context("failed to load provider configuration")?;
    PolicyModule::init(&provider).context("failed to initialize policy client")
}

fn report(diags: &Diagnostics) {
    for diagnostic in diags {
        eprintln!("{diagnostic}");
    }
}

/// Print `diags` and fail when any of them is an error.
fn check(diags: &Diagnostics) -> Result<()> {
    report(diags);
    let errors = diags.errors().count();
    if errors > 0 {
        bail!("configuration has {errors} error(s)");
    }
    Ok(())
}

fn record(path: &Path, result: &ResourceState) -> Result<()> {
    report(&result.diagnostics);
    save_state(path, &result.state)
}

pub fn validate(file: &Path) -> Result<()> {
    let config = load_config(file)?;
    check(&PolicyResource::validate(&config))?;
    println!("{}: ok", file.display());
    Ok(())
}

pub fn render(file: &Path) -> Result<()> {
    let config = load_config(file)?;
    let policy = match expand(&config) {
        Ok(policy) => policy,
        Err(diags) => return check(&diags),
    };
    println!("{}", serde_json::to_string_pretty(&policy)?);
    Ok(())
}

pub async fn apply(config: Option<&Path>, file: &Path, state_path: &Path) -> Result<()> {
    let plan = load_config(file)?;
    check(&PolicyResource::validate(&plan))?;

    let module = connect(config)?;
    let result = apply_plan(module.resource(), &plan, state_path).await?;
    println!("{}: applied", result.state.name);
    Ok(())
}

/// Create or update the remote policy for `plan` and record the new state.
///
/// A rename deletes the recorded policy and forgets its state before
/// creating the new one, so a failed create leaves nothing stale behind.
async fn apply_plan(
    resource: &PolicyResource,
    plan: &PolicyConfig,
    state_path: &Path,
) -> Result<ResourceState> {
    let result = match load_state(state_path)? {
        Some(state) if state.name == plan.name => resource.update(plan, &state).await?,
        Some(state) => {
            info!(from = %state.name, to = %plan.name, "Policy renamed; replacing");
            delete_remote(resource, &state).await?;
            remove_state(state_path)?;
            resource.create(plan).await?
        }
        None => resource.create(plan).await?,
    };
    record(state_path, &result)?;
    Ok(result)
}

/// Delete the policy recorded in `state`; `false` if it was already gone.
async fn delete_remote(resource: &PolicyResource, state: &PolicyConfig) -> Result<bool> {
    match resource.delete(state).await {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => {
            info!(policy = %state.name, "Policy already deleted");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn read(config: Option<&Path>, state_path: &Path) -> Result<()> {
    let state = require_state(state_path)?;
    let module = connect(config)?;

    if let Some(result) = module.resource().read(&state).await? {
        record(state_path, &result)?;
        println!("{}", serde_json::to_string_pretty(&result.state)?);
    } else {
        remove_state(state_path)?;
        println!("{}: no longer exists, state removed", state.name);
    }
    Ok(())
}

pub async fn delete(config: Option<&Path>, state_path: &Path) -> Result<()> {
    let state = require_state(state_path)?;
    let module = connect(config)?;

    if delete_remote(module.resource(), &state).await? {
        println!("{}: deleted", state.name);
    } else {
        println!("{}: already gone", state.name);
    }
    remove_state(state_path)
}

pub async fn import(config: Option<&Path>, name: &str, state_path: &Path) -> Result<()> {
    if load_state(state_path)?.is_some() {
        bail!("state already recorded at {}", state_path.display());
    }
    let module = connect(config)?;
    let result = module.resource().import(name).await?;
    record(state_path, &result)?;
    println!("{name}: imported");
    Ok(())
}

pub async fn list(config: Option<&Path>) -> Result<()> {
    let module = connect(config)?;
    let policies = module.policies().list_all().await?;
    for policy in &policies {
        println!("{}\t{} operation(s)", policy.name, policy.policy.rules.len());
    }
    Ok(())
}

pub async fn accounts(config: Option<&Path>) -> Result<()> {
    let module = connect(config)?;
    for account in module.accounts().list_accounts().await? {
        println!("{}\t{}", account.id, account.name);
    }
    Ok(())
}
