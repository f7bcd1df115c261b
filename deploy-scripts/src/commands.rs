//! Implementations of the various deploy scripts

use std::path::Path;

use itertools::Itertools;

use crate::{
    artifacts::ArtifactProvider,
    cli::{DeployAllArgs, RewardContractArgs, StakingContractArgs},
    driver::{format_value, run_deployments},
    errors::ScriptError,
    provisioner::ContractSpec,
    proxy::ProxyUpgrades,
};

/// Deploy, or attach to, the reward contract
pub async fn deploy_reward_contract(
    args: RewardContractArgs,
    artifacts: &impl ArtifactProvider,
    deployer: &impl ProxyUpgrades,
    deployments_path: &Path,
) -> Result<(), ScriptError> {
    deploy_contracts(&[args.spec()], artifacts, deployer, deployments_path).await
}

/// Deploy, or attach to, the staking contract
pub async fn deploy_staking_contract(
    args: StakingContractArgs,
    artifacts: &impl ArtifactProvider,
    deployer: &impl ProxyUpgrades,
    deployments_path: &Path,
) -> Result<(), ScriptError> {
    deploy_contracts(&[args.spec()], artifacts, deployer, deployments_path).await
}

/// Deploy, or attach to, every contract in dependency order
pub async fn deploy_all(
    args: DeployAllArgs,
    artifacts: &impl ArtifactProvider,
    deployer: &impl ProxyUpgrades,
    deployments_path: &Path,
) -> Result<(), ScriptError> {
    deploy_contracts(&args.specs(), artifacts, deployer, deployments_path).await
}

/// Run the given contracts through the deployment driver and print where each one lives
async fn deploy_contracts(
    specs: &[ContractSpec],
    artifacts: &impl ArtifactProvider,
    deployer: &impl ProxyUpgrades,
    deployments_path: &Path,
) -> Result<(), ScriptError> {
    let outcomes = run_deployments(specs, deployments_path, artifacts, deployer).await?;

    println!("#######################\n");
    println!("{}", outcomes.iter().join("\n"));

    for outcome in &outcomes {
        for read_back in &outcome.read_backs {
            let actual = read_back
                .actual
                .as_ref()
                .map(format_value)
                .unwrap_or_else(|| "<unavailable>".to_string());
            println!(
                "{}.{}: {} (configured: {})",
                outcome.name, read_back.method, actual, read_back.expected
            );
        }
    }

    Ok(())
}
