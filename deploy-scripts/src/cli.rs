//! Definitions of CLI arguments and commands for deploy scripts

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    artifacts::ArtifactProvider,
    commands::{deploy_all, deploy_reward_contract, deploy_staking_contract},
    constants::{
        DEFAULT_ARTIFACTS_PATH, DEFAULT_DEPLOYMENTS_PATH, LOCALHOST_RPC_URL, PROXY_ARTIFACT,
        REWARD_CONTRACT_ARTIFACT, REWARD_CONTRACT_KEY, REWARD_SPONSOR_GETTER,
        STAKING_CONTRACT_ARTIFACT, STAKING_CONTRACT_KEY,
    },
    errors::ScriptError,
    provisioner::ContractSpec,
    proxy::ProxyUpgrades,
};

/// Deploy the upgradeable contracts to a network, once.
///
/// Every input may also be given through the environment or a `.env` file.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Private key of the deployer
    #[arg(short, long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub priv_key: String,

    /// The network to deploy to
    #[arg(short, long, env = "NETWORK", value_enum, default_value = "localhost")]
    pub network: Network,

    /// Network RPC URL, required for every network but localhost
    #[arg(short, long, env = "URL")]
    pub rpc_url: Option<String>,

    /// Path to the file recording deployed contract addresses
    #[arg(short, long, env = "DEPLOYMENTS_PATH", default_value = DEFAULT_DEPLOYMENTS_PATH)]
    pub deployments_path: PathBuf,

    /// Path to the Hardhat artifacts directory
    #[arg(short, long, env = "ARTIFACTS_PATH", default_value = DEFAULT_ARTIFACTS_PATH)]
    pub artifacts_path: PathBuf,

    /// The `TransparentUpgradeableProxy` artifact, either a name in the
    /// artifacts directory or a path to a `.json` artifact file
    #[arg(long, env = "PROXY_ARTIFACT", default_value = PROXY_ARTIFACT)]
    pub proxy_artifact: String,

    /// Seconds to wait for each deployment to be confirmed.
    /// Waits indefinitely if unset
    #[arg(long, env = "CONFIRMATION_TIMEOUT_SECS")]
    pub confirmation_timeout_secs: Option<u64>,

    /// The contracts to deploy
    #[command(subcommand)]
    pub command: Command,
}

/// The networks the contracts can be deployed to
#[derive(ValueEnum, Copy, Clone, Debug)]
pub enum Network {
    /// A devnet node listening on port 8545
    Localhost,
    /// The network at the configured RPC URL
    StableNet,
}

impl Network {
    /// The RPC endpoint of the network, preferring an explicitly configured one
    pub fn rpc_url(&self, configured: Option<&str>) -> Result<String, ScriptError> {
        match (self, configured) {
            (_, Some(url)) => Ok(url.to_string()),
            (Network::Localhost, None) => Ok(LOCALHOST_RPC_URL.to_string()),
            (Network::StableNet, None) => Err(ScriptError::Config(
                "an RPC URL (`URL`) is required for stable-net".to_string(),
            )),
        }
    }
}

/// The deployable units
#[derive(Subcommand)]
pub enum Command {
    /// Deploy the reward contract
    DeployRewardContract(RewardContractArgs),
    /// Deploy the staking contract
    DeployStakingContract(StakingContractArgs),
    /// Deploy the reward contract, then the staking contract
    DeployAll(DeployAllArgs),
}

impl Command {
    /// Deploy, or attach to, the contracts targeted by the command
    pub async fn run(
        self,
        artifacts: &impl ArtifactProvider,
        deployer: &impl ProxyUpgrades,
        deployments_path: &Path,
    ) -> Result<(), ScriptError> {
        match self {
            Command::DeployRewardContract(args) => {
                deploy_reward_contract(args, artifacts, deployer, deployments_path).await
            }
            Command::DeployStakingContract(args) => {
                deploy_staking_contract(args, artifacts, deployer, deployments_path).await
            }
            Command::DeployAll(args) => {
                deploy_all(args, artifacts, deployer, deployments_path).await
            }
        }
    }
}

/// Initialization parameters of the reward contract, set through its initializer
#[derive(Args)]
pub struct RewardContractArgs {
    /// Address allowed to submit proposals
    #[arg(long, env = "PROPOSAL_AUTHORITY")]
    pub proposal_authority: String,

    /// Address allowed to review proposals
    #[arg(long, env = "REVIEW_AUTHORITY")]
    pub review_authority: String,

    /// Address funding the rewards
    #[arg(long, env = "REWARD_SPONSOR")]
    pub reward_sponsor: String,
}

impl RewardContractArgs {
    /// The deployment configuration of the reward contract.
    ///
    /// The sponsor is read back once the contract is provisioned.
    pub fn spec(&self) -> ContractSpec {
        ContractSpec::with_initializer(
            REWARD_CONTRACT_KEY,
            REWARD_CONTRACT_ARTIFACT,
            vec![
                self.proposal_authority.clone().into(),
                self.review_authority.clone().into(),
                self.reward_sponsor.clone().into(),
            ],
        )
        .with_read_back(REWARD_SPONSOR_GETTER, self.reward_sponsor.clone())
    }
}

/// Initialization parameters of the staking contract.
///
/// The token is immutable, so it is passed to the constructor rather than
/// occupying a proxy storage slot.
#[derive(Args)]
pub struct StakingContractArgs {
    /// Address of the staked token
    #[arg(long, env = "TOKEN_ADDRESS")]
    pub token_address: String,
}

impl StakingContractArgs {
    /// The deployment configuration of the staking contract
    pub fn spec(&self) -> ContractSpec {
        ContractSpec::with_constructor(
            STAKING_CONTRACT_KEY,
            STAKING_CONTRACT_ARTIFACT,
            vec![self.token_address.clone().into()],
        )
    }
}

/// Initialization parameters of every contract
#[derive(Args)]
pub struct DeployAllArgs {
    /// Reward contract parameters
    #[command(flatten)]
    pub reward: RewardContractArgs,

    /// Staking contract parameters
    #[command(flatten)]
    pub staking: StakingContractArgs,
}

impl DeployAllArgs {
    /// The contracts to deploy, in deployment order
    pub fn specs(&self) -> Vec<ContractSpec> {
        vec![self.reward.spec(), self.staking.spec()]
    }
}
