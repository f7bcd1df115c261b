//! Constants used in the deploy scripts

/// The number of confirmations to wait for a contract deployment transaction
pub const NUM_DEPLOY_CONFIRMATIONS: u64 = 1;

/// The storage slot containing the proxy admin contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: &str =
    "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

/// The storage slot containing the implementation contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const PROXY_IMPLEMENTATION_STORAGE_SLOT: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

/// The name of the initializer method invoked through the proxy
pub const INITIALIZER_FN_NAME: &str = "initialize";

/// The artifact name of the OpenZeppelin v5 `TransparentUpgradeableProxy`
pub const PROXY_ARTIFACT: &str = "TransparentUpgradeableProxy";

/// The Hardhat directory holding build info, which never contains contract artifacts
pub const BUILD_INFO_DIR: &str = "build-info";

/// The suffix of Hardhat debug files sitting next to each artifact
pub const DEBUG_ARTIFACT_SUFFIX: &str = ".dbg.json";

/// The extension of an artifact file
pub const ARTIFACT_EXTENSION: &str = "json";

/// The default path of the deployments file
pub const DEFAULT_DEPLOYMENTS_PATH: &str = "deploy_output.json";

/// The default path of the Hardhat artifacts directory
pub const DEFAULT_ARTIFACTS_PATH: &str = "artifacts";

/// The RPC endpoint of a local devnet node
pub const LOCALHOST_RPC_URL: &str = "http://127.0.0.1:8545";

/// The reward contract key in the deployments file
pub const REWARD_CONTRACT_KEY: &str = "ZKFRewardContract";

/// The reward contract artifact name
pub const REWARD_CONTRACT_ARTIFACT: &str = "ZKFRewardContract";

/// The reward contract's getter for its configured sponsor
pub const REWARD_SPONSOR_GETTER: &str = "rewardSponsor";

/// The staking contract key in the deployments file
pub const STAKING_CONTRACT_KEY: &str = "stakingContract";

/// The staking contract artifact name
pub const STAKING_CONTRACT_ARTIFACT: &str = "StakingContract";
