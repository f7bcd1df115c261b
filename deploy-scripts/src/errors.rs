//! Definitions of errors that can occur during deployment of the contracts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use alloy::primitives::{Address, TxHash};

/// Errors that can occur during the execution of the deploy scripts
#[derive(Debug)]
pub enum ScriptError {
    /// The deployments file exists but could not be read or parsed
    CorruptLedger {
        /// Path of the deployments file
        path: String,
        /// The underlying read / parse failure
        reason: String,
    },
    /// The deployments file could not be written after a successful deployment.
    ///
    /// The contract exists on-chain at `address` but is not recorded anywhere.
    PersistLedger {
        /// The ledger key of the contract
        contract: String,
        /// The freshly deployed address
        address: Address,
        /// The underlying write failure
        reason: String,
    },
    /// The network rejected the deployment of a contract
    DeploymentRejected {
        /// The ledger key of the contract
        contract: String,
        /// The underlying rejection
        reason: String,
    },
    /// The deployments file points at an address with no code
    AttachTargetInvalid {
        /// The ledger key of the contract
        contract: String,
        /// The recorded address
        address: Address,
    },
    /// Provisioning of a contract failed for a reason that does not itself name it
    ProvisionFailed {
        /// The ledger key of the contract
        contract: String,
        /// The underlying failure
        source: Box<ScriptError>,
    },
    /// A contract argument refers to a contract that has not been deployed
    MissingDependency {
        /// The ledger key of the contract being deployed
        contract: String,
        /// The ledger key of the contract it depends on
        dependency: String,
    },
    /// A deployment transaction was not confirmed within the configured timeout
    ConfirmationTimeout(TxHash),
    /// No compilation artifact matches the given identifier
    ArtifactNotFound(String),
    /// Error parsing a compilation artifact
    ArtifactParsing(String),
    /// Error constructing calldata for a contract method
    CalldataConstruction(String),
    /// The logic contract uses a pattern that is unsafe behind a proxy
    UnsafeUpgrade(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error deploying a contract
    ContractDeployment(String),
    /// Error calling a contract method
    ContractInteraction(String),
    /// Invalid or missing configuration
    Config(String),
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::CorruptLedger { path, reason } => {
                write!(f, "corrupt deployments file {}: {}", path, reason)
            }
            ScriptError::PersistLedger {
                contract,
                address,
                reason,
            } => write!(
                f,
                "{} was deployed at {:#x} but the deployments file could not be written ({}); \
                 record this address manually",
                contract, address, reason
            ),
            ScriptError::DeploymentRejected { contract, reason } => {
                write!(f, "deployment of {} rejected: {}", contract, reason)
            }
            ScriptError::AttachTargetInvalid { contract, address } => write!(
                f,
                "no contract code at {:#x} recorded for {}; remove the entry from the \
                 deployments file to redeploy",
                address, contract
            ),
            ScriptError::ProvisionFailed { contract, source } => {
                write!(f, "provisioning {} failed: {}", contract, source)
            }
            ScriptError::MissingDependency {
                contract,
                dependency,
            } => write!(
                f,
                "{} depends on {}, which is not in the deployments file",
                contract, dependency
            ),
            ScriptError::ConfirmationTimeout(tx_hash) => write!(
                f,
                "timed out waiting for transaction {:#x}; it may still be mined, check it before \
                 re-running",
                tx_hash
            ),
            ScriptError::ArtifactNotFound(s) => write!(f, "artifact not found: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::UnsafeUpgrade(s) => write!(f, "unsafe upgrade pattern: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::ContractDeployment(s) => write!(f, "error deploying contract: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
            ScriptError::Config(s) => write!(f, "invalid configuration: {}", s),
        }
    }
}

impl Error for ScriptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ScriptError::ProvisionFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
