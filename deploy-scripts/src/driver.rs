//! Sequencing of a deployment run across several contracts

use std::{
    fmt::{self, Display},
    path::Path,
};

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, TxHash},
};
use tracing::{debug, error, info, warn};

use crate::{
    artifacts::ArtifactProvider,
    errors::ScriptError,
    ledger::Ledger,
    provisioner::{provision, ContractSpec, ReadBack},
    proxy::{DeployedHandle, ProxyUpgrades},
};

/// The progress of a deployment run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has been read yet
    Init,
    /// The deployments file has been loaded
    LedgerLoaded,
    /// The contract at the given index is being provisioned
    Provisioning(usize),
    /// The address of the contract at the given index has been recorded
    LedgerUpdated(usize),
    /// Every contract has been provisioned
    Done,
    /// The run stopped on an error
    Aborted,
}

/// How a contract came to be available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionAction {
    /// A new proxy was deployed
    Deployed {
        /// The hash of the proxy deployment transaction, if known
        tx_hash: Option<TxHash>,
    },
    /// An existing proxy was attached to
    Attached,
}

/// A value read back from a provisioned contract
#[derive(Debug, Clone, PartialEq)]
pub struct ReadBackResult {
    /// The view method called
    pub method: String,
    /// The configured value
    pub expected: String,
    /// The value returned, `None` if the call failed
    pub actual: Option<DynSolValue>,
}

impl ReadBackResult {
    /// Whether the contract returned the configured value
    pub fn matches(&self) -> bool {
        let Some(actual) = &self.actual else {
            return false;
        };
        actual
            .as_type()
            .and_then(|ty| ty.coerce_str(&self.expected).ok())
            .is_some_and(|expected| &expected == actual)
    }
}

/// The result of provisioning one contract
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionOutcome {
    /// The key of the contract in the deployments file
    pub name: String,
    /// The proxy address
    pub address: Address,
    /// Whether the contract was deployed or attached to
    pub action: ProvisionAction,
    /// The values read back from the contract
    pub read_backs: Vec<ReadBackResult>,
}

impl Display for ProvisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            ProvisionAction::Deployed { .. } => "deployed",
            ProvisionAction::Attached => "already deployed",
        };
        write!(f, "{} {} to: {:#x}", self.name, action, self.address)
    }
}

/// Tracks and logs the state of a run
struct Run {
    /// The current state
    state: RunState,
}

impl Run {
    /// Move to `state`
    fn advance(&mut self, state: RunState) {
        debug!("deployment run: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Move to `Aborted`, passing the error through
    fn abort(&mut self, err: ScriptError) -> ScriptError {
        error!(state = ?self.state, "deployment run aborted: {err}");
        self.advance(RunState::Aborted);
        err
    }
}

/// Provision every contract in `specs`, in order, recording each new address
/// in the deployments file at `ledger_path` as soon as it is known.
///
/// The first failure stops the run; contracts after it are not touched.
pub async fn run_deployments<A, D>(
    specs: &[ContractSpec],
    ledger_path: &Path,
    artifacts: &A,
    deployer: &D,
) -> Result<Vec<ProvisionOutcome>, ScriptError>
where
    A: ArtifactProvider,
    D: ProxyUpgrades,
{
    let mut run = Run {
        state: RunState::Init,
    };

    let mut ledger = Ledger::load(ledger_path).map_err(|e| run.abort(e))?;
    info!(
        recorded = ledger.iter().count(),
        "loaded deployments from {}",
        ledger.path().display()
    );
    run.advance(RunState::LedgerLoaded);

    let mut outcomes = Vec::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        run.advance(RunState::Provisioning(i));
        let recorded = ledger.get(&spec.name);
        let (address, handle) = provision(spec, artifacts, deployer, &ledger)
            .await
            .map_err(|e| run.abort(e))?;

        let action = if recorded.is_some() {
            ProvisionAction::Attached
        } else {
            ledger
                .put(&spec.name, address)
                .map_err(|e| run.abort(e))?;
            ProvisionAction::Deployed {
                tx_hash: handle.deployment.map(|d| d.tx_hash),
            }
        };
        run.advance(RunState::LedgerUpdated(i));

        let read_backs = read_back(spec, deployer, &handle).await;
        outcomes.push(ProvisionOutcome {
            name: spec.name.clone(),
            address,
            action,
            read_backs,
        });
    }

    run.advance(RunState::Done);
    info!("provisioned {} contract(s)", outcomes.len());

    Ok(outcomes)
}

/// Read back the configured values of a provisioned contract.
///
/// The contract is already recorded, so a failed call is logged rather than
/// aborting the run.
async fn read_back<D: ProxyUpgrades>(
    spec: &ContractSpec,
    deployer: &D,
    handle: &DeployedHandle<D::Contract>,
) -> Vec<ReadBackResult> {
    let mut results = Vec::with_capacity(spec.read_backs.len());
    for ReadBack { method, expected } in &spec.read_backs {
        let actual = match deployer.read(&handle.contract, method).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(contract = %spec.name, "could not read `{method}`: {e}");
                None
            }
        };

        let result = ReadBackResult {
            method: method.clone(),
            expected: expected.clone(),
            actual,
        };
        if let Some(actual) = &result.actual {
            if result.matches() {
                info!(contract = %spec.name, "{method}: {}", format_value(actual));
            } else {
                warn!(
                    contract = %spec.name,
                    "{method} is {}, configured as {expected}",
                    format_value(actual)
                );
            }
        }
        results.push(result);
    }

    results
}

/// Format a value returned by a contract, addresses as lowercase hex
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(address) => format!("{address:#x}"),
        value => format!("{value:?}"),
    }
}
