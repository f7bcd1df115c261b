//! Per-contract provisioning: attach to a recorded deployment, or deploy a
//! new upgradeable instance

use alloy::primitives::Address;
use tracing::info;

use crate::{
    artifacts::ArtifactProvider,
    errors::ScriptError,
    ledger::Ledger,
    proxy::{DeployProxyOptions, DeployedHandle, ProxyUpgrades, UnsafeAllow},
};

/// One initialization parameter of a contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// A literal value, coerced to the parameter's ABI type
    Value(String),
    /// The address of another contract, looked up in the ledger by its key when
    /// this contract is deployed
    Deployed(String),
}

impl Arg {
    /// Resolve the argument to a literal value for the contract `contract`
    fn resolve(&self, contract: &str, ledger: &Ledger) -> Result<String, ScriptError> {
        match self {
            Arg::Value(value) => Ok(value.clone()),
            Arg::Deployed(dependency) => ledger
                .get(dependency)
                .map(|address| format!("{address:#x}"))
                .ok_or_else(|| ScriptError::MissingDependency {
                    contract: contract.to_string(),
                    dependency: dependency.clone(),
                }),
        }
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Value(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Value(value.to_string())
    }
}

/// How a contract's initialization parameters reach it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Passed to the initializer, called through the proxy as part of its setup.
    /// The values live in proxy storage and may change across upgrades.
    InitializerArgs(Vec<Arg>),
    /// Passed to the logic contract's constructor and baked into its bytecode.
    /// The proxy is deployed without initializer arguments.
    ConstructorArgs(Vec<Arg>),
}

/// A view method read back after provisioning, to compare with the value the
/// contract was configured with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBack {
    /// The view method, taking no arguments
    pub method: String,
    /// The configured value
    pub expected: String,
}

/// The static configuration of one deployable contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSpec {
    /// The key of the contract in the deployments file
    pub name: String,
    /// The identifier of the contract's compilation artifact
    pub artifact: String,
    /// How the contract is initialized
    pub strategy: Strategy,
    /// Values read back from the contract once it is provisioned
    pub read_backs: Vec<ReadBack>,
}

impl ContractSpec {
    /// A contract initialized through its initializer
    pub fn with_initializer(
        name: impl Into<String>,
        artifact: impl Into<String>,
        args: Vec<Arg>,
    ) -> Self {
        Self {
            name: name.into(),
            artifact: artifact.into(),
            strategy: Strategy::InitializerArgs(args),
            read_backs: Vec::new(),
        }
    }

    /// A contract initialized through its constructor
    pub fn with_constructor(
        name: impl Into<String>,
        artifact: impl Into<String>,
        args: Vec<Arg>,
    ) -> Self {
        Self {
            name: name.into(),
            artifact: artifact.into(),
            strategy: Strategy::ConstructorArgs(args),
            read_backs: Vec::new(),
        }
    }

    /// Read `method` back once the contract is provisioned and compare it with `expected`
    pub fn with_read_back(mut self, method: impl Into<String>, expected: impl Into<String>) -> Self {
        self.read_backs.push(ReadBack {
            method: method.into(),
            expected: expected.into(),
        });
        self
    }

    /// Resolve a list of arguments against the ledger
    fn resolve_args(&self, args: &[Arg], ledger: &Ledger) -> Result<Vec<String>, ScriptError> {
        args.iter()
            .map(|arg| arg.resolve(&self.name, ledger))
            .collect()
    }
}

/// Provision the contract described by `spec`.
///
/// If the ledger records an address for the contract, a handle is bound to it
/// and nothing is sent to the network, even if the initialization parameters
/// have changed since. Otherwise a new proxy is deployed, with any
/// [`Arg::Deployed`] parameters resolved from the ledger. The ledger itself is
/// left for the caller to update.
///
/// Every error names the contract.
pub async fn provision<A, D>(
    spec: &ContractSpec,
    artifacts: &A,
    deployer: &D,
    ledger: &Ledger,
) -> Result<(Address, DeployedHandle<D::Contract>), ScriptError>
where
    A: ArtifactProvider,
    D: ProxyUpgrades,
{
    provision_inner(spec, artifacts, deployer, ledger)
        .await
        .map_err(|e| match e {
            ScriptError::ContractDeployment(reason) => ScriptError::DeploymentRejected {
                contract: spec.name.clone(),
                reason,
            },
            e @ (ScriptError::DeploymentRejected { .. }
            | ScriptError::AttachTargetInvalid { .. }
            | ScriptError::MissingDependency { .. }
            | ScriptError::ProvisionFailed { .. }) => e,
            e => ScriptError::ProvisionFailed {
                contract: spec.name.clone(),
                source: Box::new(e),
            },
        })
}

/// Attach to or deploy the contract described by `spec`
async fn provision_inner<A, D>(
    spec: &ContractSpec,
    artifacts: &A,
    deployer: &D,
    ledger: &Ledger,
) -> Result<(Address, DeployedHandle<D::Contract>), ScriptError>
where
    A: ArtifactProvider,
    D: ProxyUpgrades,
{
    let artifact = artifacts.artifact(&spec.artifact)?;

    if let Some(address) = ledger.get(&spec.name) {
        let handle = deployer.attach(&artifact, address).await?.ok_or_else(|| {
            ScriptError::AttachTargetInvalid {
                contract: spec.name.clone(),
                address,
            }
        })?;

        info!(contract = %spec.name, "attached to existing deployment at {address:#x}");
        return Ok((handle.address, handle));
    }

    let handle = match &spec.strategy {
        Strategy::InitializerArgs(args) => {
            let args = spec.resolve_args(args, ledger)?;
            deployer
                .deploy_proxy(&artifact, &args, &DeployProxyOptions::default())
                .await?
        }
        Strategy::ConstructorArgs(args) => {
            let options = DeployProxyOptions {
                constructor_args: spec.resolve_args(args, ledger)?,
                unsafe_allow: vec![UnsafeAllow::Constructor, UnsafeAllow::StateVariableImmutable],
            };
            deployer.deploy_proxy(&artifact, &[], &options).await?
        }
    };

    info!(contract = %spec.name, "deployed at {:#x}", handle.address);

    Ok((handle.address, handle))
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::HashSet};

    use alloy::{
        dyn_abi::DynSolValue,
        primitives::{Address, TxHash},
    };

    use super::{provision, Arg, ContractSpec};
    use crate::{
        artifacts::{tests::TOKEN_ARTIFACT, Artifact, ArtifactProvider},
        errors::ScriptError,
        ledger::Ledger,
        proxy::{DeployProxyOptions, DeployedHandle, Deployment, ProxyUpgrades, UnsafeAllow},
        test_helpers::ScratchDir,
    };

    struct StaticArtifacts;

    impl ArtifactProvider for StaticArtifacts {
        fn artifact(&self, id: &str) -> Result<Artifact, ScriptError> {
            let mut artifact = Artifact::from_json(TOKEN_ARTIFACT)?;
            artifact.contract_name = id.to_string();
            Ok(artifact)
        }
    }

    /// Records every call, deploying to a fixed address unless told to fail
    #[derive(Default)]
    struct RecordingDeployer {
        deploys: RefCell<Vec<(Vec<String>, DeployProxyOptions)>>,
        attaches: RefCell<Vec<Address>>,
        live: HashSet<Address>,
        failure: RefCell<Option<ScriptError>>,
    }

    const DEPLOYED: Address = Address::new([0xdd; 20]);

    impl ProxyUpgrades for RecordingDeployer {
        type Contract = ();

        async fn deploy_proxy(
            &self,
            _artifact: &Artifact,
            initializer_args: &[String],
            options: &DeployProxyOptions,
        ) -> Result<DeployedHandle<()>, ScriptError> {
            self.deploys
                .borrow_mut()
                .push((initializer_args.to_vec(), options.clone()));
            if let Some(err) = self.failure.borrow_mut().take() {
                return Err(err);
            }

            Ok(DeployedHandle {
                address: DEPLOYED,
                deployment: Some(Deployment {
                    tx_hash: TxHash::repeat_byte(1),
                    implementation: Address::repeat_byte(2),
                    admin: Some(Address::repeat_byte(3)),
                }),
                contract: (),
            })
        }

        async fn attach(
            &self,
            _artifact: &Artifact,
            address: Address,
        ) -> Result<Option<DeployedHandle<()>>, ScriptError> {
            self.attaches.borrow_mut().push(address);
            Ok(self.live.contains(&address).then_some(DeployedHandle {
                address,
                deployment: None,
                contract: (),
            }))
        }

        async fn read(&self, _contract: &(), _method: &str) -> Result<DynSolValue, ScriptError> {
            Ok(DynSolValue::Address(DEPLOYED))
        }
    }

    fn empty_ledger(dir: &ScratchDir) -> Ledger {
        Ledger::load(dir.join("deployments.json")).unwrap()
    }

    #[tokio::test]
    async fn test_initializer_args_routing() {
        let dir = ScratchDir::new();
        let deployer = RecordingDeployer::default();
        let spec = ContractSpec::with_initializer("Token", "Token", vec!["0x01".into()]);

        let (address, handle) = provision(&spec, &StaticArtifacts, &deployer, &empty_ledger(&dir))
            .await
            .unwrap();

        assert_eq!(address, DEPLOYED);
        assert!(handle.deployment.is_some());
        let deploys = deployer.deploys.borrow();
        assert_eq!(deploys.len(), 1);
        assert_eq!(deploys[0].0, vec!["0x01".to_string()]);
        assert_eq!(deploys[0].1, DeployProxyOptions::default());
    }

    #[tokio::test]
    async fn test_constructor_args_routing() {
        let dir = ScratchDir::new();
        let deployer = RecordingDeployer::default();
        let spec = ContractSpec::with_constructor("Staking", "Staking", vec!["0x02".into()]);

        provision(&spec, &StaticArtifacts, &deployer, &empty_ledger(&dir))
            .await
            .unwrap();

        let deploys = deployer.deploys.borrow();
        assert_eq!(deploys.len(), 1);
        assert!(deploys[0].0.is_empty());
        assert_eq!(deploys[0].1.constructor_args, vec!["0x02".to_string()]);
        assert!(deploys[0].1.allows(UnsafeAllow::Constructor));
        assert!(deploys[0].1.allows(UnsafeAllow::StateVariableImmutable));
    }

    #[tokio::test]
    async fn test_deployed_arg_resolved_from_ledger() {
        let dir = ScratchDir::new();
        let token = Address::repeat_byte(0x0a);
        let mut ledger = empty_ledger(&dir);
        ledger.put("Token", token).unwrap();

        let deployer = RecordingDeployer::default();
        let spec = ContractSpec::with_constructor(
            "Staking",
            "Staking",
            vec![Arg::Deployed("Token".to_string())],
        );
        provision(&spec, &StaticArtifacts, &deployer, &ledger)
            .await
            .unwrap();

        let deploys = deployer.deploys.borrow();
        assert_eq!(deploys[0].1.constructor_args, vec![format!("{token:#x}")]);
    }

    #[tokio::test]
    async fn test_missing_dependency_deploys_nothing() {
        let dir = ScratchDir::new();
        let deployer = RecordingDeployer::default();
        let spec = ContractSpec::with_initializer(
            "Staking",
            "Staking",
            vec![Arg::Deployed("Token".to_string())],
        );

        let err = provision(&spec, &StaticArtifacts, &deployer, &empty_ledger(&dir))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ScriptError::MissingDependency { ref contract, ref dependency }
                if contract == "Staking" && dependency == "Token"
        ));
        assert!(deployer.deploys.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_errors_name_the_contract() {
        let dir = ScratchDir::new();
        let tx_hash = TxHash::repeat_byte(0x42);
        let deployer = RecordingDeployer::default();
        *deployer.failure.borrow_mut() = Some(ScriptError::ConfirmationTimeout(tx_hash));

        let spec = ContractSpec::with_initializer("Token", "Token", vec![]);
        let err = provision(&spec, &StaticArtifacts, &deployer, &empty_ledger(&dir))
            .await
            .unwrap_err();

        let ScriptError::ProvisionFailed { contract, source } = &err else {
            panic!("expected a provisioning failure, got {err}");
        };
        assert_eq!(contract, "Token");
        assert!(matches!(**source, ScriptError::ConfirmationTimeout(hash) if hash == tx_hash));
        assert!(err.to_string().contains(&format!("{tx_hash:#x}")));
    }

    #[tokio::test]
    async fn test_attach_ignores_changed_args() {
        let dir = ScratchDir::new();
        let existing = Address::repeat_byte(0xaa);
        let mut deployer = RecordingDeployer::default();
        deployer.live.insert(existing);

        let mut ledger = empty_ledger(&dir);
        ledger.put("Token", existing).unwrap();

        let spec = ContractSpec::with_initializer("Token", "Token", vec!["0x99".into()]);
        let (address, handle) = provision(&spec, &StaticArtifacts, &deployer, &ledger)
            .await
            .unwrap();

        assert_eq!(address, existing);
        assert!(handle.deployment.is_none());
        assert!(deployer.deploys.borrow().is_empty());
        assert_eq!(*deployer.attaches.borrow(), vec![existing]);
    }

    #[tokio::test]
    async fn test_attach_to_missing_code() {
        let dir = ScratchDir::new();
        let stale = Address::repeat_byte(0xee);
        let deployer = RecordingDeployer::default();

        let mut ledger = empty_ledger(&dir);
        ledger.put("Token", stale).unwrap();

        let spec = ContractSpec::with_initializer("Token", "Token", vec![]);
        let err = provision(&spec, &StaticArtifacts, &deployer, &ledger)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ScriptError::AttachTargetInvalid { ref contract, address }
                if contract == "Token" && address == stale
        ));
        assert!(deployer.deploys.borrow().is_empty());
    }
}
