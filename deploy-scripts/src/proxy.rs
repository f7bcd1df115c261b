//! Deployment of, and attachment to, upgradeable proxy contracts

use std::{str::FromStr, time::Duration};

use alloy::{
    contract::{ContractInstance, Interface},
    dyn_abi::DynSolValue,
    network::{Ethereum, ReceiptResponse, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{PendingTransactionError, Provider, WatchTxError},
    rpc::types::TransactionRequest,
    sol_types::SolConstructor,
};
use tracing::{debug, info, warn};

use crate::{
    artifacts::Artifact,
    constants::{
        NUM_DEPLOY_CONFIRMATIONS, PROXY_ADMIN_STORAGE_SLOT, PROXY_IMPLEMENTATION_STORAGE_SLOT,
    },
    errors::ScriptError,
    solidity::TransparentUpgradeableProxy,
    utils::{
        address_from_storage_word, constructor_args, initializer_calldata,
        validate_upgrade_safety,
    },
};

/// A pattern normally rejected in a logic contract which a deployment may opt into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafeAllow {
    /// A constructor taking arguments
    Constructor,
    /// `immutable` state variables
    StateVariableImmutable,
}

/// Options for deploying a proxy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployProxyOptions {
    /// Arguments passed to the logic contract's constructor
    pub constructor_args: Vec<String>,
    /// The unsafe patterns this deployment accepts
    pub unsafe_allow: Vec<UnsafeAllow>,
}

impl DeployProxyOptions {
    /// Whether the options accept the given pattern
    pub fn allows(&self, pattern: UnsafeAllow) -> bool {
        self.unsafe_allow.contains(&pattern)
    }
}

/// Details of a proxy deployed in this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    /// The hash of the proxy deployment transaction
    pub tx_hash: TxHash,
    /// The logic contract behind the proxy
    pub implementation: Address,
    /// The `ProxyAdmin` contract able to upgrade the proxy, if it could be read
    pub admin: Option<Address>,
}

/// A live reference to a proxied contract
#[derive(Debug, Clone)]
pub struct DeployedHandle<C> {
    /// The proxy address
    pub address: Address,
    /// Set when the proxy was deployed rather than attached to
    pub deployment: Option<Deployment>,
    /// The means of calling the contract
    pub contract: C,
}

/// The primitive through which proxies are deployed and attached to
#[allow(async_fn_in_trait)]
pub trait ProxyUpgrades {
    /// The contract handle produced by the primitive
    type Contract;

    /// Deploy the logic contract in `artifact` behind a new proxy, calling the
    /// initializer with `initializer_args` atomically with the proxy setup.
    ///
    /// Returns only once the deployment is confirmed.
    async fn deploy_proxy(
        &self,
        artifact: &Artifact,
        initializer_args: &[String],
        options: &DeployProxyOptions,
    ) -> Result<DeployedHandle<Self::Contract>, ScriptError>;

    /// Bind to an already deployed proxy without sending any transaction.
    ///
    /// Returns `None` if there is no contract code at `address`.
    async fn attach(
        &self,
        artifact: &Artifact,
        address: Address,
    ) -> Result<Option<DeployedHandle<Self::Contract>>, ScriptError>;

    /// Call a view method taking no arguments, returning its first output
    async fn read(
        &self,
        contract: &Self::Contract,
        method: &str,
    ) -> Result<DynSolValue, ScriptError>;
}

/// Deploys OpenZeppelin `TransparentUpgradeableProxy` contracts through a signing provider
pub struct TransparentProxyDeployer<P> {
    /// The signing provider
    provider: P,
    /// The initial owner of each proxy's admin contract
    owner: Address,
    /// The compiled proxy contract
    proxy_artifact: Artifact,
    /// How long to wait for a deployment receipt, forever if unset
    confirmation_timeout: Option<Duration>,
}

impl<P: Provider + Clone> TransparentProxyDeployer<P> {
    /// Create a deployer sending transactions through `provider`
    pub fn new(
        provider: P,
        owner: Address,
        proxy_artifact: Artifact,
        confirmation_timeout: Option<Duration>,
    ) -> Self {
        Self {
            provider,
            owner,
            proxy_artifact,
            confirmation_timeout,
        }
    }

    /// Send a contract creation transaction and wait for its receipt,
    /// returning the created address and the transaction hash
    async fn deploy_code(&self, code: Vec<u8>) -> Result<(Address, TxHash), ScriptError> {
        let tx = TransactionRequest::default().with_deploy_code(code);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?;

        let tx_hash = *pending.tx_hash();
        info!("tx hash: {tx_hash:#x}");

        let receipt = pending
            .with_required_confirmations(NUM_DEPLOY_CONFIRMATIONS)
            .with_timeout(self.confirmation_timeout)
            .get_receipt()
            .await
            .map_err(|e| match e {
                PendingTransactionError::TxWatcher(WatchTxError::Timeout) => {
                    ScriptError::ConfirmationTimeout(tx_hash)
                }
                e => ScriptError::ContractDeployment(e.to_string()),
            })?;

        if !receipt.status() {
            return Err(ScriptError::ContractDeployment(format!(
                "transaction {tx_hash:#x} reverted"
            )));
        }

        let address = receipt.contract_address.ok_or_else(|| {
            ScriptError::ContractDeployment(format!(
                "no contract address in receipt of {tx_hash:#x}"
            ))
        })?;

        Ok((address, tx_hash))
    }

    /// Read an address out of one of the proxy's EIP-1967 slots
    async fn read_address_slot(&self, proxy: Address, slot: &str) -> Result<Address, ScriptError> {
        let slot =
            U256::from_str(slot).map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
        let word = self
            .provider
            .get_storage_at(proxy, slot)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

        Ok(address_from_storage_word(word))
    }

    /// Read an EIP-1967 slot of a proxy that is already confirmed on-chain.
    ///
    /// A failed read is logged and yields `None`, it must not lose the proxy address.
    async fn read_address_slot_or_warn(&self, proxy: Address, slot: &str) -> Option<Address> {
        match self.read_address_slot(proxy, slot).await {
            Ok(address) => Some(address),
            Err(e) => {
                warn!("could not read slot {slot} of proxy {proxy:#x}: {e}");
                None
            }
        }
    }

    /// Build a handle calling `address` through the ABI in `artifact`
    fn instance(&self, artifact: &Artifact, address: Address) -> ContractInstance<P, Ethereum> {
        ContractInstance::new(
            address,
            self.provider.clone(),
            Interface::new(artifact.abi.clone()),
        )
    }
}

impl<P: Provider + Clone> ProxyUpgrades for TransparentProxyDeployer<P> {
    type Contract = ContractInstance<P, Ethereum>;

    async fn deploy_proxy(
        &self,
        artifact: &Artifact,
        initializer_args: &[String],
        options: &DeployProxyOptions,
    ) -> Result<DeployedHandle<Self::Contract>, ScriptError> {
        validate_upgrade_safety(artifact, options)?;
        let init_data = initializer_calldata(&artifact.abi, initializer_args)?;

        // Deploy the logic contract, constructor arguments appended to its bytecode
        let mut logic_code = artifact.bytecode.to_vec();
        logic_code.extend(constructor_args(&artifact.abi, &options.constructor_args)?);
        let (implementation, _) = self.deploy_code(logic_code).await?;
        debug!(
            contract = %artifact.contract_name,
            "implementation deployed at {implementation:#x}"
        );

        // Deploy the proxy, initializing through it in the same transaction
        let proxy_ctor = TransparentUpgradeableProxy::constructorCall {
            _logic: implementation,
            initialOwner: self.owner,
            _data: Bytes::from(init_data),
        };
        let mut proxy_code = self.proxy_artifact.bytecode.to_vec();
        proxy_code.extend(proxy_ctor.abi_encode());
        let (proxy, tx_hash) = self.deploy_code(proxy_code).await?;

        // This is the recommended way to get the proxy admin address:
        // https://github.com/OpenZeppelin/openzeppelin-contracts/blob/v5.0.0/contracts/proxy/ERC1967/ERC1967Utils.sol#L104-L106
        let admin = self
            .read_address_slot_or_warn(proxy, PROXY_ADMIN_STORAGE_SLOT)
            .await;
        match admin {
            Some(admin) => info!(
                contract = %artifact.contract_name,
                "proxy deployed at {proxy:#x}, proxy admin at {admin:#x}"
            ),
            None => info!(contract = %artifact.contract_name, "proxy deployed at {proxy:#x}"),
        }

        Ok(DeployedHandle {
            address: proxy,
            deployment: Some(Deployment {
                tx_hash,
                implementation,
                admin,
            }),
            contract: self.instance(artifact, proxy),
        })
    }

    async fn attach(
        &self,
        artifact: &Artifact,
        address: Address,
    ) -> Result<Option<DeployedHandle<Self::Contract>>, ScriptError> {
        let code = self
            .provider
            .get_code_at(address)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
        if code.is_empty() {
            return Ok(None);
        }

        if let Some(implementation) = self
            .read_address_slot_or_warn(address, PROXY_IMPLEMENTATION_STORAGE_SLOT)
            .await
        {
            debug!(
                contract = %artifact.contract_name,
                "attached to {address:#x}, implementation at {implementation:#x}"
            );
        }

        Ok(Some(DeployedHandle {
            address,
            deployment: None,
            contract: self.instance(artifact, address),
        }))
    }

    async fn read(
        &self,
        contract: &Self::Contract,
        method: &str,
    ) -> Result<DynSolValue, ScriptError> {
        let outputs = contract
            .function(method, &[])
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?
            .call()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

        outputs.into_iter().next().ok_or_else(|| {
            ScriptError::ContractInteraction(format!("`{method}` returned no value"))
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::Address,
        providers::{DynProvider, ProviderBuilder},
        transports::http::reqwest::Url,
    };

    use super::TransparentProxyDeployer;
    use crate::{
        artifacts::{tests::TOKEN_ARTIFACT, Artifact},
        constants::PROXY_ADMIN_STORAGE_SLOT,
    };

    /// A deployer whose RPC endpoint refuses every connection
    fn unreachable_deployer() -> TransparentProxyDeployer<DynProvider> {
        let url: Url = "http://127.0.0.1:1".parse().unwrap();
        let provider = DynProvider::new(ProviderBuilder::new().on_http(url));
        TransparentProxyDeployer::new(
            provider,
            Address::ZERO,
            Artifact::from_json(TOKEN_ARTIFACT).unwrap(),
            None,
        )
    }

    #[tokio::test]
    async fn test_failed_slot_read_after_confirmation_is_not_fatal() {
        let deployer = unreachable_deployer();
        let proxy = Address::repeat_byte(0x77);

        assert!(deployer
            .read_address_slot(proxy, PROXY_ADMIN_STORAGE_SLOT)
            .await
            .is_err());
        assert_eq!(
            deployer
                .read_address_slot_or_warn(proxy, PROXY_ADMIN_STORAGE_SLOT)
                .await,
            None
        );
    }
}
