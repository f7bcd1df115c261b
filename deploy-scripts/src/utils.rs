//! Utilities for the deploy scripts.

use std::str::FromStr;

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt, Specifier},
    json_abi::{JsonAbi, Param},
    network::EthereumWallet,
    primitives::{Address, Bytes, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use tracing::info;

use crate::{
    artifacts::Artifact,
    constants::INITIALIZER_FN_NAME,
    errors::ScriptError,
    proxy::{DeployProxyOptions, UnsafeAllow},
};

/// Sets up a client signing with the given private key against the given RPC url,
/// returning it along with the signer's address
pub async fn setup_client(
    priv_key: &str,
    rpc_url: &str,
) -> Result<(DynProvider, Address), ScriptError> {
    let url =
        Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let signer = PrivateKeySigner::from_str(priv_key)
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let deployer = signer.address();

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .on_http(url);
    let provider = DynProvider::new(provider);

    let chain_id = provider
        .get_chain_id()
        .await
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    info!(chain_id, deployer = %deployer, "connected to {rpc_url}");

    Ok((provider, deployer))
}

/// Coerce string values into the ABI types of the given parameters
pub fn coerce_args(params: &[Param], args: &[String]) -> Result<Vec<DynSolValue>, ScriptError> {
    if params.len() != args.len() {
        return Err(ScriptError::CalldataConstruction(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param
                .resolve()
                .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?;
            ty.coerce_str(arg).map_err(|e| {
                ScriptError::CalldataConstruction(format!("`{arg}` is not a valid {ty}: {e}"))
            })
        })
        .collect()
}

/// Prepare calldata for the `initialize` method taking `args`.
///
/// With no arguments and no zero-arity `initialize` method, the proxy is not
/// initialized at all and the calldata is empty.
pub fn initializer_calldata(abi: &JsonAbi, args: &[String]) -> Result<Bytes, ScriptError> {
    let initializer = abi
        .function(INITIALIZER_FN_NAME)
        .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == args.len()));

    let Some(initializer) = initializer else {
        return if args.is_empty() {
            Ok(Bytes::new())
        } else {
            Err(ScriptError::CalldataConstruction(format!(
                "no `{INITIALIZER_FN_NAME}` method taking {} arguments",
                args.len()
            )))
        };
    };

    let values = coerce_args(&initializer.inputs, args)?;
    initializer
        .abi_encode_input(&values)
        .map(Bytes::from)
        .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))
}

/// ABI-encode the constructor arguments of a contract
pub fn constructor_args(abi: &JsonAbi, args: &[String]) -> Result<Vec<u8>, ScriptError> {
    match &abi.constructor {
        Some(constructor) => {
            let values = coerce_args(&constructor.inputs, args)?;
            constructor
                .abi_encode_input(&values)
                .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))
        }
        None if args.is_empty() => Ok(Vec::new()),
        None => Err(ScriptError::CalldataConstruction(
            "contract has no constructor but constructor arguments were given".to_string(),
        )),
    }
}

/// Check that a logic contract can safely sit behind a proxy, given the
/// patterns the deployment explicitly allows
pub fn validate_upgrade_safety(
    artifact: &Artifact,
    options: &DeployProxyOptions,
) -> Result<(), ScriptError> {
    let has_constructor_inputs = artifact
        .abi
        .constructor
        .as_ref()
        .is_some_and(|c| !c.inputs.is_empty());

    if has_constructor_inputs && !options.allows(UnsafeAllow::Constructor) {
        return Err(ScriptError::UnsafeUpgrade(format!(
            "{} has a constructor taking arguments",
            artifact.contract_name
        )));
    }

    Ok(())
}

/// Interpret a storage word as the address held in its low 20 bytes
pub fn address_from_storage_word(word: U256) -> Address {
    Address::from_word(B256::from(word.to_be_bytes::<32>()))
}
