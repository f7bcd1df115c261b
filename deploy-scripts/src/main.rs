use std::time::Duration;

use clap::Parser;
use deploy_scripts::{
    artifacts::{ArtifactProvider, HardhatArtifacts},
    cli::Cli,
    proxy::TransparentProxyDeployer,
    utils::setup_client,
};
use eyre::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// The log filter used when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "info";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let Cli {
        priv_key,
        network,
        rpc_url,
        deployments_path,
        artifacts_path,
        proxy_artifact,
        confirmation_timeout_secs,
        command,
    } = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let rpc_url = network.rpc_url(rpc_url.as_deref())?;
    let (client, deployer_address) = setup_client(&priv_key, &rpc_url).await?;

    let artifacts = HardhatArtifacts::new(artifacts_path);
    let deployer = TransparentProxyDeployer::new(
        client,
        deployer_address,
        artifacts.artifact(&proxy_artifact)?,
        confirmation_timeout_secs.map(Duration::from_secs),
    );

    command.run(&artifacts, &deployer, &deployments_path).await?;

    Ok(())
}
