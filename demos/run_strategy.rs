use std::sync::Arc;

use alloy::{network::EthereumWallet, providers::ProviderBuilder, signers::local::PrivateKeySigner};
use rangekeeper::{
    adapter::rpc::RpcClient,
    config::AppConfig,
    ops::Executor,
    snapshot::NullSink,
    strategy::{events::Reporter, Phase, Strategy},
};
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "rangekeeper.yaml".to_string());
    let config = AppConfig::from_yaml_file(&config_path)?;

    let signer: PrivateKeySigner = std::env::var("RANGEKEEPER_PRIVATE_KEY")?.parse()?;
    let owner = signer.address();
    let wallet = EthereumWallet::from(signer);

    let provider = Arc::new(
        ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(config.rpc_endpoint.parse()?),
    );
    let client = Arc::new(RpcClient::new(provider, owner));

    let executor = Executor::new(
        client,
        owner,
        config.addresses.clone(),
        config.strategy.deadline_skew(),
        config.strategy.receipt_timeout(),
    );

    let (report_tx, mut report_rx) = mpsc::channel::<rangekeeper::strategy::events::Report>(64);
    tokio::spawn(async move {
        while let Some(report) = report_rx.recv().await {
            println!("{}", report.to_json());
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let strategy = Strategy::new(
        config.strategy,
        executor,
        Reporter::new(report_tx),
        NullSink,
    );

    match strategy.run(shutdown_rx, Phase::Initializing).await {
        Err(rangekeeper::errors::StrategyError::Canceled) => {
            tracing::info!("clean shutdown");
            Ok(())
        }
        Err(e) => Err(e.into()),
        Ok(()) => Ok(()),
    }
}
