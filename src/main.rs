use std::error::Error;
use std::process::ExitCode;

use alloy::network::EthereumWallet;
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use tracing_subscriber::EnvFilter;

use sentinel_harness::chain::{ChainFunder, RpcChain};
use sentinel_harness::config::{results_path, HarnessConfig};
use sentinel_harness::metrics::{ActionState, MetricsRecord, MetricsRecorder};
use sentinel_harness::orchestrator::StageOrchestrator;
use sentinel_harness::pricing::HttpPredictor;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match HarnessConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            let recorder = MetricsRecorder::new(results_path(|name| std::env::var(name).ok()));
            return record_setup_failure(&recorder, &err);
        }
    };

    let recorder = MetricsRecorder::new(&config.results_file);
    match run(&config, &recorder).await {
        Ok(record) if record.action_state().is_failure() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => record_setup_failure(&recorder, err.as_ref()),
    }
}

async fn run(
    config: &HarnessConfig,
    recorder: &MetricsRecorder,
) -> Result<MetricsRecord, Box<dyn Error>> {
    let deployment = config.load_deployment()?;

    let signer: PrivateKeySigner = config.private_key.parse()?;
    let sender = signer.address();
    let wallet = EthereumWallet::from(signer);
    let client = reqwest::Client::builder().no_proxy().build()?;
    let provider = ProviderBuilder::new()
        .wallet(wallet)
        .with_reqwest(config.rpc_url.parse()?, move |_| client);

    let chain = RpcChain::new(provider, sender);
    let funder = ChainFunder::new(&chain, deployment.amm, config.cycle.confirmation_timeout);
    let predictor = HttpPredictor::new(config.predictor_url.as_str())?;
    tracing::info!(
        sender = %sender,
        rpc = %config.rpc_url,
        results = %recorder.path().display(),
        "harness configured"
    );

    let orchestrator = StageOrchestrator::new(
        &chain,
        &predictor,
        &funder,
        recorder,
        deployment,
        config.cycle.clone(),
    );
    Ok(orchestrator.run().await)
}

/// Persists the single row for a run that never reached the chain.
fn record_setup_failure(recorder: &MetricsRecorder, err: &dyn Error) -> ExitCode {
    tracing::error!(error = %err, "harness setup failed");
    let mut record = MetricsRecord::new();
    record.record_failure(ActionState::SetupFailed, format!("setup: {err}"));
    if let Err(persist_err) = recorder.persist(&record) {
        tracing::error!(error = %persist_err, "failed to persist setup failure");
    }
    ExitCode::FAILURE
}
