use anyhow::{Context, Result};
use clap::Parser;
use ethers::providers::Middleware;
use og_uploader::{
    check_network_sync, load_accounts_from_env, new_provider, AccountScheduler, ChainConfig,
    ContentConfig, EthersRpc, EventSender, HttpContentSource, HttpIndexerClient, IndexerConfig,
    UploadEvent, UploadPipeline, UploadSettings,
};
use std::env;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Automated 0G storage uploads with on-chain attestation.
#[derive(Parser, Debug)]
#[command(name = "og-uploader", version, about)]
struct Args {
    /// Uploads to perform per account.
    #[arg(short, long, env = "UPLOADS_PER_WALLET", default_value_t = 1)]
    count: u32,

    /// Outbound HTTP proxy applied to indexer and content-source requests
    /// (never to chain RPC).
    #[arg(long, env = "PROXY_URL")]
    proxy: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    if let Some(proxy) = &args.proxy {
        url::Url::parse(proxy).context("invalid proxy URL")?;
    }
    let chain = ChainConfig::galileo_testnet();
    info!(
        "Starting og-uploader against {} (chain {})",
        chain.name, chain.chain_id
    );

    let accounts = load_accounts_from_env().context("loading accounts from environment")?;

    let provider = new_provider(&chain).context("creating RPC provider")?;
    check_network_sync(provider.as_ref())
        .await
        .context("network sync check failed")?;

    // Pull-based startup balance listing; the pipeline itself never reads
    // cached balances.
    for account in &accounts {
        match provider
            .get_balance(account.address(), None)
            .await
        {
            Ok(balance) => info!(
                "Account {:?}: {} {}",
                account.address(),
                ethers::utils::format_ether(balance),
                "OG"
            ),
            Err(e) => warn!(
                "Failed to fetch balance for {:?}: {}",
                account.address(),
                e
            ),
        }
    }

    let content_source = Arc::new(
        HttpContentSource::new(ContentConfig {
            proxy: args.proxy.clone(),
            ..ContentConfig::default()
        })
        .context("building content source client")?,
    );
    let indexer = Arc::new(
        HttpIndexerClient::new(IndexerConfig {
            proxy: args.proxy.clone(),
            ..IndexerConfig::default()
        })
        .context("building indexer client")?,
    );

    let (events, mut event_rx) = EventSender::new();
    let reporter = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                UploadEvent::StageStart { stage, detail } => info!("[{}] {}", stage, detail),
                UploadEvent::StageSuccess { stage, detail } => {
                    info!("[{}] ok: {}", stage, detail)
                }
                UploadEvent::StageWarning { stage, detail } => warn!("[{}] {}", stage, detail),
                UploadEvent::StageError { stage, detail } => error!("[{}] {}", stage, detail),
                UploadEvent::TransactionSubmitted {
                    tx_hash,
                    explorer_link,
                } => {
                    info!("Transaction sent: {:?}", tx_hash);
                    info!("Explorer link: {}", explorer_link);
                }
                UploadEvent::RunSummary {
                    accounts,
                    uploads_per_account,
                    successful,
                    failed,
                } => {
                    info!("===== Upload Summary =====");
                    info!("Accounts processed: {}", accounts);
                    info!("Uploads attempted per account: {}", uploads_per_account);
                    info!("Successful uploads: {}", successful);
                    info!("Failed uploads: {}", failed);
                }
            }
        }
    });

    let settings = UploadSettings {
        uploads_per_account: args.count,
        ..UploadSettings::default()
    };
    let scheduler = AccountScheduler::new(
        settings.uploads_per_account,
        settings.pacing.clone(),
        events.clone(),
    );
    let summary = scheduler
        .run(&accounts, |account| {
            let rpc = Arc::new(EthersRpc::for_account(
                provider.clone(),
                account,
                chain.chain_id,
            ));
            Ok(UploadPipeline::new(
                content_source.clone(),
                indexer.clone(),
                rpc,
                chain.clone(),
                settings.retry.clone(),
                events.clone(),
            ))
        })
        .await;

    // Close the channel so the reporter drains and exits.
    drop(events);
    drop(scheduler);
    let _ = reporter.await;

    info!("All planned operations completed");
    if summary.successful == 0 && summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
