//! Scripted SDK flows

use crate::render;
use anyhow::Context;
use castate::provider::{JsonRpcProvider, ProviderConfig, ProviderRegistry};
use castate::traits::{AllowanceChoice, AllowanceDecision, CaEvent, EvmProvider, IntentDecision};
use castate::{AdapterConfig, AdapterUpdate, CaAdapter};
use castate_testing::{
    sample_allowance_values, sample_balances, sample_intent, sample_intent_with_total,
    sample_sources, sample_steps, MockCaClient, MockProvider, ScriptedRefresher,
};
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const UPDATE_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Args)]
pub struct DemoArgs {
    /// Amount to bridge
    #[arg(long, default_value = "25")]
    amount: String,

    /// Destination chain id
    #[arg(long, default_value_t = 8453)]
    chain: u64,

    /// Token symbol
    #[arg(long, default_value = "USDC")]
    token: String,

    /// Allowance for every source: min, max or an exact amount
    #[arg(long, value_parser = parse_choice)]
    allowance: Option<AllowanceChoice>,

    /// Deny the transfer plan instead of accepting it
    #[arg(long)]
    reject_intent: bool,

    /// Wallet JSON-RPC endpoint to inject instead of the built-in mock wallet
    #[arg(long)]
    rpc_url: Option<String>,
}

fn parse_choice(raw: &str) -> Result<AllowanceChoice, String> {
    AllowanceChoice::try_from(raw.to_string()).map_err(|e| e.to_string())
}

fn wallet_provider(rpc_url: Option<&str>) -> anyhow::Result<Arc<dyn EvmProvider>> {
    Ok(match rpc_url {
        Some(url) => Arc::new(JsonRpcProvider::new(ProviderConfig::new(url))?),
        None => Arc::new(MockProvider::new()),
    })
}

pub async fn run(config: AdapterConfig, args: DemoArgs) -> anyhow::Result<()> {
    let sdk = MockCaClient::new()
        .with_balances(sample_balances())
        .with_allowance_values(sample_allowance_values())
        .with_scripted_progress(sample_steps());
    let adapter = CaAdapter::with_config(sdk.factory(), config)?;
    let mut updates = adapter.subscribe();

    println!("== Wallet");
    let wallet = wallet_provider(args.rpc_url.as_deref())?;
    let chain_id = wallet.chain_id().await.context("wallet provider unreachable")?;
    let accounts = wallet.accounts().await?;
    println!("  chain {} account {}", chain_id, accounts.first().map(String::as_str).unwrap_or("-"));
    ProviderRegistry::global().inject(adapter.config().provider_slot.clone(), wallet);

    println!("\n== Session");
    let session = adapter.ensure_injected_session().await?;
    println!("  {}", session.status());
    if !session.is_ready() {
        anyhow::bail!("session did not come up: {}", session.status());
    }

    println!("\n== Balances");
    render::balance(adapter.get_balance(false).await.as_ref());

    println!("\n== Allowance");
    let allowance_reply = sdk
        .request_allowance(sample_sources())
        .context("allowance hook not registered")?;
    wait_for(&mut updates, |u| matches!(u, AdapterUpdate::AllowanceRequested { .. })).await?;
    let choice = args.allowance.unwrap_or(adapter.config().default_allowance);
    adapter.set_allowance_choices(vec![choice]).await;
    render::allowance(&adapter.allowance().await);
    adapter.accept_allowance(vec![choice]).await?;
    match allowance_reply.await? {
        AllowanceDecision::Allow(choices) => println!("  approved {} source(s)", choices.len()),
        AllowanceDecision::Deny => println!("  denied"),
    }
    adapter.clear_allowance().await;

    println!("\n== Intent");
    let refresher = Arc::new(ScriptedRefresher::new(vec![sample_intent_with_total("0.52")]));
    let intent_reply = sdk
        .request_intent(sample_intent(), refresher)
        .context("intent hook not registered")?;
    wait_for(&mut updates, |u| matches!(u, AdapterUpdate::IntentRequested)).await?;
    adapter.toggle_fees_panel().await;
    render::intent(&adapter.intent().await);
    adapter.refresh_intent().await?;
    println!("  re-quoted:");
    render::intent(&adapter.intent().await);
    if args.reject_intent {
        adapter.reject_intent().await?;
    } else {
        adapter.accept_intent().await?;
    }
    let decision = intent_reply.await?;
    println!("  decision: {:?}", decision);
    if decision == IntentDecision::Deny {
        adapter.clear_intent().await;
        adapter.dispose().await;
        return Ok(());
    }

    println!("\n== Bridge");
    let outcome = adapter.bridge(&args.amount, args.chain, args.token.as_str(), None).await?;
    println!("  intent {}", outcome.intent_id);
    loop {
        let update = wait_for(&mut updates, |u| matches!(u, AdapterUpdate::Progress(_))).await?;
        if let AdapterUpdate::Progress(outcome) = update {
            render::outcome(&outcome);
            if adapter.progress().await.completed {
                break;
            }
        }
    }
    adapter.clear_intent().await;

    println!("\n== Progress");
    render::progress(&adapter.progress().await);

    println!("\n== Balances");
    render::balance(adapter.get_balance(false).await.as_ref());

    adapter.dispose().await;
    Ok(())
}

pub async fn replay(config: AdapterConfig, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let events: Vec<CaEvent> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", file.display()))?;

    let sdk = MockCaClient::new().with_balances(sample_balances());
    let adapter = CaAdapter::with_config(sdk.factory(), config)?;
    adapter.ensure_session(Arc::new(MockProvider::new())).await;

    for event in events {
        println!("{}", event.kind());
        match adapter.on_event(event).await {
            Ok(outcome) => render::outcome(&outcome),
            Err(e) => println!("  error: {}", e),
        }
    }

    println!();
    render::progress(&adapter.progress().await);
    adapter.dispose().await;
    Ok(())
}

async fn wait_for(
    updates: &mut broadcast::Receiver<AdapterUpdate>,
    pred: impl Fn(&AdapterUpdate) -> bool,
) -> anyhow::Result<AdapterUpdate> {
    tokio::time::timeout(UPDATE_WAIT, async {
        loop {
            match updates.recv().await {
                Ok(update) if pred(&update) => return Ok(update),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    anyhow::bail!("adapter update stream closed")
                }
            }
        }
    })
    .await
    .context("timed out waiting for the adapter")?
}
