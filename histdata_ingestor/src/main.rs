use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use histdata_ingestor::{
    cli::{
        Cli, Commands, IngestArgs, init_tracing,
        params::{download_requests, retry_policy},
    },
    config::IngestorConfig,
    providers::histdata::HistDataProvider,
    requests::{IngestOptions, ingest_batch},
};
use pushgateway_client::{
    Aggregator, PushgatewayClient,
    reconcile::{ReconcileStatus, plan_deletions, reconcile},
};
use serde_json::json;
use tracing::info;

/// Exit status when at least one month could not reach the aggregator at all.
const EXIT_UNREACHABLE: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let config =
        IngestorConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let gateway = PushgatewayClient::new(&config.pushgateway.url, config.client_timeouts())
        .context("Failed to create Pushgateway client")?;
    info!(gateway = %gateway.base_url(), job = %config.pushgateway.job, "configured");

    match cli.command {
        Commands::Ingest(args) => run_ingest(&config, &gateway, &args, cli.json).await,
        Commands::Clear { dry_run } => run_clear(&gateway, dry_run, cli.json).await,
    }
}

async fn run_ingest(
    config: &IngestorConfig,
    gateway: &PushgatewayClient,
    args: &IngestArgs,
    json: bool,
) -> Result<ExitCode> {
    let requests = download_requests(args).context("Invalid ingest arguments")?;
    let policy = retry_policy(args, config.retry);
    let provider = HistDataProvider::new(config.histdata_settings())
        .context("Failed to create HistData provider")?;

    let results = ingest_batch(
        &provider,
        gateway,
        &requests,
        &IngestOptions::from(config),
        policy,
    )
    .await;

    let mut failures = 0;
    let mut unreachable = false;
    let mut entries = Vec::with_capacity(results.len());
    for (request, result) in requests.iter().zip(&results) {
        match result {
            Ok(report) => {
                if !report.publish.is_complete() {
                    failures += 1;
                }
                unreachable |= report.aggregator_unreachable;
                if !json {
                    if report.aggregator_unreachable {
                        println!("{request}: aggregator unreachable at {}", gateway.base_url());
                    }
                    println!(
                        "{request}: {} bars in {} chunks to {} ({} rows skipped, {} chunks failed)",
                        report.publish.bars_pushed,
                        report.publish.chunks_pushed,
                        report.group,
                        report.rows_skipped,
                        report.publish.failed_chunks.len(),
                    );
                }
                entries.push(json!({ "request": request, "report": report }));
            }
            Err(e) => {
                failures += 1;
                if !json {
                    println!("{request}: failed: {e}");
                }
                entries.push(json!({ "request": request, "error": e.to_string() }));
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    }
    Ok(if unreachable {
        ExitCode::from(EXIT_UNREACHABLE)
    } else if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_clear(gateway: &PushgatewayClient, dry_run: bool, json: bool) -> Result<ExitCode> {
    if dry_run {
        let exposition = gateway
            .fetch_exposition()
            .await
            .context("Failed to read the Pushgateway exposition")?;
        let plan = plan_deletions(&exposition);
        if json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else if plan.is_empty() {
            println!("nothing to delete");
        } else {
            for group in &plan {
                println!("would delete {group}");
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let report = reconcile(gateway).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("status: {:?}", report.status);
        for deletion in &report.deletions {
            println!("  {}: {:?}", deletion.group, deletion.outcome);
        }
    }

    Ok(match report.status {
        ReconcileStatus::Wiped | ReconcileStatus::Cleared | ReconcileStatus::AlreadyEmpty => {
            ExitCode::SUCCESS
        }
        ReconcileStatus::Unreachable => ExitCode::from(EXIT_UNREACHABLE),
        _ => ExitCode::FAILURE,
    })
}
