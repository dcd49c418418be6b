mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use fleetsync_core::TenantId;
use fleetsync_infra::{LiveAdapters, ParameterStoreResolver, TracingReporter};
use fleetsync_pipeline::{RunSummary, SummaryReporter, reconcile};

use crate::cli::{Cli, exit_code};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    fleetsync_observability::init(cli.log_format, &cli.log_level);

    match run(&cli).await {
        Ok(summary) => {
            TracingReporter.report(&summary);
            exit_code(&summary, cli.fail_on_item_errors)
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "run aborted");
            cli::EXIT_FATAL
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<RunSummary> {
    let tenant_id = TenantId::new(cli.tenant.as_str()).context("invalid --tenant")?;
    let resolver = ParameterStoreResolver::load(cli.config.as_deref())
        .context("failed to load configuration")?;

    info!(%tenant_id, "starting reconciliation");
    let summary = reconcile(&resolver, &LiveAdapters, &tenant_id)
        .await
        .with_context(|| format!("reconciliation for {tenant_id} aborted"))?;
    Ok(summary)
}
