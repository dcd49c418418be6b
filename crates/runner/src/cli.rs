use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fleetsync_observability::LogFormat;
use fleetsync_pipeline::RunSummary;

/// Run aborted before or during listing.
pub const EXIT_FATAL: ExitCode = ExitCode::FAILURE;

/// Run finished but some devices failed (only with `--fail-on-item-errors`).
pub const EXIT_ITEM_FAILURES: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "fleetsync",
    version,
    about = "Reconcile a tenant's managed devices into the device table"
)]
pub struct Cli {
    /// Tenant (vendor customer) to reconcile
    #[arg(long, env = "FLEETSYNC_TENANT")]
    pub tenant: String,

    /// Optional TOML settings file; FLEETSYNC__* environment variables override it
    #[arg(long, env = "FLEETSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format (json, pretty)
    #[arg(long, default_value = "json")]
    pub log_format: LogFormat,

    /// Exit with status 2 when any device failed
    #[arg(long)]
    pub fail_on_item_errors: bool,
}

pub fn exit_code(summary: &RunSummary, fail_on_item_errors: bool) -> ExitCode {
    if fail_on_item_errors && !summary.is_clean() {
        ExitCode::from(EXIT_ITEM_FAILURES)
    } else {
        ExitCode::SUCCESS
    }
}
