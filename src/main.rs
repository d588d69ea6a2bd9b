mod cli;

use clap::Parser;
use cli::{Cli, Commands, ConfigArgs, ScanArgs};
use logdrop::clock::{Clock, SystemClock};
use logdrop::config::Config;
use logdrop::report;
use tracing_subscriber::EnvFilter;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => logdrop::api::run(args.address, args.config.config).await?,
        Commands::CheckConfig(args) => check_config(args)?,
        Commands::Scan(args) => scan(args).await?,
    }

    Ok(())
}

fn check_config(args: ConfigArgs) -> Result<(), AnyError> {
    let config = Config::load(args.config)?;

    println!("bind_addr: {}", config.server.bind_addr);
    println!("max_upload_bytes: {}", config.server.max_upload_bytes);
    println!("notify: {:?}", config.notify.transport);
    for (name, endpoint) in config.resolved_endpoints() {
        println!(
            "endpoint {}: root={} append_client_addr={} decode={} report={} notify={}",
            name,
            endpoint.root.display(),
            endpoint.append_client_addr,
            endpoint.decode,
            endpoint.report,
            endpoint.notify
        );
    }

    Ok(())
}

async fn scan(args: ScanArgs) -> Result<(), AnyError> {
    let summary = report::scan_file(&args.file, args.max_lines, args.max_line_bytes).await?;

    println!("subject: {}", summary.subject(&args.subject_prefix, SystemClock.today()));
    println!("reply-to: {}", summary.submitter_email.as_deref().unwrap_or("-"));
    println!("lines: {}{}", summary.lines_read, if summary.truncated { " (truncated)" } else { "" });

    Ok(())
}
