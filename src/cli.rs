use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "logdrop")]
#[command(about = "Problem report and config upload service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP upload server
    Server(ServerArgs),
    /// Load and validate the configuration, then list the endpoints
    CheckConfig(ConfigArgs),
    /// Extract submitter details from a local report file
    Scan(ScanArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (overrides `server.bind_addr`)
    #[arg(long)]
    pub address: Option<SocketAddr>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Configuration file (defaults to `$LOGDROP_CONFIG` or `config/logdrop.toml`)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Decoded report to scan
    pub file: PathBuf,

    /// Stop after this many lines (one extra line is kept)
    #[arg(long, default_value_t = logdrop::report::DEFAULT_MAX_LINES)]
    pub max_lines: usize,

    /// Cut longer lines to this many bytes
    #[arg(long, default_value_t = logdrop::report::DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,

    /// Subject prefix used when rendering the subject line
    #[arg(long, default_value = logdrop::report::DEFAULT_SUBJECT_PREFIX)]
    pub subject_prefix: String,
}
