use std::path::PathBuf;
use std::time::Duration;

use bcos_channel_client::{ChannelConfig, DEFAULT_TIMEOUT_MS};
use bcos_channel_transport::{Credentials, NodeAddr};
use clap::{Args, Subcommand};

use crate::exit::{channel_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one JSON-RPC query and print the reply.
    Call(CallArgs),
    /// Subscribe to block height notifications and print them.
    WatchBlocks(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format).await,
        Command::WatchBlocks(args) => watch::run(args, format).await,
        Command::Version(args) => version::run(args),
    }
}

/// Where to connect and how to authenticate.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// SDK config file with nodes, authentication, groupID and timeout.
    #[arg(long, env = "BCOS_CHANNEL_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Node address (ip:port). Overrides the config file.
    #[arg(long, value_name = "IP:PORT")]
    pub node: Option<String>,
    /// Client certificate (PEM).
    #[arg(long, value_name = "FILE")]
    pub cert: Option<PathBuf>,
    /// Client private key (PEM).
    #[arg(long, value_name = "FILE")]
    pub key: Option<PathBuf>,
    /// Chain CA certificate (PEM).
    #[arg(long, value_name = "FILE")]
    pub ca: Option<PathBuf>,
    /// Group id. Default: from config, else 1.
    #[arg(long)]
    pub group: Option<u32>,
    /// Request timeout (e.g. 5s, 500ms). Default: from config, else 10s.
    #[arg(long)]
    pub timeout: Option<String>,
}

/// Fully resolved connection settings.
#[derive(Debug, Clone)]
pub struct Target {
    pub node: NodeAddr,
    pub credentials: Credentials,
    pub group_id: u32,
    pub timeout: Duration,
}

impl ConnectionArgs {
    pub fn resolve(&self) -> CliResult<Target> {
        let config = match &self.config {
            Some(path) => Some(
                ChannelConfig::load(path).map_err(|err| channel_error("invalid config", err))?,
            ),
            None => None,
        };

        let node = match (&self.node, &config) {
            (Some(node), _) => node
                .parse::<NodeAddr>()
                .map_err(|err| CliError::new(USAGE, format!("--node: {err}")))?,
            (None, Some(config)) => config
                .select_node()
                .map_err(|err| channel_error("invalid config", err))?
                .clone(),
            (None, None) => {
                return Err(CliError::new(
                    USAGE,
                    "either --config or --node with --cert/--key/--ca is required",
                ))
            }
        };

        let credentials = match (&self.cert, &self.key, &self.ca, &config) {
            (Some(cert), Some(key), Some(ca), _) => Credentials::new(cert, key, ca),
            (None, None, None, Some(config)) => config.authentication.clone(),
            _ => {
                return Err(CliError::new(
                    USAGE,
                    "--cert, --key and --ca must be given together (or all come from --config)",
                ))
            }
        };

        let group_id = self
            .group
            .or(config.as_ref().map(|c| c.group_id))
            .unwrap_or(1);

        let timeout = match &self.timeout {
            Some(raw) => parse_duration(raw)?,
            None => config
                .as_ref()
                .map(ChannelConfig::timeout)
                .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
        };

        Ok(Target {
            node,
            credentials,
            group_id,
            timeout,
        })
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// JSON-RPC method name (e.g. getBlockNumber).
    pub method: String,
    /// JSON array of parameters. Default: [groupId].
    #[arg(long, value_name = "JSON")]
    pub params: Option<String>,
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Exit after receiving N notifications.
    #[arg(long)]
    pub count: Option<usize>,
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
