mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::exit::{CliError, INTERNAL};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "bcos-channel", version, about = "Channel protocol client CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start runtime: {err}")))
        .and_then(|runtime| runtime.block_on(cmd::run(cli.command, format)));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "bcos-channel",
            "call",
            "getBlockNumber",
            "--node",
            "127.0.0.1:20200",
            "--cert",
            "sdk.crt",
            "--key",
            "sdk.key",
            "--ca",
            "ca.crt",
            "--params",
            "[1]",
        ])
        .expect("call args should parse");

        match cli.command {
            Command::Call(args) => {
                assert_eq!(args.method, "getBlockNumber");
                assert_eq!(args.params.as_deref(), Some("[1]"));
                assert_eq!(args.connection.node.as_deref(), Some("127.0.0.1:20200"));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn parses_watch_blocks_subcommand() {
        let cli = Cli::try_parse_from([
            "bcos-channel",
            "--format",
            "json",
            "watch-blocks",
            "--config",
            "conf/config.json",
            "--count",
            "3",
        ])
        .expect("watch-blocks args should parse");

        match cli.command {
            Command::WatchBlocks(args) => assert_eq!(args.count, Some(3)),
            other => panic!("expected watch-blocks, got {other:?}"),
        }
    }

    #[test]
    fn call_requires_method() {
        let err = Cli::try_parse_from(["bcos-channel", "call"])
            .expect_err("missing method should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
