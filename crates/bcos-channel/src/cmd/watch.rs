use std::time::Duration;

use bcos_channel_client::ChannelClient;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cmd::WatchArgs;
use crate::exit::{channel_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_block, OutputFormat};

const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

pub async fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let target = args.connection.resolve()?;
    let client = ChannelClient::new();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = client
        .register_block_notify(
            target.group_id,
            move |group_id, height| {
                let _ = tx.send((group_id, height));
            },
            &target.node,
            &target.credentials,
        )
        .await
        .map_err(|err| channel_error("subscribe failed", err))?;

    let node = target.node.to_string();
    info!(node = %node, group_id = target.group_id, "watching block notifications");

    let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);
    let mut printed = 0usize;
    let outcome = loop {
        tokio::select! {
            notification = rx.recv() => {
                let Some((group_id, height)) = notification else {
                    break Ok(SUCCESS);
                };
                print_block(&node, group_id, height, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break Ok(SUCCESS);
                }
            }
            _ = liveness.tick() => {
                // Subscriptions are fire-and-forget; a dropped connection
                // would otherwise leave us waiting forever.
                if client.connection_count() == 0 {
                    warn!(node = %node, "connection lost");
                    break Err(CliError::new(
                        TRANSPORT_ERROR,
                        format!("disconnected from {node}"),
                    ));
                }
            }
            _ = tokio::signal::ctrl_c() => break Ok(SUCCESS),
        }
    };

    client.unregister_block_notify(handle);
    client.shutdown();
    outcome
}
