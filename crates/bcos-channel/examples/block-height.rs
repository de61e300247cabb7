//! Track the block height of a group across every configured node.
//!
//! ```text
//! cargo run --example block-height --features cli -- conf/config.json
//! ```

use std::time::Duration;

use bcos_channel::{ChannelClient, ChannelConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "conf/config.json".to_string());
    let config = ChannelConfig::load(&path)?;

    let client = ChannelClient::new();
    client
        .track_block_height(config.group_id, &config.nodes, &config.authentication)
        .await?;

    let node = config.select_node()?;
    let reply = client
        .query(
            node,
            &config.authentication,
            "getBlockNumber",
            serde_json::json!([config.group_id]),
            config.timeout(),
        )
        .await?;
    println!("getBlockNumber via {node}: {}", reply["result"]);

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        println!(
            "group {} height {:?}",
            config.group_id,
            client.block_height(config.group_id)
        );
    }

    client.shutdown();
    Ok(())
}
