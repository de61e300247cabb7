use bcos_channel_client::ChannelClient;
use serde_json::{json, Value};
use tracing::debug;

use crate::cmd::CallArgs;
use crate::exit::{channel_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_reply, OutputFormat};

pub async fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let target = args.connection.resolve()?;
    let params = parse_params(args.params.as_deref(), target.group_id)?;

    let client = ChannelClient::new();
    debug!(node = %target.node, method = %args.method, "sending query");
    let result = client
        .query(
            &target.node,
            &target.credentials,
            &args.method,
            params,
            target.timeout,
        )
        .await;
    client.shutdown();

    let response = result.map_err(|err| channel_error("call failed", err))?;
    print_reply(&target.node.to_string(), &args.method, &response, format);
    Ok(SUCCESS)
}

/// JSON-RPC params: an explicit JSON array, or `[groupId]` by default.
fn parse_params(raw: Option<&str>, group_id: u32) -> CliResult<Value> {
    let Some(raw) = raw else {
        return Ok(json!([group_id]));
    };
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| CliError::new(USAGE, format!("--params is not valid JSON: {err}")))?;
    if !value.is_array() {
        return Err(CliError::new(USAGE, "--params must be a JSON array"));
    }
    Ok(value)
}
