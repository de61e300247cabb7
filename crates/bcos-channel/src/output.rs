use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    node: &'a str,
    method: &'a str,
    response: &'a Value,
    timestamp: String,
}

pub fn print_reply(node: &str, method: &str, response: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                node,
                method,
                response,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let result = response.get("result").unwrap_or(response);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NODE", "METHOD", "RESULT"])
                .add_row(vec![node.to_string(), method.to_string(), value_preview(result)]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let result = response.get("result").unwrap_or(response);
            println!(
                "{}",
                serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string())
            );
        }
    }
}

#[derive(Serialize)]
struct BlockOutput<'a> {
    node: &'a str,
    group_id: u32,
    block_height: u64,
    timestamp: String,
}

pub fn print_block(node: &str, group_id: u32, block_height: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = BlockOutput {
                node,
                group_id,
                block_height,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NODE", "GROUP", "HEIGHT"])
                .add_row(vec![
                    node.to_string(),
                    group_id.to_string(),
                    block_height.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("group={group_id} height={block_height} node={node}");
        }
    }
}

fn value_preview(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
