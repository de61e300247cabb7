use std::fmt;

use bcos_channel_client::ChannelError;

// Process exit codes. 124 matches timeout(1).
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    let code = match &err {
        ChannelError::Network(_) => TRANSPORT_ERROR,
        ChannelError::Timeout(_) => TIMEOUT,
        ChannelError::Protocol(_) => DATA_INVALID,
        ChannelError::Application(_) => FAILURE,
        ChannelError::Config(_) => USAGE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn channel_errors_map_to_exit_codes() {
        let cases = [
            (ChannelError::Network("down".into()), TRANSPORT_ERROR),
            (ChannelError::Timeout(Duration::from_secs(1)), TIMEOUT),
            (ChannelError::Protocol("bad".into()), DATA_INVALID),
            (ChannelError::Application(serde_json::json!({"error": 1})), FAILURE),
            (ChannelError::Config("nodes".into()), USAGE),
        ];
        for (err, code) in cases {
            let cli = channel_error("call failed", err);
            assert_eq!(cli.code, code);
            assert!(cli.message.starts_with("call failed: "));
        }
    }
}
