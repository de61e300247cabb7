//! Routes inbound frames to pending requests and push subscribers.

use bcos_channel_frame::{decode_amop, Frame, MessageType};
use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::{ChannelError, Result};
use crate::event_log::EventLogPush;
use crate::pending::{outcome_from, Completion, PendingKind, PendingTable};
use crate::subscription::{BlockNotifyRegistry, EventLogRegistry};

/// Client-wide request and subscription state shared by every connection.
#[derive(Default)]
pub struct Dispatcher {
    pub(crate) pending: PendingTable,
    pub(crate) block_notify: BlockNotifyRegistry,
    pub(crate) event_logs: EventLogRegistry,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub fn block_notify(&self) -> &BlockNotifyRegistry {
        &self.block_notify
    }

    pub fn event_logs(&self) -> &EventLogRegistry {
        &self.event_logs
    }

    /// Handle one complete inbound frame.
    ///
    /// An `Err` is fatal for the connection the frame arrived on: the
    /// stream is no longer trustworthy.
    pub fn dispatch(&self, frame: Frame) -> Result<()> {
        let Some(kind) = frame.kind() else {
            return Err(ChannelError::Protocol(format!(
                "unknown type message received, type=0x{:x}",
                frame.message_type
            )));
        };
        trace!(message_type = %kind, seq = %frame.seq, "dispatching frame");

        match kind {
            MessageType::ChannelRpcRequest => self.on_rpc_response(frame, None),
            MessageType::TransactionNotify => {
                self.on_rpc_response(frame, Some(PendingKind::Transaction))
            }
            MessageType::BlockNotify => self.on_block_notify(frame),
            MessageType::ClientRegisterEventLog => self.on_register_ack(frame),
            MessageType::EventLogPush => self.on_event_log_push(frame),
            MessageType::Query | MessageType::AmopClientTopics => Err(ChannelError::Protocol(
                format!("unexpected inbound message type {kind}"),
            )),
        }
    }

    /// RPC replies and transaction notifications. `judge_as` overrides the
    /// entry's own kind when deciding whether the reply is final.
    fn on_rpc_response(&self, frame: Frame, judge_as: Option<PendingKind>) -> Result<()> {
        let seq = frame.seq;
        if !self.pending.contains(&seq) {
            debug!(%seq, "reply for unknown or completed request dropped");
            return Ok(());
        }

        let code = frame.channel_error();
        if !code.is_success() {
            self.pending
                .resolve(&seq, Err(ChannelError::Network(code.to_string())));
            return Ok(());
        }

        let response: Value = serde_json::from_slice(&frame.payload)?;
        let completion = self.pending.complete(&seq, |kind| {
            let kind = judge_as.unwrap_or(kind);
            if kind.is_answered(&response) {
                Some(outcome_from(response))
            } else {
                None
            }
        });
        match completion {
            Completion::Resolved => {}
            Completion::NotReady => debug!(%seq, "non-final transaction reply dropped"),
            Completion::Unknown => debug!(%seq, "reply raced with completion, dropped"),
        }
        Ok(())
    }

    fn on_register_ack(&self, frame: Frame) -> Result<()> {
        let seq = frame.seq;
        if !self.pending.contains(&seq) {
            debug!(%seq, "registration ack for unknown request dropped");
            return Ok(());
        }

        let code = frame.channel_error();
        if !code.is_success() {
            self.pending
                .resolve(&seq, Err(ChannelError::Network(code.to_string())));
            return Ok(());
        }

        let (_, body) = decode_amop(&frame.payload)?;
        let response: Value = serde_json::from_slice(&body)?;
        self.pending.resolve(&seq, outcome_from(response));
        Ok(())
    }

    fn on_block_notify(&self, frame: Frame) -> Result<()> {
        let code = frame.channel_error();
        if !code.is_success() {
            warn!(error = %code, "block notification with error code dropped");
            return Ok(());
        }

        let (_, body) = decode_amop(&frame.payload)?;
        let (group_id, height) = parse_block_notify(&body)?;
        let delivered = self.block_notify.notify(group_id, height);
        trace!(group_id, height, delivered, "block notification");
        Ok(())
    }

    fn on_event_log_push(&self, frame: Frame) -> Result<()> {
        let push = EventLogPush::from_json(&frame.payload)?;
        if !self.event_logs.deliver(&push) {
            debug!(filter_id = %push.filter_id, "event log push for unregistered filter dropped");
        }
        Ok(())
    }
}

/// Parse the ASCII `"<groupId>,<blockHeight>"` block-notify body.
pub(crate) fn parse_block_notify(body: &Bytes) -> Result<(u32, u64)> {
    let malformed = || {
        ChannelError::Protocol(format!(
            "malformed block notification: {:?}",
            String::from_utf8_lossy(body)
        ))
    };
    let text = std::str::from_utf8(body).map_err(|_| malformed())?;
    let text = text.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0');
    let (group, height) = text.split_once(',').ok_or_else(malformed)?;
    let group_id = group.trim().parse::<u32>().map_err(|_| malformed())?;
    let height = height.trim().parse::<u64>().map_err(|_| malformed())?;
    Ok((group_id, height))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bcos_channel_frame::{encode_amop, CorrelationId};
    use serde_json::json;

    use super::*;

    fn reply(message_type: MessageType, seq: CorrelationId, code: i32, body: Value) -> Frame {
        Frame::new(
            message_type.code(),
            seq,
            code,
            Bytes::from(serde_json::to_vec(&body).unwrap()),
        )
    }

    #[test]
    fn query_reply_resolves() {
        let d = Dispatcher::new();
        let seq = CorrelationId::generate();
        let mut rx = d.pending.register(seq, 1, PendingKind::Query);

        d.dispatch(reply(
            MessageType::ChannelRpcRequest,
            seq,
            0,
            json!({"jsonrpc": "2.0", "id": 1, "result": "0x10"}),
        ))
        .unwrap();

        assert_eq!(rx.try_recv().unwrap().unwrap()["result"], "0x10");
        assert!(d.pending.is_empty());
    }

    #[test]
    fn transaction_ack_then_receipt() {
        let d = Dispatcher::new();
        let seq = CorrelationId::generate();
        let mut rx = d.pending.register(seq, 1, PendingKind::Transaction);

        d.dispatch(reply(MessageType::ChannelRpcRequest, seq, 0, json!({"result": "0xhash"})))
            .unwrap();
        assert!(rx.try_recv().is_err());
        assert!(d.pending.contains(&seq));

        d.dispatch(reply(
            MessageType::TransactionNotify,
            seq,
            0,
            json!({"status": "0x0", "transactionHash": "0xhash"}),
        ))
        .unwrap();
        assert_eq!(rx.try_recv().unwrap().unwrap()["status"], "0x0");
    }

    #[test]
    fn transaction_notify_uses_write_predicate_for_query_entries() {
        let d = Dispatcher::new();
        let seq = CorrelationId::generate();
        let _rx = d.pending.register(seq, 1, PendingKind::Query);

        d.dispatch(reply(MessageType::TransactionNotify, seq, 0, json!({"result": "0x1"})))
            .unwrap();
        assert!(d.pending.contains(&seq));
    }

    #[test]
    fn error_field_is_application_error() {
        let d = Dispatcher::new();
        let seq = CorrelationId::generate();
        let mut rx = d.pending.register(seq, 1, PendingKind::Query);

        d.dispatch(reply(
            MessageType::ChannelRpcRequest,
            seq,
            0,
            json!({"error": {"code": -32601, "message": "method not found"}}),
        ))
        .unwrap();
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, ChannelError::Application(v) if v["error"]["code"] == -32601));
    }

    #[test]
    fn nonzero_code_fails_with_network_error() {
        let d = Dispatcher::new();
        let seq = CorrelationId::generate();
        let mut rx = d.pending.register(seq, 1, PendingKind::Query);

        let frame = Frame::new(MessageType::ChannelRpcRequest.code(), seq, 100, Bytes::new());
        d.dispatch(frame).unwrap();
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, ChannelError::Network(msg) if msg == "node unreachable"));
    }

    #[test]
    fn unknown_seq_is_dropped() {
        let d = Dispatcher::new();
        let frame = Frame::new(
            MessageType::ChannelRpcRequest.code(),
            CorrelationId::generate(),
            0,
            Bytes::from_static(b"not json at all"),
        );
        assert!(d.dispatch(frame).is_ok());
    }

    #[test]
    fn undecodable_reply_is_fatal() {
        let d = Dispatcher::new();
        let seq = CorrelationId::generate();
        let _rx = d.pending.register(seq, 1, PendingKind::Query);
        let frame = Frame::new(
            MessageType::ChannelRpcRequest.code(),
            seq,
            0,
            Bytes::from_static(b"{truncated"),
        );
        assert!(matches!(d.dispatch(frame), Err(ChannelError::Protocol(_))));
    }

    #[test]
    fn unknown_type_is_fatal() {
        let d = Dispatcher::new();
        let frame = Frame::new(0x9999, CorrelationId::generate(), 0, Bytes::new());
        let err = d.dispatch(frame).unwrap_err();
        assert!(matches!(err, ChannelError::Protocol(msg) if msg.contains("0x9999")));
    }

    #[test]
    fn block_notify_fans_out_by_group() {
        let d = Dispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for group in [7u32, 7, 8] {
            let sink = Arc::clone(&seen);
            d.block_notify.register(
                group,
                Arc::new(move |g, h| sink.lock().unwrap().push((group, g, h))),
            );
        }

        let payload = encode_amop("_block_notify_7", b"7,1234").unwrap();
        d.dispatch(Frame::new(
            MessageType::BlockNotify.code(),
            CorrelationId::generate(),
            0,
            payload,
        ))
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(7, 7, 1234), (7, 7, 1234)]);
    }

    #[test]
    fn block_notify_with_error_code_is_dropped() {
        let d = Dispatcher::new();
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        d.block_notify
            .register(1, Arc::new(move |_, _| *sink.lock().unwrap() += 1));

        let payload = encode_amop("_block_notify_1", b"1,5").unwrap();
        d.dispatch(Frame::new(
            MessageType::BlockNotify.code(),
            CorrelationId::generate(),
            101,
            payload,
        ))
        .unwrap();
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn register_ack_resolves_from_amop_body() {
        let d = Dispatcher::new();
        let seq = CorrelationId::generate();
        let mut rx = d.pending.register(seq, 1, PendingKind::Registration);

        let payload = encode_amop("", br#"{"result":0}"#).unwrap();
        d.dispatch(Frame::new(
            MessageType::ClientRegisterEventLog.code(),
            seq,
            0,
            payload,
        ))
        .unwrap();
        assert_eq!(rx.try_recv().unwrap().unwrap(), json!({"result": 0}));
    }

    #[test]
    fn event_log_push_reaches_filter_callback() {
        let d = Dispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        d.event_logs.register(
            "f1",
            Arc::new(move |push: &EventLogPush| sink.lock().unwrap().push(push.logs.len())),
        );

        d.dispatch(reply(
            MessageType::EventLogPush,
            CorrelationId::generate(),
            0,
            json!({"filterID": "f1", "result": 0, "logs": [{}, {}]}),
        ))
        .unwrap();
        d.dispatch(reply(
            MessageType::EventLogPush,
            CorrelationId::generate(),
            0,
            json!({"filterID": "other", "result": 0, "logs": []}),
        ))
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn block_notify_body_parsing() {
        assert_eq!(parse_block_notify(&Bytes::from_static(b"1,100")).unwrap(), (1, 100));
        assert_eq!(parse_block_notify(&Bytes::from_static(b"2,7\0")).unwrap(), (2, 7));
        assert!(parse_block_notify(&Bytes::from_static(b"1")).is_err());
        assert!(parse_block_notify(&Bytes::from_static(b"x,1")).is_err());
    }
}
