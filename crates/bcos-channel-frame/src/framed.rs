use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reassembler::FrameReassembler;

/// tokio-util codec for channel frames.
///
/// Decoding hands every chunk `FramedRead` delivers to a
/// [`FrameReassembler`], so a connection's framing state lives in one place.
/// A framing error is reported only after every frame completed ahead of
/// the bad bytes has been yielded.
#[derive(Debug, Default)]
pub struct ChannelCodec {
    reassembler: FrameReassembler,
    failed: Option<FrameError>,
}

impl ChannelCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            reassembler: FrameReassembler::with_config(config),
            failed: None,
        }
    }

    /// Borrow the underlying reassembler.
    pub fn reassembler(&self) -> &FrameReassembler {
        &self.reassembler
    }
}

impl Decoder for ChannelCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if !src.is_empty() && self.failed.is_none() {
            let chunk = src.split();
            if let Err(err) = self.reassembler.push(&chunk) {
                self.failed = Some(err);
            }
        }
        if let Some(frame) = self.reassembler.next_frame() {
            return Ok(Some(frame));
        }
        match self.failed.take() {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if self.reassembler.has_partial() => Err(FrameError::ConnectionClosed),
            None => Ok(None),
        }
    }
}

impl Encoder<Frame> for ChannelCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        encode_frame(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::message::MessageType;

    #[tokio::test]
    async fn frames_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut writer = FramedWrite::new(client, ChannelCodec::new());
        let mut reader = FramedRead::new(server, ChannelCodec::new());

        let sent = vec![
            Frame::request(MessageType::Query, Bytes::from_static(b"{\"method\":\"getBlockNumber\"}")),
            Frame::request(MessageType::AmopClientTopics, Bytes::from(vec![b'x'; 300])),
        ];

        let to_send = sent.clone();
        let send_task = tokio::spawn(async move {
            for frame in to_send {
                writer.send(frame).await.unwrap();
            }
        });

        for expected in &sent {
            let got = reader.next().await.unwrap().unwrap();
            assert_eq!(&got, expected);
        }
        send_task.await.unwrap();
    }

    #[tokio::test]
    async fn eof_mid_frame_is_connection_closed() {
        let (mut client, server) = tokio::io::duplex(256);
        let mut wire = BytesMut::new();
        encode_frame(&Frame::request(MessageType::Query, Bytes::from_static(b"{}")), &mut wire)
            .unwrap();
        client.write_all(&wire[..20]).await.unwrap();
        drop(client);

        let mut reader = FramedRead::new(server, ChannelCodec::new());
        let err = reader.next().await.unwrap().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn frames_ahead_of_a_bad_header_are_yielded_first() {
        let (mut client, server) = tokio::io::duplex(256);
        let good = Frame::request(
            MessageType::ChannelRpcRequest,
            Bytes::from_static(b"{\"result\":1}"),
        );
        let mut wire = BytesMut::new();
        encode_frame(&good, &mut wire).unwrap();
        wire.extend_from_slice(&3u32.to_be_bytes());
        client.write_all(&wire).await.unwrap();

        let mut reader = FramedRead::new(server, ChannelCodec::new());
        let first = reader.next().await.unwrap().unwrap();
        assert_eq!(first, good);
        let err = reader.next().await.unwrap().unwrap_err();
        assert!(matches!(err, FrameError::LengthTooShort(3)));
    }

    #[tokio::test]
    async fn clean_eof_ends_stream() {
        let (client, server) = tokio::io::duplex(16);
        drop(client);
        let mut reader = FramedRead::new(server, ChannelCodec::new());
        assert!(reader.next().await.is_none());
        assert_eq!(reader.decoder().reassembler().bytes_received(), 0);
    }
}
