use std::collections::VecDeque;

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{parse_frame, peek_length, validate_length, Frame, FrameConfig};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Turns raw byte chunks from one socket into complete frames.
///
/// Chunks may split a frame anywhere (including inside the header) or
/// carry the tail of one frame and the head of the next. Frames come out
/// in arrival order, byte-identical to what the peer sent.
///
/// Accounting: `bytes_received` counts every byte pushed, `baseline`
/// counts bytes already consumed into completed frames. The difference is
/// always the length of the partial frame being accumulated.
#[derive(Debug)]
pub struct FrameReassembler {
    buf: BytesMut,
    expected_len: Option<usize>,
    bytes_received: u64,
    baseline: u64,
    ready: VecDeque<Frame>,
    config: FrameConfig,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            expected_len: None,
            bytes_received: 0,
            baseline: 0,
            ready: VecDeque::new(),
            config,
        }
    }

    /// Append one chunk and extract every frame it completes.
    ///
    /// Returns the number of frames that became ready. An invalid length
    /// prefix is an error; the stream is desynchronized after that and the
    /// reassembler must not be fed again.
    pub fn push(&mut self, chunk: &[u8]) -> Result<usize> {
        self.bytes_received += chunk.len() as u64;
        self.buf.extend_from_slice(chunk);

        let mut completed = 0;
        loop {
            let expected = match self.expected_len {
                Some(len) => len,
                None => match peek_length(&self.buf) {
                    Some(len) => {
                        let len = validate_length(len, self.config.max_frame_size)?;
                        self.expected_len = Some(len);
                        len
                    }
                    None => break,
                },
            };

            if self.pending_len() < expected as u64 {
                break;
            }

            // Split exactly one frame off; surplus stays as the next frame's head.
            let raw = self.buf.split_to(expected).freeze();
            let frame = parse_frame(raw)?;
            self.baseline += expected as u64;
            self.expected_len = None;
            trace!(
                message_type = frame.message_type,
                size = expected,
                baseline = self.baseline,
                "frame reassembled"
            );
            self.ready.push_back(frame);
            completed += 1;
        }

        debug_assert_eq!(self.pending_len(), self.buf.len() as u64);
        Ok(completed)
    }

    /// Take the oldest completed frame.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.ready.pop_front()
    }

    /// True if bytes of an incomplete frame are buffered.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Declared length of the frame being accumulated, once known.
    pub fn expected_len(&self) -> Option<usize> {
        self.expected_len
    }

    /// Total bytes pushed so far.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Bytes consumed into completed frames.
    pub fn baseline(&self) -> u64 {
        self.baseline
    }

    /// Current reassembler configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn pending_len(&self) -> u64 {
        self.bytes_received - self.baseline
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, Bytes};

    use super::*;
    use crate::codec::{encode_frame, HEADER_SIZE};
    use crate::error::FrameError;
    use crate::seq::CorrelationId;

    fn sample_frames() -> Vec<Frame> {
        vec![
            Frame::new(
                0x12,
                CorrelationId::generate(),
                0,
                Bytes::from_static(b"{\"jsonrpc\":\"2.0\",\"result\":\"0x1\"}"),
            ),
            Frame::new(0x1001, CorrelationId::generate(), 0, Bytes::new()),
            Frame::new(
                0x1002,
                CorrelationId::generate(),
                -3,
                Bytes::from(vec![0xAB; 97]),
            ),
        ]
    }

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            encode_frame(frame, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn drain(r: &mut FrameReassembler) -> Vec<Frame> {
        std::iter::from_fn(|| r.next_frame()).collect()
    }

    #[test]
    fn single_chunk_with_coalesced_frames() {
        let frames = sample_frames();
        let mut r = FrameReassembler::new();
        assert_eq!(r.push(&wire(&frames)).unwrap(), 3);
        assert_eq!(drain(&mut r), frames);
        assert!(!r.has_partial());
    }

    #[test]
    fn byte_by_byte_delivery() {
        let frames = sample_frames();
        let bytes = wire(&frames);
        let mut r = FrameReassembler::new();
        let mut out = Vec::new();
        for b in &bytes {
            r.push(std::slice::from_ref(b)).unwrap();
            out.extend(drain(&mut r));
        }
        assert_eq!(out, frames);
        assert_eq!(r.baseline(), bytes.len() as u64);
        assert_eq!(r.bytes_received(), bytes.len() as u64);
    }

    #[test]
    fn every_pair_of_split_points() {
        let frames = sample_frames();
        let bytes = wire(&frames);

        for i in 0..=bytes.len() {
            for j in i..=bytes.len() {
                let mut r = FrameReassembler::new();
                r.push(&bytes[..i]).unwrap();
                r.push(&bytes[i..j]).unwrap();
                r.push(&bytes[j..]).unwrap();
                assert_eq!(drain(&mut r), frames, "split at {i},{j}");
                assert!(!r.has_partial());
            }
        }
    }

    #[test]
    fn pseudo_random_chunking() {
        let frames: Vec<Frame> = (0..40u8)
            .map(|n| {
                Frame::new(
                    0x12,
                    CorrelationId::generate(),
                    0,
                    Bytes::from(vec![n; n as usize * 7]),
                )
            })
            .collect();
        let bytes = wire(&frames);

        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        for _ in 0..50 {
            let mut r = FrameReassembler::new();
            let mut out = Vec::new();
            let mut pos = 0;
            while pos < bytes.len() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                let step = 1 + (state >> 33) as usize % 300;
                let end = (pos + step).min(bytes.len());
                r.push(&bytes[pos..end]).unwrap();
                out.extend(drain(&mut r));
                pos = end;
            }
            assert_eq!(out, frames);
        }
    }

    #[test]
    fn tail_of_one_frame_and_head_of_next() {
        let frames = sample_frames();
        let bytes = wire(&frames[..2]);
        let first_len = frames[0].wire_size();

        let mut r = FrameReassembler::new();
        assert_eq!(r.push(&bytes[..first_len - 3]).unwrap(), 0);
        assert_eq!(r.expected_len(), Some(first_len));
        assert_eq!(r.push(&bytes[first_len - 3..first_len + 2]).unwrap(), 1);
        assert!(r.has_partial());
        assert_eq!(r.expected_len(), None);
        assert_eq!(r.push(&bytes[first_len + 2..]).unwrap(), 1);
        assert_eq!(drain(&mut r), frames[..2].to_vec());
    }

    #[test]
    fn length_shorter_than_header_is_rejected() {
        let mut bad = BytesMut::new();
        bad.put_u32(HEADER_SIZE as u32 - 1);
        let mut r = FrameReassembler::new();
        assert!(matches!(
            r.push(&bad),
            Err(FrameError::LengthTooShort(41))
        ));
    }

    #[test]
    fn oversized_frame_is_rejected_before_buffering() {
        let mut bad = BytesMut::new();
        bad.put_u32(4096);
        let mut r = FrameReassembler::with_config(FrameConfig {
            max_frame_size: 1024,
        });
        assert!(matches!(
            r.push(&bad),
            Err(FrameError::FrameTooLarge { size: 4096, max: 1024 })
        ));
    }

    #[test]
    fn partial_header_waits_for_more() {
        let mut r = FrameReassembler::new();
        assert_eq!(r.push(&[0, 0]).unwrap(), 0);
        assert_eq!(r.expected_len(), None);
        assert!(r.has_partial());
        assert!(r.next_frame().is_none());
    }
}
