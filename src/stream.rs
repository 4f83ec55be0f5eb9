//! # Frame stream
//!
//! Byte-level demultiplexer: consumes the UART RX bytestream and yields
//! validated whole [`Frame`]s of either dialect in arrival order.
//!
//! The stream keeps an append-only buffer and scans it for a head marker.
//! A marker followed by a plausible length waits until the whole frame is
//! buffered, then the trailer is verified. On any mismatch exactly one
//! byte is discarded and the scan resumes, which guarantees forward
//! progress across arbitrary garbage. The stream ends exactly when the
//! byte source reports end-of-stream.

use embedded_io_async::Read;
use heapless::Vec;

use crate::frame::{Frame, FrameKind, MAX_PAYLOAD};

/// Internal scan buffer. Bounds the worst case of one partial frame plus
/// one read chunk.
const RX_BUF: usize = 128;
/// Bytes pulled from the transport per read
const READ_CHUNK: usize = 32;

const HEAD_LEN: usize = 4;
const TAIL_LEN: usize = 4;
const LEN_END: usize = HEAD_LEN + 2;

/// Why the frame sequence ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError<E> {
    /// The byte source reported end-of-stream
    Eof,
    /// Transport read failure
    Read(E),
}

/// Resynchronising demultiplexer over a UART RX half
pub struct FrameStream<R> {
    rx: R,
    buf: Vec<u8, RX_BUF>,
}

impl<R: Read> FrameStream<R> {
    pub fn new(rx: R) -> Self {
        FrameStream { rx, buf: Vec::new() }
    }

    /// Next validated frame. Suspends until at least one complete frame is
    /// decodable; a new session requires a new stream instance.
    pub async fn next(&mut self) -> Result<Frame, StreamError<R::Error>> {
        loop {
            if let Some(frame) = extract_frame(&mut self.buf) {
                return Ok(frame);
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.rx.read(&mut chunk).await.map_err(StreamError::Read)?;
            if n == 0 {
                return Err(StreamError::Eof);
            }
            push_bytes(&mut self.buf, &chunk[..n]);
        }
    }
}

/// Append received bytes, shedding the oldest buffered bytes if a garbage
/// flood ever outruns the scanner.
fn push_bytes(buf: &mut Vec<u8, RX_BUF>, bytes: &[u8]) {
    let free = RX_BUF - buf.len();
    if bytes.len() > free {
        drain_front(buf, bytes.len() - free);
    }
    let _ = buf.extend_from_slice(bytes);
}

fn drain_front(buf: &mut Vec<u8, RX_BUF>, n: usize) {
    let len = buf.len();
    if n >= len {
        buf.clear();
        return;
    }
    buf.copy_within(n.., 0);
    buf.truncate(len - n);
}

fn head_kind(window: &[u8]) -> Option<FrameKind> {
    if window.starts_with(FrameKind::Command.head()) {
        Some(FrameKind::Command)
    } else if window.starts_with(FrameKind::Report.head()) {
        Some(FrameKind::Report)
    } else {
        None
    }
}

/// Position and dialect of the first head marker in the buffer
fn find_head(buf: &[u8]) -> Option<(usize, FrameKind)> {
    buf.windows(HEAD_LEN)
        .enumerate()
        .find_map(|(i, w)| head_kind(w).map(|k| (i, k)))
}

/// How many trailing bytes could still begin a head marker
fn partial_head_len(buf: &[u8]) -> usize {
    for keep in (1..HEAD_LEN.min(buf.len() + 1)).rev() {
        let tail = &buf[buf.len() - keep..];
        if FrameKind::Command.head().starts_with(tail)
            || FrameKind::Report.head().starts_with(tail)
        {
            return keep;
        }
    }
    0
}

/// Scan the buffer for one complete frame, draining consumed and garbage
/// bytes. `None` means more bytes are needed.
fn extract_frame(buf: &mut Vec<u8, RX_BUF>) -> Option<Frame> {
    loop {
        let kind = match find_head(buf) {
            Some((idx, kind)) => {
                drain_front(buf, idx);
                kind
            }
            None => {
                // garbage; keep only a possible marker prefix at the tail
                let keep = partial_head_len(buf);
                drain_front(buf, buf.len() - keep);
                return None;
            }
        };
        if buf.len() < LEN_END {
            return None;
        }
        let len = u16::from_le_bytes([buf[4], buf[5]]) as usize;
        if len > MAX_PAYLOAD {
            // implausible length: this was not a real frame start
            drain_front(buf, 1);
            continue;
        }
        let total = LEN_END + len + TAIL_LEN;
        if buf.len() < total {
            return None;
        }
        if buf[LEN_END + len..total] != *kind.tail() {
            drain_front(buf, 1);
            continue;
        }
        match Vec::from_slice(&buf[LEN_END..LEN_END + len]) {
            Ok(payload) => {
                drain_front(buf, total);
                return Some(Frame { kind, payload });
            }
            Err(_) => {
                drain_front(buf, 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(buf: &mut Vec<u8, RX_BUF>, bytes: &[u8]) {
        push_bytes(buf, bytes);
    }

    #[test]
    fn clean_frame() {
        let mut buf = Vec::new();
        feed(&mut buf, &Frame::command(&[0x61, 0x00]).unwrap().encode());
        let frame = extract_frame(&mut buf).unwrap();
        assert_eq!(frame.kind, FrameKind::Command);
        assert_eq!(frame.payload.as_slice(), &[0x61, 0x00]);
        assert!(buf.is_empty());
    }

    #[test]
    fn garbage_prefix_resync() {
        // leading garbage, then an embedded ack
        let mut buf = Vec::new();
        feed(
            &mut buf,
            &[
                0xAA, 0xBB, 0xCC, 0xFD, 0xFC, 0xFB, 0xFA, 0x04, 0x00, 0x61, 0x01, 0x00,
                0x00, 0x04, 0x03, 0x02, 0x01,
            ],
        );
        let frame = extract_frame(&mut buf).unwrap();
        assert_eq!(frame.kind, FrameKind::Command);
        assert_eq!(frame.payload.as_slice(), &[0x61, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn interleaved_garbage_preserves_sequence() {
        let a = Frame::command(&[0xFE, 0x00]).unwrap().encode();
        let b = Frame {
            kind: FrameKind::Report,
            payload: Vec::from_slice(&[
                0x02, 0xAA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x55,
                0x00,
            ])
            .unwrap(),
        }
        .encode();
        let mut buf = Vec::new();
        feed(&mut buf, &[0xF4, 0xF3, 0x00]); // truncated marker garbage
        feed(&mut buf, &a);
        feed(&mut buf, &[0xFD, 0xFC, 0xFB]); // partial head garbage
        feed(&mut buf, &b);
        let first = extract_frame(&mut buf).unwrap();
        assert_eq!(first.kind, FrameKind::Command);
        let second = extract_frame(&mut buf).unwrap();
        assert_eq!(second.kind, FrameKind::Report);
        assert!(extract_frame(&mut buf).is_none());
    }

    #[test]
    fn split_feed_waits_for_completion() {
        let wire = Frame::command(&[0x60, 0x00, 0x00, 0x00]).unwrap().encode();
        let mut buf = Vec::new();
        feed(&mut buf, &wire[..7]);
        assert!(extract_frame(&mut buf).is_none());
        feed(&mut buf, &wire[7..]);
        let frame = extract_frame(&mut buf).unwrap();
        assert_eq!(frame.payload.as_slice(), &[0x60, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn bad_trailer_discards_one_byte_and_recovers() {
        // a false head whose trailer check fails, immediately followed by a
        // genuine frame
        let genuine = Frame::command(&[0xA0, 0x00]).unwrap().encode();
        let mut buf = Vec::new();
        feed(&mut buf, &[0xFD, 0xFC, 0xFB, 0xFA, 0x01, 0x00, 0x11, 0xDE, 0xAD, 0xBE, 0xEF]);
        feed(&mut buf, &genuine);
        let frame = extract_frame(&mut buf).unwrap();
        assert_eq!(frame.payload.as_slice(), &[0xA0, 0x00]);
    }

    #[test]
    fn oversize_length_is_treated_as_garbage() {
        let genuine = Frame::command(&[0xA3, 0x00]).unwrap().encode();
        let mut buf = Vec::new();
        feed(&mut buf, &[0xFD, 0xFC, 0xFB, 0xFA, 0xFF, 0x7F]);
        feed(&mut buf, &genuine);
        let frame = extract_frame(&mut buf).unwrap();
        assert_eq!(frame.payload.as_slice(), &[0xA3, 0x00]);
    }
}
