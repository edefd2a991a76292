//! MJPEG streaming session
//!
//! One session per connected client: acquire a frame, check the client is
//! still there, write it as a multipart part, release, repeat. The session
//! ends the first time the client is gone or a capture fails, and the frame
//! in hand is always released first.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::capture::{FrameBuffer, FrameSource};
use crate::CaptureError;

pub const BOUNDARY: &str = "frame";
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// The client went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

/// Where a session writes its parts.
pub trait PartSink {
    fn is_connected(&self) -> bool;

    fn write_part(&mut self, part: Bytes) -> Result<(), Disconnected>;
}

/// Parts handed to the HTTP body through a bounded channel. The receiver is
/// dropped with the response body, which is how a disconnect shows up here.
pub struct ChannelSink {
    tx: flume::Sender<Bytes>,
}

impl ChannelSink {
    pub fn new(tx: flume::Sender<Bytes>) -> Self {
        Self { tx }
    }
}

impl PartSink for ChannelSink {
    fn is_connected(&self) -> bool {
        !self.tx.is_disconnected()
    }

    fn write_part(&mut self, part: Bytes) -> Result<(), Disconnected> {
        self.tx.send(part).map_err(|_| Disconnected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    ClientDisconnected,
    CaptureFailed(CaptureError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames_acquired: u64,
    pub parts_written: u64,
    pub end: SessionEnd,
}

/// Boundary line and part headers for a frame of `len` bytes.
pub fn part_header(len: usize) -> String {
    format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY, len
    )
}

/// A complete part: headers, the frame bytes verbatim, trailing CRLF.
pub fn encode_part(frame: &FrameBuffer) -> Bytes {
    let header = part_header(frame.len());
    let mut part = BytesMut::with_capacity(header.len() + frame.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(frame.data());
    part.put_slice(b"\r\n");
    part.freeze()
}

/// Stream frames to `sink` until the client disconnects or capture fails.
pub fn run_stream_session(source: &FrameSource, sink: &mut impl PartSink) -> SessionSummary {
    let mut frames_acquired = 0;
    let mut parts_written = 0;

    let end = loop {
        let frame = match source.acquire() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Stream capture failed: {}", e);
                break SessionEnd::CaptureFailed(e);
            }
        };
        frames_acquired += 1;

        if !sink.is_connected() {
            source.release(frame);
            break SessionEnd::ClientDisconnected;
        }

        let written = sink.write_part(encode_part(&frame));
        source.release(frame);
        if written.is_err() {
            break SessionEnd::ClientDisconnected;
        }
        parts_written += 1;
        metrics::counter!("edgecam_stream_parts").increment(1);

        if !sink.is_connected() {
            break SessionEnd::ClientDisconnected;
        }
    };

    debug!(
        frames_acquired,
        parts_written, "stream session ended: {:?}", end
    );
    SessionSummary {
        frames_acquired,
        parts_written,
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticSensor;
    use crate::{CaptureConfig, PixelFormat};

    #[test]
    fn header_announces_exact_length() {
        assert_eq!(
            part_header(1234),
            "--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 1234\r\n\r\n"
        );
    }

    #[test]
    fn part_carries_frame_bytes_verbatim() {
        let config = CaptureConfig {
            width: 48,
            height: 32,
            format: PixelFormat::Jpeg,
            frame_interval_ms: 0,
            ..CaptureConfig::default()
        };
        let source = FrameSource::initialize(&config, Box::new(SyntheticSensor::new())).unwrap();
        let frame = source.acquire().unwrap();

        let part = encode_part(&frame);
        let header = part_header(frame.len());
        assert!(part.starts_with(header.as_bytes()));
        assert_eq!(&part[header.len()..part.len() - 2], frame.data());
        assert!(part.ends_with(b"\r\n"));
        source.release(frame);
    }

    #[test]
    fn channel_sink_reports_dropped_receiver() {
        let (tx, rx) = flume::bounded(1);
        let mut sink = ChannelSink::new(tx);
        assert!(sink.is_connected());
        sink.write_part(Bytes::from_static(b"x")).unwrap();
        drop(rx);
        assert!(!sink.is_connected());
        assert_eq!(sink.write_part(Bytes::from_static(b"y")), Err(Disconnected));
    }
}
