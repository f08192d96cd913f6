//! Packetized streaming of the point data region.
//!
//! [PacketStreamer] walks the point records in consecutive byte ranges of
//! `packet_size * point_record_size` bytes, decoding one range per packet.
//! Only one packet is held in memory at a time.

use crate::error::{Error, Result};
use crate::header::FileHeader;
use crate::point::{PointDecoder, PointRecord};
use crate::transform::Precision;
use log::{debug, info, warn};
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::ops::ControlFlow;
use std::thread;
use std::time::Duration;

/// Packet size used when none is given, in points
pub const DEFAULT_PACKET_SIZE: usize = 100_000;

/// Half open range `[start, end)` of absolute file offsets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// What happens to the points left over when `point_count` is not a
/// multiple of the packet size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RemainderPolicy {
    /// Only whole packets are read, trailing points are never delivered
    #[default]
    Drop,
    /// Trailing points are delivered as a final, shorter packet
    EmitShortPacket,
}

/// Streaming configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamOptions {
    /// Points per packet
    pub packet_size: usize,
    pub remainder: RemainderPolicy,
    /// Rounding applied to positions before they are handed out
    pub precision: Precision,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            packet_size: DEFAULT_PACKET_SIZE,
            remainder: RemainderPolicy::default(),
            precision: Precision::default(),
        }
    }
}

impl StreamOptions {
    pub fn new(packet_size: usize) -> Self {
        StreamOptions {
            packet_size,
            ..Default::default()
        }
    }

    pub fn with_remainder(mut self, remainder: RemainderPolicy) -> Self {
        self.remainder = remainder;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }
}

/// Decoded points of one byte range, in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointPacket {
    /// Sequence number of this packet, starting at 0
    pub index: u64,
    /// File index of the first point in this packet
    pub first_point: u64,
    pub points: Vec<PointRecord>,
}

impl PointPacket {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PointRecord> {
        self.points.iter()
    }

    /// Interleaved `x, y, z` positions, ready for a vertex buffer.
    pub fn positions_f32(&self) -> Vec<f32> {
        self.points
            .iter()
            .flat_map(|p| [p.position.x as f32, p.position.y as f32, p.position.z as f32])
            .collect()
    }

    /// Interleaved `r, g, b` colors in `[0, 1]`.
    pub fn colors_f32(&self) -> Vec<f32> {
        self.points
            .iter()
            .flat_map(|p| [p.color.red as f32, p.color.green as f32, p.color.blue as f32])
            .collect()
    }
}

impl IntoIterator for PointPacket {
    type Item = PointRecord;
    type IntoIter = std::vec::IntoIter<PointRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a> IntoIterator for &'a PointPacket {
    type Item = &'a PointRecord;
    type IntoIter = std::slice::Iter<'a, PointRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Called between two packets so a single threaded host can run other work.
pub trait YieldHook {
    fn yield_now(&mut self);
}

/// No pause between packets
impl YieldHook for () {
    fn yield_now(&mut self) {}
}

/// Sleeps for a fixed, usually tiny, duration between packets.
#[derive(Clone, Copy, Debug)]
pub struct Sleep(pub Duration);

impl YieldHook for Sleep {
    fn yield_now(&mut self) {
        thread::sleep(self.0)
    }
}

/// Outcome of a completed or cancelled stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub packets: u64,
    pub points: u64,
    /// Points never read because of [RemainderPolicy::Drop] or cancellation
    pub skipped_points: u64,
    /// The consumer asked to stop before the last packet
    pub cancelled: bool,
}

/// Reads the point data region packet by packet.
///
/// State is the next byte range and the number of packets still to produce;
/// each call to [next_packet] reads and decodes one range and advances the
/// cursor. After an error the streamer is exhausted.
///
/// [next_packet]: Self::next_packet
pub struct PacketStreamer<R> {
    src: R,
    decoder: PointDecoder,
    packet_bytes: u64,
    data_end: u64,
    next_start: u64,
    remaining_packets: u64,
    packets_emitted: u64,
    points_emitted: u64,
    point_count: u64,
    buffer: Vec<u8>,
}

impl<R: Read + Seek> PacketStreamer<R> {
    /// Validates the point format and packet size, no bytes are read yet.
    pub fn new(src: R, header: &FileHeader, options: StreamOptions) -> Result<Self> {
        let decoder = PointDecoder::new(header, options.precision)?;
        if options.packet_size == 0 {
            return Err(Error::InvalidPacketSize);
        }
        let record_size = u64::from(header.point_record_size);
        let points_bytes = header.points_byte_len();
        let packet_bytes = (options.packet_size as u64).saturating_mul(record_size);
        // reads are clamped to the region, so only the clamped size must be addressable
        if usize::try_from(packet_bytes.min(points_bytes)).is_err() {
            return Err(Error::InvalidPacketSize);
        }

        let full_packets = points_bytes / packet_bytes;
        let remainder_bytes = points_bytes % packet_bytes;
        let remaining_packets = match options.remainder {
            RemainderPolicy::EmitShortPacket if remainder_bytes > 0 => full_packets + 1,
            _ => full_packets,
        };
        if options.remainder == RemainderPolicy::Drop && remainder_bytes > 0 {
            warn!(
                "{} trailing points do not fill a packet of {} and will not be read",
                remainder_bytes / record_size,
                options.packet_size
            );
        }

        let data = header.point_data_range();
        debug!(
            "streaming {} points from {} in {} packets of {} points",
            header.point_count, data, remaining_packets, options.packet_size
        );

        Ok(PacketStreamer {
            src,
            decoder,
            packet_bytes,
            data_end: data.end,
            next_start: data.start,
            remaining_packets,
            packets_emitted: 0,
            points_emitted: 0,
            point_count: u64::from(header.point_count),
            buffer: Vec::new(),
        })
    }

    /// The range the next packet will be read from, `None` once done.
    pub fn next_range(&self) -> Option<ByteRange> {
        if self.remaining_packets == 0 {
            return None;
        }
        Some(ByteRange {
            start: self.next_start,
            end: self.next_start.saturating_add(self.packet_bytes).min(self.data_end),
        })
    }

    pub fn remaining_packets(&self) -> u64 {
        self.remaining_packets
    }

    pub fn packets_emitted(&self) -> u64 {
        self.packets_emitted
    }

    pub fn points_emitted(&self) -> u64 {
        self.points_emitted
    }

    /// Reads, decodes and returns the next packet.
    pub fn next_packet(&mut self) -> Result<Option<PointPacket>> {
        let Some(range) = self.next_range() else {
            return Ok(None);
        };
        match self.read_packet(range) {
            Ok(packet) => {
                self.next_start = range.end;
                self.remaining_packets -= 1;
                self.packets_emitted += 1;
                self.points_emitted += packet.len() as u64;
                Ok(Some(packet))
            }
            Err(e) => {
                self.remaining_packets = 0;
                Err(e)
            }
        }
    }

    fn read_packet(&mut self, range: ByteRange) -> Result<PointPacket> {
        let expected = usize::try_from(range.len()).map_err(|_| Error::InvalidPacketSize)?;
        self.buffer.clear();
        self.buffer.reserve(expected);
        self.src.seek(SeekFrom::Start(range.start))?;
        (&mut self.src)
            .take(range.len())
            .read_to_end(&mut self.buffer)?;
        if self.buffer.len() < expected {
            return Err(Error::TruncatedPointData {
                offset: range.start,
                expected,
                actual: self.buffer.len(),
            });
        }

        let points = self.decoder.decode_all(&self.buffer)?;
        debug!(
            "packet {} from {}: {} points",
            self.packets_emitted,
            range,
            points.len()
        );
        Ok(PointPacket {
            index: self.packets_emitted,
            first_point: self.points_emitted,
            points,
        })
    }

    /// Summary of what has been delivered so far.
    pub fn summary(&self, cancelled: bool) -> StreamSummary {
        StreamSummary {
            packets: self.packets_emitted,
            points: self.points_emitted,
            skipped_points: self.point_count - self.points_emitted,
            cancelled,
        }
    }

    pub fn into_inner(self) -> R {
        self.src
    }
}

impl<R: Read + Seek> Iterator for PacketStreamer<R> {
    type Item = Result<PointPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining_packets as usize;
        (0, Some(n))
    }
}

/// Streams every packet of `src` to `on_packet`, in file order.
///
/// Returning [ControlFlow::Break] from `on_packet` stops the stream once the
/// current packet has been handed over. Packets delivered before an error
/// stay delivered.
pub fn stream_points<R, F>(
    src: R,
    header: &FileHeader,
    options: StreamOptions,
    on_packet: F,
) -> Result<StreamSummary>
where
    R: Read + Seek,
    F: FnMut(PointPacket) -> ControlFlow<()>,
{
    stream_points_with(src, header, options, &mut (), on_packet)
}

/// [stream_points] calling `hook` between two packets.
pub fn stream_points_with<R, H, F>(
    src: R,
    header: &FileHeader,
    options: StreamOptions,
    hook: &mut H,
    mut on_packet: F,
) -> Result<StreamSummary>
where
    R: Read + Seek,
    H: YieldHook + ?Sized,
    F: FnMut(PointPacket) -> ControlFlow<()>,
{
    let mut streamer = PacketStreamer::new(src, header, options)?;
    let mut cancelled = false;
    while let Some(packet) = streamer.next_packet()? {
        if on_packet(packet).is_break() {
            cancelled = streamer.remaining_packets() > 0;
            break;
        }
        if streamer.remaining_packets() > 0 {
            hook.yield_now();
        }
    }
    let summary = streamer.summary(cancelled);
    info!(
        "streamed {} points in {} packets ({} skipped{})",
        summary.points,
        summary.packets,
        summary.skipped_points,
        if summary.cancelled { ", cancelled" } else { "" }
    );
    Ok(summary)
}
