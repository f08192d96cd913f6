//! Channel based consumer boundary.

use crate::error::Error;
use crate::header::FileHeader;
use crate::streamer::{PacketStreamer, PointPacket, StreamOptions, StreamSummary};
use log::{debug, info};
use std::io::{Read, Seek};
use std::sync::mpsc::SyncSender;

/// Everything a stream reports to its consumer.
#[derive(Debug)]
pub enum StreamEvent {
    Packet(PointPacket),
    /// The stream stopped on this error, no further events follow
    Error(Error),
    /// All packets were sent
    Finished(StreamSummary),
}

/// Sends every packet of `src` into `sender` as [StreamEvent]s.
///
/// Meant to run on its own thread. A bounded channel makes the streamer wait
/// for the consumer; dropping the receiver cancels the stream after the
/// packet in flight. Returns what actually reached the receiver.
pub fn stream_to_channel<R: Read + Seek>(
    src: R,
    header: &FileHeader,
    options: StreamOptions,
    sender: SyncSender<StreamEvent>,
) -> StreamSummary {
    let mut streamer = match PacketStreamer::new(src, header, options) {
        Ok(streamer) => streamer,
        Err(e) => {
            let _ = sender.send(StreamEvent::Error(e));
            return StreamSummary {
                skipped_points: u64::from(header.point_count),
                ..Default::default()
            };
        }
    };

    loop {
        let event = match streamer.next_packet() {
            Ok(Some(packet)) => StreamEvent::Packet(packet),
            Ok(None) => {
                let summary = streamer.summary(false);
                info!(
                    "streamed {} points in {} packets ({} skipped)",
                    summary.points, summary.packets, summary.skipped_points
                );
                StreamEvent::Finished(summary)
            }
            Err(e) => StreamEvent::Error(e),
        };
        let in_flight = match &event {
            StreamEvent::Packet(packet) => Some(packet.len() as u64),
            _ => None,
        };
        if sender.send(event).is_err() {
            let mut summary = streamer.summary(in_flight.is_some());
            if let Some(points) = in_flight {
                summary.packets -= 1;
                summary.points -= points;
                summary.skipped_points += points;
            }
            debug!("receiver dropped after {} packets, stopping", summary.packets);
            return summary;
        }
        if in_flight.is_none() {
            return streamer.summary(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::file_with_points;
    use std::io::{Cursor, SeekFrom};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::sync_channel;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn packets_then_finished() {
        let (bytes, header) = file_with_points(7, 34);
        let (tx, rx) = sync_channel(1);
        let worker = thread::spawn(move || {
            stream_to_channel(Cursor::new(bytes), &header, StreamOptions::new(3), tx)
        });

        let events: Vec<StreamEvent> = rx.iter().collect();
        let summary = worker.join().unwrap();
        assert_eq!(summary.points, 6);
        assert!(!summary.cancelled);

        assert_eq!(events.len(), 3);
        let firsts: Vec<u64> = events[..2]
            .iter()
            .map(|e| match e {
                StreamEvent::Packet(p) => p.first_point,
                other => panic!("expected a packet, got {other:?}"),
            })
            .collect();
        assert_eq!(firsts, vec![0, 3]);
        assert!(matches!(
            events[2],
            StreamEvent::Finished(StreamSummary {
                packets: 2,
                points: 6,
                skipped_points: 1,
                cancelled: false
            })
        ));
    }

    #[test]
    fn errors_are_sent_as_events() {
        let (bytes, mut header) = file_with_points(4, 34);
        header.point_format_id = 2;
        let (tx, rx) = sync_channel(4);
        let summary = stream_to_channel(Cursor::new(bytes), &header, StreamOptions::new(2), tx);
        assert_eq!(summary.packets, 0);
        assert_eq!(summary.skipped_points, 4);
        let events: Vec<StreamEvent> = rx.iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            StreamEvent::Error(Error::UnsupportedPointFormat(2))
        ));
    }

    #[test]
    fn dropped_receiver_stops_the_stream() {
        // counts the ranges the streamer asks for
        struct CountingSeeks {
            inner: Cursor<Vec<u8>>,
            seeks: Arc<AtomicUsize>,
        }
        impl Read for CountingSeeks {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                self.inner.read(buf)
            }
        }
        impl Seek for CountingSeeks {
            fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
                self.seeks.fetch_add(1, Ordering::SeqCst);
                self.inner.seek(pos)
            }
        }

        let (bytes, header) = file_with_points(100, 34);
        let seeks = Arc::new(AtomicUsize::new(0));
        let src = CountingSeeks {
            inner: Cursor::new(bytes),
            seeks: Arc::clone(&seeks),
        };
        let (tx, rx) = sync_channel(0);
        let worker =
            thread::spawn(move || stream_to_channel(src, &header, StreamOptions::new(10), tx));
        match rx.recv().unwrap() {
            StreamEvent::Packet(p) => assert_eq!(p.len(), 10),
            other => panic!("expected a packet, got {other:?}"),
        }
        drop(rx);
        let summary = worker.join().unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.packets, 1);
        assert_eq!(summary.points, 10);
        assert_eq!(summary.skipped_points, 90);
        // the delivered packet plus at most the one that found no receiver
        assert!(seeks.load(Ordering::SeqCst) <= 2);
    }
}
