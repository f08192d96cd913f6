use crate::error::Result;
use crate::header::FileHeader;
use crate::streamer::{
    stream_points_with, PacketStreamer, PointPacket, StreamOptions, StreamSummary, YieldHook,
};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::ops::ControlFlow;
use std::path::Path;

/// LAS 1.2 file reader
pub struct LasReader<R> {
    src: R,
    header: FileHeader,
}

impl LasReader<BufReader<File>> {
    /// Opens the file at `path` and reads its header
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        File::open(path)
            .map_err(crate::Error::from)
            .and_then(|file| LasReader::new(BufReader::new(file)))
    }
}

impl<R: Read + Seek> LasReader<R> {
    /// Setup by reading the fixed header block
    pub fn new(mut src: R) -> Result<Self> {
        let header = FileHeader::read_from(&mut src)?;
        Ok(LasReader { src, header })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Packet iterator over the point data region
    pub fn packets(&mut self, options: StreamOptions) -> Result<PacketStreamer<&mut R>> {
        PacketStreamer::new(&mut self.src, &self.header, options)
    }

    /// Pushes every packet to `on_packet`, see [crate::stream_points]
    pub fn stream<F>(&mut self, options: StreamOptions, on_packet: F) -> Result<StreamSummary>
    where
        F: FnMut(PointPacket) -> ControlFlow<()>,
    {
        self.stream_with(options, &mut (), on_packet)
    }

    pub fn stream_with<H, F>(
        &mut self,
        options: StreamOptions,
        hook: &mut H,
        on_packet: F,
    ) -> Result<StreamSummary>
    where
        H: YieldHook + ?Sized,
        F: FnMut(PointPacket) -> ControlFlow<()>,
    {
        stream_points_with(&mut self.src, &self.header, options, hook, on_packet)
    }

    pub fn into_inner(self) -> R {
        self.src
    }
}
