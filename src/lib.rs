//! Library for streaming points out of LAS 1.2 files with point data record format 3.
//!
//! Points are decoded in bounded packets so the full point array never has to
//! be held in memory:
//!
//! ```no_run
//! use las_stream::{LasReader, StreamOptions};
//! use std::ops::ControlFlow;
//!
//! let mut reader = LasReader::from_path("cloud.las")?;
//! reader.stream(StreamOptions::new(100_000), |packet| {
//!     println!("{} points", packet.len());
//!     ControlFlow::Continue(())
//! })?;
//! # Ok::<(), las_stream::Error>(())
//! ```

mod error;
mod events;
mod header;
mod point;
mod reader;
mod streamer;
mod transform;

pub use error::{Error, Result};
pub use events::*;
pub use header::*;
pub use las::{Bounds, Color, Transform, Vector, Version};
pub use point::*;
pub use reader::*;
pub use streamer::*;
pub use transform::*;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn header(point_format_id: u8, point_record_size: u16, point_count: u32) -> FileHeader {
        FileHeader {
            version: Version::new(1, 2),
            header_size: MIN_HEADER_SIZE,
            offset_to_points: MIN_HEADER_SIZE as u32,
            point_format_id,
            point_record_size,
            point_count,
            scale: Vector { x: 0.01, y: 0.01, z: 0.01 },
            offset: Vector { x: 0.0, y: 0.0, z: 0.0 },
            bounds_min: Vector::default(),
            bounds_max: Vector::default(),
        }
    }

    /// A format 3 file whose point `i` sits at `(i, -i, i / 2)`.
    pub(crate) fn file_with_points(point_count: u32, point_record_size: u16) -> (Vec<u8>, FileHeader) {
        let header = header(3, point_record_size, point_count);
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        for i in 0..point_count as i32 {
            RawPoint {
                xyz: Vector {
                    x: i * 100,
                    y: -i * 100,
                    z: i * 50,
                },
                color: Color::new((i * 1000) as u16, 0, u16::MAX),
            }
            .write_to(&mut bytes, point_record_size as usize)
            .unwrap();
        }
        (bytes, header)
    }
}
