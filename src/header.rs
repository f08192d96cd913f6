//! LAS 1.2 fixed header block.

use crate::error::{Error, Result};
use crate::streamer::ByteRange;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use las::{Bounds, Transform, Vector, Version};
use log::warn;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Size of the LAS 1.2 fixed header block
pub const MIN_HEADER_SIZE: u16 = 227;

const SIGNATURE: &[u8; 4] = b"LASF";

// Absolute byte offsets within the header block
const VERSION_MAJOR: usize = 24;
const VERSION_MINOR: usize = 25;
const HEADER_SIZE: usize = 94;
const OFFSET_TO_POINTS: usize = 96;
const POINT_FORMAT_ID: usize = 104;
const POINT_RECORD_SIZE: usize = 105;
const POINT_COUNT: usize = 107;
const SCALE: usize = 131;
const OFFSET: usize = 155;
// max x, min x, max y, min y, max z, min z
const BOUNDS: usize = 179;

/// Parsed LAS 1.2 header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FileHeader {
    pub version: Version,
    pub header_size: u16,
    pub offset_to_points: u32,
    pub point_format_id: u8,
    pub point_record_size: u16,
    pub point_count: u32,
    pub scale: Vector<f64>,
    pub offset: Vector<f64>,
    pub bounds_min: Vector<f64>,
    pub bounds_max: Vector<f64>,
}

impl FileHeader {
    /// Opens the file at `path` and reads its header.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut src = BufReader::new(File::open(path)?);
        Self::read_from(&mut src)
    }

    /// Reads the header size at byte 94, then decodes the whole fixed block.
    ///
    /// The source is left positioned at the end of the header block.
    pub fn read_from<R: Read + Seek>(src: &mut R) -> Result<Self> {
        src.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
        let header_size = src
            .read_u16::<LittleEndian>()
            .map_err(|e| eof_as_malformed(e, "source too short to hold a header size"))?;
        if header_size < MIN_HEADER_SIZE {
            return Err(Error::malformed(format!(
                "header size {header_size} is below the minimum of {MIN_HEADER_SIZE}"
            )));
        }

        let mut block = vec![0u8; header_size as usize];
        src.seek(SeekFrom::Start(0))?;
        src.read_exact(&mut block).map_err(|e| {
            eof_as_malformed(
                e,
                format!("source ends before the declared header size of {header_size} bytes"),
            )
        })?;

        let header = Self::decode(&block)?;
        if &block[..4] != SIGNATURE {
            warn!(
                "file signature {:?} is not LASF, decoding anyway",
                String::from_utf8_lossy(&block[..4])
            );
        }
        if header.version != Version::new(1, 2) {
            warn!("LAS version {} is not 1.2, decoding anyway", header.version);
        }
        Ok(header)
    }

    /// Decodes a header block holding at least the declared `header_size` bytes.
    pub fn decode(block: &[u8]) -> Result<Self> {
        if block.len() < MIN_HEADER_SIZE as usize {
            return Err(Error::malformed(format!(
                "header block is {} bytes, expected at least {MIN_HEADER_SIZE}",
                block.len()
            )));
        }
        let f64_at = |offset: usize| LittleEndian::read_f64(&block[offset..]);
        let header = FileHeader {
            version: Version::new(block[VERSION_MAJOR], block[VERSION_MINOR]),
            header_size: LittleEndian::read_u16(&block[HEADER_SIZE..]),
            offset_to_points: LittleEndian::read_u32(&block[OFFSET_TO_POINTS..]),
            point_format_id: block[POINT_FORMAT_ID],
            point_record_size: LittleEndian::read_u16(&block[POINT_RECORD_SIZE..]),
            point_count: LittleEndian::read_u32(&block[POINT_COUNT..]),
            scale: Vector {
                x: f64_at(SCALE),
                y: f64_at(SCALE + 8),
                z: f64_at(SCALE + 16),
            },
            offset: Vector {
                x: f64_at(OFFSET),
                y: f64_at(OFFSET + 8),
                z: f64_at(OFFSET + 16),
            },
            bounds_max: Vector {
                x: f64_at(BOUNDS),
                y: f64_at(BOUNDS + 16),
                z: f64_at(BOUNDS + 32),
            },
            bounds_min: Vector {
                x: f64_at(BOUNDS + 8),
                y: f64_at(BOUNDS + 24),
                z: f64_at(BOUNDS + 40),
            },
        };
        header.validate()?;
        if block.len() < header.header_size as usize {
            return Err(Error::malformed(format!(
                "header block is {} bytes, shorter than the declared header size of {}",
                block.len(),
                header.header_size
            )));
        }
        Ok(header)
    }

    fn validate(&self) -> Result<()> {
        if self.header_size < MIN_HEADER_SIZE {
            return Err(Error::malformed(format!(
                "header size {} is below the minimum of {MIN_HEADER_SIZE}",
                self.header_size
            )));
        }
        if self.point_record_size == 0 {
            return Err(Error::malformed("point record length is zero"));
        }
        if self.offset_to_points < u32::from(self.header_size) {
            return Err(Error::malformed(format!(
                "offset to point data {} lies inside the {} byte header",
                self.offset_to_points, self.header_size
            )));
        }
        Ok(())
    }

    /// Writes the fixed header block, zero filled up to `header_size`.
    ///
    /// Fields this crate does not model (system identifier, dates, return counts)
    /// are written as zeros.
    pub fn write_to<W: Write>(&self, mut dst: W) -> io::Result<()> {
        let mut block = vec![0u8; self.header_size.max(MIN_HEADER_SIZE) as usize];
        block[..4].copy_from_slice(SIGNATURE);
        block[VERSION_MAJOR] = self.version.major;
        block[VERSION_MINOR] = self.version.minor;

        let mut cursor = &mut block[HEADER_SIZE..];
        cursor.write_u16::<LittleEndian>(self.header_size)?;
        cursor.write_u32::<LittleEndian>(self.offset_to_points)?;
        cursor.write_u32::<LittleEndian>(0)?; // number of variable length records
        cursor.write_u8(self.point_format_id)?;
        cursor.write_u16::<LittleEndian>(self.point_record_size)?;
        cursor.write_u32::<LittleEndian>(self.point_count)?;

        let mut cursor = &mut block[SCALE..];
        for v in [self.scale, self.offset] {
            cursor.write_f64::<LittleEndian>(v.x)?;
            cursor.write_f64::<LittleEndian>(v.y)?;
            cursor.write_f64::<LittleEndian>(v.z)?;
        }
        for (max, min) in [
            (self.bounds_max.x, self.bounds_min.x),
            (self.bounds_max.y, self.bounds_min.y),
            (self.bounds_max.z, self.bounds_min.z),
        ] {
            cursor.write_f64::<LittleEndian>(max)?;
            cursor.write_f64::<LittleEndian>(min)?;
        }
        dst.write_all(&block)
    }

    /// Per axis scale and offset, in the form [crate::unscale] takes.
    pub fn transforms(&self) -> Vector<Transform> {
        Vector {
            x: Transform {
                scale: self.scale.x,
                offset: self.offset.x,
            },
            y: Transform {
                scale: self.scale.y,
                offset: self.offset.y,
            },
            z: Transform {
                scale: self.scale.z,
                offset: self.offset.z,
            },
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            min: self.bounds_min,
            max: self.bounds_max,
        }
    }

    /// Center of the bounding box
    pub fn center(&self) -> Vector<f64> {
        Vector {
            x: (self.bounds_min.x + self.bounds_max.x) / 2.,
            y: (self.bounds_min.y + self.bounds_max.y) / 2.,
            z: (self.bounds_min.z + self.bounds_max.z) / 2.,
        }
    }

    /// `point_record_size * point_count`
    pub fn points_byte_len(&self) -> u64 {
        u64::from(self.point_record_size) * u64::from(self.point_count)
    }

    /// Byte range of the whole point data region.
    pub fn point_data_range(&self) -> ByteRange {
        let start = u64::from(self.offset_to_points);
        ByteRange {
            start,
            end: start + self.points_byte_len(),
        }
    }
}

fn eof_as_malformed(e: io::Error, reason: impl Into<String>) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::malformed(reason)
    } else {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // Writes every field by hand at its documented offset so the parser is
    // checked against the layout rather than against `write_to`.
    fn synthetic_block() -> Vec<u8> {
        let mut b = vec![0u8; 227];
        b[..4].copy_from_slice(b"LASF");
        b[24] = 1;
        b[25] = 2;
        LittleEndian::write_u16(&mut b[94..], 227);
        LittleEndian::write_u32(&mut b[96..], 1024);
        b[104] = 3;
        LittleEndian::write_u16(&mut b[105..], 34);
        LittleEndian::write_u32(&mut b[107..], 123_456);
        let doubles = [
            (131, 0.01),
            (139, 0.02),
            (147, 0.001),
            (155, 1000.5),
            (163, -200.25),
            (171, 12.0),
            (179, 2000.0),
            (187, 1000.0),
            (195, 300.0),
            (203, -250.0),
            (211, 99.5),
            (219, 10.5),
        ];
        for (offset, value) in doubles {
            LittleEndian::write_f64(&mut b[offset..], value);
        }
        b
    }

    #[test]
    fn decodes_every_field_at_its_offset() {
        let header = FileHeader::read_from(&mut Cursor::new(synthetic_block())).unwrap();
        assert_eq!(header.version, Version::new(1, 2));
        assert_eq!(header.header_size, 227);
        assert_eq!(header.offset_to_points, 1024);
        assert_eq!(header.point_format_id, 3);
        assert_eq!(header.point_record_size, 34);
        assert_eq!(header.point_count, 123_456);
        assert_eq!(header.scale, Vector { x: 0.01, y: 0.02, z: 0.001 });
        assert_eq!(header.offset, Vector { x: 1000.5, y: -200.25, z: 12.0 });
        assert_eq!(header.bounds_max, Vector { x: 2000.0, y: 300.0, z: 99.5 });
        assert_eq!(header.bounds_min, Vector { x: 1000.0, y: -250.0, z: 10.5 });
    }

    #[test]
    fn write_to_matches_hand_built_block() {
        let header = FileHeader::decode(&synthetic_block()).unwrap();
        let mut written = Vec::new();
        header.write_to(&mut written).unwrap();
        assert_eq!(written, synthetic_block());
    }

    #[test]
    fn larger_header_block_is_read_whole() {
        let mut block = synthetic_block();
        LittleEndian::write_u16(&mut block[94..], 235);
        block.extend_from_slice(&[0xAB; 8]);
        block.extend_from_slice(&[0u8; 64]);
        let mut src = Cursor::new(block);
        let header = FileHeader::read_from(&mut src).unwrap();
        assert_eq!(header.header_size, 235);
        assert_eq!(src.position(), 235);
    }

    #[test]
    fn short_source_is_malformed() {
        for len in [0, 50, 95, 96, 200, 226] {
            let block = synthetic_block()[..len].to_vec();
            let err = FileHeader::read_from(&mut Cursor::new(block)).unwrap_err();
            assert!(matches!(err, Error::MalformedHeader(_)), "len {len}: {err}");
        }
    }

    #[test]
    fn declared_size_beyond_source_is_malformed() {
        let mut block = synthetic_block();
        LittleEndian::write_u16(&mut block[94..], 300);
        let err = FileHeader::read_from(&mut Cursor::new(block)).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)));
    }

    #[test]
    fn decode_rejects_block_shorter_than_declared_size() {
        let mut block = synthetic_block();
        LittleEndian::write_u16(&mut block[94..], 300);
        LittleEndian::write_u32(&mut block[96..], 300);
        assert!(matches!(
            FileHeader::decode(&block),
            Err(Error::MalformedHeader(_))
        ));

        block.resize(300, 0);
        assert_eq!(FileHeader::decode(&block).unwrap().header_size, 300);
    }

    #[test]
    fn header_size_below_minimum_is_malformed() {
        let mut block = synthetic_block();
        LittleEndian::write_u16(&mut block[94..], 226);
        let err = FileHeader::read_from(&mut Cursor::new(block)).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)));
    }

    #[test]
    fn inconsistent_fields_are_malformed() {
        let mut zero_record = synthetic_block();
        LittleEndian::write_u16(&mut zero_record[105..], 0);
        assert!(matches!(
            FileHeader::decode(&zero_record),
            Err(Error::MalformedHeader(_))
        ));

        let mut points_in_header = synthetic_block();
        LittleEndian::write_u32(&mut points_in_header[96..], 100);
        assert!(matches!(
            FileHeader::decode(&points_in_header),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn derived_values() {
        let header = FileHeader::decode(&synthetic_block()).unwrap();
        assert_eq!(header.points_byte_len(), 34 * 123_456);
        assert_eq!(
            header.point_data_range(),
            ByteRange {
                start: 1024,
                end: 1024 + 34 * 123_456
            }
        );
        assert_eq!(header.center(), Vector { x: 1500.0, y: 25.0, z: 55.0 });
        let t = header.transforms();
        assert_eq!(t.y.scale, 0.02);
        assert_eq!(t.z.offset, 12.0);
        assert_eq!(header.bounds().min.y, -250.0);
    }
}
