//! Point data record format 3 decoding.

use crate::error::{Error, Result};
use crate::header::FileHeader;
use crate::transform::{unscale, Precision};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use las::{Color, Transform, Vector};
use std::io::{self, Write};

/// The only point data record format this crate decodes
pub const SUPPORTED_POINT_FORMAT: u8 = 3;

/// Length of a format 3 record without extra bytes
pub const FORMAT_3_RECORD_SIZE: usize = 34;

const COLOR_MAX: f64 = 65535.0;

/// Fails unless the header announces format 3 records long enough to hold one.
pub fn check_point_format(header: &FileHeader) -> Result<()> {
    if header.point_format_id != SUPPORTED_POINT_FORMAT {
        return Err(Error::UnsupportedPointFormat(header.point_format_id));
    }
    if (header.point_record_size as usize) < FORMAT_3_RECORD_SIZE {
        return Err(Error::malformed(format!(
            "point record length {} is too short for format 3 ({FORMAT_3_RECORD_SIZE} bytes)",
            header.point_record_size
        )));
    }
    Ok(())
}

/// Undecoded position and color of a record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawPoint {
    pub xyz: Vector<i32>,
    pub color: Color,
}

impl RawPoint {
    /// Reads x, y, z from the first 12 bytes and r, g, b from the last 6.
    ///
    /// `record` must hold exactly one record. A short record is reported with
    /// an offset of 0, relative to `record`; [PointDecoder::decode_at] reports
    /// offsets into its buffer instead.
    pub fn read_from(record: &[u8]) -> Result<Self> {
        let len = record.len();
        if len < FORMAT_3_RECORD_SIZE {
            return Err(Error::TruncatedPointData {
                offset: 0,
                expected: FORMAT_3_RECORD_SIZE,
                actual: len,
            });
        }
        Ok(RawPoint {
            xyz: Vector {
                x: LittleEndian::read_i32(&record[0..]),
                y: LittleEndian::read_i32(&record[4..]),
                z: LittleEndian::read_i32(&record[8..]),
            },
            color: Color::new(
                LittleEndian::read_u16(&record[len - 6..]),
                LittleEndian::read_u16(&record[len - 4..]),
                LittleEndian::read_u16(&record[len - 2..]),
            ),
        })
    }

    /// Writes a `record_size` byte record, attributes between position and color zeroed.
    pub fn write_to<W: Write>(&self, mut dst: W, record_size: usize) -> io::Result<()> {
        let mut record = vec![0u8; record_size.max(FORMAT_3_RECORD_SIZE)];
        let len = record.len();
        let mut cursor = &mut record[..];
        cursor.write_i32::<LittleEndian>(self.xyz.x)?;
        cursor.write_i32::<LittleEndian>(self.xyz.y)?;
        cursor.write_i32::<LittleEndian>(self.xyz.z)?;
        let mut cursor = &mut record[len - 6..];
        cursor.write_u16::<LittleEndian>(self.color.red)?;
        cursor.write_u16::<LittleEndian>(self.color.green)?;
        cursor.write_u16::<LittleEndian>(self.color.blue)?;
        dst.write_all(&record)
    }
}

/// Color channels scaled to `[0, 1]`
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalizedColor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl From<Color> for NormalizedColor {
    fn from(color: Color) -> Self {
        NormalizedColor {
            red: f64::from(color.red) / COLOR_MAX,
            green: f64::from(color.green) / COLOR_MAX,
            blue: f64::from(color.blue) / COLOR_MAX,
        }
    }
}

/// A decoded point in world coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointRecord {
    pub position: Vector<f64>,
    pub color: NormalizedColor,
}

/// Decodes the record at `offset` in `buffer` at full precision.
pub fn decode_point(
    buffer: &[u8],
    offset: usize,
    record_size: usize,
    transforms: &Vector<Transform>,
) -> Result<PointRecord> {
    PointDecoder {
        transforms: *transforms,
        record_size,
        precision: Precision::Full,
    }
    .decode_at(buffer, offset)
}

/// Record decoder bound to one file's layout.
#[derive(Clone, Copy, Debug)]
pub struct PointDecoder {
    transforms: Vector<Transform>,
    record_size: usize,
    precision: Precision,
}

impl PointDecoder {
    /// Checks the point format once for the whole file.
    pub fn new(header: &FileHeader, precision: Precision) -> Result<Self> {
        check_point_format(header)?;
        Ok(PointDecoder {
            transforms: header.transforms(),
            record_size: header.point_record_size as usize,
            precision,
        })
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn decode_at(&self, buffer: &[u8], offset: usize) -> Result<PointRecord> {
        let end = offset + self.record_size;
        if end > buffer.len() {
            return Err(Error::TruncatedPointData {
                offset: offset as u64,
                expected: self.record_size,
                actual: buffer.len().saturating_sub(offset),
            });
        }
        self.decode(&buffer[offset..end])
    }

    /// Decodes one record of exactly `record_size` bytes.
    ///
    /// Errors carry offsets relative to `record`.
    pub fn decode(&self, record: &[u8]) -> Result<PointRecord> {
        let raw = RawPoint::read_from(record)?;
        Ok(PointRecord {
            position: self.precision.apply(unscale(raw.xyz, &self.transforms)),
            color: raw.color.into(),
        })
    }

    /// Decodes every full record of `buffer` in file order.
    pub fn decode_all(&self, buffer: &[u8]) -> Result<Vec<PointRecord>> {
        buffer
            .chunks_exact(self.record_size)
            .map(|record| self.decode(record))
            .collect()
    }
}
