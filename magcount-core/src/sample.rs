//! Magnetometer samples and raw block decoding
//!
//! Every supported sensor delivers x, y and z as 16-bit two's-complement
//! words packed into one 6-byte block. The models disagree on two things:
//!
//! - **Byte order**: QMC5883 sends LSB first, HMC5883 MSB first
//! - **Axis order**: QMC5883 sends X,Y,Z, HMC5883 sends X,Z,Y
//!
//! [`SampleLayout`] captures both as data so one decoder serves all variants.
//!
//! ```text
//! QMC5883  ┌────┬────┬────┬────┬────┬────┐
//!          │X lo│X hi│Y lo│Y hi│Z lo│Z hi│   little endian, x=0 y=2 z=4
//!          └────┴────┴────┴────┴────┴────┘
//! HMC5883  ┌────┬────┬────┬────┬────┬────┐
//!          │X hi│X lo│Z hi│Z lo│Y hi│Y lo│   big endian, x=0 z=2 y=4
//!          └────┴────┴────┴────┴────┴────┘
//! ```

use crate::errors::DriverError;

/// One magnetometer reading
///
/// Immutable once produced; a fresh value is created for every poll.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sample {
    x: i16,
    y: i16,
    z: i16,
    magnitude: f32,
}

impl Sample {
    /// Build a sample from raw axis readings, deriving the magnitude
    pub fn new(x: i16, y: i16, z: i16) -> Self {
        let (fx, fy, fz) = (x as f32, y as f32, z as f32);
        Self {
            x,
            y,
            z,
            magnitude: libm::sqrtf(fx * fx + fy * fy + fz * fz),
        }
    }

    /// Raw X reading
    pub fn x(&self) -> i16 {
        self.x
    }

    /// Raw Y reading
    pub fn y(&self) -> i16 {
        self.y
    }

    /// Raw Z reading
    pub fn z(&self) -> i16 {
        self.z
    }

    /// Euclidean norm of the three axes
    pub fn magnitude(&self) -> f32 {
        self.magnitude
    }
}

/// Byte order of a 16-bit axis word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Least significant byte first
    LittleEndian,
    /// Most significant byte first
    BigEndian,
}

/// Position and encoding of the three axes within a raw block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    /// Byte order of each axis word
    pub byte_order: ByteOrder,
    /// Offset of the X word
    pub x_offset: usize,
    /// Offset of the Y word
    pub y_offset: usize,
    /// Offset of the Z word
    pub z_offset: usize,
}

impl SampleLayout {
    /// Bytes a block must contain for this layout
    pub fn required_len(&self) -> usize {
        self.x_offset.max(self.y_offset).max(self.z_offset) + 2
    }

    /// Decode one raw block into a sample
    ///
    /// Blocks longer than [`required_len`](Self::required_len) are accepted;
    /// trailing bytes are ignored.
    pub fn decode<E>(&self, raw: &[u8]) -> Result<Sample, DriverError<E>> {
        let expected = self.required_len();
        if raw.len() < expected {
            return Err(DriverError::MalformedBlock {
                expected,
                actual: raw.len(),
            });
        }

        Ok(Sample::new(
            self.word(raw, self.x_offset),
            self.word(raw, self.y_offset),
            self.word(raw, self.z_offset),
        ))
    }

    fn word(&self, raw: &[u8], offset: usize) -> i16 {
        let bytes = [raw[offset], raw[offset + 1]];
        match self.byte_order {
            ByteOrder::LittleEndian => i16::from_le_bytes(bytes),
            ByteOrder::BigEndian => i16::from_be_bytes(bytes),
        }
    }
}
