//! Binary backup format.
//!
//! Little-endian throughout:
//!
//! ```text
//! u8        version (= 0)
//! u8        data type code  't' | 'b' | 'n' | 's' | 'j'
//! u32       record count
//! records, oldest first:
//!   f64     timestamp
//!   value   t: nothing
//!           b: u8 (0 or 1)
//!           n: f64
//!           s/j: u32 length + UTF-8 bytes, no terminator
//! ```
//!
//! Decoding is all-or-nothing: any structural problem yields `Corrupt` and
//! no samples.

use crate::error::{HubError, Result};
use crate::types::{DataSample, DataType, SampleValue, MAX_STRING_BYTES};

pub const FORMAT_VERSION: u8 = 0;

/// Serialize a type-homogeneous buffer.
pub fn encode<'a>(data_type: DataType, samples: impl ExactSizeIterator<Item = &'a DataSample>) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 + samples.len() * 16);
    out.push(FORMAT_VERSION);
    out.push(data_type.code());
    out.extend_from_slice(&(samples.len() as u32).to_le_bytes());

    for sample in samples {
        out.extend_from_slice(&sample.timestamp().to_le_bytes());
        match (data_type, sample.value()) {
            (DataType::Trigger, _) => {}
            (DataType::Boolean, SampleValue::Boolean(b)) => out.push(u8::from(*b)),
            (DataType::Numeric, SampleValue::Numeric(n)) => out.extend_from_slice(&n.to_le_bytes()),
            (DataType::String | DataType::Json, SampleValue::Text(s)) => {
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            (ty, value) => panic!("{} buffer holds a {:?} sample", ty, value),
        }
    }
    out
}

/// Parse a backup written by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<(DataType, Vec<DataSample>)> {
    let mut reader = Reader { bytes, pos: 0 };

    let version = reader.u8()?;
    if version != FORMAT_VERSION {
        return Err(HubError::Corrupt(format!("unknown version {}", version)));
    }
    let code = reader.u8()?;
    let data_type = DataType::from_code(code)
        .ok_or_else(|| HubError::Corrupt(format!("unknown type code 0x{:02x}", code)))?;
    let count = reader.u32()? as usize;

    // Every record carries at least a timestamp; reject impossible counts early.
    if count > reader.remaining() / 8 {
        return Err(HubError::Corrupt(format!("{} records cannot fit in {} bytes", count, bytes.len())));
    }

    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        let timestamp = reader.f64()?;
        let value = match data_type {
            DataType::Trigger => SampleValue::Trigger,
            DataType::Boolean => match reader.u8()? {
                0 => SampleValue::Boolean(false),
                1 => SampleValue::Boolean(true),
                other => return Err(HubError::Corrupt(format!("boolean byte {}", other))),
            },
            DataType::Numeric => SampleValue::Numeric(reader.f64()?),
            DataType::String | DataType::Json => SampleValue::Text(reader.string()?),
        };
        samples.push(DataSample::new(timestamp, value));
    }

    if reader.remaining() != 0 {
        return Err(HubError::Corrupt(format!("{} trailing bytes", reader.remaining())));
    }
    Ok((data_type, samples))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(HubError::Corrupt(format!(
                "truncated at byte {} (wanted {} more)",
                self.pos, n
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        if len > MAX_STRING_BYTES {
            return Err(HubError::Corrupt(format!("string of {} bytes", len)));
        }
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| HubError::Corrupt("string is not UTF-8".to_string()))
    }
}
