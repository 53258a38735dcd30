//! Typed bind parameters used to instantiate SQL placeholders.
//!
//! Grounded on `original_source/sql/parameter.go` (`prepareParameters`) for
//! the type tags and on `query_request_encoder.go` for the wire shape of
//! each. Per `SPEC_FULL.md` §C, `FLOAT` and `REAL` both produce a `Float`
//! parameter (the source's fallthrough is the intended behavior, not a bug
//! to preserve), and the parameter list is encoded as given — the source's
//! "overwrite with empty list before iterating" behavior is a bug and is
//! not reproduced.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;

use crate::error::{LbError, LbResult};

/// A typed bind value.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Null,
}

impl Parameter {
    fn type_tag(&self) -> u8 {
        match self {
            Parameter::Integer(_) => 1,
            Parameter::Float(_) => 2,
            Parameter::Text(_) => 3,
            Parameter::Blob(_) => 4,
            Parameter::Null => 5,
        }
    }

    /// Encodes one `[type: u8][valueLen: u32][valueBytes]` parameter cell.
    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> LbResult<()> {
        out.write_u8(self.type_tag())?;
        match self {
            Parameter::Integer(v) => {
                out.write_u32::<LittleEndian>(8)?;
                out.write_i64::<LittleEndian>(*v)?;
            }
            Parameter::Float(v) => {
                out.write_u32::<LittleEndian>(8)?;
                out.write_f64::<LittleEndian>(*v)?;
            }
            Parameter::Text(s) => {
                let bytes = s.as_bytes();
                out.write_u32::<LittleEndian>(bytes.len() as u32)?;
                out.extend_from_slice(bytes);
            }
            Parameter::Blob(b) => {
                out.write_u32::<LittleEndian>(b.len() as u32)?;
                out.extend_from_slice(b);
            }
            Parameter::Null => {
                out.write_u32::<LittleEndian>(0)?;
            }
        }
        Ok(())
    }

    /// Decodes one parameter cell from `r`. Used by tests and by any
    /// server-side-shaped peer exercising the codec from the other end.
    pub(crate) fn decode(r: &mut impl Read) -> LbResult<Self> {
        let tag = r.read_u8()?;
        let len = r.read_u32::<LittleEndian>()? as usize;
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf)?;
        Ok(match tag {
            1 => {
                let bytes: [u8; 8] = buf
                    .as_slice()
                    .try_into()
                    .map_err(|_| LbError::wire("INTEGER parameter value is not 8 bytes"))?;
                Parameter::Integer(i64::from_le_bytes(bytes))
            }
            2 => {
                let bytes: [u8; 8] = buf
                    .as_slice()
                    .try_into()
                    .map_err(|_| LbError::wire("FLOAT parameter value is not 8 bytes"))?;
                Parameter::Float(f64::from_le_bytes(bytes))
            }
            3 => Parameter::Text(String::from_utf8(buf).map_err(|e| LbError::wire(e.to_string()))?),
            4 => Parameter::Blob(buf),
            5 => Parameter::Null,
            other => return Err(LbError::wire(format!("unknown parameter tag {other}"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(p: Parameter) {
        let mut buf = Vec::new();
        p.encode(&mut buf).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let decoded = Parameter::decode(&mut cursor).unwrap();
        assert_eq!(p, decoded);
    }

    #[test]
    fn integer_round_trips() {
        round_trip(Parameter::Integer(-7));
    }

    #[test]
    fn float_round_trips() {
        round_trip(Parameter::Float(3.5));
    }

    #[test]
    fn text_round_trips() {
        round_trip(Parameter::Text("hello".to_string()));
    }

    #[test]
    fn blob_round_trips() {
        round_trip(Parameter::Blob(vec![1, 2, 3]));
    }

    #[test]
    fn null_has_zero_length_value() {
        let mut buf = Vec::new();
        Parameter::Null.encode(&mut buf).unwrap();
        // [type:1][len:4] == 5 bytes, no value bytes.
        assert_eq!(buf.len(), 5);
        round_trip(Parameter::Null);
    }
}
