//! Column types and values, as carried uninterpreted on the wire.
//!
//! See `original_source/sql/column.go` for the tag values this mirrors.

use crate::error::{LbError, LbResult};

/// The wire tag for a column or parameter value. Encoded as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Unknown,
    Integer,
    Float,
    Text,
    Blob,
    Null,
}

impl ColumnType {
    pub(crate) fn to_wire(self) -> u8 {
        match self {
            ColumnType::Unknown => 0,
            ColumnType::Integer => 1,
            ColumnType::Float => 2,
            ColumnType::Text => 3,
            ColumnType::Blob => 4,
            ColumnType::Null => 5,
        }
    }

    pub(crate) fn from_wire(code: u8) -> LbResult<Self> {
        Ok(match code {
            0 => ColumnType::Unknown,
            1 => ColumnType::Integer,
            2 => ColumnType::Float,
            3 => ColumnType::Text,
            4 => ColumnType::Blob,
            5 => ColumnType::Null,
            other => return Err(LbError::wire(format!("unknown column type tag {other}"))),
        })
    }

    /// Convenience for the widened-u32 encoding used in `ColumnDefinition`s.
    pub(crate) fn from_wire_u32(code: u32) -> LbResult<Self> {
        if code > u32::from(u8::MAX) {
            return Err(LbError::wire(format!("column type tag {code} out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Self::from_wire(code as u8)
    }
}

/// A single column value: a type tag plus the uninterpreted bytes that
/// carry it. Converting to a host scalar (e.g. an `i64` for `Integer`) is
/// the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub column_type: ColumnType,
    pub value: Vec<u8>,
}

impl Column {
    pub fn new(column_type: ColumnType, value: Vec<u8>) -> Self {
        Self { column_type, value }
    }

    /// Interprets an `Integer` column's bytes as a little-endian `i64`.
    pub fn as_i64(&self) -> LbResult<i64> {
        if self.column_type != ColumnType::Integer {
            return Err(LbError::wire("column is not an Integer"));
        }
        let bytes: [u8; 8] = self
            .value
            .as_slice()
            .try_into()
            .map_err(|_| LbError::wire("Integer column value is not 8 bytes"))?;
        Ok(i64::from_le_bytes(bytes))
    }

    /// Interprets a `Float` column's bytes as a little-endian `f64`.
    pub fn as_f64(&self) -> LbResult<f64> {
        if self.column_type != ColumnType::Float {
            return Err(LbError::wire("column is not a Float"));
        }
        let bytes: [u8; 8] = self
            .value
            .as_slice()
            .try_into()
            .map_err(|_| LbError::wire("Float column value is not 8 bytes"))?;
        Ok(f64::from_le_bytes(bytes))
    }

    /// Interprets a `Text` column's bytes as UTF-8.
    pub fn as_str(&self) -> LbResult<&str> {
        if self.column_type != ColumnType::Text {
            return Err(LbError::wire("column is not Text"));
        }
        std::str::from_utf8(&self.value).map_err(|e| LbError::wire(e.to_string()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.column_type, ColumnType::Null)
    }
}

/// Server-declared schema for one column of a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_wire_tags() {
        for (code, ty) in [
            (0u8, ColumnType::Unknown),
            (1, ColumnType::Integer),
            (2, ColumnType::Float),
            (3, ColumnType::Text),
            (4, ColumnType::Blob),
            (5, ColumnType::Null),
        ] {
            assert_eq!(ColumnType::from_wire(code).unwrap(), ty);
            assert_eq!(ty.to_wire(), code);
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        assert!(ColumnType::from_wire(6).is_err());
    }

    #[test]
    fn integer_column_round_trip() {
        let col = Column::new(ColumnType::Integer, 42i64.to_le_bytes().to_vec());
        assert_eq!(col.as_i64().unwrap(), 42);
    }
}
