//! `QueryResponse` decoding (the `FrameEntry` and `Error` record shapes)
//! and, for round-trip testing, the matching encoder.
//!
//! Grounded field-for-field on `original_source/sql/query_response_decoder.go`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;

use crate::error::{LbError, LbResult};
use crate::wire::column::{Column, ColumnDefinition, ColumnType};
use crate::wire::message::MessageType;

/// The decoded payload of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponseData {
    pub version: u8,
    pub changes: i64,
    pub latency: f64,
    pub columns_count: u32,
    pub rows_count: u32,
    pub last_insert_row_id: i64,
    pub id: Vec<u8>,
    pub columns: Vec<ColumnDefinition>,
    pub rows: Vec<Vec<Column>>,
    pub transaction_id: Vec<u8>,
}

/// A decoded response record. When `error` is non-empty, only `version`,
/// `id`, and `transaction_id` in `data` are meaningful (per spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub data: QueryResponseData,
    pub error: Vec<u8>,
}

impl QueryResponse {
    /// Decodes a `FrameEntry` payload (the bytes after the envelope header).
    pub fn decode_entry(buf: &[u8]) -> LbResult<Self> {
        let mut r = buf;
        let version = r.read_u8()?;
        let id = read_len_prefixed(&mut r)?;
        let transaction_id = read_len_prefixed(&mut r)?;
        let changes = i64::from(r.read_u32::<LittleEndian>()?);
        let latency = f64::from_bits(r.read_u64::<LittleEndian>()?);
        let columns_count = r.read_u32::<LittleEndian>()?;
        let rows_count = r.read_u32::<LittleEndian>()?;
        let last_insert_row_id = i64::from(r.read_u32::<LittleEndian>()?);
        let columns_len = r.read_u32::<LittleEndian>()? as usize;

        let mut columns_buf = vec![0u8; columns_len];
        r.read_exact(&mut columns_buf)?;
        let columns = decode_columns(columns_count, &columns_buf)?;

        let mut rows_buf = Vec::new();
        r.read_to_end(&mut rows_buf)?;
        let rows = decode_rows(rows_count, columns_count, &rows_buf)?;

        Ok(QueryResponse {
            data: QueryResponseData {
                version,
                changes,
                latency,
                columns_count,
                rows_count,
                last_insert_row_id,
                id,
                columns,
                rows,
                transaction_id,
            },
            error: Vec::new(),
        })
    }

    /// Decodes an `Error` record payload.
    pub fn decode_error(buf: &[u8]) -> LbResult<Self> {
        let mut r = buf;
        let version = r.read_u8()?;
        let id = read_len_prefixed(&mut r)?;
        let transaction_id = read_len_prefixed(&mut r)?;
        let error = read_len_prefixed(&mut r)?;

        Ok(QueryResponse {
            data: QueryResponseData {
                version,
                changes: 0,
                latency: 0.0,
                columns_count: 0,
                rows_count: 0,
                last_insert_row_id: 0,
                id,
                columns: Vec::new(),
                rows: Vec::new(),
                transaction_id,
            },
            error,
        })
    }

    /// Encodes this response back into a `FrameEntry` payload. Only used by
    /// tests to exercise the round-trip law in spec §8; production code
    /// only ever decodes responses the server sends.
    #[cfg(test)]
    pub(crate) fn encode_entry(&self) -> LbResult<Vec<u8>> {
        let mut out = Vec::new();
        out.write_u8(self.data.version)?;
        out.write_u32::<LittleEndian>(self.data.id.len() as u32)?;
        out.extend_from_slice(&self.data.id);
        out.write_u32::<LittleEndian>(self.data.transaction_id.len() as u32)?;
        out.extend_from_slice(&self.data.transaction_id);
        out.write_u32::<LittleEndian>(self.data.changes as u32)?;
        out.write_u64::<LittleEndian>(self.data.latency.to_bits())?;
        out.write_u32::<LittleEndian>(self.data.columns_count)?;
        out.write_u32::<LittleEndian>(self.data.rows_count)?;
        out.write_u32::<LittleEndian>(self.data.last_insert_row_id as u32)?;

        let mut columns_buf = Vec::new();
        for col in &self.data.columns {
            columns_buf.write_u32::<LittleEndian>(col.name.len() as u32)?;
            columns_buf.extend_from_slice(col.name.as_bytes());
            columns_buf.write_u32::<LittleEndian>(u32::from(col.column_type.to_wire()))?;
        }
        out.write_u32::<LittleEndian>(columns_buf.len() as u32)?;
        out.extend_from_slice(&columns_buf);

        for row in &self.data.rows {
            let mut row_buf = Vec::new();
            for cell in row {
                row_buf.write_u8(cell.column_type.to_wire())?;
                row_buf.write_u32::<LittleEndian>(cell.value.len() as u32)?;
                row_buf.extend_from_slice(&cell.value);
            }
            out.write_u32::<LittleEndian>(row_buf.len() as u32)?;
            out.extend_from_slice(&row_buf);
        }

        Ok(out)
    }
}

/// Decodes the payload of an inbound `Frame`-typed stream envelope: a
/// sequence of nested `[type: u8][len: u32][payload]` records, each an
/// `Error` or `FrameEntry`. Per `SPEC_FULL.md` §C.6 this always consumes
/// type+length+payload and fails loudly on an unrecognized nested type,
/// rather than silently desyncing the remaining records in the frame.
pub fn decode_frame_payload(buf: &[u8]) -> LbResult<Vec<QueryResponse>> {
    let mut r = buf;
    let mut responses = Vec::new();
    while !r.is_empty() {
        if r.len() < 5 {
            return Err(LbError::wire("truncated buffer: incomplete frame record header"));
        }
        let record_type = r.read_u8()?;
        let record_len = r.read_u32::<LittleEndian>()? as usize;
        if record_len > r.len() {
            return Err(LbError::wire("truncated buffer: frame record length exceeds remaining bytes"));
        }
        let (payload, rest) = r.split_at(record_len);
        r = rest;

        match MessageType::from_wire(record_type)? {
            MessageType::Error => responses.push(QueryResponse::decode_error(payload)?),
            MessageType::FrameEntry => responses.push(QueryResponse::decode_entry(payload)?),
            other => {
                return Err(LbError::wire(format!(
                    "unexpected nested frame record type {other:?}"
                )))
            }
        }
    }
    Ok(responses)
}

fn read_len_prefixed(r: &mut &[u8]) -> LbResult<Vec<u8>> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    if len > r.len() {
        return Err(LbError::wire("truncated buffer: length prefix exceeds remaining bytes"));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn decode_columns(count: u32, buf: &[u8]) -> LbResult<Vec<ColumnDefinition>> {
    let mut r = buf;
    let mut columns = Vec::with_capacity(count as usize);
    while !r.is_empty() {
        let name = String::from_utf8(read_len_prefixed(&mut r)?)
            .map_err(|e| LbError::wire(e.to_string()))?;
        let type_code = r.read_u32::<LittleEndian>()?;
        columns.push(ColumnDefinition {
            name,
            column_type: ColumnType::from_wire_u32(type_code)?,
        });
    }
    Ok(columns)
}

fn decode_rows(rows_count: u32, columns_count: u32, buf: &[u8]) -> LbResult<Vec<Vec<Column>>> {
    let mut r = buf;
    let mut rows = Vec::with_capacity(rows_count as usize);
    while !r.is_empty() {
        let row_len = r.read_u32::<LittleEndian>()? as usize;
        if row_len > r.len() {
            return Err(LbError::wire("truncated buffer: row length exceeds remaining bytes"));
        }
        let (row_bytes, rest) = r.split_at(row_len);
        r = rest;

        let mut row_cursor = row_bytes;
        let mut row = Vec::with_capacity(columns_count as usize);
        while !row_cursor.is_empty() {
            let type_code = row_cursor.read_u8()?;
            let column_type = ColumnType::from_wire(type_code)?;
            let value = read_len_prefixed(&mut row_cursor)?;
            row.push(Column::new(column_type, value));
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> QueryResponse {
        QueryResponse {
            data: QueryResponseData {
                version: 1,
                changes: 0,
                latency: 1.25,
                columns_count: 2,
                rows_count: 1,
                last_insert_row_id: 1,
                id: b"req-1".to_vec(),
                columns: vec![
                    ColumnDefinition {
                        name: "id".to_string(),
                        column_type: ColumnType::Integer,
                    },
                    ColumnDefinition {
                        name: "name".to_string(),
                        column_type: ColumnType::Text,
                    },
                ],
                rows: vec![vec![
                    Column::new(ColumnType::Integer, 1i64.to_le_bytes().to_vec()),
                    Column::new(ColumnType::Text, b"hello".to_vec()),
                ]],
                transaction_id: Vec::new(),
            },
            error: Vec::new(),
        }
    }

    #[test]
    fn response_round_trips() {
        let resp = sample_response();
        let encoded = resp.encode_entry().unwrap();
        let decoded = QueryResponse::decode_entry(&encoded).unwrap();
        assert_eq!(resp, decoded);
    }

    #[test]
    fn query_rows_scenario_from_spec() {
        let resp = sample_response();
        assert_eq!(resp.data.columns_count, 2);
        assert_eq!(
            resp.data.columns,
            vec![
                ColumnDefinition {
                    name: "id".into(),
                    column_type: ColumnType::Integer
                },
                ColumnDefinition {
                    name: "name".into(),
                    column_type: ColumnType::Text
                },
            ]
        );
        assert_eq!(resp.data.rows[0][0].as_i64().unwrap(), 1);
        assert_eq!(resp.data.rows[0][1].as_str().unwrap(), "hello");
    }

    #[test]
    fn error_record_round_trips_via_decode() {
        let mut buf = Vec::new();
        buf.write_u8(1).unwrap();
        buf.write_u32::<LittleEndian>(3).unwrap();
        buf.extend_from_slice(b"id1");
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(7).unwrap();
        buf.extend_from_slice(b"boom!!!");

        let resp = QueryResponse::decode_error(&buf).unwrap();
        assert_eq!(resp.error, b"boom!!!");
        assert_eq!(resp.data.id, b"id1");
    }

    #[test]
    fn truncated_buffer_is_a_codec_error_not_a_panic() {
        let mut buf = Vec::new();
        buf.write_u8(1).unwrap();
        buf.write_u32::<LittleEndian>(100).unwrap(); // claims 100 bytes but none follow
        assert!(QueryResponse::decode_entry(&buf).is_err());
    }

    #[test]
    fn frame_payload_decodes_multiple_nested_records_in_order() {
        let a = sample_response();
        let mut b = sample_response();
        b.data.id = b"req-2".to_vec();

        let a_bytes = a.encode_entry().unwrap();
        let b_bytes = b.encode_entry().unwrap();

        let mut buf = Vec::new();
        buf.write_u8(MessageType::FrameEntry.to_wire()).unwrap();
        buf.write_u32::<LittleEndian>(a_bytes.len() as u32).unwrap();
        buf.extend_from_slice(&a_bytes);
        buf.write_u8(MessageType::FrameEntry.to_wire()).unwrap();
        buf.write_u32::<LittleEndian>(b_bytes.len() as u32).unwrap();
        buf.extend_from_slice(&b_bytes);

        let responses = decode_frame_payload(&buf).unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].data.id, b"req-1");
        assert_eq!(responses[1].data.id, b"req-2");
    }

    #[test]
    fn frame_payload_rejects_unrecognized_nested_record_type() {
        let mut buf = Vec::new();
        buf.write_u8(MessageType::OpenConnection.to_wire()).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        assert!(decode_frame_payload(&buf).is_err());
    }
}
