//! Request records: `Query` and its wire encoding.
//!
//! `[idLen: u32][id][txnIdLen: u32][txnId?][stmtLen: u32][stmt][paramsLen: u32][paramsBlob]`
//! Grounded on `original_source/sql/query.go` and `query_request_encoder.go`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;

use crate::error::{LbError, LbResult};
use crate::wire::parameter::Parameter;

/// A request record: a query to run against the database.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub id: String,
    pub statement: String,
    pub parameters: Vec<Parameter>,
    pub transaction_id: Option<String>,
}

impl Query {
    pub fn new(id: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            statement: statement.into(),
            parameters: Vec::new(),
            transaction_id: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    /// Encodes this query into a request record, using `scratch` as a
    /// reusable buffer for the parameters blob so callers can avoid a fresh
    /// allocation per call.
    ///
    /// Mirrors `hdbconnect_impl`'s pattern of taking pooled scratch buffers
    /// into the encoder rather than allocating internally.
    pub fn encode(&self, out: &mut Vec<u8>, params_scratch: &mut Vec<u8>) -> LbResult<()> {
        out.clear();
        params_scratch.clear();

        if self.id.is_empty() {
            return Err(LbError::wire("query id must not be empty"));
        }

        for param in &self.parameters {
            param.encode(params_scratch)?;
        }

        out.write_u32::<LittleEndian>(self.id.len() as u32)?;
        out.extend_from_slice(self.id.as_bytes());

        match &self.transaction_id {
            Some(txn_id) => {
                out.write_u32::<LittleEndian>(txn_id.len() as u32)?;
                out.extend_from_slice(txn_id.as_bytes());
            }
            None => {
                out.write_u32::<LittleEndian>(0)?;
            }
        }

        out.write_u32::<LittleEndian>(self.statement.len() as u32)?;
        out.extend_from_slice(self.statement.as_bytes());

        out.write_u32::<LittleEndian>(params_scratch.len() as u32)?;
        out.extend_from_slice(params_scratch);

        Ok(())
    }

    /// Decodes a request record. Used by tests (and would be used by a
    /// server-shaped peer) to verify the encoder's output round-trips.
    pub fn decode(r: &mut impl Read) -> LbResult<Self> {
        let id = read_len_prefixed_string(r)?;
        if id.is_empty() {
            return Err(LbError::wire("decoded query id is empty"));
        }
        let txn_id = read_len_prefixed_string(r)?;
        let transaction_id = if txn_id.is_empty() { None } else { Some(txn_id) };
        let statement = read_len_prefixed_string(r)?;

        let params_len = r.read_u32::<LittleEndian>()? as usize;
        let mut params_buf = vec![0u8; params_len];
        r.read_exact(&mut params_buf)?;
        let mut params_cursor = std::io::Cursor::new(params_buf);
        let mut parameters = Vec::new();
        while params_cursor.position() < params_len as u64 {
            parameters.push(Parameter::decode(&mut params_cursor)?);
        }

        Ok(Query {
            id,
            statement,
            parameters,
            transaction_id,
        })
    }
}

fn read_len_prefixed_string(r: &mut impl Read) -> LbResult<String> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| LbError::wire(e.to_string()))
}
