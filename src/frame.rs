//! A bounded, append-only batch of encoded request records.
//!
//! Grounded on `original_source/sql/frame.go` for the 100-entry cap and the
//! closed-once-on-encode lifecycle, restated behind a small owning type
//! (rather than a bare mutex-guarded struct) in the style of
//! `hdbconnect_impl`'s `base::xmutexed::XMutexed`.

use byteorder::{LittleEndian, WriteBytesExt};
use std::sync::Mutex;

use crate::error::{LbError, LbResult};
use crate::signer;
use secstr::SecUtf8;

pub const MAX_FRAME_ENTRIES: usize = 100;

#[derive(Debug, Default)]
struct FrameState {
    entries: Vec<Vec<u8>>,
    closed: bool,
}

/// An ordered, bounded batch of already-encoded request records.
#[derive(Debug, Default)]
pub struct Frame {
    state: Mutex<FrameState>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an already-encoded request record. Rejected once the frame
    /// has been closed by a prior `encode`/`encode_signed` call.
    pub fn append(&self, entry: Vec<u8>) -> LbResult<()> {
        let mut state = self.state.lock().expect("frame mutex poisoned");
        if state.closed {
            return Err(LbError::wire("cannot append to a closed frame"));
        }
        state.entries.push(entry);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        let state = self.state.lock().expect("frame mutex poisoned");
        state.entries.len() >= MAX_FRAME_ENTRIES
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().expect("frame mutex poisoned").closed
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().expect("frame mutex poisoned").entries.is_empty()
    }

    fn entries_section(entries: &[Vec<u8>]) -> LbResult<Vec<u8>> {
        let mut section = Vec::new();
        for entry in entries {
            section.write_u32::<LittleEndian>(entry.len() as u32)?;
            section.extend_from_slice(entry);
        }
        Ok(section)
    }

    /// Encodes the unsigned frame variant: `[type=0x04][frameLen][entries]`.
    /// Closes the frame as a side effect; idempotent on repeated calls
    /// (later calls re-serialize the same now-frozen entry list).
    pub fn encode(&self) -> LbResult<Vec<u8>> {
        let mut state = self.state.lock().expect("frame mutex poisoned");
        state.closed = true;
        let section = Self::entries_section(&state.entries)?;

        let mut out = Vec::with_capacity(5 + section.len());
        out.push(crate::wire::MessageType::Frame.to_wire());
        out.write_u32::<LittleEndian>(section.len() as u32)?;
        out.extend_from_slice(&section);
        Ok(out)
    }

    /// Encodes the signed frame variant:
    /// `[type=0x04][totalLen][sigLen][signature][entries]`, chaining off
    /// `prev_signature` per spec §4.2. Returns the encoded bytes and the
    /// new chunk signature to chain into the next frame.
    pub fn encode_signed(
        &self,
        access_key_secret: &SecUtf8,
        date_header_value: &str,
        prev_signature: &str,
    ) -> LbResult<(Vec<u8>, String)> {
        let mut state = self.state.lock().expect("frame mutex poisoned");
        state.closed = true;
        let section = Self::entries_section(&state.entries)?;

        let new_signature =
            signer::sign_chunk(access_key_secret, date_header_value, prev_signature, &section)?;
        let sig_bytes = new_signature.as_bytes();

        let total_len = 4 + sig_bytes.len() + section.len();
        let mut out = Vec::with_capacity(5 + total_len);
        out.push(crate::wire::MessageType::Frame.to_wire());
        out.write_u32::<LittleEndian>(total_len as u32)?;
        out.write_u32::<LittleEndian>(sig_bytes.len() as u32)?;
        out.extend_from_slice(sig_bytes);
        out.extend_from_slice(&section);

        Ok((out, new_signature))
    }
}
