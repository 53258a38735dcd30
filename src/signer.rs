//! Request and chunk signing: canonicalization plus the chained
//! HMAC-SHA256 key-derivation scheme that authenticates both the initial
//! HTTP handshake and every subsequent frame.
//!
//! Grounded on `original_source/sql/request_signer.go` (`SignRequest`) for
//! the canonicalization order, and on
//! `hdbconnect_impl/src/conn/authentication/crypto_util.rs` for the
//! idiomatic-Rust HMAC helper shape. Per `SPEC_FULL.md` §C.1, the header
//! name `X-LBDB-Date` (lower-cased: `x-lbdb-date`) and the service string
//! `litebase_request` are used for both the handshake signer and the chunk
//! signer — the two variants the source carries are treated as the same
//! canonicalization routine invoked from two call sites, not a deliberate
//! fork.

use base64::Engine;
use hmac::{Hmac, Mac};
use secstr::SecUtf8;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::{LbError, LbResult};

type HmacSha256 = Hmac<Sha256>;

const ALLOWED_HEADERS: &[&str] = &["content-type", "host", "x-lbdb-date"];
const SIGNED_HEADERS_LIST: &str = "content-type,host,x-lbdb-date";
const SERVICE_STRING: &str = "litebase_request";

/// Computes `hex(SHA-256(data))`, including the empty-input case from
/// spec §8 ("Empty body hash equals `hex(SHA-256(""))`.").
fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_hex(key: &[u8], data: &[u8]) -> LbResult<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| LbError::connect(format!("invalid HMAC key: {e}")))?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn transform_header_key(key: &str) -> String {
    key.to_ascii_lowercase().replace('_', "-")
}

fn canonicalize_headers(headers: &[(String, String)]) -> BTreeMap<String, String> {
    let mut normalized = BTreeMap::new();
    for (key, value) in headers {
        let key = transform_header_key(key);
        if ALLOWED_HEADERS.contains(&key.as_str()) {
            normalized.insert(key, value.clone());
        }
    }
    normalized
}

fn canonicalize_query_params(params: &[(String, String)]) -> BTreeMap<String, String> {
    params
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
        .collect()
}

/// `serde_json` over a `BTreeMap` gives us deterministic, lexicographically
/// ordered key serialization for free; an empty map still serializes as
/// `{}` via `serde_json`'s default `Map` encoding.
fn to_json(map: &BTreeMap<String, String>) -> String {
    serde_json::to_string(map).expect("BTreeMap<String, String> always serializes")
}

/// Computes the handshake `Authorization` token per spec §4.2.
///
/// `headers` and `query_params` are the raw (un-normalized) key/value pairs
/// the caller intends to send; `date_header_value` must equal the value of
/// the `x-lbdb-date` header included in `headers`.
#[allow(clippy::too_many_arguments)]
pub fn sign_request(
    access_key_id: &str,
    access_key_secret: &SecUtf8,
    method: &str,
    path: &str,
    headers: &[(String, String)],
    query_params: &[(String, String)],
    body: &[u8],
    date_header_value: &str,
) -> LbResult<String> {
    let body_hash = sha256_hex(body);

    let normalized_headers = canonicalize_headers(headers);
    let normalized_params = canonicalize_query_params(query_params);

    let json_headers = to_json(&normalized_headers);
    let json_params = to_json(&normalized_params);

    let canonical = format!(
        "{method}/{path}{json_headers}{json_params}{body_hash}",
        path = path.trim_start_matches('/'),
    );
    let signed_request = sha256_hex(canonical.as_bytes());

    let signature = derive_chunk_like_signature(access_key_secret, date_header_value, &signed_request)?;

    let token_plain = format!(
        "credential={access_key_id};signed_headers={SIGNED_HEADERS_LIST};signature={signature}"
    );
    Ok(base64::engine::general_purpose::STANDARD.encode(token_plain.as_bytes()))
}

/// Shared key-derivation chain: `dateKey = hex(HMAC(secret, date))`,
/// `serviceKey = hex(HMAC(dateKey, "litebase_request"))`, then
/// `hex(HMAC(serviceKey, payload))`. Each stage's key is the *hex ASCII* of
/// the previous stage's output, per spec §4.2's note — this is the crux of
/// both the request signature and the chunk signature.
fn derive_chunk_like_signature(
    access_key_secret: &SecUtf8,
    date_header_value: &str,
    payload: &str,
) -> LbResult<String> {
    let date_key = hmac_hex(access_key_secret.unsecure().as_bytes(), date_header_value.as_bytes())?;
    let service_key = hmac_hex(date_key.as_bytes(), SERVICE_STRING.as_bytes())?;
    hmac_hex(service_key.as_bytes(), payload.as_bytes())
}

/// Computes the next chunk signature in the chain for a signed frame.
///
/// `previous_signature` is either the signature extracted from the
/// handshake token (for the first chunk) or the previous chunk's
/// signature.
pub fn sign_chunk(
    access_key_secret: &SecUtf8,
    date_header_value: &str,
    previous_signature: &str,
    entries_section: &[u8],
) -> LbResult<String> {
    let chunk_hash = sha256_hex(entries_section);
    let string_to_sign = format!("{previous_signature}{chunk_hash}");
    derive_chunk_like_signature(access_key_secret, date_header_value, &string_to_sign)
}

/// Extracts the `signature=` field from a base64-encoded handshake token,
/// for seeding the first chunk signature.
pub fn extract_signature_from_token(token: &str) -> LbResult<String> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(token)
        .map_err(|e| LbError::wire(e.to_string()))?;
    let decoded = String::from_utf8(decoded).map_err(|e| LbError::wire(e.to_string()))?;
    decoded
        .split(';')
        .find_map(|field| field.strip_prefix("signature="))
        .map(ToString::to_string)
        .ok_or_else(|| LbError::wire("handshake token has no signature field"))
}
