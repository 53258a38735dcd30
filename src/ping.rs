//! A standalone health check against an LQTP endpoint.
//!
//! Grounded on `original_source/sql/conn.go`'s `Conn.Ping`: a bare request
//! to `{url}/query/stream` that expects a `200 OK` with no response body
//! to speak of. Exposed as a thin collaborator per `SPEC_FULL.md` §B,
//! alongside [`crate::conn::ConnectParams::parse`].

use crate::conn::ConnectParams;
use crate::error::{LbError, LbResult};
use crate::signer;

const PING_PATH: &str = "query/stream";

/// Sends a ping request and waits for a `200 OK`.
///
/// Per `SPEC_FULL.md` §C.4, this preserves the source's quirk of signing
/// the request as if it were a `POST` while the transport actually issues
/// a `GET`.
pub async fn ping(params: &ConnectParams) -> LbResult<()> {
    let date_header_value = unix_timestamp();
    let host_header = params.host_header();

    let headers = vec![
        ("Content-Length".to_string(), "0".to_string()),
        ("Content-Type".to_string(), "application/octet-stream".to_string()),
        ("Host".to_string(), host_header),
        ("X-LBDB-Date".to_string(), date_header_value.clone()),
    ];
    let token = signer::sign_request(
        params.access_key_id(),
        params.access_key_secret(),
        "POST",
        PING_PATH,
        &headers,
        &[],
        b"",
        &date_header_value,
    )?;

    let url = params
        .url()
        .join(PING_PATH)
        .map_err(|e| LbError::configuration(format!("invalid ping url: {e}")))?;

    let client = reqwest::Client::builder().build().map_err(LbError::Http)?;
    let response = client
        .get(url)
        .header("Content-Type", "application/octet-stream")
        .header("X-LBDB-Date", date_header_value)
        .header("Authorization", format!("Litebase-HMAC-SHA256 {token}"))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(LbError::connect(format!("ping failed: {}", response.status())));
    }

    Ok(())
}

fn unix_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string()
}
