//! Parses the driver's connection string into typed parameters.
//!
//! Grounded on `original_source/sql/driver.go`'s `OpenConnector`, which
//! splits the connection string on spaces and then on `=`. Restated in
//! the idiom of `hdbconnect_impl`'s `ConnectParams` (a plain struct with
//! accessors, built once at `open` time rather than re-parsed per
//! connection).

use secstr::SecUtf8;
use url::Url;

use crate::error::{LbError, LbResult};

/// The parsed form of a litebase driver connection string, e.g.
/// `"access_key_id=... access_key_secret=... url=http://host:port"`.
#[derive(Clone)]
pub struct ConnectParams {
    access_key_id: String,
    access_key_secret: SecUtf8,
    url: Url,
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"***")
            .field("url", &self.url)
            .finish()
    }
}

impl ConnectParams {
    /// Parses a space-separated `key=value` connection string. Only pairs
    /// containing exactly one `=` are recognized, matching the source's
    /// `strings.Split(pair, "=")` + `len(kv) == 2` check: a value
    /// containing `=` is silently dropped, not an error.
    pub fn parse(connection_string: &str) -> LbResult<Self> {
        let mut access_key_id = None;
        let mut access_key_secret = None;
        let mut url = None;

        for pair in connection_string.split(' ') {
            if pair.is_empty() {
                continue;
            }
            let parts: Vec<&str> = pair.split('=').collect();
            if parts.len() != 2 {
                continue;
            }
            let (key, value) = (parts[0], parts[1]);
            match key {
                "access_key_id" => access_key_id = Some(value.to_string()),
                "access_key_secret" => access_key_secret = Some(value.to_string()),
                "url" => url = Some(value.to_string()),
                _ => {}
            }
        }

        let access_key_id = match access_key_id {
            Some(v) if !v.is_empty() => v,
            _ => return Err(LbError::configuration("access_key_id is required")),
        };
        let access_key_secret = match access_key_secret {
            Some(v) if !v.is_empty() => v,
            _ => return Err(LbError::configuration("access_key_secret is required")),
        };
        let url = match url {
            Some(v) if !v.is_empty() => v,
            _ => return Err(LbError::configuration("url is required")),
        };
        let url = Url::parse(&url).map_err(|e| LbError::configuration(format!("invalid url: {e}")))?;

        Ok(Self {
            access_key_id,
            access_key_secret: SecUtf8::from(access_key_secret),
            url,
        })
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn access_key_secret(&self) -> &SecUtf8 {
        &self.access_key_secret
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The `host` or `host:port` string used in both the handshake and
    /// per-chunk `Host` header.
    pub(crate) fn host_header(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{port}", self.url.host_str().unwrap_or_default()),
            None => self.url.host_str().unwrap_or_default().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_connection_string() {
        let params =
            ConnectParams::parse("access_key_id=test access_key_secret=test url=http://localhost:8080")
                .unwrap();
        assert_eq!(params.access_key_id(), "test");
        assert_eq!(params.access_key_secret().unsecure(), "test");
        assert_eq!(params.host_header(), "localhost:8080");
    }

    #[test]
    fn rejects_missing_access_key_id() {
        let err = ConnectParams::parse("access_key_secret=test url=http://localhost:8080").unwrap_err();
        assert!(matches!(err, LbError::Configuration(_)));
    }

    #[test]
    fn rejects_empty_access_key_secret() {
        let err = ConnectParams::parse("access_key_id=k access_key_secret= url=http://localhost:8080")
            .unwrap_err();
        assert!(matches!(err, LbError::Configuration(_)));
    }

    #[test]
    fn rejects_missing_url() {
        let err = ConnectParams::parse("access_key_id=k access_key_secret=s url=").unwrap_err();
        assert!(matches!(err, LbError::Configuration(_)));
    }

    #[test]
    fn drops_pairs_with_more_than_one_equals_sign() {
        let params = ConnectParams::parse(
            "access=key_id=oops access_key_id=k access_key_secret=s url=http://localhost:8080",
        )
        .unwrap();
        assert_eq!(params.access_key_id(), "k");
    }
}
