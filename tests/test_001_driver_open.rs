//! Scenario 1 from spec §8: driver open validation.

use litebase_client::ConnectParams;

#[test]
fn opens_with_all_three_required_keys() {
    let params =
        ConnectParams::parse("access_key_id=test access_key_secret=test url=http://localhost:8080");
    assert!(params.is_ok());
}

#[test]
fn rejects_missing_access_key_id() {
    let params = ConnectParams::parse("access_key_secret=test url=http://localhost:8080");
    assert!(params.is_err());
}

#[test]
fn rejects_missing_access_key_secret() {
    let params = ConnectParams::parse("access_key_id=test url=http://localhost:8080");
    assert!(params.is_err());
}

#[test]
fn rejects_missing_url() {
    let params = ConnectParams::parse("access_key_id=test access_key_secret=test");
    assert!(params.is_err());
}

#[test]
fn unrecognized_keys_are_ignored() {
    let params = ConnectParams::parse(
        "access_key_id=test access_key_secret=test url=http://localhost:8080 pool_size=5",
    );
    assert!(params.is_ok());
}
