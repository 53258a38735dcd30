//! Scenario 2 from spec §8: the outbound frame for an INSERT with bound
//! parameters encodes to the exact lengths the spec calls out.

use litebase_client::{Frame, Parameter, Query};

#[test]
fn insert_with_two_parameters_encodes_expected_lengths() {
    let stmt = "INSERT INTO t(id,name) VALUES(?,?)";
    assert_eq!(stmt.len(), 35);

    let query = Query::new("req-1", stmt).with_parameters(vec![
        Parameter::Integer(1),
        Parameter::Text("hello".to_string()),
    ]);

    let mut entry = Vec::new();
    let mut params_scratch = Vec::new();
    query.encode(&mut entry, &mut params_scratch).unwrap();

    // paramsLen = (1+4+8) + (1+4+5) = 23, per spec §8 scenario 2.
    assert_eq!(params_scratch.len(), 23);

    let frame = Frame::new();
    frame.append(entry).unwrap();
    let encoded = frame.encode().unwrap();

    assert_eq!(encoded[0], 0x04);
    assert!(!frame.is_empty());
    assert!(frame.is_closed());
}
