use super::*;

#[test]
fn envelope_with_auth_type_is_unauthorized() {
    let err = ClientError::from_envelope(200, Some("Unauthorized"), "Unauthorized".into());
    assert!(err.is_unauthorized());

    let err = ClientError::from_envelope(200, Some("InvalidToken"), "Invalid Token".into());
    assert!(err.is_unauthorized());
}

#[test]
fn envelope_with_401_status_is_unauthorized() {
    let err = ClientError::from_envelope(401, None, "nope".into());
    assert!(err.is_unauthorized());
}

#[test]
fn envelope_with_other_type_is_api_error() {
    let err = ClientError::from_envelope(200, Some("NotFound"), "Not Found".into());
    assert!(!err.is_unauthorized());
    assert_eq!(err.to_string(), "Not Found");
}

#[test]
fn status_errors_retryable_only_for_throttle_and_server_faults() {
    assert!(ClientError::Status { status: 503, body: String::new() }.retryable());
    assert!(ClientError::Status { status: 429, body: String::new() }.retryable());
    assert!(!ClientError::Status { status: 404, body: String::new() }.retryable());
}

#[test]
fn local_precondition_errors_are_not_retryable() {
    assert!(!ClientError::NoBoard.retryable());
    let err = ClientError::CrossColumnSwap { first: "a".into(), second: "b".into(), column_id: "x".into() };
    assert!(!err.retryable());
    assert!(err.to_string().contains("not both in column x"));
}
