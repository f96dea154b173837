use super::*;

#[test]
fn http_status_matches_taxonomy() {
    assert_eq!(ErrorCode::Input.http_status(), 400);
    assert_eq!(ErrorCode::Auth.http_status(), 401);
    assert_eq!(ErrorCode::Rate.http_status(), 429);
    assert_eq!(ErrorCode::Upstream.http_status(), 502);
    assert_eq!(ErrorCode::NotFound.http_status(), 404);
    assert_eq!(ErrorCode::Internal.http_status(), 500);
}

#[test]
fn display_matches_as_str() {
    for code in [
        ErrorCode::Input,
        ErrorCode::Auth,
        ErrorCode::Rate,
        ErrorCode::Upstream,
        ErrorCode::NotFound,
        ErrorCode::Delivery,
        ErrorCode::Parse,
        ErrorCode::Internal,
    ] {
        assert_eq!(code.to_string(), code.as_str());
    }
}

#[test]
fn error_body_sets_ok_false() {
    let body = ErrorBody::new(ErrorCode::Input, "bad pid");
    assert!(!body.ok);
    assert_eq!(body.error, "bad pid");
    assert_eq!(body.code, "input");
}

#[test]
fn response_pairs_status_with_matching_code() {
    let (status, body) = ErrorCode::NotFound.response("pid not found");
    assert_eq!(status.as_u16(), 404);
    assert_eq!(body.0.code, "not_found");
}
