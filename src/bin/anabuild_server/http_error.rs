use super::*;

pub(super) fn error_with_status(status: StatusCode, msg: String) -> Response {
    (status, Json(serde_json::json!({"error": msg}))).into_response()
}

pub(super) fn bad_request(err: anyhow::Error) -> Response {
    error_with_status(StatusCode::BAD_REQUEST, format!("{:#}", err))
}

pub(super) fn not_found(msg: &str) -> Response {
    error_with_status(StatusCode::NOT_FOUND, msg.to_string())
}

pub(super) fn bad_gateway(err: anyhow::Error) -> Response {
    error_with_status(StatusCode::BAD_GATEWAY, format!("{:#}", err))
}

pub(super) fn internal_error(err: anyhow::Error) -> Response {
    error_with_status(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err))
}

pub(super) fn service_unavailable(msg: &str) -> Response {
    error_with_status(StatusCode::SERVICE_UNAVAILABLE, msg.to_string())
}

fn local_access_denied(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<LocalAccessDenied>())
}

/// Rejected source urls: a refused local path is a 403, anything else a 400.
pub(super) fn source_rejected(err: anyhow::Error) -> Response {
    if local_access_denied(&err) {
        error_with_status(StatusCode::FORBIDDEN, format!("{:#}", err))
    } else {
        bad_request(err)
    }
}

/// Source failures: a refused local path is a 403, a missing one a 404, anything upstream a 502.
pub(super) fn source_error(err: anyhow::Error) -> Response {
    if local_access_denied(&err) {
        return error_with_status(StatusCode::FORBIDDEN, format!("{:#}", err));
    }
    let missing = err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
    });
    if missing {
        error_with_status(StatusCode::NOT_FOUND, format!("{:#}", err))
    } else {
        bad_gateway(err)
    }
}

/// Status of a build that failed while fetching its sources.
pub(super) fn fetch_status(err: &anyhow::Error) -> StatusCode {
    if local_access_denied(err) {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::BAD_GATEWAY
    }
}

/// Build failures keep the `{"message": ...}` shape clients show to users.
pub(super) fn build_error(status: StatusCode, err: anyhow::Error) -> Response {
    (
        status,
        Json(serde_json::json!({"message": format!("Error: {:#}", err)})),
    )
        .into_response()
}
