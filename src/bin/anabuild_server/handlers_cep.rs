use super::*;

pub(super) async fn cep_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, Response> {
    let base = state.platform()?;
    let status = state
        .engine_status(base, headers.get(header::AUTHORIZATION))
        .await
        .map_err(bad_gateway)?;
    Ok(Json(status))
}

pub(super) async fn cep_id(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, Response> {
    let base = state.platform()?;
    let id = state
        .engine_id(base, headers.get(header::AUTHORIZATION))
        .await
        .map_err(bad_gateway)?;
    if id.is_none() {
        tracing::warn!("engine managed object not found");
    }
    Ok(Json(serde_json::json!({"id": id})))
}
