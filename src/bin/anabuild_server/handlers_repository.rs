use super::*;

#[derive(Debug, serde::Deserialize)]
pub(super) struct ContentListQuery {
    url: String,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub(super) struct ContentQuery {
    url: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    cep_block_name: Option<String>,
    #[serde(default)]
    extract_fqn_cep_block: Option<String>,
}

fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

pub(super) async fn get_configuration(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<Repository>> {
    let repositories = state.repositories.read().await;
    Json(repositories.clone())
}

pub(super) async fn put_configuration(
    State(state): State<Arc<AppState>>,
    Json(repositories): Json<Vec<Repository>>,
) -> Result<Json<Vec<Repository>>, Response> {
    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = repositories.iter().find(|r| !seen.insert(r.id.as_str())) {
        return Err(bad_request(anyhow::anyhow!(
            "duplicate repository id {}",
            dup.id
        )));
    }

    let mut current = state.repositories.write().await;
    persist_repositories(&state.data_dir, &repositories).map_err(internal_error)?;
    tracing::info!(count = repositories.len(), "saved repository configuration");
    *current = repositories;
    Ok(Json(current.clone()))
}

pub(super) async fn content_list(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ContentListQuery>,
) -> Result<Json<serde_json::Value>, Response> {
    state.source(&q.url).map_err(source_rejected)?;
    let token = state.token_for(q.id.as_deref()).await;
    let listing = state
        .list(&q.url, token.as_deref())
        .await
        .map_err(source_error)?;
    Ok(Json(listing))
}

pub(super) async fn content(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ContentQuery>,
) -> Result<Response, Response> {
    state.source(&q.url).map_err(source_rejected)?;
    let token = state.token_for(q.id.as_deref()).await;
    let bytes = state
        .read(&q.url, token.as_deref())
        .await
        .map_err(source_error)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    let body = if parse_flag(q.extract_fqn_cep_block.as_deref()) {
        let file = q
            .cep_block_name
            .as_deref()
            .unwrap_or_else(|| anabuild::github::raw_file_name(&q.url));
        anabuild::resolver::extract_fqn(&text, file).ok_or_else(|| {
            error_with_status(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("no package declaration in {}", file),
            )
        })?
    } else {
        text
    };
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}
