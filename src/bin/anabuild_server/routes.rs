//! HTTP route registration for the packaging service.

use super::*;

pub(super) fn service_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/repository/configuration",
            get(get_configuration).post(put_configuration),
        )
        .route("/repository/contentList", get(content_list))
        .route("/repository/content", get(content))
        .route("/extension", post(build_from_selection))
        .route("/extension/yaml", post(build_from_yaml))
        .route("/extension/repository", post(build_from_repository))
        .route("/cep/status", get(cep_status))
        .route("/cep/id", get(cep_id))
        .fallback(fallback)
}

async fn fallback() -> Response {
    not_found("not found")
}
