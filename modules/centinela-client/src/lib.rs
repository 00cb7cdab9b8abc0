//! HTTP client for the Centinela portal backend.
//!
//! Implements the collaborator traits from `centinela_core::api` over REST.
//! Wire payloads use the backend's Spanish field names; responses are handed
//! back as raw `serde_json::Value` rows for the record normalizer.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use url::Url;

use centinela_core::api::{
    AttachmentApi, AttachmentSrc, CommentApi, CommentRoute, IncidentApi, StatSeries, StatsApi,
};
use centinela_core::error::{ApiError, ApiResult};
use centinela_core::types::{AttachmentRef, CommentDraft, IncidentDraft, IncidentKind, IncidentPatch};

/// Wrapper keys some deployments put around list responses.
const ROW_WRAPPER_KEYS: &[&str] = &["content", "data", "items", "comentarios"];

pub struct PortalClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl PortalClient {
    /// Validates the base URL up front so a typo fails at construction
    /// rather than on the first request.
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Url::parse(base_url)
            .map_err(|e| ApiError::Parse(format!("invalid base URL {base_url}: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_ok(&self, builder: reqwest::RequestBuilder) -> ApiResult<reqwest::Response> {
        let resp = self.authed(builder).send().await.map_err(net_err)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp)
    }

    async fn get_rows(&self, path: &str) -> ApiResult<Vec<Value>> {
        let resp = self.send_ok(self.http.get(self.url(path))).await?;
        let body: Value = resp.json().await.map_err(net_err)?;
        let rows = rows_from(body)?;
        tracing::debug!(path, rows = rows.len(), "Fetched rows");
        Ok(rows)
    }
}

fn net_err(e: reqwest::Error) -> ApiError {
    if e.is_decode() {
        ApiError::Parse(e.to_string())
    } else {
        ApiError::Network(e.to_string())
    }
}

/// Accepts a bare array or one of the known single-key wrappers.
fn rows_from(body: Value) -> ApiResult<Vec<Value>> {
    match body {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut obj) => {
            for key in ROW_WRAPPER_KEYS {
                if let Some(Value::Array(rows)) = obj.remove(*key) {
                    return Ok(rows);
                }
            }
            Err(ApiError::Parse(
                "expected an array of rows in the response".into(),
            ))
        }
        other => Err(ApiError::Parse(format!(
            "expected an array of rows, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Endpoint and payload mapping
// ---------------------------------------------------------------------------

fn collection_path(kind: IncidentKind) -> &'static str {
    match kind {
        IncidentKind::Emergency => "/api/emergencias",
        IncidentKind::Report => "/api/reportes",
    }
}

fn series_path(series: StatSeries) -> &'static str {
    match series {
        StatSeries::ReportsByType => "/api/reportes/estadisticas/tipos",
        StatSeries::ReportsByStatus => "/api/reportes/estadisticas/estados",
        StatSeries::ReportsByRegion => "/api/reportes/estadisticas/regiones",
        StatSeries::Heatmap => "/api/reportes/estadisticas/heatmap",
        StatSeries::AlertsByLevel => "/api/estadisticas/alertas/niveles",
        StatSeries::AlertsByRegion => "/api/estadisticas/alertas/regiones",
        StatSeries::EmergenciesByAttention => "/api/estadisticas/emergencias/atendidos",
    }
}

fn comment_route_path(route: CommentRoute, parent_id: i64) -> String {
    match route {
        CommentRoute::Nested => format!("/api/reportes/{parent_id}/comentarios"),
        CommentRoute::ByParentQuery(key) => format!("/api/comentarios?{key}={parent_id}"),
        CommentRoute::Global => "/api/comentarios".to_string(),
    }
}

/// New records go out in the backend's own vocabulary, author nested as
/// `usuario`, status starting pending.
fn draft_wire(kind: IncidentKind, draft: &IncidentDraft) -> Value {
    match kind {
        IncidentKind::Emergency => json!({
            "usuario": {"usuarioId": draft.author_id},
            "mensaje": draft.description,
            "latitud": draft.location.lat,
            "longitud": draft.location.lng,
            "atendido": false,
        }),
        IncidentKind::Report => json!({
            "tipo": draft.category,
            "descripcion": draft.description,
            "latitud": draft.location.lat,
            "longitud": draft.location.lng,
            "fecha": Utc::now().to_rfc3339(),
            "usuario": {"usuarioId": draft.author_id},
            "fotoUrl": draft.attachment_url,
        }),
    }
}

fn patch_wire(kind: IncidentKind, patch: &IncidentPatch) -> Value {
    let mut body = serde_json::Map::new();
    if let Some(status) = &patch.status {
        match (kind, status.as_bool()) {
            (IncidentKind::Emergency, Some(b)) => {
                body.insert("atendido".into(), json!(b));
            }
            _ => {
                body.insert("estado".into(), json!(status.label()));
            }
        }
    }
    if let Some(description) = &patch.description {
        let key = match kind {
            IncidentKind::Emergency => "mensaje",
            IncidentKind::Report => "descripcion",
        };
        body.insert(key.into(), json!(description));
    }
    if let Some(category) = &patch.category {
        body.insert("tipo".into(), json!(category));
    }
    Value::Object(body)
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl IncidentApi for PortalClient {
    async fn list(&self, kind: IncidentKind) -> ApiResult<Vec<Value>> {
        self.get_rows(collection_path(kind)).await
    }

    async fn create(&self, kind: IncidentKind, draft: &IncidentDraft) -> ApiResult<Value> {
        let builder = self
            .http
            .post(self.url(collection_path(kind)))
            .json(&draft_wire(kind, draft));
        let resp = self.send_ok(builder).await?;
        resp.json().await.map_err(net_err)
    }

    async fn update(&self, kind: IncidentKind, id: i64, patch: &IncidentPatch) -> ApiResult<()> {
        let path = format!("{}/{id}", collection_path(kind));
        let builder = self.http.put(self.url(&path)).json(&patch_wire(kind, patch));
        self.send_ok(builder).await?;
        Ok(())
    }

    async fn delete(&self, kind: IncidentKind, id: i64) -> ApiResult<()> {
        let path = format!("{}/{id}", collection_path(kind));
        self.send_ok(self.http.delete(self.url(&path))).await?;
        Ok(())
    }
}

#[async_trait]
impl CommentApi for PortalClient {
    async fn fetch_comments(&self, route: CommentRoute, parent_id: i64) -> ApiResult<Vec<Value>> {
        self.get_rows(&comment_route_path(route, parent_id)).await
    }

    async fn create_comment(&self, draft: &CommentDraft) -> ApiResult<Value> {
        let body = json!({
            "mensaje": draft.body,
            "usuario": {"usuarioId": draft.author_id},
            "reporte": {"reporteId": draft.parent_id},
        });
        let builder = self.http.post(self.url("/api/comentarios")).json(&body);
        let resp = self.send_ok(builder).await?;
        resp.json().await.map_err(net_err)
    }

    async fn update_comment(&self, id: i64, body: &str) -> ApiResult<()> {
        let builder = self
            .http
            .put(self.url(&format!("/api/comentarios/{id}")))
            .json(&json!({"mensaje": body}));
        self.send_ok(builder).await?;
        Ok(())
    }

    async fn delete_comment(&self, id: i64) -> ApiResult<()> {
        self.send_ok(self.http.delete(self.url(&format!("/api/comentarios/{id}"))))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StatsApi for PortalClient {
    async fn series(&self, series: StatSeries) -> ApiResult<Vec<Value>> {
        self.get_rows(series_path(series)).await
    }
}

#[async_trait]
impl AttachmentApi for PortalClient {
    async fn resolve_attachment(&self, attachment: &AttachmentRef) -> ApiResult<AttachmentSrc> {
        match attachment {
            AttachmentRef::Url(url) => Ok(AttachmentSrc::Url(url.clone())),
            AttachmentRef::PhotoId(id) => {
                let resp = self
                    .send_ok(self.http.get(self.url(&format!("/api/fotos/{id}"))))
                    .await?;
                let mime = resp
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = resp.bytes().await.map_err(net_err)?.to_vec();
                Ok(AttachmentSrc::Bytes { data, mime })
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use centinela_core::types::{GeoPoint, IncidentStatus};

    fn report_draft() -> IncidentDraft {
        IncidentDraft {
            description: "Calle bloqueada por derrumbe".into(),
            category: Some("Paso_cerrado".into()),
            location: GeoPoint::new(13.69, -89.19),
            author_id: 7,
            attachment_url: None,
        }
    }

    #[test]
    fn base_url_is_validated_and_trimmed() {
        assert!(PortalClient::new("not a url").is_err());
        let client = PortalClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.url("/api/reportes"), "http://localhost:8080/api/reportes");
    }

    #[test]
    fn collection_paths_match_the_backend() {
        assert_eq!(collection_path(IncidentKind::Emergency), "/api/emergencias");
        assert_eq!(collection_path(IncidentKind::Report), "/api/reportes");
    }

    #[test]
    fn comment_routes_render_expected_paths() {
        assert_eq!(
            comment_route_path(CommentRoute::Nested, 5),
            "/api/reportes/5/comentarios"
        );
        assert_eq!(
            comment_route_path(CommentRoute::ByParentQuery("reporteId"), 5),
            "/api/comentarios?reporteId=5"
        );
        assert_eq!(comment_route_path(CommentRoute::Global, 5), "/api/comentarios");
    }

    #[test]
    fn series_paths_cover_every_variant() {
        assert_eq!(
            series_path(StatSeries::ReportsByType),
            "/api/reportes/estadisticas/tipos"
        );
        assert_eq!(
            series_path(StatSeries::EmergenciesByAttention),
            "/api/estadisticas/emergencias/atendidos"
        );
        assert_eq!(
            series_path(StatSeries::Heatmap),
            "/api/reportes/estadisticas/heatmap"
        );
    }

    #[test]
    fn emergency_draft_nests_author_and_starts_pending() {
        let draft = IncidentDraft {
            category: None,
            ..report_draft()
        };
        let wire = draft_wire(IncidentKind::Emergency, &draft);
        assert_eq!(wire["usuario"]["usuarioId"], 7);
        assert_eq!(wire["atendido"], false);
        assert_eq!(wire["mensaje"], "Calle bloqueada por derrumbe");
        assert!(wire.get("tipo").is_none());
    }

    #[test]
    fn report_draft_carries_category_and_timestamp() {
        let wire = draft_wire(IncidentKind::Report, &report_draft());
        assert_eq!(wire["tipo"], "Paso_cerrado");
        assert_eq!(wire["descripcion"], "Calle bloqueada por derrumbe");
        assert_eq!(wire["fotoUrl"], Value::Null);
        assert!(wire["fecha"].as_str().is_some());
    }

    #[test]
    fn status_patch_maps_to_boolean_or_label_per_kind() {
        let toggle = IncidentPatch::status(IncidentStatus::Attended);
        assert_eq!(patch_wire(IncidentKind::Emergency, &toggle)["atendido"], true);
        assert_eq!(
            patch_wire(IncidentKind::Report, &toggle)["estado"],
            "attended"
        );

        let workflow = IncidentPatch::status(IncidentStatus::Workflow("En proceso".into()));
        assert_eq!(
            patch_wire(IncidentKind::Emergency, &workflow)["estado"],
            "En proceso"
        );
    }

    #[test]
    fn text_patches_use_per_kind_field_names() {
        let patch = IncidentPatch {
            description: Some("actualizado".into()),
            category: Some("Otro".into()),
            ..Default::default()
        };
        let emergency = patch_wire(IncidentKind::Emergency, &patch);
        assert_eq!(emergency["mensaje"], "actualizado");
        let report = patch_wire(IncidentKind::Report, &patch);
        assert_eq!(report["descripcion"], "actualizado");
        assert_eq!(report["tipo"], "Otro");
    }

    #[test]
    fn rows_unwrap_arrays_and_known_wrappers() {
        assert_eq!(rows_from(serde_json::json!([1, 2])).unwrap().len(), 2);
        assert_eq!(
            rows_from(serde_json::json!({"content": [1, 2, 3]})).unwrap().len(),
            3
        );
        assert_eq!(
            rows_from(serde_json::json!({"comentarios": []})).unwrap().len(),
            0
        );
        assert!(rows_from(serde_json::json!({"otra": 1})).is_err());
        assert!(rows_from(serde_json::json!(42)).is_err());
    }

    #[tokio::test]
    async fn direct_urls_resolve_without_touching_the_network() {
        let client = PortalClient::new("http://localhost:8080").unwrap();
        let src = client
            .resolve_attachment(&AttachmentRef::Url("https://cdn.example/a.jpg".into()))
            .await
            .unwrap();
        assert_eq!(src, AttachmentSrc::Url("https://cdn.example/a.jpg".into()));
    }
}
