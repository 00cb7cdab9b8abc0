//! Test doubles and row factories for exercising the sync layer without a
//! backend or a rendering library.
//!
//! `MockPortal` stands in for every remote collaborator at once: configure
//! it with raw rows per endpoint, hand clones to the code under test, then
//! inspect what was called. `FakeMap` records the drawing calls a real map
//! would receive. Everything here is deterministic and in-memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use centinela_core::api::{
    CommentApi, CommentRoute, IncidentApi, StatSeries, StatsApi,
};
use centinela_core::error::{ApiError, ApiResult};
use centinela_core::session::SessionStore;
use centinela_core::stats::HeatPoint;
use centinela_core::types::{
    CommentDraft, GeoPoint, Incident, IncidentDraft, IncidentKind, IncidentPatch, IncidentStatus,
    UserRef,
};

use crate::map::{HeatStyle, MapBackend, MarkerId};
use crate::moderation::ConfirmGate;

// ---------------------------------------------------------------------------
// Row factories
// ---------------------------------------------------------------------------

/// Emergency row the way the backend serializes one.
pub fn emergency_row(id: i64, lat: f64, lng: f64, atendido: bool) -> Value {
    json!({
        "emergenciaId": id,
        "mensaje": format!("Emergencia {id}"),
        "latitud": lat,
        "longitud": lng,
        "atendido": atendido,
        "usuario": {"usuarioId": 1, "nombre": "maria"},
        "fecha": "2026-08-01T10:00:00",
    })
}

/// Report row without coordinates; reports are mappable only when the
/// caller adds them.
pub fn report_row(id: i64, tipo: &str, descripcion: &str) -> Value {
    json!({
        "reporteId": id,
        "tipo": tipo,
        "descripcion": descripcion,
        "estado": "Pendiente",
        "usuario": {"usuarioId": 2, "nombre": "jose"},
        "fecha": "2026-08-02T09:30:00",
    })
}

/// Comment row in the nested-relation shape.
pub fn comment_row(id: i64, parent: i64, body: &str, author: i64) -> Value {
    json!({
        "comentarioId": id,
        "mensaje": body,
        "usuario": {"usuarioId": author, "nombre": "vecino"},
        "reporte": {"reporteId": parent},
        "fecha": "2026-08-03T18:00:00",
    })
}

/// Comment row in the flat shape some deployments return.
pub fn flat_comment_row(id: i64, parent: i64, body: &str, author: i64) -> Value {
    json!({
        "id": id,
        "texto": body,
        "usuarioId": author,
        "reporteId": parent,
    })
}

/// Already-normalized incident for tests that skip the wire layer.
pub fn incident(id: i64, location: Option<GeoPoint>) -> Incident {
    Incident {
        id,
        kind: IncidentKind::Report,
        description: format!("Incident {id}"),
        category: None,
        status: IncidentStatus::Pending,
        location,
        author: UserRef::default(),
        created_at: None,
        attachment: None,
    }
}

// ---------------------------------------------------------------------------
// Portal mock
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PortalState {
    incidents: Vec<Value>,
    comment_routes: HashMap<CommentRoute, Vec<Value>>,
    series: HashMap<StatSeries, Vec<Value>>,
    next_id: i64,
    next_comment_id: i64,
    fail_list: bool,
    update_failure: Option<u16>,
    create_calls: usize,
    update_calls: usize,
    delete_calls: usize,
    last_created_author: Option<i64>,
    comment_fetches: Vec<CommentRoute>,
    create_comment_calls: usize,
    update_comment_calls: usize,
    delete_comment_calls: usize,
}

/// In-memory stand-in for the remote portal. Clones share state, so keep
/// one handle for assertions and move another into the code under test.
#[derive(Clone)]
pub struct MockPortal {
    state: Arc<Mutex<PortalState>>,
}

impl Default for MockPortal {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPortal {
    pub fn new() -> Self {
        let state = PortalState {
            next_id: 1000,
            next_comment_id: 5000,
            ..PortalState::default()
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn with_incidents(self, rows: Vec<Value>) -> Self {
        self.state.lock().unwrap().incidents = rows;
        self
    }

    /// Serve an error from the collection endpoint.
    pub fn failing_list(self) -> Self {
        self.state.lock().unwrap().fail_list = true;
        self
    }

    /// Serve a server error from the update endpoint.
    pub fn failing_updates(self) -> Self {
        self.state.lock().unwrap().update_failure = Some(500);
        self
    }

    /// Serve a 403 from the update endpoint, the way a portal rejects a
    /// stale or underprivileged token.
    pub fn forbidden_updates(self) -> Self {
        self.state.lock().unwrap().update_failure = Some(403);
        self
    }

    /// Id the next created incident will get.
    pub fn with_next_id(self, id: i64) -> Self {
        self.state.lock().unwrap().next_id = id;
        self
    }

    /// Make one comment route answer with these rows. Unconfigured routes
    /// answer 404.
    pub fn with_comments(self, route: CommentRoute, rows: Vec<Value>) -> Self {
        self.state.lock().unwrap().comment_routes.insert(route, rows);
        self
    }

    pub fn with_next_comment_id(self, id: i64) -> Self {
        self.state.lock().unwrap().next_comment_id = id;
        self
    }

    pub fn with_series(self, series: StatSeries, rows: Vec<Value>) -> Self {
        self.state.lock().unwrap().series.insert(series, rows);
        self
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn update_calls(&self) -> usize {
        self.state.lock().unwrap().update_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.state.lock().unwrap().delete_calls
    }

    pub fn last_created_author(&self) -> Option<i64> {
        self.state.lock().unwrap().last_created_author
    }

    /// Routes probed so far, in order.
    pub fn comment_fetches(&self) -> Vec<CommentRoute> {
        self.state.lock().unwrap().comment_fetches.clone()
    }

    pub fn create_comment_calls(&self) -> usize {
        self.state.lock().unwrap().create_comment_calls
    }

    pub fn update_comment_calls(&self) -> usize {
        self.state.lock().unwrap().update_comment_calls
    }

    pub fn delete_comment_calls(&self) -> usize {
        self.state.lock().unwrap().delete_comment_calls
    }
}

#[async_trait]
impl IncidentApi for MockPortal {
    async fn list(&self, _kind: IncidentKind) -> ApiResult<Vec<Value>> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(ApiError::Network("connection refused (stub)".into()));
        }
        Ok(state.incidents.clone())
    }

    async fn create(&self, _kind: IncidentKind, draft: &IncidentDraft) -> ApiResult<Value> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        state.last_created_author = Some(draft.author_id);
        let id = state.next_id;
        state.next_id += 1;
        let row = json!({
            "id": id,
            "descripcion": draft.description,
            "tipo": draft.category,
            "latitud": draft.location.lat,
            "longitud": draft.location.lng,
            "atendido": false,
            "usuario": {"usuarioId": draft.author_id},
            "fotoUrl": draft.attachment_url,
        });
        state.incidents.push(row.clone());
        Ok(row)
    }

    async fn update(&self, _kind: IncidentKind, _id: i64, _patch: &IncidentPatch) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.update_calls += 1;
        if let Some(status) = state.update_failure {
            return Err(ApiError::Api { status, message: "update refused (stub)".into() });
        }
        Ok(())
    }

    async fn delete(&self, _kind: IncidentKind, _id: i64) -> ApiResult<()> {
        self.state.lock().unwrap().delete_calls += 1;
        Ok(())
    }
}

#[async_trait]
impl CommentApi for MockPortal {
    async fn fetch_comments(&self, route: CommentRoute, _parent_id: i64) -> ApiResult<Vec<Value>> {
        let mut state = self.state.lock().unwrap();
        state.comment_fetches.push(route);
        match state.comment_routes.get(&route) {
            Some(rows) => Ok(rows.clone()),
            None => Err(ApiError::Api { status: 404, message: "no such route (stub)".into() }),
        }
    }

    async fn create_comment(&self, draft: &CommentDraft) -> ApiResult<Value> {
        let mut state = self.state.lock().unwrap();
        state.create_comment_calls += 1;
        let id = state.next_comment_id;
        state.next_comment_id += 1;
        let row = comment_row(id, draft.parent_id, &draft.body, draft.author_id);
        for rows in state.comment_routes.values_mut() {
            rows.push(row.clone());
        }
        // The echo's shape purposely differs from the listing shape.
        Ok(json!({"ok": true, "nuevoId": id}))
    }

    async fn update_comment(&self, _id: i64, _body: &str) -> ApiResult<()> {
        self.state.lock().unwrap().update_comment_calls += 1;
        Ok(())
    }

    async fn delete_comment(&self, id: i64) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.delete_comment_calls += 1;
        for rows in state.comment_routes.values_mut() {
            rows.retain(|row| row.get("comentarioId").and_then(Value::as_i64) != Some(id));
        }
        Ok(())
    }
}

#[async_trait]
impl StatsApi for MockPortal {
    async fn series(&self, series: StatSeries) -> ApiResult<Vec<Value>> {
        let state = self.state.lock().unwrap();
        Ok(state.series.get(&series).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Map fake
// ---------------------------------------------------------------------------

/// One recorded viewport fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitCall {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
    pub padding: u32,
    pub max_zoom: Option<u8>,
}

#[derive(Default)]
struct FakeMapState {
    mounts: usize,
    unmounts: usize,
    next_marker: u64,
    markers: Vec<(MarkerId, GeoPoint, String)>,
    views: Vec<(GeoPoint, u8)>,
    fits: Vec<FitCall>,
    popups: Vec<MarkerId>,
    heat: Vec<HeatPoint>,
    heat_style: Option<HeatStyle>,
}

/// Records every drawing call instead of rendering. Clones share state.
#[derive(Clone, Default)]
pub struct FakeMap {
    state: Arc<Mutex<FakeMapState>>,
}

impl FakeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount_count(&self) -> usize {
        self.state.lock().unwrap().mounts
    }

    pub fn unmount_count(&self) -> usize {
        self.state.lock().unwrap().unmounts
    }

    /// Markers currently on the layer, after any clears.
    pub fn markers_placed(&self) -> usize {
        self.state.lock().unwrap().markers.len()
    }

    pub fn popup_texts(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .markers
            .iter()
            .map(|(_, _, popup)| popup.clone())
            .collect()
    }

    pub fn last_view(&self) -> Option<(GeoPoint, u8)> {
        self.state.lock().unwrap().views.last().copied()
    }

    pub fn last_fit(&self) -> Option<FitCall> {
        self.state.lock().unwrap().fits.last().cloned()
    }

    pub fn popups_opened(&self) -> usize {
        self.state.lock().unwrap().popups.len()
    }

    pub fn heat_points(&self) -> Vec<HeatPoint> {
        self.state.lock().unwrap().heat.clone()
    }

    pub fn heat_style(&self) -> Option<HeatStyle> {
        self.state.lock().unwrap().heat_style.clone()
    }
}

impl MapBackend for FakeMap {
    fn mount(&mut self, _anchor: &str, center: GeoPoint, zoom: u8) {
        let mut state = self.state.lock().unwrap();
        state.mounts += 1;
        state.views.push((center, zoom));
    }

    fn place_marker(&mut self, point: GeoPoint, popup: &str) -> MarkerId {
        let mut state = self.state.lock().unwrap();
        let id = MarkerId(state.next_marker);
        state.next_marker += 1;
        state.markers.push((id, point, popup.to_string()));
        id
    }

    fn clear_markers(&mut self) {
        self.state.lock().unwrap().markers.clear();
    }

    fn set_view(&mut self, center: GeoPoint, zoom: u8) {
        self.state.lock().unwrap().views.push((center, zoom));
    }

    fn fit_bounds(&mut self, south_west: GeoPoint, north_east: GeoPoint, padding: u32, max_zoom: Option<u8>) {
        self.state.lock().unwrap().fits.push(FitCall { south_west, north_east, padding, max_zoom });
    }

    fn open_popup(&mut self, marker: MarkerId) {
        self.state.lock().unwrap().popups.push(marker);
    }

    fn set_heat(&mut self, points: &[HeatPoint], style: &HeatStyle) {
        let mut state = self.state.lock().unwrap();
        state.heat = points.to_vec();
        state.heat_style = Some(style.clone());
    }

    fn unmount(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.unmounts += 1;
        state.markers.clear();
    }
}

// ---------------------------------------------------------------------------
// Confirmation stub
// ---------------------------------------------------------------------------

/// Answers every confirmation prompt the same way and remembers what was
/// asked.
pub struct StubGate {
    answer: bool,
    prompts: Mutex<Vec<String>>,
}

impl StubGate {
    pub fn accepting() -> Self {
        Self { answer: true, prompts: Mutex::new(Vec::new()) }
    }

    pub fn declining() -> Self {
        Self { answer: false, prompts: Mutex::new(Vec::new()) }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl ConfirmGate for StubGate {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer
    }
}

// ---------------------------------------------------------------------------
// Session store stub
// ---------------------------------------------------------------------------

/// Key-value profile store with the same read contract the browser-side
/// storage has.
#[derive(Clone, Default)]
pub struct MemoryProfile {
    values: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.values.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) {
        self.values.lock().unwrap().remove(key);
    }

    /// Profile for a signed-in administrator under the `usuario` key.
    pub fn admin(user_id: i64) -> Self {
        let store = Self::new();
        store.insert(
            "usuario",
            json!({"usuarioId": user_id, "nombre": "root", "rol": "ADMIN"}),
        );
        store.insert("authToken", json!("stub-token"));
        store
    }

    /// Profile for a signed-in ordinary user.
    pub fn citizen(user_id: i64, nombre: &str) -> Self {
        let store = Self::new();
        store.insert(
            "usuario",
            json!({"usuarioId": user_id, "nombre": nombre, "rol": "user"}),
        );
        store
    }
}

impl SessionStore for MemoryProfile {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
