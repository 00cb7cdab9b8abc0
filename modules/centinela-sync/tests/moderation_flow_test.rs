//! End-to-end flows over the in-memory doubles, from a stored profile
//! through session, store, view, map, moderation and comments.
//!
//! Each test walks one user journey and asserts the shared collection, the
//! drawn map state and the posted notices stay consistent. No network, no
//! rendering library.

use std::sync::Arc;

use chrono::Utc;

use centinela_core::api::{CommentRoute, StatSeries, StatsApi};
use centinela_core::session::Session;
use centinela_core::stats;
use centinela_core::types::{GeoPoint, IncidentDraft, IncidentKind, IncidentStatus, Region};
use centinela_core::view::{derive_view, matching, FilterState};
use centinela_sync::comments::CommentThread;
use centinela_sync::map::{MapPhase, MapView, SINGLE_MARKER_ZOOM};
use centinela_sync::moderation::Moderator;
use centinela_sync::notify::Severity;
use centinela_sync::store::IncidentStore;
use centinela_sync::testing::{
    comment_row, emergency_row, report_row, FakeMap, MemoryProfile, MockPortal, StubGate,
};

fn fresh_map(fake: &FakeMap) -> MapView {
    let mut map = MapView::new(
        Box::new(fake.clone()),
        Region::EL_SALVADOR,
        GeoPoint::new(13.7, -89.2),
        9,
    );
    map.init("incident-map");
    map
}

// ---------------------------------------------------------------------------
// Admin triage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_triages_an_emergency_end_to_end() {
    let portal = MockPortal::new().with_incidents(vec![
        emergency_row(1, 13.70, -89.20, false),
        emergency_row(2, 13.80, -89.10, true),
        emergency_row(3, 40.00, -3.70, false), // outside the region
    ]);
    let session = Session::resolve(&MemoryProfile::admin(1));
    assert!(session.is_admin());

    let mut store = IncidentStore::new(IncidentKind::Emergency, Arc::new(portal.clone()));
    store.load_all().await.unwrap();
    assert_eq!(store.len(), 3);

    let fake = FakeMap::new();
    let mut map = fresh_map(&fake);
    let visible = matching(store.incidents(), &FilterState::default());
    map.sync_markers(&visible);
    assert_eq!(map.marker_count(), 2, "out-of-region record gets no marker");

    let mut moderator = Moderator::new(session, Arc::new(StubGate::accepting()));
    moderator.toggle_status(&mut store, 1).await.unwrap();
    assert_eq!(store.get(1).unwrap().status, IncidentStatus::Attended);
    assert_eq!(store.counts().attended, 2);

    let deleted = moderator.delete(&mut store, 2).await.unwrap();
    assert!(deleted);
    assert_eq!(store.len(), 2);

    let visible = matching(store.incidents(), &FilterState::default());
    map.sync_markers(&visible);
    assert_eq!(map.marker_count(), 1);
    assert_eq!(fake.last_view().map(|(_, zoom)| zoom), Some(SINGLE_MARKER_ZOOM));

    map.dispose();
    assert_eq!(map.phase(), MapPhase::Disposed);
}

#[tokio::test]
async fn citizen_cannot_moderate_but_sees_the_notice() {
    let portal = MockPortal::new().with_incidents(vec![emergency_row(5, 13.7, -89.2, false)]);
    let session = Session::resolve(&MemoryProfile::citizen(4, "ana"));

    let mut store = IncidentStore::new(IncidentKind::Emergency, Arc::new(portal.clone()));
    store.load_all().await.unwrap();

    let mut moderator = Moderator::new(session, Arc::new(StubGate::accepting()));
    assert!(moderator.delete(&mut store, 5).await.is_err());

    assert_eq!(portal.delete_calls(), 0);
    assert_eq!(store.len(), 1, "collection unchanged after the rejection");
    let notice = moderator.notices().current(Utc::now()).unwrap();
    assert_eq!(notice.severity, Severity::Warning);

    moderator.notices_mut().dismiss();
    assert!(moderator.notices().current(Utc::now()).is_none());
}

#[tokio::test]
async fn profile_changes_re_gate_moderation() {
    let portal = MockPortal::new().with_incidents(vec![emergency_row(5, 13.7, -89.2, false)]);
    let mut store = IncidentStore::new(IncidentKind::Emergency, Arc::new(portal.clone()));
    store.load_all().await.unwrap();

    let profile = MemoryProfile::admin(1);
    let mut moderator =
        Moderator::new(Session::resolve(&profile), Arc::new(StubGate::accepting()));
    assert!(moderator.can_moderate());
    moderator.toggle_status(&mut store, 5).await.unwrap();
    assert_eq!(store.get(5).unwrap().status, IncidentStatus::Attended);

    // Sign-out empties the stored profile; the next resolution downgrades.
    profile.remove("usuario");
    profile.remove("authToken");
    moderator.set_session(Session::resolve(&profile));
    assert!(!moderator.can_moderate());
    assert!(!moderator.session().is_admin());

    assert!(moderator.toggle_status(&mut store, 5).await.is_err());
    assert_eq!(portal.update_calls(), 1, "no request after the downgrade");
}

// ---------------------------------------------------------------------------
// Citizen submission and discussion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn citizen_submits_a_report_and_comments_on_it() {
    let portal = MockPortal::new()
        .with_next_id(10)
        .with_comments(CommentRoute::Nested, vec![])
        .with_next_comment_id(100);
    let session = Session::resolve(&MemoryProfile::citizen(4, "ana"));

    let mut store = IncidentStore::new(IncidentKind::Report, Arc::new(portal.clone()));
    store.load_all().await.unwrap();

    let mut moderator = Moderator::new(session.clone(), Arc::new(StubGate::accepting()));
    let draft = IncidentDraft {
        description: "Calle inundada frente al mercado".into(),
        category: Some("Calle_inundada".into()),
        location: GeoPoint::new(13.71, -89.19),
        author_id: 0,
        attachment_url: None,
    };
    let report = moderator.submit(&mut store, draft).await.unwrap();
    assert_eq!(report.id, 10);
    assert_eq!(report.author.id, Some(4), "authorship comes from the session");

    let mut thread = CommentThread::new(Arc::new(portal.clone()), session, report.id);
    assert_eq!(thread.parent_id(), report.id);
    thread.load().await;
    assert!(thread.is_empty());

    thread.add("Confirmo, el agua sigue subiendo").await.unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread.comments()[0].author.id, Some(4));
    assert_eq!(thread.loaded_via(), Some(CommentRoute::Nested));
}

#[tokio::test]
async fn thread_falls_back_to_the_global_route() {
    let portal = MockPortal::new().with_comments(
        CommentRoute::Global,
        vec![
            comment_row(1, 7, "primero", 2),
            comment_row(2, 7, "segundo", 3),
            comment_row(3, 8, "de otro reporte", 2),
        ],
    );
    let session = Session::resolve(&MemoryProfile::citizen(2, "luis"));
    let mut thread = CommentThread::new(Arc::new(portal), session, 7);

    assert_eq!(thread.load().await, 2);
    assert_eq!(thread.loaded_via(), Some(CommentRoute::Global));
    assert!(thread.comments().iter().all(|c| c.parent_id == 7));
}

// ---------------------------------------------------------------------------
// Filtered list driving the map
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_narrows_the_list_and_the_markers_together() {
    let portal = MockPortal::new().with_incidents(vec![
        serde_json::json!({
            "reporteId": 1, "tipo": "Calle_inundada", "descripcion": "inundacion centro",
            "estado": "Pendiente", "latitud": 13.70, "longitud": -89.20,
        }),
        serde_json::json!({
            "reporteId": 2, "tipo": "Arbol_caido", "descripcion": "arbol sobre cables",
            "estado": "Pendiente", "latitud": 13.72, "longitud": -89.18,
        }),
        report_row(3, "Otro", "sin coordenadas"),
    ]);

    let mut store = IncidentStore::new(IncidentKind::Report, Arc::new(portal));
    store.load_all().await.unwrap();

    let filters = FilterState { search: "inundacion".into(), ..FilterState::default() };
    let view = derive_view(store.incidents(), &filters);
    assert_eq!(view.total_matching, 1);

    let fake = FakeMap::new();
    let mut map = fresh_map(&fake);
    map.sync_markers(&matching(store.incidents(), &filters));
    assert_eq!(map.marker_count(), 1);

    map.focus_on(1);
    assert_eq!(fake.popups_opened(), 1);
}

// ---------------------------------------------------------------------------
// Heat mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heat_mode_renders_everything_and_flags_the_outliers() {
    let rows = vec![
        serde_json::json!({"latitud": 13.70, "longitud": -89.20, "cantidad": 8}),
        serde_json::json!({"latitud": 13.95, "longitud": -88.80, "cantidad": 2}),
        serde_json::json!({"latitud": 19.40, "longitud": -99.10, "cantidad": 4}),
        serde_json::json!({"region": {"nombre": "Usulutan"}, "cantidad": 3}),
    ];
    let portal = MockPortal::new().with_series(StatSeries::Heatmap, rows);

    let fetched = portal.series(StatSeries::Heatmap).await.unwrap();
    let points = stats::heat_points(&fetched);
    assert_eq!(points.len(), 3, "the coordinate-less row yields no point");
    assert_eq!(
        points.iter().filter(|p| p.in_region(&Region::EL_SALVADOR)).count(),
        2
    );

    let fake = FakeMap::new();
    let mut map = fresh_map(&fake);
    map.show_heat(&points);

    let drawn = fake.heat_points();
    assert_eq!(drawn.len(), 3, "the far-away point still renders");
    let max_weight = drawn.iter().map(|p| p.weight).fold(0.0_f64, f64::max);
    assert!((max_weight - 1.0).abs() < 1e-9);
    let style = fake.heat_style().unwrap();
    assert_eq!(style.radius, 40);
    assert_eq!(style.gradient.len(), 6);

    let summary = stats::heat_summary(&fetched, &Region::EL_SALVADOR);
    assert_eq!(summary.inside, 2);
    assert_eq!(summary.outside, 1);
    assert_eq!(summary.unmappable, 1);
    assert_eq!(summary.total_metric, 17.0);
}

#[tokio::test]
async fn failed_load_leaves_a_recoverable_empty_state() {
    let portal = MockPortal::new().failing_list();
    let mut store = IncidentStore::new(IncidentKind::Emergency, Arc::new(portal));

    assert!(store.load_all().await.is_err());
    assert!(store.load_failed());

    let view = derive_view(store.incidents(), &FilterState::default());
    assert_eq!(view.total_matching, 0);
    assert_eq!(view.total_pages, 0);

    let fake = FakeMap::new();
    let mut map = fresh_map(&fake);
    map.sync_markers(&matching(store.incidents(), &FilterState::default()));
    assert_eq!(map.marker_count(), 0);
    assert_eq!(fake.last_view(), Some((GeoPoint::new(13.7, -89.2), 9)), "map returns home");
}
