//! In-memory incident collection backed by the remote portal API.
//!
//! The store is the single source of truth the view engine, the map and the
//! moderation controller all read from. It never applies an optimistic
//! update: local state changes only after the server confirms, so a failed
//! request leaves the collection exactly as it was.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use centinela_core::api::IncidentApi;
use centinela_core::error::{ApiError, Result};
use centinela_core::record;
use centinela_core::types::{Incident, IncidentDraft, IncidentKind, IncidentPatch, IncidentStatus};

/// Attended/pending tallies kept alongside the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub attended: usize,
    pub pending: usize,
    pub other: usize,
}

pub struct IncidentStore {
    api: Arc<dyn IncidentApi>,
    kind: IncidentKind,
    incidents: Vec<Incident>,
    by_id: HashMap<i64, usize>,
    counts: StatusCounts,
    load_failed: bool,
}

impl IncidentStore {
    pub fn new(kind: IncidentKind, api: Arc<dyn IncidentApi>) -> Self {
        Self {
            api,
            kind,
            incidents: Vec::new(),
            by_id: HashMap::new(),
            counts: StatusCounts::default(),
            load_failed: false,
        }
    }

    /// Replace the collection with the server's, newest first. On failure
    /// the collection empties and the error flag is set; the caller decides
    /// what to show.
    pub async fn load_all(&mut self) -> Result<usize> {
        match self.api.list(self.kind).await {
            Ok(rows) => {
                let mut incidents: Vec<Incident> = rows
                    .iter()
                    .filter_map(|row| record::normalize_incident(row, self.kind))
                    .collect();
                let dropped = rows.len() - incidents.len();
                incidents.sort_unstable_by(|a, b| {
                    b.id.cmp(&a.id).then_with(|| b.created_at.cmp(&a.created_at))
                });
                incidents.dedup_by_key(|i| i.id);

                self.incidents = incidents;
                self.load_failed = false;
                self.reindex();
                info!(
                    kind = %self.kind,
                    count = self.incidents.len(),
                    dropped,
                    "Loaded incidents"
                );
                Ok(self.incidents.len())
            }
            Err(e) => {
                self.incidents.clear();
                self.by_id.clear();
                self.counts = StatusCounts::default();
                self.load_failed = true;
                warn!(kind = %self.kind, error = %e, "Load failed, collection cleared");
                Err(e.into())
            }
        }
    }

    /// Validate locally, post, and append the server's confirmed record.
    /// No refetch: the echo carries the assigned id.
    pub async fn create(&mut self, draft: &IncidentDraft) -> Result<Incident> {
        draft.validate()?;
        let echo = self.api.create(self.kind, draft).await?;
        let incident = record::normalize_incident(&echo, self.kind).ok_or_else(|| {
            ApiError::Parse("create response carried no resolvable id".into())
        })?;
        info!(kind = %self.kind, id = incident.id, "Incident created");

        self.incidents.push(incident.clone());
        self.incidents.sort_unstable_by(|a, b| {
            b.id.cmp(&a.id).then_with(|| b.created_at.cmp(&a.created_at))
        });
        self.incidents.dedup_by_key(|i| i.id);
        self.reindex();
        Ok(incident)
    }

    /// Partial update. After confirmation the patch is merged field by
    /// field into the local record; an id that vanished meanwhile (raced
    /// delete) makes the merge a no-op.
    pub async fn update_field(&mut self, id: i64, patch: &IncidentPatch) -> Result<()> {
        self.api.update(self.kind, id, patch).await?;
        match self.by_id.get(&id) {
            Some(&idx) => {
                let incident = &mut self.incidents[idx];
                if let Some(status) = &patch.status {
                    incident.status = status.clone();
                }
                if let Some(description) = &patch.description {
                    incident.description = description.clone();
                }
                if let Some(category) = &patch.category {
                    incident.category = Some(category.clone());
                }
                self.recount();
                info!(kind = %self.kind, id, "Incident updated");
            }
            None => {
                debug!(kind = %self.kind, id, "Update confirmed for a record no longer cached");
            }
        }
        Ok(())
    }

    /// Delete on the server, then locally. Removing an id that is already
    /// gone is not an error.
    pub async fn remove(&mut self, id: i64) -> Result<()> {
        self.api.delete(self.kind, id).await?;
        if let Some(idx) = self.by_id.remove(&id) {
            self.incidents.remove(idx);
            self.reindex();
            info!(kind = %self.kind, id, "Incident removed");
        } else {
            debug!(kind = %self.kind, id, "Remove confirmed for an id not cached");
        }
        Ok(())
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn get(&self, id: i64) -> Option<&Incident> {
        self.by_id.get(&id).map(|&idx| &self.incidents[idx])
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    pub fn kind(&self) -> IncidentKind {
        self.kind
    }

    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn counts(&self) -> StatusCounts {
        self.counts
    }

    fn reindex(&mut self) {
        self.by_id = self
            .incidents
            .iter()
            .enumerate()
            .map(|(idx, i)| (i.id, idx))
            .collect();
        self.recount();
    }

    fn recount(&mut self) {
        let mut counts = StatusCounts::default();
        for incident in &self.incidents {
            match incident.status {
                IncidentStatus::Attended => counts.attended += 1,
                IncidentStatus::Pending => counts.pending += 1,
                IncidentStatus::Workflow(_) => counts.other += 1,
            }
        }
        self.counts = counts;
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{emergency_row, report_row, MockPortal};
    use centinela_core::types::GeoPoint;

    fn draft() -> IncidentDraft {
        IncidentDraft {
            description: "Paso cerrado en la carretera".into(),
            category: Some("Paso_cerrado".into()),
            location: GeoPoint::new(13.7, -89.2),
            author_id: 4,
            attachment_url: None,
        }
    }

    #[tokio::test]
    async fn load_sorts_newest_first_and_drops_idless_rows() {
        let portal = MockPortal::new().with_incidents(vec![
            report_row(2, "Otro", "segunda"),
            report_row(9, "Calle_inundada", "novena"),
            serde_json::json!({"descripcion": "sin id"}),
            report_row(5, "Otro", "quinta"),
        ]);
        let mut store = IncidentStore::new(IncidentKind::Report, Arc::new(portal));

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, 3);
        let ids: Vec<i64> = store.incidents().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![9, 5, 2]);
        assert!(!store.load_failed());
    }

    #[tokio::test]
    async fn duplicate_ids_collapse_to_one_record() {
        let portal = MockPortal::new().with_incidents(vec![
            report_row(7, "Otro", "primera copia"),
            report_row(7, "Otro", "segunda copia"),
        ]);
        let mut store = IncidentStore::new(IncidentKind::Report, Arc::new(portal));
        store.load_all().await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get(7).is_some());
    }

    #[tokio::test]
    async fn failed_load_clears_and_flags() {
        let portal = MockPortal::new()
            .with_incidents(vec![report_row(1, "Otro", "x")])
            .failing_list();
        let mut store = IncidentStore::new(IncidentKind::Report, Arc::new(portal));
        assert!(store.load_all().await.is_err());
        assert!(store.is_empty());
        assert!(store.load_failed());
    }

    #[tokio::test]
    async fn create_validates_before_any_network_call() {
        let portal = MockPortal::new();
        let handle = portal.clone();
        let mut store = IncidentStore::new(IncidentKind::Report, Arc::new(portal));

        let mut bad = draft();
        bad.description = "   ".into();
        assert!(store.create(&bad).await.is_err());
        assert_eq!(handle.create_calls(), 0);
    }

    #[tokio::test]
    async fn create_appends_the_confirmed_record() {
        let portal = MockPortal::new().with_next_id(31);
        let handle = portal.clone();
        let mut store = IncidentStore::new(IncidentKind::Report, Arc::new(portal));
        store.load_all().await.unwrap();

        let created = store.create(&draft()).await.unwrap();
        assert_eq!(created.id, 31);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(31).unwrap().category.as_deref(), Some("Paso_cerrado"));
        assert_eq!(handle.create_calls(), 1);
    }

    #[tokio::test]
    async fn update_merges_only_after_confirmation() {
        let portal = MockPortal::new().with_incidents(vec![emergency_row(3, 13.7, -89.2, false)]);
        let mut store = IncidentStore::new(IncidentKind::Emergency, Arc::new(portal));
        store.load_all().await.unwrap();

        store
            .update_field(3, &IncidentPatch::status(IncidentStatus::Attended))
            .await
            .unwrap();
        assert_eq!(store.get(3).unwrap().status, IncidentStatus::Attended);
        assert_eq!(store.counts().attended, 1);
        assert_eq!(store.counts().pending, 0);
    }

    #[tokio::test]
    async fn failed_update_leaves_the_record_untouched() {
        let portal = MockPortal::new()
            .with_incidents(vec![emergency_row(3, 13.7, -89.2, false)])
            .failing_updates();
        let mut store = IncidentStore::new(IncidentKind::Emergency, Arc::new(portal));
        store.load_all().await.unwrap();

        let result = store
            .update_field(3, &IncidentPatch::status(IncidentStatus::Attended))
            .await;
        assert!(result.is_err());
        assert_eq!(store.get(3).unwrap().status, IncidentStatus::Pending);
        assert_eq!(store.counts().pending, 1);
    }

    #[tokio::test]
    async fn update_for_an_unknown_id_is_a_local_no_op() {
        let portal = MockPortal::new().with_incidents(vec![emergency_row(3, 13.7, -89.2, false)]);
        let mut store = IncidentStore::new(IncidentKind::Emergency, Arc::new(portal));
        store.load_all().await.unwrap();

        store
            .update_field(99, &IncidentPatch::status(IncidentStatus::Attended))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(3).unwrap().status, IncidentStatus::Pending);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let portal = MockPortal::new().with_incidents(vec![
            emergency_row(1, 13.7, -89.2, false),
            emergency_row(2, 13.8, -89.1, true),
        ]);
        let mut store = IncidentStore::new(IncidentKind::Emergency, Arc::new(portal));
        store.load_all().await.unwrap();

        store.remove(1).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get(1).is_none());
        assert!(store.get(2).is_some());

        store.remove(1).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn counts_track_every_mutation() {
        let portal = MockPortal::new().with_incidents(vec![
            emergency_row(1, 13.7, -89.2, false),
            emergency_row(2, 13.8, -89.1, true),
            emergency_row(3, 13.9, -89.0, false),
        ]);
        let mut store = IncidentStore::new(IncidentKind::Emergency, Arc::new(portal));
        store.load_all().await.unwrap();
        assert_eq!(store.counts(), StatusCounts { attended: 1, pending: 2, other: 0 });

        store.remove(2).await.unwrap();
        assert_eq!(store.counts(), StatusCounts { attended: 0, pending: 2, other: 0 });
    }
}
