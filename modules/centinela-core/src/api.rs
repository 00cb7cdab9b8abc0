//! Trait abstractions for the portal's external collaborators.
//!
//! Everything that crosses the network sits behind one of these narrow
//! traits. Raw responses travel as `serde_json::Value` because no field
//! name on the wire is stable; the `record` module is the compatibility
//! layer. The sync crate's MockPortal implements all of them for tests.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiResult;
use crate::types::{AttachmentRef, CommentDraft, IncidentDraft, IncidentKind, IncidentPatch};

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IncidentApi: Send + Sync {
    /// Fetch the full collection for one incident family.
    async fn list(&self, kind: IncidentKind) -> ApiResult<Vec<Value>>;

    /// Create a record; the response echoes the stored record including the
    /// assigned id, in whatever shape the backend favors.
    async fn create(&self, kind: IncidentKind, draft: &IncidentDraft) -> ApiResult<Value>;

    /// Partial update by id. Only confirmation matters; the local merge is
    /// driven by the patch, not by the response body.
    async fn update(&self, kind: IncidentKind, id: i64, patch: &IncidentPatch) -> ApiResult<()>;

    async fn delete(&self, kind: IncidentKind, id: i64) -> ApiResult<()>;
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// One candidate way of asking the backend for a thread. Deployments differ
/// in which of these actually answer, so readers probe an ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentRoute {
    /// Collection nested under the parent, `/api/reportes/{id}/comentarios`.
    Nested,
    /// Flat collection filtered by a query parameter carrying this key.
    ByParentQuery(&'static str),
    /// The whole flat collection, filtered client-side afterwards.
    Global,
}

/// Probe order for a thread load. Also reused verbatim after a mutation:
/// refreshing through the same fallback chain keeps a deployment that only
/// answers on its last route working end to end.
pub const COMMENT_ROUTES: &[CommentRoute] = &[
    CommentRoute::Nested,
    CommentRoute::ByParentQuery("reporteId"),
    CommentRoute::ByParentQuery("reportId"),
    CommentRoute::ByParentQuery("report_id"),
    CommentRoute::Global,
];

#[async_trait]
pub trait CommentApi: Send + Sync {
    /// Ask one candidate route for comments. Errors are expected and feed
    /// the caller's fallback logic.
    async fn fetch_comments(&self, route: CommentRoute, parent_id: i64) -> ApiResult<Vec<Value>>;

    async fn create_comment(&self, draft: &CommentDraft) -> ApiResult<Value>;

    async fn update_comment(&self, id: i64, body: &str) -> ApiResult<()>;

    async fn delete_comment(&self, id: i64) -> ApiResult<()>;
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Aggregate series the portal exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatSeries {
    ReportsByType,
    ReportsByStatus,
    ReportsByRegion,
    AlertsByLevel,
    AlertsByRegion,
    EmergenciesByAttention,
    Heatmap,
}

impl StatSeries {
    /// Every bucket series, heatmap excluded. Console summaries iterate this.
    pub const BUCKET_SERIES: &'static [StatSeries] = &[
        StatSeries::ReportsByType,
        StatSeries::ReportsByStatus,
        StatSeries::ReportsByRegion,
        StatSeries::AlertsByLevel,
        StatSeries::AlertsByRegion,
        StatSeries::EmergenciesByAttention,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            StatSeries::ReportsByType => "reports by type",
            StatSeries::ReportsByStatus => "reports by status",
            StatSeries::ReportsByRegion => "reports by region",
            StatSeries::AlertsByLevel => "alerts by level",
            StatSeries::AlertsByRegion => "alerts by region",
            StatSeries::EmergenciesByAttention => "emergencies by attention",
            StatSeries::Heatmap => "heatmap",
        }
    }
}

#[async_trait]
pub trait StatsApi: Send + Sync {
    async fn series(&self, series: StatSeries) -> ApiResult<Vec<Value>>;
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

/// A displayable attachment after resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentSrc {
    Url(String),
    Bytes { data: Vec<u8>, mime: String },
}

#[async_trait]
pub trait AttachmentApi: Send + Sync {
    /// Resolve a reference into something displayable. Direct URLs pass
    /// through; numeric ids are fetched from the binary-content endpoint.
    async fn resolve_attachment(&self, attachment: &AttachmentRef) -> ApiResult<AttachmentSrc>;
}
