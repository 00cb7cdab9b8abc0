//! Core domain types shared across the workspace.
//!
//! Everything here is plain data: wire payloads arrive as `serde_json::Value`
//! and are converted into these types by the `record` module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CentinelaError, Result};

/// Substituted wherever an author has no usable display name.
pub const ANONYMOUS: &str = "anonymous";

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}, {:.3}", self.lat, self.lng)
    }
}

/// Bounding box that decides whether a record is mappable. Records outside
/// stay in every list and total; they are only excluded from marker layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Region {
    /// Deployment default: El Salvador.
    pub const EL_SALVADOR: Region = Region {
        min_lat: 12.5,
        max_lat: 15.0,
        min_lng: -91.0,
        max_lng: -87.0,
    };

    pub fn contains(&self, point: GeoPoint) -> bool {
        point.is_finite()
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// The two record families served by the portal. Emergencies are urgent
/// distress messages; reports are non-urgent observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    Emergency,
    Report,
}

impl IncidentKind {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "emergency" | "emergencia" | "emergencias" => Some(IncidentKind::Emergency),
            "report" | "reporte" | "reportes" => Some(IncidentKind::Report),
            _ => None,
        }
    }
}

impl fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncidentKind::Emergency => write!(f, "emergency"),
            IncidentKind::Report => write!(f, "report"),
        }
    }
}

/// Emergency triage is a boolean on the wire; reports carry a free-form
/// workflow label. Only the boolean pair is toggleable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Pending,
    Attended,
    Workflow(String),
}

impl IncidentStatus {
    pub fn from_bool(attended: bool) -> Self {
        if attended {
            IncidentStatus::Attended
        } else {
            IncidentStatus::Pending
        }
    }

    pub fn label(&self) -> &str {
        match self {
            IncidentStatus::Pending => "pending",
            IncidentStatus::Attended => "attended",
            IncidentStatus::Workflow(s) => s.as_str(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            IncidentStatus::Pending => Some(false),
            IncidentStatus::Attended => Some(true),
            IncidentStatus::Workflow(_) => None,
        }
    }

    /// The flipped status, or `None` when the status is a workflow label
    /// that has no boolean counterpart.
    pub fn toggled(&self) -> Option<IncidentStatus> {
        match self {
            IncidentStatus::Pending => Some(IncidentStatus::Attended),
            IncidentStatus::Attended => Some(IncidentStatus::Pending),
            IncidentStatus::Workflow(_) => None,
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl UserRef {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(ANONYMOUS)
    }
}

/// Photo reference as it appears on a record: either a directly usable URL
/// or a numeric id served by the binary-content endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentRef {
    Url(String),
    PhotoId(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    pub kind: IncidentKind,
    pub description: String,
    pub category: Option<String>,
    pub status: IncidentStatus,
    pub location: Option<GeoPoint>,
    pub author: UserRef,
    pub created_at: Option<DateTime<Utc>>,
    pub attachment: Option<AttachmentRef>,
}

impl Incident {
    /// Mappable means finite coordinates inside the valid region. A record
    /// failing this stays in lists and totals.
    pub fn mappable_in(&self, region: &Region) -> bool {
        self.location.map(|p| region.contains(p)).unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub parent_id: i64,
    pub author: UserRef,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Drafts and patches
// ---------------------------------------------------------------------------

/// Fields a user supplies when submitting an incident. The server assigns
/// the id; new records start pending.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentDraft {
    pub description: String,
    pub category: Option<String>,
    pub location: GeoPoint,
    pub author_id: i64,
    pub attachment_url: Option<String>,
}

impl IncidentDraft {
    /// Checked before any network call is made.
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(CentinelaError::Validation(
                "description must not be empty".into(),
            ));
        }
        if !self.location.is_finite() {
            return Err(CentinelaError::Validation(format!(
                "coordinates must be finite, got {}, {}",
                self.location.lat, self.location.lng
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentDraft {
    pub parent_id: i64,
    pub author_id: i64,
    pub body: String,
}

/// Partial update applied through the mutation path. `None` fields are left
/// untouched; set fields replace the local value wholesale once the server
/// confirms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentPatch {
    pub status: Option<IncidentStatus>,
    pub description: Option<String>,
    pub category: Option<String>,
}

impl IncidentPatch {
    pub fn status(status: IncidentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.description.is_none() && self.category.is_none()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
