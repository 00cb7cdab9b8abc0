//! Record normalization for payloads of unknown shape.
//!
//! The portal's producers disagree on field names: an id may arrive as
//! `reporteId`, `reporte_id`, `emergenciaId` or plain `id`; coordinates as
//! `latitud`/`lat`/`latitude`/`y`. Every accessor here walks an ordered
//! candidate-key table, first parseable match wins. All functions are pure
//! and total: bad input yields `None`, never a panic.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::types::{Comment, GeoPoint, Incident, IncidentKind, IncidentStatus, UserRef};

// ---------------------------------------------------------------------------
// Candidate-key tables
// ---------------------------------------------------------------------------

pub const ID_KEYS: &[&str] = &[
    "reporteId",
    "reporte_id",
    "id",
    "emergenciaId",
    "emergencia_id",
    "alertaId",
    "idAlerta",
    "entityId",
    "entity_id",
];

pub const COMMENT_ID_KEYS: &[&str] = &["comentarioId", "comentario_id", "id"];

pub const LAT_KEYS: &[&str] = &["latitud", "lat", "latitude", "y"];
pub const LNG_KEYS: &[&str] = &["longitud", "lng", "longitude", "x"];

pub const METRIC_KEYS: &[&str] = &[
    "count",
    "cantidad",
    "value",
    "total",
    "cantidadTotal",
    "cantidad_registros",
];

pub const LABEL_KEYS: &[&str] = &[
    "tipo",
    "estado",
    "region",
    "regionName",
    "label",
    "name",
    "nombre",
    "nivel",
    "atendido",
];

pub const NESTED_NAME_KEYS: &[&str] = &["nombre", "name", "regionName", "label"];

/// Valid inside a `usuario` sub-object or a stored profile, where `id` is
/// the user's own id.
pub const USER_ID_KEYS: &[&str] = &[
    "id",
    "usuarioId",
    "usuario_id",
    "userId",
    "user_id",
    "_id",
    "id_usuario",
];

/// Valid at the top level of a record, where plain `id` would be the
/// record's own id rather than the author's.
pub const FLAT_USER_ID_KEYS: &[&str] =
    &["usuarioId", "usuario_id", "userId", "user_id", "id_usuario"];

pub const DESCRIPTION_KEYS: &[&str] = &["descripcion", "mensaje", "description", "texto"];
pub const CATEGORY_KEYS: &[&str] = &["tipo", "categoria", "category"];
pub const BODY_KEYS: &[&str] = &["texto", "contenido", "mensaje"];
pub const DATE_KEYS: &[&str] = &["fecha", "fechaCreacion", "createdAt"];

pub const COMMENT_PARENT_KEYS: &[&str] = &["reporteId", "reporte_id", "reportId", "report_id"];
pub const COMMENT_PARENT_NESTED_KEYS: &[&str] = &["reporteId", "id", "reporte_id", "reportId"];
pub const COMMENT_RELATION_KEY: &str = "reporte";

/// Label substituted when a stats bucket resolves to nothing usable.
pub const UNKNOWN_LABEL: &str = "unknown";

// ---------------------------------------------------------------------------
// Scalar accessors
// ---------------------------------------------------------------------------

fn number_of(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn int_of(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        }
        _ => None,
    }
}

/// First candidate key holding a finite number (numeric strings accepted).
pub fn float_at(raw: &Value, keys: &[&str]) -> Option<f64> {
    let obj = raw.as_object()?;
    keys.iter().find_map(|k| obj.get(*k).and_then(number_of))
}

/// First candidate key holding an integer id.
pub fn int_at(raw: &Value, keys: &[&str]) -> Option<i64> {
    let obj = raw.as_object()?;
    keys.iter().find_map(|k| obj.get(*k).and_then(int_of))
}

/// First candidate key holding a non-empty string (trimmed).
pub fn string_at(raw: &Value, keys: &[&str]) -> Option<String> {
    let obj = raw.as_object()?;
    keys.iter().find_map(|k| {
        obj.get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

/// Coordinate pair, if both halves resolve to finite numbers.
pub fn point_of(raw: &Value) -> Option<GeoPoint> {
    let lat = float_at(raw, LAT_KEYS)?;
    let lng = float_at(raw, LNG_KEYS)?;
    Some(GeoPoint::new(lat, lng))
}

pub fn date_at(raw: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    string_at(raw, keys).as_deref().and_then(parse_date)
}

/// Accepts RFC 3339, a bare `YYYY-MM-DDTHH:MM:SS[.fff]`, or a bare date.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// The fixed boolean-status mapping. Total by construction.
pub fn attended_label(attended: bool) -> &'static str {
    if attended {
        "attended"
    } else {
        "pending"
    }
}

// ---------------------------------------------------------------------------
// Canonical tuple
// ---------------------------------------------------------------------------

/// Best-effort canonical view of a record, stats bucket, or heat point.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub id: Option<i64>,
    pub point: Option<GeoPoint>,
    pub metric_value: Option<f64>,
    pub label: Option<String>,
}

/// `None` only for non-object input. An object always yields a record,
/// possibly with every field unresolved (non-mappable, unlabeled).
pub fn normalize(raw: &Value) -> Option<NormalizedRecord> {
    raw.as_object()?;
    Some(NormalizedRecord {
        id: int_at(raw, ID_KEYS),
        point: point_of(raw),
        metric_value: float_at(raw, METRIC_KEYS),
        label: label_of(raw),
    })
}

fn label_of(raw: &Value) -> Option<String> {
    let obj = raw.as_object()?;
    for key in LABEL_KEYS {
        match obj.get(*key) {
            Some(Value::Bool(b)) => return Some(attended_label(*b).to_string()),
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    if let Some(region) = obj.get("region").filter(|v| v.is_object()) {
        if let Some(name) = string_at(region, NESTED_NAME_KEYS) {
            return Some(name);
        }
    }
    if let Some(point) = point_of(raw) {
        return Some(point.to_string());
    }
    obj.values().find_map(|v| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// Rows without a resolvable id are dropped; everything else is best-effort.
pub fn normalize_incident(raw: &Value, kind: IncidentKind) -> Option<Incident> {
    raw.as_object()?;
    let id = int_at(raw, ID_KEYS)?;
    Some(Incident {
        id,
        kind,
        description: string_at(raw, DESCRIPTION_KEYS).unwrap_or_default(),
        category: string_at(raw, CATEGORY_KEYS),
        status: status_of(raw),
        location: point_of(raw),
        author: user_of(raw),
        created_at: date_at(raw, DATE_KEYS),
        attachment: attachment_of(raw),
    })
}

fn status_of(raw: &Value) -> IncidentStatus {
    if let Some(b) = raw.get("atendido").and_then(Value::as_bool) {
        return IncidentStatus::from_bool(b);
    }
    if let Some(s) = string_at(raw, &["estado"]) {
        return match s.to_lowercase().as_str() {
            "atendido" | "attended" => IncidentStatus::Attended,
            "no atendido" | "pendiente" | "pending" => IncidentStatus::Pending,
            _ => IncidentStatus::Workflow(s),
        };
    }
    IncidentStatus::Pending
}

fn user_of(raw: &Value) -> UserRef {
    if let Some(user) = raw.get("usuario").filter(|v| v.is_object()) {
        return UserRef {
            id: int_at(user, USER_ID_KEYS),
            name: string_at(user, &["nombre", "name"]),
        };
    }
    UserRef {
        id: int_at(raw, FLAT_USER_ID_KEYS),
        name: string_at(raw, &["nombre"]),
    }
}

fn attachment_of(raw: &Value) -> Option<crate::types::AttachmentRef> {
    if let Some(url) = string_at(raw, &["fotoUrl", "foto_url"]) {
        return Some(crate::types::AttachmentRef::Url(url));
    }
    int_at(raw, &["fotoId", "foto_id"]).map(crate::types::AttachmentRef::PhotoId)
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// Stringified parent incident id, probing the nested relation object, the
/// flat candidate keys, then a bare scalar relation, in that order.
pub fn comment_parent_id(raw: &Value) -> Option<String> {
    let obj = raw.as_object()?;
    if let Some(rel) = obj.get(COMMENT_RELATION_KEY).filter(|v| v.is_object()) {
        for key in COMMENT_PARENT_NESTED_KEYS {
            if let Some(id) = rel.get(*key).and_then(int_of) {
                return Some(id.to_string());
            }
        }
    }
    for key in COMMENT_PARENT_KEYS {
        if let Some(id) = obj.get(*key).and_then(int_of) {
            return Some(id.to_string());
        }
    }
    obj.get(COMMENT_RELATION_KEY)
        .and_then(int_of)
        .map(|id| id.to_string())
}

/// Comments lacking an id, a resolvable parent, or a body are dropped from
/// the visible thread rather than treated as errors.
pub fn normalize_comment(raw: &Value) -> Option<Comment> {
    raw.as_object()?;
    let id = int_at(raw, COMMENT_ID_KEYS)?;
    let parent_id = comment_parent_id(raw)?.parse::<i64>().ok()?;
    let body = string_at(raw, BODY_KEYS)?;
    Some(Comment {
        id,
        parent_id,
        author: user_of(raw),
        body,
        created_at: date_at(raw, DATE_KEYS),
    })
}

// ===========================================================================
// Tests
// ===========================================================================
