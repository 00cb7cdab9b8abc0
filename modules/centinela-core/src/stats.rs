//! Aggregate series handling: label/count buckets for the chart surfaces
//! and weighted points for the density layer.

use serde_json::Value;

use crate::record::{self, UNKNOWN_LABEL};
use crate::types::{GeoPoint, Region};

/// Weight applied to every point when the observed maximum is zero, so an
/// all-zero series still renders at mid intensity instead of dividing by
/// zero.
pub const DEFAULT_HEAT_INTENSITY: f64 = 0.5;

// ---------------------------------------------------------------------------
// Label/count buckets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LabelCount {
    pub label: String,
    pub count: f64,
}

/// One bucket per row. Unresolvable labels become `"unknown"`; a missing
/// metric counts as zero.
pub fn buckets(rows: &[Value]) -> Vec<LabelCount> {
    rows.iter()
        .filter_map(record::normalize)
        .map(|r| LabelCount {
            label: r.label.unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            count: r.metric_value.unwrap_or(0.0),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Heat points
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatPoint {
    pub lat: f64,
    pub lng: f64,
    pub weight: f64,
}

impl HeatPoint {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }

    pub fn in_region(&self, region: &Region) -> bool {
        region.contains(self.point())
    }
}

/// Rows with a resolvable coordinate pair become density points. A row
/// without a metric still glows: its weight defaults to one observation.
pub fn heat_points(rows: &[Value]) -> Vec<HeatPoint> {
    rows.iter()
        .filter_map(record::normalize)
        .filter_map(|r| {
            r.point.map(|p| HeatPoint {
                lat: p.lat,
                lng: p.lng,
                weight: r.metric_value.unwrap_or(1.0),
            })
        })
        .collect()
}

/// Weights scaled into [0, 1] by the maximum observed weight. An all-zero
/// set maps uniformly to [`DEFAULT_HEAT_INTENSITY`].
pub fn normalize_weights(points: &[HeatPoint]) -> Vec<HeatPoint> {
    let max = points.iter().map(|p| p.weight).fold(0.0_f64, f64::max);
    points
        .iter()
        .map(|p| HeatPoint {
            weight: if max > 0.0 {
                p.weight / max
            } else {
                DEFAULT_HEAT_INTENSITY
            },
            ..*p
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tabular breakdown
// ---------------------------------------------------------------------------

/// Accompanies the density layer: out-of-region and coordinate-less rows
/// are flagged and counted, never dropped from the totals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeatSummary {
    pub total_metric: f64,
    pub locations: usize,
    pub inside: usize,
    pub outside: usize,
    pub unmappable: usize,
}

pub fn heat_summary(rows: &[Value], region: &Region) -> HeatSummary {
    let mut summary = HeatSummary {
        locations: rows.len(),
        ..Default::default()
    };
    for row in rows {
        let Some(r) = record::normalize(row) else {
            summary.unmappable += 1;
            continue;
        };
        summary.total_metric += r.metric_value.unwrap_or(0.0);
        match r.point {
            Some(p) if region.contains(p) => summary.inside += 1,
            Some(_) => summary.outside += 1,
            None => summary.unmappable += 1,
        }
    }
    summary
}

// ===========================================================================
// Tests
// ===========================================================================
