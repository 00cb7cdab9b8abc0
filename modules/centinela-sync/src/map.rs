//! Marker and heat-layer synchronization against a pluggable map backend.
//!
//! The rendering library lives behind [`MapBackend`] so the policy here
//! (what gets drawn, how the viewport follows the data, what a disposed
//! map may still do) is testable without one. A `MapView` owns exactly one
//! backend instance and walks it through Uninitialized -> Ready ->
//! Disposed; calls that arrive in the wrong phase are logged and dropped.

use std::collections::HashMap;

use tracing::{debug, warn};

use centinela_core::stats::{normalize_weights, HeatPoint};
use centinela_core::types::{GeoPoint, Incident, Region};

/// Zoom applied when the visible subset collapses to a single marker.
pub const SINGLE_MARKER_ZOOM: u8 = 13;
/// Zoom applied when focusing one record out of many.
pub const FOCUS_ZOOM: u8 = 16;
/// Pixel padding for viewport fits.
pub const FIT_PADDING: u32 = 50;
/// Cap on how far a heat fit may zoom in; density blobs degenerate past it.
pub const HEAT_FIT_MAX_ZOOM: u8 = 11;

/// Handle for a drawn marker, issued by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(pub u64);

/// Gradient stops for the density layer, low to high intensity.
pub const HEAT_GRADIENT: &[(f64, &str)] = &[
    (0.0, "blue"),
    (0.2, "cyan"),
    (0.4, "lime"),
    (0.6, "yellow"),
    (0.8, "orange"),
    (1.0, "red"),
];

/// Visual parameters for the density layer.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatStyle {
    pub radius: u32,
    pub blur: u32,
    pub max_zoom: u8,
    pub max: f64,
    pub min_opacity: f64,
    pub gradient: &'static [(f64, &'static str)],
}

impl Default for HeatStyle {
    fn default() -> Self {
        Self {
            radius: 40,
            blur: 25,
            max_zoom: 17,
            max: 1.0,
            min_opacity: 0.4,
            gradient: HEAT_GRADIENT,
        }
    }
}

// ---------------------------------------------------------------------------
// Backend interface
// ---------------------------------------------------------------------------

/// The narrow slice of a mapping library the synchronizer needs.
///
/// Implementations are stateful and side-effecting; `MapView` guarantees
/// `mount` is called exactly once before any other method and nothing is
/// called after `unmount`.
pub trait MapBackend: Send {
    /// Bind the map to a view anchor at an initial center and zoom.
    fn mount(&mut self, anchor: &str, center: GeoPoint, zoom: u8);

    /// Draw one marker with its popup text, returning a handle to it.
    fn place_marker(&mut self, point: GeoPoint, popup: &str) -> MarkerId;

    /// Remove every marker previously placed.
    fn clear_markers(&mut self);

    /// Recenter the viewport.
    fn set_view(&mut self, center: GeoPoint, zoom: u8);

    /// Fit the viewport to a bounding box, optionally capping the zoom.
    fn fit_bounds(&mut self, south_west: GeoPoint, north_east: GeoPoint, padding: u32, max_zoom: Option<u8>);

    /// Open the popup bound to a marker.
    fn open_popup(&mut self, marker: MarkerId);

    /// Replace the density layer with the given weighted points.
    fn set_heat(&mut self, points: &[HeatPoint], style: &HeatStyle);

    /// Release the map instance and everything drawn on it.
    fn unmount(&mut self);
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapPhase {
    Uninitialized,
    Ready,
    Disposed,
}

pub struct MapView {
    backend: Box<dyn MapBackend>,
    phase: MapPhase,
    region: Region,
    home: GeoPoint,
    home_zoom: u8,
    markers: HashMap<i64, (MarkerId, GeoPoint)>,
}

impl MapView {
    pub fn new(backend: Box<dyn MapBackend>, region: Region, home: GeoPoint, home_zoom: u8) -> Self {
        Self {
            backend,
            phase: MapPhase::Uninitialized,
            region,
            home,
            home_zoom,
            markers: HashMap::new(),
        }
    }

    pub fn phase(&self) -> MapPhase {
        self.phase
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Mount the backend once. Later calls are dropped so a remounting
    /// view cannot end up with two live map instances.
    pub fn init(&mut self, anchor: &str) {
        if self.phase != MapPhase::Uninitialized {
            warn!(?self.phase, "Ignoring init on an already-started map");
            return;
        }
        self.backend.mount(anchor, self.home, self.home_zoom);
        self.phase = MapPhase::Ready;
        debug!(anchor, "Map mounted");
    }

    /// Redraw one marker per mappable record and move the viewport to
    /// match: one marker recenters on it, several fit the bounding box,
    /// none returns home. Unmappable records simply do not get a marker.
    pub fn sync_markers(&mut self, visible: &[&Incident]) {
        if self.phase != MapPhase::Ready {
            debug!(?self.phase, "Dropping marker sync outside the ready phase");
            return;
        }
        self.backend.clear_markers();
        self.markers.clear();

        let mut points = Vec::new();
        for incident in visible {
            if !incident.mappable_in(&self.region) {
                continue;
            }
            let point = match incident.location {
                Some(p) => p,
                None => continue,
            };
            let marker = self.backend.place_marker(point, &popup_text(incident));
            self.markers.insert(incident.id, (marker, point));
            points.push(point);
        }

        match points.as_slice() {
            [] => self.backend.set_view(self.home, self.home_zoom),
            [only] => self.backend.set_view(*only, SINGLE_MARKER_ZOOM),
            many => {
                let (south_west, north_east) = bounding_box(many);
                self.backend.fit_bounds(south_west, north_east, FIT_PADDING, None);
            }
        }
        debug!(markers = self.markers.len(), "Markers redrawn");
    }

    /// Center on the marker drawn for `id` and open its popup. Ids with no
    /// current marker (filtered out, unmappable, or never loaded) are
    /// ignored without touching the viewport.
    pub fn focus_on(&mut self, id: i64) {
        if self.phase != MapPhase::Ready {
            debug!(?self.phase, id, "Dropping focus outside the ready phase");
            return;
        }
        match self.markers.get(&id) {
            Some(&(marker, point)) => {
                self.backend.set_view(point, FOCUS_ZOOM);
                self.backend.open_popup(marker);
            }
            None => debug!(id, "No marker to focus"),
        }
    }

    /// Swap the marker layer for a density layer over the given points.
    /// Every point renders, including those outside the configured region;
    /// callers wanting an inside/outside breakdown compute it from the raw
    /// rows, not from what the map drew.
    pub fn show_heat(&mut self, points: &[HeatPoint]) {
        if self.phase != MapPhase::Ready {
            debug!(?self.phase, "Dropping heat render outside the ready phase");
            return;
        }
        self.backend.clear_markers();
        self.markers.clear();

        let normalized = normalize_weights(points);
        self.backend.set_heat(&normalized, &HeatStyle::default());
        if !points.is_empty() {
            let raw: Vec<GeoPoint> = points.iter().map(|p| p.point()).collect();
            let (south_west, north_east) = bounding_box(&raw);
            self.backend
                .fit_bounds(south_west, north_east, FIT_PADDING, Some(HEAT_FIT_MAX_ZOOM));
        }
        debug!(points = points.len(), "Heat layer rendered");
    }

    /// Release the backend. The view keeps accepting calls afterwards but
    /// they all become no-ops, which is what makes late async completions
    /// harmless.
    pub fn dispose(&mut self) {
        if self.phase != MapPhase::Ready {
            debug!(?self.phase, "Ignoring dispose outside the ready phase");
            return;
        }
        self.backend.unmount();
        self.markers.clear();
        self.phase = MapPhase::Disposed;
        debug!("Map disposed");
    }
}

/// Popup body for a marker: id, classifier, status, description, author.
pub fn popup_text(incident: &Incident) -> String {
    let mut text = match &incident.category {
        Some(category) => format!("#{} {} [{}]", incident.id, category, incident.status.label()),
        None => format!("#{} [{}]", incident.id, incident.status.label()),
    };
    if !incident.description.is_empty() {
        text.push('\n');
        text.push_str(&incident.description);
    }
    text.push_str("\nby ");
    text.push_str(incident.author.display_name());
    text
}

fn bounding_box(points: &[GeoPoint]) -> (GeoPoint, GeoPoint) {
    let mut south = f64::INFINITY;
    let mut west = f64::INFINITY;
    let mut north = f64::NEG_INFINITY;
    let mut east = f64::NEG_INFINITY;
    for p in points {
        south = south.min(p.lat);
        west = west.min(p.lng);
        north = north.max(p.lat);
        east = east.max(p.lng);
    }
    (GeoPoint::new(south, west), GeoPoint::new(north, east))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{incident, FakeMap};
    use centinela_core::types::IncidentStatus;

    fn ready_map(fake: &FakeMap) -> MapView {
        let mut view = MapView::new(
            Box::new(fake.clone()),
            Region::EL_SALVADOR,
            GeoPoint::new(13.7, -89.2),
            9,
        );
        view.init("incident-map");
        view
    }

    #[test]
    fn init_mounts_exactly_once() {
        let fake = FakeMap::new();
        let mut view = ready_map(&fake);
        view.init("incident-map");
        assert_eq!(fake.mount_count(), 1);
        assert_eq!(view.phase(), MapPhase::Ready);
    }

    #[test]
    fn unmappable_records_get_no_marker() {
        let fake = FakeMap::new();
        let mut view = ready_map(&fake);

        let inside = incident(1, Some(GeoPoint::new(13.7, -89.2)));
        let outside = incident(2, Some(GeoPoint::new(40.0, -3.7)));
        let nowhere = incident(3, None);
        view.sync_markers(&[&inside, &outside, &nowhere]);

        assert_eq!(view.marker_count(), 1);
        assert_eq!(fake.markers_placed(), 1);
    }

    #[test]
    fn single_marker_recenters_at_fixed_zoom() {
        let fake = FakeMap::new();
        let mut view = ready_map(&fake);

        let only = incident(1, Some(GeoPoint::new(13.71, -89.21)));
        view.sync_markers(&[&only]);

        assert_eq!(fake.last_view(), Some((GeoPoint::new(13.71, -89.21), SINGLE_MARKER_ZOOM)));
        assert!(fake.popup_texts()[0].starts_with("#1"));
    }

    #[test]
    fn several_markers_fit_the_bounding_box() {
        let fake = FakeMap::new();
        let mut view = ready_map(&fake);

        let a = incident(1, Some(GeoPoint::new(13.6, -89.3)));
        let b = incident(2, Some(GeoPoint::new(13.9, -88.9)));
        view.sync_markers(&[&a, &b]);

        let fit = fake.last_fit().unwrap();
        assert_eq!(fit.south_west, GeoPoint::new(13.6, -89.3));
        assert_eq!(fit.north_east, GeoPoint::new(13.9, -88.9));
        assert_eq!(fit.padding, FIT_PADDING);
        assert_eq!(fit.max_zoom, None);
    }

    #[test]
    fn empty_subset_returns_home() {
        let fake = FakeMap::new();
        let mut view = ready_map(&fake);
        view.sync_markers(&[]);
        assert_eq!(fake.last_view(), Some((GeoPoint::new(13.7, -89.2), 9)));
    }

    #[test]
    fn focus_centers_and_opens_the_popup() {
        let fake = FakeMap::new();
        let mut view = ready_map(&fake);

        let target = incident(7, Some(GeoPoint::new(13.8, -89.1)));
        let other = incident(8, Some(GeoPoint::new(13.6, -89.3)));
        view.sync_markers(&[&target, &other]);
        view.focus_on(7);

        assert_eq!(fake.last_view(), Some((GeoPoint::new(13.8, -89.1), FOCUS_ZOOM)));
        assert_eq!(fake.popups_opened(), 1);
    }

    #[test]
    fn focus_on_an_absent_id_changes_nothing() {
        let fake = FakeMap::new();
        let mut view = ready_map(&fake);

        let only = incident(1, Some(GeoPoint::new(13.7, -89.2)));
        view.sync_markers(&[&only]);
        let before = fake.last_view();

        view.focus_on(999);
        assert_eq!(fake.last_view(), before);
        assert_eq!(fake.popups_opened(), 0);
    }

    #[test]
    fn disposed_map_drops_every_call() {
        let fake = FakeMap::new();
        let mut view = ready_map(&fake);
        view.dispose();
        assert_eq!(view.phase(), MapPhase::Disposed);
        assert_eq!(fake.unmount_count(), 1);

        let late = incident(1, Some(GeoPoint::new(13.7, -89.2)));
        view.sync_markers(&[&late]);
        view.focus_on(1);
        view.show_heat(&[HeatPoint { lat: 13.7, lng: -89.2, weight: 1.0 }]);

        assert_eq!(view.marker_count(), 0);
        assert_eq!(fake.markers_placed(), 0);
    }

    #[test]
    fn heat_renders_out_of_region_points_too() {
        let fake = FakeMap::new();
        let mut view = ready_map(&fake);

        view.show_heat(&[
            HeatPoint { lat: 13.7, lng: -89.2, weight: 2.0 },
            HeatPoint { lat: 40.0, lng: -3.7, weight: 4.0 },
        ]);

        let heat = fake.heat_points();
        assert_eq!(heat.len(), 2);
        assert!((heat[0].weight - 0.5).abs() < 1e-9);
        assert!((heat[1].weight - 1.0).abs() < 1e-9);
        let fit = fake.last_fit().unwrap();
        assert_eq!(fit.max_zoom, Some(HEAT_FIT_MAX_ZOOM));
    }

    #[test]
    fn popup_lists_id_category_status_description_author() {
        let mut subject = incident(42, Some(GeoPoint::new(13.7, -89.2)));
        subject.category = Some("Calle_inundada".into());
        subject.status = IncidentStatus::Pending;
        subject.description = "Agua cubre el paso".into();

        let text = popup_text(&subject);
        assert!(text.starts_with("#42 Calle_inundada [pending]"));
        assert!(text.contains("Agua cubre el paso"));
        assert!(text.ends_with("by anonymous"));
    }
}
