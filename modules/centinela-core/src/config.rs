//! Environment-driven configuration. Every knob has a deployment default;
//! nothing here panics.

use std::env;

use crate::types::{GeoPoint, Region};
use crate::view::DEFAULT_PAGE_SIZE;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_MAP_ZOOM: u8 = 9;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub page_size: usize,
    pub region: Region,
    pub map_center: GeoPoint,
    pub map_zoom: u8,
}

impl Config {
    pub fn from_env() -> Self {
        let region = Region {
            min_lat: float_env("REGION_MIN_LAT", Region::EL_SALVADOR.min_lat),
            max_lat: float_env("REGION_MAX_LAT", Region::EL_SALVADOR.max_lat),
            min_lng: float_env("REGION_MIN_LNG", Region::EL_SALVADOR.min_lng),
            max_lng: float_env("REGION_MAX_LNG", Region::EL_SALVADOR.max_lng),
        };
        Config {
            api_url: env::var("API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            auth_token: env::var("AUTH_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            page_size: env::var("PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            region,
            map_center: GeoPoint::new(
                float_env("MAP_CENTER_LAT", 13.7),
                float_env("MAP_CENTER_LNG", -89.2),
            ),
            map_zoom: env::var("MAP_ZOOM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAP_ZOOM),
        }
    }

    /// Log the effective configuration without leaking the token.
    pub fn log_redacted(&self) {
        tracing::info!(
            api_url = %self.api_url,
            auth_token = if self.auth_token.is_some() { "set" } else { "unset" },
            page_size = self.page_size,
            map_center = %self.map_center,
            map_zoom = self.map_zoom,
            "Configuration loaded"
        );
    }
}

fn float_env(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
