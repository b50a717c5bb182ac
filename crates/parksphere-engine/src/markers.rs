//! Site markers on the globe, drawn as one instanced node.
//!
//! Markers are plain data. The scene holds a single instanced node for all
//! of them, and this set produces its instance buffer whenever hover,
//! selection or the pulse animation changes what it would contain.

use std::hash::{Hash, Hasher};

use glam::Vec3;
use parksphere_assets::Site;
use parksphere_render::{BoundingSphere, MarkerInstance};
use rustc_hash::{FxHashMap, FxHasher};
use tracing::{debug, warn};

/// Radius of the globe mesh in world units.
pub const GLOBE_RADIUS: f32 = 1.0;
/// Height of markers above the globe surface.
const MARKER_ALTITUDE: f32 = 0.01;
const MARKER_SCALE: f32 = 0.012;
const HOVER_SCALE: f32 = 1.6;
/// Radius of the invisible sphere a pick ray must hit.
const PICK_RADIUS: f32 = 0.03;
/// Pulse frequency in radians per second, and amplitude.
const PULSE_SPEED: f32 = 4.0;
const PULSE_AMPLITUDE: f32 = 0.35;
/// One pulse cycle in seconds; `pulse_time` stays below it.
const PULSE_PERIOD: f32 = std::f32::consts::TAU / PULSE_SPEED;

const SELECTED_COLOR: [f32; 4] = [1.0, 0.84, 0.2, 1.0];
const HOVER_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const PALETTE: [[f32; 4]; 6] = [
    [0.30, 0.75, 0.40, 1.0],
    [0.25, 0.55, 0.90, 1.0],
    [0.90, 0.55, 0.25, 1.0],
    [0.75, 0.35, 0.75, 1.0],
    [0.85, 0.30, 0.30, 1.0],
    [0.35, 0.80, 0.80, 1.0],
];

/// Point on a sphere of `radius` for a latitude/longitude in degrees.
///
/// Longitude 0 on the equator faces +X, longitude -90 faces +Z; the north
/// pole is +Y.
pub fn lat_lon_to_position(lat: f64, lon: f64, radius: f32) -> Vec3 {
    let phi = (90.0 - lat).to_radians();
    let theta = (lon + 180.0).to_radians();
    Vec3::new(
        (-(radius as f64) * phi.sin() * theta.cos()) as f32,
        (radius as f64 * phi.cos()) as f32,
        (radius as f64 * phi.sin() * theta.sin()) as f32,
    )
}

fn category_color(category: &str) -> [f32; 4] {
    let mut hasher = FxHasher::default();
    category.to_ascii_lowercase().hash(&mut hasher);
    PALETTE[(hasher.finish() % PALETTE.len() as u64) as usize]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub site_id: String,
    pub category: String,
    pub position: Vec3,
    pub hovered: bool,
    pub selected: bool,
}

#[derive(Debug, Default)]
pub struct MarkerSet {
    markers: Vec<Marker>,
    index: FxHashMap<String, usize>,
    hovered: Option<usize>,
    selected: Option<usize>,
    pulse_time: f32,
    dirty: bool,
}

impl MarkerSet {
    /// Build markers for every site with usable coordinates.
    pub fn from_sites(sites: &[Site]) -> Self {
        let mut set = Self::default();
        let mut skipped = 0;
        for site in sites {
            if !site.coordinates.is_valid() || set.index.contains_key(&site.id) {
                skipped += 1;
                continue;
            }
            set.index.insert(site.id.clone(), set.markers.len());
            set.markers.push(Marker {
                site_id: site.id.clone(),
                category: site.category.clone(),
                position: lat_lon_to_position(
                    site.coordinates.lat,
                    site.coordinates.lon,
                    GLOBE_RADIUS + MARKER_ALTITUDE,
                ),
                hovered: false,
                selected: false,
            });
        }
        if skipped > 0 {
            warn!(skipped, "Sites without usable coordinates or with duplicate ids");
        }
        debug!(markers = set.markers.len(), "Marker set built");
        set.dirty = true;
        set
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn get(&self, site_id: &str) -> Option<&Marker> {
        self.index.get(site_id).map(|&i| &self.markers[i])
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.map(|i| self.markers[i].site_id.as_str())
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.map(|i| self.markers[i].site_id.as_str())
    }

    /// Returns true if the hovered marker changed. Unknown ids clear the hover.
    pub fn set_hovered(&mut self, site_id: Option<&str>) -> bool {
        let next = site_id.and_then(|id| self.index.get(id).copied());
        if next == self.hovered {
            return false;
        }
        if let Some(i) = self.hovered {
            self.markers[i].hovered = false;
        }
        if let Some(i) = next {
            self.markers[i].hovered = true;
        }
        self.hovered = next;
        self.dirty = true;
        true
    }

    /// Returns false, changing nothing, for an unknown id.
    pub fn set_selected(&mut self, site_id: Option<&str>) -> bool {
        let next = match site_id {
            Some(id) => match self.index.get(id) {
                Some(&i) => Some(i),
                None => return false,
            },
            None => None,
        };
        if let Some(i) = self.selected {
            self.markers[i].selected = false;
        }
        if let Some(i) = next {
            self.markers[i].selected = true;
        }
        self.selected = next;
        self.dirty = true;
        true
    }

    /// Advance the pulse. Returns the pulse factor for this frame.
    pub fn advance(&mut self, dt_s: f32) -> f32 {
        self.pulse_time = (self.pulse_time + dt_s.max(0.0)).rem_euclid(PULSE_PERIOD);
        if self.selected.is_some() {
            self.dirty = true;
        }
        self.pulse()
    }

    pub fn pulse(&self) -> f32 {
        1.0 + PULSE_AMPLITUDE * (self.pulse_time * PULSE_SPEED).sin()
    }

    /// True once after any change that alters the instance buffer.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn instances(&self) -> Vec<MarkerInstance> {
        let pulse = self.pulse();
        self.markers
            .iter()
            .map(|m| {
                let (scale, color) = if m.selected {
                    (MARKER_SCALE * HOVER_SCALE * pulse, SELECTED_COLOR)
                } else if m.hovered {
                    (MARKER_SCALE * HOVER_SCALE, HOVER_COLOR)
                } else {
                    (MARKER_SCALE, category_color(&m.category))
                };
                MarkerInstance {
                    position: m.position.to_array(),
                    scale,
                    color,
                }
            })
            .collect()
    }

    /// Nearest marker hit by the ray that is not behind the globe.
    pub fn pick(&self, origin: Vec3, dir: Vec3) -> Option<&str> {
        let globe_hit = BoundingSphere::new(Vec3::ZERO, GLOBE_RADIUS)
            .ray_hit(origin, dir)
            .unwrap_or(f32::INFINITY);
        self.markers
            .iter()
            .filter_map(|m| {
                let t = BoundingSphere::new(m.position, PICK_RADIUS).ray_hit(origin, dir)?;
                (t <= globe_hit + PICK_RADIUS).then_some((t, m))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, m)| m.site_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parksphere_assets::Coordinates;

    fn site(id: &str, lat: f64, lon: f64) -> Site {
        Site {
            id: id.into(),
            name: format!("Site {id}"),
            code: String::new(),
            country: "US".into(),
            coordinates: Coordinates { lat, lon },
            category: "mountain".into(),
            established: None,
            area_acres: None,
            summary: String::new(),
            gallery: Vec::new(),
            satellite: None,
            activities: Vec::new(),
            climate: None,
        }
    }

    #[test]
    fn test_lat_lon_poles_and_equator() {
        let north = lat_lon_to_position(90.0, 0.0, 1.0);
        assert!((north - Vec3::Y).length() < 1e-5);
        let origin = lat_lon_to_position(0.0, 0.0, 1.0);
        assert!((origin - Vec3::X).length() < 1e-5);
        let east = lat_lon_to_position(0.0, 90.0, 2.0);
        assert!((east.length() - 2.0).abs() < 1e-5);
        assert!(east.y.abs() < 1e-5);
    }

    #[test]
    fn test_invalid_coordinates_skipped() {
        let set = MarkerSet::from_sites(&[site("a", 10.0, 20.0), site("b", 120.0, 0.0)]);
        assert_eq!(set.len(), 1);
        assert!(set.get("b").is_none());
    }

    #[test]
    fn test_one_instance_per_marker() {
        let set = MarkerSet::from_sites(&[site("a", 0.0, 0.0), site("b", 45.0, 45.0)]);
        assert_eq!(set.instances().len(), 2);
    }

    #[test]
    fn test_unknown_selection_is_noop() {
        let mut set = MarkerSet::from_sites(&[site("a", 0.0, 0.0)]);
        assert!(set.set_selected(Some("a")));
        assert!(!set.set_selected(Some("missing")));
        assert_eq!(set.selected(), Some("a"));
        assert!(set.set_selected(None));
        assert_eq!(set.selected(), None);
    }

    #[test]
    fn test_hover_change_marks_dirty_once() {
        let mut set = MarkerSet::from_sites(&[site("a", 0.0, 0.0)]);
        set.take_dirty();
        assert!(set.set_hovered(Some("a")));
        assert!(!set.set_hovered(Some("a")));
        assert!(set.take_dirty());
        assert!(!set.take_dirty());
        assert_eq!(set.instances()[0].color, HOVER_COLOR);
    }

    #[test]
    fn test_selected_marker_pulses() {
        let mut set = MarkerSet::from_sites(&[site("a", 0.0, 0.0)]);
        set.set_selected(Some("a"));
        set.advance(0.1);
        let first = set.instances()[0].scale;
        set.advance(0.3);
        let second = set.instances()[0].scale;
        assert!((first - second).abs() > 1e-4);
    }

    #[test]
    fn test_pulse_time_wraps_each_cycle() {
        let mut set = MarkerSet::from_sites(&[site("a", 0.0, 0.0)]);
        let start = set.advance(0.25);
        // A week of frames at 60 FPS.
        for _ in 0..(60 * 60 * 24 * 7) {
            set.advance(1.0 / 60.0);
        }
        assert!((0.0..=PULSE_PERIOD).contains(&set.pulse_time));
        set.pulse_time = 0.25;
        assert!((set.pulse() - start).abs() < 1e-6);
        assert!((set.advance(PULSE_PERIOD) - start).abs() < 1e-4);
    }

    #[test]
    fn test_pick_front_marker_only() {
        let set = MarkerSet::from_sites(&[site("front", 0.0, -90.0), site("back", 0.0, 90.0)]);
        let front = set.get("front").map(|m| m.position).unwrap_or_default();
        assert!(front.z > 0.9, "lon -90 faces +Z: {front:?}");

        let origin = Vec3::new(0.0, 0.0, 3.0);
        assert_eq!(set.pick(origin, Vec3::NEG_Z), Some("front"));

        // From the other side the front marker is hidden by the globe.
        let behind = Vec3::new(0.0, 0.0, -3.0);
        assert_eq!(set.pick(behind, Vec3::Z), Some("back"));
        assert_eq!(set.pick(origin, Vec3::Y), None);
    }
}
