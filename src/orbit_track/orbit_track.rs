use crate::common::{GroupId, vec3d::Vec3D};
use std::f64::consts::TAU;
use std::fmt::{Display, Formatter};
use strum_macros::Display;

/// Number of polyline segments of a full orbit.
pub const TRACK_SEGMENTS: usize = 360;

/// Below this eccentricity an orbit is treated as circular.
const CIRCULAR_ECC: f64 = 1e-9;
/// Relative node vector magnitude below which an orbit is treated as equatorial.
const EQUATORIAL_NODE: f64 = 1e-9;
/// Scale of the re-sync threshold relative to the squared orbit size.
const RESYNC_EPS: f64 = 0.002;
/// Squared scene radius the re-sync threshold is normalized to.
const RESYNC_RADIUS_SQ: f64 = 5.3 * 5.3;
/// Vertices checked ahead of the last closest vertex before a full search.
const SEARCH_WINDOW: usize = 3;

/// A state vector that does not describe a closed orbit.
#[derive(Debug, Display, Clone, Copy, PartialEq)]
pub enum DegenerateOrbitError {
    /// Position and velocity are parallel or zero.
    ZeroAngularMomentum,
    /// Parabolic or hyperbolic trajectory.
    NonElliptical,
    /// Some input component or the gravitational parameter is not usable.
    NonFinite,
}

impl std::error::Error for DegenerateOrbitError {}

/// Classical orbital elements, angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalElements {
    semi_major_axis: f64,
    eccentricity: f64,
    inclination: f64,
    raan: f64,
    arg_periapsis: f64,
}

impl OrbitalElements {
    /// Derives the osculating elements of the orbit through `position` with `velocity`.
    ///
    /// # Arguments
    /// * `position` - Position relative to the central body.
    /// * `velocity` - Velocity in the same unit system.
    /// * `mu` - Gravitational parameter in that unit system.
    ///
    /// # Returns
    /// The elements, or a `DegenerateOrbitError` if the state does not describe an ellipse.
    pub fn from_state(position: Vec3D<f64>, velocity: Vec3D<f64>, mu: f64) -> Result<Self, DegenerateOrbitError> {
        if !position.is_finite() || !velocity.is_finite() || !mu.is_finite() || mu <= 0.0 {
            return Err(DegenerateOrbitError::NonFinite);
        }
        let (r, v) = (position.abs(), velocity.abs());
        let h = position.cross(velocity);
        let h_mag = h.abs();
        if r <= 0.0 || h_mag <= f64::EPSILON * r * v {
            return Err(DegenerateOrbitError::ZeroAngularMomentum);
        }

        let e_vec = velocity.cross(h) / mu - position / r;
        let e = e_vec.abs();
        let energy = v * v / 2.0 - mu / r;
        if energy >= 0.0 || e >= 1.0 {
            return Err(DegenerateOrbitError::NonElliptical);
        }
        let semi_major_axis = -mu / (2.0 * energy);
        let inclination = (h.z() / h_mag).clamp(-1.0, 1.0).acos();

        let n = Vec3D::unit_z().cross(h);
        let n_mag = n.abs();
        let equatorial = n_mag <= EQUATORIAL_NODE * h_mag;
        let raan = if equatorial { 0.0 } else { n.y().atan2(n.x()) };

        let arg_periapsis = if e < CIRCULAR_ECC {
            0.0
        } else if equatorial {
            let longitude = e_vec.y().atan2(e_vec.x());
            // a retrograde plane mirrors the in-plane angle
            let omega = if h.z() < 0.0 { -longitude } else { longitude };
            omega.rem_euclid(TAU)
        } else {
            let omega = (n.dot(e_vec) / (n_mag * e)).clamp(-1.0, 1.0).acos();
            if e_vec.z() < 0.0 { TAU - omega } else { omega }
        };

        Ok(Self { semi_major_axis, eccentricity: e, inclination, raan, arg_periapsis })
    }

    /// Position on the orbit at `true_anomaly`.
    pub fn point_at(&self, true_anomaly: f64) -> Vec3D<f64> {
        let e = self.eccentricity;
        let radius = self.semi_major_axis * (1.0 - e * e) / (1.0 + e * true_anomaly.cos());
        let (sin, cos) = true_anomaly.sin_cos();
        Vec3D::new(radius * cos, radius * sin, 0.0)
            .rotated_z(self.arg_periapsis)
            .rotated_x(self.inclination)
            .rotated_z(self.raan)
    }

    pub fn semi_major_axis(&self) -> f64 { self.semi_major_axis }
    pub fn eccentricity(&self) -> f64 { self.eccentricity }
    pub fn inclination(&self) -> f64 { self.inclination }
    pub fn raan(&self) -> f64 { self.raan }
    pub fn arg_periapsis(&self) -> f64 { self.arg_periapsis }
}

/// Construction-time settings of an orbit track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackOptions {
    /// Gravitational parameter of the unit system samples arrive in.
    pub mu: f64,
    pub segments: usize,
    pub color: String,
}

impl Default for TrackOptions {
    fn default() -> Self { Self { mu: 1.0, segments: TRACK_SEGMENTS, color: String::from("#ffffff") } }
}

/// The object an orbit track follows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackTarget {
    pub group_id: GroupId,
    pub instance: usize,
}

impl TrackTarget {
    pub fn new(group_id: GroupId, instance: usize) -> Self { Self { group_id, instance } }
}

impl Display for TrackTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}#{}", self.group_id, self.instance) }
}

/// Closed polyline of a full orbit, derived from one position/velocity sample.
pub struct OrbitTrack {
    target: TrackTarget,
    options: TrackOptions,
    elements: OrbitalElements,
    /// `segments + 1` vertices, the last one closing the loop.
    points: Vec<Vec3D<f64>>,
    /// Squared distance from the polyline above which a fresh sample is needed.
    epsilon: f64,
    closest_index: usize,
    displayed: bool,
    persist: bool,
}

impl OrbitTrack {
    /// Derives the track of `target` from a sample.
    pub fn derive(
        target: TrackTarget,
        position: Vec3D<f64>,
        velocity: Vec3D<f64>,
        options: TrackOptions,
    ) -> Result<Self, DegenerateOrbitError> {
        let elements = OrbitalElements::from_state(position, velocity, options.mu)?;
        let mut track = Self {
            target,
            options,
            elements,
            points: Vec::new(),
            epsilon: 0.0,
            closest_index: 0,
            displayed: false,
            persist: false,
        };
        track.rebuild_points();
        Ok(track)
    }

    /// Recomputes elements and points from a fresh sample and re-syncs the closest vertex.
    ///
    /// On error the track is left unchanged.
    pub fn update(&mut self, position: Vec3D<f64>, velocity: Vec3D<f64>) -> Result<bool, DegenerateOrbitError> {
        self.elements = OrbitalElements::from_state(position, velocity, self.options.mu)?;
        self.rebuild_points();
        Ok(self.update_index(position))
    }

    #[allow(clippy::cast_precision_loss)]
    fn rebuild_points(&mut self) {
        let segments = self.options.segments.max(1);
        self.points = (0..=segments)
            .map(|j| self.elements.point_at(j as f64 / segments as f64 * TAU))
            .collect();
        let max_dist_sq = self.points.iter().map(Vec3D::abs_sq).fold(0.0, f64::max);
        self.epsilon = RESYNC_EPS * max_dist_sq / RESYNC_RADIUS_SQ;
    }

    /// Moves the closest-vertex index to follow the object at `position`.
    ///
    /// # Returns
    /// `true` if the object drifted further than the threshold from the polyline and a
    /// fresh sample should be requested. Hidden tracks never ask for one.
    pub fn update_index(&mut self, position: Vec3D<f64>) -> bool {
        if !self.displayed {
            return false;
        }
        let segments = self.segments();
        let mut closest = self.closest_index.min(segments - 1);
        let mut closest_dist = self.points[closest].distance_sq(&position);
        let mut found_min = false;
        for offset in 1..=SEARCH_WINDOW {
            let i = (self.closest_index + offset) % segments;
            let dist = self.points[i].distance_sq(&position);
            if dist < closest_dist {
                closest_dist = dist;
                closest = i;
            } else if dist > closest_dist && closest_dist < self.epsilon {
                found_min = true;
                break;
            }
        }
        if !found_min {
            (closest, closest_dist) = self.full_search(position);
        }
        self.closest_index = closest;
        closest_dist > self.epsilon
    }

    fn full_search(&self, position: Vec3D<f64>) -> (usize, f64) {
        self.points[..self.segments()]
            .iter()
            .map(|p| p.distance_sq(&position))
            .enumerate()
            .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best })
    }

    fn segments(&self) -> usize { self.points.len() - 1 }

    /// Fraction of the loop at which the object currently is, in `[0, 1)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn start_offset(&self) -> f64 { self.closest_index as f64 / self.segments() as f64 }

    pub fn target(&self) -> &TrackTarget { &self.target }
    pub fn points(&self) -> &[Vec3D<f64>] { &self.points }
    pub fn elements(&self) -> &OrbitalElements { &self.elements }
    pub fn epsilon(&self) -> f64 { self.epsilon }
    pub fn closest_index(&self) -> usize { self.closest_index }
    pub fn color(&self) -> &str { &self.options.color }
    pub fn is_displayed(&self) -> bool { self.displayed }
    pub fn set_displayed(&mut self, displayed: bool) { self.displayed = displayed; }
    pub fn is_persistent(&self) -> bool { self.persist }
    pub fn set_persistent(&mut self, persist: bool) { self.persist = persist; }
}
