use super::orbital_record::RecordConstructionError;
use crate::common::vec3d::Vec3D;
use crate::http_handler::RawEntity;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use strum_macros::Display;

/// Position (km) and velocity (km/s) of an object in the propagator's inertial frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVector {
    position: Vec3D<f64>,
    velocity: Vec3D<f64>,
}

impl StateVector {
    pub fn new(position: Vec3D<f64>, velocity: Vec3D<f64>) -> Self { Self { position, velocity } }
    pub fn position(&self) -> Vec3D<f64> { self.position }
    pub fn velocity(&self) -> Vec3D<f64> { self.velocity }
}

/// The state of an object could not be obtained at the requested instant.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum PropagationError {
    /// The propagator rejected the element set at this instant (e.g. decayed orbit).
    Diverged(String),
    /// The resulting velocity magnitude (km/s) is not physical for an Earth orbit.
    NonPhysicalVelocity(f64),
    /// The instant is too far from the element epoch to be represented.
    InstantOutOfRange,
    /// The requested object does not exist in the group.
    UnknownInstance(usize),
}

impl std::error::Error for PropagationError {}

/// Pure orbital propagator: builds element sets from raw group entities and evaluates
/// them at arbitrary instants.
///
/// Implementations must be deterministic; every worker thread shares one instance.
pub trait Propagator: Send + Sync + 'static {
    /// Propagator-specific element data stored in an [`OrbitalRecord`](super::OrbitalRecord).
    type Elements: Send + 'static;

    /// Parses a raw entity into an element set.
    fn elements_from(&self, id: &str, raw: &RawEntity) -> Result<Self::Elements, RecordConstructionError>;

    /// Evaluates `elements` at `instant`.
    fn propagate(&self, elements: &Self::Elements, instant: DateTime<Utc>) -> Result<StateVector, PropagationError>;
}

/// Maximum instantaneous velocity accepted from a propagated element set, in km/s.
pub const VEL_MAX: f64 = 11.2;

static TLE_LINE1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^1 [ 0-9A-Z]{5}[A-Z ] ").expect("static TLE regex is valid"));
static TLE_LINE2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^2 [ 0-9A-Z]{5} ").expect("static TLE regex is valid"));

/// Element set evaluated by [`Sgp4Propagator`].
pub struct Sgp4Elements {
    constants: sgp4::Constants,
    epoch: DateTime<Utc>,
    norad_id: u64,
}

impl Sgp4Elements {
    pub fn epoch(&self) -> DateTime<Utc> { self.epoch }
    pub fn norad_id(&self) -> u64 { self.norad_id }
}

/// SGP4/SDP4 propagation of two-line element sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sgp4Propagator;

impl Propagator for Sgp4Propagator {
    type Elements = Sgp4Elements;

    fn elements_from(&self, id: &str, raw: &RawEntity) -> Result<Sgp4Elements, RecordConstructionError> {
        let (line1, line2) = (raw.line1().trim_end(), raw.line2().trim_end());
        if !TLE_LINE1.is_match(line1) {
            return Err(RecordConstructionError::MalformedLine { id: id.to_string(), line: 1 });
        }
        if !TLE_LINE2.is_match(line2) {
            return Err(RecordConstructionError::MalformedLine { id: id.to_string(), line: 2 });
        }
        let elements = sgp4::Elements::from_tle(Some(id.to_string()), line1.as_bytes(), line2.as_bytes())
            .map_err(|e| RecordConstructionError::InvalidElements { id: id.to_string(), reason: e.to_string() })?;
        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| RecordConstructionError::InvalidElements { id: id.to_string(), reason: e.to_string() })?;
        Ok(Sgp4Elements { constants, epoch: elements.datetime.and_utc(), norad_id: elements.norad_id })
    }

    #[allow(clippy::cast_precision_loss)]
    fn propagate(&self, elements: &Sgp4Elements, instant: DateTime<Utc>) -> Result<StateVector, PropagationError> {
        let since_epoch = (instant - elements.epoch).num_microseconds().ok_or(PropagationError::InstantOutOfRange)?;
        let minutes = since_epoch as f64 / 60_000_000.0;
        let prediction = elements
            .constants
            .propagate(sgp4::MinutesSinceEpoch(minutes))
            .map_err(|e| PropagationError::Diverged(e.to_string()))?;
        let state = StateVector::new(Vec3D::from(prediction.position), Vec3D::from(prediction.velocity));
        let speed = state.velocity().abs();
        if !speed.is_finite() || speed > VEL_MAX {
            return Err(PropagationError::NonPhysicalVelocity(speed));
        }
        Ok(state)
    }
}
