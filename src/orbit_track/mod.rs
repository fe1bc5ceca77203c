mod orbit_manager;
#[allow(clippy::module_inception)]
mod orbit_track;

pub use orbit_manager::OrbitManager;
pub use orbit_track::DegenerateOrbitError;
pub use orbit_track::OrbitTrack;
pub use orbit_track::OrbitalElements;
pub use orbit_track::TRACK_SEGMENTS;
pub use orbit_track::TrackOptions;
pub use orbit_track::TrackTarget;
