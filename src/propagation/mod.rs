pub mod dispatcher;
pub mod orbital_record;
pub mod propagator;
pub mod record_store;
pub mod transform_buffer;
pub mod worker;

pub use dispatcher::{DispatchError, GroupDispatcher, ResultCallback};
pub use orbital_record::{OrbitalRecord, RecordConstructionError};
pub use propagator::{PropagationError, Propagator, Sgp4Propagator, StateVector};
pub use record_store::OrbitRecordStore;
pub use transform_buffer::{BoundingSphere, InstanceTransform, SharedTransformBuffer, TransformReader, TransformWriter};
pub use worker::{WorkerCommand, WorkerMessage};

#[cfg(test)]
mod tests;
