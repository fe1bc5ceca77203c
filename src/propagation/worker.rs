use super::orbital_record::RecordConstructionError;
use super::propagator::{PropagationError, Propagator, StateVector};
use super::record_store::OrbitRecordStore;
use super::transform_buffer::{InstanceTransform, TransformWriter};
use crate::common::{GroupId, sim_clock::SimClock, vec3d::Vec3D};
use crate::http_handler::RawEntity;
use crate::{warn, worker};
use bitvec::prelude::{BitBox, BitVec};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Scene units per kilometre.
pub const SCALE_FACTOR: f64 = 5.0 / 6371.0;
/// Standard gravitational parameter of the Earth in km³/s².
pub const MU_EARTH: f64 = 398_600.441_8;
/// Radius in scene units at which an instance is drawn with [`DEFAULT_SCALE`].
pub const SCALE_RADIUS: f64 = 5.3;
/// Model scale of an instance at [`SCALE_RADIUS`].
pub const DEFAULT_SCALE: f64 = 0.02;
/// Largest model scale of an instance.
pub const MAX_SCALE: f64 = 4.0 * DEFAULT_SCALE;

/// Converts a physical position in km to scene units.
pub fn scene_position(position_km: Vec3D<f64>) -> Vec3D<f64> { permute(position_km) * SCALE_FACTOR }

/// Converts a physical velocity in km/s to scene units in which `μ = 1`.
pub fn scene_velocity(velocity_km_s: Vec3D<f64>) -> Vec3D<f64> {
    permute(velocity_km_s) / (MU_EARTH * SCALE_FACTOR).sqrt()
}

/// Direction an instance model is oriented along for a physical velocity in km/s.
///
/// Models face away from their direction of travel: `(-vx, -vz, vy)`.
pub fn scene_heading(velocity_km_s: Vec3D<f64>) -> Vec3D<f64> { -permute(velocity_km_s) }

/// Model scale of an instance at `scene_position`.
pub fn instance_scale(scene_position: Vec3D<f64>) -> f64 {
    MAX_SCALE.min(DEFAULT_SCALE * scene_position.abs() / SCALE_RADIUS)
}

/// The scene is y-up: physical `(x, y, z)` maps to `(x, z, -y)`.
fn permute(v: Vec3D<f64>) -> Vec3D<f64> { Vec3D::new(v.x(), v.z(), -v.y()) }

/// Control messages accepted by a propagation worker.
pub enum WorkerCommand {
    /// Builds the record store of a group and takes ownership of its buffer writer.
    Init { group_id: GroupId, raw_entities: Vec<(String, RawEntity)>, writer: TransformWriter },
    /// Recomputes every slot of a displayed group for `instant`.
    Advance { group_id: GroupId, instant: DateTime<Utc> },
    SetSpeed { factor: f64 },
    Reset,
    Display { group_id: GroupId },
    Hide { group_id: GroupId },
    /// Computes the state of one object without touching the buffer.
    GetPosVel { group_id: GroupId, instance_id: usize },
    Shutdown,
}

/// Results posted by a propagation worker.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    GroupInitialized {
        group_id: GroupId,
        count: usize,
        member_ids: Vec<String>,
        errors: Vec<RecordConstructionError>,
    },
    TransformsWritten {
        group_id: GroupId,
        instant: DateTime<Utc>,
        valid: usize,
    },
    /// State of one object in scene units, velocity scaled so that `μ = 1`.
    PosVel {
        group_id: GroupId,
        instance_id: usize,
        instant: DateTime<Utc>,
        sample: Result<StateVector, PropagationError>,
    },
    /// The worker panicked and stopped processing commands.
    Faulted { reason: String },
}

impl WorkerMessage {
    /// The group a message refers to, `None` for worker-wide messages.
    pub fn group_id(&self) -> Option<&GroupId> {
        match self {
            WorkerMessage::GroupInitialized { group_id, .. }
            | WorkerMessage::TransformsWritten { group_id, .. }
            | WorkerMessage::PosVel { group_id, .. } => Some(group_id),
            WorkerMessage::Faulted { .. } => None,
        }
    }
}

/// Per-group state owned by a worker.
struct WorkerGroup<E> {
    store: OrbitRecordStore<E>,
    writer: TransformWriter,
    displayed: bool,
    last_instant: Option<DateTime<Utc>>,
    /// Objects whose last propagation failed and was already logged.
    reported: BitBox,
}

/// Single-threaded propagation context owning the record stores of its groups.
pub struct PropagationWorker<P: Propagator> {
    index: usize,
    propagator: Arc<P>,
    groups: HashMap<GroupId, WorkerGroup<P::Elements>>,
    clock: SimClock,
}

impl<P: Propagator> PropagationWorker<P> {
    pub fn new(index: usize, propagator: Arc<P>) -> Self {
        Self { index, propagator, groups: HashMap::new(), clock: SimClock::new(Utc::now()) }
    }

    pub fn index(&self) -> usize { self.index }
    pub fn group_count(&self) -> usize { self.groups.len() }

    /// Applies one command.
    ///
    /// # Returns
    /// The result message to post, if the command produces one.
    pub fn handle(&mut self, command: WorkerCommand) -> Option<WorkerMessage> {
        match command {
            WorkerCommand::Init { group_id, raw_entities, writer } => Some(self.init_group(group_id, raw_entities, writer)),
            WorkerCommand::Advance { group_id, instant } => self.advance(&group_id, instant),
            WorkerCommand::SetSpeed { factor } => {
                self.clock.set_speed(factor, Utc::now());
                None
            }
            WorkerCommand::Reset => {
                self.clock.reset(Utc::now());
                None
            }
            WorkerCommand::Display { group_id } => {
                self.set_displayed(&group_id, true);
                None
            }
            WorkerCommand::Hide { group_id } => {
                self.set_displayed(&group_id, false);
                None
            }
            WorkerCommand::GetPosVel { group_id, instance_id } => Some(self.pos_vel(group_id, instance_id)),
            WorkerCommand::Shutdown => None,
        }
    }

    fn init_group(
        &mut self,
        group_id: GroupId,
        raw_entities: Vec<(String, RawEntity)>,
        writer: TransformWriter,
    ) -> WorkerMessage {
        let (mut store, errors) = OrbitRecordStore::init(group_id.clone(), raw_entities, self.propagator.as_ref());
        for e in &errors {
            worker!(self.index, "Dropping '{}' from {group_id}: {e}", e.id());
        }
        let dropped = store.truncate(writer.capacity());
        if !dropped.is_empty() {
            warn!(
                "Group {group_id} has more members than its buffer holds ({}), dropping {} record(s)",
                writer.capacity(),
                dropped.len()
            );
        }
        writer.clear();
        let count = store.count();
        let member_ids = store.ids();
        worker!(self.index, "Initialized {group_id} with {count} record(s)");
        let group = WorkerGroup {
            store,
            writer,
            displayed: true,
            last_instant: None,
            reported: BitVec::repeat(false, count).into_boxed_bitslice(),
        };
        self.groups.insert(group_id.clone(), group);
        WorkerMessage::GroupInitialized { group_id, count, member_ids, errors }
    }

    fn set_displayed(&mut self, group_id: &GroupId, displayed: bool) {
        if let Some(group) = self.groups.get_mut(group_id) {
            group.displayed = displayed;
        }
    }

    /// Overwrites every slot of the group for `instant`. Hidden and unknown groups are skipped.
    #[allow(clippy::cast_possible_truncation)]
    fn advance(&mut self, group_id: &GroupId, instant: DateTime<Utc>) -> Option<WorkerMessage> {
        self.clock.sync(Utc::now());
        let group = self.groups.get_mut(group_id).filter(|g| g.displayed)?;
        let mut valid = 0;
        for (ordinal, record) in group.store.records().iter().enumerate() {
            match self.propagator.propagate(record.elements(), instant) {
                Ok(state) => {
                    let position = scene_position(state.position());
                    let transform = InstanceTransform::new(
                        position.to_f32(),
                        scene_heading(state.velocity()).to_f32(),
                        instance_scale(position) as f32,
                    );
                    group.writer.write_slot(ordinal, &transform);
                    if group.reported[ordinal] {
                        worker!(self.index, "Object {} in {group_id} has a known position again", record.id());
                        group.reported.set(ordinal, false);
                    }
                    valid += 1;
                }
                Err(e) => {
                    group.writer.invalidate(ordinal);
                    if !group.reported[ordinal] {
                        worker!(self.index, "Object {} in {group_id} has unknown position: {e}", record.id());
                        group.reported.set(ordinal, true);
                    }
                }
            }
        }
        group.last_instant = Some(instant);
        Some(WorkerMessage::TransformsWritten { group_id: group_id.clone(), instant, valid })
    }

    /// Evaluates one object at the group's last advanced instant, or at the worker clock.
    fn pos_vel(&mut self, group_id: GroupId, instance_id: usize) -> WorkerMessage {
        let fallback = self.clock.sync(Utc::now());
        let group = self.groups.get(&group_id);
        let instant = group.and_then(|g| g.last_instant).unwrap_or(fallback);
        let sample = group
            .and_then(|g| g.store.get(instance_id))
            .ok_or(PropagationError::UnknownInstance(instance_id))
            .and_then(|record| self.propagator.propagate(record.elements(), instant))
            .map(|state| StateVector::new(scene_position(state.position()), scene_velocity(state.velocity())));
        WorkerMessage::PosVel { group_id, instance_id, instant, sample }
    }
}

/// Runs `worker` until [`WorkerCommand::Shutdown`], a closed command channel or a panic.
///
/// Results are posted as `(worker index, message)`. A panic while handling a command is
/// reported as [`WorkerMessage::Faulted`] and ends the loop.
pub fn run_worker<P: Propagator>(
    mut worker: PropagationWorker<P>,
    mut commands: UnboundedReceiver<WorkerCommand>,
    results: UnboundedSender<(usize, WorkerMessage)>,
) {
    let index = worker.index();
    worker!(index, "Propagation worker started");
    while let Some(command) = commands.blocking_recv() {
        if matches!(command, WorkerCommand::Shutdown) {
            break;
        }
        match catch_unwind(AssertUnwindSafe(|| worker.handle(command))) {
            Ok(Some(message)) => {
                if results.send((index, message)).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| String::from("unknown panic"));
                worker!(index, "Faulted: {reason}");
                let _ = results.send((index, WorkerMessage::Faulted { reason }));
                return;
            }
        }
    }
    worker!(index, "Propagation worker stopped with {} group(s)", worker.group_count());
}
