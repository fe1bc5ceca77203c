use crate::common::GroupId;
use crate::common::vec3d::Vec3D;
use crate::http_handler::RawEntity;
use crate::propagation::propagator::VEL_MAX;
use crate::propagation::transform_buffer::CELLS_PER_SLOT;
use crate::propagation::worker::{
    DEFAULT_SCALE, MAX_SCALE, PropagationWorker, SCALE_FACTOR, SCALE_RADIUS, instance_scale, scene_heading,
};
use crate::propagation::{
    BoundingSphere, DispatchError, GroupDispatcher, InstanceTransform, PropagationError, Propagator,
    RecordConstructionError, Sgp4Propagator, SharedTransformBuffer, StateVector, WorkerCommand, WorkerMessage,
};
use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const MU: f64 = 398_600.441_8;

/// Circular equatorial orbits whose radius is given in km on the second element line.
#[derive(Default)]
struct CircularPropagator {
    failing: Mutex<HashSet<String>>,
}

struct CircularElements {
    id: String,
    radius: f64,
}

impl CircularPropagator {
    fn set_failing(&self, id: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
    }
}

impl Propagator for CircularPropagator {
    type Elements = CircularElements;

    fn elements_from(&self, id: &str, raw: &RawEntity) -> Result<CircularElements, RecordConstructionError> {
        if !raw.line1().starts_with("1 ") {
            return Err(RecordConstructionError::MalformedLine { id: id.to_string(), line: 1 });
        }
        let radius = raw
            .line2()
            .strip_prefix("2 ")
            .and_then(|r| r.trim().parse::<f64>().ok())
            .ok_or(RecordConstructionError::MalformedLine { id: id.to_string(), line: 2 })?;
        Ok(CircularElements { id: id.to_string(), radius })
    }

    #[allow(clippy::cast_precision_loss)]
    fn propagate(&self, elements: &CircularElements, instant: DateTime<Utc>) -> Result<StateVector, PropagationError> {
        if elements.id == "boom" {
            panic!("propagator exploded");
        }
        if self.failing.lock().unwrap().contains(&elements.id) {
            return Err(PropagationError::Diverged(String::from("decayed")));
        }
        let r = elements.radius;
        let t = instant.timestamp_millis() as f64 / 1000.0;
        let angle = (MU / r.powi(3)).sqrt() * t;
        let speed = (MU / r).sqrt();
        let (sin, cos) = angle.sin_cos();
        Ok(StateVector::new(Vec3D::new(r * cos, r * sin, 0.0), Vec3D::new(-speed * sin, speed * cos, 0.0)))
    }
}

fn entity(id: &str, radius: f64) -> (String, RawEntity) {
    (id.to_string(), RawEntity::new("1 test", &format!("2 {radius}"), None))
}

fn malformed(id: &str) -> (String, RawEntity) { (id.to_string(), RawEntity::new("garbage", "2 7000", None)) }

fn init_worker(
    propagator: &Arc<CircularPropagator>,
    group: &GroupId,
    entities: Vec<(String, RawEntity)>,
    capacity: usize,
) -> (PropagationWorker<CircularPropagator>, crate::propagation::TransformReader, WorkerMessage) {
    let mut worker = PropagationWorker::new(0, Arc::clone(propagator));
    let (writer, reader) = SharedTransformBuffer::allocate(capacity);
    let message = worker
        .handle(WorkerCommand::Init { group_id: group.clone(), raw_entities: entities, writer })
        .unwrap();
    (worker, reader, message)
}

#[test]
fn test_init_drops_malformed_member() {
    let propagator = Arc::new(CircularPropagator::default());
    let group = GroupId::from("./groups/test.json");
    let (mut worker, reader, message) =
        init_worker(&propagator, &group, vec![malformed("bad"), entity("good", 7000.0)], 2);

    let WorkerMessage::GroupInitialized { count, member_ids, errors, .. } = message else {
        panic!("unexpected init result");
    };
    assert_eq!(count, 1);
    assert_eq!(member_ids, vec![String::from("good")]);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].id(), "bad");

    let written = worker.handle(WorkerCommand::Advance { group_id: group, instant: Utc::now() });
    assert!(matches!(written, Some(WorkerMessage::TransformsWritten { valid: 1, .. })));
    assert_eq!(reader.valid_count(), 1);
    let validity = reader.validity();
    assert!(validity[0]);
    assert!(!validity[1]);
}

#[test]
fn test_advance_writes_ordinal_order() {
    let propagator = Arc::new(CircularPropagator::default());
    let group = GroupId::from("./groups/ordered.json");
    let radii = [7000.0, 8000.0, 9000.0, 42_164.0];
    let entities = radii.iter().enumerate().map(|(i, r)| entity(&format!("obj-{i}"), *r)).collect();
    let (mut worker, reader, _) = init_worker(&propagator, &group, entities, radii.len());

    worker.handle(WorkerCommand::Advance { group_id: group, instant: Utc::now() });
    let distances = (0..radii.len())
        .map(|i| reader.read_slot(i).unwrap())
        .inspect(|t| assert!(t.is_valid()))
        .map(|t| f64::from(t.position().abs()))
        .collect_vec();
    println!("Scene distances: {distances:?}");
    for (dist, radius) in distances.iter().zip(radii) {
        assert!((dist - radius * SCALE_FACTOR).abs() < 1e-4);
    }
    assert!(distances.iter().tuple_windows().all(|(a, b)| a < b));
    assert!(reader.read_slot(radii.len()).is_none());
}

#[test]
fn test_failure_invalidates_only_that_slot() {
    let propagator = Arc::new(CircularPropagator::default());
    let group = GroupId::from("./groups/fail.json");
    let entities = vec![entity("a", 7000.0), entity("b", 7100.0), entity("c", 7200.0)];
    let (mut worker, reader, _) = init_worker(&propagator, &group, entities, 3);

    worker.handle(WorkerCommand::Advance { group_id: group.clone(), instant: Utc::now() });
    assert_eq!(reader.valid_count(), 3);

    propagator.set_failing("b", true);
    let written = worker.handle(WorkerCommand::Advance { group_id: group.clone(), instant: Utc::now() });
    assert!(matches!(written, Some(WorkerMessage::TransformsWritten { valid: 2, .. })));
    assert_eq!(reader.read_matrix(1).unwrap(), [0.0f32; CELLS_PER_SLOT]);
    assert!(reader.read_slot(0).unwrap().is_valid());
    assert!(reader.read_slot(2).unwrap().is_valid());

    propagator.set_failing("b", false);
    worker.handle(WorkerCommand::Advance { group_id: group, instant: Utc::now() });
    assert_eq!(reader.valid_count(), 3);
}

#[test]
fn test_instances_face_away_from_travel() {
    assert_eq!(scene_heading(Vec3D::new(1.0, 2.0, 3.0)), Vec3D::new(-1.0, -3.0, 2.0));

    let propagator = Arc::new(CircularPropagator::default());
    let group = GroupId::from("./groups/heading.json");
    let (mut worker, reader, _) = init_worker(&propagator, &group, vec![entity("a", 7000.0)], 1);
    let instant = DateTime::UNIX_EPOCH + TimeDelta::seconds(1234);
    worker.handle(WorkerCommand::Advance { group_id: group, instant });

    let elements = propagator.elements_from("a", &entity("a", 7000.0).1).unwrap();
    let velocity = propagator.propagate(&elements, instant).unwrap().velocity();
    let expected = scene_heading(velocity).normalize().to_f32();
    let heading = reader.read_slot(0).unwrap().heading();
    println!("Heading {heading}, expected {expected}");
    assert!(heading.distance_sq(&expected) < 1e-8);
    assert!(heading.y().abs() < 1e-6);
}

#[test]
fn test_hidden_group_ignores_advance() {
    let propagator = Arc::new(CircularPropagator::default());
    let group = GroupId::from("./groups/hidden.json");
    let (mut worker, reader, _) = init_worker(&propagator, &group, vec![entity("a", 7000.0)], 1);

    worker.handle(WorkerCommand::Hide { group_id: group.clone() });
    assert!(worker.handle(WorkerCommand::Advance { group_id: group.clone(), instant: Utc::now() }).is_none());
    assert_eq!(reader.valid_count(), 0);

    worker.handle(WorkerCommand::Display { group_id: group.clone() });
    assert!(worker.handle(WorkerCommand::Advance { group_id: group, instant: Utc::now() }).is_some());
    assert_eq!(reader.valid_count(), 1);

    let unknown = GroupId::from("./groups/unknown.json");
    assert!(worker.handle(WorkerCommand::Advance { group_id: unknown, instant: Utc::now() }).is_none());
}

#[test]
fn test_pos_vel_uses_unit_mu() {
    let propagator = Arc::new(CircularPropagator::default());
    let group = GroupId::from("./groups/posvel.json");
    let mut rng = rand::rng();
    let radius = rng.random_range(6700.0..40_000.0);
    let (mut worker, reader, _) = init_worker(&propagator, &group, vec![entity("a", radius)], 1);
    let instant = Utc::now() - TimeDelta::minutes(5);
    worker.handle(WorkerCommand::Advance { group_id: group.clone(), instant });

    let Some(WorkerMessage::PosVel { sample, instant: sampled_at, .. }) =
        worker.handle(WorkerCommand::GetPosVel { group_id: group.clone(), instance_id: 0 })
    else {
        panic!("expected a position/velocity sample");
    };
    assert_eq!(sampled_at, instant);
    let state = sample.unwrap();
    let (r, v) = (state.position().abs(), state.velocity().abs());
    println!("Scene radius {r}, scene speed {v}");
    assert!((r * v * v - 1.0).abs() < 1e-9);
    let buffered = reader.read_slot(0).unwrap().position().to_f64();
    assert!(buffered.distance_sq(&state.position()) < 1e-8);

    let missing = worker.handle(WorkerCommand::GetPosVel { group_id: group, instance_id: 3 });
    assert!(matches!(
        missing,
        Some(WorkerMessage::PosVel { sample: Err(PropagationError::UnknownInstance(3)), .. })
    ));
}

#[test]
fn test_excess_records_are_truncated() {
    let propagator = Arc::new(CircularPropagator::default());
    let group = GroupId::from("./groups/over.json");
    let entities = (0..5).map(|i| entity(&format!("o{i}"), 7000.0 + f64::from(i))).collect();
    let (_, reader, message) = init_worker(&propagator, &group, entities, 3);
    assert!(matches!(message, WorkerMessage::GroupInitialized { count: 3, .. }));
    assert_eq!(reader.capacity(), 3);
}

#[test]
fn test_instance_scale_limits() {
    let at_radius = instance_scale(Vec3D::new(SCALE_RADIUS, 0.0, 0.0));
    assert!((at_radius - DEFAULT_SCALE).abs() < 1e-12);
    let far = instance_scale(Vec3D::new(0.0, 0.0, 100.0 * SCALE_RADIUS));
    assert!((far - MAX_SCALE).abs() < 1e-12);
}

#[test]
fn test_transform_matrix_encoding() {
    let transform = InstanceTransform::new(Vec3D::new(1.0, 2.0, 3.0), Vec3D::new(0.0, 0.0, 2.0), 0.5);
    let m = transform.to_matrix();
    assert!((m[15] - 1.0).abs() < f32::EPSILON);
    assert_eq!(&m[12..15], &[1.0f32, 2.0, 3.0]);
    assert_eq!(&m[8..11], &[0.0f32, 0.0, 0.5]);
    assert!(m[3].abs() < f32::EPSILON && m[7].abs() < f32::EPSILON && m[11].abs() < f32::EPSILON);

    let decoded = InstanceTransform::from_matrix(&m);
    assert!(decoded.is_valid());
    assert!((decoded.scale() - 0.5).abs() < 1e-6);
    assert!(decoded.heading().distance_sq(&Vec3D::new(0.0, 0.0, 1.0)) < 1e-10);

    assert_eq!(InstanceTransform::INVALID.to_matrix(), [0.0f32; CELLS_PER_SLOT]);
    assert!(!InstanceTransform::from_matrix(&[0.0f32; CELLS_PER_SLOT]).is_valid());
}

#[test]
fn test_transform_basis_is_orthonormal() {
    let mut rng = rand::rng();
    for _ in 0..100 {
        let heading = Vec3D::new(
            rng.random_range(-1.0f32..1.0),
            rng.random_range(-1.0f32..1.0),
            rng.random_range(-1.0f32..1.0),
        );
        if heading.abs() < 1e-3 {
            continue;
        }
        let m = InstanceTransform::new(Vec3D::zero(), heading, 1.0).to_matrix();
        let cols = [0, 4, 8].map(|c| Vec3D::new(m[c], m[c + 1], m[c + 2]));
        for (a, b) in cols.iter().tuple_combinations() {
            assert!(a.dot(*b).abs() < 1e-5, "columns not orthogonal for heading {heading}");
        }
        for col in cols {
            assert!((col.abs() - 1.0).abs() < 1e-5);
        }
    }
}

#[test]
fn test_writer_clear_and_out_of_range() {
    let (writer, reader) = SharedTransformBuffer::allocate(2);
    let t = InstanceTransform::new(Vec3D::new(6.0, 0.0, 0.0), Vec3D::new(0.0, 1.0, 0.0), 0.02);
    assert!(writer.write_slot(1, &t));
    assert!(!writer.write_slot(2, &t));
    assert_eq!(reader.snapshot().len(), 2 * CELLS_PER_SLOT);
    assert_eq!(writer.reader().valid_count(), 1);
    writer.clear();
    assert_eq!(reader.valid_count(), 0);
}

#[test]
fn test_bounding_sphere_over_valid_slots() {
    let (writer, reader) = SharedTransformBuffer::allocate(4);
    assert!(reader.bounding_sphere().is_none());
    let points = [Vec3D::new(-6.0, 0.0, 0.0), Vec3D::new(6.0, 0.0, 0.0), Vec3D::new(0.0, 2.0, 0.0)];
    for (i, p) in points.iter().enumerate() {
        writer.write_slot(i, &InstanceTransform::new(*p, Vec3D::unit_z(), 0.02));
    }
    let sphere = reader.bounding_sphere().unwrap();
    assert!(sphere.center().distance_sq(&Vec3D::new(0.0, 1.0, 0.0)) < 1e-10);
    assert!(points.iter().all(|p| sphere.contains(*p)));
    assert!(!sphere.contains(Vec3D::new(0.0, 0.0, 10.0)));
    assert_eq!(BoundingSphere::enclosing(&points), Some(sphere));
}

#[test]
fn test_assign_group_least_loaded_and_stable() {
    let mut dispatcher = GroupDispatcher::start(3, Arc::new(CircularPropagator::default())).unwrap();
    let groups = ["a", "b", "c", "d", "e"].map(GroupId::from);
    let assigned = groups.iter().map(|g| dispatcher.assign_group(g)).collect_vec();
    assert_eq!(assigned, vec![0, 1, 2, 0, 1]);
    assert_eq!(dispatcher.assign_group(&groups[3]), 0);
    assert_eq!(dispatcher.worker_of(&groups[4]), Some(1));
    assert_eq!(dispatcher.load(0), 2);
    dispatcher.terminate();
}

#[test]
fn test_removed_group_drops_results() {
    let mut dispatcher = GroupDispatcher::start(1, Arc::new(CircularPropagator::default())).unwrap();
    let group = GroupId::from("./groups/removed.json");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    dispatcher.register_callback(&group, Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let message = || WorkerMessage::TransformsWritten { group_id: group.clone(), instant: Utc::now(), valid: 0 };

    dispatcher.on_result(0, message());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    dispatcher.remove_group(&group);
    dispatcher.on_result(0, message());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(dispatcher.worker_of(&group).is_none());
}

#[tokio::test]
async fn test_dispatcher_round_trip() {
    let mut dispatcher = GroupDispatcher::start(2, Arc::new(CircularPropagator::default())).unwrap();
    let group = GroupId::from("./groups/round-trip.json");
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    dispatcher.register_callback(&group, Box::new(move |msg| sink.lock().unwrap().push(msg)));

    let (writer, reader) = SharedTransformBuffer::allocate(2);
    let raw_entities = vec![entity("a", 7000.0), malformed("b")];
    dispatcher.send(&group, WorkerCommand::Init { group_id: group.clone(), raw_entities, writer }).unwrap();
    dispatcher.send(&group, WorkerCommand::Advance { group_id: group.clone(), instant: Utc::now() }).unwrap();
    assert!(dispatcher.recv().await);
    assert!(dispatcher.recv().await);

    let messages = received.lock().unwrap();
    assert!(matches!(messages[0], WorkerMessage::GroupInitialized { count: 1, .. }));
    assert!(matches!(messages[1], WorkerMessage::TransformsWritten { valid: 1, .. }));
    assert_eq!(reader.valid_count(), 1);
    drop(messages);
    dispatcher.terminate();
}

#[tokio::test]
async fn test_worker_fault_surfaces_from_send() {
    let mut dispatcher = GroupDispatcher::start(2, Arc::new(CircularPropagator::default())).unwrap();
    let doomed = GroupId::from("./groups/doomed.json");
    let (writer, _reader) = SharedTransformBuffer::allocate(1);
    let worker = dispatcher
        .send(&doomed, WorkerCommand::Init { group_id: doomed.clone(), raw_entities: vec![entity("boom", 7000.0)], writer })
        .unwrap();
    dispatcher.send(&doomed, WorkerCommand::Advance { group_id: doomed.clone(), instant: Utc::now() }).unwrap();
    while !dispatcher.is_faulted(worker) {
        assert!(dispatcher.recv().await);
    }

    let result = dispatcher.send(&doomed, WorkerCommand::Display { group_id: doomed.clone() });
    assert_eq!(result, Err(DispatchError::WorkerFault { worker, group: doomed }));
    let fresh = GroupId::from("./groups/fresh.json");
    assert_ne!(dispatcher.assign_group(&fresh), worker);
    dispatcher.terminate();
}

#[test]
fn test_sgp4_elements_from_tle() {
    let propagator = Sgp4Propagator;
    let raw = RawEntity::new(
        "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927",
        "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537",
        Some("#ffffff"),
    );
    let elements = propagator.elements_from("ISS", &raw).unwrap();
    assert_eq!(elements.norad_id(), 25544);
    let state = propagator.propagate(&elements, elements.epoch() + TimeDelta::minutes(30)).unwrap();
    let (r, v) = (state.position().abs(), state.velocity().abs());
    println!("ISS radius {r} km, speed {v} km/s");
    assert!(r > 6500.0 && r < 7000.0);
    assert!(v > 7.0 && v < VEL_MAX);

    let bad = RawEntity::new("X 25544U", raw.line2(), None);
    assert_eq!(
        propagator.elements_from("ISS", &bad).err(),
        Some(RecordConstructionError::MalformedLine { id: String::from("ISS"), line: 1 })
    );
}
