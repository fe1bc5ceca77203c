use crate::common::GroupId;
use crate::common::vec3d::Vec3D;
use crate::group_map::{GroupError, GroupMap};
use crate::http_handler::{
    FetchError, GroupDefinitionResponse, GroupIndexEntry, GroupIndexResponse, GroupSource, RawEntity,
};
use crate::orbit_track::{TrackOptions, TrackTarget};
use crate::presentation::{HeadlessScene, HoverEvent};
use crate::propagation::{
    GroupDispatcher, PropagationError, Propagator, RecordConstructionError, StateVector,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const MU: f64 = 398_600.441_8;
const STATIONS: &str = "./groups/stations.json";
const DEBRIS: &str = "./groups/debris.json";

/// Circular equatorial orbits, radius in km on the second line.
struct RingPropagator;

impl Propagator for RingPropagator {
    type Elements = f64;

    fn elements_from(&self, id: &str, raw: &RawEntity) -> Result<f64, RecordConstructionError> {
        raw.line2()
            .trim()
            .parse()
            .map_err(|_| RecordConstructionError::MalformedLine { id: id.to_string(), line: 2 })
    }

    #[allow(clippy::cast_precision_loss)]
    fn propagate(&self, radius: &f64, instant: DateTime<Utc>) -> Result<StateVector, PropagationError> {
        let angle = (MU / radius.powi(3)).sqrt() * instant.timestamp_millis() as f64 / 1000.0;
        let speed = (MU / radius).sqrt();
        let (sin, cos) = angle.sin_cos();
        Ok(StateVector::new(
            Vec3D::new(radius * cos, radius * sin, 0.0),
            Vec3D::new(-speed * sin, speed * cos, 0.0),
        ))
    }
}

/// Ring orbits that take `delay` per object, slower than a frame for a whole group.
struct SlowPropagator {
    delay: Duration,
}

impl Propagator for SlowPropagator {
    type Elements = f64;

    fn elements_from(&self, id: &str, raw: &RawEntity) -> Result<f64, RecordConstructionError> {
        RingPropagator.elements_from(id, raw)
    }

    fn propagate(&self, radius: &f64, instant: DateTime<Utc>) -> Result<StateVector, PropagationError> {
        std::thread::sleep(self.delay);
        RingPropagator.propagate(radius, instant)
    }
}

struct MemorySource {
    index: GroupIndexResponse,
    definitions: HashMap<String, GroupDefinitionResponse>,
}

#[async_trait]
impl GroupSource for MemorySource {
    async fn group_index(&self) -> Result<GroupIndexResponse, FetchError> { Ok(self.index.clone()) }

    async fn group_definition(&self, entities_url: &str) -> Result<GroupDefinitionResponse, FetchError> {
        self.definitions.get(entities_url).cloned().ok_or(FetchError::Status(404))
    }
}

fn source() -> Arc<MemorySource> {
    let mut index = IndexMap::new();
    index.insert(String::from("Stations"), GroupIndexEntry::new(STATIONS, 3, Some("#00ff00")));
    index.insert(String::from("Debris"), GroupIndexEntry::new(DEBRIS, 10, None));
    let mut entities = IndexMap::new();
    for (id, radius) in [("ISS", "6780"), ("CSS", "6760"), ("HST", "6910")] {
        entities.insert(id.to_string(), RawEntity::new("1 00000U", radius, None));
    }
    let definitions = HashMap::from([(STATIONS.to_string(), GroupDefinitionResponse::from_entities(entities))]);
    Arc::new(MemorySource { index: GroupIndexResponse::from_entries(index), definitions })
}

fn group_map(bounds_refresh_ticks: u64) -> (GroupMap<HeadlessScene>, Arc<RwLock<HeadlessScene>>) {
    let dispatcher = GroupDispatcher::start(2, Arc::new(RingPropagator)).unwrap();
    let scene = Arc::new(RwLock::new(HeadlessScene::new(10.0, 0.2)));
    let map = GroupMap::new(dispatcher, source(), Arc::clone(&scene), TrackOptions::default(), bounds_refresh_ticks);
    (map, scene)
}

fn slow_group_map(delay: Duration) -> GroupMap<HeadlessScene> {
    let dispatcher = GroupDispatcher::start(1, Arc::new(SlowPropagator { delay })).unwrap();
    let scene = Arc::new(RwLock::new(HeadlessScene::new(10.0, 0.2)));
    GroupMap::new(dispatcher, source(), scene, TrackOptions::default(), 1)
}

fn instant(seconds: i64) -> DateTime<Utc> { DateTime::UNIX_EPOCH + TimeDelta::seconds(seconds) }

/// Ticks until `done` holds, giving the workers time to answer.
async fn tick_until<F>(map: &mut GroupMap<HeadlessScene>, at: DateTime<Utc>, mut done: F) -> bool
where F: FnMut(&GroupMap<HeadlessScene>) -> bool {
    for _ in 0..400 {
        map.tick(at).await;
        if done(map) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[tokio::test]
async fn test_display_creates_group_once() {
    let (mut map, scene) = group_map(1);
    let group_id = map.display_by_name("Stations").await.unwrap();
    assert_eq!(group_id, GroupId::from(STATIONS));
    assert!(!scene.read().await.is_group_visible(&group_id));

    let ready = tick_until(&mut map, instant(60), |m| m.group(&group_id).is_some_and(|g| g.valid() == 3)).await;
    assert!(ready);
    let state = map.group(&group_id).unwrap();
    assert_eq!(state.name(), "Stations");
    assert_eq!(state.capacity(), 3);
    assert_eq!(state.member_ids(), ["ISS", "CSS", "HST"]);
    assert_eq!(map.member_name(&TrackTarget::new(group_id.clone(), 2)), Some("HST"));

    let scene_guard = scene.read().await;
    assert!(scene_guard.is_group_visible(&group_id));
    assert_eq!(scene_guard.group_color(&group_id), Some("#00ff00"));
    assert!(scene_guard.group_bounds(&group_id).is_some());
    assert_eq!(scene_guard.stats().valid_instances, 3);
    drop(scene_guard);

    map.display_group(&group_id).await.unwrap();
    assert_eq!(map.dispatcher().load(0) + map.dispatcher().load(1), 1);
    map.shutdown();
}

#[tokio::test]
async fn test_fetch_failures_leave_group_inert() {
    let (mut map, scene) = group_map(1);
    let unknown = map.display_by_name("Weather").await;
    assert!(matches!(unknown, Err(GroupError::Fetch(FetchError::UnknownGroup(_)))));

    let missing = map.display_by_name("Debris").await;
    assert!(matches!(missing, Err(GroupError::Fetch(FetchError::Status(404)))));
    assert!(!map.contains_group(&GroupId::from(DEBRIS)));
    assert_eq!(scene.read().await.stats().groups, 0);
    assert_eq!(map.index().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_hidden_group_stops_advancing() {
    let (mut map, scene) = group_map(1);
    let group_id = map.display_by_name("Stations").await.unwrap();
    assert!(tick_until(&mut map, instant(10), |m| m.group(&group_id).is_some_and(|g| g.valid() == 3)).await);
    assert!(tick_until(&mut map, instant(20), |m| m.group(&group_id).unwrap().last_instant() == Some(instant(20))).await);

    map.hide_group(&group_id).await.unwrap();
    assert!(!scene.read().await.is_group_visible(&group_id));
    assert_eq!(map.displayed_names(), Vec::<&str>::new());
    for seconds in 30..40 {
        map.tick(instant(seconds)).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    map.drain_results().await;
    assert_eq!(map.group(&group_id).unwrap().last_instant(), Some(instant(20)));

    map.display_group(&group_id).await.unwrap();
    assert!(scene.read().await.is_group_visible(&group_id));
    assert!(tick_until(&mut map, instant(50), |m| m.group(&group_id).unwrap().last_instant() == Some(instant(50))).await);
}

#[tokio::test]
async fn test_slow_worker_skips_frames_instead_of_lagging() {
    let mut map = slow_group_map(Duration::from_millis(10));
    let group_id = map.display_by_name("Stations").await.unwrap();
    assert!(tick_until(&mut map, instant(0), |m| m.group(&group_id).is_some_and(|g| g.valid() == 3)).await);

    // 16 ms frames against ~30 ms advances
    let frames = 90;
    for seconds in 1..=frames {
        map.tick(instant(seconds)).await;
        tokio::time::sleep(Duration::from_millis(16)).await;
    }
    for _ in 0..200 {
        map.drain_results().await;
        if !map.group(&group_id).unwrap().is_advancing() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let state = map.group(&group_id).unwrap();
    let lag = instant(frames) - state.last_instant().unwrap();
    println!("Skipped {} frame(s), lagging {}s", state.skipped_frames(), lag.num_seconds());
    assert!(lag.num_seconds() < 5);
    assert!(state.skipped_frames() > 0);
    map.shutdown();
}

#[tokio::test]
async fn test_hover_and_click_tracks_follow_group() {
    let (mut map, scene) = group_map(5);
    let group_id = map.display_by_name("Stations").await.unwrap();
    assert!(tick_until(&mut map, instant(0), |m| m.group(&group_id).is_some_and(|g| g.valid() == 3)).await);

    let target = TrackTarget::new(group_id.clone(), 1);
    map.on_hover(HoverEvent::Hover(target.clone()));
    assert_eq!(map.orbits().pending(), Some(&target));
    assert!(tick_until(&mut map, instant(0), |m| m.orbits().track(&target).is_some()).await);
    let radius = 6760.0 * 5.0 / 6371.0;
    {
        let scene = scene.read().await;
        let line = scene.track_line(&target).unwrap();
        for p in &line.points {
            assert!((f64::from(p.abs()) - radius).abs() < 1e-3);
        }
    }

    map.on_hover(HoverEvent::Leave);
    map.tick(instant(0)).await;
    assert!(scene.read().await.track_line(&target).is_none());

    map.on_hover(HoverEvent::Toggle(target.clone()));
    assert!(tick_until(&mut map, instant(0), |m| m.orbits().track(&target).is_some()).await);
    map.set_tracks_visible(false).await;
    assert!(scene.read().await.track_line(&target).is_none());
    map.set_tracks_visible(true).await;
    assert!(scene.read().await.track_line(&target).is_some());

    map.hide_group(&group_id).await.unwrap();
    map.tick(instant(1)).await;
    assert_eq!(scene.read().await.stats().tracks, 0);
    assert_eq!(map.orbits().track_count(), 1);

    map.display_group(&group_id).await.unwrap();
    map.tick(instant(2)).await;
    assert!(scene.read().await.track_line(&target).is_some());
    map.shutdown();
}

#[tokio::test]
async fn test_remove_group_drops_everything() {
    let (mut map, scene) = group_map(1);
    let group_id = map.display_by_name("Stations").await.unwrap();
    assert!(tick_until(&mut map, instant(5), |m| m.group(&group_id).is_some_and(|g| g.is_initialized())).await);
    map.set_speed(10.0);
    map.reset();
    map.remove_group(&group_id).await;
    assert!(!map.contains_group(&group_id));
    assert!(!scene.read().await.is_group_visible(&group_id));
    assert!(map.dispatcher().worker_of(&group_id).is_none());
    map.tick(instant(6)).await;
}
