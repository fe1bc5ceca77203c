use super::hover_intent::{Hit, HitTester, INTERACTIVE_LAYER, PointerPos, SceneObject};
use crate::common::{GroupId, vec3d::Vec3D};
use crate::orbit_track::{OrbitTrack, TrackTarget};
use crate::propagation::{BoundingSphere, TransformReader};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Radius of the globe in scene units.
pub const GLOBE_RADIUS: f32 = 5.0;

/// Presentation layer as seen by the pipeline. It only consumes buffers and polylines.
pub trait SceneSink: Send + Sync {
    /// Adds the instanced mesh of a group backed by `reader`.
    fn attach_group(&mut self, group_id: &GroupId, reader: TransformReader, color: Option<&str>);
    fn set_group_visible(&mut self, group_id: &GroupId, visible: bool);
    fn set_group_bounds(&mut self, group_id: &GroupId, bounds: Option<BoundingSphere>);
    /// Adds or replaces the polyline of a track.
    fn show_track(&mut self, track: &OrbitTrack);
    fn hide_track(&mut self, target: &TrackTarget);
}

struct SceneGroup {
    reader: TransformReader,
    color: Option<String>,
    visible: bool,
    bounds: Option<BoundingSphere>,
}

/// Polyline of a visible orbit track as handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackLine {
    pub points: Vec<Vec3D<f32>>,
    pub color: String,
    pub start_offset: f32,
}

/// Frame statistics of a [`HeadlessScene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneStats {
    pub groups: usize,
    pub visible_groups: usize,
    pub valid_instances: usize,
    pub tracks: usize,
}

/// Scene without a renderer, viewed by an orthographic camera on the +z axis looking
/// at the origin. Pointer coordinates span `[-view_radius, view_radius]` on both axes.
pub struct HeadlessScene {
    groups: IndexMap<GroupId, SceneGroup>,
    tracks: HashMap<TrackTarget, TrackLine>,
    view_radius: f32,
    pick_radius: f32,
    show_globe: bool,
}

impl HeadlessScene {
    const CAMERA_Z: f32 = 100.0;

    pub fn new(view_radius: f32, pick_radius: f32) -> Self {
        Self { groups: IndexMap::new(), tracks: HashMap::new(), view_radius, pick_radius, show_globe: true }
    }

    pub fn set_globe(&mut self, show: bool) { self.show_globe = show; }

    /// World position under `pointer` on the z = 0 plane.
    pub fn pointer_to_world(&self, pointer: PointerPos) -> (f32, f32) {
        (pointer.x * self.view_radius, pointer.y * self.view_radius)
    }

    /// Pointer position of a world point.
    pub fn world_to_pointer(&self, point: Vec3D<f32>) -> PointerPos {
        PointerPos::new(point.x() / self.view_radius, point.y() / self.view_radius)
    }

    pub fn track_line(&self, target: &TrackTarget) -> Option<&TrackLine> { self.tracks.get(target) }
    pub fn group_bounds(&self, group_id: &GroupId) -> Option<BoundingSphere> {
        self.groups.get(group_id).and_then(|g| g.bounds)
    }
    pub fn is_group_visible(&self, group_id: &GroupId) -> bool { self.groups.get(group_id).is_some_and(|g| g.visible) }
    pub fn group_color(&self, group_id: &GroupId) -> Option<&str> {
        self.groups.get(group_id).and_then(|g| g.color.as_deref())
    }

    pub fn stats(&self) -> SceneStats {
        let visible = self.groups.values().filter(|g| g.visible);
        SceneStats {
            groups: self.groups.len(),
            visible_groups: visible.clone().count(),
            valid_instances: visible.map(|g| g.reader.valid_count()).sum(),
            tracks: self.tracks.len(),
        }
    }
}

impl SceneSink for HeadlessScene {
    fn attach_group(&mut self, group_id: &GroupId, reader: TransformReader, color: Option<&str>) {
        let group = SceneGroup { reader, color: color.map(str::to_string), visible: false, bounds: None };
        self.groups.insert(group_id.clone(), group);
    }

    fn set_group_visible(&mut self, group_id: &GroupId, visible: bool) {
        if let Some(group) = self.groups.get_mut(group_id) {
            group.visible = visible;
        }
    }

    fn set_group_bounds(&mut self, group_id: &GroupId, bounds: Option<BoundingSphere>) {
        if let Some(group) = self.groups.get_mut(group_id) {
            group.bounds = bounds;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn show_track(&mut self, track: &OrbitTrack) {
        let line = TrackLine {
            points: track.points().iter().map(|p| p.to_f32()).collect(),
            color: track.color().to_string(),
            start_offset: track.start_offset() as f32,
        };
        self.tracks.insert(track.target().clone(), line);
    }

    fn hide_track(&mut self, target: &TrackTarget) { self.tracks.remove(target); }
}

impl HitTester for HeadlessScene {
    fn hit_test(&self, pointer: PointerPos) -> Vec<Hit> {
        let (x, y) = self.pointer_to_world(pointer);
        let ray = Vec3D::new(x, y, 0.0);
        let pick_sq = self.pick_radius * self.pick_radius;
        let mut hits = Vec::new();

        let globe_sq = x * x + y * y;
        if self.show_globe && globe_sq <= GLOBE_RADIUS * GLOBE_RADIUS {
            let surface_z = (GLOBE_RADIUS * GLOBE_RADIUS - globe_sq).sqrt();
            hits.push(Hit { distance: Self::CAMERA_Z - surface_z, layer: INTERACTIVE_LAYER, object: SceneObject::Globe });
        }

        for (group_id, group) in self.groups.iter().filter(|(_, g)| g.visible) {
            if let Some(bounds) = group.bounds {
                let center = bounds.center();
                let reach = bounds.radius() + self.pick_radius;
                if Vec3D::new(center.x(), center.y(), 0.0).distance_sq(&ray) > reach * reach {
                    continue;
                }
            }
            for instance in 0..group.reader.capacity() {
                let Some(transform) = group.reader.read_slot(instance).filter(|t| t.is_valid()) else { continue };
                let p = transform.position();
                if Vec3D::new(p.x(), p.y(), 0.0).distance_sq(&ray) <= pick_sq {
                    hits.push(Hit {
                        distance: Self::CAMERA_Z - p.z(),
                        layer: INTERACTIVE_LAYER,
                        object: SceneObject::Instance { group_id: group_id.clone(), instance },
                    });
                }
            }
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}
