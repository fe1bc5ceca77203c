use super::orbit_track::{OrbitTrack, TrackOptions, TrackTarget};
use crate::common::{GroupId, vec3d::Vec3D};
use crate::propagation::{PropagationError, StateVector};
use crate::{event, log, warn};
use std::collections::{HashMap, HashSet};

/// A track waiting for its first state sample.
#[derive(Debug, Clone, PartialEq)]
struct PendingTrack {
    target: TrackTarget,
    persist: bool,
}

/// Owner of every orbit track: the single hover track, persistent tracks and the one
/// track that may be pending creation.
///
/// Only a newer hover replaces a pending hover. Any other request arriving while a track
/// is pending waits in a queue and is sent once the pending one resolved, so a click is
/// never lost to a hover.
///
/// Methods that need a fresh sample return the target to query; the caller routes the
/// query to the propagation worker and hands the answer to [`OrbitManager::on_pos_vel`].
pub struct OrbitManager {
    tracks: HashMap<TrackTarget, OrbitTrack>,
    pending: Option<PendingTrack>,
    deferred: Vec<PendingTrack>,
    current_hover: Option<TrackTarget>,
    /// Targets with an outstanding refresh query.
    awaiting: Vec<TrackTarget>,
    /// Tracks removed since the last drain, to be taken out of the scene.
    removed: Vec<TrackTarget>,
    options: TrackOptions,
    visible: bool,
    /// Groups whose persistent tracks are kept but not shown.
    hidden_groups: HashSet<GroupId>,
}

impl OrbitManager {
    pub fn new(options: TrackOptions) -> Self {
        Self {
            tracks: HashMap::new(),
            pending: None,
            deferred: Vec::new(),
            current_hover: None,
            awaiting: Vec::new(),
            removed: Vec::new(),
            options,
            visible: true,
            hidden_groups: HashSet::new(),
        }
    }

    /// The pointer rests on `target`. The previous hover track is torn down unless it is persistent.
    ///
    /// # Returns
    /// The target to query if its track does not exist yet.
    pub fn hover(&mut self, target: TrackTarget) -> Option<TrackTarget> {
        self.set_hover(Some(target.clone()));
        if let Some(track) = self.tracks.get_mut(&target) {
            track.set_displayed(self.visible);
            return None;
        }
        self.request(target, false)
    }

    /// The pointer left every object.
    pub fn clear_hover(&mut self) {
        self.set_hover(None);
        if self.pending.as_ref().is_some_and(|p| !p.persist) {
            self.pending = None;
        }
    }

    /// Flips whether the track of `target` survives hover changes. A click on an object
    /// without a track creates a persistent one.
    ///
    /// # Returns
    /// The target to query if a new track has to be created.
    pub fn toggle_persist(&mut self, target: TrackTarget) -> Option<TrackTarget> {
        if let Some(track) = self.tracks.get_mut(&target) {
            let persist = !track.is_persistent();
            track.set_persistent(persist);
            log!("Orbit track {target} persistent: {persist}");
            if !persist && self.current_hover.as_ref() != Some(&target) {
                self.remove(&target);
            }
            return None;
        }
        if let Some(pending) = self.pending.as_mut().filter(|p| p.target == target) {
            pending.persist = !pending.persist;
            return None;
        }
        if let Some(position) = self.deferred.iter().position(|d| d.target == target) {
            if self.deferred[position].persist {
                self.deferred.remove(position);
            } else {
                self.deferred[position].persist = true;
            }
            return None;
        }
        self.request(target, true)
    }

    fn request(&mut self, target: TrackTarget, persist: bool) -> Option<TrackTarget> {
        match &self.pending {
            Some(pending) if pending.target == target => None,
            Some(pending) if !pending.persist && !persist => {
                event!("Pending orbit track {} replaced by {target}", pending.target);
                self.pending = Some(PendingTrack { target: target.clone(), persist });
                Some(target)
            }
            Some(pending) => {
                event!("Orbit track {target} waits for {}", pending.target);
                self.defer(PendingTrack { target, persist });
                None
            }
            None => {
                self.pending = Some(PendingTrack { target: target.clone(), persist });
                Some(target)
            }
        }
    }

    /// Queues a request. At most one hover request waits, the latest one.
    fn defer(&mut self, request: PendingTrack) {
        if self.deferred.iter().any(|d| d.target == request.target) {
            return;
        }
        if !request.persist {
            self.deferred.retain(|d| d.persist);
        }
        self.deferred.push(request);
    }

    /// Moves the oldest queued request that is still wanted into the pending slot.
    fn promote_deferred(&mut self) -> Option<TrackTarget> {
        if self.pending.is_some() {
            return None;
        }
        while !self.deferred.is_empty() {
            let next = self.deferred.remove(0);
            if !next.persist && self.current_hover.as_ref() != Some(&next.target) {
                continue;
            }
            if let Some(track) = self.tracks.get_mut(&next.target) {
                track.set_persistent(track.is_persistent() || next.persist);
                continue;
            }
            let target = next.target.clone();
            self.pending = Some(next);
            return Some(target);
        }
        None
    }

    fn set_hover(&mut self, target: Option<TrackTarget>) {
        if self.current_hover == target {
            return;
        }
        self.deferred.retain(|d| d.persist || target.as_ref() == Some(&d.target));
        if let Some(previous) = self.current_hover.take() {
            if self.tracks.get(&previous).is_some_and(|t| !t.is_persistent()) {
                self.remove(&previous);
            }
        }
        self.current_hover = target;
    }

    fn remove(&mut self, target: &TrackTarget) {
        if self.tracks.remove(target).is_some() {
            self.awaiting.retain(|t| t != target);
            self.removed.push(target.clone());
        }
    }

    /// Applies a state sample of `target` in scene units.
    ///
    /// A sample for the pending target creates its track. A sample for an existing track
    /// recomputes it. Anything else is a late answer and is dropped.
    pub fn on_pos_vel(&mut self, target: &TrackTarget, sample: Result<StateVector, PropagationError>) {
        self.awaiting.retain(|t| t != target);
        let is_pending = self.pending.as_ref().is_some_and(|p| &p.target == target);
        let state = match sample {
            Ok(state) => state,
            Err(e) => {
                warn!("No state for orbit track {target}: {e}");
                if is_pending {
                    self.pending = None;
                }
                return;
            }
        };
        if is_pending {
            let Some(pending) = self.pending.take() else { return };
            let wanted = pending.persist || self.current_hover.as_ref() == Some(target);
            if !wanted {
                return;
            }
            match OrbitTrack::derive(target.clone(), state.position(), state.velocity(), self.options.clone()) {
                Ok(mut track) => {
                    track.set_persistent(pending.persist);
                    track.set_displayed(self.visible && !self.hidden_groups.contains(&target.group_id));
                    track.update_index(state.position());
                    event!("Orbit track {target} created");
                    self.tracks.insert(target.clone(), track);
                }
                Err(e) => warn!("Orbit of {target} is degenerate, showing no path: {e}"),
            }
        } else if let Some(track) = self.tracks.get_mut(target) {
            if let Err(e) = track.update(state.position(), state.velocity()) {
                warn!("Orbit of {target} became degenerate, removing its path: {e}");
                self.remove(target);
            }
        } else {
            event!("Dropping late state sample for {target}");
        }
    }

    /// Follows every displayed track along its polyline.
    ///
    /// # Arguments
    /// * `position_of` - Current scene position of a target, `None` while it is invalid.
    ///
    /// # Returns
    /// Targets that drifted off their polyline and need a fresh sample, followed by a
    /// queued request that just became pending.
    pub fn refresh<F>(&mut self, position_of: F) -> Vec<TrackTarget>
    where F: Fn(&TrackTarget) -> Option<Vec3D<f32>> {
        let mut requery = Vec::new();
        for (target, track) in &mut self.tracks {
            let Some(position) = position_of(target) else { continue };
            if track.update_index(position.to_f64()) && !self.awaiting.contains(target) {
                requery.push(target.clone());
            }
        }
        self.awaiting.extend(requery.iter().cloned());
        requery.extend(self.promote_deferred());
        requery
    }

    fn forget_requests(&mut self, group_id: &GroupId) {
        if self.pending.as_ref().is_some_and(|p| &p.target.group_id == group_id) {
            self.pending = None;
        }
        if self.current_hover.as_ref().is_some_and(|t| &t.group_id == group_id) {
            self.set_hover(None);
        }
        self.deferred.retain(|d| &d.target.group_id != group_id);
    }

    /// Removes every track and request of a group that is torn down.
    pub fn drop_group(&mut self, group_id: &GroupId) {
        self.forget_requests(group_id);
        self.hidden_groups.remove(group_id);
        let doomed: Vec<TrackTarget> = self.tracks.keys().filter(|t| &t.group_id == group_id).cloned().collect();
        for target in &doomed {
            self.remove(target);
        }
    }

    /// Takes the tracks of a hidden group out of view. Persistent tracks are kept for
    /// [`OrbitManager::show_group`], everything else of the group is dropped.
    pub fn hide_group(&mut self, group_id: &GroupId) {
        self.forget_requests(group_id);
        self.hidden_groups.insert(group_id.clone());
        let doomed: Vec<TrackTarget> = self
            .tracks
            .values()
            .filter(|t| &t.target().group_id == group_id && !t.is_persistent())
            .map(|t| t.target().clone())
            .collect();
        for target in &doomed {
            self.remove(target);
        }
        for track in self.tracks.values_mut().filter(|t| &t.target().group_id == group_id) {
            track.set_displayed(false);
        }
    }

    /// Shows the persistent tracks of a group displayed again.
    pub fn show_group(&mut self, group_id: &GroupId) {
        if !self.hidden_groups.remove(group_id) {
            return;
        }
        let visible = self.visible;
        for track in self.tracks.values_mut().filter(|t| &t.target().group_id == group_id) {
            track.set_displayed(visible);
        }
    }

    /// Hides every track and disposes of the hover track, or shows the persistent ones again.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if !visible {
            self.set_hover(None);
        }
        for track in self.tracks.values_mut() {
            let shown = !self.hidden_groups.contains(&track.target().group_id);
            track.set_displayed(visible && shown && track.is_persistent());
        }
    }

    /// Tracks removed since the last call.
    pub fn drain_removed(&mut self) -> Vec<TrackTarget> { std::mem::take(&mut self.removed) }

    pub fn tracks(&self) -> impl Iterator<Item = &OrbitTrack> { self.tracks.values() }
    pub fn visible_tracks(&self) -> impl Iterator<Item = &OrbitTrack> { self.tracks.values().filter(|t| t.is_displayed()) }
    pub fn track(&self, target: &TrackTarget) -> Option<&OrbitTrack> { self.tracks.get(target) }
    pub fn current_hover(&self) -> Option<&TrackTarget> { self.current_hover.as_ref() }
    pub fn pending(&self) -> Option<&TrackTarget> { self.pending.as_ref().map(|p| &p.target) }
    pub fn deferred(&self) -> impl Iterator<Item = &TrackTarget> { self.deferred.iter().map(|d| &d.target) }
    pub fn track_count(&self) -> usize { self.tracks.len() }
    pub fn is_visible(&self) -> bool { self.visible }
}
