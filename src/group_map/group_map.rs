use crate::common::GroupId;
use crate::http_handler::{FetchError, GroupIndexResponse, GroupSource};
use crate::orbit_track::{OrbitManager, TrackOptions, TrackTarget};
use crate::presentation::{HoverEvent, SceneSink};
use crate::propagation::{
    DispatchError, GroupDispatcher, SharedTransformBuffer, TransformReader, WorkerCommand, WorkerMessage,
};
use crate::{error, event, info, log, warn};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use strum_macros::Display;
use tokio::sync::{RwLock, mpsc};

/// Failure of a group lifecycle operation. Affects only the named group.
#[derive(Debug, Display)]
pub enum GroupError {
    Fetch(FetchError),
    Dispatch(DispatchError),
}

impl std::error::Error for GroupError {}

impl From<FetchError> for GroupError {
    fn from(value: FetchError) -> Self { GroupError::Fetch(value) }
}

impl From<DispatchError> for GroupError {
    fn from(value: DispatchError) -> Self { GroupError::Dispatch(value) }
}

/// Main-context view of one group.
pub struct GroupState {
    name: String,
    /// Slot capacity announced by the group index.
    capacity: usize,
    member_ids: Vec<String>,
    reader: TransformReader,
    displayed: bool,
    initialized: bool,
    /// Set once the owning worker faulted; the group no longer advances.
    stuck: bool,
    /// An `advance` was sent and its `TransformsWritten` has not arrived yet.
    advancing: bool,
    /// Frames skipped because the worker was still busy with the group.
    skipped: u64,
    last_instant: Option<DateTime<Utc>>,
    valid: usize,
}

impl GroupState {
    pub fn name(&self) -> &str { &self.name }
    pub fn capacity(&self) -> usize { self.capacity }
    pub fn count(&self) -> usize { self.member_ids.len() }
    pub fn member_ids(&self) -> &[String] { &self.member_ids }
    pub fn reader(&self) -> &TransformReader { &self.reader }
    pub fn is_displayed(&self) -> bool { self.displayed }
    pub fn is_initialized(&self) -> bool { self.initialized }
    pub fn is_stuck(&self) -> bool { self.stuck }
    pub fn is_advancing(&self) -> bool { self.advancing }
    pub fn skipped_frames(&self) -> u64 { self.skipped }
    pub fn last_instant(&self) -> Option<DateTime<Utc>> { self.last_instant }
    pub fn valid(&self) -> usize { self.valid }
}

/// Owner of the group lifecycle in the main context.
///
/// Creates groups on first display, advances displayed groups every tick, drains worker
/// results and keeps orbit tracks and bounding volumes of the scene up to date.
pub struct GroupMap<S: SceneSink> {
    dispatcher: GroupDispatcher,
    source: Arc<dyn GroupSource>,
    scene: Arc<RwLock<S>>,
    orbits: OrbitManager,
    groups: HashMap<GroupId, GroupState>,
    index: Option<GroupIndexResponse>,
    results_tx: mpsc::UnboundedSender<WorkerMessage>,
    results_rx: mpsc::UnboundedReceiver<WorkerMessage>,
    bounds_refresh_ticks: u64,
    ticks: u64,
}

impl<S: SceneSink> GroupMap<S> {
    pub fn new(
        dispatcher: GroupDispatcher,
        source: Arc<dyn GroupSource>,
        scene: Arc<RwLock<S>>,
        track_options: TrackOptions,
        bounds_refresh_ticks: u64,
    ) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            dispatcher,
            source,
            scene,
            orbits: OrbitManager::new(track_options),
            groups: HashMap::new(),
            index: None,
            results_tx,
            results_rx,
            bounds_refresh_ticks: bounds_refresh_ticks.max(1),
            ticks: 0,
        }
    }

    /// The group index, fetched on first use.
    pub async fn index(&mut self) -> Result<&GroupIndexResponse, GroupError> {
        let index = match self.index.take() {
            Some(index) => index,
            None => {
                let index = self.source.group_index().await?;
                info!("Group index lists {} group(s)", index.len());
                index
            }
        };
        Ok(&*self.index.insert(index))
    }

    /// Identifier of the group listed under `name` in the index.
    pub async fn group_id_of(&mut self, name: &str) -> Result<GroupId, GroupError> {
        let entry = self.index().await?.get(name).ok_or_else(|| FetchError::UnknownGroup(name.to_string()))?;
        Ok(GroupId::new(entry.entities()))
    }

    /// Displays the group listed under `name` in the index.
    pub async fn display_by_name(&mut self, name: &str) -> Result<GroupId, GroupError> {
        let group_id = self.group_id_of(name).await?;
        self.display_group(&group_id).await?;
        Ok(group_id)
    }

    pub async fn hide_by_name(&mut self, name: &str) -> Result<(), GroupError> {
        let group_id = self.group_id_of(name).await?;
        self.hide_group(&group_id).await
    }

    /// Shows a group, creating it on first display.
    pub async fn display_group(&mut self, group_id: &GroupId) -> Result<(), GroupError> {
        let Some(state) = self.groups.get_mut(group_id) else {
            return self.init_group(group_id).await;
        };
        if state.displayed {
            return Ok(());
        }
        self.dispatcher.send(group_id, WorkerCommand::Display { group_id: group_id.clone() })?;
        state.displayed = true;
        if state.initialized {
            self.scene.write().await.set_group_visible(group_id, true);
        }
        log!("Displaying {}", state.name);
        self.orbits.show_group(group_id);
        self.sync_tracks().await;
        Ok(())
    }

    async fn init_group(&mut self, group_id: &GroupId) -> Result<(), GroupError> {
        let (name, capacity, index_color) = {
            let index = self.index().await?;
            let (name, entry) = index
                .find_by_entities(group_id.as_str())
                .ok_or_else(|| FetchError::UnknownGroup(group_id.to_string()))?;
            (name.to_string(), entry.count(), entry.base_color().map(str::to_string))
        };
        let definition = match self.source.group_definition(group_id.as_str()).await {
            Ok(definition) => definition,
            Err(e) => {
                error!("Unable to fetch group {name}: {e}");
                return Err(e.into());
            }
        };
        if definition.len() > capacity {
            warn!("Group {name} defines {} entities but the index announces {capacity}", definition.len());
        }
        let color = index_color.or_else(|| definition.base_color().map(str::to_string));
        let (writer, reader) = SharedTransformBuffer::allocate(capacity);
        self.scene.write().await.attach_group(group_id, reader.clone(), color.as_deref());

        let forward = self.results_tx.clone();
        self.dispatcher.register_callback(
            group_id,
            Box::new(move |message| {
                let _ = forward.send(message);
            }),
        );
        let raw_entities = definition.into_entities();
        let worker = self.dispatcher.send(group_id, WorkerCommand::Init { group_id: group_id.clone(), raw_entities, writer })?;
        info!("Group {name} ({capacity} slot(s)) assigned to worker {worker}");
        self.groups.insert(
            group_id.clone(),
            GroupState {
                name,
                capacity,
                member_ids: Vec::new(),
                reader,
                displayed: true,
                initialized: false,
                stuck: false,
                advancing: false,
                skipped: 0,
                last_instant: None,
                valid: 0,
            },
        );
        Ok(())
    }

    /// Hides a group. Its records and persistent orbit tracks are kept for the next display.
    pub async fn hide_group(&mut self, group_id: &GroupId) -> Result<(), GroupError> {
        let Some(state) = self.groups.get_mut(group_id).filter(|s| s.displayed) else { return Ok(()) };
        state.displayed = false;
        state.advancing = false;
        log!("Hiding {}", state.name);
        self.orbits.hide_group(group_id);
        self.sync_tracks().await;
        self.scene.write().await.set_group_visible(group_id, false);
        self.dispatcher.send(group_id, WorkerCommand::Hide { group_id: group_id.clone() })?;
        Ok(())
    }

    /// Tears a group down. Results still in flight are dropped.
    pub async fn remove_group(&mut self, group_id: &GroupId) {
        self.dispatcher.remove_group(group_id);
        self.orbits.drop_group(group_id);
        if self.groups.remove(group_id).is_some() {
            self.scene.write().await.set_group_visible(group_id, false);
        }
        self.sync_tracks().await;
    }

    pub fn set_speed(&mut self, factor: f64) {
        let delivered = self.dispatcher.broadcast(|| WorkerCommand::SetSpeed { factor });
        event!("Speed {factor} delivered to {delivered} worker(s)");
    }

    pub fn reset(&mut self) {
        let delivered = self.dispatcher.broadcast(|| WorkerCommand::Reset);
        event!("Reset delivered to {delivered} worker(s)");
    }

    /// Runs one frame for simulated `instant`.
    ///
    /// Dispatches the results that arrived so far, sends `advance` to every displayed
    /// group whose previous `advance` completed and updates bounding volumes and orbit
    /// tracks. A group still being advanced skips the frame, so at most one `advance`
    /// per group is queued. Never waits for a worker.
    pub async fn tick(&mut self, instant: DateTime<Utc>) {
        self.ticks += 1;
        self.drain_results().await;
        for (group_id, state) in self.groups.iter_mut().filter(|(_, s)| s.displayed && !s.stuck) {
            if state.advancing {
                if self.dispatcher.worker_of(group_id).is_some_and(|w| self.dispatcher.is_faulted(w)) {
                    error!("Group {group_id} is stuck, its worker faulted while advancing it");
                    state.stuck = true;
                } else {
                    state.skipped += 1;
                }
                continue;
            }
            match self.dispatcher.send(group_id, WorkerCommand::Advance { group_id: group_id.clone(), instant }) {
                Ok(_) => state.advancing = true,
                Err(e) => {
                    error!("Group {group_id} is stuck: {e}");
                    state.stuck = true;
                }
            }
        }

        if self.ticks % self.bounds_refresh_ticks == 0 {
            let mut scene = self.scene.write().await;
            for (group_id, state) in self.groups.iter().filter(|(_, s)| s.displayed && s.initialized) {
                scene.set_group_bounds(group_id, state.reader.bounding_sphere());
            }
        }

        let groups = &self.groups;
        let requery = self.orbits.refresh(|target| {
            groups.get(&target.group_id)?.reader.read_slot(target.instance).filter(|t| t.is_valid()).map(|t| t.position())
        });
        for target in requery {
            self.request_sample(&target);
        }
        self.sync_tracks().await;
    }

    /// Dispatches every available worker result.
    pub async fn drain_results(&mut self) {
        self.dispatcher.pump();
        while let Ok(message) = self.results_rx.try_recv() {
            self.handle_message(message).await;
        }
    }

    async fn handle_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::GroupInitialized { group_id, count, member_ids, errors } => {
                let Some(state) = self.groups.get_mut(&group_id) else { return };
                if !errors.is_empty() {
                    warn!("Group {} dropped {} malformed record(s)", state.name, errors.len());
                }
                info!("Group {} ready with {count} record(s)", state.name);
                state.member_ids = member_ids;
                state.initialized = true;
                if state.displayed {
                    let mut scene = self.scene.write().await;
                    scene.set_group_visible(&group_id, true);
                    scene.set_group_bounds(&group_id, state.reader.bounding_sphere());
                }
            }
            WorkerMessage::TransformsWritten { group_id, instant, valid } => {
                if let Some(state) = self.groups.get_mut(&group_id) {
                    state.advancing = false;
                    state.last_instant = Some(instant);
                    state.valid = valid;
                }
            }
            WorkerMessage::PosVel { group_id, instance_id, sample, .. } => {
                self.orbits.on_pos_vel(&TrackTarget::new(group_id, instance_id), sample);
            }
            WorkerMessage::Faulted { reason } => error!("Unexpected worker fault for a group: {reason}"),
        }
    }

    /// Applies a hover intent event to the orbit tracks.
    pub fn on_hover(&mut self, hover_event: HoverEvent) {
        let query = match hover_event {
            HoverEvent::Hover(target) => self.orbits.hover(target),
            HoverEvent::Leave => {
                self.orbits.clear_hover();
                None
            }
            HoverEvent::Toggle(target) => self.orbits.toggle_persist(target),
        };
        if let Some(target) = query {
            self.request_sample(&target);
        }
    }

    fn request_sample(&mut self, target: &TrackTarget) {
        if !self.groups.get(&target.group_id).is_some_and(|s| s.displayed && !s.stuck) {
            return;
        }
        let command = WorkerCommand::GetPosVel { group_id: target.group_id.clone(), instance_id: target.instance };
        if let Err(e) = self.dispatcher.send(&target.group_id, command) {
            error!("Unable to sample {target}: {e}");
        }
    }

    /// Shows every track in the scene or hides them all.
    pub async fn set_tracks_visible(&mut self, visible: bool) {
        self.orbits.set_visible(visible);
        self.sync_tracks().await;
    }

    async fn sync_tracks(&mut self) {
        let removed = self.orbits.drain_removed();
        let mut scene = self.scene.write().await;
        for target in &removed {
            scene.hide_track(target);
        }
        for track in self.orbits.tracks() {
            if track.is_displayed() {
                scene.show_track(track);
            } else {
                scene.hide_track(track.target());
            }
        }
    }

    /// Identifier of the object behind `target`.
    pub fn member_name(&self, target: &TrackTarget) -> Option<&str> {
        self.groups.get(&target.group_id)?.member_ids.get(target.instance).map(String::as_str)
    }

    pub fn group(&self, group_id: &GroupId) -> Option<&GroupState> { self.groups.get(group_id) }
    pub fn contains_group(&self, group_id: &GroupId) -> bool { self.groups.contains_key(group_id) }
    pub fn orbits(&self) -> &OrbitManager { &self.orbits }
    pub fn dispatcher(&self) -> &GroupDispatcher { &self.dispatcher }

    /// Groups currently displayed, by index name.
    pub fn displayed_names(&self) -> Vec<&str> {
        self.groups.values().filter(|s| s.displayed).map(GroupState::name).collect()
    }

    /// Stops every worker.
    pub fn shutdown(&mut self) {
        info!("Shutting down {} propagation worker(s)", self.dispatcher.worker_count());
        self.dispatcher.terminate();
    }
}
