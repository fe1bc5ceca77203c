use crate::common::GroupId;
use crate::orbit_track::TrackTarget;
use crate::{event, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Layer of objects the pointer can interact with.
pub const INTERACTIVE_LAYER: u32 = 1;

/// Pointer position in normalized device coordinates, both axes in `[-1, 1]`, y up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerPos {
    pub x: f32,
    pub y: f32,
}

impl PointerPos {
    pub fn new(x: f32, y: f32) -> Self { Self { x, y } }
}

/// Something a pointer ray can hit.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneObject {
    /// The background globe. Occludes everything behind it.
    Globe,
    Instance { group_id: GroupId, instance: usize },
}

/// One intersection of a pointer ray.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub distance: f32,
    pub layer: u32,
    pub object: SceneObject,
}

/// Casts pointer rays into the scene.
pub trait HitTester {
    /// All intersections along the ray through `pointer`, nearest first.
    fn hit_test(&self, pointer: PointerPos) -> Vec<Hit>;
}

/// Resolves the instance under `pointer`, if the nearest interactive hit is one.
fn pick<T: HitTester + ?Sized>(tester: &T, pointer: PointerPos) -> Option<TrackTarget> {
    let nearest = tester.hit_test(pointer).into_iter().find(|hit| hit.layer == INTERACTIVE_LAYER)?;
    match nearest.object {
        SceneObject::Globe => None,
        SceneObject::Instance { group_id, instance } => Some(TrackTarget::new(group_id, instance)),
    }
}

/// Outcome of an intent check.
#[derive(Debug, Clone, PartialEq)]
pub enum HoverEvent {
    /// The pointer rests on a new target.
    Hover(TrackTarget),
    /// The pointer left the previous target.
    Leave,
    /// The target was clicked.
    Toggle(TrackTarget),
}

/// Observable state of a [`HoverIntentHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverState {
    Idle,
    PendingCheck { deadline: Instant },
    ActiveHover,
}

/// Debounced pointer-intent detector.
///
/// Every pointer move restarts the debounce timer; only the check after the pointer
/// rested for the whole interval performs a hit test.
pub struct HoverIntentHandler {
    interval: Duration,
    state: HoverState,
    pointer: PointerPos,
    active: Option<TrackTarget>,
    hit_tests: usize,
}

impl HoverIntentHandler {
    pub fn new(interval: Duration) -> Self {
        Self { interval, state: HoverState::Idle, pointer: PointerPos::default(), active: None, hit_tests: 0 }
    }

    pub fn on_pointer_move(&mut self, pointer: PointerPos, now: Instant) {
        self.pointer = pointer;
        self.state = HoverState::PendingCheck { deadline: now + self.interval };
    }

    /// When the pending check is due.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            HoverState::PendingCheck { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Runs the pending check if its deadline passed.
    ///
    /// # Returns
    /// An event if the hovered target changed.
    pub fn poll<T: HitTester + ?Sized>(&mut self, now: Instant, tester: &T) -> Option<HoverEvent> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.hit_tests += 1;
        match pick(tester, self.pointer) {
            Some(target) => {
                self.state = HoverState::ActiveHover;
                if self.active.as_ref() == Some(&target) {
                    return None;
                }
                self.active = Some(target.clone());
                Some(HoverEvent::Hover(target))
            }
            None => {
                self.state = HoverState::Idle;
                self.active.take().map(|_| HoverEvent::Leave)
            }
        }
    }

    /// Hit-tests a click immediately.
    pub fn on_click<T: HitTester + ?Sized>(&mut self, pointer: PointerPos, tester: &T) -> Option<HoverEvent> {
        self.hit_tests += 1;
        pick(tester, pointer).map(HoverEvent::Toggle)
    }

    pub fn state(&self) -> HoverState { self.state }
    pub fn active(&self) -> Option<&TrackTarget> { self.active.as_ref() }
    pub fn hit_test_count(&self) -> usize { self.hit_tests }

    /// Drives the handler from a pointer event channel until cancelled or the channel closes.
    ///
    /// # Arguments
    /// * `scene` - Scene used for hit testing.
    /// * `pointer_rx` - Incoming pointer events.
    /// * `events` - Outgoing hover events.
    /// * `cancel` - Stops the driver.
    ///
    /// # Returns
    /// The handler in its final state.
    pub async fn run<T>(
        mut self,
        scene: Arc<RwLock<T>>,
        mut pointer_rx: mpsc::Receiver<PointerEvent>,
        events: mpsc::Sender<HoverEvent>,
        cancel: CancellationToken,
    ) -> Self
    where
        T: HitTester + Send + Sync,
    {
        loop {
            let deadline = self.deadline();
            let due = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };
            let outcome = tokio::select! {
                () = cancel.cancelled() => break,
                pointer_event = pointer_rx.recv() => match pointer_event {
                    Some(PointerEvent::Move(pos)) => {
                        self.on_pointer_move(pos, Instant::now());
                        None
                    }
                    Some(PointerEvent::Click(pos)) => self.on_click(pos, &*scene.read().await),
                    None => break,
                },
                () = due => self.poll(Instant::now(), &*scene.read().await),
            };
            if let Some(hover_event) = outcome {
                event!("Hover intent: {hover_event:?}");
                if events.send(hover_event).await.is_err() {
                    break;
                }
            }
        }
        info!("Hover intent driver stopped after {} hit test(s)", self.hit_tests);
        self
    }
}

/// Raw pointer input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Move(PointerPos),
    Click(PointerPos),
}
