use super::propagator::Propagator;
use super::worker::{PropagationWorker, WorkerCommand, WorkerMessage, run_worker};
use crate::common::GroupId;
use crate::{error, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::JoinHandle;
use strum_macros::Display;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Failure to route a command to a worker.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum DispatchError {
    /// The worker owning `group` panicked or stopped; its groups are stuck.
    WorkerFault { worker: usize, group: GroupId },
    /// A worker thread could not be spawned.
    Spawn(String),
    NoWorkers,
}

impl std::error::Error for DispatchError {}

/// Receives the results of one group.
pub type ResultCallback = Box<dyn FnMut(WorkerMessage) + Send>;

struct WorkerSlot {
    commands: UnboundedSender<WorkerCommand>,
    join: Option<JoinHandle<()>>,
    groups: HashSet<GroupId>,
    faulted: bool,
}

/// Fixed pool of propagation workers with a permanent group-to-worker assignment.
pub struct GroupDispatcher {
    workers: Vec<WorkerSlot>,
    assignments: HashMap<GroupId, usize>,
    callbacks: HashMap<GroupId, ResultCallback>,
    results: UnboundedReceiver<(usize, WorkerMessage)>,
}

impl GroupDispatcher {
    /// Spawns `worker_count` worker threads sharing `propagator`.
    pub fn start<P: Propagator>(worker_count: usize, propagator: Arc<P>) -> Result<Self, DispatchError> {
        if worker_count == 0 {
            return Err(DispatchError::NoWorkers);
        }
        let (result_tx, results) = mpsc::unbounded_channel();
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let (commands, command_rx) = mpsc::unbounded_channel();
            let worker = PropagationWorker::new(index, Arc::clone(&propagator));
            let result_tx = result_tx.clone();
            let join = std::thread::Builder::new()
                .name(format!("prop-worker-{index}"))
                .spawn(move || run_worker(worker, command_rx, result_tx))
                .map_err(|e| DispatchError::Spawn(e.to_string()))?;
            workers.push(WorkerSlot { commands, join: Some(join), groups: HashSet::new(), faulted: false });
        }
        info!("Started {worker_count} propagation worker(s)");
        Ok(Self { workers, assignments: HashMap::new(), callbacks: HashMap::new(), results })
    }

    pub fn worker_count(&self) -> usize { self.workers.len() }
    pub fn worker_of(&self, group_id: &GroupId) -> Option<usize> { self.assignments.get(group_id).copied() }
    pub fn load(&self, worker: usize) -> usize { self.workers.get(worker).map_or(0, |w| w.groups.len()) }
    pub fn is_faulted(&self, worker: usize) -> bool { self.workers.get(worker).is_some_and(|w| w.faulted) }

    /// Returns the worker owning `group_id`, assigning one if necessary.
    ///
    /// A new group goes to the healthy worker with the fewest groups, ties broken by the
    /// lowest index. The assignment never changes afterwards.
    pub fn assign_group(&mut self, group_id: &GroupId) -> usize {
        if let Some(worker) = self.assignments.get(group_id) {
            return *worker;
        }
        let any_healthy = self.workers.iter().any(|w| !w.faulted);
        let worker = self
            .workers
            .iter()
            .enumerate()
            .filter(|(_, w)| !any_healthy || !w.faulted)
            .min_by_key(|(index, w)| (w.groups.len(), *index))
            .map_or(0, |(index, _)| index);
        self.workers[worker].groups.insert(group_id.clone());
        self.assignments.insert(group_id.clone(), worker);
        worker
    }

    /// Registers the callback receiving every result of `group_id`, replacing any earlier one.
    pub fn register_callback(&mut self, group_id: &GroupId, callback: ResultCallback) {
        self.callbacks.insert(group_id.clone(), callback);
    }

    /// Routes `command` to the worker owning `group_id`.
    ///
    /// # Returns
    /// The worker index, or [`DispatchError::WorkerFault`] if that worker is gone.
    pub fn send(&mut self, group_id: &GroupId, command: WorkerCommand) -> Result<usize, DispatchError> {
        let worker = self.assign_group(group_id);
        let slot = &mut self.workers[worker];
        if slot.faulted || slot.commands.send(command).is_err() {
            slot.faulted = true;
            return Err(DispatchError::WorkerFault { worker, group: group_id.clone() });
        }
        Ok(worker)
    }

    /// Sends a worker-wide command to every healthy worker. Returns how many received it.
    pub fn broadcast(&mut self, command: impl Fn() -> WorkerCommand) -> usize {
        let mut delivered = 0;
        for slot in self.workers.iter_mut().filter(|w| !w.faulted) {
            if slot.commands.send(command()).is_ok() {
                delivered += 1;
            } else {
                slot.faulted = true;
            }
        }
        delivered
    }

    /// Hands a result to the callback of its group. Results of unregistered groups are dropped.
    pub fn on_result(&mut self, worker: usize, message: WorkerMessage) {
        if let WorkerMessage::Faulted { reason } = &message {
            if let Some(slot) = self.workers.get_mut(worker) {
                slot.faulted = true;
                error!("Worker {worker} faulted, {} group(s) are stuck: {reason}", slot.groups.len());
            }
            return;
        }
        let Some(group_id) = message.group_id() else { return };
        if let Some(callback) = self.callbacks.get_mut(group_id) {
            callback(message);
        }
    }

    /// Dispatches every result received so far without blocking. Returns the number handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok((worker, message)) = self.results.try_recv() {
            self.on_result(worker, message);
            handled += 1;
        }
        handled
    }

    /// Waits for the next result and dispatches it. Returns `false` once all workers are gone.
    pub async fn recv(&mut self) -> bool {
        match self.results.recv().await {
            Some((worker, message)) => {
                self.on_result(worker, message);
                true
            }
            None => false,
        }
    }

    /// Forgets the assignment and callback of `group_id`. The worker is not notified.
    pub fn remove_group(&mut self, group_id: &GroupId) {
        if let Some(worker) = self.assignments.remove(group_id) {
            self.workers[worker].groups.remove(group_id);
        }
        self.callbacks.remove(group_id);
    }

    /// Stops every worker and joins its thread.
    pub fn terminate(&mut self) {
        for slot in &self.workers {
            let _ = slot.commands.send(WorkerCommand::Shutdown);
        }
        for (index, slot) in self.workers.iter_mut().enumerate() {
            if let Some(join) = slot.join.take() {
                if join.join().is_err() {
                    error!("Worker {index} did not shut down cleanly");
                }
            }
        }
    }
}

impl Drop for GroupDispatcher {
    fn drop(&mut self) { self.terminate(); }
}
