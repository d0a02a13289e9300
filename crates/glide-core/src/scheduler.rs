//! Central frame loop advancing every live spring with the same `dt`.
//!
//! Each simulator carries a payload owned by the caller (the runner stores its
//! per-node driver there). `advance` visits entries in handle order, which is
//! start order, so pairs started together stay in lock-step.

use std::collections::BTreeMap;

use crate::spring::{SimulationSettings, SpringParams, SpringSimulator, SpringStatus};

/// Handle returned by `FrameScheduler::start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimulatorHandle(u64);

/// One simulator's state after a step, handed to the `advance` visitor.
#[derive(Debug)]
pub struct Frame<'a, T> {
    pub handle: SimulatorHandle,
    pub progress: f64,
    pub velocity: f64,
    pub status: SpringStatus,
    pub payload: &'a mut T,
}

/// What remains of a simulator removed by `cancel`.
#[derive(Debug)]
pub struct Cancelled<T> {
    pub position: f64,
    pub velocity: f64,
    pub payload: T,
}

#[derive(Debug)]
struct Entry<T> {
    sim: SpringSimulator,
    payload: T,
}

#[derive(Debug)]
pub struct FrameScheduler<T> {
    settings: SimulationSettings,
    entries: BTreeMap<SimulatorHandle, Entry<T>>,
    next_handle: u64,
}

impl<T> FrameScheduler<T> {
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            settings,
            entries: BTreeMap::new(),
            next_handle: 0,
        }
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Start a simulator from `initial` with the given velocity.
    pub fn start(
        &mut self,
        params: SpringParams,
        initial: f64,
        target: f64,
        velocity: f64,
        payload: T,
    ) -> SimulatorHandle {
        self.next_handle += 1;
        let handle = SimulatorHandle(self.next_handle);
        let sim = SpringSimulator::new(params, initial, target, self.settings).with_velocity(velocity);
        self.entries.insert(handle, Entry { sim, payload });
        handle
    }

    /// Stop a simulator, returning its last position, velocity and payload.
    pub fn cancel(&mut self, handle: SimulatorHandle) -> Option<Cancelled<T>> {
        self.entries.remove(&handle).map(|entry| Cancelled {
            position: entry.sim.position(),
            velocity: entry.sim.velocity(),
            payload: entry.payload,
        })
    }

    pub fn get(&self, handle: SimulatorHandle) -> Option<&SpringSimulator> {
        self.entries.get(&handle).map(|e| &e.sim)
    }

    pub fn payload(&self, handle: SimulatorHandle) -> Option<&T> {
        self.entries.get(&handle).map(|e| &e.payload)
    }

    pub fn payload_mut(&mut self, handle: SimulatorHandle) -> Option<&mut T> {
        self.entries.get_mut(&handle).map(|e| &mut e.payload)
    }

    pub fn contains(&self, handle: SimulatorHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Step every simulator by `delta_ms` and visit the result.
    ///
    /// The visitor returns `false` to drop an entry that is still running.
    /// Finished entries are always dropped after their final visit.
    pub fn advance<F>(&mut self, delta_ms: f64, mut visit: F)
    where
        F: FnMut(Frame<'_, T>) -> bool,
    {
        let mut finished = Vec::new();

        for (handle, entry) in self.entries.iter_mut() {
            let status = entry.sim.step(delta_ms);
            let keep = visit(Frame {
                handle: *handle,
                progress: entry.sim.position(),
                velocity: entry.sim.velocity(),
                status,
                payload: &mut entry.payload,
            });
            if !keep || status.is_finished() {
                finished.push(*handle);
            }
        }

        for handle in finished {
            self.entries.remove(&handle);
        }
    }
}
