//! Named background threads with join-on-shutdown.
//!
//! Pump pulses and flush writes run on short-lived `std::thread`s so the
//! loop thread never waits on them.  [`TaskSet`] keeps their handles:
//! finished tasks are reaped every tick, and shutdown joins whatever is
//! still running so no pulse is cut short and no write is abandoned.

use std::io;
use std::thread::{self, JoinHandle};

use log::{debug, error};

/// Handles of spawned background tasks.
#[derive(Default)]
pub struct TaskSet {
    handles: Vec<JoinHandle<()>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `f` on a new named thread.
    pub fn spawn(&mut self, name: &str, f: impl FnOnce() + Send + 'static) -> io::Result<()> {
        let handle = thread::Builder::new().name(name.into()).spawn(f)?;
        debug!("Spawned task '{}'", name);
        self.handles.push(handle);
        Ok(())
    }

    /// Join every task that has already finished.  Never blocks on a
    /// running task.  Returns the number reaped.
    pub fn reap(&mut self) -> usize {
        let before = self.handles.len();
        let (done, running): (Vec<_>, Vec<_>) =
            self.handles.drain(..).partition(JoinHandle::is_finished);
        self.handles = running;
        for handle in done {
            Self::join_one(handle);
        }
        before - self.handles.len()
    }

    /// Tasks spawned and not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.handles.len()
    }

    /// Block until every task has finished.
    pub fn join_all(&mut self) {
        for handle in self.handles.drain(..) {
            Self::join_one(handle);
        }
    }

    fn join_one(handle: JoinHandle<()>) {
        let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
        if handle.join().is_err() {
            error!("Task '{}' panicked", name);
        }
    }
}
