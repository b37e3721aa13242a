//! Worker threads driving a component's buffer processing.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use log::{error, trace};

use crate::component::Component;
use crate::error::{Error, Result};
use crate::port::Port;

/// Body of a worker thread.
///
/// [`run`] is invoked once per processing interval: after the component
/// enters Executing, and again after every flush/restart handshake. The
/// implementation should loop popping buffers while
/// [`WorkerControl::should_continue`] holds, hand any buffer it is left
/// holding back through the owning port's `*_buffer_done` call, and
/// return. A blocking [`Port::pop_buffer`] fails with
/// [`Error::Interrupted`] when a flush or shutdown begins, which is the
/// natural poll point.
///
/// [`run`]: WorkerTask::run
pub trait WorkerTask: Send {
    fn name(&self) -> &str {
        "worker"
    }

    fn run(&mut self, ctl: &WorkerControl<'_>) -> Result<()>;
}

/// View of the worker's flags handed to [`WorkerTask::run`].
pub struct WorkerControl<'a> {
    shared: &'a Arc<WorkerShared>,
    component: &'a Component,
}

impl WorkerControl<'_> {
    /// True while the task should keep popping buffers. Turns false on a
    /// flush request, a stop, or component teardown.
    pub fn should_continue(&self) -> bool {
        let flags = self.shared.lock();
        flags.running && !flags.broken && !flags.request_flush
    }

    /// True once a flush has been requested and not yet acknowledged.
    pub fn flush_requested(&self) -> bool {
        self.shared.lock().request_flush
    }

    /// The component this worker belongs to.
    pub fn component(&self) -> &Component {
        self.component
    }

    /// Look up one of the component's ports.
    pub fn port(&self, index: u32) -> Result<Port> {
        self.component.port(index)
    }
}

#[derive(Default)]
struct Flags {
    running: bool,
    broken: bool,
    request_flush: bool,
    flush_done: bool,
    request_restart: bool,
    restart_done: bool,
}

pub(crate) struct WorkerShared {
    name: String,
    flags: Mutex<Flags>,
    cond: Condvar,
    task: Mutex<Option<Box<dyn WorkerTask>>>,
}

impl WorkerShared {
    fn lock(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set<F: FnOnce(&mut Flags)>(&self, f: F) {
        let mut flags = self.lock();
        f(&mut flags);
        drop(flags);
        self.cond.notify_all();
    }

    /// Park until restart is requested, the worker is stopped, or the
    /// component breaks. Consumes the request flag.
    fn wait_request_restart(&self) -> Result<()> {
        let mut flags = self.lock();
        while !(flags.broken || !flags.running || flags.request_restart) {
            flags = self.cond.wait(flags).unwrap_or_else(|e| e.into_inner());
        }
        flags.request_restart = false;
        if flags.broken {
            return Err(Error::Interrupted);
        }
        Ok(())
    }
}

/// One worker slot of a component: a named thread plus the handshake
/// flags the state machine drives.
pub(crate) struct Worker {
    shared: Arc<WorkerShared>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Worker {
    pub(crate) fn new(name: &str, task: Box<dyn WorkerTask>) -> Worker {
        Worker {
            shared: Arc::new(WorkerShared {
                name: name.to_owned(),
                flags: Mutex::new(Flags::default()),
                cond: Condvar::new(),
                task: Mutex::new(Some(task)),
            }),
            thread: Mutex::new(None),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.shared.name
    }

    pub(crate) fn is_started(&self) -> bool {
        self.thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Spawn the thread. It performs its own initial restart handshake,
    /// so a subsequent [`wait_restart_done`](Worker::wait_restart_done)
    /// confirms the task is live.
    pub(crate) fn start(&self, component: &Component) -> Result<()> {
        let mut slot = self.thread.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Ok(());
        }
        // Arm the flags before the thread exists so the caller's
        // handshake waits cannot slip past a not-yet-running worker.
        // Stale handshake state from an earlier run is cleared too.
        self.shared.set(|f| {
            f.running = true;
            f.request_flush = false;
            f.flush_done = false;
            f.request_restart = false;
            f.restart_done = false;
        });
        let shared = Arc::clone(&self.shared);
        let component = component.clone();
        let handle = thread::Builder::new()
            .name(format!("omx-wrk-{}", self.shared.name))
            .spawn(move || worker_thread_main(shared, component))
            .map_err(|e| {
                error!("failed to spawn worker thread: {}", e);
                self.shared.set(|f| f.running = false);
                Error::InsufficientResources
            })?;
        *slot = Some(handle);
        Ok(())
    }

    /// Ask the thread's loop to finish; pair with
    /// [`join`](Worker::join).
    pub(crate) fn stop(&self) {
        self.shared.set(|f| f.running = false);
    }

    pub(crate) fn set_broken(&self) {
        self.shared.set(|f| f.broken = true);
    }

    pub(crate) fn join(&self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("worker {} panicked", self.shared.name);
            }
        }
    }

    pub(crate) fn request_flush(&self) {
        self.shared.set(|f| f.request_flush = true);
    }

    /// Block until the worker acknowledges the flush. Consumes the flag.
    pub(crate) fn wait_flush_done(&self) -> Result<()> {
        let mut flags = self.shared.lock();
        while !(flags.broken || !flags.running || flags.flush_done) {
            flags = self
                .shared
                .cond
                .wait(flags)
                .unwrap_or_else(|e| e.into_inner());
        }
        flags.flush_done = false;
        if flags.broken {
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    pub(crate) fn request_restart(&self) {
        self.shared.set(|f| f.request_restart = true);
    }

    /// Block until the worker resumes after a restart request. Consumes
    /// the flag.
    pub(crate) fn wait_restart_done(&self) -> Result<()> {
        let mut flags = self.shared.lock();
        while !(flags.broken || !flags.running || flags.restart_done) {
            flags = self
                .shared
                .cond
                .wait(flags)
                .unwrap_or_else(|e| e.into_inner());
        }
        flags.restart_done = false;
        if flags.broken {
            return Err(Error::Interrupted);
        }
        Ok(())
    }
}

fn worker_thread_main(shared: Arc<WorkerShared>, component: Component) {
    let task = {
        let mut slot = shared.task.lock().unwrap_or_else(|e| e.into_inner());
        slot.take()
    };
    let Some(mut task) = task else {
        error!("worker {} started without a task", shared.name);
        return;
    };

    trace!("worker {} up", shared.name);
    // The first interval starts as soon as the state machine asks.
    shared.set(|f| f.request_restart = true);

    loop {
        if shared.wait_request_restart().is_err() {
            break;
        }
        {
            let flags = shared.lock();
            if !flags.running || flags.broken {
                break;
            }
        }
        shared.set(|f| f.restart_done = true);

        let ctl = WorkerControl {
            shared: &shared,
            component: &component,
        };
        match task.run(&ctl) {
            Ok(()) => {}
            Err(Error::Interrupted) => {
                trace!("worker {} interrupted", shared.name)
            }
            Err(e) => error!("worker {}: {}", shared.name, e),
        }

        {
            let flags = shared.lock();
            if !flags.running || flags.broken {
                break;
            }
        }
        shared.set(|f| {
            f.request_flush = false;
            f.flush_done = true;
        });
    }

    shared.set(|f| f.running = false);
    trace!("worker {} down", shared.name);

    // Hand the task back so the worker can be started again.
    let mut slot = shared.task.lock().unwrap_or_else(|e| e.into_inner());
    *slot = Some(task);
}
