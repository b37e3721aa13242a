//! Components: the objects behind OpenMAX handles.
//!
//! A component aggregates ports and workers and runs the lifecycle state
//! machine. Client commands never execute inline: `send_command` drops
//! them into a depth-one queue that a per-component dispatcher thread
//! drains, so transitions are serialized and the client never blocks on
//! the work itself.

use std::collections::BTreeMap;
use std::os::raw::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::{Duration, Instant};

use log::{error, trace, warn};

use crate::buffer::BufferHeader;
use crate::error::{Error, Result};
use crate::params::{PortCountParam, PortDefinition, PortFormatParam};
use crate::port::{self, Port, PortConfig, PortShared};
use crate::queue::BoundedQueue;
use crate::types::{Command, Domain, Event, State, Version, ALL_PORTS, VERSION};
use crate::worker::{Worker, WorkerTask};

/// Depth of the command queue between `send_command` and the dispatcher.
const CMD_QUEUE_DEPTH: usize = 1;

/// Callbacks a client installs on a component.
///
/// Buffer completions arrive on the owning port's return-dispatch
/// thread, events on whichever thread finished the operation. No
/// component lock is held during a callback, so the implementation may
/// call back into read-only component queries.
pub trait ComponentCallbacks: Send + Sync {
    /// Completion, error and notification events.
    fn event(&self, event: Event, data1: u32, data2: u32) -> Result<()>;

    /// An input buffer has been consumed and is back with the caller.
    fn empty_buffer_done(&self, buffer: &mut BufferHeader) -> Result<()>;

    /// An output buffer has been produced and is back with the caller.
    fn fill_buffer_done(&self, buffer: &mut BufferHeader) -> Result<()>;
}

/// Everything a component constructor declares: ports and workers.
pub struct ComponentConfig {
    name: String,
    ports: Vec<PortConfig>,
    workers: Vec<(String, Box<dyn WorkerTask>)>,
}

impl ComponentConfig {
    pub fn new(name: &str) -> ComponentConfig {
        ComponentConfig {
            name: name.to_owned(),
            ports: Vec::new(),
            workers: Vec::new(),
        }
    }

    pub fn with_port(mut self, port: PortConfig) -> ComponentConfig {
        self.ports.push(port);
        self
    }

    pub fn with_worker(mut self, name: &str, task: Box<dyn WorkerTask>) -> ComponentConfig {
        self.workers.push((name.to_owned(), task));
        self
    }

    fn validate(&self) -> Result<()> {
        let mut seen = Vec::with_capacity(self.ports.len());
        for pc in &self.ports {
            if seen.contains(&pc.index) {
                error!("{}: duplicate port index {}", self.name, pc.index);
                return Err(Error::BadParameter);
            }
            seen.push(pc.index);

            if pc.buffer_count_min == 0 || pc.buffer_count_actual < pc.buffer_count_min {
                error!("{}: bad buffer counts on port {}", self.name, pc.index);
                return Err(Error::BadParameter);
            }
            let domain = pc.contents.domain();
            if pc.formats.iter().any(|f| f.domain() != domain) {
                error!("{}: format domain mismatch on port {}", self.name, pc.index);
                return Err(Error::BadParameter);
            }
            if let Some(df) = pc.default_format {
                if df >= pc.formats.len() {
                    error!("{}: default format out of range on port {}", self.name, pc.index);
                    return Err(Error::BadParameter);
                }
            }
        }
        Ok(())
    }
}

struct StateCell {
    current: State,
    /// Target of an in-flight transition, if any.
    pending: Option<State>,
}

pub(crate) struct ComponentShared {
    name: String,
    state: Mutex<StateCell>,
    cond: Condvar,
    broken: AtomicBool,
    callbacks: Mutex<Option<Arc<dyn ComponentCallbacks>>>,
    ports: BTreeMap<u32, Arc<PortShared>>,
    workers: Vec<Worker>,
    cmds: BoundedQueue<Command>,
    cmd_thread: Mutex<Option<thread::JoinHandle<()>>>,
    return_threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

/// Handle on a live component.
///
/// Cheap to clone; worker threads and the C surface hold clones of the
/// same component. Teardown is explicit: call [`deinit`] (or let
/// `OMX_FreeHandle` do it) before dropping the last handle, otherwise
/// the component's threads stay parked.
///
/// [`deinit`]: Component::deinit
#[derive(Clone)]
pub struct Component {
    shared: Arc<ComponentShared>,
}

impl Component {
    /// Build a component and start its service threads. The component
    /// comes up in the Loaded state.
    pub fn new(config: ComponentConfig) -> Result<Component> {
        config.validate()?;

        let ComponentConfig {
            name,
            ports,
            workers,
        } = config;

        let workers: Vec<Worker> = workers
            .into_iter()
            .map(|(wname, task)| Worker::new(&wname, task))
            .collect();

        let shared = Arc::new_cyclic(|weak: &Weak<ComponentShared>| {
            let ports: BTreeMap<u32, Arc<PortShared>> = ports
                .into_iter()
                .map(|pc| (pc.index, PortShared::new(pc, Weak::clone(weak))))
                .collect();
            ComponentShared {
                name,
                state: Mutex::new(StateCell {
                    current: State::Invalid,
                    pending: None,
                }),
                cond: Condvar::new(),
                broken: AtomicBool::new(false),
                callbacks: Mutex::new(None),
                ports,
                workers,
                cmds: BoundedQueue::new(CMD_QUEUE_DEPTH),
                cmd_thread: Mutex::new(None),
                return_threads: Mutex::new(Vec::new()),
            }
        });

        let cmd_handle = thread::Builder::new()
            .name(format!("omx-cmd-{}", shared.name))
            .spawn({
                let shared = Arc::clone(&shared);
                move || command_thread_main(shared)
            })
            .map_err(|e| {
                error!("failed to spawn command thread: {}", e);
                Error::InsufficientResources
            })?;
        *shared.cmd_thread.lock().unwrap_or_else(|e| e.into_inner()) = Some(cmd_handle);

        {
            let mut handles = shared
                .return_threads
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            for p in shared.ports.values() {
                let handle = thread::Builder::new()
                    .name(format!("omx-p{}-{}", p.index(), shared.name))
                    .spawn({
                        let p = Arc::clone(p);
                        move || port::return_thread_main(p)
                    })
                    .map_err(|e| {
                        error!("failed to spawn return thread: {}", e);
                        Error::InsufficientResources
                    })?;
                handles.push(handle);
            }
        }

        shared.set_state(State::Loaded);
        Ok(Component { shared })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Component name plus component and interface versions.
    pub fn version(&self) -> (&str, Version, Version) {
        (&self.shared.name, VERSION, VERSION)
    }

    /// Current committed state. Never blocks; a transition in flight
    /// still reports the state it started from.
    pub fn state(&self) -> State {
        self.shared.current_state()
    }

    /// Queue an asynchronous command.
    ///
    /// Returns as soon as the command is accepted; the outcome arrives
    /// as a [`Event::CmdComplete`] or [`Event::Error`] callback. Port
    /// commands are validated against the port map before queueing.
    pub fn send_command(&self, cmd: Command) -> Result<()> {
        match cmd {
            Command::StateSet(_) => {}
            Command::Flush(ix)
            | Command::PortDisable(ix)
            | Command::PortEnable(ix)
            | Command::MarkBuffer(ix) => {
                if ix != ALL_PORTS && !self.shared.ports.contains_key(&ix) {
                    error!("{}: no port {}", self.shared.name, ix);
                    return Err(Error::BadPortIndex);
                }
            }
        }
        self.shared
            .cmds
            .write(cmd)
            .map_err(|_| Error::InsufficientResources)
    }

    pub fn set_callbacks(&self, callbacks: Arc<dyn ComponentCallbacks>) {
        *self
            .shared
            .callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(callbacks);
    }

    /// Look up one of the component's ports.
    pub fn port(&self, index: u32) -> Result<Port> {
        self.shared
            .ports
            .get(&index)
            .map(|shared| Port {
                shared: Arc::clone(shared),
            })
            .ok_or(Error::BadPortIndex)
    }

    /// Indices of all ports, ascending.
    pub fn port_indices(&self) -> Vec<u32> {
        self.shared.ports.keys().copied().collect()
    }

    // ---- parameter surface ----

    /// Fill `def` for the port named by `def.port_index`.
    pub fn port_definition(&self, def: &mut PortDefinition) -> Result<()> {
        def.header.check::<PortDefinition>()?;
        let port = self.find_port(def.port_index)?;
        *def = port.definition();
        Ok(())
    }

    /// Apply the client-writable part of `def` (the actual buffer
    /// count); everything else is read-only.
    pub fn set_port_definition(&self, def: &PortDefinition) -> Result<()> {
        def.header.check::<PortDefinition>()?;
        let port = self.find_port(def.port_index)?;
        port.set_buffer_count_actual(def.buffer_count_actual)
    }

    /// Enumerate the supported formats of a port; `NoMore` past the end.
    pub fn port_format(&self, param: &mut PortFormatParam) -> Result<()> {
        param.header.check::<PortFormatParam>()?;
        let port = self.find_port(param.port_index)?;
        param.format = Some(port.supported_format(param.index)?);
        Ok(())
    }

    /// Select a supported format as the port default.
    pub fn set_port_format(&self, param: &PortFormatParam) -> Result<()> {
        param.header.check::<PortFormatParam>()?;
        let port = self.find_port(param.port_index)?;
        let format = param.format.ok_or(Error::BadParameter)?;
        port.select_format(format)
    }

    /// Per-domain port census (`…Init` parameter family).
    pub fn port_counts(&self, domain: Domain, param: &mut PortCountParam) -> Result<()> {
        param.header.check::<PortCountParam>()?;
        let mut count = 0;
        let mut start = None;
        for p in self.shared.ports.values() {
            if p.domain() == domain {
                count += 1;
                start.get_or_insert(p.index());
            }
        }
        param.ports = count;
        param.start_port = start.unwrap_or(0);
        Ok(())
    }

    /// No configuration indices are serviced by the base component.
    pub fn config(&self, _index: u32) -> Result<()> {
        Err(Error::UnsupportedIndex)
    }

    /// No configuration indices are serviced by the base component.
    pub fn set_config(&self, _index: u32) -> Result<()> {
        Err(Error::UnsupportedIndex)
    }

    pub fn extension_index(&self, _name: &str) -> Result<u32> {
        Err(Error::NotImplemented)
    }

    /// Tunneling is not supported.
    pub fn tunnel_request(&self, _port: u32) -> Result<()> {
        Err(Error::NotImplemented)
    }

    pub fn role_enum(&self, _index: u32) -> Result<String> {
        Err(Error::NotImplemented)
    }

    // ---- buffer surface ----

    /// Wrap client-owned storage as a registered buffer.
    ///
    /// # Safety
    ///
    /// `data` must address at least `size` valid bytes and stay valid
    /// until the buffer is freed or the port releases its registered
    /// list.
    pub unsafe fn use_buffer(
        &self,
        port_index: u32,
        app_private: *mut c_void,
        size: u32,
        data: *mut u8,
    ) -> Result<*mut BufferHeader> {
        self.find_port(port_index)?.use_buffer(app_private, size, data)
    }

    /// Register a buffer whose storage the component allocates.
    pub fn allocate_buffer(
        &self,
        port_index: u32,
        app_private: *mut c_void,
        size: u32,
    ) -> Result<*mut BufferHeader> {
        self.find_port(port_index)?.allocate_buffer(app_private, size)
    }

    /// Unregister a buffer; core-allocated storage is released.
    pub fn free_buffer(&self, port_index: u32, header: *mut BufferHeader) -> Result<()> {
        self.find_port(port_index)?.free_buffer(header)
    }

    /// Hand a filled input buffer to the component.
    ///
    /// The port is taken from the header's input port index. Rejected
    /// outside Idle/Executing/Pause and while the component is leaving
    /// Idle for Loaded.
    ///
    /// # Safety
    ///
    /// `header` must point to a live header obtained from this
    /// component's buffer calls, currently held by the caller; the
    /// component owns it until the matching done callback returns it.
    pub unsafe fn empty_this_buffer(&self, header: *mut BufferHeader) -> Result<()> {
        let ix = header.as_ref().ok_or(Error::BadParameter)?.input_port_index;
        self.check_submit_allowed()?;
        self.find_port(ix)?.push(header)
    }

    /// Hand an empty output buffer to the component. Same admission
    /// rules as [`empty_this_buffer`](Component::empty_this_buffer).
    ///
    /// # Safety
    ///
    /// Same contract as [`empty_this_buffer`](Component::empty_this_buffer).
    pub unsafe fn fill_this_buffer(&self, header: *mut BufferHeader) -> Result<()> {
        let ix = header.as_ref().ok_or(Error::BadParameter)?.output_port_index;
        self.check_submit_allowed()?;
        self.find_port(ix)?.push(header)
    }

    fn check_submit_allowed(&self) -> Result<()> {
        let cell = self.shared.lock_state();
        let ok = matches!(
            cell.current,
            State::Idle | State::Executing | State::Pause
        ) && cell.pending != Some(State::Loaded);
        if ok {
            Ok(())
        } else {
            Err(Error::IncorrectStateOperation)
        }
    }

    /// Block until the component reaches `state`.
    pub fn wait_for_state(&self, state: State, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut cell = self.shared.lock_state();
        while cell.current != state {
            if self.shared.is_broken() {
                return Err(Error::Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let (guard, _) = self
                .shared
                .cond
                .wait_timeout(cell, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            cell = guard;
        }
        Ok(())
    }

    /// Stop every thread the component owns and invalidate it.
    /// Idempotent; called by `OMX_FreeHandle`.
    pub fn deinit(&self) -> Result<()> {
        let shared = &self.shared;
        if shared.broken.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        trace!("{}: deinit", shared.name);

        shared.cond.notify_all();
        shared.cmds.shutdown(true, true);
        for w in &shared.workers {
            w.set_broken();
            w.stop();
        }
        for p in shared.ports.values() {
            p.shutdown();
        }

        if let Some(handle) = shared
            .cmd_thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            if handle.join().is_err() {
                error!("{}: command thread panicked", shared.name);
            }
        }
        for w in &shared.workers {
            w.join();
        }
        let handles: Vec<_> = shared
            .return_threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                error!("{}: return thread panicked", shared.name);
            }
        }

        shared.set_state(State::Invalid);
        Ok(())
    }

    fn find_port(&self, index: u32) -> Result<&Arc<PortShared>> {
        self.shared.ports.get(&index).ok_or(Error::BadPortIndex)
    }
}

impl ComponentShared {
    fn lock_state(&self) -> MutexGuard<'_, StateCell> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    pub(crate) fn weak_port(&self, index: u32) -> Weak<PortShared> {
        self.ports
            .get(&index)
            .map(Arc::downgrade)
            .unwrap_or_default()
    }

    fn current_state(&self) -> State {
        self.lock_state().current
    }

    fn set_state(&self, state: State) {
        let mut cell = self.lock_state();
        trace!("{}: state {:?} -> {:?}", self.name, cell.current, state);
        cell.current = state;
        cell.pending = None;
        drop(cell);
        self.cond.notify_all();
    }

    fn set_pending(&self, target: Option<State>) {
        self.lock_state().pending = target;
        self.cond.notify_all();
    }

    // ---- callbacks ----

    fn client_callbacks(&self) -> Option<Arc<dyn ComponentCallbacks>> {
        self.callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn post_event(&self, event: Event, data1: u32, data2: u32) {
        let Some(cbs) = self.client_callbacks() else {
            trace!("{}: no callbacks for {:?}", self.name, event);
            return;
        };
        trace!(
            "{}: event {:?} data1:{:#x} data2:{:#x}",
            self.name,
            event,
            data1,
            data2
        );
        if let Err(e) = cbs.event(event, data1, data2) {
            error!("{}: event callback failed: {}", self.name, e);
        }
    }

    pub(crate) fn deliver_empty_done(&self, header: &mut BufferHeader) -> Result<()> {
        match self.client_callbacks() {
            Some(cbs) => cbs.empty_buffer_done(header),
            None => {
                warn!("{}: empty-done with no callbacks installed", self.name);
                Ok(())
            }
        }
    }

    pub(crate) fn deliver_fill_done(&self, header: &mut BufferHeader) -> Result<()> {
        match self.client_callbacks() {
            Some(cbs) => cbs.fill_buffer_done(header),
            None => {
                warn!("{}: fill-done with no callbacks installed", self.name);
                Ok(())
            }
        }
    }

    // ---- state machine, executed on the dispatcher thread ----

    fn command_state_set(self: &Arc<Self>, target: State) -> Result<()> {
        let current = self.current_state();
        trace!(
            "{}: request {:?} -> {:?}",
            self.name,
            current,
            target
        );
        if target == current {
            return Err(Error::SameState);
        }
        match target {
            State::Invalid => {
                self.set_state(State::Invalid);
                Ok(())
            }
            State::Loaded => self.state_to_loaded(current),
            State::Idle => self.state_to_idle(current),
            State::Executing => self.state_to_executing(current),
            State::Pause => self.state_to_pause(current),
            State::WaitForResources => self.state_to_wait_for_resources(current),
        }
    }

    /// Loaded/WaitForResources -> Idle completes only once every enabled
    /// port is populated; Executing/Pause -> Idle drains first.
    fn state_to_idle(self: &Arc<Self>, from: State) -> Result<()> {
        match from {
            State::Loaded | State::WaitForResources => {
                self.set_pending(Some(State::Idle));
                for p in self.ports.values() {
                    if !p.is_enabled() {
                        continue;
                    }
                    if let Err(e) = p.wait_populated() {
                        self.set_pending(None);
                        return Err(e);
                    }
                }
                self.set_state(State::Idle);
                Ok(())
            }
            State::Executing | State::Pause => {
                self.execute_flush(ALL_PORTS, false)?;
                self.set_state(State::Idle);
                Ok(())
            }
            _ => Err(Error::IncorrectStateTransition),
        }
    }

    /// Idle -> Loaded completes only once the client has freed every
    /// registered buffer.
    fn state_to_loaded(self: &Arc<Self>, from: State) -> Result<()> {
        match from {
            State::Idle => {
                self.set_pending(Some(State::Loaded));
                for w in &self.workers {
                    w.stop();
                }
                for w in &self.workers {
                    w.join();
                }
                // Submissions accepted while Idle go back untouched.
                for p in self.ports.values() {
                    p.plug();
                    p.drain_dispatch();
                }
                for p in self.ports.values() {
                    if let Err(e) = p.wait_all_returned() {
                        self.set_pending(None);
                        return Err(e);
                    }
                    p.unplug_worker();
                    p.unplug_client();
                }
                for p in self.ports.values() {
                    if let Err(e) = p.wait_no_buffers() {
                        self.set_pending(None);
                        return Err(e);
                    }
                }
                self.set_state(State::Loaded);
                Ok(())
            }
            State::WaitForResources => {
                self.set_state(State::Loaded);
                Ok(())
            }
            _ => Err(Error::IncorrectStateTransition),
        }
    }

    fn state_to_executing(self: &Arc<Self>, from: State) -> Result<()> {
        match from {
            State::Idle => {
                for p in self.ports.values() {
                    p.unplug_worker();
                    p.unplug_client();
                }
                let component = Component {
                    shared: Arc::clone(self),
                };
                for w in &self.workers {
                    if w.is_started() {
                        w.request_restart();
                    } else {
                        trace!("{}: starting worker {}", self.name, w.name());
                        w.start(&component)?;
                    }
                }
                for w in &self.workers {
                    w.wait_restart_done()?;
                }
                self.set_state(State::Executing);
                Ok(())
            }
            State::Pause => {
                self.set_state(State::Executing);
                Ok(())
            }
            _ => Err(Error::IncorrectStateTransition),
        }
    }

    fn state_to_pause(self: &Arc<Self>, from: State) -> Result<()> {
        match from {
            State::Idle | State::Executing => {
                self.set_state(State::Pause);
                Ok(())
            }
            _ => Err(Error::IncorrectStateTransition),
        }
    }

    fn state_to_wait_for_resources(self: &Arc<Self>, from: State) -> Result<()> {
        match from {
            State::Loaded => {
                self.set_state(State::WaitForResources);
                Ok(())
            }
            _ => Err(Error::IncorrectStateTransition),
        }
    }

    fn command_flush(self: &Arc<Self>, scope: u32) -> Result<()> {
        self.execute_flush(scope, true)
    }

    /// Disable: stop admissions, drain, then drop the registered list.
    fn command_port_disable(self: &Arc<Self>, scope: u32) -> Result<()> {
        let restart = matches!(
            self.current_state(),
            State::Executing | State::Pause
        );
        for p in self.scoped_ports(scope) {
            p.set_enabled(false);
            self.execute_flush(p.index(), restart)?;
            p.release_buffers();
        }
        Ok(())
    }

    /// Enable completes once the client has repopulated the port.
    fn command_port_enable(self: &Arc<Self>, scope: u32) -> Result<()> {
        let executing = matches!(
            self.current_state(),
            State::Executing | State::Pause
        );
        for p in self.scoped_ports(scope) {
            p.set_enabled(true);
            p.wait_populated()?;
            if executing {
                p.unplug_worker();
                p.unplug_client();
            }
        }
        Ok(())
    }

    /// Marks travel on the buffers themselves; accepting the command is
    /// all the base component has to do.
    fn command_mark_buffer(self: &Arc<Self>, _scope: u32) -> Result<()> {
        Ok(())
    }

    fn scoped_ports(&self, scope: u32) -> Vec<Arc<PortShared>> {
        self.ports
            .values()
            .filter(|p| scope == ALL_PORTS || p.index() == scope)
            .cloned()
            .collect()
    }

    /// The flush cycle of §buffer pipeline: request, plug, drain, wait,
    /// and optionally restart.
    fn execute_flush(self: &Arc<Self>, scope: u32, restart: bool) -> Result<()> {
        let affected = self.scoped_ports(scope);
        // Only workers that are actually inside their processing loop
        // take part in the handshake; outside Executing/Pause they are
        // parked (or not yet started) and hold no buffers.
        let active = self.workers.iter().any(|w| w.is_started())
            && matches!(self.current_state(), State::Executing | State::Pause);

        if active {
            for w in &self.workers {
                w.request_flush();
            }
            // Workers may be blocked on any port, not just the flushed
            // one; every dispatch queue has to wake them.
            for p in self.ports.values() {
                p.plug();
            }
        } else {
            for p in &affected {
                p.plug();
            }
        }

        for p in &affected {
            p.drain_dispatch();
        }

        if active {
            for w in &self.workers {
                w.wait_flush_done()?;
            }
        }
        for p in &affected {
            p.wait_all_returned()?;
        }

        if restart {
            let reopen: Vec<Arc<PortShared>> = if active {
                self.ports.values().cloned().collect()
            } else {
                affected
            };
            for p in &reopen {
                p.unplug_worker();
                p.unplug_client();
            }
            if active {
                for w in &self.workers {
                    w.request_restart();
                }
                for w in &self.workers {
                    w.wait_restart_done()?;
                }
            }
        } else {
            // Executing -> Idle: clients may keep submitting in Idle
            // while the workers stay parked.
            for p in self.ports.values() {
                p.unplug_client();
            }
        }
        Ok(())
    }
}

/// Dispatcher thread: one command at a time, one completion event each.
fn command_thread_main(shared: Arc<ComponentShared>) {
    trace!("{}: command thread up", shared.name);
    loop {
        let cmd = match shared.cmds.read() {
            Ok(cmd) => cmd,
            Err(_) => break,
        };
        trace!("{}: command {:?}", shared.name, cmd);

        let result = match cmd {
            Command::StateSet(s) => shared.command_state_set(s),
            Command::Flush(ix) => shared.command_flush(ix),
            Command::PortDisable(ix) => shared.command_port_disable(ix),
            Command::PortEnable(ix) => shared.command_port_enable(ix),
            Command::MarkBuffer(ix) => shared.command_mark_buffer(ix),
        };

        match result {
            Ok(()) => {
                shared.post_event(Event::CmdComplete, cmd.code(), cmd.param())
            }
            Err(Error::Interrupted) => {
                trace!("{}: command interrupted by shutdown", shared.name);
                break;
            }
            Err(e) => {
                error!("{}: command {:?} failed: {}", shared.name, cmd, e);
                shared.post_event(Event::Error, e.code(), 0);
            }
        }
    }
    trace!("{}: command thread down", shared.name);
}
