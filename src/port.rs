//! Ports: directional buffer endpoints owned by a component.

use std::os::raw::c_void;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::sync::Condvar;

use log::{error, trace, warn};

use crate::buffer::{BufferHeader, PortBuffer};
use crate::component::ComponentShared;
use crate::error::{Error, Result};
use crate::format::{DomainDef, FormatDetail};
use crate::params::{PortDefinition, StructHeader};
use crate::queue::BoundedQueue;
use crate::types::{BufferFlags, Dir, Domain, Event};

/// Static description of a port, supplied by a component constructor.
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Index unique within the component.
    pub index: u32,
    pub dir: Dir,
    /// How many buffers the client is expected to register.
    pub buffer_count_actual: u32,
    /// Lower bound the client may not go below.
    pub buffer_count_min: u32,
    /// Minimum byte size of each registered buffer.
    pub buffer_size: u32,
    pub buffer_alignment: u32,
    pub buffers_contiguous: bool,
    /// Non-format fields of the domain block.
    pub contents: DomainDef,
    /// Supported formats, most preferred first.
    pub formats: Vec<FormatDetail>,
    /// Position of the default entry within `formats`.
    pub default_format: Option<usize>,
}

impl PortConfig {
    pub fn new(index: u32, dir: Dir, contents: DomainDef) -> PortConfig {
        PortConfig {
            index,
            dir,
            buffer_count_actual: 1,
            buffer_count_min: 1,
            buffer_size: 0,
            buffer_alignment: 0,
            buffers_contiguous: false,
            contents,
            formats: Vec::new(),
            default_format: None,
        }
    }
}

/// One registered buffer. The header lives on the heap until the entry
/// is dropped; `storage` is present only for core-allocated buffers.
struct Registration {
    header: NonNull<BufferHeader>,
    #[allow(dead_code)]
    storage: Option<Box<[u8]>>,
    allocated: bool,
}

unsafe impl Send for Registration {}

impl Drop for Registration {
    fn drop(&mut self) {
        unsafe {
            drop(Box::from_raw(self.header.as_ptr()));
        }
    }
}

struct PortState {
    enabled: bool,
    buffer_count_actual: u32,
    buffer_count_min: u32,
    buffer_size: u32,
    buffer_alignment: u32,
    buffers_contiguous: bool,
    contents: DomainDef,
    formats: Vec<FormatDetail>,
    default_format: Option<usize>,
    bufs: Vec<Registration>,
    /// Buffers accepted from the client and not yet handed back.
    outstanding: u32,
    /// Client submissions refused while a flush is in progress.
    plugged: bool,
}

pub(crate) struct PortShared {
    index: u32,
    dir: Dir,
    domain: Domain,
    pub(crate) dispatch: BoundedQueue<PortBuffer>,
    pub(crate) returned: BoundedQueue<PortBuffer>,
    state: Mutex<PortState>,
    cond: Condvar,
    comp: Weak<ComponentShared>,
}

impl PortShared {
    pub(crate) fn new(config: PortConfig, comp: Weak<ComponentShared>) -> Arc<PortShared> {
        let depth = config.buffer_count_actual.max(1) as usize;
        Arc::new(PortShared {
            index: config.index,
            dir: config.dir,
            domain: config.contents.domain(),
            dispatch: BoundedQueue::new(depth),
            returned: BoundedQueue::new(depth),
            state: Mutex::new(PortState {
                enabled: true,
                buffer_count_actual: config.buffer_count_actual,
                buffer_count_min: config.buffer_count_min,
                buffer_size: config.buffer_size,
                buffer_alignment: config.buffer_alignment,
                buffers_contiguous: config.buffers_contiguous,
                contents: config.contents,
                formats: config.formats,
                default_format: config.default_format,
                bufs: Vec::new(),
                outstanding: 0,
                plugged: false,
            }),
            cond: Condvar::new(),
            comp,
        })
    }

    fn lock(&self) -> MutexGuard<'_, PortState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, PortState>) -> MutexGuard<'a, PortState> {
        self.cond.wait(guard).unwrap_or_else(|e| e.into_inner())
    }

    fn is_broken(&self) -> bool {
        self.comp.upgrade().map_or(true, |c| c.is_broken())
    }

    pub(crate) fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn dir(&self) -> Dir {
        self.dir
    }

    pub(crate) fn domain(&self) -> Domain {
        self.domain
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
        self.cond.notify_all();
    }

    pub(crate) fn is_populated(&self) -> bool {
        let st = self.lock();
        st.bufs.len() as u32 == st.buffer_count_actual
    }

    // ---- definition and formats ----

    pub(crate) fn definition(&self) -> PortDefinition {
        let st = self.lock();
        PortDefinition {
            header: StructHeader::for_struct::<PortDefinition>(),
            port_index: self.index,
            dir: self.dir,
            buffer_count_actual: st.buffer_count_actual,
            buffer_count_min: st.buffer_count_min,
            buffer_size: st.buffer_size,
            enabled: st.enabled,
            populated: st.bufs.len() as u32 == st.buffer_count_actual,
            domain: self.domain,
            contents: st.contents.clone(),
            format: st.default_format.and_then(|ix| st.formats.get(ix).copied()),
            buffers_contiguous: st.buffers_contiguous,
            buffer_alignment: st.buffer_alignment,
        }
    }

    /// The only client-writable definition field.
    pub(crate) fn set_buffer_count_actual(&self, count: u32) -> Result<()> {
        let mut st = self.lock();
        if count < st.buffer_count_min {
            error!(
                "port {}: buffer count {} below minimum {}",
                self.index, count, st.buffer_count_min
            );
            return Err(Error::BadParameter);
        }
        st.buffer_count_actual = count;
        Ok(())
    }

    pub(crate) fn supported_format(&self, index: u32) -> Result<FormatDetail> {
        let st = self.lock();
        st.formats.get(index as usize).copied().ok_or(Error::NoMore)
    }

    /// Make `format` the port default; it must equal a supported entry.
    pub(crate) fn select_format(&self, format: FormatDetail) -> Result<()> {
        format.validate()?;
        if format.domain() != self.domain {
            return Err(Error::UnsupportedSetting);
        }
        let mut st = self.lock();
        match st.formats.iter().position(|f| *f == format) {
            Some(ix) => {
                st.default_format = Some(ix);
                Ok(())
            }
            None => Err(Error::UnsupportedSetting),
        }
    }

    // ---- buffer registration ----

    pub(crate) fn use_buffer(
        &self,
        app_private: *mut c_void,
        size: u32,
        data: *mut u8,
    ) -> Result<*mut BufferHeader> {
        if data.is_null() {
            return Err(Error::BadParameter);
        }
        self.register(app_private, size, data, None)
    }

    pub(crate) fn allocate_buffer(
        &self,
        app_private: *mut c_void,
        size: u32,
    ) -> Result<*mut BufferHeader> {
        let mut storage = vec![0u8; size as usize].into_boxed_slice();
        let data = storage.as_mut_ptr();
        self.register(app_private, size, data, Some(storage))
    }

    fn register(
        &self,
        app_private: *mut c_void,
        size: u32,
        data: *mut u8,
        storage: Option<Box<[u8]>>,
    ) -> Result<*mut BufferHeader> {
        let mut st = self.lock();
        if size < st.buffer_size {
            error!(
                "port {}: buffer size {} below required {}",
                self.index, size, st.buffer_size
            );
            return Err(Error::BadParameter);
        }
        if st.bufs.len() as u32 >= st.buffer_count_actual {
            return Err(Error::IncorrectStateOperation);
        }
        let allocated = storage.is_some();
        let header = Box::new(BufferHeader::new(
            data,
            size,
            app_private,
            self.dir,
            self.index,
        ));
        let header = NonNull::from(Box::leak(header));
        st.bufs.push(Registration {
            header,
            storage,
            allocated,
        });
        trace!(
            "port {}: registered buffer {}/{}",
            self.index,
            st.bufs.len(),
            st.buffer_count_actual
        );
        drop(st);
        self.cond.notify_all();
        Ok(header.as_ptr())
    }

    pub(crate) fn free_buffer(&self, header: *mut BufferHeader) -> Result<()> {
        let mut st = self.lock();
        let pos = st
            .bufs
            .iter()
            .position(|r| r.header.as_ptr() == header)
            .ok_or(Error::BadParameter)?;
        let reg = st.bufs.remove(pos);
        trace!(
            "port {}: freed {} buffer",
            self.index,
            if reg.allocated { "core-allocated" } else { "client" }
        );
        drop(reg);
        drop(st);
        self.cond.notify_all();
        Ok(())
    }

    /// Drop the whole registered list (port disable).
    pub(crate) fn release_buffers(&self) {
        let dropped: Vec<Registration> = {
            let mut st = self.lock();
            st.bufs.drain(..).collect()
        };
        if !dropped.is_empty() {
            trace!(
                "port {}: released {} registered buffers",
                self.index,
                dropped.len()
            );
        }
        drop(dropped);
        self.cond.notify_all();
    }

    pub(crate) fn wait_populated(&self) -> Result<()> {
        let mut st = self.lock();
        while (st.bufs.len() as u32) < st.buffer_count_actual {
            if self.is_broken() {
                return Err(Error::Interrupted);
            }
            st = self.wait(st);
        }
        Ok(())
    }

    pub(crate) fn wait_no_buffers(&self) -> Result<()> {
        let mut st = self.lock();
        while !st.bufs.is_empty() {
            if self.is_broken() {
                return Err(Error::Interrupted);
            }
            st = self.wait(st);
        }
        Ok(())
    }

    // ---- client to worker ----

    /// Accept a client submission into the dispatch queue.
    pub(crate) fn push(&self, header: *mut BufferHeader) -> Result<()> {
        let header = NonNull::new(header).ok_or(Error::BadParameter)?;
        {
            let mut st = self.lock();
            if !st.enabled || st.plugged {
                return Err(Error::IncorrectStateOperation);
            }
            if !st.bufs.iter().any(|r| r.header == header) {
                trace!("port {}: unregistered buffer submitted", self.index);
            }
            st.outstanding += 1;
        }
        let pb = PortBuffer {
            header,
            port: self.weak_self(),
            port_index: self.index,
            dir: self.dir,
            cursor: unsafe { header.as_ref().offset },
            spent: false,
        };
        match self.dispatch.write(pb) {
            Ok(()) => Ok(()),
            Err(_) => {
                let plugged = {
                    let mut st = self.lock();
                    st.outstanding -= 1;
                    st.plugged
                };
                self.cond.notify_all();
                if plugged {
                    Err(Error::IncorrectStateOperation)
                } else {
                    Err(Error::InsufficientResources)
                }
            }
        }
    }

    fn weak_self(&self) -> Weak<PortShared> {
        // The component map owns the only strong reference graph; the
        // weak handle is recovered through it.
        match self.comp.upgrade() {
            Some(comp) => comp.weak_port(self.index),
            None => Weak::new(),
        }
    }

    /// Blocking dequeue used by workers.
    pub(crate) fn pop_buffer(&self) -> Result<PortBuffer> {
        self.dispatch.read()
    }

    // ---- worker back to client ----

    pub(crate) fn buffer_done(&self, mut pb: PortBuffer, expect: Dir) -> Result<()> {
        if self.dir != expect {
            error!(
                "port {}: completion direction mismatch ({:?})",
                self.index, self.dir
            );
            return Err(Error::BadPortIndex);
        }
        if pb.port_index != self.index {
            warn!(
                "buffer of port {} completed through port {}",
                pb.port_index, self.index
            );
        }
        // Re-arm the safety net in case this port's queue is gone.
        pb.spent = false;
        self.returned.write(pb)
    }

    pub(crate) fn enqueue_return(&self, pb: PortBuffer) -> std::result::Result<(), ()> {
        self.returned.try_write(pb).map(|_| ()).map_err(|pb| {
            // Tearing down; silence the safety net for good.
            let mut pb = pb;
            pb.spent = true;
            drop(pb);
        })
    }

    /// Number of submissions waiting for a worker.
    pub(crate) fn pending_buffers(&self) -> usize {
        self.dispatch.len()
    }

    pub(crate) fn outstanding(&self) -> u32 {
        self.lock().outstanding
    }

    // ---- flush machinery ----

    /// Refuse client submissions and wake a worker blocked on
    /// [`pop_buffer`](PortShared::pop_buffer).
    pub(crate) fn plug(&self) {
        self.lock().plugged = true;
        self.dispatch.shutdown(true, true);
    }

    /// Re-admit client submissions (the dispatch queue may keep filling
    /// while workers are parked).
    pub(crate) fn unplug_client(&self) {
        self.lock().plugged = false;
        self.dispatch.abort_shutdown(false, true);
    }

    /// Let workers pop again.
    pub(crate) fn unplug_worker(&self) {
        self.dispatch.abort_shutdown(true, false);
    }

    /// Route everything waiting in the dispatch queue back to the
    /// client, contents untouched.
    pub(crate) fn drain_dispatch(&self) {
        while let Some(pb) = self.dispatch.try_read() {
            if self.returned.write(pb).is_err() {
                break;
            }
        }
    }

    /// Block until every accepted buffer is back with the client.
    pub(crate) fn wait_all_returned(&self) -> Result<()> {
        let mut st = self.lock();
        while st.outstanding > 0 {
            if self.is_broken() {
                return Err(Error::Interrupted);
            }
            st = self.wait(st);
        }
        Ok(())
    }

    pub(crate) fn shutdown(&self) {
        self.dispatch.shutdown(true, true);
        self.returned.shutdown(true, true);
        self.cond.notify_all();
    }

    // ---- return-dispatch thread ----

    /// Deliver one completed buffer to the client.
    fn dispatch_done(&self, mut pb: PortBuffer) {
        let Some(comp) = self.comp.upgrade() else {
            pb.spent = true;
            return;
        };

        let header = unsafe { &mut *pb.header.as_ptr() };
        if header.flags.contains(BufferFlags::EOS) {
            comp.post_event(Event::BufferFlag, self.index, header.flags.bits());
        }

        let result = match self.dir {
            Dir::Input => comp.deliver_empty_done(header),
            Dir::Output => comp.deliver_fill_done(header),
        };

        // Only now is the buffer back in the client's hands.
        pb.spent = true;
        drop(pb);
        {
            let mut st = self.lock();
            st.outstanding = st.outstanding.saturating_sub(1);
        }
        self.cond.notify_all();

        if let Err(e) = result {
            error!("port {}: completion callback failed: {}", self.index, e);
            comp.post_event(Event::Error, e.code(), 0);
        }
    }
}

/// Thread body returning completed buffers to the client, one thread
/// per port.
pub(crate) fn return_thread_main(shared: Arc<PortShared>) {
    trace!("port {} return thread up", shared.index);
    loop {
        let pb = match shared.returned.read() {
            Ok(pb) => pb,
            Err(_) => break,
        };
        shared.dispatch_done(pb);
    }
    trace!("port {} return thread down", shared.index);
}

/// Handle on one port of a component.
///
/// Workers obtain these through [`WorkerControl::port`] and use them to
/// pop submissions and hand buffers back.
///
/// [`WorkerControl::port`]: crate::WorkerControl::port
#[derive(Clone)]
pub struct Port {
    pub(crate) shared: Arc<PortShared>,
}

impl Port {
    pub fn index(&self) -> u32 {
        self.shared.index()
    }

    pub fn dir(&self) -> Dir {
        self.shared.dir()
    }

    pub fn domain(&self) -> Domain {
        self.shared.domain()
    }

    /// Snapshot of the client-visible definition.
    pub fn definition(&self) -> PortDefinition {
        self.shared.definition()
    }

    /// Blocking dequeue of the next client submission.
    ///
    /// Fails with [`Error::Interrupted`] when a flush or teardown begins;
    /// treat that as the poll point and return from the task.
    pub fn pop_buffer(&self) -> Result<PortBuffer> {
        self.shared.pop_buffer()
    }

    /// Return a consumed input buffer towards the client.
    pub fn empty_buffer_done(&self, pb: PortBuffer) -> Result<()> {
        self.shared.buffer_done(pb, Dir::Input)
    }

    /// Return a produced output buffer towards the client.
    pub fn fill_buffer_done(&self, pb: PortBuffer) -> Result<()> {
        self.shared.buffer_done(pb, Dir::Output)
    }

    /// Number of submissions waiting in the dispatch queue.
    pub fn pending_buffers(&self) -> usize {
        self.shared.pending_buffers()
    }

    /// Number of buffers currently inside the component (accepted and
    /// not yet handed back). Zero at any quiescent moment means every
    /// registered buffer is with the client.
    pub fn outstanding_buffers(&self) -> u32 {
        self.shared.outstanding()
    }

    /// True when the registered list holds the full buffer complement.
    pub fn is_populated(&self) -> bool {
        self.shared.is_populated()
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.is_enabled()
    }
}
