//! Host-side runtime for OpenMAX IL 1.1.2 media components.
//!
//! The crate hosts pluggable media processing components (decoders,
//! encoders, filters, sources, sinks) and mediates buffer traffic
//! between them and a client application. Four pieces carry the weight:
//!
//! * [`Component`] — the object behind every handle. It owns ports and
//!   workers and runs the lifecycle state machine, driven by a
//!   per-component dispatcher thread so [`Component::send_command`]
//!   never blocks on the work itself.
//! * [`Port`] — a directional buffer endpoint. Each port pairs a
//!   bounded dispatch queue (client to worker) with a bounded return
//!   queue (worker to client) and a return-dispatch thread that fires
//!   the completion callbacks.
//! * [`WorkerTask`] — the processing loop a concrete component
//!   supplies. The runtime starts workers on the transition to
//!   Executing and coordinates flush/restart handshakes so draining a
//!   pipeline never loses a buffer.
//! * [`registry`] — the process-wide name table. `OMX_Init` loads the
//!   shared libraries listed in `$HOME/.omxilmfrc`; each registers its
//!   components, aliases and roles.
//!
//! The raw C surface lives in [`capi`]; Rust clients use the typed API
//! directly:
//!
//! ```no_run
//! use std::time::Duration;
//! use omxil_mf::{registry, Command, State};
//!
//! # fn run() -> omxil_mf::Result<()> {
//! let comp = registry::global().make_component("OMX.MF.filter.copy")?;
//! comp.send_command(Command::StateSet(State::Idle))?;
//! // ... register buffers, wait for the completion event ...
//! comp.wait_for_state(State::Idle, Duration::from_secs(1))?;
//! # Ok(())
//! # }
//! ```

pub mod capi;
pub mod registry;

mod buffer;
mod component;
mod error;
mod format;
mod params;
mod port;
mod queue;
mod types;
mod worker;

pub use buffer::{BufferHeader, PortBuffer};
pub use component::{Component, ComponentCallbacks, ComponentConfig};
pub use error::{Error, Result};
pub use format::{
    AudioCoding, AudioDef, ColorFormat, DomainDef, FormatDetail, ImageCoding, ImageDef,
    OtherDef, OtherFormat, VideoCoding, VideoDef,
};
pub use params::{PortCountParam, PortDefinition, PortFormatParam, StructHeader};
pub use port::{Port, PortConfig};
pub use queue::BoundedQueue;
pub use registry::{ComponentInfo, ConstructorFn};
pub use types::{
    BufferFlags, Command, Dir, Domain, Event, State, Version, ALL_PORTS, VERSION,
};
pub use worker::{WorkerControl, WorkerTask};
