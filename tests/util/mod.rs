// Not all helpers are used by all test binaries.
#![allow(dead_code)]

use std::os::raw::c_void;
use std::sync::{Arc, Condvar, Mutex, Once};
use std::time::{Duration, Instant};

use omxil_mf::{
    registry, AudioCoding, AudioDef, BufferHeader, ColorFormat, Command, Component,
    ComponentCallbacks, ComponentConfig, ComponentInfo, DomainDef, Dir, Error, Event,
    FormatDetail, PortConfig, Result, VideoCoding, VideoDef, WorkerControl, WorkerTask,
    VERSION,
};

pub fn init() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = env_logger::try_init();
    });
}

// ---- recording callbacks ----

#[derive(Default, Clone)]
pub struct Recorded {
    pub events: Vec<(Event, u32, u32)>,
    /// App-private labels of EmptyBufferDone calls, in arrival order.
    pub empties: Vec<usize>,
    /// App-private labels and payload copies of FillBufferDone calls.
    pub fills: Vec<(usize, Vec<u8>)>,
}

/// Callback sink recording everything a component reports.
pub struct TestCallbacks {
    state: Mutex<Recorded>,
    cond: Condvar,
}

impl TestCallbacks {
    pub fn new() -> Arc<TestCallbacks> {
        Arc::new(TestCallbacks {
            state: Mutex::new(Recorded::default()),
            cond: Condvar::new(),
        })
    }

    pub fn snapshot(&self) -> Recorded {
        self.state.lock().unwrap().clone()
    }

    fn wait_until<F>(&self, timeout: Duration, pred: F) -> bool
    where
        F: Fn(&Recorded) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        while !pred(&state) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.cond.wait_timeout(state, deadline - now).unwrap();
            state = guard;
        }
        true
    }

    /// Wait for an event matching `pred` and consume it, so repeated
    /// waits need repeated events.
    fn wait_take<F>(&self, timeout: Duration, pred: F) -> bool
    where
        F: Fn(&(Event, u32, u32)) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(ix) = state.events.iter().position(&pred) {
                state.events.remove(ix);
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.cond.wait_timeout(state, deadline - now).unwrap();
            state = guard;
        }
    }

    /// Wait for the completion event of `cmd`.
    pub fn wait_cmd_complete(&self, cmd: Command, timeout: Duration) -> bool {
        self.wait_take(timeout, |(e, d1, d2)| {
            *e == Event::CmdComplete && *d1 == cmd.code() && *d2 == cmd.param()
        })
    }

    /// Wait for an error event carrying `error`'s code.
    pub fn wait_error(&self, error: Error, timeout: Duration) -> bool {
        self.wait_take(timeout, |(e, d1, _)| {
            *e == Event::Error && *d1 == error.code()
        })
    }

    pub fn wait_event(&self, event: Event, data1: u32, timeout: Duration) -> bool {
        self.wait_take(timeout, |(e, d1, _)| *e == event && *d1 == data1)
    }

    pub fn wait_empties(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |rec| rec.empties.len() >= count)
    }

    pub fn wait_fills(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |rec| rec.fills.len() >= count)
    }
}

impl ComponentCallbacks for TestCallbacks {
    fn event(&self, event: Event, data1: u32, data2: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push((event, data1, data2));
        self.cond.notify_all();
        Ok(())
    }

    fn empty_buffer_done(&self, buffer: &mut BufferHeader) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.empties.push(buffer.app_private as usize);
        self.cond.notify_all();
        Ok(())
    }

    fn fill_buffer_done(&self, buffer: &mut BufferHeader) -> Result<()> {
        let payload = unsafe { buffer.payload() }.to_vec();
        let mut state = self.state.lock().unwrap();
        state.fills.push((buffer.app_private as usize, payload));
        self.cond.notify_all();
        Ok(())
    }
}

/// Convenience: send a state transition and wait for its completion.
pub fn transition(
    comp: &Component,
    cbs: &TestCallbacks,
    state: omxil_mf::State,
    timeout: Duration,
) {
    comp.send_command(Command::StateSet(state)).unwrap();
    assert!(
        cbs.wait_cmd_complete(Command::StateSet(state), timeout),
        "no completion for transition to {:?}",
        state
    );
    assert_eq!(comp.state(), state);
}

pub fn app(label: usize) -> *mut c_void {
    label as *mut c_void
}

// ---- demo components ----
//
// Test stand-ins for the plugin set: binary readers, a null renderer
// and a copy filter, registered through the same registry surface a
// plugin entry function would use.

pub const AUDIO_READER: &str = "OMX.MF.audio_reader.binary";
pub const AUDIO_READER_ROLE: &str = "audio_reader.binary";
pub const VIDEO_READER: &str = "OMX.MF.video_reader.binary";
pub const VIDEO_READER_ROLE: &str = "video_reader.binary";

pub const RENDERER: &str = "OMX.MF.renderer.null";
pub const RENDERER_AUDIO_ALIAS: &str = "OMX.MF.audio.renderer.null";
pub const RENDERER_VIDEO_ALIAS: &str = "OMX.MF.video.renderer.null";
pub const RENDERER_AUDIO_ROLE: &str = "audio_renderer.null";
pub const RENDERER_VIDEO_ROLE: &str = "video_renderer.null";

pub const FILTER: &str = "OMX.MF.filter.copy";
pub const FILTER_ROLE: &str = "video_filter.copy";

pub const FILTER_IN_PORT: u32 = 0;
pub const FILTER_OUT_PORT: u32 = 1;
pub const FILTER_IN_SIZE: u32 = 4096;
pub const FILTER_OUT_SIZE: u32 = 8192;

/// Register every demo component once per process.
pub fn register_components() {
    static REGISTER: Once = Once::new();

    REGISTER.call_once(|| {
        let reg = |name, constructor| {
            registry::register_component(
                name,
                ComponentInfo {
                    version: VERSION,
                    constructor,
                },
            )
            .unwrap();
        };

        reg(AUDIO_READER, new_audio_reader as fn(&str) -> Result<Component>);
        registry::register_role(AUDIO_READER, AUDIO_READER_ROLE).unwrap();

        reg(VIDEO_READER, new_video_reader);
        registry::register_role(VIDEO_READER, VIDEO_READER_ROLE).unwrap();

        reg(RENDERER, new_renderer_null);
        registry::register_alias(RENDERER, RENDERER_AUDIO_ALIAS).unwrap();
        registry::register_alias(RENDERER, RENDERER_VIDEO_ALIAS).unwrap();
        registry::register_role(RENDERER, RENDERER_AUDIO_ROLE).unwrap();
        registry::register_role(RENDERER, RENDERER_VIDEO_ROLE).unwrap();

        reg(FILTER, new_filter_copy);
        registry::register_role(FILTER, FILTER_ROLE).unwrap();
    });
}

/// Emits zero-filled frames on its single output port.
struct ZeroReadTask;

impl WorkerTask for ZeroReadTask {
    fn name(&self) -> &str {
        "read-bin"
    }

    fn run(&mut self, ctl: &WorkerControl<'_>) -> Result<()> {
        let out = ctl.port(0)?;
        let mut stamp = 0i64;
        while ctl.should_continue() {
            let mut pb = match out.pop_buffer() {
                Ok(pb) => pb,
                Err(Error::Interrupted) => break,
                Err(e) => return Err(e),
            };
            let zeros = vec![0u8; pb.remain()];
            pb.write_array(&zeros);
            pb.header_mut().timestamp = stamp;
            stamp += 16_000;
            out.fill_buffer_done(pb)?;
        }
        Ok(())
    }
}

/// Consumes and discards everything arriving on its input port.
struct NullRenderTask;

impl WorkerTask for NullRenderTask {
    fn name(&self) -> &str {
        "rend-null"
    }

    fn run(&mut self, ctl: &WorkerControl<'_>) -> Result<()> {
        let inp = ctl.port(0)?;
        let mut sink = vec![0u8; 64 * 1024];
        while ctl.should_continue() {
            let mut pb = match inp.pop_buffer() {
                Ok(pb) => pb,
                Err(Error::Interrupted) => break,
                Err(e) => return Err(e),
            };
            while pb.remain() > 0 {
                pb.read_array(&mut sink);
            }
            inp.empty_buffer_done(pb)?;
        }
        Ok(())
    }
}

/// Copies input payloads to output buffers, flags and timestamps
/// included.
struct CopyTask;

impl WorkerTask for CopyTask {
    fn name(&self) -> &str {
        "flt-copy"
    }

    fn run(&mut self, ctl: &WorkerControl<'_>) -> Result<()> {
        let inp = ctl.port(FILTER_IN_PORT)?;
        let out = ctl.port(FILTER_OUT_PORT)?;
        while ctl.should_continue() {
            let mut src = match inp.pop_buffer() {
                Ok(pb) => pb,
                Err(Error::Interrupted) => break,
                Err(e) => return Err(e),
            };
            let mut dst = match out.pop_buffer() {
                Ok(pb) => pb,
                Err(Error::Interrupted) => {
                    // Flushing: the held input goes back unprocessed.
                    src.header_mut().filled_len = 0;
                    inp.empty_buffer_done(src)?;
                    break;
                }
                Err(e) => return Err(e),
            };

            let mut data = vec![0u8; src.remain()];
            let n = src.read_array(&mut data);
            dst.write_array(&data[..n]);

            let (flags, stamp) = {
                let h = src.header();
                (h.flags, h.timestamp)
            };
            let h = dst.header_mut();
            h.flags = flags;
            h.timestamp = stamp;

            inp.empty_buffer_done(src)?;
            out.fill_buffer_done(dst)?;
        }
        Ok(())
    }
}

fn new_audio_reader(name: &str) -> Result<Component> {
    let mut out = PortConfig::new(
        0,
        Dir::Output,
        DomainDef::Audio(AudioDef {
            mime: "audio/x-raw".to_owned(),
            ..AudioDef::default()
        }),
    );
    out.buffer_count_actual = 1;
    out.buffer_size = 4096;
    out.formats = vec![FormatDetail::Audio {
        encoding: AudioCoding::Pcm,
    }];
    out.default_format = Some(0);

    Component::new(
        ComponentConfig::new(name)
            .with_port(out)
            .with_worker("read-bin", Box::new(ZeroReadTask)),
    )
}

fn new_video_reader(name: &str) -> Result<Component> {
    let mut out = PortConfig::new(
        0,
        Dir::Output,
        DomainDef::Video(VideoDef {
            mime: "video/x-raw".to_owned(),
            frame_width: 640,
            frame_height: 480,
            ..VideoDef::default()
        }),
    );
    out.buffer_count_actual = 1;
    out.buffer_size = 8192;
    out.formats = vec![FormatDetail::Video {
        compression: VideoCoding::Unused,
        color: ColorFormat::Yuv420Planar,
        framerate: 30 << 16,
    }];
    out.default_format = Some(0);

    Component::new(
        ComponentConfig::new(name)
            .with_port(out)
            .with_worker("read-bin", Box::new(ZeroReadTask)),
    )
}

fn new_renderer_null(name: &str) -> Result<Component> {
    let mut inp = PortConfig::new(
        0,
        Dir::Input,
        DomainDef::Video(VideoDef {
            mime: "video/x-raw".to_owned(),
            ..VideoDef::default()
        }),
    );
    inp.buffer_count_actual = 1;
    inp.buffer_size = 4096;
    inp.formats = vec![FormatDetail::Video {
        compression: VideoCoding::Unused,
        color: ColorFormat::Yuv420Planar,
        framerate: 30 << 16,
    }];
    inp.default_format = Some(0);

    Component::new(
        ComponentConfig::new(name)
            .with_port(inp)
            .with_worker("rend-null", Box::new(NullRenderTask)),
    )
}

fn new_filter_copy(name: &str) -> Result<Component> {
    let mut inp = PortConfig::new(
        FILTER_IN_PORT,
        Dir::Input,
        DomainDef::Video(VideoDef {
            mime: "video/x-h264".to_owned(),
            ..VideoDef::default()
        }),
    );
    inp.buffer_count_actual = 1;
    inp.buffer_size = FILTER_IN_SIZE;
    inp.buffer_alignment = 64;
    inp.formats = vec![FormatDetail::Video {
        compression: VideoCoding::Avc,
        color: ColorFormat::Unused,
        framerate: 0,
    }];
    inp.default_format = Some(0);

    let mut out = PortConfig::new(
        FILTER_OUT_PORT,
        Dir::Output,
        DomainDef::Video(VideoDef {
            mime: "video/x-raw".to_owned(),
            frame_width: 640,
            frame_height: 480,
            ..VideoDef::default()
        }),
    );
    out.buffer_count_actual = 1;
    out.buffer_size = FILTER_OUT_SIZE;
    out.buffer_alignment = 64;
    out.formats = vec![
        FormatDetail::Video {
            compression: VideoCoding::Unused,
            color: ColorFormat::Yuv420Planar,
            framerate: 30 << 16,
        },
        FormatDetail::Video {
            compression: VideoCoding::Unused,
            color: ColorFormat::Yuv420SemiPlanar,
            framerate: 30 << 16,
        },
    ];
    out.default_format = Some(0);

    Component::new(
        ComponentConfig::new(name)
            .with_port(inp)
            .with_port(out)
            .with_worker("flt-copy", Box::new(CopyTask)),
    )
}
