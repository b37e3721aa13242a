//! The flat OpenMAX IL C surface.
//!
//! Everything here is a thin translation layer: the exported entry
//! points and the function-pointer table of [`ComponentType`] recover
//! the typed [`Component`] from the handle's private field and dispatch.
//! The handle itself is one heap allocation holding the C struct and the
//! typed component side by side; both are created by `OMX_GetHandle` and
//! destroyed together by `OMX_FreeHandle`.

#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

use std::os::raw::{c_char, c_void};
use std::ptr;
use std::sync::Arc;

use log::{error, trace};

use crate::buffer::BufferHeader;
use crate::component::{Component, ComponentCallbacks};
use crate::error::{Error, Result};
use crate::format::{
    AudioCoding, ColorFormat, DomainDef, FormatDetail, ImageCoding, OtherFormat, VideoCoding,
};
use crate::params::{PortCountParam, PortFormatParam, StructHeader};
use crate::registry::{self, ComponentInfo};
use crate::types::{Command, Domain, Event, Version, VERSION};

/// Longest component, role or alias name on the wire, terminator
/// included.
pub const MAX_STRING_NAME: usize = 128;

// Parameter indices recognized by the base component.
pub const INDEX_PARAM_AUDIO_INIT: u32 = 0x0100_0002;
pub const INDEX_PARAM_IMAGE_INIT: u32 = 0x0100_0003;
pub const INDEX_PARAM_VIDEO_INIT: u32 = 0x0100_0004;
pub const INDEX_PARAM_OTHER_INIT: u32 = 0x0100_0005;
pub const INDEX_PARAM_PORT_DEFINITION: u32 = 0x0200_0001;
pub const INDEX_PARAM_BUFFER_SUPPLIER: u32 = 0x0200_0002;
pub const INDEX_PARAM_AUDIO_PORT_FORMAT: u32 = 0x0400_0001;
pub const INDEX_PARAM_IMAGE_PORT_FORMAT: u32 = 0x0500_0001;
pub const INDEX_PARAM_VIDEO_PORT_FORMAT: u32 = 0x0600_0001;
pub const INDEX_PARAM_OTHER_PORT_FORMAT: u32 = 0x0800_0001;

/// `OMX_ErrorNone`.
pub const ERROR_NONE: u32 = 0;

fn code_of(result: Result<()>) -> u32 {
    match result {
        Ok(()) => ERROR_NONE,
        Err(e) => e.code(),
    }
}

/// Raw callback table a C client installs.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CallbackFns {
    pub event_handler: Option<
        unsafe extern "C" fn(
            component: *mut ComponentType,
            app_data: *mut c_void,
            event: u32,
            data1: u32,
            data2: u32,
            event_data: *mut c_void,
        ) -> u32,
    >,
    pub empty_buffer_done: Option<
        unsafe extern "C" fn(
            component: *mut ComponentType,
            app_data: *mut c_void,
            buffer: *mut BufferHeader,
        ) -> u32,
    >,
    pub fill_buffer_done: Option<
        unsafe extern "C" fn(
            component: *mut ComponentType,
            app_data: *mut c_void,
            buffer: *mut BufferHeader,
        ) -> u32,
    >,
}

/// The wire component struct: a version stamp, two private pointers and
/// the function table the client calls through.
#[repr(C)]
pub struct ComponentType {
    pub size: u32,
    pub version: Version,
    pub component_private: *mut c_void,
    pub application_private: *mut c_void,
    pub get_component_version: Option<
        unsafe extern "C" fn(
            *mut ComponentType,
            *mut c_char,
            *mut Version,
            *mut Version,
            *mut c_void,
        ) -> u32,
    >,
    pub send_command:
        Option<unsafe extern "C" fn(*mut ComponentType, u32, u32, *mut c_void) -> u32>,
    pub get_parameter:
        Option<unsafe extern "C" fn(*mut ComponentType, u32, *mut c_void) -> u32>,
    pub set_parameter:
        Option<unsafe extern "C" fn(*mut ComponentType, u32, *mut c_void) -> u32>,
    pub get_config: Option<unsafe extern "C" fn(*mut ComponentType, u32, *mut c_void) -> u32>,
    pub set_config: Option<unsafe extern "C" fn(*mut ComponentType, u32, *mut c_void) -> u32>,
    pub get_extension_index:
        Option<unsafe extern "C" fn(*mut ComponentType, *const c_char, *mut u32) -> u32>,
    pub get_state: Option<unsafe extern "C" fn(*mut ComponentType, *mut u32) -> u32>,
    pub component_tunnel_request: Option<
        unsafe extern "C" fn(*mut ComponentType, u32, *mut c_void, u32, *mut c_void) -> u32,
    >,
    pub use_buffer: Option<
        unsafe extern "C" fn(
            *mut ComponentType,
            *mut *mut BufferHeader,
            u32,
            *mut c_void,
            u32,
            *mut u8,
        ) -> u32,
    >,
    pub allocate_buffer: Option<
        unsafe extern "C" fn(
            *mut ComponentType,
            *mut *mut BufferHeader,
            u32,
            *mut c_void,
            u32,
        ) -> u32,
    >,
    pub free_buffer:
        Option<unsafe extern "C" fn(*mut ComponentType, u32, *mut BufferHeader) -> u32>,
    pub empty_this_buffer:
        Option<unsafe extern "C" fn(*mut ComponentType, *mut BufferHeader) -> u32>,
    pub fill_this_buffer:
        Option<unsafe extern "C" fn(*mut ComponentType, *mut BufferHeader) -> u32>,
    pub set_callbacks:
        Option<unsafe extern "C" fn(*mut ComponentType, *const CallbackFns, *mut c_void) -> u32>,
    pub component_deinit: Option<unsafe extern "C" fn(*mut ComponentType) -> u32>,
    pub use_egl_image: Option<
        unsafe extern "C" fn(
            *mut ComponentType,
            *mut *mut BufferHeader,
            u32,
            *mut c_void,
            *mut c_void,
        ) -> u32,
    >,
    pub component_role_enum:
        Option<unsafe extern "C" fn(*mut ComponentType, *mut u8, u32) -> u32>,
}

impl ComponentType {
    fn populated() -> ComponentType {
        ComponentType {
            size: std::mem::size_of::<ComponentType>() as u32,
            version: VERSION,
            component_private: ptr::null_mut(),
            application_private: ptr::null_mut(),
            get_component_version: Some(get_component_version),
            send_command: Some(send_command),
            get_parameter: Some(get_parameter),
            set_parameter: Some(set_parameter),
            get_config: Some(get_config),
            set_config: Some(set_config),
            get_extension_index: Some(get_extension_index),
            get_state: Some(get_state),
            component_tunnel_request: Some(component_tunnel_request),
            use_buffer: Some(use_buffer),
            allocate_buffer: Some(allocate_buffer),
            free_buffer: Some(free_buffer),
            empty_this_buffer: Some(empty_this_buffer),
            fill_this_buffer: Some(fill_this_buffer),
            set_callbacks: Some(set_callbacks),
            component_deinit: Some(component_deinit),
            use_egl_image: Some(use_egl_image),
            component_role_enum: Some(component_role_enum),
        }
    }
}

/// Handle allocation: the C struct and the typed component live and die
/// together; the handle pointer is the address of `c`.
#[repr(C)]
struct HandleBox {
    c: ComponentType,
    component: Component,
}

/// Adapter exposing a raw callback table as [`ComponentCallbacks`].
struct CallbackAdapter {
    fns: CallbackFns,
    handle: *mut ComponentType,
    app_data: *mut c_void,
}

// The handle stays valid until OMX_FreeHandle, which tears the
// component (and with it these callbacks) down first.
unsafe impl Send for CallbackAdapter {}
unsafe impl Sync for CallbackAdapter {}

fn check_cb(code: u32) -> Result<()> {
    if code == ERROR_NONE {
        Ok(())
    } else {
        Err(Error::Undefined)
    }
}

impl ComponentCallbacks for CallbackAdapter {
    fn event(&self, event: Event, data1: u32, data2: u32) -> Result<()> {
        let Some(f) = self.fns.event_handler else {
            return Ok(());
        };
        check_cb(unsafe {
            f(
                self.handle,
                self.app_data,
                event as u32,
                data1,
                data2,
                ptr::null_mut(),
            )
        })
    }

    fn empty_buffer_done(&self, buffer: &mut BufferHeader) -> Result<()> {
        let Some(f) = self.fns.empty_buffer_done else {
            return Ok(());
        };
        check_cb(unsafe { f(self.handle, self.app_data, buffer) })
    }

    fn fill_buffer_done(&self, buffer: &mut BufferHeader) -> Result<()> {
        let Some(f) = self.fns.fill_buffer_done else {
            return Ok(());
        };
        check_cb(unsafe { f(self.handle, self.app_data, buffer) })
    }
}

unsafe fn component_from<'a>(handle: *mut ComponentType) -> Option<&'a Component> {
    let c = handle.as_ref()?;
    (c.component_private as *const Component).as_ref()
}

unsafe fn copy_name(dst: *mut c_char, capacity: usize, name: &str) -> Result<()> {
    let bytes = name.as_bytes();
    if bytes.len() + 1 > capacity {
        return Err(Error::BadParameter);
    }
    ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, dst, bytes.len());
    *dst.add(bytes.len()) = 0;
    Ok(())
}

// ---- core entry points ----

/// Initialize the library; reference counted.
#[no_mangle]
pub extern "C" fn OMX_Init() -> u32 {
    code_of(registry::global().init())
}

/// Undo one `OMX_Init`; the last one unloads the plugin libraries.
#[no_mangle]
pub extern "C" fn OMX_Deinit() -> u32 {
    code_of(registry::global().deinit())
}

/// Enumerate canonical component names.
#[no_mangle]
pub unsafe extern "C" fn OMX_ComponentNameEnum(
    name: *mut c_char,
    name_length: u32,
    index: u32,
) -> u32 {
    if name.is_null() {
        return Error::BadParameter.code();
    }
    match registry::global().name_at(index) {
        Ok(found) => code_of(copy_name(name, name_length as usize, &found)),
        Err(e) => e.code(),
    }
}

/// Instantiate a component and hand back its wire handle.
#[no_mangle]
pub unsafe extern "C" fn OMX_GetHandle(
    handle: *mut *mut ComponentType,
    name: *const c_char,
    app_data: *mut c_void,
    callbacks: *const CallbackFns,
) -> u32 {
    if handle.is_null() || name.is_null() {
        return Error::BadParameter.code();
    }
    let name = match std::ffi::CStr::from_ptr(name).to_str() {
        Ok(name) => name,
        Err(_) => return Error::InvalidComponentName.code(),
    };
    let component = match registry::global().make_component(name) {
        Ok(component) => component,
        Err(e) => {
            error!("OMX_GetHandle('{}') failed: {}", name, e);
            return e.code();
        }
    };

    let mut boxed = Box::new(HandleBox {
        c: ComponentType::populated(),
        component,
    });
    boxed.c.application_private = app_data;
    let raw = Box::into_raw(boxed);
    (*raw).c.component_private = &(*raw).component as *const Component as *mut c_void;
    if let Some(fns) = callbacks.as_ref() {
        (*raw).component.set_callbacks(Arc::new(CallbackAdapter {
            fns: *fns,
            handle: raw as *mut ComponentType,
            app_data,
        }));
    }
    *handle = raw as *mut ComponentType;
    trace!("OMX_GetHandle('{}') -> {:p}", name, raw);
    ERROR_NONE
}

/// Tear a component down and release its handle.
#[no_mangle]
pub unsafe extern "C" fn OMX_FreeHandle(handle: *mut ComponentType) -> u32 {
    if handle.is_null() {
        return Error::InvalidComponent.code();
    }
    let boxed = Box::from_raw(handle as *mut HandleBox);
    let code = code_of(boxed.component.deinit());
    drop(boxed);
    code
}

/// Tunneling is out of scope; the entry point exists and says so.
#[no_mangle]
pub unsafe extern "C" fn OMX_SetupTunnel(
    output: *mut ComponentType,
    _output_port: u32,
    input: *mut ComponentType,
    _input_port: u32,
) -> u32 {
    if output.is_null() || input.is_null() {
        return Error::InvalidComponent.code();
    }
    Error::NotImplemented.code()
}

/// Content pipes are out of scope.
#[no_mangle]
pub unsafe extern "C" fn OMX_GetContentPipe(pipe: *mut *mut c_void, _uri: *const c_char) -> u32 {
    if pipe.is_null() {
        return Error::BadParameter.code();
    }
    Error::NotImplemented.code()
}

/// Query the roles of a component.
///
/// With `roles` null only the count is written; otherwise up to `*num`
/// role names are copied and `*num` is updated to the number available
/// (`InsufficientResources` when the caller's capacity is too small).
#[no_mangle]
pub unsafe extern "C" fn OMX_GetRolesOfComponent(
    name: *const c_char,
    num: *mut u32,
    roles: *mut *mut u8,
) -> u32 {
    if name.is_null() || num.is_null() {
        return Error::BadParameter.code();
    }
    let name = match std::ffi::CStr::from_ptr(name).to_str() {
        Ok(name) => name,
        Err(_) => return Error::InvalidComponentName.code(),
    };
    let found = match registry::global().roles_of(name) {
        Ok(found) => found,
        Err(e) => return e.code(),
    };
    if roles.is_null() {
        *num = found.len() as u32;
        return ERROR_NONE;
    }
    let capacity = *num as usize;
    *num = found.len() as u32;
    if capacity < found.len() {
        return Error::InsufficientResources.code();
    }
    for (i, role) in found.iter().enumerate() {
        let dst = *roles.add(i);
        if dst.is_null() {
            return Error::BadParameter.code();
        }
        if let Err(e) = copy_name(dst as *mut c_char, MAX_STRING_NAME, role) {
            return e.code();
        }
    }
    ERROR_NONE
}

/// Query the components advertising a role; same calling convention as
/// [`OMX_GetRolesOfComponent`].
#[no_mangle]
pub unsafe extern "C" fn OMX_GetComponentsOfRole(
    role: *const c_char,
    num: *mut u32,
    names: *mut *mut u8,
) -> u32 {
    if role.is_null() || num.is_null() {
        return Error::BadParameter.code();
    }
    let role = match std::ffi::CStr::from_ptr(role).to_str() {
        Ok(role) => role,
        Err(_) => return Error::BadParameter.code(),
    };
    let found = registry::global().components_of_role(role);
    if names.is_null() {
        *num = found.len() as u32;
        return ERROR_NONE;
    }
    let capacity = *num as usize;
    *num = found.len() as u32;
    if capacity < found.len() {
        return Error::InsufficientResources.code();
    }
    for (i, name) in found.iter().enumerate() {
        let dst = *names.add(i);
        if dst.is_null() {
            return Error::BadParameter.code();
        }
        if let Err(e) = copy_name(dst as *mut c_char, MAX_STRING_NAME, name) {
            return e.code();
        }
    }
    ERROR_NONE
}

// ---- plugin registration surface ----

/// Register a component; called by a plugin's entry function.
///
/// The info block carries a typed constructor: plugin libraries are
/// Rust dylibs built against this crate, not foreign C objects.
#[no_mangle]
#[allow(improper_ctypes_definitions)]
pub unsafe extern "C" fn OMX_MF_RegisterComponent(
    name: *const c_char,
    info: *const ComponentInfo,
) -> u32 {
    if name.is_null() || info.is_null() {
        return Error::BadParameter.code();
    }
    let Ok(name) = std::ffi::CStr::from_ptr(name).to_str() else {
        return Error::InvalidComponentName.code();
    };
    code_of(registry::global().register_component(name, *info))
}

/// Register an alias; called by a plugin's entry function.
#[no_mangle]
pub unsafe extern "C" fn OMX_MF_RegisterComponentAlias(
    name: *const c_char,
    alias: *const c_char,
) -> u32 {
    if name.is_null() || alias.is_null() {
        return Error::BadParameter.code();
    }
    let (Ok(name), Ok(alias)) = (
        std::ffi::CStr::from_ptr(name).to_str(),
        std::ffi::CStr::from_ptr(alias).to_str(),
    ) else {
        return Error::InvalidComponentName.code();
    };
    code_of(registry::global().register_alias(name, alias))
}

/// Register a role; called by a plugin's entry function.
#[no_mangle]
pub unsafe extern "C" fn OMX_MF_RegisterComponentRole(
    name: *const c_char,
    role: *const c_char,
) -> u32 {
    if name.is_null() || role.is_null() {
        return Error::BadParameter.code();
    }
    let (Ok(name), Ok(role)) = (
        std::ffi::CStr::from_ptr(name).to_str(),
        std::ffi::CStr::from_ptr(role).to_str(),
    ) else {
        return Error::InvalidComponentName.code();
    };
    code_of(registry::global().register_role(name, role))
}

// ---- component trampolines ----

unsafe extern "C" fn get_component_version(
    handle: *mut ComponentType,
    name: *mut c_char,
    component_version: *mut Version,
    spec_version: *mut Version,
    uuid: *mut c_void,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    let (comp_name, comp_ver, spec_ver) = comp.version();
    if !name.is_null() {
        if let Err(e) = copy_name(name, MAX_STRING_NAME, comp_name) {
            return e.code();
        }
    }
    if !component_version.is_null() {
        *component_version = comp_ver;
    }
    if !spec_version.is_null() {
        *spec_version = spec_ver;
    }
    if !uuid.is_null() {
        ptr::write_bytes(uuid as *mut u8, 0, MAX_STRING_NAME);
    }
    ERROR_NONE
}

unsafe extern "C" fn send_command(
    handle: *mut ComponentType,
    cmd: u32,
    param: u32,
    _cmd_data: *mut c_void,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    let Some(cmd) = Command::from_raw(cmd, param) else {
        return Error::UnsupportedIndex.code();
    };
    code_of(comp.send_command(cmd))
}

/// Raw port-format parameter; the tail layout depends on the index it
/// is used with.
#[repr(C)]
struct RawPortFormat {
    header: StructHeader,
    port_index: u32,
    index: u32,
    a: u32,
    b: u32,
    c: u32,
}

fn raw_from_format(raw: &mut RawPortFormat, format: FormatDetail) {
    raw.a = 0;
    raw.b = 0;
    raw.c = 0;
    match format {
        FormatDetail::Audio { encoding } => {
            raw.a = encoding as u32;
        }
        FormatDetail::Video {
            compression,
            color,
            framerate,
        } => {
            raw.a = compression as u32;
            raw.b = color as u32;
            raw.c = framerate;
        }
        FormatDetail::Image { compression, color } => {
            raw.a = compression as u32;
            raw.b = color as u32;
        }
        FormatDetail::Other { format } => {
            raw.a = format as u32;
        }
    }
}

fn format_from_raw(index: u32, raw: &RawPortFormat) -> Result<FormatDetail> {
    match index {
        INDEX_PARAM_AUDIO_PORT_FORMAT => Ok(FormatDetail::Audio {
            encoding: AudioCoding::from_raw(raw.a).ok_or(Error::UnsupportedSetting)?,
        }),
        INDEX_PARAM_VIDEO_PORT_FORMAT => Ok(FormatDetail::Video {
            compression: VideoCoding::from_raw(raw.a).ok_or(Error::UnsupportedSetting)?,
            color: ColorFormat::from_raw(raw.b).ok_or(Error::UnsupportedSetting)?,
            framerate: raw.c,
        }),
        INDEX_PARAM_IMAGE_PORT_FORMAT => Ok(FormatDetail::Image {
            compression: ImageCoding::from_raw(raw.a).ok_or(Error::UnsupportedSetting)?,
            color: ColorFormat::from_raw(raw.b).ok_or(Error::UnsupportedSetting)?,
        }),
        INDEX_PARAM_OTHER_PORT_FORMAT => Ok(FormatDetail::Other {
            format: OtherFormat::from_raw(raw.a).ok_or(Error::UnsupportedSetting)?,
        }),
        _ => Err(Error::UnsupportedIndex),
    }
}

/// Raw port definition. The per-domain block is reduced to its scalar
/// fields; string and native-handle members are not marshalled.
#[repr(C)]
struct RawPortDefinition {
    header: StructHeader,
    port_index: u32,
    dir: u32,
    buffer_count_actual: u32,
    buffer_count_min: u32,
    buffer_size: u32,
    enabled: u32,
    populated: u32,
    domain: u32,
    frame_width: u32,
    frame_height: u32,
    stride: i32,
    slice_height: u32,
    bitrate: u32,
    framerate: u32,
    compression: u32,
    color: u32,
    other_format: u32,
    buffers_contiguous: u32,
    buffer_alignment: u32,
}

unsafe extern "C" fn get_parameter(
    handle: *mut ComponentType,
    index: u32,
    param: *mut c_void,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    if param.is_null() {
        return Error::BadParameter.code();
    }
    match index {
        INDEX_PARAM_AUDIO_INIT
        | INDEX_PARAM_VIDEO_INIT
        | INDEX_PARAM_IMAGE_INIT
        | INDEX_PARAM_OTHER_INIT => {
            let param = &mut *(param as *mut PortCountParam);
            let domain = match index {
                INDEX_PARAM_AUDIO_INIT => Domain::Audio,
                INDEX_PARAM_VIDEO_INIT => Domain::Video,
                INDEX_PARAM_IMAGE_INIT => Domain::Image,
                _ => Domain::Other,
            };
            code_of(comp.port_counts(domain, param))
        }
        INDEX_PARAM_PORT_DEFINITION => {
            let raw = &mut *(param as *mut RawPortDefinition);
            if let Err(e) = raw.header.check::<RawPortDefinition>() {
                return e.code();
            }
            let port = match comp.port(raw.port_index) {
                Ok(port) => port,
                Err(e) => return e.code(),
            };
            let def = port.definition();
            raw.dir = def.dir as u32;
            raw.buffer_count_actual = def.buffer_count_actual;
            raw.buffer_count_min = def.buffer_count_min;
            raw.buffer_size = def.buffer_size;
            raw.enabled = def.enabled as u32;
            raw.populated = def.populated as u32;
            raw.domain = def.domain as u32;
            match &def.contents {
                DomainDef::Video(v) => {
                    raw.frame_width = v.frame_width;
                    raw.frame_height = v.frame_height;
                    raw.stride = v.stride;
                    raw.slice_height = v.slice_height;
                    raw.bitrate = v.bitrate;
                }
                DomainDef::Image(v) => {
                    raw.frame_width = v.frame_width;
                    raw.frame_height = v.frame_height;
                    raw.stride = v.stride;
                    raw.slice_height = v.slice_height;
                }
                DomainDef::Audio(_) | DomainDef::Other(_) => {}
            }
            match def.format {
                Some(FormatDetail::Video {
                    compression,
                    color,
                    framerate,
                }) => {
                    raw.compression = compression as u32;
                    raw.color = color as u32;
                    raw.framerate = framerate;
                }
                Some(FormatDetail::Image { compression, color }) => {
                    raw.compression = compression as u32;
                    raw.color = color as u32;
                }
                Some(FormatDetail::Audio { encoding }) => {
                    raw.compression = encoding as u32;
                }
                Some(FormatDetail::Other { format }) => {
                    raw.other_format = format as u32;
                }
                None => {}
            }
            raw.buffers_contiguous = def.buffers_contiguous as u32;
            raw.buffer_alignment = def.buffer_alignment;
            ERROR_NONE
        }
        INDEX_PARAM_AUDIO_PORT_FORMAT
        | INDEX_PARAM_VIDEO_PORT_FORMAT
        | INDEX_PARAM_IMAGE_PORT_FORMAT
        | INDEX_PARAM_OTHER_PORT_FORMAT => {
            let raw = &mut *(param as *mut RawPortFormat);
            if let Err(e) = raw.header.check::<RawPortFormat>() {
                return e.code();
            }
            let mut typed = PortFormatParam::query(raw.port_index, raw.index);
            if let Err(e) = comp.port_format(&mut typed) {
                return e.code();
            }
            match typed.format {
                Some(format) => {
                    raw_from_format(raw, format);
                    ERROR_NONE
                }
                None => Error::Undefined.code(),
            }
        }
        INDEX_PARAM_BUFFER_SUPPLIER => Error::NotImplemented.code(),
        _ => Error::UnsupportedIndex.code(),
    }
}

unsafe extern "C" fn set_parameter(
    handle: *mut ComponentType,
    index: u32,
    param: *mut c_void,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    if param.is_null() {
        return Error::BadParameter.code();
    }
    match index {
        INDEX_PARAM_PORT_DEFINITION => {
            let raw = &*(param as *const RawPortDefinition);
            if let Err(e) = raw.header.check::<RawPortDefinition>() {
                return e.code();
            }
            let port = match comp.port(raw.port_index) {
                Ok(port) => port,
                Err(e) => return e.code(),
            };
            // Only the actual buffer count is client-writable.
            code_of(port.shared.set_buffer_count_actual(raw.buffer_count_actual))
        }
        INDEX_PARAM_AUDIO_PORT_FORMAT
        | INDEX_PARAM_VIDEO_PORT_FORMAT
        | INDEX_PARAM_IMAGE_PORT_FORMAT
        | INDEX_PARAM_OTHER_PORT_FORMAT => {
            let raw = &*(param as *const RawPortFormat);
            if let Err(e) = raw.header.check::<RawPortFormat>() {
                return e.code();
            }
            let format = match format_from_raw(index, raw) {
                Ok(format) => format,
                Err(e) => return e.code(),
            };
            let mut typed = PortFormatParam::select(raw.port_index, format);
            typed.index = raw.index;
            code_of(comp.set_port_format(&typed))
        }
        INDEX_PARAM_BUFFER_SUPPLIER => Error::NotImplemented.code(),
        INDEX_PARAM_AUDIO_INIT
        | INDEX_PARAM_VIDEO_INIT
        | INDEX_PARAM_IMAGE_INIT
        | INDEX_PARAM_OTHER_INIT => Error::UnsupportedIndex.code(),
        _ => Error::UnsupportedIndex.code(),
    }
}

unsafe extern "C" fn get_config(
    handle: *mut ComponentType,
    index: u32,
    _config: *mut c_void,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    code_of(comp.config(index))
}

unsafe extern "C" fn set_config(
    handle: *mut ComponentType,
    index: u32,
    _config: *mut c_void,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    code_of(comp.set_config(index))
}

unsafe extern "C" fn get_extension_index(
    handle: *mut ComponentType,
    name: *const c_char,
    index: *mut u32,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    if name.is_null() || index.is_null() {
        return Error::BadParameter.code();
    }
    let Ok(name) = std::ffi::CStr::from_ptr(name).to_str() else {
        return Error::BadParameter.code();
    };
    match comp.extension_index(name) {
        Ok(found) => {
            *index = found;
            ERROR_NONE
        }
        Err(e) => e.code(),
    }
}

unsafe extern "C" fn get_state(handle: *mut ComponentType, state: *mut u32) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    if state.is_null() {
        return Error::BadParameter.code();
    }
    *state = comp.state() as u32;
    ERROR_NONE
}

unsafe extern "C" fn component_tunnel_request(
    handle: *mut ComponentType,
    port: u32,
    _peer: *mut c_void,
    _peer_port: u32,
    _setup: *mut c_void,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    code_of(comp.tunnel_request(port))
}

unsafe extern "C" fn use_buffer(
    handle: *mut ComponentType,
    header: *mut *mut BufferHeader,
    port: u32,
    app_private: *mut c_void,
    size: u32,
    data: *mut u8,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    if header.is_null() {
        return Error::BadParameter.code();
    }
    match comp.use_buffer(port, app_private, size, data) {
        Ok(out) => {
            *header = out;
            ERROR_NONE
        }
        Err(e) => e.code(),
    }
}

unsafe extern "C" fn allocate_buffer(
    handle: *mut ComponentType,
    header: *mut *mut BufferHeader,
    port: u32,
    app_private: *mut c_void,
    size: u32,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    if header.is_null() {
        return Error::BadParameter.code();
    }
    match comp.allocate_buffer(port, app_private, size) {
        Ok(out) => {
            *header = out;
            ERROR_NONE
        }
        Err(e) => e.code(),
    }
}

unsafe extern "C" fn free_buffer(
    handle: *mut ComponentType,
    port: u32,
    header: *mut BufferHeader,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    code_of(comp.free_buffer(port, header))
}

unsafe extern "C" fn empty_this_buffer(
    handle: *mut ComponentType,
    header: *mut BufferHeader,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    code_of(comp.empty_this_buffer(header))
}

unsafe extern "C" fn fill_this_buffer(
    handle: *mut ComponentType,
    header: *mut BufferHeader,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    code_of(comp.fill_this_buffer(header))
}

unsafe extern "C" fn set_callbacks(
    handle: *mut ComponentType,
    callbacks: *const CallbackFns,
    app_data: *mut c_void,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    let Some(fns) = callbacks.as_ref() else {
        return Error::BadParameter.code();
    };
    (*handle).application_private = app_data;
    comp.set_callbacks(Arc::new(CallbackAdapter {
        fns: *fns,
        handle,
        app_data,
    }));
    ERROR_NONE
}

unsafe extern "C" fn component_deinit(handle: *mut ComponentType) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    code_of(comp.deinit())
}

unsafe extern "C" fn use_egl_image(
    handle: *mut ComponentType,
    _header: *mut *mut BufferHeader,
    _port: u32,
    _app_private: *mut c_void,
    _egl_image: *mut c_void,
) -> u32 {
    if component_from(handle).is_none() {
        return Error::InvalidComponent.code();
    }
    Error::NotImplemented.code()
}

unsafe extern "C" fn component_role_enum(
    handle: *mut ComponentType,
    role: *mut u8,
    index: u32,
) -> u32 {
    let Some(comp) = component_from(handle) else {
        return Error::InvalidComponent.code();
    };
    if role.is_null() {
        return Error::BadParameter.code();
    }
    match comp.role_enum(index) {
        Ok(found) => code_of(copy_name(role as *mut c_char, MAX_STRING_NAME, &found)),
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_type_is_fully_populated() {
        let c = ComponentType::populated();
        assert!(c.get_component_version.is_some());
        assert!(c.send_command.is_some());
        assert!(c.get_parameter.is_some());
        assert!(c.set_parameter.is_some());
        assert!(c.get_config.is_some());
        assert!(c.set_config.is_some());
        assert!(c.get_extension_index.is_some());
        assert!(c.get_state.is_some());
        assert!(c.component_tunnel_request.is_some());
        assert!(c.use_buffer.is_some());
        assert!(c.allocate_buffer.is_some());
        assert!(c.free_buffer.is_some());
        assert!(c.empty_this_buffer.is_some());
        assert!(c.fill_this_buffer.is_some());
        assert!(c.set_callbacks.is_some());
        assert!(c.component_deinit.is_some());
        assert!(c.use_egl_image.is_some());
        assert!(c.component_role_enum.is_some());
    }
}
