//! Core enumerations and the version tuple shared with the wire format.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Version of the OpenMAX IL interface implemented by this library.
pub const VERSION: Version = Version {
    major: 1,
    minor: 1,
    revision: 2,
    step: 0,
};

/// Port index wildcard addressing every port of a component.
pub const ALL_PORTS: u32 = 0xFFFF_FFFF;

/// Four-byte version tuple stamped into every exchanged structure.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub revision: u8,
    pub step: u8,
}

/// Component lifecycle states.
///
/// The discriminants are the raw `OMX_STATETYPE` values.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Terminal state; the component must be destroyed.
    Invalid = 0,
    /// Constructed, no resources held.
    Loaded = 1,
    /// Resources held, not processing.
    Idle = 2,
    /// Workers running, buffers flowing.
    Executing = 3,
    /// Processing suspended.
    Pause = 4,
    /// Waiting for resources before reaching Idle.
    WaitForResources = 5,
}

impl State {
    pub fn from_raw(raw: u32) -> Option<State> {
        match raw {
            0 => Some(State::Invalid),
            1 => Some(State::Loaded),
            2 => Some(State::Idle),
            3 => Some(State::Executing),
            4 => Some(State::Pause),
            5 => Some(State::WaitForResources),
            _ => None,
        }
    }
}

/// Direction of a port.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Input = 0,
    Output = 1,
}

/// Media domain a port belongs to.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Domain {
    Audio = 0,
    Video = 1,
    Image = 2,
    Other = 3,
}

/// Asynchronous commands accepted by [`Component::send_command`].
///
/// [`Component::send_command`]: crate::Component::send_command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Request a state transition.
    StateSet(State),
    /// Return all in-flight buffers of one port, or of every port
    /// with [`ALL_PORTS`].
    Flush(u32),
    /// Stop a port and release its registered buffers.
    PortDisable(u32),
    /// Re-activate a disabled port once the client repopulates it.
    PortEnable(u32),
    /// Mark the next buffer crossing the port.
    MarkBuffer(u32),
}

impl Command {
    /// Raw `OMX_COMMANDTYPE` value, reported as `data1` of the
    /// completion event.
    pub const fn code(self) -> u32 {
        match self {
            Command::StateSet(_) => 0,
            Command::Flush(_) => 1,
            Command::PortDisable(_) => 2,
            Command::PortEnable(_) => 3,
            Command::MarkBuffer(_) => 4,
        }
    }

    /// Command argument, reported as `data2` of the completion event.
    pub const fn param(self) -> u32 {
        match self {
            Command::StateSet(s) => s as u32,
            Command::Flush(ix)
            | Command::PortDisable(ix)
            | Command::PortEnable(ix)
            | Command::MarkBuffer(ix) => ix,
        }
    }

    /// Rebuild a command from its wire encoding.
    pub fn from_raw(code: u32, param: u32) -> Option<Command> {
        match code {
            0 => State::from_raw(param).map(Command::StateSet),
            1 => Some(Command::Flush(param)),
            2 => Some(Command::PortDisable(param)),
            3 => Some(Command::PortEnable(param)),
            4 => Some(Command::MarkBuffer(param)),
            _ => None,
        }
    }
}

/// Events delivered through the client's event callback.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// An asynchronous command finished; `data1` carries the command
    /// code, `data2` its argument.
    CmdComplete = 0,
    /// An asynchronous operation failed; `data1` carries the error code.
    Error = 1,
    /// A marked buffer was consumed.
    Mark = 2,
    /// A port definition changed on the component side.
    PortSettingsChanged = 3,
    /// A buffer with the end-of-stream flag crossed a port; `data1`
    /// carries the port index, `data2` the flag word.
    BufferFlag = 4,
    /// The component acquired the resources it waited for.
    ResourcesAcquired = 5,
}

/// Per-buffer flag word, propagated verbatim between ports.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferFlags(u32);

impl BufferFlags {
    /// End of stream; triggers [`Event::BufferFlag`] on return.
    pub const EOS: BufferFlags = BufferFlags(0x0000_0001);
    /// First buffer of a stream.
    pub const START_TIME: BufferFlags = BufferFlags(0x0000_0002);
    /// Decode but do not render.
    pub const DECODE_ONLY: BufferFlags = BufferFlags(0x0000_0004);
    /// Payload is known to be damaged.
    pub const DATA_CORRUPT: BufferFlags = BufferFlags(0x0000_0008);
    /// Buffer ends exactly on a frame boundary.
    pub const END_OF_FRAME: BufferFlags = BufferFlags(0x0000_0010);
    /// Buffer starts a sync frame.
    pub const SYNC_FRAME: BufferFlags = BufferFlags(0x0000_0020);
    /// Payload carries codec side data, not media data.
    pub const CODEC_CONFIG: BufferFlags = BufferFlags(0x0000_0080);

    pub const fn empty() -> BufferFlags {
        BufferFlags(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: BufferFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> BufferFlags {
        BufferFlags(bits)
    }
}

impl BitOr for BufferFlags {
    type Output = BufferFlags;

    fn bitor(self, other: BufferFlags) -> BufferFlags {
        BufferFlags(self.0 | other.0)
    }
}

impl BitOrAssign for BufferFlags {
    fn bitor_assign(&mut self, other: BufferFlags) {
        self.0 |= other.0;
    }
}

impl fmt::Debug for BufferFlags {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: &[(BufferFlags, &str)] = &[
            (BufferFlags::EOS, "EOS"),
            (BufferFlags::START_TIME, "START_TIME"),
            (BufferFlags::DECODE_ONLY, "DECODE_ONLY"),
            (BufferFlags::DATA_CORRUPT, "DATA_CORRUPT"),
            (BufferFlags::END_OF_FRAME, "END_OF_FRAME"),
            (BufferFlags::SYNC_FRAME, "SYNC_FRAME"),
            (BufferFlags::CODEC_CONFIG, "CODEC_CONFIG"),
        ];

        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(*flag) {
                if !first {
                    write!(fmt, " | ")?;
                }
                write!(fmt, "{}", name)?;
                first = false;
            }
        }
        if first {
            write!(fmt, "(empty)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_round_trip() {
        let cmds = [
            Command::StateSet(State::Idle),
            Command::Flush(3),
            Command::PortDisable(0),
            Command::PortEnable(ALL_PORTS),
            Command::MarkBuffer(1),
        ];
        for cmd in cmds {
            assert_eq!(Command::from_raw(cmd.code(), cmd.param()), Some(cmd));
        }
        assert_eq!(Command::from_raw(9, 0), None);
        assert_eq!(Command::from_raw(0, 42), None);
    }

    #[test]
    fn buffer_flags_ops() {
        let flags = BufferFlags::EOS | BufferFlags::END_OF_FRAME;
        assert!(flags.contains(BufferFlags::EOS));
        assert!(!flags.contains(BufferFlags::SYNC_FRAME));
        assert_eq!(format!("{:?}", flags), "EOS | END_OF_FRAME");
        assert_eq!(format!("{:?}", BufferFlags::empty()), "(empty)");
    }
}
