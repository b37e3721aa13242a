//! Error values shared with the OpenMAX IL wire format.

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the core and by components.
///
/// Each variant corresponds to exactly one `OMX_ERRORTYPE` code so results
/// can cross the C surface without translation loss. The [`Interrupted`]
/// variant is internal: it is raised when a blocking wait is torn down
/// during shutdown and is caught before reaching a client.
///
/// [`Interrupted`]: Error::Interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An allocation or a queue handoff failed.
    #[error("insufficient resources")]
    InsufficientResources,
    /// Failure that does not map to a more precise code.
    #[error("undefined error")]
    Undefined,
    /// The component name is malformed or already taken.
    #[error("invalid component name")]
    InvalidComponentName,
    /// No component registered under the requested name or alias.
    #[error("component not found")]
    ComponentNotFound,
    /// The handle does not refer to a live component.
    #[error("invalid component")]
    InvalidComponent,
    /// Malformed structure, null where forbidden, or a size mismatch.
    #[error("bad parameter")]
    BadParameter,
    /// The index is known but the component does not service it.
    #[error("not implemented")]
    NotImplemented,
    /// The operation is not possible in the current state.
    #[error("invalid state")]
    InvalidState,
    /// Enumeration went past the last entry.
    #[error("no more entries")]
    NoMore,
    /// Structure version is incompatible with the library version.
    #[error("version mismatch")]
    VersionMismatch,
    /// A bounded wait expired before the condition held.
    #[error("timed out")]
    Timeout,
    /// The requested state equals the current state.
    #[error("already in the requested state")]
    SameState,
    /// The requested state is not reachable from the current state.
    #[error("incorrect state transition")]
    IncorrectStateTransition,
    /// The call is not permitted while the component is in this state.
    #[error("incorrect state operation")]
    IncorrectStateOperation,
    /// The supplied value is outside what the component supports.
    #[error("unsupported setting")]
    UnsupportedSetting,
    /// The parameter or config index is unknown.
    #[error("unsupported index")]
    UnsupportedIndex,
    /// The port number does not exist on this component.
    #[error("bad port index")]
    BadPortIndex,
    /// The port does not hold its full complement of buffers.
    #[error("port not populated")]
    PortUnpopulated,
    /// A blocking wait was broken by shutdown. Never surfaced to clients.
    #[error("interrupted")]
    Interrupted,
}

impl Error {
    /// Raw `OMX_ERRORTYPE` value for the wire format.
    pub const fn code(self) -> u32 {
        match self {
            Error::InsufficientResources => 0x8000_1000,
            Error::Undefined => 0x8000_1001,
            Error::InvalidComponentName => 0x8000_1002,
            Error::ComponentNotFound => 0x8000_1003,
            Error::InvalidComponent => 0x8000_1004,
            Error::BadParameter => 0x8000_1005,
            Error::NotImplemented => 0x8000_1006,
            Error::InvalidState => 0x8000_100A,
            Error::NoMore => 0x8000_100E,
            Error::VersionMismatch => 0x8000_100F,
            Error::Timeout => 0x8000_1011,
            Error::SameState => 0x8000_1012,
            Error::IncorrectStateTransition => 0x8000_1017,
            Error::IncorrectStateOperation => 0x8000_1018,
            Error::UnsupportedSetting => 0x8000_1019,
            Error::UnsupportedIndex => 0x8000_101A,
            Error::BadPortIndex => 0x8000_101B,
            Error::PortUnpopulated => 0x8000_101C,
            // Shutdown interruptions have no public code.
            Error::Interrupted => 0x8000_1001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn codes_are_distinct() {
        let all = [
            Error::InsufficientResources,
            Error::InvalidComponentName,
            Error::ComponentNotFound,
            Error::InvalidComponent,
            Error::BadParameter,
            Error::NotImplemented,
            Error::InvalidState,
            Error::NoMore,
            Error::VersionMismatch,
            Error::Timeout,
            Error::SameState,
            Error::IncorrectStateTransition,
            Error::IncorrectStateOperation,
            Error::UnsupportedSetting,
            Error::UnsupportedIndex,
            Error::BadPortIndex,
            Error::PortUnpopulated,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code(), "{:?} vs {:?}", a, b);
            }
        }
    }
}
