//! Parameter structures exchanged with the client.
//!
//! Every structure opens with a [`StructHeader`] that the core validates
//! before touching the rest of the payload, mirroring the `nSize` and
//! `nVersion` discipline of the wire format.

use std::mem;

use crate::error::{Error, Result};
use crate::format::{DomainDef, FormatDetail};
use crate::types::{Dir, Domain, Version, VERSION};

/// Size and version stamp opening every parameter structure.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructHeader {
    pub size: u32,
    pub version: Version,
}

impl StructHeader {
    /// Header describing `T` at the library's interface version.
    pub fn for_struct<T>() -> StructHeader {
        StructHeader {
            size: mem::size_of::<T>() as u32,
            version: VERSION,
        }
    }

    /// Reject a header whose size does not describe `T` or whose
    /// major/minor version differs from the library's.
    pub fn check<T>(&self) -> Result<()> {
        if self.size != mem::size_of::<T>() as u32 {
            return Err(Error::BadParameter);
        }
        if self.version.major != VERSION.major || self.version.minor != VERSION.minor {
            return Err(Error::VersionMismatch);
        }
        Ok(())
    }
}

/// Client-visible port definition.
///
/// Everything except `buffer_count_actual` is read-only to the client;
/// writes to the other fields are ignored by the setter path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDefinition {
    pub header: StructHeader,
    /// Which port the query addresses. Input to both getter and setter.
    pub port_index: u32,
    pub dir: Dir,
    pub buffer_count_actual: u32,
    pub buffer_count_min: u32,
    pub buffer_size: u32,
    pub enabled: bool,
    pub populated: bool,
    pub domain: Domain,
    /// Non-format fields of the port's domain block.
    pub contents: DomainDef,
    /// The port's default format entry, if one is configured.
    pub format: Option<FormatDetail>,
    pub buffers_contiguous: bool,
    pub buffer_alignment: u32,
}

impl PortDefinition {
    /// Blank definition addressing `port_index`, ready to pass to the
    /// getter.
    pub fn query(port_index: u32) -> PortDefinition {
        PortDefinition {
            header: StructHeader::for_struct::<PortDefinition>(),
            port_index,
            dir: Dir::Input,
            buffer_count_actual: 0,
            buffer_count_min: 0,
            buffer_size: 0,
            enabled: false,
            populated: false,
            domain: Domain::Other,
            contents: DomainDef::default(),
            format: None,
            buffers_contiguous: false,
            buffer_alignment: 0,
        }
    }
}

/// Supported-format enumeration and selection parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortFormatParam {
    pub header: StructHeader,
    /// Which port the query addresses.
    pub port_index: u32,
    /// Position in the supported-format list. Input to the getter.
    pub index: u32,
    /// Enumerated entry (getter output) or the tuple to select
    /// (setter input).
    pub format: Option<FormatDetail>,
}

impl PortFormatParam {
    /// Query for the `index`-th supported format of `port_index`.
    pub fn query(port_index: u32, index: u32) -> PortFormatParam {
        PortFormatParam {
            header: StructHeader::for_struct::<PortFormatParam>(),
            port_index,
            index,
            format: None,
        }
    }

    /// Ask `port_index` to make `format` its default.
    pub fn select(port_index: u32, format: FormatDetail) -> PortFormatParam {
        PortFormatParam {
            header: StructHeader::for_struct::<PortFormatParam>(),
            port_index,
            index: 0,
            format: Some(format),
        }
    }
}

/// Per-domain port census reported by the `…Init` parameter family.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortCountParam {
    pub header: StructHeader,
    /// Number of ports in the queried domain.
    pub ports: u32,
    /// Lowest port index of the queried domain.
    pub start_port: u32,
}

impl PortCountParam {
    pub fn query() -> PortCountParam {
        PortCountParam {
            header: StructHeader::for_struct::<PortCountParam>(),
            ports: 0,
            start_port: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_validation() {
        let good = StructHeader::for_struct::<PortCountParam>();
        assert_eq!(good.check::<PortCountParam>(), Ok(()));

        let mut wrong_size = good;
        wrong_size.size += 4;
        assert_eq!(
            wrong_size.check::<PortCountParam>(),
            Err(Error::BadParameter)
        );

        let mut wrong_version = good;
        wrong_version.version.minor = VERSION.minor + 1;
        assert_eq!(
            wrong_version.check::<PortCountParam>(),
            Err(Error::VersionMismatch)
        );

        // Revision and step are informational only.
        let mut newer_step = good;
        newer_step.version.step = 9;
        assert_eq!(newer_step.check::<PortCountParam>(), Ok(()));
    }
}
