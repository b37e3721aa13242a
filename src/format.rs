//! Port format payloads.
//!
//! The wire format models per-domain port data as a union of four
//! structures. Here a single tagged variant covers all domains, so the
//! queue, state and buffer logic behind [`Port`] exists exactly once.
//!
//! [`Port`]: crate::Port

use crate::error::{Error, Result};
use crate::types::Domain;

/// Audio coding schemes. Discriminants follow `OMX_AUDIO_CODINGTYPE`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCoding {
    Unused = 0,
    AutoDetect = 1,
    Pcm = 2,
    Aac = 21,
    Mp3 = 22,
    Vorbis = 24,
}

/// Video coding schemes. Discriminants follow `OMX_VIDEO_CODINGTYPE`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCoding {
    Unused = 0,
    AutoDetect = 1,
    Mpeg2 = 2,
    H263 = 3,
    Mpeg4 = 4,
    Wmv = 5,
    Rv = 6,
    Avc = 7,
    Mjpeg = 8,
}

/// Image coding schemes. Discriminants follow `OMX_IMAGE_CODINGTYPE`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCoding {
    Unused = 0,
    AutoDetect = 1,
    Jpeg = 2,
    Jpeg2K = 3,
    Exif = 4,
    Tiff = 5,
    Gif = 6,
    Png = 7,
    Bmp = 9,
}

/// Uncompressed pixel layouts. Discriminants follow
/// `OMX_COLOR_FORMATTYPE`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    Unused = 0,
    Monochrome = 1,
    Rgb565 = 6,
    Rgb888 = 11,
    Yuv411Planar = 17,
    Yuv420Planar = 19,
    Yuv420SemiPlanar = 21,
    Yuv422Planar = 22,
}

/// Payload carried by ports outside the three media domains.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtherFormat {
    Time = 0,
    Power = 1,
    Stats = 2,
    Binary = 3,
}

impl AudioCoding {
    pub fn from_raw(raw: u32) -> Option<AudioCoding> {
        match raw {
            0 => Some(AudioCoding::Unused),
            1 => Some(AudioCoding::AutoDetect),
            2 => Some(AudioCoding::Pcm),
            21 => Some(AudioCoding::Aac),
            22 => Some(AudioCoding::Mp3),
            24 => Some(AudioCoding::Vorbis),
            _ => None,
        }
    }
}

impl VideoCoding {
    pub fn from_raw(raw: u32) -> Option<VideoCoding> {
        match raw {
            0 => Some(VideoCoding::Unused),
            1 => Some(VideoCoding::AutoDetect),
            2 => Some(VideoCoding::Mpeg2),
            3 => Some(VideoCoding::H263),
            4 => Some(VideoCoding::Mpeg4),
            5 => Some(VideoCoding::Wmv),
            6 => Some(VideoCoding::Rv),
            7 => Some(VideoCoding::Avc),
            8 => Some(VideoCoding::Mjpeg),
            _ => None,
        }
    }
}

impl ImageCoding {
    pub fn from_raw(raw: u32) -> Option<ImageCoding> {
        match raw {
            0 => Some(ImageCoding::Unused),
            1 => Some(ImageCoding::AutoDetect),
            2 => Some(ImageCoding::Jpeg),
            3 => Some(ImageCoding::Jpeg2K),
            4 => Some(ImageCoding::Exif),
            5 => Some(ImageCoding::Tiff),
            6 => Some(ImageCoding::Gif),
            7 => Some(ImageCoding::Png),
            9 => Some(ImageCoding::Bmp),
            _ => None,
        }
    }
}

impl ColorFormat {
    pub fn from_raw(raw: u32) -> Option<ColorFormat> {
        match raw {
            0 => Some(ColorFormat::Unused),
            1 => Some(ColorFormat::Monochrome),
            6 => Some(ColorFormat::Rgb565),
            11 => Some(ColorFormat::Rgb888),
            17 => Some(ColorFormat::Yuv411Planar),
            19 => Some(ColorFormat::Yuv420Planar),
            21 => Some(ColorFormat::Yuv420SemiPlanar),
            22 => Some(ColorFormat::Yuv422Planar),
            _ => None,
        }
    }
}

impl OtherFormat {
    pub fn from_raw(raw: u32) -> Option<OtherFormat> {
        match raw {
            0 => Some(OtherFormat::Time),
            1 => Some(OtherFormat::Power),
            2 => Some(OtherFormat::Stats),
            3 => Some(OtherFormat::Binary),
            _ => None,
        }
    }
}

/// One entry of a port's supported-format list.
///
/// A port advertises the formats it can negotiate as an ordered list of
/// these entries; one of them is the default the port definition reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatDetail {
    Audio {
        encoding: AudioCoding,
    },
    Video {
        compression: VideoCoding,
        color: ColorFormat,
        /// Frames per second in Q16 fixed point.
        framerate: u32,
    },
    Image {
        compression: ImageCoding,
        color: ColorFormat,
    },
    Other {
        format: OtherFormat,
    },
}

impl FormatDetail {
    pub fn domain(&self) -> Domain {
        match self {
            FormatDetail::Audio { .. } => Domain::Audio,
            FormatDetail::Video { .. } => Domain::Video,
            FormatDetail::Image { .. } => Domain::Image,
            FormatDetail::Other { .. } => Domain::Other,
        }
    }

    /// A video or image tuple must name a compression scheme or a raw
    /// color layout; both halves unused describes nothing.
    pub(crate) fn validate(&self) -> Result<()> {
        match *self {
            FormatDetail::Video {
                compression: VideoCoding::Unused,
                color: ColorFormat::Unused,
                ..
            } => Err(Error::BadParameter),
            FormatDetail::Image {
                compression: ImageCoding::Unused,
                color: ColorFormat::Unused,
            } => Err(Error::BadParameter),
            _ => Ok(()),
        }
    }
}

/// Per-domain, non-format fields of a port definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainDef {
    Audio(AudioDef),
    Video(VideoDef),
    Image(ImageDef),
    Other(OtherDef),
}

impl DomainDef {
    pub fn domain(&self) -> Domain {
        match self {
            DomainDef::Audio(_) => Domain::Audio,
            DomainDef::Video(_) => Domain::Video,
            DomainDef::Image(_) => Domain::Image,
            DomainDef::Other(_) => Domain::Other,
        }
    }
}

impl Default for DomainDef {
    fn default() -> DomainDef {
        DomainDef::Other(OtherDef::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioDef {
    pub mime: String,
    pub flag_error_concealment: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoDef {
    pub mime: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub stride: i32,
    pub slice_height: u32,
    pub bitrate: u32,
    pub flag_error_concealment: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDef {
    pub mime: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub stride: i32,
    pub slice_height: u32,
    pub flag_error_concealment: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtherDef {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_video_tuple_is_rejected() {
        let bad = FormatDetail::Video {
            compression: VideoCoding::Unused,
            color: ColorFormat::Unused,
            framerate: 0,
        };
        assert_eq!(bad.validate(), Err(Error::BadParameter));

        let raw = FormatDetail::Video {
            compression: VideoCoding::Unused,
            color: ColorFormat::Yuv420Planar,
            framerate: 30 << 16,
        };
        assert_eq!(raw.validate(), Ok(()));
    }

    #[test]
    fn detail_reports_its_domain() {
        let f = FormatDetail::Audio {
            encoding: AudioCoding::Pcm,
        };
        assert_eq!(f.domain(), Domain::Audio);
        assert_eq!(DomainDef::default().domain(), Domain::Other);
    }
}
