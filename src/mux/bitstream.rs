//! Header sniffing for VP8 and VP8L frame bitstreams.

use byteorder_lite::{ByteOrder, LittleEndian};

use super::MuxError;

/// First byte of every VP8L bitstream.
pub(crate) const VP8L_SIGNATURE: u8 = 0x2F;

const VP8_START_CODE: [u8; 3] = [0x9d, 0x01, 0x2a];

/// Parsed size and alpha information of a frame bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BitstreamInfo {
    pub width: u32,
    pub height: u32,
    pub lossless: bool,
    /// VP8L alpha-is-used hint. Always false for VP8.
    pub has_alpha: bool,
}

/// Returns true if `data` starts with the VP8L signature byte.
#[inline]
pub(crate) fn is_vp8l(data: &[u8]) -> bool {
    data.first() == Some(&VP8L_SIGNATURE)
}

/// Read width and height from a VP8 key frame header.
pub(crate) fn vp8_dimensions(data: &[u8]) -> Result<(u32, u32), MuxError> {
    if data.len() < 10 {
        return Err(MuxError::InvalidFormat("VP8 frame header too short".into()));
    }
    if data[3..6] != VP8_START_CODE {
        return Err(MuxError::InvalidFormat("missing VP8 start code".into()));
    }
    let width = u32::from(LittleEndian::read_u16(&data[6..8]) & 0x3fff);
    let height = u32::from(LittleEndian::read_u16(&data[8..10]) & 0x3fff);
    if width == 0 || height == 0 {
        return Err(MuxError::InvalidDimensions { width, height });
    }
    Ok((width, height))
}

/// Read width, height and the alpha hint from a VP8L header.
pub(crate) fn vp8l_header(data: &[u8]) -> Result<(u32, u32, bool), MuxError> {
    if data.len() < 5 {
        return Err(MuxError::InvalidFormat("VP8L header too short".into()));
    }
    if data[0] != VP8L_SIGNATURE {
        return Err(MuxError::InvalidFormat("missing VP8L signature".into()));
    }
    let bits = LittleEndian::read_u32(&data[1..5]);
    let width = (bits & 0x3fff) + 1;
    let height = ((bits >> 14) & 0x3fff) + 1;
    let has_alpha = (bits >> 28) & 1 == 1;
    Ok((width, height, has_alpha))
}

/// Sniff a bare VP8 or VP8L bitstream.
pub(crate) fn bitstream_info(data: &[u8]) -> Result<BitstreamInfo, MuxError> {
    if is_vp8l(data) {
        let (width, height, has_alpha) = vp8l_header(data)?;
        Ok(BitstreamInfo {
            width,
            height,
            lossless: true,
            has_alpha,
        })
    } else {
        let (width, height) = vp8_dimensions(data)?;
        Ok(BitstreamInfo {
            width,
            height,
            lossless: false,
            has_alpha: false,
        })
    }
}

/// Split an encoder's output into an optional ALPH payload and the image
/// bitstream.
///
/// Frame encoders for lossy images with transparency emit a complete `ALPH`
/// chunk followed by the VP8 data. Everything else is returned unchanged.
pub(crate) fn split_alpha(data: &[u8]) -> Result<(Option<&[u8]>, &[u8]), MuxError> {
    if data.len() < 8 || &data[0..4] != b"ALPH" {
        return Ok((None, data));
    }
    let size = LittleEndian::read_u32(&data[4..8]) as usize;
    let end = 8usize.checked_add(size).ok_or(MuxError::Truncated)?;
    let alpha = data.get(8..end).ok_or(MuxError::Truncated)?;
    let rest_start = (end + (size & 1)).min(data.len());
    let rest = &data[rest_start..];
    // An encoder may also wrap the image data in its own chunk header.
    let rest = if rest.len() >= 8 && &rest[0..4] == b"VP8 " {
        let inner = LittleEndian::read_u32(&rest[4..8]) as usize;
        let inner_end = 8usize.checked_add(inner).ok_or(MuxError::Truncated)?;
        rest.get(8..inner_end).ok_or(MuxError::Truncated)?
    } else {
        rest
    };
    Ok((Some(alpha), rest))
}
