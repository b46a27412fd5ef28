//! Container-level animation model and frame decoding.

use std::sync::Arc;

use log::{debug, trace};
use rgb::RGBA8;

use super::Frame;
use crate::codec::FrameDecoder;
use crate::error::{Error, Result};
use crate::mux::{Demuxer, WebPDemuxer};

/// An animation: ordered frames plus canvas-level parameters.
///
/// Frames carry their raw bitstreams until decoded. Decoding is delegated to
/// the [`FrameDecoder`] attached with [`Animation::with_frame_decoder`].
#[derive(Clone)]
pub struct Animation {
    /// Frames in display order.
    pub frames: Vec<Frame>,
    /// Canvas width in pixels.
    pub canvas_width: u32,
    /// Canvas height in pixels.
    pub canvas_height: u32,
    /// Number of loops, 0 for infinite.
    pub loop_count: u16,
    /// Background color hint from the container.
    pub background_color: RGBA8,
    /// ICC color profile.
    pub icc: Option<Vec<u8>>,
    /// EXIF metadata.
    pub exif: Option<Vec<u8>>,
    /// XMP metadata.
    pub xmp: Option<Vec<u8>>,
    decoder: Option<Arc<dyn FrameDecoder>>,
}

impl Animation {
    /// Create an empty animation with the given canvas size.
    pub fn new(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            frames: Vec::new(),
            canvas_width,
            canvas_height,
            loop_count: 0,
            background_color: RGBA8::default(),
            icc: None,
            exif: None,
            xmp: None,
            decoder: None,
        }
    }

    /// Parse a WebP file. Frames keep their bitstreams; nothing is decoded.
    pub fn decode_bytes(data: &[u8]) -> Result<Self> {
        let demuxer = WebPDemuxer::new(data)?;
        Self::from_demuxer(&demuxer)
    }

    /// Build an animation from any demuxer.
    pub fn from_demuxer(demuxer: &impl Demuxer) -> Result<Self> {
        let features = demuxer.features();
        if features.width == 0 || features.height == 0 {
            return Err(Error::invalid(format!(
                "canvas {}x{} is empty",
                features.width, features.height
            )));
        }
        let mut anim = Self::new(features.width, features.height);
        anim.loop_count = demuxer.loop_count();
        anim.background_color = argb_to_rgba(demuxer.background_color());
        anim.icc = demuxer.chunk(b"ICCP").map(<[u8]>::to_vec);
        anim.exif = demuxer.chunk(b"EXIF").map(<[u8]>::to_vec);
        anim.xmp = demuxer.chunk(b"XMP ").map(<[u8]>::to_vec);

        let count = demuxer.num_frames();
        anim.frames.reserve(count);
        for i in 0..count {
            let f = demuxer.frame(i)?;
            anim.frames.push(Frame {
                image: None,
                duration_ms: f.duration_ms,
                offset_x: f.offset_x,
                offset_y: f.offset_y,
                width: f.width,
                height: f.height,
                dispose: f.dispose,
                blend: f.blend,
                is_keyframe: f.is_keyframe,
                has_alpha: f.has_alpha,
                bitstream: f.bitstream.to_vec(),
                alpha: f.alpha_data.map(<[u8]>::to_vec),
            });
        }
        debug!(
            "animation {}x{} with {} frame(s), loop count {}",
            anim.canvas_width,
            anim.canvas_height,
            count,
            anim.loop_count
        );
        Ok(anim)
    }

    /// Attach the frame decoder used by [`Animation::decode_frames`].
    pub fn with_frame_decoder(mut self, decoder: Arc<dyn FrameDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Attach or replace the frame decoder.
    pub fn set_frame_decoder(&mut self, decoder: Arc<dyn FrameDecoder>) {
        self.decoder = Some(decoder);
    }

    /// Sum of all frame durations in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.frames.iter().map(|f| u64::from(f.duration_ms)).sum()
    }

    fn frame_decoder(&self) -> Result<&Arc<dyn FrameDecoder>> {
        self.decoder.as_ref().ok_or(Error::NoDecoder)
    }

    /// Decode every frame that has a bitstream but no image yet, in order.
    ///
    /// Stops at the first failure; frames decoded before it keep their
    /// images.
    pub fn decode_frames(&mut self) -> Result<()> {
        let decoder = Arc::clone(self.frame_decoder()?);
        for (index, frame) in self.frames.iter_mut().enumerate() {
            if !frame.needs_decode() {
                continue;
            }
            trace!("decoding frame {index}");
            let image = decoder
                .decode_frame(&frame.bitstream, frame.alpha.as_deref())
                .map_err(Error::CodecFailure)?;
            frame.image = Some(image);
        }
        Ok(())
    }

    /// Decode pending frames on the rayon thread pool.
    ///
    /// Two or fewer pending frames are decoded sequentially. Every pending
    /// frame is attempted; successful results are stored and the first
    /// failure in frame order is returned. Without the `parallel` feature this
    /// is [`Animation::decode_frames`].
    pub fn decode_frames_parallel(&mut self) -> Result<()> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            let decoder = Arc::clone(self.frame_decoder()?);
            let pending: Vec<usize> = self
                .frames
                .iter()
                .enumerate()
                .filter(|(_, f)| f.needs_decode())
                .map(|(i, _)| i)
                .collect();
            if pending.len() <= 2 {
                return self.decode_frames();
            }
            debug!(
                "decoding {} frame(s) on up to {} threads",
                pending.len(),
                rayon::current_num_threads().min(pending.len())
            );

            let frames = &self.frames;
            let results: Vec<_> = pending
                .par_iter()
                .map(|&i| {
                    let f = &frames[i];
                    (i, decoder.decode_frame(&f.bitstream, f.alpha.as_deref()))
                })
                .collect();

            let mut first_err = None;
            for (i, result) in results {
                match result {
                    Ok(image) => self.frames[i].image = Some(image),
                    Err(e) => {
                        debug!("frame {i} failed to decode: {e}");
                        first_err.get_or_insert(e);
                    }
                }
            }
            match first_err {
                Some(e) => Err(Error::CodecFailure(e)),
                None => Ok(()),
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.decode_frames()
        }
    }
}

impl core::fmt::Debug for Animation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Animation")
            .field("canvas_width", &self.canvas_width)
            .field("canvas_height", &self.canvas_height)
            .field("frames", &self.frames.len())
            .field("loop_count", &self.loop_count)
            .field("background_color", &self.background_color)
            .field("has_decoder", &self.decoder.is_some())
            .finish_non_exhaustive()
    }
}

/// Unpack an ARGB word into a pixel.
#[inline]
pub fn argb_to_rgba(argb: u32) -> RGBA8 {
    RGBA8::new(
        (argb >> 16) as u8,
        (argb >> 8) as u8,
        argb as u8,
        (argb >> 24) as u8,
    )
}

/// Pack a pixel into an ARGB word.
#[inline]
pub fn rgba_to_argb(c: RGBA8) -> u32 {
    u32::from(c.a) << 24 | u32::from(c.r) << 16 | u32::from(c.g) << 8 | u32::from(c.b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::RgbaImage;
    use crate::error::BoxError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn frame_with(byte: u8) -> Frame {
        Frame {
            bitstream: vec![byte],
            width: 1,
            height: 1,
            ..Default::default()
        }
    }

    fn anim_with(count: usize) -> Animation {
        let mut anim = Animation::new(1, 1);
        anim.frames = (0..count).map(|i| frame_with(i as u8)).collect();
        anim
    }

    /// Decodes a one-byte bitstream into a 1x1 gray pixel; byte 0xEE fails.
    fn gray_decoder(calls: Arc<AtomicUsize>) -> Arc<dyn FrameDecoder> {
        Arc::new(
            move |bs: &[u8], _alpha: Option<&[u8]>| -> core::result::Result<RgbaImage, BoxError> {
                calls.fetch_add(1, Ordering::SeqCst);
                if bs[0] == 0xEE {
                    return Err("corrupt".into());
                }
                Ok(RgbaImage::filled(1, 1, RGBA8::new(bs[0], bs[0], bs[0], 255)))
            },
        )
    }

    #[test]
    fn test_argb_conversion() {
        let c = argb_to_rgba(0x80112233);
        assert_eq!(c, RGBA8::new(0x11, 0x22, 0x33, 0x80));
        assert_eq!(rgba_to_argb(c), 0x80112233);
    }

    #[test]
    fn test_no_decoder() {
        let mut anim = anim_with(3);
        assert!(matches!(anim.decode_frames(), Err(Error::NoDecoder)));
        assert!(matches!(anim.decode_frames_parallel(), Err(Error::NoDecoder)));
    }

    #[test]
    fn test_decode_skips_decoded_and_empty() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut anim = anim_with(3).with_frame_decoder(gray_decoder(calls.clone()));
        anim.frames[0].image = Some(RgbaImage::new(1, 1));
        anim.frames[1].bitstream.clear();
        anim.decode_frames().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(anim.frames[1].image.is_none());
        assert_eq!(anim.frames[2].image.as_ref().unwrap().pixel(0, 0).r, 2);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut par = anim_with(12).with_frame_decoder(gray_decoder(calls.clone()));
        par.decode_frames_parallel().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 12);

        let mut seq = anim_with(12).with_frame_decoder(gray_decoder(Arc::default()));
        seq.decode_frames().unwrap();
        for (a, b) in par.frames.iter().zip(&seq.frames) {
            assert_eq!(a.image, b.image);
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_keeps_successes_and_reports_error() {
        let mut anim = anim_with(6).with_frame_decoder(gray_decoder(Arc::default()));
        anim.frames[3].bitstream = vec![0xEE];
        let err = anim.decode_frames_parallel().unwrap_err();
        assert!(matches!(err, Error::CodecFailure(_)));
        assert!(anim.frames[3].image.is_none());
        assert!(anim.frames[5].image.is_some());
    }

    #[test]
    fn test_total_duration() {
        let mut anim = anim_with(3);
        for (i, f) in anim.frames.iter_mut().enumerate() {
            f.duration_ms = 100 * (i as u32 + 1);
        }
        assert_eq!(anim.total_duration_ms(), 600);
    }
}
