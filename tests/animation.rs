//! End-to-end tests for the animation encoder and decoder.

mod common;

use common::{fake_decoder, fake_encoder, init_logger, solid, tiny_still_encoder, BLUE, RED};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use zenwebp_core::anim::{
    AnimDecoder, AnimEncoder, AnimFrame, Animation, BlendMethod, DisposeMethod, EncodeOptions,
    RgbaImage,
};
use zenwebp_core::mux::{Demuxer, FrameOptions, Muxer, WebPDemuxer, WebPMux};
use zenwebp_core::rgb::RGBA8;
use zenwebp_core::Error;

fn lossless() -> EncodeOptions {
    EncodeOptions {
        lossless: true,
        ..Default::default()
    }
}

fn encode(width: u32, height: u32, opts: EncodeOptions, frames: &[(RgbaImage, u32)]) -> Vec<u8> {
    let mut enc = AnimEncoder::new(Vec::new(), width, height, opts).with_frame_encoder(fake_encoder());
    for (img, duration) in frames {
        enc.add_frame(img, *duration).unwrap();
    }
    enc.close().unwrap();
    enc.into_inner()
}

fn decode(data: &[u8]) -> Vec<AnimFrame> {
    let mut anim = Animation::decode_bytes(data)
        .unwrap()
        .with_frame_decoder(fake_decoder());
    anim.decode_frames().unwrap();
    AnimDecoder::new(&anim).decode_all().unwrap()
}

#[test]
fn single_frame_round_trip() {
    init_logger();
    let data = encode(4, 4, lossless(), &[(solid(4, 4, RED), 100)]);
    let snaps = decode(&data);
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].duration_ms, 100);
    assert_eq!(snaps[0].timestamp_ms, 0);
    assert!(snaps[0].image.pixels().iter().all(|&p| p == RED));
}

#[test]
fn single_frame_prefers_smaller_still() {
    let mut enc = AnimEncoder::new(Vec::new(), 4, 4, lossless())
        .with_frame_encoder(fake_encoder())
        .with_simple_encoder(tiny_still_encoder());
    enc.add_frame(&solid(4, 4, RED), 100).unwrap();
    enc.close().unwrap();
    assert_eq!(enc.into_inner(), b"RIFF\x04\x00\x00\x00WEBP");
}

#[test]
fn dispose_to_background() {
    init_logger();
    let mut mux = WebPMux::new();
    mux.set_canvas_size(8, 8);
    mux.add_frame(
        common::vp8l_frame(&solid(8, 8, RED)),
        FrameOptions {
            duration_ms: 50,
            dispose: DisposeMethod::Background,
            blend: BlendMethod::Overwrite,
            ..Default::default()
        },
    )
    .unwrap();
    mux.add_frame(
        common::vp8l_frame(&solid(2, 2, BLUE)),
        FrameOptions {
            duration_ms: 50,
            offset_x: 2,
            offset_y: 2,
            blend: BlendMethod::Overwrite,
            ..Default::default()
        },
    )
    .unwrap();
    let data = mux.assemble_to_vec().unwrap();

    let snaps = decode(&data);
    assert_eq!(snaps.len(), 2);
    let img = &snaps[1].image;
    for y in 0..8 {
        for x in 0..8 {
            let inside = (2..4).contains(&x) && (2..4).contains(&y);
            if inside {
                assert_eq!(img.pixel(x, y), BLUE, "({x}, {y})");
            } else {
                assert_eq!(img.pixel(x, y).a, 0, "({x}, {y})");
            }
        }
    }
    assert_eq!(snaps[1].timestamp_ms, 50);
}

#[test]
fn forced_keyframe() {
    let opts = EncodeOptions {
        kmax: 3,
        ..lossless()
    };
    let mut frames = vec![(solid(50, 50, RED), 50)];
    for i in 1..4 {
        let mut f = solid(50, 50, RED);
        f.set_pixel(10 * i, 10 * i, BLUE);
        frames.push((f, 50));
    }
    let data = encode(50, 50, opts, &frames);

    let demux = WebPDemuxer::new(&data).unwrap();
    assert_eq!(demux.num_frames(), 4);
    for i in 1..3 {
        let f = demux.frame(i).unwrap();
        assert!(f.width < 50 && f.height < 50, "frame {i} should be a sub-frame");
    }
    let last = demux.frame(3).unwrap();
    assert_eq!((last.offset_x, last.offset_y), (0, 0));
    assert_eq!((last.width, last.height), (50, 50));
    assert_eq!(last.blend, BlendMethod::Overwrite);

    let snaps = decode(&data);
    for (snap, (input, _)) in snaps.iter().zip(&frames) {
        assert_eq!(&snap.image, input);
    }
}

#[test]
fn identical_frames_extend_duration() {
    let data = encode(
        4,
        4,
        lossless(),
        &[
            (solid(4, 4, RED), 100),
            (solid(4, 4, RED), 100),
            (solid(4, 4, BLUE), 40),
        ],
    );
    let snaps = decode(&data);
    assert_eq!(snaps.len(), 2);
    assert_eq!(snaps[0].duration_ms, 200);
    assert_eq!(snaps[1].timestamp_ms, 200);
    assert_eq!(snaps[1].image, solid(4, 4, BLUE));
}

#[test]
fn duration_cap_emits_filler() {
    let max = zenwebp_core::mux::MAX_DURATION;
    let data = encode(
        4,
        4,
        lossless(),
        &[(solid(4, 4, RED), max - 5), (solid(4, 4, RED), 1000)],
    );
    let demux = WebPDemuxer::new(&data).unwrap();
    assert_eq!(demux.num_frames(), 2);
    assert_eq!(demux.frame(0).unwrap().duration_ms, max);
    let filler = demux.frame(1).unwrap();
    assert_eq!((filler.width, filler.height), (1, 1));
    assert_eq!(filler.duration_ms, 995);
    assert_eq!(filler.blend, BlendMethod::AlphaBlend);

    // The transparent filler leaves the canvas untouched.
    let snaps = decode(&data);
    assert_eq!(snaps[1].image, solid(4, 4, RED));
}

#[test]
fn clear_after_filler_frame_round_trips() {
    let max = zenwebp_core::mux::MAX_DURATION;
    let mut last = RgbaImage::new(8, 8);
    for y in 2..4 {
        for x in 2..4 {
            last.set_pixel(x, y, BLUE);
        }
    }
    let input = [
        (solid(8, 8, RED), max - 10),
        (solid(8, 8, RED), 30),
        (last.clone(), 40),
    ];
    let data = encode(8, 8, lossless(), &input);

    let snaps = decode(&data);
    assert_eq!(snaps.len(), 3);
    assert_eq!(snaps[1].image, solid(8, 8, RED));
    assert_eq!(snaps[2].image, last);
    assert_eq!(snaps[2].duration_ms, 40);
}

#[test]
fn random_opaque_sequence_round_trips() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let (w, h) = (24u32, 18u32);

    let mut canvas = RgbaImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            canvas.set_pixel(x, y, RGBA8::new(rng.gen(), rng.gen(), rng.gen(), 255));
        }
    }
    let mut frames = vec![(canvas.clone(), 30)];
    for _ in 0..12 {
        let x0 = rng.gen_range(0..w);
        let y0 = rng.gen_range(0..h);
        let x1 = rng.gen_range(x0..w) + 1;
        let y1 = rng.gen_range(y0..h) + 1;
        for y in y0..y1 {
            for x in x0..x1 {
                let mut p = canvas.pixel(x, y);
                p.r ^= 0x80;
                p.g = rng.gen();
                canvas.set_pixel(x, y, p);
            }
        }
        frames.push((canvas.clone(), rng.gen_range(10..200)));
    }

    let data = encode(w, h, lossless(), &frames);
    let snaps = decode(&data);
    assert_eq!(snaps.len(), frames.len());
    let mut t = 0u64;
    for (i, (snap, (input, duration))) in snaps.iter().zip(&frames).enumerate() {
        assert_eq!(&snap.image, input, "frame {i}");
        assert_eq!(snap.duration_ms, *duration);
        assert_eq!(snap.timestamp_ms, t);
        t += u64::from(*duration);
    }
}

#[test]
fn smaller_input_is_placed_on_canvas() {
    let data = encode(6, 6, lossless(), &[(solid(4, 2, RED), 10)]);
    let snaps = decode(&data);
    let img = &snaps[0].image;
    assert_eq!((img.width(), img.height()), (6, 6));
    assert_eq!(img.pixel(3, 1), RED);
    assert_eq!(img.pixel(4, 1).a, 0);
    assert_eq!(img.pixel(0, 2).a, 0);
}

#[test]
fn parallel_decode_matches_sequential() {
    let mut frames = Vec::new();
    for i in 0..8u8 {
        frames.push((solid(8, 8, RGBA8::new(i * 30, 0, 255 - i * 30, 255)), 20));
    }
    let data = encode(8, 8, lossless(), &frames);

    let mut seq = Animation::decode_bytes(&data)
        .unwrap()
        .with_frame_decoder(fake_decoder());
    seq.decode_frames().unwrap();
    let mut par = Animation::decode_bytes(&data)
        .unwrap()
        .with_frame_decoder(fake_decoder());
    par.decode_frames_parallel().unwrap();

    let a = AnimDecoder::new(&seq).decode_all().unwrap();
    let b = AnimDecoder::new(&par).decode_all().unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 8);
}

#[test]
fn decoder_without_pixels_fails() {
    let data = encode(4, 4, lossless(), &[(solid(4, 4, RED), 10)]);
    let anim = Animation::decode_bytes(&data).unwrap();
    let mut dec = AnimDecoder::new(&anim);
    assert!(matches!(
        dec.next_frame(),
        Err(Error::MissingPixels { index: 0 })
    ));
}

#[test]
fn lossy_frames_round_trip_metadata() {
    let opts = EncodeOptions {
        loop_count: 3,
        background_color: RGBA8::new(10, 20, 30, 255),
        ..Default::default()
    };
    let mut enc = AnimEncoder::new(Vec::new(), 4, 4, opts).with_frame_encoder(fake_encoder());
    enc.set_icc_profile(b"icc".to_vec());
    enc.add_frame(&solid(4, 4, RED), 10).unwrap();
    enc.add_frame(&solid(4, 4, BLUE), 10).unwrap();
    enc.close().unwrap();
    let data = enc.into_inner();

    let anim = Animation::decode_bytes(&data).unwrap();
    assert_eq!(anim.loop_count, 3);
    assert_eq!(anim.background_color, RGBA8::new(10, 20, 30, 255));
    assert_eq!(anim.icc.as_deref(), Some(&b"icc"[..]));
    assert_eq!(anim.total_duration_ms(), 20);
    assert!(!WebPDemuxer::new(&data).unwrap().frame(0).unwrap().is_lossless);
}
