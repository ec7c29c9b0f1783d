//! Frame orchestration end to end on the CPU device

use glam::{Vec3, Vec4};
use pathtracer::prelude::*;
use pathtracer::renderer::ResetReason;
use pathtracer::scene::sphere_on_floor;

const W: i32 = 16;
const H: i32 = 12;

fn config(spp: u32) -> RendererConfig {
    RendererConfig {
        width: W as u32,
        height: H as u32,
        samples_per_pixel: spp,
        environment: EnvironmentKind::Uniform([0.3, 0.4, 0.5]),
        ..Default::default()
    }
}

fn renderer(config: RendererConfig) -> Renderer {
    let mut r = Renderer::new(CpuDevice::default(), config);
    r.load_demo(&sphere_on_floor());
    r.on_init().unwrap();
    r
}

fn assert_close(a: &[Vec4], b: &[Vec4], tol: f32) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        let d = (*x - *y).abs().max_element();
        assert!(d <= tol * (1.0 + y.abs().max_element()), "texel {i}: {x} vs {y}");
    }
}

#[test]
fn test_n_frames_match_n_spp() {
    const N: u32 = 4;

    let mut frames = renderer(config(1));
    for _ in 0..N {
        frames.render_frame().unwrap();
    }
    assert_eq!(frames.accumulated_frames(), N);
    assert_eq!(frames.stats().frame_index, N);

    let mut single = renderer(config(N));
    single.render_frame().unwrap();
    assert_eq!(single.accumulated_frames(), 1);

    // Both hold the same samples: N frames of 1 spp vs. 1 frame of the N-sample mean
    let a: Vec<Vec4> = frames.read_accumulation().unwrap().iter().map(|t| *t / N as f32).collect();
    let b = single.read_accumulation().unwrap();
    assert_close(&a, &b, 1e-5);

    // And the displayed averages agree up to rounding
    let da = frames.display_pixels().unwrap();
    let db = single.display_pixels().unwrap();
    for (x, y) in da.iter().zip(&db) {
        for c in 0..4 {
            assert!(x[c].abs_diff(y[c]) <= 1, "{x:?} vs {y:?}");
        }
    }
}

#[test]
fn test_reset_discards_previous_energy() {
    let mut r = renderer(config(1));
    for _ in 0..5 {
        r.render_frame().unwrap();
    }

    let input = FrameInput {
        movement: Vec3::new(0.0, 0.0, 1.0),
        dt: 0.05,
        ..FrameInput::idle(W, H)
    };
    let stats = r.frame(&input).unwrap().clone();
    assert_eq!(stats.frame_index, 1);
    assert_eq!(stats.reset.as_slice(), &[ResetReason::CameraMoved]);
    assert_eq!(r.accumulated_frames(), 1);

    // A fresh renderer given the same input lands on the same pose and frame
    let mut fresh = renderer(config(1));
    fresh.frame(&input).unwrap();
    assert_eq!(fresh.camera().position(), r.camera().position());
    assert_close(&r.read_accumulation().unwrap(), &fresh.read_accumulation().unwrap(), 1e-5);
}

#[test]
fn test_accumulation_off_repeats_first_frame() {
    let mut r = renderer(config(1));
    r.set_accumulate(false);

    r.render_frame().unwrap();
    let first = r.read_accumulation().unwrap();
    for _ in 0..3 {
        let stats = r.render_frame().unwrap();
        assert_eq!(stats.frame_index, 1);
        assert_eq!(r.read_accumulation().unwrap(), first);
    }

    r.set_accumulate(true);
    r.render_frame().unwrap();
    let stats = r.render_frame().unwrap();
    assert_eq!(stats.frame_index, 2);
}

#[test]
fn test_resize_clears_and_restarts() {
    let mut r = renderer(config(1));
    r.render_frame().unwrap();
    r.render_frame().unwrap();

    r.frame(&FrameInput::idle(8, 8)).unwrap();
    assert_eq!(r.accumulated_frames(), 1);
    assert_eq!(r.read_accumulation().unwrap().len(), 64);

    // Zero-sized reports are deferred, the real size applies later
    r.frame(&FrameInput::idle(0, 0)).unwrap();
    assert_eq!(r.size().to_array(), [8, 8]);
    assert_eq!(r.accumulated_frames(), 2);
    r.frame(&FrameInput::idle(4, 2)).unwrap();
    assert_eq!(r.size().to_array(), [4, 2]);
    assert_eq!(r.accumulated_frames(), 1);
}

#[test]
fn test_deterministic_frames() {
    let mut a = renderer(config(2));
    let mut b = renderer(config(2));
    for _ in 0..3 {
        a.render_frame().unwrap();
        b.render_frame().unwrap();
    }
    assert_eq!(a.read_accumulation().unwrap(), b.read_accumulation().unwrap());
}

#[test]
fn test_every_demo_scene_renders() {
    for name in DEMO_SCENES {
        let mut r = Renderer::new(CpuDevice::default(), config(1));
        r.load_demo(&demo_scene(name).unwrap());
        r.on_init().unwrap();
        let stats = r.render_frame().unwrap();
        assert!(stats.dispatched, "{name}");
        for t in r.read_accumulation().unwrap() {
            assert!(t.is_finite() && t.min_element() >= 0.0, "{name}: {t}");
        }
    }
}

#[test]
fn test_export_after_render() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sphere.png");
    let mut r = renderer(config(1));
    r.render_frame().unwrap();
    r.save_png(&path).unwrap();

    let img = image::open(&path).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (W as u32, H as u32));
}
