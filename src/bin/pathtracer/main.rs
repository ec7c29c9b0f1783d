//! pathtracer CLI - headless rendering and the interactive viewer.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use pathtracer::prelude::*;

#[cfg(feature = "viewer")]
type TraceGuard = Option<tracing_chrome::FlushGuard>;
#[cfg(not(feature = "viewer"))]
type TraceGuard = ();

/// Install the fmt subscriber (filter from `RUST_LOG`, else `default_level`).
/// With `PATHTRACER_TRACE=1` a Chrome trace is also written to `trace.json`.
#[cfg(feature = "viewer")]
fn init_tracing(default_level: &str) -> TraceGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt = tracing_subscriber::fmt::layer().with_target(false);

    let (chrome, guard) = if std::env::var("PATHTRACER_TRACE").ok().as_deref() == Some("1") {
        let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new().file("trace.json").build();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };
    tracing_subscriber::registry().with(filter).with(fmt).with(chrome).init();
    guard
}

#[cfg(not(feature = "viewer"))]
fn init_tracing(default_level: &str) -> TraceGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry().with(filter).with(fmt).init();
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    let _guard = init_tracing(level);

    let Some(&command) = filtered_args.first() else {
        print_help();
        return;
    };

    let result = match command {
        "r" | "render" => cmd_render(&filtered_args[1..]),
        "v" | "view" => cmd_view(&filtered_args[1..]),
        "s" | "scenes" => {
            for name in DEMO_SCENES {
                println!("{name}");
            }
            Ok(())
        }
        "--version" | "-V" => {
            println!(
                "pathtracer {} (built {} {})",
                env!("CARGO_PKG_VERSION"),
                env!("PATHTRACER_BUILD_DATE"),
                env!("PATHTRACER_BUILD_TIME")
            );
            Ok(())
        }
        "h" | "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_help() {
    println!("pathtracer - progressive path tracer");
    println!();
    println!("USAGE:");
    println!("    pathtracer [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    r, render [render options]     Render a demo scene headless and save a PNG");
    println!("    v, view   [--scene NAME]       Open the interactive viewer (Esc to exit)");
    println!("    s, scenes                      List demo scenes");
    println!("    h, help                        Show this help");
    println!();
    println!("RENDER OPTIONS:");
    println!("    --scene NAME      Demo scene (default: cornell)");
    println!("    --frames N        Frames to accumulate (default: 64)");
    println!("    --size WxH        Image size (default: from config, 640x360)");
    println!("    --spp N           Samples per pixel per frame");
    println!("    --config FILE     Renderer configuration (JSON)");
    println!("    --out FILE        Output PNG (default: render.png)");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Errors only");
    println!("    -V, --version    Print version and build date");
    println!();
    println!("EXAMPLES:");
    println!("    pathtracer render --scene cornell --frames 256 --out cornell.png");
    println!("    pathtracer render --scene materials --size 1280x720 --spp 4");
    println!("    pathtracer view --scene sphere");
    println!();
    println!("NOTES:");
    println!("    - RUST_LOG overrides the log filter");
    println!("    - PATHTRACER_TRACE=1 writes a Chrome trace to trace.json");
}

/// Options of the `render` command.
struct RenderArgs<'a> {
    scene: &'a str,
    frames: u32,
    size: Option<(u32, u32)>,
    spp: Option<u32>,
    config: Option<&'a str>,
    out: &'a str,
}

impl<'a> RenderArgs<'a> {
    fn parse(args: &[&'a str]) -> Result<Self> {
        let mut parsed = Self {
            scene: "cornell",
            frames: 64,
            size: None,
            spp: None,
            config: None,
            out: "render.png",
        };
        let mut it = args.iter();
        while let Some(&flag) = it.next() {
            let mut value = || it.next().copied().with_context(|| format!("missing value for {flag}"));
            match flag {
                "--scene" => parsed.scene = value()?,
                "--frames" => parsed.frames = value()?.parse().context("--frames expects a number")?,
                "--size" => parsed.size = Some(parse_size(value()?)?),
                "--spp" => parsed.spp = Some(value()?.parse().context("--spp expects a number")?),
                "--config" => parsed.config = Some(value()?),
                "--out" | "-o" => parsed.out = value()?,
                other => bail!("unknown render option '{other}'"),
            }
        }
        Ok(parsed)
    }
}

fn parse_size(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s.split_once(['x', 'X']).with_context(|| format!("size '{s}' is not WxH"))?;
    let w: u32 = w.trim().parse().with_context(|| format!("bad width in '{s}'"))?;
    let h: u32 = h.trim().parse().with_context(|| format!("bad height in '{s}'"))?;
    if w == 0 || h == 0 {
        bail!("size '{s}' must be positive");
    }
    Ok((w, h))
}

fn load_config(path: Option<&str>) -> Result<RendererConfig> {
    match path {
        Some(path) => RendererConfig::from_json_file(path).with_context(|| format!("loading config {path}")),
        None => Ok(RendererConfig::default()),
    }
}

fn cmd_render(args: &[&str]) -> Result<()> {
    let args = RenderArgs::parse(args)?;
    let mut config = load_config(args.config)?;
    if let Some((w, h)) = args.size {
        config.width = w;
        config.height = h;
    }
    if let Some(spp) = args.spp {
        config.samples_per_pixel = spp.max(1);
    }

    let demo = demo_scene(args.scene)
        .with_context(|| format!("unknown scene '{}' (see 'pathtracer scenes')", args.scene))?;

    let mut renderer = Renderer::new(CpuDevice::new(config.limits), config);
    renderer.load_demo(&demo);
    renderer.on_init().context("initializing renderer")?;

    let start = Instant::now();
    for _ in 0..args.frames {
        let stats = renderer.render_frame()?.clone();
        if !stats.dispatched {
            bail!("frame skipped: {}", renderer.last_error().unwrap_or("unknown error"));
        }
        tracing::debug!(
            frame = stats.frame_index,
            ms = stats.dispatch_time.as_secs_f32() * 1000.0,
            "frame done"
        );
    }
    let elapsed = start.elapsed();
    tracing::info!(
        scene = args.scene,
        frames = renderer.accumulated_frames(),
        seconds = elapsed.as_secs_f32(),
        "render finished"
    );

    renderer
        .save_png(args.out)
        .with_context(|| format!("writing {}", args.out))?;
    renderer.on_shutdown();
    println!("Saved {}", args.out);
    Ok(())
}

fn cmd_view(args: &[&str]) -> Result<()> {
    let mut scene = None;
    let mut config = None;
    let mut it = args.iter();
    while let Some(&flag) = it.next() {
        match flag {
            "--scene" => scene = it.next().map(|s| s.to_string()),
            "--config" => config = Some(load_config(it.next().copied())?),
            // Bare scene name
            name if !name.starts_with('-') => scene = Some(name.to_string()),
            other => bail!("unknown view option '{other}'"),
        }
    }

    launch_viewer(scene, config)
}

#[cfg(feature = "viewer")]
fn launch_viewer(scene: Option<String>, config: Option<RendererConfig>) -> Result<()> {
    pathtracer::viewer::run(scene, config)
}

#[cfg(not(feature = "viewer"))]
fn launch_viewer(_scene: Option<String>, _config: Option<RendererConfig>) -> Result<()> {
    bail!("Viewer not available. Rebuild with: cargo build --features viewer")
}
