//! Entry point for the Svarog3D mesh viewer.
//!
//! Flags:
//!   --mesh=<file.obj> | --shape=plane|cube|sphere
//!   --gpu-backend=auto|vulkan|dx12|metal|gl
//!   --size=WxH | --width=W --height=H
//!   --headless   build + upload + draw once against a recording context

use std::path::PathBuf;

use anyhow::{Context, Result};
use asset::{MeshSource, ShapeKind};
use platform::ViewerConfig;
use renderer::{RecordingContext, draw_mesh, recording::Command, upload_mesh};

fn parse_backend_arg(args: &[String]) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all(); // default = auto
    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown backend '{}', falling back to auto.", other);
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

fn parse_size_args(args: &[String]) -> (u32, u32) {
    let mut w: Option<u32> = None;
    let mut h: Option<u32> = None;

    for arg in args {
        if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    w = Some(pw);
                    h = Some(ph);
                }
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                w = Some(pw);
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                h = Some(ph);
            }
        }
    }

    let ww = w.unwrap_or(1280).max(1);
    let hh = h.unwrap_or(720).max(1);
    (ww, hh)
}

/// `--mesh=` wins over `--shape=`; the default is the cube.
fn parse_source_args(args: &[String]) -> Result<MeshSource> {
    let mut source = MeshSource::Shape(ShapeKind::Cube);
    let mut has_mesh = false;
    for arg in args {
        if let Some(path) = arg.strip_prefix("--mesh=") {
            source = MeshSource::ObjFile(PathBuf::from(path));
            has_mesh = true;
        } else if let Some(kind) = arg.strip_prefix("--shape=") {
            if has_mesh {
                continue;
            }
            source = MeshSource::Shape(kind.parse::<ShapeKind>()?);
        }
    }
    Ok(source)
}

fn parse_headless_arg(args: &[String]) -> bool {
    args.iter().any(|a| a == "--headless")
}

/// Build, upload, draw once and release against a recording context, then
/// summarize the command stream.
fn run_headless(source: &MeshSource) -> Result<()> {
    let mesh = source
        .build()
        .with_context(|| format!("Failed to build mesh from {source}"))?;
    let mut ctx = RecordingContext::new();
    let gpu = upload_mesh(&mut ctx, mesh).context("Failed to upload mesh")?;
    log::info!(
        "Uploaded {}: handles={:?}, {} bytes resident",
        source,
        gpu.handles(),
        ctx.resident_bytes()
    );

    draw_mesh(&mut ctx, &gpu).context("Failed to draw mesh")?;
    for draw in ctx.draw_calls() {
        match draw {
            Command::DrawElements { count, .. } => log::info!("Indexed draw: {} indices", count),
            Command::DrawArrays { count, .. } => log::info!("Flat draw: {} vertices", count),
            _ => {}
        }
    }

    gpu.destroy(&mut ctx);
    log::info!(
        "Released: {} live objects, {} commands recorded",
        ctx.live_objects(),
        ctx.commands().len()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let source = parse_source_args(&args)?;

    if parse_headless_arg(&args) {
        log::info!("Headless run for {}", source);
        return run_headless(&source);
    }

    let backends = parse_backend_arg(&args);
    let (width, height) = parse_size_args(&args);
    log::info!(
        "Starting Svarog3D mesh viewer. Backend: {:?}, window_size={}x{}, source={}",
        backends,
        width,
        height,
        source
    );

    platform::run_viewer(ViewerConfig {
        backends,
        width,
        height,
        source,
    })?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
