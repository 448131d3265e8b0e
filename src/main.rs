use palette_sampler::{init_logging, CoordinateUnit, CreateOptions, LogConfig, SamplerConfig, SamplerService};
use std::path::Path;
use std::process::ExitCode;

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic" | "heif") => "image/heic",
        _ => "image/png",
    }
}

fn run(path: &Path, bytes: &[u8], points: &[(f64, f64)]) -> palette_sampler::Result<()> {
    let service = SamplerService::new(SamplerConfig::default())?;

    let created = service.create_session(
        bytes,
        mime_for(path),
        CreateOptions {
            filename: path.file_name().map(|name| name.to_string_lossy().into_owned()),
            ..CreateOptions::default()
        },
    )?;

    println!("{}x{} dominant {}", created.width, created.height, created.dominant);
    for color in &created.palette {
        println!("  {color}");
    }

    for &(x, y) in points {
        let sample = service.sample_color(&created.token, x, y, CoordinateUnit::Normalized, Some(2))?;
        println!("({x}, {y}) -> {} at {},{}", sample.hex(), sample.x, sample.y);
    }

    service.close_session(&created.token);
    Ok(())
}

fn main() -> ExitCode {
    let _ = init_logging(&LogConfig::default());

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: palette-sampler <image> [x,y ...]");
        return ExitCode::FAILURE;
    };

    let points: Vec<(f64, f64)> = args
        .filter_map(|arg| {
            let (x, y) = arg.split_once(',')?;
            Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
        })
        .collect();

    let path = Path::new(&path);
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("{}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };

    match run(path, &bytes, &points) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
