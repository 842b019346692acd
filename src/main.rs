use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use inpaint_tools::generation::{GenerationService, HttpGenerationService, spawn_generation};
use inpaint_tools::geometry::Point;
use inpaint_tools::{EditorConfig, GenerationError, Session};
use serde::Deserialize;

/// Headless inpainting: export image + mask, run a generation, check the service.
#[derive(Parser, Debug)]
#[command(name = "inpaint-tools", version, about)]
struct Cli {
    /// JSON config file (fields default when missing)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Generation service base URL, overrides config and INPAINT_API_URL
    #[arg(long, global = true, value_name = "URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the cropped image and its black/white mask as PNGs
    Export {
        #[arg(short, long)]
        image: PathBuf,
        /// Mask strokes: `[{"points": [[x, y], ...], "width": 30}]` in image pixels
        #[arg(short, long)]
        strokes: Option<PathBuf>,
        #[arg(long, default_value = "image.png")]
        out_image: PathBuf,
        #[arg(long, default_value = "mask.png")]
        out_mask: PathBuf,
        /// Also write the `/generate` request body for this prompt
        #[arg(short, long)]
        prompt: Option<String>,
        #[arg(long, default_value = "request.json")]
        out_request: PathBuf,
    },
    /// Send image, mask and prompt to the service and save the committed result
    Generate {
        #[arg(short, long)]
        image: PathBuf,
        #[arg(short, long)]
        strokes: PathBuf,
        #[arg(short, long)]
        prompt: String,
        #[arg(short, long, default_value = "result.png")]
        output: PathBuf,
    },
    /// Query the service health endpoint
    Health,
}

#[derive(Debug, Deserialize)]
struct StrokeSpec {
    points: Vec<[f32; 2]>,
    #[serde(default)]
    width: Option<f32>,
}

fn main() -> ExitCode {
    inpaint_tools::init_logging("info");
    let cli = Cli::parse();

    let mut config = match EditorConfig::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };
    if let Some(url) = cli.url {
        config.service_url = url;
    }

    let result = match cli.command {
        Command::Export {
            image,
            strokes,
            out_image,
            out_mask,
            prompt,
            out_request,
        } => run_export(
            config,
            &image,
            strokes.as_deref(),
            ExportOutputs {
                image: &out_image,
                mask: &out_mask,
                request: prompt.as_deref().map(|p| (p, out_request.as_path())),
            },
        ),
        Command::Generate {
            image,
            strokes,
            prompt,
            output,
        } => run_generate(config, &image, &strokes, &prompt, &output),
        Command::Health => run_health(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_strokes(session: &mut Session, path: &Path) -> Result<usize, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading strokes file '{}': {}", path.display(), e))?;
    let specs: Vec<StrokeSpec> = serde_json::from_str(&text)
        .map_err(|e| format!("Error parsing strokes file '{}': {}", path.display(), e))?;

    let mut added = 0;
    for spec in specs {
        let points = spec.points.iter().map(|[x, y]| Point::new(*x, *y)).collect();
        if session.add_mask_stroke(points, spec.width) {
            added += 1;
        }
    }
    Ok(added)
}

fn open_session(config: EditorConfig, image: &Path) -> Result<Session, String> {
    let mut session = Session::new(config);
    session
        .load_image_file(image)
        .map_err(|e| format!("Error loading '{}': {}", image.display(), e))?;
    Ok(session)
}

struct ExportOutputs<'a> {
    image: &'a Path,
    mask: &'a Path,
    request: Option<(&'a str, &'a Path)>,
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), String> {
    std::fs::write(path, contents).map_err(|e| format!("Error writing '{}': {}", path.display(), e))
}

fn run_export(
    config: EditorConfig,
    image: &Path,
    strokes: Option<&Path>,
    out: ExportOutputs,
) -> Result<(), String> {
    let mut session = open_session(config, image)?;
    if let Some(strokes) = strokes {
        let added = load_strokes(&mut session, strokes)?;
        tracing::info!("Applied {} mask stroke(s)", added);
    }

    let data = session.export_image_and_mask()?;
    write_file(out.image, &data.image.png)?;
    write_file(out.mask, &data.mask.png)?;
    println!(
        "Exported {}x{} image to '{}' and mask to '{}'",
        data.image.width,
        data.image.height,
        out.image.display(),
        out.mask.display()
    );

    if let Some((prompt, path)) = out.request {
        let request = session.build_generate_request(prompt)?;
        let json = serde_json::to_string_pretty(&request)
            .map_err(|e| format!("Error serializing request: {}", e))?;
        write_file(path, json.as_bytes())?;
        println!("Wrote request body to '{}'", path.display());
    }
    Ok(())
}

fn run_generate(
    config: EditorConfig,
    image: &Path,
    strokes: &Path,
    prompt: &str,
    output: &Path,
) -> Result<(), String> {
    let service = HttpGenerationService::from_config(&config)?;
    let mut session = open_session(config, image)?;
    load_strokes(&mut session, strokes)?;

    let request = session.build_generate_request(prompt)?;
    let start = Instant::now();
    let pending = spawn_generation(std::sync::Arc::new(service), request, session.liveness());
    let outcome = pending
        .wait()
        .ok_or_else(|| GenerationError::Failed("session closed".into()))?;

    session.apply_generation(outcome)?;
    session.commit_result();
    tracing::info!("Round trip took {:.1}s", start.elapsed().as_secs_f32());

    let data = session.export_image_and_mask()?;
    write_file(output, &data.image.png)?;
    println!(
        "Saved {}x{} result to '{}'",
        data.image.width,
        data.image.height,
        output.display()
    );
    Ok(())
}

fn run_health(config: &EditorConfig) -> Result<(), String> {
    let service = HttpGenerationService::from_config(config)?;
    let health = service.health()?;
    println!(
        "{}: {} (provider: {})",
        config.service_url,
        health.status,
        health.provider.as_deref().unwrap_or("unknown")
    );
    Ok(())
}
