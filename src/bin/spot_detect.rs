//! spot_detect - detect named objects in photos for the spot-the-object game
//!
//! Each image gets exactly one `detect` call. Failures never abort the run:
//! degraded results are printed with the captured error.

use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use spot_detect::detect::LogNotifier;
use spot_detect::{
    DetectionResult, DetectionService, DetectorConfig, ExtractionStrategy, JsonArrayParser,
    RawImage,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image files to analyse.
    #[arg(required_unless_present = "status")]
    images: Vec<PathBuf>,
    /// Config file (JSON, or TOML by extension).
    #[arg(long, env = "SPOT_CONFIG")]
    config: Option<PathBuf>,
    /// Print results as JSON on stdout.
    #[arg(long)]
    json: bool,
    /// Skip the upstream call and use simulated detections.
    #[arg(long)]
    mock: bool,
    /// JSON extraction strategy (bracket|fenced).
    #[arg(long, default_value = "bracket")]
    strategy: ExtractionStrategy,
    /// Number of images analysed concurrently.
    #[arg(long, default_value_t = 1)]
    jobs: usize,
    /// Print whether the upstream credential is configured and exit.
    #[arg(long)]
    status: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[derive(Serialize)]
struct ImageReport<'a> {
    image: String,
    #[serde(flatten)]
    result: &'a DetectionResult,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.jobs == 0 {
        return Err(anyhow!("--jobs must be at least 1"));
    }

    let config = DetectorConfig::load_from(args.config.as_deref())?;
    let service = if args.mock {
        let mock_only = DetectorConfig {
            api_key: None,
            ..config.clone()
        };
        DetectionService::from_config(&mock_only)
    } else {
        DetectionService::from_config(&config)
    };
    let service = service
        .with_parser(JsonArrayParser::new(args.strategy))
        .with_notifier(Arc::new(LogNotifier));

    if args.status {
        let state = if service.is_configured() {
            "configured"
        } else {
            "unconfigured (mock detection)"
        };
        println!("upstream: {} ({})", config.upstream.url, state);
        println!("model: {}", config.upstream.model);
        return Ok(());
    }

    log::info!(
        "analysing {} image(s) with {:?}",
        args.images.len(),
        service.state()
    );

    let ui = ui::Ui::from_flag(&args.ui, std::io::stderr().is_terminal());
    let results = {
        let progress = ui.batch(args.images.len());
        run_batch(&service, &args.images, args.jobs, |path| {
            progress.image_done(&path.display().to_string())
        })
    };

    if args.json {
        let reports: Vec<ImageReport<'_>> = args
            .images
            .iter()
            .zip(results.iter())
            .map(|(path, result)| ImageReport {
                image: path.display().to_string(),
                result,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for (path, result) in args.images.iter().zip(results.iter()) {
            print_result(path, result);
        }
    }
    Ok(())
}

/// Runs `detect` over `images` with at most `jobs` calls in flight and
/// returns results in input order.
fn run_batch<F>(
    service: &DetectionService,
    images: &[PathBuf],
    jobs: usize,
    on_done: F,
) -> Vec<DetectionResult>
where
    F: Fn(&PathBuf) + Sync,
{
    let chunk_size = images.len().div_ceil(jobs).max(1);
    std::thread::scope(|scope| {
        let handles: Vec<_> = images
            .chunks(chunk_size)
            .map(|chunk| {
                let on_done = &on_done;
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|path| {
                            let result = service.detect(RawImage::from_path(path));
                            on_done(path);
                            result
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(results) => results,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

fn print_result(path: &std::path::Path, result: &DetectionResult) {
    let marker = if result.success { "" } else { " [simulado]" };
    println!("{}{}", path.display(), marker);
    if let Some(error) = &result.error {
        println!("  error: {}", error);
    }
    for object in &result.objects {
        println!(
            "  {:<16} {:>5.1}%",
            object.name(),
            object.confidence() * 100.0
        );
    }
}
