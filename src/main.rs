//! Offer Verify
//!
//! Command-line quality gate for retail promotion photos. Checks an image
//! for blur, computes a perceptual fingerprint for duplicate lookup, and
//! extracts offer text with Tesseract, then prints one JSON verdict.

use chrono::Local;
use clap::Parser;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::process::ExitCode;

use offer_verify::config::{load_config, AnalyzerConfig};
use offer_verify::ocr::{TesseractRecognizer, TextRecognizer};
use offer_verify::paths;
use offer_verify::verify::{self, AnalysisVerdict};

#[derive(Parser, Debug)]
#[command(name = "offer-verify")]
#[command(version, about = "Analyzes an image for blur, duplicates, and text.", long_about = None)]
struct Cli {
    /// Path to the input image file
    #[arg(short, long, value_name = "PATH")]
    image: PathBuf,

    /// Config file (default: config.json next to the executable)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// One serialized verdict plus whether analysis succeeded.
struct Outcome {
    record: String,
    success: bool,
}

fn main() -> ExitCode {
    init_logging();
    install_panic_hook();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(paths::get_default_config_path);
    let config = load_config(&config_path);
    let recognizer = TesseractRecognizer::from_config(&config);

    // A panic must still leave exactly one record on stdout
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| run(&cli, &config, &recognizer)))
        .unwrap_or_else(|_| failure(AnalysisVerdict::failed("internal error during analysis")));

    println!("{}", outcome.record);

    if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run(cli: &Cli, config: &AnalyzerConfig, recognizer: &dyn TextRecognizer) -> Outcome {
    log::info!("Analyzing {}", cli.image.display());

    match verify::analyze_image(&cli.image, config, recognizer) {
        Ok(verdict) => match verdict.to_pretty_json() {
            Ok(record) => {
                log::info!("Verdict: valid={}", verdict.is_valid);
                Outcome {
                    record,
                    success: true,
                }
            }
            Err(e) => failure(AnalysisVerdict::failed(format!(
                "failed to serialize verdict: {e}"
            ))),
        },
        Err(e) => {
            log::error!("{}", e);
            failure(AnalysisVerdict::failed(e.to_string()))
        }
    }
}

fn failure(verdict: AnalysisVerdict) -> Outcome {
    // Compact form of a struct with only plain fields cannot fail
    let record = verdict.to_compact_json().unwrap_or_else(|e| {
        log::error!("Failed to serialize error verdict: {}", e);
        String::from(
            r#"{"blurry":null,"duplicate_hash":"","ocrText":"","confidence":0.0,"valid":false}"#,
        )
    });
    Outcome {
        record,
        success: false,
    }
}

/// Logs go to stderr only; stdout carries the verdict.
/// Level defaults to info and can be changed with RUST_LOG.
fn init_logging() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        log::error!("[PANIC]{} {}", location, msg);
    }));
}
