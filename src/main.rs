use anyhow::Result;
use clap::Parser;
use docstringer::driver::{Driver, Mode};
use docstringer::generate::OpenAIGenerator;
use docstringer::prompt::PromptBuilder;
use docstringer::scan::SourceScanner;
use docstringer::Config;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "docstringer", version)]
#[command(about = "Add missing docstrings to Python functions, in place")]
struct Args {
    /// Root directory to scan
    root: PathBuf,

    /// Estimate the cost without calling the service or writing files
    #[arg(long)]
    dryrun: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of files processed concurrently (overrides run.concurrency)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Config file (defaults to $DOCSTRINGER_CONFIG, then ./docstringer.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", log_level(args.verbose)),
    )
    .init();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(concurrency) = args.concurrency {
        config.run.concurrency = concurrency;
        config.validate()?;
    }

    let scanner = SourceScanner::new(&args.root, config.run.max_file_size)?;
    let prompts = PromptBuilder::from_file(config.generation.prompt_file.as_deref())?;

    let mode = if args.dryrun {
        Mode::DryRun
    } else {
        let api_key = config.api_key()?;
        let generator = OpenAIGenerator::new(api_key, &config.generation)?;
        log::info!("Using model {} at {}", config.generation.model, generator.endpoint());
        Mode::Generate(Arc::new(generator))
    };

    // Stop issuing requests on Ctrl-C; files already being written finish atomically
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::warn!("Interrupted, finishing in-flight files");
                cancel_clone.store(true, Ordering::SeqCst);
            }
            Err(e) => {
                log::error!("Failed to listen for interrupt signal: {}", e);
            }
        }
    });

    let driver = Driver::new(&config, scanner, prompts, mode).with_cancel_flag(cancel);
    let summary = driver
        .run_with_progress(|outcome| {
            if let Some(line) = outcome.status_line() {
                println!("{}", line);
            }
        })
        .await;

    print!("{}", summary);
    if summary.failure_count() > 0 {
        log::warn!("Some functions or files were skipped. Run with -v for details.");
    }

    Ok(())
}
