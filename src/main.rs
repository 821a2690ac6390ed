use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use lumen::Provider;
use lumen::core::config::{load_config, resolve};
use lumen::tui::{self, Prefill};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

#[derive(Parser)]
#[command(name = "lumen", about = "Terminal chat client for hosted AI models")]
struct Args {
    /// LLM provider to use (overrides config and LUMEN_PROVIDER)
    #[arg(short, long, value_enum)]
    provider: Option<Provider>,

    /// Model to use (overrides config and LUMEN_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Pre-fill the draft with this prompt
    #[arg(short = 'q', long)]
    prompt: Option<String>,

    /// Attach files to the first message
    #[arg(short, long, num_args = 1..)]
    attach: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to lumen.log in current directory
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create("lumen.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("lumen: {e}");
            std::process::exit(1);
        }
    };
    let resolved = resolve(
        &config,
        args.provider.map(Provider::as_str),
        args.model.as_deref(),
    );
    log::info!(
        "Lumen starting up with provider: {}, model: {}",
        resolved.provider,
        resolved.model_name
    );

    let relay = match tui::build_provider(&resolved) {
        Ok(relay) => relay,
        Err(e) => {
            log::error!("Startup failed: {}", e);
            eprintln!("lumen: {e}");
            std::process::exit(1);
        }
    };

    tui::run(
        resolved,
        relay,
        Prefill {
            prompt: args.prompt,
            attach: args.attach,
        },
    )
}
