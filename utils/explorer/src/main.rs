use std::io::{BufReader, IsTerminal};

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use explorer::layouts::LAYOUTS;
use explorer::logging::init_tracing;
use explorer::{AppConfig, SessionController, Shell, available_models, create_model};
use tracing::info;

#[derive(Parser)]
#[command(name = "fmu-explore")]
#[command(about = "Interactive exploration of a simulation model unit")]
#[command(version)]
struct Args {
    /// Application description (YAML); the built-in batch cultivation if omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<Utf8PathBuf>,

    /// Model to use instead of the one named by the application
    #[arg(short, long)]
    model: Option<String>,

    /// Execute commands from a file instead of standard input
    #[arg(short, long, value_name = "FILE")]
    script: Option<Utf8PathBuf>,

    /// Decimals shown by disp and describe
    #[arg(long)]
    decimals: Option<usize>,

    /// List available models and exit
    #[arg(long)]
    list_models: bool,

    /// List plot layouts and exit
    #[arg(long)]
    list_layouts: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    if args.list_models {
        println!("Available models:");
        for model in available_models() {
            println!("  - {}", model);
        }
        return Ok(());
    }
    if args.list_layouts {
        println!("Available layouts:");
        for layout in LAYOUTS {
            println!("  - {}", layout);
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load application description {}", path))?,
        None => AppConfig::builtin().context("Built-in application description is invalid")?,
    };
    if let Some(decimals) = args.decimals {
        config.decimals = decimals;
    }

    let model_id = args.model.as_deref().unwrap_or(&config.model).to_string();
    let model = create_model(&model_id)?;
    info!(application = %config.application, model = %model_id, "model loaded");
    let controller =
        SessionController::new(model, config).context("Failed to set up the session")?;
    let stdout = std::io::stdout();
    let mut shell = Shell::new(controller, stdout.lock());

    match &args.script {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Failed to open script {}", path))?;
            shell.run(BufReader::new(file), false)?;
        }
        None => {
            let stdin = std::io::stdin();
            let interactive = stdin.is_terminal();
            if interactive {
                shell.banner()?;
            }
            shell.run(stdin.lock(), interactive)?;
        }
    }
    Ok(())
}
