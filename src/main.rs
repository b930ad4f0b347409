use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use visim::config::Config;
use visim::context::ServiceContext;
use visim::{logging, server};

fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("visim {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config_path
}

fn print_help() {
    println!(
        r#"visim - multimodal embedding service with similarity search

USAGE:
    visim [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Print version
    --help, -h          Show this help message

ENVIRONMENT:
    VISIM_CONFIG        Path to config file (overrides default location)
    VISIM_LOG           Log level (trace, debug, info, warn, error)

The server loads the decoder, both embedding models, and the similarity
index at startup and refuses to start if any artifact is missing.
"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = parse_args();

    logging::init(None)?;

    let config = match config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Config loaded");

    // All artifacts load before the listener binds; any failure aborts
    // startup with the specific load diagnostic.
    let context = match ServiceContext::load(config) {
        Ok(context) => Arc::new(context),
        Err(e) => {
            error!("Startup failed: {}", e);
            return Err(e.into());
        }
    };

    let server_config = context.config.server.clone();
    server::run(context, &server_config).await
}
