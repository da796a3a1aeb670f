use clap::Parser;

use reelgen::cli::{self, Args, Command};
use reelgen::interrupt::setup_ctrlc_handler;

/// Loads environment variables from a .env file in the working directory.
/// Does not override existing environment variables.
fn load_env() {
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();
}

fn main() {
    // Load .env file before anything else
    load_env();
    init_logging();

    let args = Args::parse();
    let config_path = args.config.as_deref();

    let result = match &args.command {
        Command::Generate(generate) => {
            if let Err(e) = setup_ctrlc_handler() {
                log::warn!("Could not install Ctrl+C handler: {}", e);
            }
            cli::run_generate(generate, config_path)
        }
        Command::Script {
            topic,
            context_urls,
        } => cli::run_script(topic, context_urls, config_path),
        Command::Config { action } => cli::handle_config_action(action.clone(), config_path),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
