use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use image_pair_gen::constants::{
    API_CALL_LOG_FILE, DEFAULT_GLOBAL_CONFIG_PATH, DEFAULT_PROMPT_CONFIG_PATH,
};
use image_pair_gen::{list_available_models, run_generation, RunOptions, RunOutcome};
use log::info;

/// Generate style-transfer image pairs with Gemini.
#[derive(Debug, clap::Parser)]
#[command(author, version, about)]
struct Cli {
    /// Global configuration file
    #[arg(long, default_value = DEFAULT_GLOBAL_CONFIG_PATH)]
    global_config: PathBuf,

    /// Prompt configuration file
    #[arg(long, default_value = DEFAULT_PROMPT_CONFIG_PATH)]
    prompt_config: PathBuf,

    /// Overrides gemini.api_key from the global configuration
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Where every saved generation is recorded
    #[arg(long, default_value = API_CALL_LOG_FILE)]
    api_log: PathBuf,

    /// List the models available to the API key and exit
    #[arg(long)]
    list_models: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let options = RunOptions {
        global_config_path: cli.global_config,
        prompt_config_path: cli.prompt_config,
        api_key: cli.api_key,
        api_log_path: cli.api_log,
    };

    if cli.list_models {
        for model in list_available_models(&options).await? {
            println!(
                "{}\t{}\t{}",
                model.name,
                model.display_name.as_deref().unwrap_or(""),
                model.supported_generation_methods.join(",")
            );
        }
        return Ok(());
    }

    let stdin = io::stdin();
    match run_generation(&options, stdin.lock(), io::stdout()).await? {
        RunOutcome::Cancelled => info!("Cancelled by user."),
        RunOutcome::Completed => info!("All done."),
    }
    Ok(())
}
