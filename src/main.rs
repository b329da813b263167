use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::error;
use tracing_subscriber::EnvFilter;

use llmanager::chat_loop::run_chat_loop;
use llmanager::config::LlmConfig;
use llmanager::registry::{SessionConstructor, SessionRegistry};
use llmanager::session::SessionEnv;

#[derive(Parser)]
#[command(name = "llmanager")]
#[command(author, version, about = "Chat with OpenAI, Anthropic, Google or Ollama models from the terminal", long_about = None)]
struct Cli {
    /// Provider to use: openai, anthropic, google or ollama
    #[arg(short, long)]
    provider: String,

    /// Config file; defaults to configs/{provider}_config.json
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// System prompt added before the first turn
    #[arg(short, long)]
    system: Option<String>,

    /// List the models available for the provider and exit
    #[arg(short, long)]
    list: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn prepare(cli: &Cli, registry: &SessionRegistry) -> Result<(LlmConfig, SessionConstructor)> {
    let (provider, constructor) = registry.resolve(&cli.provider)?;
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| LlmConfig::default_path(provider));
    let config = LlmConfig::from_json_file(provider, &path)
        .with_context(|| format!("error when creating the {provider} configuration"))?;
    Ok((config, constructor))
}

async fn run(cli: &Cli, config: LlmConfig, constructor: SessionConstructor) -> Result<()> {
    let provider = config.provider;
    let env = SessionEnv::from_process_env()?;
    let mut session = constructor(config, &env)
        .with_context(|| format!("failed to create the {provider} session"))?;

    if cli.list {
        session
            .list_models()
            .await
            .with_context(|| format!("failed to list {provider} models"))?;
        return Ok(());
    }

    if let Some(system) = &cli.system {
        session.add_system_prompt(system);
    }

    println!();
    println!("{}", "=".repeat(100));
    println!();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_chat_loop(session.as_mut(), stdin, &mut stdout)
        .await
        .with_context(|| format!("{provider} chat failed"))?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let registry = SessionRegistry::builtin();
    let prepared = prepare(&cli, &registry);
    let verbose = cli.verbose || prepared.as_ref().is_ok_and(|(config, _)| config.verbose);
    init_tracing(verbose);

    let result = match prepared {
        Ok((config, constructor)) => run(&cli, config, constructor).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
