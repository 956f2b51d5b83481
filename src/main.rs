//! tasksync - move open Google Tasks into Todoist

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tasksync::cli::{self, Cli, Commands};
use tasksync::config::{get_app_dir, Config};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool, config: Option<&Config>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("tasksync=debug")
        } else {
            let level = config.map_or("info", |c| c.log_level.as_str());
            EnvFilter::try_new(format!("tasksync={}", level))
                .unwrap_or_else(|_| EnvFilter::new("tasksync=info"))
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands that must work without a valid config.
    match cli.command {
        Commands::Completion { shell } => {
            generate(shell, &mut Cli::command(), "tasksync", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Init(args) => {
            init_logging(cli.verbose, None);
            return cli::init::run(&get_app_dir()?, args).await;
        }
        _ => {}
    }

    let app_dir = get_app_dir()?;
    let config = Config::load()?;
    init_logging(cli.verbose, Some(&config));

    match cli.command {
        Commands::Sync(args) => cli::sync::run(&config, &app_dir, args).await,
        Commands::Start(args) => cli::start::run(&config, &app_dir, args).await,
        Commands::Status(args) => cli::status::run(&config, &app_dir, args).await,
        Commands::Auth(args) => cli::auth::run(&config, &app_dir, args).await,
        Commands::Completion { .. } | Commands::Init(_) => Ok(()),
    }
}
