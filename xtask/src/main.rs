//! xtask - Development tasks for tasksync

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate_to, Shell};
use std::fs;
use std::path::{Path, PathBuf};
use tasksync::cli::Cli;

#[derive(Parser)]
#[command(name = "xtask", about = "Development tasks for tasksync")]
struct Xtask {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the CLI reference to docs/cli/reference.md
    GenDocs,

    /// Write shell completion scripts
    GenCompletions {
        #[arg(long, default_value = "target/completions")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    match Xtask::parse().command {
        Commands::GenDocs => gen_docs(Path::new("docs/cli")),
        Commands::GenCompletions { out_dir } => gen_completions(&out_dir),
    }
}

fn gen_docs(docs_dir: &Path) -> Result<()> {
    let markdown = clap_markdown::help_markdown::<Cli>();
    fs::create_dir_all(docs_dir)
        .with_context(|| format!("Failed to create {}", docs_dir.display()))?;

    let output_path = docs_dir.join("reference.md");
    fs::write(&output_path, markdown)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    println!("Generated CLI documentation at {}", output_path.display());
    Ok(())
}

fn gen_completions(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut command = Cli::command();
    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
        let path = generate_to(shell, &mut command, "tasksync", out_dir)?;
        println!("Generated {}", path.display());
    }
    Ok(())
}
