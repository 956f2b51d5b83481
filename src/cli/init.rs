//! `tasksync init` command implementation

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::Path;

use crate::config::{config_path, Config, CREDENTIALS_FILE, DEFAULT_CONFIG_TEMPLATE};

#[derive(Args)]
pub struct InitArgs {
    /// Store this Todoist API token in the config file
    #[arg(long)]
    pub todoist_token: Option<String>,

    /// Overwrite an existing config file with the defaults
    #[arg(long)]
    pub force: bool,
}

/// Contents for a fresh config file
fn initial_config(todoist_token: Option<&str>) -> String {
    match todoist_token {
        Some(token) => DEFAULT_CONFIG_TEMPLATE.replace(
            "# api_token = \"\"",
            &format!("api_token = {}", toml_string(token)),
        ),
        None => DEFAULT_CONFIG_TEMPLATE.to_string(),
    }
}

fn toml_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

pub async fn run(app_dir: &Path, args: InitArgs) -> Result<()> {
    fs::create_dir_all(app_dir)
        .with_context(|| format!("Failed to create {}", app_dir.display()))?;

    let path = config_path(app_dir);
    let token = args.todoist_token.as_deref().map(str::trim).filter(|t| !t.is_empty());

    if !path.exists() || args.force {
        fs::write(&path, initial_config(token))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    } else if let Some(token) = token {
        let mut config = Config::load_from(&path)?;
        config.todoist.api_token = Some(token.to_string());
        fs::write(&path, toml::to_string_pretty(&config)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Updated Todoist token in {}", path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }

    let credentials = Config::load_from(&path)
        .map(|c| c.credentials_path(app_dir))
        .unwrap_or_else(|_| app_dir.join(CREDENTIALS_FILE));
    if credentials.is_file() {
        println!("Google credentials found at {}", credentials.display());
        println!("Run `tasksync auth` to authorize access to Google Tasks.");
    } else {
        println!(
            "Google credentials missing: download an OAuth client (Desktop app) from the \
             Google Cloud console and save it as {}",
            credentials.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_config_without_token() {
        let config: Config = toml::from_str(&initial_config(None)).unwrap();
        assert!(config.todoist.api_token.is_none());
    }

    #[test]
    fn test_initial_config_with_token() {
        let config: Config = toml::from_str(&initial_config(Some("abc\"123"))).unwrap();
        assert_eq!(config.todoist.api_token.as_deref(), Some("abc\"123"));
    }

    #[tokio::test]
    async fn test_init_creates_dir_and_keeps_existing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("tasksync");

        run(&dir, InitArgs { todoist_token: None, force: false }).await.unwrap();
        let path = config_path(&dir);
        assert!(path.exists());

        fs::write(&path, "log_level = \"debug\"\n").unwrap();
        run(&dir, InitArgs { todoist_token: None, force: false }).await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "log_level = \"debug\"\n");

        run(&dir, InitArgs { todoist_token: Some("tok".into()), force: false })
            .await
            .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.todoist.api_token.as_deref(), Some("tok"));
    }
}
