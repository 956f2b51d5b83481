//! `tasksync auth` command implementation

use anyhow::{bail, Context, Result};
use clap::Args;
use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::config::Config;
use crate::provider::google::auth::extract_code;

#[derive(Args)]
pub struct AuthArgs {
    /// Redirect URI registered for the OAuth client
    #[arg(long, default_value = "http://localhost")]
    pub redirect_uri: String,
}

pub async fn run(config: &Config, app_dir: &Path, args: AuthArgs) -> Result<()> {
    let client = super::google_client(config, app_dir)?;
    let auth = client.auth();
    let url = auth.authorization_url(&args.redirect_uri)?;

    println!("Open this URL in a browser and grant access to Google Tasks:\n");
    println!("  {}\n", url);
    println!("After approving, the browser is redirected to a page that may fail to load.");
    print!("Paste that page's full URL (or just the code) here: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read the authorization code")?;
    let Some(code) = extract_code(&input) else {
        bail!("No authorization code found in input");
    };

    let token = auth.exchange_code(&code, &args.redirect_uri).await?;
    if token.refresh_token.is_none() {
        println!("Warning: no refresh token was issued; run `tasksync auth` again once it expires.");
    }
    println!("Saved token to {}", auth.token_path().display());
    Ok(())
}
