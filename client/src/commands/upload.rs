use crate::catalog::scanner::Scanner;
use crate::core::api::ApiClient;
use crate::core::config::load_config;
use anyhow::Result;
use colored::*;
use std::path::Path;

pub async fn run(path: &str) -> Result<()> {
    let config = load_config()?;
    let client = ApiClient::new(&config.backend_url);

    if !client.health_check().await {
        anyhow::bail!("Search service at {} is not healthy", config.backend_url);
    }

    let summary = Scanner::new(client).scan(Path::new(path)).await;
    println!(
        "{} files, {} entries uploaded, {} rejected",
        summary.files,
        summary.inserted.to_string().green(),
        summary.failed.to_string().red()
    );
    Ok(())
}
