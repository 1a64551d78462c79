use crate::core::api::ApiClient;
use crate::core::config::load_config;
use anyhow::Result;
use colored::*;

pub async fn show(item_seq: &str) -> Result<()> {
    let config = load_config()?;
    let client = ApiClient::new(&config.backend_url);

    match client.get_pill(item_seq).await? {
        Some(pill) => println!("{}", serde_json::to_string_pretty(&pill)?),
        None => println!("{} {}", "[NOT FOUND]".yellow(), item_seq),
    }
    Ok(())
}

pub async fn delete(item_seq: &str) -> Result<()> {
    let config = load_config()?;
    let client = ApiClient::new(&config.backend_url);

    if client.delete_pill(item_seq).await? {
        println!("{} {}", "[DELETED]".green(), item_seq);
    } else {
        println!("{} {}", "[NOT FOUND]".yellow(), item_seq);
    }
    Ok(())
}
