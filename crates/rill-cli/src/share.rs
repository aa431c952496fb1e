//! Share command: print a share link for a program.

use std::path::Path;

use rill_playground::{ShareConfig, ShareLinks};

pub async fn execute(file: &str, no_shorten: bool) -> anyhow::Result<()> {
    let path = Path::new(file);
    if !path.exists() {
        anyhow::bail!("File not found: {}", file);
    }
    let source = std::fs::read_to_string(path)?;

    let mut config = ShareConfig::default();
    if no_shorten {
        config.shortener_url = None;
    }
    let link = ShareLinks::new(config).share(&source).await;
    if !no_shorten && !link.shortened {
        tracing::info!("Link shortener unavailable, printing the full link");
    }
    println!("{}", link.url);
    Ok(())
}
