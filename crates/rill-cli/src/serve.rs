//! Serve command: start the playground WebSocket server.

use rill_playground::PlaygroundConfig;
use rill_server::ServerConfig;

use crate::colors::{self, Style};

pub async fn execute(host: String, port: u16) -> anyhow::Result<()> {
    let config = ServerConfig { host, port };

    println!("\n{}", Style::Heading.paint("Rill Playground Server"));
    println!("{}", "─".repeat(50));
    println!(
        "{} http://{}:{}",
        Style::Label.paint("  ◆ Server:"),
        config.host,
        config.port
    );
    println!(
        "{} ws://{}:{}/ws",
        Style::Label.paint("  ◆ WebSocket:"),
        config.host,
        config.port
    );
    println!("{}", Style::Muted.paint("Press Ctrl+C to stop"));
    colors::flush_stdout();

    rill_server::serve(config, PlaygroundConfig::default()).await?;
    Ok(())
}
