use clap::Subcommand;
use reqwest::Method;

use crate::cli::client::ApiClient;
use crate::cli::utils::{output_success, output_value};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Show server information from API root endpoint")]
    Info,

    #[command(about = "Check server health status from API /health endpoint")]
    Health,
}

pub async fn handle(cmd: ServerCommands, url: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = ApiClient::new(url, None)?;

    match cmd {
        ServerCommands::Info => {
            let info = client.send(Method::GET, "/", None).await?.unwrap_or_default();
            output_value(output_format, &info)
        }
        ServerCommands::Health => {
            let health = client.send(Method::GET, "/health", None).await?.unwrap_or_default();
            match output_format {
                OutputFormat::Json => output_value(output_format, &health),
                OutputFormat::Text => output_success(output_format, &format!("{} is healthy", url), None),
            }
        }
    }
}
