use clap::Subcommand;
use reqwest::Method;

use crate::cli::client::ApiClient;
use crate::cli::utils::{output_success, output_value, read_body};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum DataCommands {
    #[command(about = "List every record in a collection")]
    List {
        #[arg(help = "Collection name (books, tasks, users)")]
        collection: String,
        #[command(flatten)]
        auth: TokenArg,
    },

    #[command(about = "Fetch one record")]
    Get {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(help = "Record ID")]
        id: String,
        #[command(flatten)]
        auth: TokenArg,
    },

    #[command(about = "Create a record from --data or stdin")]
    Create {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(long, help = "JSON body (read from stdin when omitted)")]
        data: Option<String>,
        #[command(flatten)]
        auth: TokenArg,
    },

    #[command(about = "Update a record from --data or stdin")]
    Update {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(help = "Record ID")]
        id: String,
        #[arg(long, help = "JSON body (read from stdin when omitted)")]
        data: Option<String>,
        #[command(flatten)]
        auth: TokenArg,
    },

    #[command(about = "Delete a record")]
    Delete {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(help = "Record ID")]
        id: String,
        #[command(flatten)]
        auth: TokenArg,
    },
}

#[derive(clap::Args)]
pub struct TokenArg {
    #[arg(long, env = "CRUD_TOKEN", help = "Bearer token")]
    pub token: Option<String>,
}

pub async fn handle(cmd: DataCommands, url: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DataCommands::List { collection, auth } => {
            let client = ApiClient::new(url, auth.token)?;
            let rows = client
                .send(Method::GET, &format!("/{}", collection), None)
                .await?
                .unwrap_or_default();
            output_value(output_format, &rows)
        }
        DataCommands::Get { collection, id, auth } => {
            let client = ApiClient::new(url, auth.token)?;
            let record = client
                .send(Method::GET, &format!("/{}/{}", collection, id), None)
                .await?
                .unwrap_or_default();
            output_value(output_format, &record)
        }
        DataCommands::Create { collection, data, auth } => {
            let body = read_body(data)?;
            let client = ApiClient::new(url, auth.token)?;
            let record = client
                .send(Method::POST, &format!("/{}", collection), Some(body))
                .await?
                .unwrap_or_default();
            output_value(output_format, &record)
        }
        DataCommands::Update {
            collection,
            id,
            data,
            auth,
        } => {
            let body = read_body(data)?;
            let client = ApiClient::new(url, auth.token)?;
            let record = client
                .send(Method::PUT, &format!("/{}/{}", collection, id), Some(body))
                .await?
                .unwrap_or_default();
            output_value(output_format, &record)
        }
        DataCommands::Delete { collection, id, auth } => {
            let client = ApiClient::new(url, auth.token)?;
            client
                .send(Method::DELETE, &format!("/{}/{}", collection, id), None)
                .await?;
            output_success(output_format, &format!("Deleted {}/{}", collection, id), None)
        }
    }
}
