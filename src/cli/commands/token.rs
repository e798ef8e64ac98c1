use anyhow::Context;
use chrono::Duration;
use clap::Subcommand;
use serde_json::json;

use crate::auth::{password, Principal, TokenService, MAX_EXPIRY_HOURS};
use crate::cli::utils::{output_success, read_secret};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::types::Role;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a bearer token with the configured JWT secret")]
    Issue {
        #[arg(long, help = "Subject id carried by the token")]
        subject: String,
        #[arg(long, help = "Role carried by the token (admin, user)")]
        role: Role,
        #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
        hours: Option<i64>,
    },

    #[command(about = "Verify a token and print its principal")]
    Inspect {
        #[arg(help = "Bearer token")]
        token: String,
    },

    #[command(about = "Hash a password for an account entry in the config file")]
    HashPassword {
        #[arg(long, help = "Password to hash (read from stdin when omitted)")]
        password: Option<String>,
        #[arg(long, default_value_t = bcrypt::DEFAULT_COST, help = "bcrypt cost factor")]
        cost: u32,
    },
}

/// Requested lifetime, capped at the longest lifetime the token service signs
fn lifetime(hours: i64) -> anyhow::Result<Duration> {
    if hours <= 0 {
        anyhow::bail!("--hours must be positive, got {}", hours);
    }
    Ok(Duration::hours(hours.min(MAX_EXPIRY_HOURS as i64)))
}

pub fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::HashPassword { password: plain, cost } => hash_password(plain, cost, output_format),
        signed => handle_signed(signed, output_format),
    }
}

fn hash_password(plain: Option<String>, cost: u32, output_format: OutputFormat) -> anyhow::Result<()> {
    let hashed = password::hash(&read_secret(plain)?, cost)?;
    match output_format {
        OutputFormat::Json => output_success(output_format, "Password hashed", Some(json!({ "password_hash": hashed }))),
        OutputFormat::Text => {
            println!("{}", hashed);
            Ok(())
        }
    }
}

fn handle_signed(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let tokens = TokenService::new(&config.security).context("cannot sign or verify tokens")?;

    match cmd {
        TokenCommands::Issue { subject, role, hours } => {
            let issued = match hours {
                Some(h) => tokens.issue_with_ttl(&subject, role, lifetime(h)?)?,
                None => tokens.issue(&subject, role)?,
            };

            match output_format {
                OutputFormat::Json => output_success(
                    output_format,
                    "Token issued",
                    Some(json!({
                        "token": issued.token,
                        "expiresIn": issued.expires_in,
                        "principal": Principal::from(issued.claims),
                    })),
                ),
                // bare token so it can be captured by a shell
                OutputFormat::Text => {
                    println!("{}", issued.token);
                    Ok(())
                }
            }
        }
        TokenCommands::Inspect { token } => {
            let claims = tokens.verify(token.trim())?;
            let expires = chrono::DateTime::from_timestamp(claims.exp, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| claims.exp.to_string());

            output_success(
                output_format,
                &format!("Valid token for subject '{}' ({}), expires {}", claims.sub, claims.role, expires),
                Some(json!({
                    "principal": Principal::from(claims.clone()),
                    "issuer": claims.iss,
                    "expiresAt": expires,
                })),
            )
        }
        TokenCommands::HashPassword { password, cost } => hash_password(password, cost, output_format),
    }
}
