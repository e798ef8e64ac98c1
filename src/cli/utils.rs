use anyhow::Context;
use serde_json::{json, Value};
use std::io::Read;

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an API payload: pretty JSON, or a short listing for text
pub fn output_value(output_format: OutputFormat, value: &Value) -> anyhow::Result<()> {
    match (output_format, value) {
        (OutputFormat::Json, _) => println!("{}", serde_json::to_string_pretty(value)?),
        (OutputFormat::Text, Value::Array(rows)) if rows.is_empty() => println!("(no records)"),
        (OutputFormat::Text, Value::Array(rows)) => {
            for row in rows {
                println!("{}", summarize(row));
            }
        }
        (OutputFormat::Text, Value::Object(fields)) => {
            for (key, field) in fields {
                match field {
                    Value::String(s) => println!("{}: {}", key, s),
                    other => println!("{}: {}", key, other),
                }
            }
        }
        (OutputFormat::Text, other) => println!("{}", other),
    }
    Ok(())
}

/// One line per record: id then the remaining fields
fn summarize(row: &Value) -> String {
    let Some(fields) = row.as_object() else {
        return row.to_string();
    };

    let id = fields.get("id").map(Value::to_string).unwrap_or_else(|| "-".to_string());
    let rest: Vec<String> = fields
        .iter()
        .filter(|(k, _)| k.as_str() != "id")
        .map(|(k, v)| match v {
            Value::String(s) => format!("{}={}", k, s),
            other => format!("{}={}", k, other),
        })
        .collect();

    format!("[{}] {}", id, rest.join(" "))
}

/// JSON body from `--data`, or stdin when absent
pub fn read_body(data: Option<String>) -> anyhow::Result<Value> {
    let raw = match data {
        Some(raw) => raw,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read JSON body from stdin")?;
            buf
        }
    };

    serde_json::from_str(raw.trim()).context("request body is not valid JSON")
}

/// A secret passed as an argument, or the first line of stdin
pub fn read_secret(value: Option<String>) -> anyhow::Result<String> {
    let raw = match value {
        Some(raw) => raw,
        None => {
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .context("failed to read secret from stdin")?;
            line
        }
    };

    let secret = raw.trim_end_matches(['\r', '\n']).to_string();
    if secret.is_empty() {
        anyhow::bail!("refusing to hash an empty password");
    }
    Ok(secret)
}
