//! Output presentation.
//!
//! Results go to stdout as JSON; errors and prompts go to stderr so stdout
//! stays machine-readable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented JSON.
    #[default]
    Json,
    /// One JSON document per line.
    Compact,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Compact => "compact",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" | "pretty" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// Render `value` in `format`.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(value),
        OutputFormat::Compact => serde_json::to_string(value),
    }
}

/// Print `value` to stdout.
pub fn print<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    println!("{}", render(value, format)?);
    Ok(())
}

/// Print `value` to stderr.
pub fn eprint<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    eprintln!("{}", render(value, format)?);
    Ok(())
}
