use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cellar",
    about = "Schema-backed cell storage",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file
    #[arg(long, global = true, default_value = "cellar.toml")]
    pub config: PathBuf,

    /// Override the data directory from the configuration
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a store or migrate it to a new schema
    Declare(DeclareArgs),
    /// Read one field
    Get(GetArgs),
    /// Write one field
    Set(SetArgs),
    /// Show every field of a store
    Show(ShowArgs),
    /// List all stores
    List(ListArgs),
    /// Export the complete state as JSON
    Export(ExportArgs),
    /// Replace the complete state from an exported JSON file
    Import(ImportArgs),
}

#[derive(Args)]
pub struct DeclareArgs {
    pub origin: String,
    /// Field declarations, `name=type`
    #[arg(value_parser = parse_field)]
    pub fields: Vec<(String, String)>,
}

#[derive(Args)]
pub struct GetArgs {
    pub origin: String,
    pub field: String,
}

#[derive(Args)]
pub struct SetArgs {
    pub origin: String,
    pub field: String,
    pub value: String,
}

#[derive(Args)]
pub struct ShowArgs {
    pub origin: String,
}

#[derive(Args)]
pub struct ListArgs {}

#[derive(Args)]
pub struct ExportArgs {
    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct ImportArgs {
    pub file: PathBuf,
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, ty)) if !name.is_empty() && !ty.is_empty() => {
            Ok((name.to_string(), ty.to_string()))
        }
        _ => Err(format!("expected name=type, got {s:?}")),
    }
}
