use std::io::Write;

use anyhow::Context;
use cellar_sdk::{Cellar, CellarConfig, Schema, Value};
use colored::Colorize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = CellarConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    tracing::debug!(data_dir = %config.data_dir.display(), "opening cellar");
    let cellar = Cellar::open_dir(config)?;

    let mut stdout = std::io::stdout().lock();
    if execute(&cellar, cli.command, &mut stdout)? {
        cellar.flush()?;
    }
    Ok(())
}

/// Run one command. Returns whether the state changed and needs flushing.
pub fn execute(cellar: &Cellar, command: Command, out: &mut dyn Write) -> anyhow::Result<bool> {
    match command {
        Command::Declare(args) => cmd_declare(cellar, args, out).map(|_| true),
        Command::Get(args) => cmd_get(cellar, args, out).map(|_| false),
        Command::Set(args) => cmd_set(cellar, args, out).map(|_| true),
        Command::Show(args) => cmd_show(cellar, args, out).map(|_| false),
        Command::List(_) => cmd_list(cellar, out).map(|_| false),
        Command::Export(args) => cmd_export(cellar, args, out).map(|_| false),
        Command::Import(args) => cmd_import(cellar, args, out).map(|_| true),
    }
}

fn existing(cellar: &Cellar, origin: &str) -> anyhow::Result<cellar_sdk::Accessor> {
    if !cellar.contains(origin) {
        anyhow::bail!("no store named {origin:?}; declare it first");
    }
    Ok(cellar.retrieve(origin, None)?)
}

fn cmd_declare(cellar: &Cellar, args: DeclareArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let schema: Schema = args.fields.into_iter().collect();
    for (name, ty) in schema.iter() {
        if !ty.is_supported() {
            tracing::warn!(field = %name, declared = %ty, "declaring field with unsupported type");
        }
    }
    let existed = cellar.contains(&args.origin);
    let (_, report) = cellar.retrieve_with_report(args.origin.as_str(), Some(schema))?;

    match report {
        Some(report) if existed => {
            writeln!(out, "{} Migrated {}", "✓".green().bold(), args.origin.bold())?;
            for field in &report.added {
                writeln!(out, "  {} {}", "added:".green(), field)?;
            }
            for field in &report.removed {
                writeln!(out, "  {} {}", "removed:".red(), field)?;
            }
            for field in &report.retyped {
                writeln!(out, "  {} {}", "retyped:".yellow(), field)?;
            }
        }
        _ => writeln!(out, "{} Created {}", "✓".green().bold(), args.origin.bold())?,
    }
    Ok(())
}

fn cmd_get(cellar: &Cellar, args: GetArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let store = existing(cellar, &args.origin)?;
    match store.get(&args.field)? {
        Some(value) => writeln!(out, "{value}")?,
        None => anyhow::bail!("cell backing {}.{} is gone", args.origin, args.field),
    }
    Ok(())
}

fn cmd_set(cellar: &Cellar, args: SetArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let store = existing(cellar, &args.origin)?;
    store.set(&args.field, args.value)?;
    let stored = store.get(&args.field)?.unwrap_or_default();
    writeln!(out, "{} = {}", args.field.bold(), render(&stored))?;
    Ok(())
}

fn cmd_show(cellar: &Cellar, args: ShowArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let store = existing(cellar, &args.origin)?;
    let schema = store.schema()?;
    let values = store.to_map()?;

    writeln!(out, "{}", args.origin.bold())?;
    for (field, ty) in schema.iter() {
        let value = values
            .get(field)
            .map(render)
            .unwrap_or_else(|| "(missing)".red().to_string());
        writeln!(out, "  {} {} = {}", field, format!("<{ty}>").dimmed(), value)?;
    }
    Ok(())
}

fn cmd_list(cellar: &Cellar, out: &mut dyn Write) -> anyhow::Result<()> {
    let origins = cellar.origins();
    if origins.is_empty() {
        writeln!(out, "No stores.")?;
    }
    for origin in origins {
        let fields = cellar.retrieve(origin.as_str(), None)?.fields()?.len();
        writeln!(out, "{} ({} fields)", origin.bold(), fields)?;
    }
    Ok(())
}

fn cmd_export(cellar: &Cellar, args: ExportArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let blob = cellar.export_all()?;
    match args.out {
        Some(path) => {
            std::fs::write(&path, blob).with_context(|| format!("writing {}", path.display()))?;
            writeln!(out, "{} Exported to {}", "✓".green().bold(), path.display())?;
        }
        None => writeln!(out, "{blob}")?,
    }
    Ok(())
}

fn cmd_import(cellar: &Cellar, args: ImportArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let blob = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    cellar.import_all(&blob)?;
    writeln!(
        out,
        "{} Imported {} stores, {} cells",
        "✓".green().bold(),
        cellar.origins().len(),
        cellar.cell_count()
    )?;
    Ok(())
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => serde_json::to_string(s).unwrap_or_else(|_| s.clone()).cyan().to_string(),
        Value::Number(_) => value.to_string().yellow().to_string(),
    }
}
