//! Macro store command-line entry point.
//!
//! # Responsibility
//! - Provide a probe for `macro_core` linkage (`ping`).
//! - Expose list/get/import/delete over a SQLite macro store and
//!   property type lookups for local administration.

use clap::{Parser, Subcommand};
use macro_core::{CoreConfig, Macro, MacroService, SqliteUnitOfWorkProvider};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "macro", version, about = "Manage macros in a macro store")]
struct Cli {
    /// TOML config file (`db_path`, `log_level`, `log_dir`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file; overrides `db_path` from the config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core linkage and version.
    Ping,
    /// List macros, optionally limited to the given aliases.
    List { aliases: Vec<String> },
    /// Print one macro as JSON.
    Get { alias: String },
    /// Insert or update a macro from a JSON file.
    Import { file: PathBuf },
    /// Delete a macro by alias.
    Delete { alias: String },
    /// List property types, or show the one with the given alias.
    PropertyTypes { alias: Option<String> },
}

impl Command {
    /// Whether the command reads or writes stored macros.
    fn needs_store(&self) -> bool {
        !matches!(self, Self::Ping | Self::PropertyTypes { .. })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    if let Command::Ping = cli.command {
        println!("macro_core ping={}", macro_core::ping());
        println!("macro_core version={}", macro_core::core_version());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    if cli.db.is_some() {
        config.db_path = cli.db.clone();
    }
    if cli.command.needs_store() && config.db_path.is_none() {
        return Err("no database configured; pass --db or set `db_path` in --config".into());
    }
    config.init_logging()?;

    let service = MacroService::new(config.open_provider()?)?;
    match cli.command {
        Command::Ping => Ok(()),
        Command::List { aliases } => list(&service, &aliases),
        Command::Get { alias } => get(&service, &alias),
        Command::Import { file } => import(&service, &file),
        Command::Delete { alias } => delete(&service, &alias),
        Command::PropertyTypes { alias } => property_types(&service, alias.as_deref()),
    }
}

type Service = MacroService<SqliteUnitOfWorkProvider>;

fn list(service: &Service, aliases: &[String]) -> CliResult<()> {
    for entity in service.get_all(aliases)? {
        println!(
            "{}\t{}\t{:?}\t{} properties",
            entity.alias,
            entity.name,
            entity.macro_type(),
            entity.properties.len()
        );
    }
    Ok(())
}

fn get(service: &Service, alias: &str) -> CliResult<()> {
    let entity = service
        .get_by_alias(alias)?
        .ok_or_else(|| format!("macro not found: {alias}"))?;
    println!("{}", serde_json::to_string_pretty(&entity)?);
    Ok(())
}

fn import(service: &Service, file: &Path) -> CliResult<()> {
    let raw = std::fs::read_to_string(file)
        .map_err(|err| format!("failed to read `{}`: {err}", file.display()))?;
    let entity: Macro = serde_json::from_str(&raw)?;
    service.save(&entity)?;
    println!("saved {} ({})", entity.alias, entity.id);
    Ok(())
}

fn delete(service: &Service, alias: &str) -> CliResult<()> {
    let entity = service
        .get_by_alias(alias)?
        .ok_or_else(|| format!("macro not found: {alias}"))?;
    service.delete(&entity)?;
    println!("deleted {alias}");
    Ok(())
}

fn property_types(service: &Service, alias: Option<&str>) -> CliResult<()> {
    let selected: Vec<_> = match alias {
        Some(alias) => service
            .get_macro_property_type_by_alias(alias)
            .into_iter()
            .collect(),
        None => service.get_macro_property_types().iter().collect(),
    };
    if let (Some(alias), true) = (alias, selected.is_empty()) {
        return Err(format!("property type not found: {alias}").into());
    }
    for property_type in selected {
        println!(
            "{}\t{}.{}\t{:?}",
            property_type.alias,
            property_type.rendering_assembly,
            property_type.rendering_type,
            property_type.base_type
        );
    }
    Ok(())
}
