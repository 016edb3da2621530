//! `pantry-sim` - drive a pantry session against fixture collaborators
//!
//! `run` plays a scripted session and reports every write; `inspect` lists a
//! catalog fixture.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use pantry_core::{CatalogLoader, InMemoryCatalog, SessionConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod sim;

use sim::{simulate, SimOptions};

fn cli() -> Command {
    Command::new("pantry-sim")
        .version(pantry_core::VERSION)
        .about("Pantry session simulator")
        .subcommand(
            Command::new("run")
                .about("Run a scripted session against a catalog fixture")
                .arg(
                    Arg::new("catalog")
                        .long("catalog")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON catalog fixture"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML session config (defaults to a 500ms flush period)"),
                )
                .arg(
                    Arg::new("toggle")
                        .long("toggle")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(i64))
                        .help("External id to toggle after the catalog loads"),
                )
                .arg(
                    Arg::new("stored")
                        .long("stored")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(i64))
                        .help("External id already persisted for the user"),
                )
                .arg(
                    Arg::new("ticks")
                        .long("ticks")
                        .default_value("2")
                        .value_parser(value_parser!(u32))
                        .help("Flush periods to wait before stopping"),
                )
                .arg(
                    Arg::new("signed-out")
                        .long("signed-out")
                        .action(ArgAction::SetTrue)
                        .help("Keep the user signed out"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Load a catalog fixture and list its groups")
                .arg(
                    Arg::new("catalog")
                        .long("catalog")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON catalog fixture"),
                ),
        )
}

fn read_catalog(args: &ArgMatches) -> Result<InMemoryCatalog> {
    let path = args
        .get_one::<PathBuf>("catalog")
        .context("--catalog is required")?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    InMemoryCatalog::from_json(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn read_config(args: &ArgMatches) -> Result<SessionConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(SessionConfig::from_toml_str(&raw)?)
        }
        None => Ok(SessionConfig::new().with_flush_interval(Duration::from_millis(500))),
    }
}

fn ids(args: &ArgMatches, name: &str) -> Vec<i64> {
    args.get_many::<i64>(name)
        .map(|values| values.copied().collect())
        .unwrap_or_default()
}

async fn run(args: &ArgMatches) -> Result<()> {
    let options = SimOptions {
        config: read_config(args)?,
        catalog: read_catalog(args)?,
        stored: ids(args, "stored"),
        toggles: ids(args, "toggle"),
        ticks: args.get_one::<u32>("ticks").copied().unwrap_or(2),
        signed_in: !args.get_flag("signed-out"),
    };

    let report = simulate(options).await?;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.generate_text());
    }
    Ok(())
}

async fn inspect(args: &ArgMatches) -> Result<()> {
    let pantry = CatalogLoader::new(read_catalog(args)?).load().await?;
    for group in pantry.groups() {
        println!("{} ({})", group.description, group.len());
        for ingredient in &group.ingredients {
            let marker = if ingredient.is_essential { "*" } else { " " };
            println!("  {marker} {:>8}  {}", ingredient.external_id, ingredient.name);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("run", args)) => run(args).await,
        Some(("inspect", args)) => inspect(args).await,
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
