mod cli;
mod logging;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use linkrule::api::{Api, ApiResponse};
use linkrule::maintenance::{ConversionEvent, ConversionReporter};
use linkrule::{
    convert_to_symlinks, load_settings_or_default, Cancellation, ConversionOptions, Database,
    Reconciler, Settings,
};

use cli::{Cli, Command};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json)?;

    let settings = load_settings_or_default(cli.config.as_deref())
        .context("Failed to load settings")?;
    let db = open_database(&cli, &settings)?;

    let api = Api::new(Reconciler::new(db.clone()), settings.default_link_mode);

    match cli.command {
        Command::Scan(args) => respond(api.scan(&args.into())),
        Command::Preview(args) => respond(api.preview(&args.into())),
        Command::Apply(args) => respond(api.apply(&args.into(), &Cancellation::new())),
        Command::ApplyOnce(args) => respond(api.apply_once(&args.into())),
        Command::Remove { rule_id } => respond(api.remove(&cli::remove_request(rule_id))),
        Command::Rules => {
            print_json(&api.reconciler().rules()?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::ConvertToSymlinks { batch, dry_run } => {
            let options = ConversionOptions {
                batch_size: batch.unwrap_or(settings.batch_size),
                dry_run,
            };
            handle_convert(&db, &options)
        }
    }
}

fn open_database(cli: &Cli, settings: &Settings) -> Result<Database> {
    let path = match &cli.database {
        Some(path) => path.clone(),
        None => settings
            .resolve_database_path()
            .context("Could not determine a database path; pass --database")?,
    };
    Database::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn respond<T: Serialize>(response: ApiResponse<T>) -> Result<ExitCode> {
    print_json(&response)?;
    Ok(if response.status() == 200 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn handle_convert(db: &Database, options: &ConversionOptions) -> Result<ExitCode> {
    let summary = convert_to_symlinks(db, options, &ConsoleReporter)?;

    println!("\nConversion summary:");
    println!("Total mappings: {}", summary.total);
    println!("Processed: {}", summary.processed);
    println!("Converted: {}", summary.converted);
    println!("Errors: {}", summary.errors);

    Ok(ExitCode::from(summary.exit_code() as u8))
}

/// Prints one line per mapping, the way an operator reads a migration run.
struct ConsoleReporter;

impl ConversionReporter for ConsoleReporter {
    fn report(&self, event: ConversionEvent<'_>) {
        match event {
            ConversionEvent::MissingTarget { target } => {
                println!("Skipping missing target: {}", target.display())
            }
            ConversionEvent::AlreadySymlink { target } => {
                println!("Already symlink: {}", target.display())
            }
            ConversionEvent::MissingSource { source } => {
                println!("Source file missing: {}", source.display())
            }
            ConversionEvent::WouldConvert { target } => {
                println!("[DRY RUN] Would convert: {}", target.display())
            }
            ConversionEvent::Converted { target } => println!("Converted: {}", target.display()),
            ConversionEvent::Failed { target, error } => {
                eprintln!("Error converting {}: {}", target.display(), error)
            }
        }
    }
}
