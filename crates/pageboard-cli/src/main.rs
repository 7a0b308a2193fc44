// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use pageboard_app::{CollectionView, EntityKind};
use pageboard_db::{Database, RecordStore};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    match options.action {
        CliAction::Help => {
            print_help();
            return Ok(());
        }
        CliAction::PrintConfigPath => {
            println!("{}", options.config_path.display());
            return Ok(());
        }
        CliAction::PrintExample => {
            print!("{}", Config::example_config(&options.config_path));
            return Ok(());
        }
        CliAction::PrintDbPath | CliAction::Check | CliAction::Run => {}
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `pageboard --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = match &options.source {
        PageSource::Demo => PathBuf::from(":memory:"),
        PageSource::File(path) => path.clone(),
        PageSource::Configured => config.db_path()?,
    };
    if options.action == CliAction::PrintDbPath {
        println!("{}", db_path.display());
        return Ok(());
    }

    let log_path = config.log_path()?;
    logging::init(&log_path, config.log_level())?;
    let demo = options.source == PageSource::Demo;
    tracing::info!(
        config = %options.config_path.display(),
        db = %db_path.display(),
        demo,
        "starting pageboard"
    );

    let db = open_database(&db_path, demo)?;
    let latency = config.write_latency()?;
    if options.action == CliAction::Check {
        tracing::info!(pages = db.count_pages()?, "check passed");
        return Ok(());
    }

    let store = Arc::new(RecordStore::new(db, latency));
    let mut view = CollectionView::new(store, EntityKind::PAGE);
    let result = pageboard_tui::run_app(&mut view);
    tracing::info!(ok = result.is_ok(), "pageboard exited");
    result
}

fn open_database(path: &Path, demo: bool) -> Result<Database> {
    let db = if demo {
        Database::open_memory()?
    } else {
        Database::open(path).with_context(|| {
            format!(
                "open database {} -- if this path is wrong, pass --db or set [storage].db_path or PAGEBOARD_DB_PATH",
                path.display()
            )
        })?
    };
    db.bootstrap()?;
    if demo {
        db.seed_demo_pages()?;
    }
    Ok(db)
}

/// What a single invocation does. At most one is chosen per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliAction {
    Run,
    Check,
    PrintConfigPath,
    PrintDbPath,
    PrintExample,
    Help,
}

impl CliAction {
    const fn flag(self) -> &'static str {
        match self {
            Self::Run => "",
            Self::Check => "--check",
            Self::PrintConfigPath => "--print-config-path",
            Self::PrintDbPath => "--print-path",
            Self::PrintExample => "--print-example-config",
            Self::Help => "--help",
        }
    }
}

/// Where the pages come from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageSource {
    Configured,
    File(PathBuf),
    Demo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    action: CliAction,
    source: PageSource,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut config_path = default_config_path;
    let mut action = CliAction::Run;
    let mut source = PageSource::Configured;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let next = match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                config_path = PathBuf::from(value.as_ref());
                continue;
            }
            "--db" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--db requires a database path"))?;
                pageboard_db::validate_db_path(value.as_ref())?;
                source = merge_source(source, PageSource::File(PathBuf::from(value.as_ref())))?;
                continue;
            }
            "--demo" => {
                source = merge_source(source, PageSource::Demo)?;
                continue;
            }
            "--check" => CliAction::Check,
            "--print-config-path" => CliAction::PrintConfigPath,
            "--print-path" => CliAction::PrintDbPath,
            "--print-example-config" => CliAction::PrintExample,
            "--help" | "-h" => CliAction::Help,
            unknown => bail!("unknown argument {unknown:?}; run with --help to see supported options"),
        };
        action = match (action, next) {
            (CliAction::Help, _) | (_, CliAction::Help) => CliAction::Help,
            (CliAction::Run, next) => next,
            (current, next) if current == next => current,
            (current, next) => bail!("{} cannot be combined with {}", current.flag(), next.flag()),
        };
    }

    if action == CliAction::PrintDbPath && source == PageSource::Demo {
        bail!("--demo pages live in memory; --print-path has no file to print");
    }

    Ok(CliOptions {
        config_path,
        action,
        source,
    })
}

fn merge_source(current: PageSource, next: PageSource) -> Result<PageSource> {
    match (current, next) {
        (PageSource::Configured, next) => Ok(next),
        (PageSource::Demo, PageSource::Demo) => Ok(PageSource::Demo),
        (PageSource::File(_), PageSource::File(_)) => bail!("--db given more than once"),
        _ => bail!("--demo and --db both choose the page database; pick one"),
    }
}

fn print_help() {
    println!("pageboard: page admin panel");
    println!();
    println!("Pages:");
    println!("  --db <path>              Open this database instead of [storage].db_path");
    println!("  --demo                   Seeded in-memory pages; nothing is written to disk");
    println!();
    println!("Actions (pick one; default opens the panel):");
    println!("  --check                  Validate config + database and exit");
    println!("  --print-path             Print resolved database path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --help, -h               Show this help");
    println!();
    println!("  --config <path>          Use a specific config path");
}
