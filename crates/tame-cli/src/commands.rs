//! Subcommand implementations.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use tame_core::{
    AllOf, AnyOf, CancelToken, Engine, EngineOptions, FieldMatcher, Layout, Matcher,
    ValidationReport,
};
use tracing::debug;

use crate::GlobalArgs;

/// Exit code for a completed run whose verdict is negative.
const EXIT_INVALID: u8 = 1;

fn open_engine(global: &GlobalArgs, start: &Path, options: EngineOptions) -> Result<Engine> {
    let options = EngineOptions {
        workers: global.workers,
        cancel: match global.timeout {
            Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
            None => CancelToken::new(),
        },
        ..options
    };
    debug!(
        "opening repository for {} (root override: {:?}, workers: {:?})",
        start.display(),
        global.root,
        global.workers
    );
    let engine = match &global.root {
        Some(root) => Engine::open_root(root, options),
        None => Engine::open(start, options),
    };
    engine.with_context(|| format!("failed to open repository for {}", start.display()))
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn cmd_validate(
    global: &GlobalArgs,
    path: &Path,
    metadata_only: bool,
    json: bool,
) -> Result<ExitCode> {
    let defaults = EngineOptions::default();
    let engine = open_engine(
        global,
        path,
        EngineOptions {
            metadata_only: metadata_only || defaults.metadata_only,
            ..defaults
        },
    )?;
    let report = engine.validate(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(path, &report);
    }
    Ok(if report.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INVALID)
    })
}

fn print_report(path: &Path, report: &ValidationReport) {
    match report {
        ValidationReport::Valid => {
            println!("{} {}", "Valid.".green().bold(), path.display());
        }
        ValidationReport::Invalid(violations) => {
            println!(
                "{} {} ({} violations)",
                "Invalid.".red().bold(),
                path.display(),
                violations.len()
            );
            for (i, violation) in violations.iter().enumerate() {
                println!(
                    "  {:>3}. {} {}",
                    i + 1,
                    format!("[{}]", violation.kind).yellow(),
                    violation.message
                );
                if let Some(excerpt) = &violation.excerpt {
                    print_excerpt(excerpt);
                }
            }
        }
    }
}

/// Indent a source excerpt under its violation, caret line highlighted.
fn print_excerpt(excerpt: &str) {
    let mut lines = excerpt.lines();
    if let Some(source) = lines.next() {
        println!("       | {source}");
    }
    for caret in lines {
        println!("       | {}", caret.red().bold());
    }
}

// ---------------------------------------------------------------------------
// describe
// ---------------------------------------------------------------------------

pub fn cmd_describe(global: &GlobalArgs, path: &Path) -> Result<ExitCode> {
    let engine = open_engine(global, path, EngineOptions::default())?;
    let text = engine.describe(path)?;
    println!("{text}");
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// collect
// ---------------------------------------------------------------------------

pub fn cmd_collect(
    global: &GlobalArgs,
    path: &Path,
    destination: &Path,
    flatten: bool,
    json: bool,
) -> Result<ExitCode> {
    let layout = if flatten {
        Layout::Flatten
    } else {
        Layout::Mirror
    };
    let engine = open_engine(
        global,
        path,
        EngineOptions {
            layout,
            ..EngineOptions::default()
        },
    )?;
    let report = engine
        .collect(path, destination)
        .with_context(|| format!("failed to collect {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} {} documents, {} files into {}",
            "Collected".green().bold(),
            report.documents.len(),
            report.files_copied,
            destination.display()
        );
    }
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// locate
// ---------------------------------------------------------------------------

pub fn cmd_locate(global: &GlobalArgs, file: &Path) -> Result<ExitCode> {
    let engine = open_engine(global, file, EngineOptions::default())?;
    let documents = engine.locate(file)?;
    if documents.is_empty() {
        eprintln!(
            "{} no metadata claims {}",
            "info:".yellow().bold(),
            file.display()
        );
        return Ok(ExitCode::from(EXIT_INVALID));
    }
    for doc in documents {
        println!("{}", doc.display());
    }
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

pub fn cmd_search(
    global: &GlobalArgs,
    terms: &[String],
    under: Option<&Path>,
    any: bool,
    no_parents: bool,
) -> Result<ExitCode> {
    let mut matchers: Vec<Box<dyn Matcher>> = Vec::with_capacity(terms.len());
    for term in terms {
        let matcher = FieldMatcher::parse(term)?.include_parents(!no_parents);
        matchers.push(Box::new(matcher));
    }
    let matcher: Box<dyn Matcher> = if any {
        Box::new(AnyOf(matchers))
    } else {
        Box::new(AllOf(matchers))
    };

    let start = under.unwrap_or(Path::new("."));
    let engine = open_engine(global, start, EngineOptions::default())?;
    let scope = under.unwrap_or(engine.root());
    let found = engine.search(scope, matcher.as_ref())?;
    if found.is_empty() {
        eprintln!("{} no metadata matches", "info:".yellow().bold());
        return Ok(ExitCode::from(EXIT_INVALID));
    }
    for path in found {
        println!("{}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}
