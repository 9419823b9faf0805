// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use epi_cli::{run_pipeline, FileSources, PipelineConfig, PipelineOutput};
use epi_core::EpiError;
use epi_summary::MapConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Pipeline(#[from] EpiError),
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot encode {artifact}: {source}")]
    Encode {
        artifact: &'static str,
        source: serde_json::Error,
    },
}

#[derive(Debug)]
struct RunArgs {
    sources: PathBuf,
    output: PathBuf,
    provisional_days: Option<usize>,
    history_days: Option<usize>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() || matches!(args[0].as_str(), "-h" | "--help") {
        print_help();
        return Ok(());
    }
    if matches!(args[0].as_str(), "-V" | "--version") {
        println!("epi {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    match args[0].as_str() {
        "run" => handle_run(parse_run_args(&args[1..])?),
        other => Err(CliError::Usage(format!(
            "unknown command '{other}'; expected: run"
        ))),
    }
}

fn parse_run_args(tokens: &[String]) -> Result<RunArgs, CliError> {
    let mut sources: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut provisional_days = None;
    let mut history_days = None;

    let mut idx = 0usize;
    while idx < tokens.len() {
        match tokens[idx].as_str() {
            "--sources" => sources = Some(PathBuf::from(take_value("--sources", tokens, &mut idx)?)),
            "--output" => output = Some(PathBuf::from(take_value("--output", tokens, &mut idx)?)),
            "--provisional-days" => {
                provisional_days =
                    Some(parse_usize("--provisional-days", &take_value("--provisional-days", tokens, &mut idx)?)?);
            }
            "--history-days" => {
                history_days =
                    Some(parse_usize("--history-days", &take_value("--history-days", tokens, &mut idx)?)?);
            }
            other => {
                return Err(CliError::Usage(format!("unknown run option '{other}'")));
            }
        }
        idx += 1;
    }

    Ok(RunArgs {
        sources: sources.ok_or_else(|| CliError::Usage("run requires --sources <dir>".into()))?,
        output: output.ok_or_else(|| CliError::Usage("run requires --output <dir>".into()))?,
        provisional_days,
        history_days,
    })
}

fn take_value(flag: &str, tokens: &[String], idx: &mut usize) -> Result<String, CliError> {
    *idx += 1;
    tokens
        .get(*idx)
        .cloned()
        .ok_or_else(|| CliError::Usage(format!("{flag} needs a value")))
}

fn parse_usize(flag: &str, raw: &str) -> Result<usize, CliError> {
    raw.parse()
        .map_err(|_| CliError::Usage(format!("{flag} expects an integer; got '{raw}'")))
}

fn handle_run(args: RunArgs) -> Result<(), CliError> {
    let mut config = PipelineConfig::default();
    if let Some(p) = args.provisional_days {
        config.rate.provisional_days = p;
        config.map.provisional_days = if p == 0 { None } else { Some(p) };
    }
    if let Some(h) = args.history_days {
        config.map = MapConfig {
            history_days: h,
            ..config.map
        };
    }

    let provider = FileSources::new(args.sources);
    let output = run_pipeline(&provider, &config)?;
    write_artifacts(&args.output, &output)
}

fn write_artifacts(dir: &Path, output: &PipelineOutput) -> Result<(), CliError> {
    fs::create_dir_all(dir).map_err(|source| CliError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    write_json(&dir.join("map.json"), "map", &output.map)?;
    write_json(&dir.join("scores.json"), "scores", &output.scores)?;
    if let Some(scottish) = &output.scottish_rolling {
        write_json(&dir.join("scottish.json"), "scottish", scottish)?;
    }
    if let Some(lineages) = &output.lineages {
        write_json(&dir.join("lineages.json"), "lineages", lineages)?;
    }
    Ok(())
}

fn write_json<T: serde::Serialize>(
    path: &Path,
    artifact: &'static str,
    value: &T,
) -> Result<(), CliError> {
    let encoded =
        serde_json::to_string_pretty(value).map_err(|source| CliError::Encode { artifact, source })?;
    fs::write(path, format!("{encoded}\n")).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn print_help() {
    println!(
        "epi - regional epidemic dashboard data pipeline

USAGE:
    epi run --sources <dir> --output <dir> [--provisional-days <n>] [--history-days <n>]

Reads a JSON source bundle and writes map.json and scores.json (plus
scottish.json and lineages.json when those sources are available)."
    );
}
