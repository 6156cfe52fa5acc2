/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Command-line entry point for quarto-annotate.
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quarto_annotate::{
    ConfigLayer, CopyOutcome, DocumentOptions, copy_images, output_path, process_file,
};

mod glob_expand;
mod report;

use glob_expand::expand_globs;
use report::{FileReport, print_summary};

const DEFAULT_SUFFIX: &str = "_dist";

#[derive(Parser)]
#[command(name = "quarto-annotate")]
#[command(about = "Resolve citations, cross-references and callouts in Jupyter notebooks")]
#[command(version)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct ConfigArgs {
    /// Bibliography file (overrides project and notebook settings)
    #[arg(short, long)]
    bib: Option<PathBuf>,

    /// Language for generated labels (pt or en)
    #[arg(short, long)]
    lang: Option<String>,

    /// Project configuration file (defaults to _annotate.yml next to each notebook)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output results as JSONL
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve notebooks and write the results
    Render {
        /// Input notebooks (files or glob patterns like "chapters/*.ipynb")
        #[arg(required = true)]
        files: Vec<String>,

        #[command(flatten)]
        config: ConfigArgs,

        /// Directory for rendered notebooks (defaults to each input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Suffix appended to the output file stem
        #[arg(long, default_value = DEFAULT_SUFFIX)]
        suffix: String,

        /// Copy referenced local images next to the rendered notebooks
        #[arg(long)]
        copy_images: bool,
    },

    /// Report unresolved citations and references without writing anything
    Check {
        /// Input notebooks (files or glob patterns like "chapters/*.ipynb")
        #[arg(required = true)]
        files: Vec<String>,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "quarto_annotate=debug"
    } else {
        "quarto_annotate=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Render {
            files,
            config,
            output_dir,
            suffix,
            copy_images,
        } => {
            let file_paths = expand_globs(&files, &suffix)?;
            let options = document_options(&config);
            if let Some(dir) = &output_dir {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }

            let mut reports = Vec::with_capacity(file_paths.len());
            for file_path in &file_paths {
                let report = match render_file(
                    file_path,
                    &options,
                    output_dir.as_deref(),
                    &suffix,
                    copy_images,
                ) {
                    Ok(report) => report,
                    Err(e) => FileReport::failed(file_path, &e),
                };
                emit(&report, config.json)?;
                reports.push(report);
            }

            if !config.json {
                print_summary(&reports);
            }

            let failed = reports.iter().any(|r| r.error.is_some());
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }

        Commands::Check { files, config } => {
            let file_paths = expand_globs(&files, DEFAULT_SUFFIX)?;
            let options = document_options(&config);

            let mut reports = Vec::with_capacity(file_paths.len());
            for file_path in &file_paths {
                let report = match process_file(file_path, &options)
                    .with_context(|| format!("Failed to process {}", file_path.display()))
                {
                    Ok(document) => FileReport::from_document(file_path, &document),
                    Err(e) => FileReport::failed(file_path, &e),
                };
                emit(&report, config.json)?;
                reports.push(report);
            }

            if !config.json {
                print_summary(&reports);
            }

            let problems = reports
                .iter()
                .any(|r| r.error.is_some() || r.has_unresolved());
            Ok(if problems { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
    }
}

fn document_options(args: &ConfigArgs) -> DocumentOptions {
    DocumentOptions {
        project_config: args.config.clone(),
        overrides: ConfigLayer {
            lang: args.lang.clone(),
            bibliography: args.bib.clone(),
            ..ConfigLayer::default()
        },
    }
}

fn render_file(
    input: &Path,
    options: &DocumentOptions,
    output_dir: Option<&Path>,
    suffix: &str,
    copy: bool,
) -> Result<FileReport> {
    let document = process_file(input, options)
        .with_context(|| format!("Failed to process {}", input.display()))?;

    let output = output_path(input, output_dir, suffix);
    if same_path(input, &output) {
        anyhow::bail!(
            "Refusing to overwrite {} (use a non-empty --suffix or another --output-dir)",
            input.display()
        );
    }
    document
        .notebook
        .write(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let mut report = FileReport::from_document(input, &document);
    report.output_path = Some(output.display().to_string());

    if copy {
        let source_dir = input.parent().unwrap_or(Path::new("."));
        let target_dir = output.parent().unwrap_or(Path::new("."));
        let outcomes = copy_images(&document.images, source_dir, target_dir)
            .with_context(|| format!("Failed to copy images for {}", input.display()))?;
        for outcome in outcomes {
            match outcome {
                CopyOutcome::Copied { .. } => report.images_copied += 1,
                CopyOutcome::InPlace(_) => {}
                CopyOutcome::Missing(image) => report.missing_images.push(image),
            }
        }
    }

    Ok(report)
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn emit(report: &FileReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        report.print();
    }
    Ok(())
}
