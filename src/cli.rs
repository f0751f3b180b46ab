//! CLI: document → (tree | semantics | emit)
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;

use crate::assemble::{Translation, translate};
use crate::codegen::{Codegen, write_units};
use crate::config::{Config, Target};
use crate::document::Document;
use crate::error::Diagnostics;
use crate::lower::lower_structures;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// parse bitstream syntax tables out of a standards document and
/// generate parser skeletons from them
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the parsed syntax structures
    Tree(TreeOut),
    /// print the resolved variable descriptions as JSON
    Semantics(SemanticsOut),
    /// generate parser sources
    Emit(EmitOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// document export (JSON)
    #[arg(long, short)]
    input: PathBuf,

    /// TOML run configuration
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// first recorded syntax structure (overrides the config)
    #[arg(long)]
    start: Option<String>,

    /// structure that ends recording (overrides the config)
    #[arg(long)]
    end: Option<String>,

    /// structures to leave out (replaces the configured list)
    #[arg(long, num_args = 1..)]
    skip: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum TreeFormat {
    #[default]
    Tree,
    Json,
}

#[derive(clap::Parser, Debug)]
struct TreeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[arg(long, value_enum, default_value_t = TreeFormat::Tree)]
    format: TreeFormat,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct SemanticsOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct EmitOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// generated language (overrides the config)
    #[arg(long, value_enum)]
    target: Option<Target>,

    /// output directory (overrides the config)
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(start) = &self.start {
            config.tables.start = start.clone();
        }
        if let Some(end) = &self.end {
            config.tables.end = end.clone();
        }
        if let Some(skip) = &self.skip {
            config.tables.skip = skip.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn translate(&self, config: &Config, diagnostics: &mut Diagnostics) -> anyhow::Result<Translation> {
        let document = Document::load(&self.input)?;
        log::debug!("loaded {} blocks from {}", document.blocks.len(), self.input.display());
        let translation = translate(&document, config, diagnostics)
            .with_context(|| format!("no syntax structures in {}", self.input.display()))?;
        Ok(translation)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn init_logging(&self) {
        let level = if self.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
        env_logger::Builder::from_default_env().filter_level(level).init();
    }

    pub fn run(&self) -> anyhow::Result<()> {
        let mut diagnostics = Diagnostics::new();
        match &self.cmd {
            Command::Tree(target) => {
                let config = target.input_settings.config()?;
                let translation = target.input_settings.translate(&config, &mut diagnostics)?;
                let rendered = match target.format {
                    TreeFormat::Tree => {
                        let trees: Vec<String> = translation.structures.iter().map(|s| s.to_string()).collect();
                        trees.join("\n")
                    }
                    TreeFormat::Json => serde_json::to_string_pretty(&translation.structures)?,
                };
                write_or_print(target.out.as_ref(), &rendered)?;
            }
            Command::Semantics(target) => {
                let config = target.input_settings.config()?;
                let translation = target.input_settings.translate(&config, &mut diagnostics)?;
                let rendered = serde_json::to_string_pretty(&translation.descriptions)?;
                write_or_print(target.out.as_ref(), &rendered)?;
            }
            Command::Emit(target) => {
                let mut config = target.input_settings.config()?;
                if let Some(lang) = target.target {
                    config.output.target = lang;
                }
                if let Some(dir) = &target.out_dir {
                    config.output.directory = dir.clone();
                }
                let translation = target.input_settings.translate(&config, &mut diagnostics)?;
                let records = lower_structures(&translation.structures, &mut diagnostics);
                let mut cg = Codegen::new(config.output.target);
                cg.emit(&records, &config.output.groups);
                write_units(&config.output.directory, &cg.into_units())?;
            }
        }
        report(&diagnostics);
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_or_print(out: Option<&PathBuf>, contents: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, contents).with_context(|| format!("writing {}", out.display()))?;
        }
        None => println!("{contents}"),
    }
    Ok(())
}

fn report(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        eprintln!("{}", "done, no diagnostics".green());
        return;
    }
    let count = diagnostics.iter().filter(|d| d.is_structure_failure()).count();
    let warnings = diagnostics.len() - count;
    let failures = format!("{count} structure failures");
    let failures = if count == 0 { failures.normal() } else { failures.red().bold() };
    eprintln!("{} {failures}, {}", "done:".bold(), format!("{warnings} warnings").yellow());
}
