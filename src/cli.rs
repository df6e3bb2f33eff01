//! Minimal CLI: declarations → (emitted validators | checked documents)
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::decl::{DeclarationSet, Discovery};
use crate::documents::{DocumentSource, resolve_file_path_patterns};
use crate::error::Error;
use crate::generator::ValidationGenerator;
use crate::serialize::SerializeOptions;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// build runtime validators from type declarations and emit them as code, or check JSON documents against them
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// log construction details (same as RUST_LOG=debug)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate validators and print the program text that rebuilds them
    Emit(EmitOut),
    /// validate JSON documents against one declared type
    Check(CheckIn),
}

#[derive(Args, Debug, Clone)]
struct DeclarationSettings {
    /// declaration documents; literal paths or quoted glob patterns
    #[arg(long = "decls", short = 'd', num_args = 1.., required = true)]
    decls: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct EmitOut {
    #[command(flatten)]
    declarations: DeclarationSettings,

    /// top-level type names; defaults to every exported declaration carrying --tag
    #[arg(long = "type", short = 't')]
    types: Vec<String>,

    /// discovery tag used when no --type is given
    #[arg(long, default_value = "validate")]
    tag: String,

    /// canonicalize validators before emitting them
    #[arg(long)]
    optimize: bool,

    /// module the generated code imports its runtime from
    #[arg(long, default_value = "@guardgen/runtime")]
    runtime_module: String,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct CheckIn {
    #[command(flatten)]
    declarations: DeclarationSettings,

    /// type every document must satisfy
    #[arg(long = "type", short = 't')]
    ty: String,

    #[command(flatten)]
    input_settings: InputSettings,

    /// only print failures
    #[arg(long)]
    quiet: bool,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl DeclarationSettings {
    fn load(&self) -> Result<DeclarationSet> {
        let mut set = DeclarationSet::new();
        for path in resolve_file_path_patterns(&self.decls)? {
            let path_str = path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read declarations {path_str}"))?;
            set.add_json(&path_str, &source)?;
        }
        info!(modules = set.modules().len(), "loaded declarations");
        Ok(set)
    }
}

impl InputSettings {
    fn source(&self) -> DocumentSource {
        DocumentSource {
            ndjson: self.ndjson,
            json_pointer: self.json_pointer.clone(),
            jq_expr: self.jq_expr.clone(),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// stderr logging; `RUST_LOG` wins over `--verbose`
    pub fn init_tracing(&self) {
        let fallback = if self.verbose { "debug" } else { "warn" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    pub fn run(&self) -> Result<ExitCode> {
        match &self.cmd {
            Command::Emit(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(ExitCode::SUCCESS);
                }
                let set = target.declarations.load()?;
                let names = if target.types.is_empty() {
                    set.discover(&Discovery { tag: target.tag.clone() })
                } else {
                    target.types.clone()
                };
                if names.is_empty() {
                    warn!(tag = %target.tag, "no declarations selected");
                }

                let mut generator = ValidationGenerator::new(&set);
                generator.generate(&names)?;
                let options = SerializeOptions {
                    optimize: target.optimize,
                    runtime_module: target.runtime_module.clone(),
                };
                let program = generator.serialize(&options)?;

                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("failed to create {}", parent.display()))?;
                    }
                    std::fs::write(out, &program)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                } else {
                    print!("{program}");
                }
                Ok(ExitCode::SUCCESS)
            }
            Command::Check(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(ExitCode::SUCCESS);
                }
                let set = target.declarations.load()?;
                let mut generator = ValidationGenerator::new(&set);
                let validator = generator.generate([target.ty.as_str()])?.swap_remove(&target.ty);
                let Some(validator) = validator else {
                    bail!("type {} was not generated", target.ty);
                };

                let documents = target.input_settings.source().load(&target.input_settings.input)?;
                let results: Vec<_> = documents
                    .par_iter()
                    .map(|doc| (doc, validator.check(&doc.value)))
                    .collect();

                let mut failures = 0usize;
                for (doc, result) in &results {
                    match result {
                        Ok(()) => {
                            if !target.quiet {
                                println!("{} {}", "ok".green(), doc.origin);
                            }
                        }
                        Err(Error::Validation(failure)) => {
                            failures += 1;
                            println!("{} {} {failure}", "FAIL".red().bold(), doc.origin);
                        }
                        Err(other) => return Err(other.clone().into()),
                    }
                }
                eprintln!(
                    "{} of {} documents match {}",
                    results.len() - failures,
                    results.len(),
                    target.ty
                );
                Ok(if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
            }
        }
    }
}
