//! Runs every `fixtures/*.json` scenario against the generator.
//!
//! ```text
//! cargo run -p dev-test-runner -- [FILTER_REGEX] [--fixtures DIR]
//! ```
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use guardgen::decl::Module;
use guardgen::{DeclarationSet, SerializeOptions, ValidationGenerator};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Fixture {
    declarations: Vec<Module>,
    #[serde(default)]
    cases: Vec<Case>,
    /// Substring every generation failure must contain; cases are skipped.
    #[serde(default)]
    error: Option<String>,
    /// Exact program text expected from `emit --optimize` over `cases` types.
    #[serde(default)]
    emit_optimized: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    accept: Vec<Value>,
    #[serde(default)]
    reject: Vec<Value>,
}

struct Settings {
    filter: Option<Regex>,
    dir: PathBuf,
}

fn parse_args() -> Result<Settings, String> {
    let mut filter = None;
    let mut dir = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../fixtures"));
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--fixtures" {
            dir = args.next().map(PathBuf::from).ok_or("--fixtures needs a directory")?;
        } else {
            filter = Some(Regex::new(&arg).map_err(|e| format!("bad filter {arg}: {e}"))?);
        }
    }
    Ok(Settings { filter, dir })
}

fn load(path: &Path) -> Result<Fixture, String> {
    let src = std::fs::read_to_string(path).map_err(|e| format!("read failed: {e}"))?;
    let de = &mut serde_json::Deserializer::from_str(&src);
    serde_path_to_error::deserialize(de).map_err(|e| format!("at {}: {}", e.path(), e.inner()))
}

/// Returns one line per problem; empty means the fixture passed.
fn run(fixture: Fixture) -> Vec<String> {
    let mut set = DeclarationSet::new();
    for module in fixture.declarations {
        set.add(module);
    }
    let mut generator = ValidationGenerator::new(&set);
    let names: Vec<&str> = fixture.cases.iter().map(|c| c.ty.as_str()).collect();

    let built = match (generator.generate(&names), &fixture.error) {
        (Err(err), Some(expected)) if err.to_string().contains(expected.as_str()) => return vec![],
        (Err(err), _) => return vec![format!("generation failed: {err}")],
        (Ok(_), Some(expected)) => return vec![format!("expected generation to fail with `{expected}`")],
        (Ok(built), None) => built,
    };

    let mut problems = Vec::new();
    for case in &fixture.cases {
        let Some(validator) = built.get(&case.ty) else {
            problems.push(format!("{}: not generated", case.ty));
            continue;
        };
        for value in &case.accept {
            if let Err(err) = validator.check(value) {
                problems.push(format!("{}: rejected {value}: {err}", case.ty));
            }
        }
        for value in &case.reject {
            if validator.check(value).is_ok() {
                problems.push(format!("{}: accepted {value}", case.ty));
            }
        }
    }

    if let Some(expected) = &fixture.emit_optimized {
        let options = SerializeOptions { optimize: true, ..Default::default() };
        match generator.serialize(&options) {
            Ok(program) if &program == expected => {}
            Ok(program) => problems.push(format!("emitted program differs:\n{program}")),
            Err(err) => problems.push(format!("serialize failed: {err}")),
        }
    }
    problems
}

fn main() -> ExitCode {
    let settings = match parse_args() {
        Ok(settings) => settings,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };
    let mut paths: Vec<PathBuf> = match std::fs::read_dir(&settings.dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect(),
        Err(err) => {
            eprintln!("cannot list {}: {err}", settings.dir.display());
            return ExitCode::FAILURE;
        }
    };
    paths.sort();

    let (mut passed, mut failed) = (0usize, 0usize);
    for path in paths {
        let name = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        if settings.filter.as_ref().is_some_and(|re| !re.is_match(&name)) {
            continue;
        }
        let problems = match load(&path) {
            Ok(fixture) => run(fixture),
            Err(message) => vec![message],
        };
        if problems.is_empty() {
            passed += 1;
            println!("{} {name}", "PASS".green());
        } else {
            failed += 1;
            println!("{} {name}", "FAIL".red().bold());
            for problem in problems {
                println!("    {problem}");
            }
        }
    }
    println!("{passed} passed, {failed} failed");
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
