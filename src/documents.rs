//! Loading JSON documents to check: file globs, NDJSON, JSON pointer
//! selection and an optional jq pre-filter.
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use jaq_core::{Compiler, Ctx, RcIter, compile::Undefined, load};
use jaq_json::Val;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct DocumentSource {
    pub ndjson: bool,
    pub json_pointer: Option<String>,
    pub jq_expr: Option<String>,
}

/// One value to validate and where it came from (`file`, `file:line`, `#n` for
/// the n-th jq output).
#[derive(Debug, Clone)]
pub struct Document {
    pub origin: String,
    pub value: Value,
}

impl DocumentSource {
    pub fn load(&self, patterns: &[String]) -> Result<Vec<Document>> {
        let mut out = Vec::new();
        for path in resolve_file_path_patterns(patterns)? {
            let path_str = path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {path_str}"))?;
            if self.ndjson {
                for (line_no, line) in source.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let origin = format!("{path_str}:{}", line_no + 1);
                    let value = serde_json::from_str(line)
                        .with_context(|| format!("failed to parse JSON at {origin}"))?;
                    self.select(origin, value, &mut out)?;
                }
            } else {
                let value = serde_json::from_str(&source)
                    .with_context(|| format!("failed to parse JSON file {path_str}"))?;
                self.select(path_str, value, &mut out)?;
            }
        }
        debug!(documents = out.len(), "loaded documents");
        Ok(out)
    }

    fn select(&self, origin: String, value: Value, out: &mut Vec<Document>) -> Result<()> {
        let value = match &self.json_pointer {
            None => value,
            Some(pointer) => value
                .pointer(pointer)
                .cloned()
                .ok_or_else(|| anyhow!("{origin}: JSON pointer {pointer} selects nothing"))?,
        };
        match &self.jq_expr {
            None => out.push(Document { origin, value }),
            Some(filter) => {
                let results = run_jaq(filter, &value)
                    .with_context(|| format!("{origin}: failed to apply jq expression"))?;
                for (index, value) in results.into_iter().enumerate() {
                    out.push(Document { origin: format!("{origin}#{index}"), value });
                }
            }
        }
        Ok(())
    }
}

/// Expand glob patterns; literal paths pass through untouched.
pub fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if !has_glob_chars(pattern) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let before = out.len();
        for entry in glob::glob(pattern).with_context(|| format!("bad glob pattern {pattern}"))? {
            out.push(entry?);
        }
        if out.len() == before {
            bail!("glob pattern matched no files: {pattern}");
        }
    }
    Ok(out)
}

/// Run a jq program over one value, returning every output.
pub fn run_jaq(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader.load(&arena, program).map_err(parse_errors)?;
    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(undefined_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut values = Vec::new();
    for output in outputs {
        let output = output.map_err(|e| anyhow!("jq runtime error: {e:?}"))?;
        // Val renders as JSON text
        values.push(serde_json::from_str(&output.to_string()).context("jq produced invalid JSON")?);
    }
    Ok(values)
}

fn parse_errors(errs: Vec<(load::File<&str, ()>, load::Error<&str>)>) -> anyhow::Error {
    let lines = errs
        .iter()
        .map(|(file, err)| format!("parse error: {err:?} in `{}`", file.code))
        .collect::<Vec<_>>();
    anyhow!(lines.join("\n"))
}

fn undefined_errors(errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>) -> anyhow::Error {
    let lines = errs
        .iter()
        .flat_map(|(file, list)| {
            list.iter()
                .map(move |(name, undef)| format!("undefined `{name}`: {undef:?} in `{}`", file.code))
        })
        .collect::<Vec<_>>();
    anyhow!(lines.join("\n"))
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_pointer_selects_a_subdocument() {
        let source = DocumentSource { json_pointer: Some("/data/0".into()), ..Default::default() };
        let mut out = Vec::new();
        source.select("doc".into(), json!({"data": [{"a": 1}]}), &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, json!({"a": 1}));
    }

    #[test]
    fn missing_pointer_target_is_an_error() {
        let source = DocumentSource { json_pointer: Some("/nope".into()), ..Default::default() };
        let mut out = Vec::new();
        assert!(source.select("doc".into(), json!({}), &mut out).is_err());
    }

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["a.json", "dir/b.json"]).unwrap();
        assert_eq!(paths, [PathBuf::from("a.json"), PathBuf::from("dir/b.json")]);
    }
}
