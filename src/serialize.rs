//! Validators → program text that rebuilds them.
//!
//! Every top-level validator becomes one variable. Sub-trees are emitted
//! inline, except stubs, which are emitted as the variable of the alias they
//! refer to. Each referenced variable is declared up front as a runtime stub
//! placeholder and later bound, so forward and cyclic references are legal in
//! any emission order.
use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::optimize::optimize;
use crate::oracle::UniqueId;
use crate::validator::{ExactValue, TypeTag, Validator};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid identifier regex"));
static NON_IDENTIFIER_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_$]+").expect("valid identifier regex"));

/// Names an ES module cannot bind at top level: the runtime namespace, every
/// keyword, the strict-mode reserved words and the restricted `arguments`/`eval`.
const RESERVED: &[&str] = &[
    "v", "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let", "new",
    "null", "package", "private", "protected", "public", "return", "static", "super", "switch",
    "this", "throw", "true", "try", "typeof", "undefined", "var", "void", "while", "with", "yield",
];

/// One named validator to emit.
#[derive(Debug, Clone)]
pub struct TopLevel {
    pub id: UniqueId,
    pub validator: Validator,
}

#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Run `optimize` on each top-level validator before emitting it.
    pub optimize: bool,
    /// Module the emitted program imports its validator constructors from.
    pub runtime_module: String,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self { optimize: false, runtime_module: "@guardgen/runtime".to_string() }
    }
}

pub fn serialize(entries: &[TopLevel], options: &SerializeOptions) -> Result<String> {
    let entries = dedup_by_id(entries);
    let names = assign_names(&entries)?;

    let mut referenced: IndexSet<UniqueId> = IndexSet::new();
    let mut statements = Vec::with_capacity(entries.len());
    for entry in &entries {
        let validator = if options.optimize {
            optimize(&entry.validator)
        } else {
            entry.validator.clone()
        };
        let mut emitter = Emitter { names: &names, referenced: IndexSet::new() };
        let expr = emitter.expr(&validator)?;
        debug!(id = %entry.id, references = emitter.referenced.len(), "emitted validator");
        referenced.extend(emitter.referenced);
        statements.push((entry.id.clone(), expr));
    }

    let mut out = String::new();
    out.push_str(&format!(
        "import * as v from {};\n",
        Value::String(options.runtime_module.clone())
    ));

    // placeholders, in registration order
    let placeholders: Vec<&str> = names
        .iter()
        .filter(|(id, _)| referenced.contains(*id))
        .map(|(_, name)| name.as_str())
        .collect();
    if !placeholders.is_empty() {
        out.push('\n');
        for name in &placeholders {
            out.push_str(&format!("export const {name} = v.stub();\n"));
        }
    }

    out.push('\n');
    for (id, expr) in &statements {
        let name = &names[id];
        if referenced.contains(id) {
            out.push_str(&format!("v.bind({name}, {expr});\n"));
        } else {
            out.push_str(&format!("export const {name} = {expr};\n"));
        }
    }
    Ok(out)
}

/// Identifier for a unique id: the declaration name with every run of
/// non-identifier characters replaced by `_`.
pub fn variable_name(id: &UniqueId) -> String {
    let mut name = NON_IDENTIFIER_RUN.replace_all(id.declaration_name(), "_").into_owned();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if RESERVED.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn dedup_by_id(entries: &[TopLevel]) -> Vec<TopLevel> {
    let mut seen: IndexMap<UniqueId, Validator> = IndexMap::with_capacity(entries.len());
    for entry in entries {
        seen.entry(entry.id.clone()).or_insert_with(|| entry.validator.clone());
    }
    seen.into_iter().map(|(id, validator)| TopLevel { id, validator }).collect()
}

fn assign_names(entries: &[TopLevel]) -> Result<IndexMap<UniqueId, String>> {
    let mut names = IndexMap::with_capacity(entries.len());
    let mut owners: HashMap<String, UniqueId> = HashMap::with_capacity(entries.len());
    for entry in entries {
        let name = variable_name(&entry.id);
        if let Some(first) = owners.get(&name) {
            return Err(Error::DuplicateVariableName {
                name,
                first: first.clone(),
                second: entry.id.clone(),
            });
        }
        owners.insert(name.clone(), entry.id.clone());
        names.insert(entry.id.clone(), name);
    }
    Ok(names)
}

struct Emitter<'n> {
    names: &'n IndexMap<UniqueId, String>,
    referenced: IndexSet<UniqueId>,
}

impl Emitter<'_> {
    fn expr(&mut self, validator: &Validator) -> Result<String> {
        let text = match validator {
            Validator::TypeOf(TypeTag::String) => "v.string".to_string(),
            Validator::TypeOf(TypeTag::Number) => "v.number".to_string(),
            Validator::TypeOf(TypeTag::Boolean) => "v.boolean".to_string(),
            Validator::ExactValue(ExactValue::Undefined) => "v.undefined".to_string(),
            Validator::ExactValue(ExactValue::Null) => "v.null".to_string(),
            Validator::ExactValue(ExactValue::Set(values)) => {
                let values = values.iter().map(ToString::to_string).collect::<Vec<_>>();
                format!("v.exact([{}])", values.join(", "))
            }
            Validator::Object(properties) if properties.is_empty() => "v.object({})".to_string(),
            Validator::Object(properties) => {
                let mut fields = Vec::with_capacity(properties.len());
                for (key, value) in properties.iter() {
                    fields.push(format!("{}: {}", property_key(key), self.expr(value)?));
                }
                format!("v.object({{ {} }})", fields.join(", "))
            }
            Validator::Or(members) => {
                let members = members.iter().map(|m| self.expr(m)).collect::<Result<Vec<_>>>()?;
                format!("v.or([{}])", members.join(", "))
            }
            Validator::Optional(inner) => format!("v.optional({})", self.expr(inner)?),
            Validator::Stub(stub) => {
                let name = self
                    .names
                    .get(stub.key())
                    .ok_or_else(|| Error::MissingReferenceAtSerialize { id: stub.key().clone() })?;
                self.referenced.insert(stub.key().clone());
                name.clone()
            }
        };
        Ok(text)
    }
}

/// Object-literal key for a property. `__proto__` must be computed: as a plain
/// or quoted key it sets the prototype instead of defining a property.
fn property_key(key: &str) -> String {
    if key == "__proto__" {
        "[\"__proto__\"]".to_string()
    } else if IDENTIFIER.is_match(key) {
        key.to_string()
    } else {
        Value::String(key.to_string()).to_string()
    }
}

// ------------------------------- Tests ------------------------------------ //
