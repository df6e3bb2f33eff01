//! JSON declaration documents and the oracle over them.
//!
//! A document describes one module of named type declarations:
//!
//! ```json
//! { "module": "tree.ts",
//!   "declarations": [
//!     { "name": "Tree", "tags": ["validate"],
//!       "type": { "kind": "object", "properties": [
//!         { "name": "value", "type": { "kind": "number" } },
//!         { "name": "next", "optional": true, "type": { "kind": "ref", "name": "Tree" } } ] } } ] }
//! ```
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::oracle::{PrimitiveKind, Property, Shape, TypeOracle, UniqueId};
use crate::validator::Literal;

// ————————————————————————————————————————————————————————————————————————————
// DOCUMENT FORMAT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Module {
    /// Declaring file; the first half of every unique id.
    pub module: String,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Declaration {
    pub name: String,
    #[serde(default = "exported_by_default")]
    pub exported: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeExpr {
    String,
    Number,
    Boolean,
    Undefined,
    Null,
    Literal { value: Value },
    Object {
        #[serde(default)]
        properties: Vec<PropertyDecl>,
    },
    Union { members: Vec<TypeExpr> },
    Ref { name: String },
    /// Any kind this format does not model (arrays, tuples, functions, ...).
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    #[serde(default)]
    pub optional: bool,
}

fn exported_by_default() -> bool {
    true
}

impl Declaration {
    pub fn is_exported_and_tagged(&self, tag: &str) -> bool {
        self.exported && self.tags.iter().any(|t| t == tag)
    }
}

/// Which declarations are picked up when no explicit names are given.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub tag: String,
}

impl Default for Discovery {
    fn default() -> Self {
        Self { tag: "validate".to_string() }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARATION SET
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default)]
pub struct DeclarationSet {
    modules: Vec<Module>,
}

/// Type reference handed to the builder.
#[derive(Debug, Clone, Copy)]
pub enum DeclType<'a> {
    Named { module: usize, index: usize },
    Expr { module: usize, expr: &'a TypeExpr },
}

impl DeclarationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(source_name: &str, src: &str) -> Result<Self> {
        let mut set = Self::new();
        set.add_json(source_name, src)?;
        Ok(set)
    }

    /// Parse one module document; errors carry the JSON path of the problem.
    pub fn add_json(&mut self, source_name: &str, src: &str) -> Result<()> {
        let de = &mut serde_json::Deserializer::from_str(src);
        let module = serde_path_to_error::deserialize::<_, Module>(de).map_err(|err| {
            Error::Declarations {
                source_name: source_name.to_string(),
                path: err.path().to_string(),
                message: err.into_inner().to_string(),
            }
        })?;
        self.add(module);
        Ok(())
    }

    pub fn add(&mut self, module: Module) {
        self.modules.push(module);
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Every exported declaration carrying the discovery tag, as a qualified
    /// `module:Name` so same-named declarations of different modules stay
    /// distinct.
    pub fn discover(&self, discovery: &Discovery) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|m| {
                m.declarations
                    .iter()
                    .filter(|d| d.is_exported_and_tagged(&discovery.tag))
                    .map(move |d| format!("{}:{}", m.module, d.name))
            })
            .collect()
    }

    fn declaration(&self, module: usize, index: usize) -> Option<&Declaration> {
        self.modules.get(module)?.declarations.get(index)
    }

    fn unique_id(&self, module: usize, index: usize) -> Option<UniqueId> {
        let decl = self.declaration(module, index)?;
        Some(UniqueId::from(format!("{}:{}", self.modules[module].module, decl.name)))
    }

    fn matches(&self, name: &str, filter: impl Fn(usize, &Declaration) -> bool) -> Vec<(usize, usize)> {
        let mut found = Vec::new();
        for (m, module) in self.modules.iter().enumerate() {
            for (i, decl) in module.declarations.iter().enumerate() {
                if decl.name == name && filter(m, decl) {
                    found.push((m, i));
                }
            }
        }
        found
    }

    /// Resolve a `ref` written inside `from`: own module first, then the
    /// exported declarations of every other module.
    fn resolve_ref(&self, from: usize, name: &str) -> Result<(usize, usize)> {
        let local = self.matches(name, |m, _| m == from);
        if !local.is_empty() {
            return self.single(name, local);
        }
        let foreign = self.matches(name, |m, d| m != from && d.exported);
        self.single(name, foreign)
    }

    fn single(&self, name: &str, found: Vec<(usize, usize)>) -> Result<(usize, usize)> {
        match found.as_slice() {
            [one] => Ok(*one),
            [] => Err(Error::unresolvable(name, "no declaration with this name")),
            many => {
                let places = many
                    .iter()
                    .map(|(m, _)| self.modules[*m].module.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(Error::unresolvable(name, format!("declared more than once ({places})")))
            }
        }
    }
}

impl<'a> TypeOracle for &'a DeclarationSet {
    type Type = DeclType<'a>;

    /// `Name`, or `module:Name` to disambiguate.
    fn lookup(&self, name: &str) -> Result<DeclType<'a>> {
        let set: &'a DeclarationSet = *self;
        let found = match name.rsplit_once(':') {
            Some((module, decl)) => set.matches(decl, |m, _| set.modules[m].module == module),
            None => set.matches(name, |_, _| true),
        };
        if found.is_empty() {
            return Err(Error::NotFound { name: name.to_string() });
        }
        let (module, index) = set.single(name, found)?;
        Ok(DeclType::Named { module, index })
    }

    fn classify(&self, ty: &DeclType<'a>) -> Result<Shape<DeclType<'a>>> {
        let set: &'a DeclarationSet = *self;
        let (module, expr) = match *ty {
            DeclType::Named { module, index } => {
                let (decl, unique_id) = set
                    .declaration(module, index)
                    .zip(set.unique_id(module, index))
                    .ok_or_else(|| Error::unresolvable(set.display(ty), "dangling declaration"))?;
                return Ok(Shape::Alias {
                    unique_id,
                    underlying: DeclType::Expr { module, expr: &decl.ty },
                });
            }
            DeclType::Expr { module, expr } => (module, expr),
        };
        let at = |expr: &'a TypeExpr| DeclType::Expr { module, expr };
        let shape = match expr {
            TypeExpr::String => Shape::Primitive(PrimitiveKind::String),
            TypeExpr::Number => Shape::Primitive(PrimitiveKind::Number),
            TypeExpr::Boolean => Shape::Primitive(PrimitiveKind::Boolean),
            TypeExpr::Undefined => Shape::Primitive(PrimitiveKind::Undefined),
            TypeExpr::Null => Shape::Primitive(PrimitiveKind::Null),
            TypeExpr::Literal { value } => match Literal::of(Some(value)) {
                Some(literal @ (Literal::Bool(_) | Literal::Number(_) | Literal::String(_))) => {
                    Shape::Literal(literal)
                }
                _ => Shape::Unsupported(format!("literal type of value {value}")),
            },
            TypeExpr::Object { properties } => Shape::Object(
                properties
                    .iter()
                    .map(|p| Property { name: p.name.clone(), ty: at(&p.ty), optional: p.optional })
                    .collect(),
            ),
            TypeExpr::Union { members } => Shape::Union(members.iter().map(at).collect()),
            TypeExpr::Ref { name } => {
                let (module, index) = set.resolve_ref(module, name)?;
                return set.classify(&DeclType::Named { module, index });
            }
            TypeExpr::Unsupported => Shape::Unsupported("unsupported type kind".to_string()),
        };
        Ok(shape)
    }

    fn display(&self, ty: &DeclType<'a>) -> String {
        match *ty {
            DeclType::Named { module, index } => self
                .unique_id(module, index)
                .map(|id| id.to_string())
                .unwrap_or_else(|| format!("<declaration {module}/{index}>")),
            DeclType::Expr { module, expr } => {
                let module = self.modules.get(module).map_or("?", |m| m.module.as_str());
                match expr {
                    TypeExpr::Ref { name } => format!("{module}: {name}"),
                    TypeExpr::Object { .. } => format!("{module}: object type"),
                    TypeExpr::Union { .. } => format!("{module}: union type"),
                    TypeExpr::Literal { value } => format!("{module}: literal {value}"),
                    TypeExpr::Unsupported => format!("{module}: unsupported type"),
                    primitive => format!("{module}: {}", format!("{primitive:?}").to_lowercase()),
                }
            }
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
