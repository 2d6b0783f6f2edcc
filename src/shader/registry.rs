//! Variable Registry
//!
//! One [`StageRegistry`] per shader stage collects every declaration made by the
//! core shader and the fragments composed into it, in declaration order.
//!
//! Rules:
//! - a name exists at most once per stage;
//! - an owner declaring the same name twice is a conflict;
//! - a second owner declaring an identical variable is a no-op (first claim wins),
//!   which is how fragments share globals and well-known uniforms;
//! - a second owner declaring the same name differently is a conflict.
//!
//! After the declare phase the registry is frozen into a [`SymbolTable`] that
//! fragments receive in `main()`.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::dsl::{DataType, Expr, Precision, ShaderStage, StorageQualifier};
use crate::errors::{Result, ShaderError};

use super::keys::ShaderVarKey;
use super::var::ShaderVar;

#[derive(Debug)]
struct Entry {
    var: ShaderVar,
    owner: String,
}

/// A helper function emitted verbatim before `main()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub source: String,
}

#[derive(Debug)]
pub struct StageRegistry {
    stage: ShaderStage,
    entries: Vec<Entry>,
    by_name: FxHashMap<String, usize>,
    directives: Vec<String>,
    precisions: Vec<(DataType, Precision)>,
    functions: Vec<FunctionDef>,
    declared: FxHashSet<String>,
}

impl StageRegistry {
    #[must_use]
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            entries: Vec::new(),
            by_name: FxHashMap::default(),
            directives: Vec::new(),
            precisions: Vec::new(),
            functions: Vec::new(),
            declared: FxHashSet::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Opens the declare phase for `owner`.
    ///
    /// Returns `None` when `owner` already declared into this registry, which
    /// makes re-entering a declare phase harmless.
    pub fn begin(&mut self, owner: &str) -> Option<Declarations<'_>> {
        if !self.declared.insert(owner.to_string()) {
            log::debug!("{} registry: `{owner}` already declared, skipping", self.stage);
            return None;
        }
        Some(Declarations {
            owner: owner.to_string(),
            registry: self,
        })
    }

    #[must_use]
    pub fn has_declared(&self, owner: &str) -> bool {
        self.declared.contains(owner)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ShaderVar> {
        self.by_name.get(name).map(|&i| &self.entries[i].var)
    }

    #[must_use]
    pub fn owner_of(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(|&i| self.entries[i].owner.as_str())
    }

    /// All variables in declaration order.
    pub fn vars(&self) -> impl Iterator<Item = &ShaderVar> {
        self.entries.iter().map(|e| &e.var)
    }

    pub fn with_qualifier(&self, qualifier: StorageQualifier) -> impl Iterator<Item = &ShaderVar> {
        self.vars().filter(move |v| v.qualifier() == qualifier)
    }

    #[must_use]
    pub fn directives(&self) -> &[String] {
        &self.directives
    }

    #[must_use]
    pub fn precisions(&self) -> &[(DataType, Precision)] {
        &self.precisions
    }

    #[must_use]
    pub fn functions(&self) -> &[FunctionDef] {
        &self.functions
    }

    fn conflict(&self, name: &str, reason: String) -> ShaderError {
        ShaderError::DeclarationConflict {
            stage: self.stage,
            name: name.to_string(),
            reason,
        }
    }

    fn insert(&mut self, owner: &str, var: ShaderVar) -> Result<ShaderVar> {
        match var.qualifier() {
            StorageQualifier::Local => {
                return Err(self.conflict(
                    var.name(),
                    format!("`{owner}` declared a local outside main()"),
                ));
            }
            StorageQualifier::Attribute if self.stage == ShaderStage::Fragment => {
                return Err(self.conflict(
                    var.name(),
                    format!("`{owner}` declared an attribute in a fragment shader"),
                ));
            }
            _ => {}
        }

        let Some(&index) = self.by_name.get(var.name()) else {
            self.by_name.insert(var.name().to_string(), self.entries.len());
            self.entries.push(Entry {
                var: var.clone(),
                owner: owner.to_string(),
            });
            return Ok(var);
        };

        let existing = &self.entries[index];
        if existing.owner == owner {
            return Err(self.conflict(var.name(), format!("declared twice by `{owner}`")));
        }
        let identical = if var.qualifier() == StorageQualifier::Const {
            existing.var == var
        } else {
            existing.var.same_shape(&var)
        };
        if identical {
            return Ok(existing.var.clone());
        }
        Err(self.conflict(
            var.name(),
            format!(
                "`{owner}` declares {} {}{} but `{}` already declared {} {}{}",
                var.qualifier(),
                var.data_type(),
                array_suffix(var.array_len()),
                existing.owner,
                existing.var.qualifier(),
                existing.var.data_type(),
                array_suffix(existing.var.array_len()),
            ),
        ))
    }

    /// Freezes the declarations into the lookup table handed to `main()`.
    #[must_use]
    pub fn symbols<I, S>(&self, fragment_ids: I) -> SymbolTable
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = ShaderVarKey::ALL
            .iter()
            .filter_map(|&key| {
                let var = self.get(key.name())?;
                (var.data_type() == key.data_type() && var.qualifier() == key.qualifier())
                    .then(|| (key, var.clone()))
            })
            .collect();
        SymbolTable {
            stage: self.stage,
            keys,
            fragments: fragment_ids.into_iter().map(Into::into).collect(),
        }
    }
}

fn array_suffix(len: Option<u32>) -> String {
    len.map(|n| format!("[{n}]")).unwrap_or_default()
}

// ============================================================================
// Declarations
// ============================================================================

/// The registry as seen by one owner during its declare phase.
#[derive(Debug)]
pub struct Declarations<'a> {
    registry: &'a mut StageRegistry,
    owner: String,
}

impl Declarations<'_> {
    #[inline]
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.registry.stage
    }

    #[inline]
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Declares `var`, returning the registered variable.
    pub fn declare(&mut self, var: ShaderVar) -> Result<ShaderVar> {
        self.registry.insert(&self.owner, var)
    }

    /// Declares the canonical variable for a well-known role.
    pub fn key(&mut self, key: ShaderVarKey) -> Result<ShaderVar> {
        self.declare(key.var())
    }

    pub fn uniform(&mut self, name: &'static str, ty: DataType) -> Result<ShaderVar> {
        self.declare(ShaderVar::uniform(name, ty))
    }

    pub fn attribute(&mut self, name: &'static str, ty: DataType) -> Result<ShaderVar> {
        self.declare(ShaderVar::attribute(name, ty))
    }

    pub fn varying(&mut self, name: &'static str, ty: DataType) -> Result<ShaderVar> {
        self.declare(ShaderVar::varying(name, ty))
    }

    pub fn global(&mut self, name: &'static str, ty: DataType) -> Result<ShaderVar> {
        self.declare(ShaderVar::global(name, ty))
    }

    pub fn constant(&mut self, name: &'static str, ty: DataType, value: impl Into<Expr>) -> Result<ShaderVar> {
        self.declare(ShaderVar::constant(name, ty, value))
    }

    /// Adds a preprocessor line such as `#extension GL_OES_EGL_image_external : require`.
    pub fn directive(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !self.registry.directives.contains(&line) {
            self.registry.directives.push(line);
        }
    }

    /// Sets the default precision for `ty`; the first setting wins.
    pub fn precision(&mut self, ty: DataType, precision: Precision) {
        match self.registry.precisions.iter().find(|(t, _)| *t == ty) {
            Some((_, existing)) if *existing != precision => log::debug!(
                "{} registry: `{}` asked for {} {ty}, keeping {}",
                self.registry.stage,
                self.owner,
                precision.keyword(),
                existing.keyword()
            ),
            Some(_) => {}
            None => self.registry.precisions.push((ty, precision)),
        }
    }

    /// Adds a helper function. Identical re-definitions are ignored.
    pub fn function(&mut self, name: impl Into<String>, source: impl Into<String>) -> Result<()> {
        let def = FunctionDef {
            name: name.into(),
            source: source.into(),
        };
        match self.registry.functions.iter().find(|f| f.name == def.name) {
            Some(existing) if *existing == def => Ok(()),
            Some(_) => Err(self.registry.conflict(
                &def.name,
                format!("`{}` redefines function with a different body", self.owner),
            )),
            None => {
                self.registry.functions.push(def);
                Ok(())
            }
        }
    }
}

// ============================================================================
// Symbol Table
// ============================================================================

/// Read-only view of a stage's shared symbols, passed explicitly to `main()`.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    stage: ShaderStage,
    keys: FxHashMap<ShaderVarKey, ShaderVar>,
    fragments: FxHashSet<String>,
}

impl SymbolTable {
    #[inline]
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[must_use]
    pub fn get(&self, key: ShaderVarKey) -> Option<&ShaderVar> {
        self.keys.get(&key)
    }

    /// Looks up a well-known variable that must have been declared.
    pub fn require(&self, key: ShaderVarKey) -> Result<ShaderVar> {
        self.keys
            .get(&key)
            .cloned()
            .ok_or_else(|| ShaderError::MissingGlobal {
                stage: self.stage,
                name: key.name().to_string(),
            })
    }

    /// Whether a fragment with `shader_id` is attached to the material,
    /// including metadata-only fragments.
    #[must_use]
    pub fn has_fragment(&self, shader_id: &str) -> bool {
        self.fragments.contains(shader_id)
    }
}
