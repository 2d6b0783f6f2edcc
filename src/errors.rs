//! Error Types
//!
//! This module defines the error types used throughout the composer.
//!
//! # Overview
//!
//! The main error type [`ShaderError`] covers every failure a material build can hit:
//! - Declaration conflicts and missing shared globals (compose time)
//! - Unbalanced conditionals and misplaced statements (body emission)
//! - Rejected sources reported by the graphics backend
//! - Use of a program that was invalidated and not yet rebuilt
//!
//! Locations reported as "not found" by the backend are deliberately absent from
//! this list: an optimised-out variable is a normal outcome and writes to it are skipped.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, ShaderError>`.
//!
//! ```rust,ignore
//! use loom::errors::{Result, ShaderError};
//!
//! fn rebuild(material: &mut Material, backend: &mut dyn GraphicsBackend) -> Result<()> {
//!     material.build(backend)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::dsl::ShaderStage;

/// Diagnostic returned by a backend that refused to compile or link a program.
///
/// `stage` is `None` when both stages compiled but linking failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} failed: {log}", stage_label(*.stage))]
pub struct CompileError {
    /// Stage whose compilation failed, `None` for the link step.
    pub stage: Option<ShaderStage>,
    /// Full source handed to the compiler (both stages joined for link failures).
    pub shader_source: String,
    /// Native compiler log.
    pub log: String,
}

fn stage_label(stage: Option<ShaderStage>) -> String {
    match stage {
        Some(stage) => format!("{stage} shader compilation"),
        None => "program link".to_string(),
    }
}

/// The main error type for shader composition.
#[derive(Error, Debug)]
pub enum ShaderError {
    // ========================================================================
    // Declaration Errors
    // ========================================================================
    /// A variable was declared twice with incompatible definitions.
    #[error("{stage} shader: conflicting declaration of `{name}`: {reason}")]
    DeclarationConflict {
        stage: ShaderStage,
        name: String,
        reason: String,
    },

    /// A fragment looked up a well-known global that nothing declared.
    #[error("{stage} shader: `{name}` is required but no attached shader declares it")]
    MissingGlobal { stage: ShaderStage, name: String },

    // ========================================================================
    // Body Emission Errors
    // ========================================================================
    /// `start_if` / `end_if` did not balance inside one fragment body.
    #[error("{stage} shader: unbalanced conditional in `{owner}`: {reason}")]
    UnbalancedConditional {
        stage: ShaderStage,
        owner: String,
        reason: String,
    },

    /// A statement that the stage cannot express (e.g. `discard` in a vertex shader).
    #[error("{stage} shader: `{owner}` emitted an invalid statement: {reason}")]
    InvalidStatement {
        stage: ShaderStage,
        owner: String,
        reason: String,
    },

    /// Only raised when strict type checking is enabled.
    #[error("{stage} shader: type mismatch in `{owner}`: {detail}")]
    TypeMismatch {
        stage: ShaderStage,
        owner: String,
        detail: String,
    },

    /// Rendering the final source template failed.
    #[error("Shader template error: {0}")]
    Template(#[from] minijinja::Error),

    // ========================================================================
    // Program Errors
    // ========================================================================
    /// The backend rejected the generated source.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Locations were requested before a program was linked.
    #[error("material `{material}` has no linked program")]
    NotLinked { material: String },

    /// The program was invalidated (mutation or context loss) and not rebuilt.
    #[error("material `{material}` uses a stale program handle; rebuild required")]
    StaleHandleUse { material: String },

    /// More samplers than the backend exposes texture units for.
    #[error("too many textures: {requested} requested, {max} texture units available")]
    TooManyTextures { requested: u32, max: u32 },
}

impl ShaderError {
    /// Returns `true` for failures that only mean "skip this draw".
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleHandleUse { .. })
    }
}

/// Alias for `Result<T, ShaderError>`.
pub type Result<T> = std::result::Result<T, ShaderError>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn compile_error_keeps_the_rejected_text_out_of_the_cause_chain() {
        let err = CompileError {
            stage: Some(ShaderStage::Fragment),
            shader_source: "void main() {".to_string(),
            log: "ERROR: 0:1: unexpected end".to_string(),
        };
        assert!(err.source().is_none());
        assert_eq!(
            err.to_string(),
            "fragment shader compilation failed: ERROR: 0:1: unexpected end"
        );

        let wrapped = ShaderError::from(err);
        assert!(matches!(wrapped, ShaderError::Compile(ref inner) if inner.shader_source == "void main() {"));
        assert!(!wrapped.is_stale());
    }

    #[test]
    fn link_failures_have_no_stage() {
        let err = CompileError {
            stage: None,
            shader_source: String::new(),
            log: "link failed".to_string(),
        };
        assert_eq!(err.to_string(), "program link failed: link failed");
    }
}
