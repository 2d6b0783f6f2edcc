//! Typed shader expression DSL.
//!
//! Expressions ([`Expr`]) and statements ([`Stmt`]) form an explicit tree built
//! while a shader emits its `main()`; rendering them to GLSL text is a separate,
//! side-effect free pass.

pub mod body;
pub mod expr;
pub mod func;
pub mod stmt;
pub mod types;

pub use body::BodyBuilder;
pub use expr::{BinaryOp, Builtin, Expr, Literal, ShaderValue, float_literal};
pub use stmt::{AssignOp, Branch, Comparison, Condition, LogicOp, RelOp, Stmt, render_block};
pub use types::{DataType, Precision, ShaderStage, StorageQualifier};
