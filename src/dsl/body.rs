//! Body Builder
//!
//! The emission buffer of one `main()` build. The composer hands the same builder
//! to the core shader and to every spliced fragment in turn, switching the owner
//! between them; each owner's statements come back as a separate segment.
//!
//! Statement calls never fail on the spot. Misuse (an `end_if` without a
//! matching `start_if`, a `discard` in a vertex shader, a provable type error in
//! strict mode) is recorded and surfaces when the segment is taken, so fragment
//! code reads like straight-line shader code.

use std::borrow::Cow;

use crate::errors::{Result, ShaderError};

use super::expr::{BinaryOp, Expr, binary_result};
use super::stmt::{AssignOp, Branch, Condition, Stmt};
use super::types::{DataType, ShaderStage};

#[derive(Debug)]
struct OpenIf {
    head: Branch,
    more: Vec<Branch>,
    otherwise: Option<Vec<Stmt>>,
}

impl OpenIf {
    fn current(&mut self) -> &mut Vec<Stmt> {
        match (&mut self.otherwise, self.more.last_mut()) {
            (Some(otherwise), _) => otherwise,
            (None, Some(branch)) => &mut branch.body,
            (None, None) => &mut self.head.body,
        }
    }

    fn close(self) -> Stmt {
        let mut branches = Vec::with_capacity(1 + self.more.len());
        branches.push(self.head);
        branches.extend(self.more);
        Stmt::If {
            branches,
            otherwise: self.otherwise,
        }
    }
}

#[derive(Debug)]
pub struct BodyBuilder {
    stage: ShaderStage,
    owner: Cow<'static, str>,
    strict: bool,
    stmts: Vec<Stmt>,
    open: Vec<OpenIf>,
    temp_seq: usize,
    fault: Option<ShaderError>,
}

impl BodyBuilder {
    #[must_use]
    pub fn new(stage: ShaderStage, strict: bool) -> Self {
        Self {
            stage,
            owner: Cow::Borrowed("main"),
            strict,
            stmts: Vec::new(),
            open: Vec::new(),
            temp_seq: 0,
            fault: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Starts recording on behalf of `owner`.
    pub fn set_owner(&mut self, owner: impl Into<Cow<'static, str>>) {
        self.owner = owner.into();
    }

    /// Takes the statements recorded since the last call.
    ///
    /// Fails if a conditional is still open or any call was misused; the
    /// partial segment is discarded either way.
    pub fn take_segment(&mut self) -> Result<Vec<Stmt>> {
        let stmts = std::mem::take(&mut self.stmts);
        let open = std::mem::take(&mut self.open);
        if let Some(fault) = self.fault.take() {
            return Err(fault);
        }
        if !open.is_empty() {
            return Err(ShaderError::UnbalancedConditional {
                stage: self.stage,
                owner: self.owner.to_string(),
                reason: format!("{} `start_if` without `end_if`", open.len()),
            });
        }
        Ok(stmts)
    }

    fn record_fault(&mut self, fault: ShaderError) {
        if self.fault.is_none() {
            self.fault = Some(fault);
        }
    }

    fn unbalanced(&mut self, reason: &str) {
        self.record_fault(ShaderError::UnbalancedConditional {
            stage: self.stage,
            owner: self.owner.to_string(),
            reason: reason.to_string(),
        });
    }

    fn push(&mut self, stmt: Stmt) {
        match self.open.last_mut() {
            Some(open) => open.current().push(stmt),
            None => self.stmts.push(stmt),
        }
    }

    // ========================================================================
    // Assignments
    // ========================================================================

    pub fn assign(&mut self, target: impl Into<Expr>, value: impl Into<Expr>) {
        self.assign_op(target.into(), AssignOp::Set, value.into());
    }

    pub fn assign_add(&mut self, target: impl Into<Expr>, value: impl Into<Expr>) {
        self.assign_op(target.into(), AssignOp::Add, value.into());
    }

    pub fn assign_sub(&mut self, target: impl Into<Expr>, value: impl Into<Expr>) {
        self.assign_op(target.into(), AssignOp::Sub, value.into());
    }

    pub fn assign_mul(&mut self, target: impl Into<Expr>, value: impl Into<Expr>) {
        self.assign_op(target.into(), AssignOp::Mul, value.into());
    }

    pub fn assign_div(&mut self, target: impl Into<Expr>, value: impl Into<Expr>) {
        self.assign_op(target.into(), AssignOp::Div, value.into());
    }

    fn assign_op(&mut self, target: Expr, op: AssignOp, value: Expr) {
        if self.strict {
            self.check_assign(&target, op, &value);
        }
        self.push(Stmt::Assign { target, op, value });
    }

    fn check_assign(&mut self, target: &Expr, op: AssignOp, value: &Expr) {
        let detail = target
            .check()
            .and_then(|()| value.check())
            .err()
            .or_else(|| {
                let (t, v) = (target.data_type()?, value.data_type()?);
                let ok = match op {
                    AssignOp::Set => t == v,
                    AssignOp::Add => binary_result(BinaryOp::Add, t, v) == Some(t),
                    AssignOp::Sub => binary_result(BinaryOp::Sub, t, v) == Some(t),
                    AssignOp::Mul => binary_result(BinaryOp::Mul, t, v) == Some(t),
                    AssignOp::Div => binary_result(BinaryOp::Div, t, v) == Some(t),
                };
                (!ok).then(|| {
                    format!(
                        "`{} {} {}` assigns {v} to {t}",
                        target.render(),
                        op.symbol(),
                        value.render()
                    )
                })
            });
        if let Some(detail) = detail {
            self.record_fault(ShaderError::TypeMismatch {
                stage: self.stage,
                owner: self.owner.to_string(),
                detail,
            });
        }
    }

    // ========================================================================
    // Locals
    // ========================================================================

    /// Declares a named local and returns a reference to it.
    pub fn local(&mut self, ty: DataType, name: impl Into<String>, value: impl Into<Expr>) -> Expr {
        let name = name.into();
        let value = value.into();
        if self.strict
            && let Some(v) = value.data_type()
            && v != ty
        {
            self.record_fault(ShaderError::TypeMismatch {
                stage: self.stage,
                owner: self.owner.to_string(),
                detail: format!("local `{name}` of type {ty} initialised with {v}"),
            });
        }
        let reference = Expr::var(name.clone(), ty);
        self.push(Stmt::Declare {
            ty,
            name,
            value: Some(value),
        });
        reference
    }

    /// Declares an auto-named local (`v_<type>_<n>`).
    pub fn temp(&mut self, ty: DataType, value: impl Into<Expr>) -> Expr {
        let name = format!("v_{}_{}", ty.temp_prefix(), self.temp_seq);
        self.temp_seq += 1;
        self.local(ty, name, value)
    }

    // ========================================================================
    // Control Flow
    // ========================================================================

    /// Opens `if (condition) {`.
    pub fn start_if(&mut self, condition: Condition) {
        self.open.push(OpenIf {
            head: Branch {
                condition,
                body: Vec::new(),
            },
            more: Vec::new(),
            otherwise: None,
        });
    }

    /// Continues the innermost conditional with `} else if (condition) {`.
    pub fn else_if(&mut self, condition: Condition) {
        match self.open.last_mut() {
            Some(open) if open.otherwise.is_none() => open.more.push(Branch {
                condition,
                body: Vec::new(),
            }),
            Some(_) => self.unbalanced("`else_if` after `else_branch`"),
            None => self.unbalanced("`else_if` without `start_if`"),
        }
    }

    /// Continues the innermost conditional with `} else {`.
    pub fn else_branch(&mut self) {
        match self.open.last_mut() {
            Some(open) if open.otherwise.is_none() => open.otherwise = Some(Vec::new()),
            Some(_) => self.unbalanced("second `else_branch` on one conditional"),
            None => self.unbalanced("`else_branch` without `start_if`"),
        }
    }

    /// Closes the innermost conditional.
    pub fn end_if(&mut self) {
        match self.open.pop() {
            Some(open) => {
                let stmt = open.close();
                self.push(stmt);
            }
            None => self.unbalanced("`end_if` without `start_if`"),
        }
    }

    /// Fragment shaders only.
    pub fn discard(&mut self) {
        if self.stage == ShaderStage::Fragment {
            self.push(Stmt::Discard);
        } else {
            self.record_fault(ShaderError::InvalidStatement {
                stage: self.stage,
                owner: self.owner.to_string(),
                reason: "`discard` is only valid in fragment shaders".to_string(),
            });
        }
    }
}
