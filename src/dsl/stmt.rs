//! Statements and Conditions
//!
//! The statement tree recorded by a [`BodyBuilder`](super::BodyBuilder) and the
//! stateless renderer that turns it into indented source text.

use std::fmt::Write as _;

use smallvec::SmallVec;

use super::expr::Expr;
use super::types::DataType;

/// Assignment operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
        }
    }
}

/// Relational operator of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl RelOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
        }
    }
}

/// Join between two comparisons of a condition chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    And,
    Or,
    Xor,
}

impl LogicOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            LogicOp::And => "&&",
            LogicOp::Or => "||",
            LogicOp::Xor => "^^",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub lhs: Expr,
    pub op: RelOp,
    pub rhs: Expr,
}

/// A chain of comparisons joined left to right, e.g. `a < b && c <= -0.15`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    first: Comparison,
    rest: SmallVec<[(LogicOp, Comparison); 2]>,
}

impl Condition {
    pub fn new(lhs: impl Into<Expr>, op: RelOp, rhs: impl Into<Expr>) -> Self {
        Self {
            first: Comparison {
                lhs: lhs.into(),
                op,
                rhs: rhs.into(),
            },
            rest: SmallVec::new(),
        }
    }

    /// Appends a comparison with the given join.
    #[must_use]
    pub fn join(
        mut self,
        logic: LogicOp,
        lhs: impl Into<Expr>,
        op: RelOp,
        rhs: impl Into<Expr>,
    ) -> Self {
        self.rest.push((
            logic,
            Comparison {
                lhs: lhs.into(),
                op,
                rhs: rhs.into(),
            },
        ));
        self
    }

    #[must_use]
    pub fn and(self, lhs: impl Into<Expr>, op: RelOp, rhs: impl Into<Expr>) -> Self {
        self.join(LogicOp::And, lhs, op, rhs)
    }

    #[must_use]
    pub fn or(self, lhs: impl Into<Expr>, op: RelOp, rhs: impl Into<Expr>) -> Self {
        self.join(LogicOp::Or, lhs, op, rhs)
    }

    #[must_use]
    pub fn xor(self, lhs: impl Into<Expr>, op: RelOp, rhs: impl Into<Expr>) -> Self {
        self.join(LogicOp::Xor, lhs, op, rhs)
    }

    pub fn comparisons(&self) -> impl Iterator<Item = &Comparison> {
        std::iter::once(&self.first).chain(self.rest.iter().map(|(_, c)| c))
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        render_comparison(&self.first, &mut out);
        for (logic, comparison) in &self.rest {
            let _ = write!(out, " {} ", logic.symbol());
            render_comparison(comparison, &mut out);
        }
        out
    }
}

fn render_comparison(comparison: &Comparison, out: &mut String) {
    comparison.lhs.render_into(out);
    let _ = write!(out, " {} ", comparison.op.symbol());
    comparison.rhs.render_into(out);
}

/// One `if` / `else if` arm.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Condition,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `type name;` or `type name = value;`
    Declare {
        ty: DataType,
        name: String,
        value: Option<Expr>,
    },
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
    },
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Stmt>>,
    },
    Discard,
}

impl Stmt {
    /// Number of statements including the ones nested in conditionals.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Stmt::If {
                branches,
                otherwise,
            } => {
                1 + branches
                    .iter()
                    .flat_map(|b| &b.body)
                    .chain(otherwise.iter().flatten())
                    .map(Stmt::count)
                    .sum::<usize>()
            }
            _ => 1,
        }
    }
}

pub const INDENT: &str = "    ";

/// Renders statements at the given nesting depth.
pub fn render_block(stmts: &[Stmt], depth: usize, out: &mut String) {
    for stmt in stmts {
        render_stmt(stmt, depth, out);
    }
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn render_stmt(stmt: &Stmt, depth: usize, out: &mut String) {
    indent(depth, out);
    match stmt {
        Stmt::Declare { ty, name, value } => {
            let _ = write!(out, "{ty} {name}");
            if let Some(value) = value {
                out.push_str(" = ");
                value.render_into(out);
            }
            out.push_str(";\n");
        }
        Stmt::Assign { target, op, value } => {
            target.render_into(out);
            let _ = write!(out, " {} ", op.symbol());
            value.render_into(out);
            out.push_str(";\n");
        }
        Stmt::If {
            branches,
            otherwise,
        } => {
            for (i, branch) in branches.iter().enumerate() {
                if i > 0 {
                    out.push_str(" else ");
                }
                let _ = writeln!(out, "if ({}) {{", branch.condition.render());
                render_block(&branch.body, depth + 1, out);
                indent(depth, out);
                out.push('}');
            }
            if let Some(otherwise) = otherwise {
                out.push_str(" else {\n");
                render_block(otherwise, depth + 1, out);
                indent(depth, out);
                out.push('}');
            }
            out.push('\n');
        }
        Stmt::Discard => out.push_str("discard;\n"),
    }
}
