//! Expression Trees
//!
//! [`Expr`] is an immutable tree of operator nodes over variable references and
//! literals. Operators and swizzles always build a *new* node; nothing is written
//! anywhere until a [`BodyBuilder`](super::BodyBuilder) records a statement that
//! uses the expression, and rendering is a pure function of the tree.
//!
//! Types are tracked where they can be inferred (`mat4 * vec4` is a `vec4`,
//! `float * vec3` is a `vec3`) but are never enforced here. Strict checking is an
//! opt-in pass, see [`Expr::check`].

use std::borrow::Cow;
use std::fmt::Write as _;
use std::ops::{Add, Div, Mul, Rem, Sub};

use super::types::DataType;

// ============================================================================
// Literals
// ============================================================================

/// Literal constant. Floats always render with a decimal point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Float(f32),
    Int(i32),
    Bool(bool),
}

impl Literal {
    #[must_use]
    pub fn data_type(self) -> DataType {
        match self {
            Literal::Float(_) => DataType::Float,
            Literal::Int(_) => DataType::Int,
            Literal::Bool(_) => DataType::Bool,
        }
    }

    fn is_negative(self) -> bool {
        match self {
            Literal::Float(v) => v.is_sign_negative(),
            Literal::Int(v) => v < 0,
            Literal::Bool(_) => false,
        }
    }

    fn render_into(self, out: &mut String) {
        match self {
            Literal::Float(v) => out.push_str(&float_literal(v)),
            Literal::Int(v) => {
                let _ = write!(out, "{v}");
            }
            Literal::Bool(v) => out.push_str(if v { "true" } else { "false" }),
        }
    }
}

/// Formats a float so the target language never reads it as an integer.
#[must_use]
pub fn float_literal(value: f32) -> String {
    if !value.is_finite() {
        log::warn!("non-finite float literal {value} rendered as 0.0");
        return "0.0".to_string();
    }
    let text = format!("{value:?}");
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{text}.0")
    }
}

// ============================================================================
// Operators & Builtins
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 2,
        }
    }
}

/// Built-in functions of the target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Abs,
    Acos,
    Atan,
    Clamp,
    Cos,
    Cross,
    Distance,
    Dot,
    Floor,
    Fract,
    InverseSqrt,
    Length,
    Max,
    Min,
    Mix,
    Mod,
    Normalize,
    Pow,
    Radians,
    Reflect,
    Sin,
    Sqrt,
    Step,
    Tan,
    Texture1D,
    Texture2D,
    Texture2DProj,
    Texture3D,
    TextureCube,
}

impl Builtin {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Abs => "abs",
            Builtin::Acos => "acos",
            Builtin::Atan => "atan",
            Builtin::Clamp => "clamp",
            Builtin::Cos => "cos",
            Builtin::Cross => "cross",
            Builtin::Distance => "distance",
            Builtin::Dot => "dot",
            Builtin::Floor => "floor",
            Builtin::Fract => "fract",
            Builtin::InverseSqrt => "inversesqrt",
            Builtin::Length => "length",
            Builtin::Max => "max",
            Builtin::Min => "min",
            Builtin::Mix => "mix",
            Builtin::Mod => "mod",
            Builtin::Normalize => "normalize",
            Builtin::Pow => "pow",
            Builtin::Radians => "radians",
            Builtin::Reflect => "reflect",
            Builtin::Sin => "sin",
            Builtin::Sqrt => "sqrt",
            Builtin::Step => "step",
            Builtin::Tan => "tan",
            Builtin::Texture1D => "texture1D",
            Builtin::Texture2D => "texture2D",
            Builtin::Texture2DProj => "texture2DProj",
            Builtin::Texture3D => "texture3D",
            Builtin::TextureCube => "textureCube",
        }
    }

    /// Result type given the argument expressions.
    fn result_type(self, args: &[Expr]) -> Option<DataType> {
        match self {
            Builtin::Dot | Builtin::Length | Builtin::Distance => Some(DataType::Float),
            Builtin::Cross => Some(DataType::Vec3),
            Builtin::Texture1D
            | Builtin::Texture2D
            | Builtin::Texture2DProj
            | Builtin::Texture3D
            | Builtin::TextureCube => Some(DataType::Vec4),
            // genType functions follow their first argument
            _ => args.first().and_then(Expr::data_type),
        }
    }
}

// ============================================================================
// Expression Tree
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a declared (or built-in) variable.
    Var {
        name: Cow<'static, str>,
        ty: Option<DataType>,
    },
    Literal(Literal),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Negate(Box<Expr>),
    Swizzle {
        base: Box<Expr>,
        components: Cow<'static, str>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        ty: Option<DataType>,
    },
    Call {
        func: Builtin,
        args: Vec<Expr>,
    },
    /// Constructor or cast, e.g. `mat3(m)` or `int(x)`.
    Construct {
        ty: DataType,
        args: Vec<Expr>,
    },
    /// Explicit parentheses.
    Group(Box<Expr>),
}

const ATOM: u8 = 4;
const UNARY: u8 = 3;

impl Expr {
    /// Reference to a variable by name.
    pub fn var(name: impl Into<Cow<'static, str>>, ty: DataType) -> Self {
        Expr::Var {
            name: name.into(),
            ty: Some(ty),
        }
    }

    /// Reference to a language builtin such as `gl_Position`.
    #[must_use]
    pub fn builtin_var(name: &'static str, ty: DataType) -> Self {
        Expr::var(name, ty)
    }

    pub fn binary(op: BinaryOp, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs.into()),
            rhs: Box::new(rhs.into()),
        }
    }

    #[must_use]
    pub fn call(func: Builtin, args: Vec<Expr>) -> Self {
        Expr::Call { func, args }
    }

    #[must_use]
    pub fn construct(ty: DataType, args: Vec<Expr>) -> Self {
        Expr::Construct { ty, args }
    }

    /// Inferred type, `None` when an operand's type is unknown or the
    /// combination is not one the target language accepts.
    #[must_use]
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Expr::Var { ty, .. } | Expr::Index { ty, .. } => *ty,
            Expr::Literal(literal) => Some(literal.data_type()),
            Expr::Binary { op, lhs, rhs } => {
                binary_result(*op, lhs.data_type()?, rhs.data_type()?)
            }
            Expr::Negate(inner) | Expr::Group(inner) => inner.data_type(),
            Expr::Swizzle { components, .. } => DataType::float_vector(components.len()),
            Expr::Call { func, args } => func.result_type(args),
            Expr::Construct { ty, .. } => Some(*ty),
        }
    }

    /// Name of the root variable, if this expression is a plain reference.
    #[must_use]
    pub fn var_name(&self) -> Option<&str> {
        match self {
            Expr::Var { name, .. } => Some(name),
            _ => None,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Negate(_) => UNARY,
            Expr::Literal(literal) if literal.is_negative() => UNARY,
            _ => ATOM,
        }
    }

    /// Renders the expression as target-language source.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    pub fn render_into(&self, out: &mut String) {
        match self {
            Expr::Var { name, .. } => out.push_str(name),
            Expr::Literal(literal) => literal.render_into(out),
            Expr::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                render_operand(lhs, lhs.precedence() < prec, out);
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                render_operand(rhs, rhs.precedence() <= prec, out);
            }
            Expr::Negate(inner) => {
                out.push('-');
                render_operand(inner, inner.precedence() <= UNARY, out);
            }
            Expr::Swizzle { base, components } => {
                render_operand(base, base.precedence() < ATOM, out);
                out.push('.');
                out.push_str(components);
            }
            Expr::Index { base, index, .. } => {
                render_operand(base, base.precedence() < ATOM, out);
                out.push('[');
                index.render_into(out);
                out.push(']');
            }
            Expr::Call { func, args } => render_call(func.name(), args, out),
            Expr::Construct { ty, args } => render_call(ty.glsl_name(), args, out),
            Expr::Group(inner) => {
                out.push('(');
                inner.render_into(out);
                out.push(')');
            }
        }
    }

    /// Validates swizzles and operand types that can be inferred.
    ///
    /// Unknown types pass; only provable mistakes are reported.
    pub fn check(&self) -> Result<(), String> {
        match self {
            Expr::Var { .. } | Expr::Literal(_) => Ok(()),
            Expr::Binary { op, lhs, rhs } => {
                lhs.check()?;
                rhs.check()?;
                if let (Some(l), Some(r)) = (lhs.data_type(), rhs.data_type())
                    && binary_result(*op, l, r).is_none()
                {
                    return Err(format!(
                        "cannot apply `{}` to {l} and {r} in `{}`",
                        op.symbol(),
                        self.render()
                    ));
                }
                Ok(())
            }
            Expr::Negate(inner) | Expr::Group(inner) => inner.check(),
            Expr::Swizzle { base, components } => {
                base.check()?;
                check_swizzle(base, components)
            }
            Expr::Index { base, index, .. } => {
                base.check()?;
                index.check()
            }
            Expr::Call { args, .. } | Expr::Construct { args, .. } => {
                args.iter().try_for_each(Expr::check)
            }
        }
    }
}

fn render_operand(expr: &Expr, parenthesize: bool, out: &mut String) {
    if parenthesize {
        out.push('(');
        expr.render_into(out);
        out.push(')');
    } else {
        expr.render_into(out);
    }
}

fn render_call(name: &str, args: &[Expr], out: &mut String) {
    out.push_str(name);
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        arg.render_into(out);
    }
    out.push(')');
}

/// Type of `lhs op rhs` following GLSL's component-wise and linear-algebra rules.
pub(crate) fn binary_result(op: BinaryOp, lhs: DataType, rhs: DataType) -> Option<DataType> {
    use DataType::{Float, Mat3, Mat4, Vec3, Vec4};

    if lhs == rhs && !lhs.is_sampler() && lhs != DataType::Bool {
        return Some(lhs);
    }
    match (op, lhs, rhs) {
        (BinaryOp::Mul, Mat4, Vec4) | (BinaryOp::Mul, Vec4, Mat4) => Some(Vec4),
        (BinaryOp::Mul, Mat3, Vec3) | (BinaryOp::Mul, Vec3, Mat3) => Some(Vec3),
        (_, Float, other) if other.is_vector() || other.is_matrix() => Some(other),
        (_, other, Float) if other.is_vector() || other.is_matrix() => Some(other),
        _ => None,
    }
}

fn check_swizzle(base: &Expr, components: &str) -> Result<(), String> {
    const SETS: [&str; 3] = ["xyzw", "rgba", "stpq"];

    if components.is_empty() || components.len() > 4 {
        return Err(format!("swizzle `.{components}` must select 1 to 4 components"));
    }
    let Some(set) = SETS
        .iter()
        .find(|set| components.chars().all(|c| set.contains(c)))
    else {
        return Err(format!("swizzle `.{components}` mixes or misspells component names"));
    };
    let Some(ty) = base.data_type() else {
        return Ok(());
    };
    if !ty.is_vector() {
        return Err(format!(
            "swizzle `.{components}` applied to non-vector {ty} `{}`",
            base.render()
        ));
    }
    let width = ty.components().unwrap_or(0);
    let widest = components
        .chars()
        .filter_map(|c| set.find(c))
        .max()
        .unwrap_or(0);
    if widest >= width {
        return Err(format!(
            "swizzle `.{components}` reads past the end of {ty} `{}`",
            base.render()
        ));
    }
    Ok(())
}

// ============================================================================
// Conversions
// ============================================================================

impl From<Literal> for Expr {
    fn from(value: Literal) -> Self {
        Expr::Literal(value)
    }
}

impl From<f32> for Expr {
    fn from(value: f32) -> Self {
        Expr::Literal(Literal::Float(value))
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Literal(Literal::Int(value))
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Literal(Literal::Bool(value))
    }
}

impl From<&Expr> for Expr {
    fn from(value: &Expr) -> Self {
        value.clone()
    }
}

// ============================================================================
// Value Accessors
// ============================================================================

/// Anything usable as an expression operand: swizzles, indexing, grouping.
pub trait ShaderValue: Sized {
    fn to_expr(&self) -> Expr;

    fn swizzle(&self, components: impl Into<Cow<'static, str>>) -> Expr {
        Expr::Swizzle {
            base: Box::new(self.to_expr()),
            components: components.into(),
        }
    }

    /// `base[index]`. The result type is the column of a matrix or the
    /// component of a vector.
    fn element_at(&self, index: impl Into<Expr>) -> Expr {
        let base = self.to_expr();
        let ty = base.data_type().and_then(DataType::element);
        Expr::Index {
            base: Box::new(base),
            index: Box::new(index.into()),
            ty,
        }
    }

    /// Wraps the value in parentheses.
    fn enclose(&self) -> Expr {
        Expr::Group(Box::new(self.to_expr()))
    }

    fn negate(&self) -> Expr {
        Expr::Negate(Box::new(self.to_expr()))
    }

    fn x(&self) -> Expr {
        self.swizzle("x")
    }

    fn y(&self) -> Expr {
        self.swizzle("y")
    }

    fn z(&self) -> Expr {
        self.swizzle("z")
    }

    fn w(&self) -> Expr {
        self.swizzle("w")
    }

    fn r(&self) -> Expr {
        self.swizzle("r")
    }

    fn g(&self) -> Expr {
        self.swizzle("g")
    }

    fn b(&self) -> Expr {
        self.swizzle("b")
    }

    fn a(&self) -> Expr {
        self.swizzle("a")
    }

    fn s(&self) -> Expr {
        self.swizzle("s")
    }

    fn t(&self) -> Expr {
        self.swizzle("t")
    }

    fn xy(&self) -> Expr {
        self.swizzle("xy")
    }

    fn xyz(&self) -> Expr {
        self.swizzle("xyz")
    }

    fn rgb(&self) -> Expr {
        self.swizzle("rgb")
    }
}

impl ShaderValue for Expr {
    fn to_expr(&self) -> Expr {
        self.clone()
    }
}

/// Implements the arithmetic operators for an operand type.
macro_rules! impl_expr_ops {
    ($($ty:ty),* $(,)?) => {$(
        impl<R: Into<$crate::dsl::Expr>> std::ops::Add<R> for $ty {
            type Output = $crate::dsl::Expr;
            fn add(self, rhs: R) -> Self::Output {
                $crate::dsl::Expr::binary($crate::dsl::BinaryOp::Add, self, rhs)
            }
        }

        impl<R: Into<$crate::dsl::Expr>> std::ops::Sub<R> for $ty {
            type Output = $crate::dsl::Expr;
            fn sub(self, rhs: R) -> Self::Output {
                $crate::dsl::Expr::binary($crate::dsl::BinaryOp::Sub, self, rhs)
            }
        }

        impl<R: Into<$crate::dsl::Expr>> std::ops::Mul<R> for $ty {
            type Output = $crate::dsl::Expr;
            fn mul(self, rhs: R) -> Self::Output {
                $crate::dsl::Expr::binary($crate::dsl::BinaryOp::Mul, self, rhs)
            }
        }

        impl<R: Into<$crate::dsl::Expr>> std::ops::Div<R> for $ty {
            type Output = $crate::dsl::Expr;
            fn div(self, rhs: R) -> Self::Output {
                $crate::dsl::Expr::binary($crate::dsl::BinaryOp::Div, self, rhs)
            }
        }

        impl<R: Into<$crate::dsl::Expr>> std::ops::Rem<R> for $ty {
            type Output = $crate::dsl::Expr;
            fn rem(self, rhs: R) -> Self::Output {
                $crate::dsl::Expr::binary($crate::dsl::BinaryOp::Rem, self, rhs)
            }
        }

        impl std::ops::Neg for $ty {
            type Output = $crate::dsl::Expr;
            fn neg(self) -> Self::Output {
                $crate::dsl::Expr::Negate(Box::new(self.into()))
            }
        }
    )*};
}

pub(crate) use impl_expr_ops;

impl_expr_ops!(Expr, &Expr);

/// `1.0 - x` style operators with a plain number on the left.
macro_rules! impl_scalar_lhs {
    ($($scalar:ty),*) => {$(
        impl Add<Expr> for $scalar {
            type Output = Expr;
            fn add(self, rhs: Expr) -> Expr { Expr::binary(BinaryOp::Add, self, rhs) }
        }
        impl Sub<Expr> for $scalar {
            type Output = Expr;
            fn sub(self, rhs: Expr) -> Expr { Expr::binary(BinaryOp::Sub, self, rhs) }
        }
        impl Mul<Expr> for $scalar {
            type Output = Expr;
            fn mul(self, rhs: Expr) -> Expr { Expr::binary(BinaryOp::Mul, self, rhs) }
        }
        impl Div<Expr> for $scalar {
            type Output = Expr;
            fn div(self, rhs: Expr) -> Expr { Expr::binary(BinaryOp::Div, self, rhs) }
        }
        impl Rem<Expr> for $scalar {
            type Output = Expr;
            fn rem(self, rhs: Expr) -> Expr { Expr::binary(BinaryOp::Rem, self, rhs) }
        }
    )*};
}

impl_scalar_lhs!(f32, i32);

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &'static str, ty: DataType) -> Expr {
        Expr::var(name, ty)
    }

    #[test]
    fn float_literals_always_carry_a_decimal_point() {
        assert_eq!(float_literal(1.0), "1.0");
        assert_eq!(float_literal(0.005), "0.005");
        assert_eq!(float_literal(-0.15), "-0.15");
        assert_eq!(Expr::from(2i32).render(), "2");
        assert_eq!(Expr::from(true).render(), "true");
    }

    #[test]
    fn operators_render_with_minimal_parentheses() {
        let a = v("a", DataType::Vec4);
        let b = v("b", DataType::Vec4);
        let m = v("m", DataType::Mat4);

        assert_eq!((&a + &b).render(), "a + b");
        assert_eq!((&m * (&a + &b)).render(), "m * (a + b)");
        assert_eq!(((&a + &b) * 2.0).render(), "(a + b) * 2.0");
        assert_eq!((&a - (&b - &a)).render(), "a - (b - a)");
        assert_eq!((-&a).render(), "-a");
        assert_eq!((-(&a + &b)).render(), "-(a + b)");
        assert_eq!((1.0 - v("s", DataType::Float)).render(), "1.0 - s");
    }

    #[test]
    fn enclose_forces_parentheses() {
        let a = v("a", DataType::Float);
        assert_eq!(a.enclose().render(), "(a)");
        assert_eq!((a.enclose() * 3.0).render(), "(a) * 3.0");
    }

    #[test]
    fn swizzles_and_indexing() {
        let m = v("m", DataType::Mat4);
        let p = v("p", DataType::Vec4);
        assert_eq!(p.xyz().render(), "p.xyz");
        assert_eq!((&m * &p).z().render(), "(m * p).z");
        assert_eq!(m.element_at(2).render(), "m[2]");
        assert_eq!(m.element_at(2).data_type(), Some(DataType::Vec4));
    }

    #[test]
    fn rendering_is_repeatable() {
        let e = Expr::call(Builtin::Normalize, vec![v("n", DataType::Vec3) * 2.0]);
        assert_eq!(e.render(), e.render());
        assert_eq!(e.render(), "normalize(n * 2.0)");
    }

    #[test]
    fn type_inference_follows_linear_algebra() {
        let m = v("m", DataType::Mat4);
        let p = v("p", DataType::Vec4);
        assert_eq!((&m * &p).data_type(), Some(DataType::Vec4));
        assert_eq!((&p * 0.5).data_type(), Some(DataType::Vec4));
        assert_eq!(p.rgb().data_type(), Some(DataType::Vec3));
        assert_eq!(
            Expr::call(Builtin::Dot, vec![p.xyz(), p.xyz()]).data_type(),
            Some(DataType::Float)
        );
        assert_eq!(
            Expr::construct(DataType::Mat3, vec![m]).data_type(),
            Some(DataType::Mat3)
        );
    }

    #[test]
    fn check_reports_bad_swizzles() {
        let f = v("f", DataType::Float);
        let v3 = v("n", DataType::Vec3);
        assert!(f.rgb().check().is_err());
        assert!(v3.w().check().is_err());
        assert!(v3.swizzle("xg").check().is_err());
        assert!(v3.xy().check().is_ok());
        assert!(Expr::var("unknown", DataType::Vec4).check().is_ok());
    }

    #[test]
    fn check_reports_incompatible_operands() {
        let a = v("a", DataType::Vec3);
        let m = v("m", DataType::Mat4);
        assert!((&m * &a).check().is_err());
        assert!((&a * 2.0).check().is_ok());
    }
}
