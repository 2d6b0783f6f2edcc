//! Free-function spellings of the target language's builtins and casts.

use super::expr::{Builtin, Expr};
use super::types::DataType;

macro_rules! unary_builtins {
    ($($name:ident => $builtin:ident),* $(,)?) => {$(
        pub fn $name(x: impl Into<Expr>) -> Expr {
            Expr::call(Builtin::$builtin, vec![x.into()])
        }
    )*};
}

macro_rules! binary_builtins {
    ($($name:ident => $builtin:ident),* $(,)?) => {$(
        pub fn $name(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
            Expr::call(Builtin::$builtin, vec![a.into(), b.into()])
        }
    )*};
}

unary_builtins! {
    abs => Abs,
    acos => Acos,
    atan => Atan,
    cos => Cos,
    floor => Floor,
    fract => Fract,
    inversesqrt => InverseSqrt,
    length => Length,
    normalize => Normalize,
    radians => Radians,
    sin => Sin,
    sqrt => Sqrt,
    tan => Tan,
}

binary_builtins! {
    cross => Cross,
    distance => Distance,
    dot => Dot,
    max => Max,
    min => Min,
    modulo => Mod,
    pow => Pow,
    reflect => Reflect,
    step => Step,
    texture1d => Texture1D,
    texture2d => Texture2D,
    texture2d_proj => Texture2DProj,
    texture3d => Texture3D,
    texture_cube => TextureCube,
}

pub fn clamp(x: impl Into<Expr>, lo: impl Into<Expr>, hi: impl Into<Expr>) -> Expr {
    Expr::call(Builtin::Clamp, vec![x.into(), lo.into(), hi.into()])
}

pub fn mix(a: impl Into<Expr>, b: impl Into<Expr>, t: impl Into<Expr>) -> Expr {
    Expr::call(Builtin::Mix, vec![a.into(), b.into(), t.into()])
}

/// Single-argument cast such as `int(x)` or `mat3(m)`.
pub fn cast(ty: DataType, x: impl Into<Expr>) -> Expr {
    Expr::construct(ty, vec![x.into()])
}

pub fn vec2(args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::construct(DataType::Vec2, args.into_iter().collect())
}

pub fn vec3(args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::construct(DataType::Vec3, args.into_iter().collect())
}

pub fn vec4(args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::construct(DataType::Vec4, args.into_iter().collect())
}

/// `mat4(...)` from 16 column-major components.
#[must_use]
pub fn mat4_from_cols(cols: &[f32; 16]) -> Expr {
    Expr::construct(DataType::Mat4, cols.iter().map(|&c| Expr::from(c)).collect())
}
