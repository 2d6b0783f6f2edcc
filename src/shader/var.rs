use std::borrow::Cow;
use std::fmt::Write as _;

use crate::dsl::expr::impl_expr_ops;
use crate::dsl::{DataType, Expr, Precision, ShaderValue, StorageQualifier};

/// A named, typed, qualified shader variable.
///
/// Cheap to clone; shaders and fragments keep the handles returned at
/// declaration time and build expressions from them in `main()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderVar {
    name: Cow<'static, str>,
    ty: DataType,
    qualifier: StorageQualifier,
    array_len: Option<u32>,
    precision: Option<Precision>,
    initial: Option<Expr>,
}

impl ShaderVar {
    pub fn new(name: impl Into<Cow<'static, str>>, ty: DataType, qualifier: StorageQualifier) -> Self {
        Self {
            name: name.into(),
            ty,
            qualifier,
            array_len: None,
            precision: None,
            initial: None,
        }
    }

    pub fn uniform(name: impl Into<Cow<'static, str>>, ty: DataType) -> Self {
        Self::new(name, ty, StorageQualifier::Uniform)
    }

    pub fn attribute(name: impl Into<Cow<'static, str>>, ty: DataType) -> Self {
        Self::new(name, ty, StorageQualifier::Attribute)
    }

    pub fn varying(name: impl Into<Cow<'static, str>>, ty: DataType) -> Self {
        Self::new(name, ty, StorageQualifier::Varying)
    }

    pub fn global(name: impl Into<Cow<'static, str>>, ty: DataType) -> Self {
        Self::new(name, ty, StorageQualifier::Global)
    }

    /// `const` declarations always carry their value.
    pub fn constant(name: impl Into<Cow<'static, str>>, ty: DataType, value: impl Into<Expr>) -> Self {
        Self::new(name, ty, StorageQualifier::Const).with_initial(value)
    }

    /// Turns the variable into an array of `len` elements.
    #[must_use]
    pub fn array(mut self, len: u32) -> Self {
        self.array_len = Some(len);
        self
    }

    #[must_use]
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = Some(precision);
        self
    }

    #[must_use]
    pub fn with_initial(mut self, value: impl Into<Expr>) -> Self {
        self.initial = Some(value.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.ty
    }

    #[inline]
    #[must_use]
    pub fn qualifier(&self) -> StorageQualifier {
        self.qualifier
    }

    #[inline]
    #[must_use]
    pub fn array_len(&self) -> Option<u32> {
        self.array_len
    }

    /// Same name, type, qualifier and array size.
    #[must_use]
    pub fn same_shape(&self, other: &ShaderVar) -> bool {
        self.name == other.name
            && self.ty == other.ty
            && self.qualifier == other.qualifier
            && self.array_len == other.array_len
    }

    /// Element `index` of an array variable, typed as the element type.
    pub fn at(&self, index: impl Into<Expr>) -> Expr {
        if self.array_len.is_some() {
            Expr::Index {
                base: Box::new(self.to_expr()),
                index: Box::new(index.into()),
                ty: Some(self.ty),
            }
        } else {
            self.element_at(index)
        }
    }

    /// Declaration line, e.g. `uniform mat4 uBoneMatrix[40];`.
    #[must_use]
    pub fn declaration(&self) -> String {
        let mut out = String::new();
        if let Some(keyword) = self.qualifier.keyword() {
            out.push_str(keyword);
            out.push(' ');
        }
        if let Some(precision) = self.precision {
            out.push_str(precision.keyword());
            out.push(' ');
        }
        let _ = write!(out, "{} {}", self.ty, self.name);
        if let Some(len) = self.array_len {
            let _ = write!(out, "[{len}]");
        }
        if let Some(initial) = &self.initial {
            out.push_str(" = ");
            initial.render_into(&mut out);
        }
        out.push(';');
        out
    }
}

impl ShaderValue for ShaderVar {
    fn to_expr(&self) -> Expr {
        Expr::Var {
            name: self.name.clone(),
            ty: Some(self.ty),
        }
    }
}

impl From<&ShaderVar> for Expr {
    fn from(var: &ShaderVar) -> Self {
        var.to_expr()
    }
}

impl From<ShaderVar> for Expr {
    fn from(var: ShaderVar) -> Self {
        var.to_expr()
    }
}

impl_expr_ops!(ShaderVar, &ShaderVar);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_render_qualifier_type_and_name() {
        assert_eq!(
            ShaderVar::uniform("uMVPMatrix", DataType::Mat4).declaration(),
            "uniform mat4 uMVPMatrix;"
        );
        assert_eq!(
            ShaderVar::uniform("uBoneMatrix", DataType::Mat4).array(40).declaration(),
            "uniform mat4 uBoneMatrix[40];"
        );
        assert_eq!(
            ShaderVar::global("gColor", DataType::Vec4).declaration(),
            "vec4 gColor;"
        );
        assert_eq!(
            ShaderVar::constant("cShadowBias", DataType::Float, 0.005).declaration(),
            "const float cShadowBias = 0.005;"
        );
        assert_eq!(
            ShaderVar::varying("vTextureCoord", DataType::Vec2)
                .with_precision(Precision::Highp)
                .declaration(),
            "varying highp vec2 vTextureCoord;"
        );
    }

    #[test]
    fn variables_take_part_in_expressions() {
        let mvp = ShaderVar::uniform("uMVPMatrix", DataType::Mat4);
        let pos = ShaderVar::global("gPosition", DataType::Vec4);
        let e = &mvp * &pos;
        assert_eq!(e.render(), "uMVPMatrix * gPosition");
        assert_eq!(e.data_type(), Some(DataType::Vec4));
        assert_eq!(pos.xyz().render(), "gPosition.xyz");
    }

    #[test]
    fn array_elements_keep_the_element_type() {
        let bones = ShaderVar::uniform("uBoneMatrix", DataType::Mat4).array(8);
        let e = bones.at(2);
        assert_eq!(e.render(), "uBoneMatrix[2]");
        assert_eq!(e.data_type(), Some(DataType::Mat4));
    }
}
