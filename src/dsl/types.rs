use std::fmt;

/// One programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GLSL value types understood by the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    Bool,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
    SamplerExternalOes,
}

impl DataType {
    /// Keyword used in declarations and constructors.
    #[must_use]
    pub fn glsl_name(self) -> &'static str {
        match self {
            DataType::Float => "float",
            DataType::Vec2 => "vec2",
            DataType::Vec3 => "vec3",
            DataType::Vec4 => "vec4",
            DataType::Int => "int",
            DataType::Bool => "bool",
            DataType::Mat3 => "mat3",
            DataType::Mat4 => "mat4",
            DataType::Sampler2D => "sampler2D",
            DataType::SamplerCube => "samplerCube",
            DataType::SamplerExternalOes => "samplerExternalOES",
        }
    }

    /// Number of components for vector types, 1 for scalars.
    #[must_use]
    pub fn components(self) -> Option<usize> {
        match self {
            DataType::Float | DataType::Int | DataType::Bool => Some(1),
            DataType::Vec2 => Some(2),
            DataType::Vec3 => Some(3),
            DataType::Vec4 => Some(4),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_vector(self) -> bool {
        matches!(self, DataType::Vec2 | DataType::Vec3 | DataType::Vec4)
    }

    #[inline]
    #[must_use]
    pub fn is_scalar(self) -> bool {
        matches!(self, DataType::Float | DataType::Int | DataType::Bool)
    }

    #[inline]
    #[must_use]
    pub fn is_matrix(self) -> bool {
        matches!(self, DataType::Mat3 | DataType::Mat4)
    }

    #[inline]
    #[must_use]
    pub fn is_sampler(self) -> bool {
        matches!(
            self,
            DataType::Sampler2D | DataType::SamplerCube | DataType::SamplerExternalOes
        )
    }

    /// Float vector type with `len` components (`float` for 1).
    #[must_use]
    pub fn float_vector(len: usize) -> Option<DataType> {
        match len {
            1 => Some(DataType::Float),
            2 => Some(DataType::Vec2),
            3 => Some(DataType::Vec3),
            4 => Some(DataType::Vec4),
            _ => None,
        }
    }

    /// Column type of a matrix, component type of a vector.
    #[must_use]
    pub fn element(self) -> Option<DataType> {
        match self {
            DataType::Mat3 => Some(DataType::Vec3),
            DataType::Mat4 => Some(DataType::Vec4),
            DataType::Vec2 | DataType::Vec3 | DataType::Vec4 => Some(DataType::Float),
            _ => None,
        }
    }

    /// Short tag used for generated temporaries, e.g. `v_vec3_0`.
    #[must_use]
    pub fn temp_prefix(self) -> &'static str {
        match self {
            DataType::SamplerExternalOes => "samplerExt",
            other => other.glsl_name(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// Where a variable lives.
///
/// `Global` variables are plain declarations at file scope shared by the core
/// shader and every fragment composed into it. `Local` variables only exist
/// inside `main()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageQualifier {
    Uniform,
    Attribute,
    Varying,
    Const,
    Global,
    Local,
}

impl StorageQualifier {
    /// Declaration keyword, `None` for globals and locals.
    #[must_use]
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            StorageQualifier::Uniform => Some("uniform"),
            StorageQualifier::Attribute => Some("attribute"),
            StorageQualifier::Varying => Some("varying"),
            StorageQualifier::Const => Some("const"),
            StorageQualifier::Global | StorageQualifier::Local => None,
        }
    }
}

impl fmt::Display for StorageQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageQualifier::Uniform => "uniform",
            StorageQualifier::Attribute => "attribute",
            StorageQualifier::Varying => "varying",
            StorageQualifier::Const => "const",
            StorageQualifier::Global => "global",
            StorageQualifier::Local => "local",
        })
    }
}

/// Precision qualifiers for GLSL ES.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Precision {
    Lowp,
    #[default]
    Mediump,
    Highp,
}

impl Precision {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Precision::Lowp => "lowp",
            Precision::Mediump => "mediump",
            Precision::Highp => "highp",
        }
    }
}
