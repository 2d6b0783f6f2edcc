use crate::dsl::{DataType, StorageQualifier};

use super::var::ShaderVar;

/// Well-known variable roles shared between core shaders and fragments.
///
/// Fragments refer to shared state through these keys instead of hard-coded
/// names; the [`SymbolTable`](super::SymbolTable) handed to `main()` only
/// resolves the keys some shader in the stage actually declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderVarKey {
    // uniforms
    MvpMatrix,
    NormalMatrix,
    ModelMatrix,
    InverseViewMatrix,
    ModelViewMatrix,
    Color,
    ColorInfluence,
    Influence,
    Transform,
    Time,
    // attributes
    Position,
    TextureCoord,
    Normal,
    VertexColor,
    // varyings
    VTextureCoord,
    VCubeTextureCoord,
    VNormal,
    VColor,
    VEyeDir,
    // globals
    GPosition,
    GNormal,
    GColor,
    GTextureCoord,
    GShadowValue,
    GSpecularValue,
    GBoneTransfMatrix,
}

impl ShaderVarKey {
    pub const ALL: [ShaderVarKey; 26] = [
        Self::MvpMatrix,
        Self::NormalMatrix,
        Self::ModelMatrix,
        Self::InverseViewMatrix,
        Self::ModelViewMatrix,
        Self::Color,
        Self::ColorInfluence,
        Self::Influence,
        Self::Transform,
        Self::Time,
        Self::Position,
        Self::TextureCoord,
        Self::Normal,
        Self::VertexColor,
        Self::VTextureCoord,
        Self::VCubeTextureCoord,
        Self::VNormal,
        Self::VColor,
        Self::VEyeDir,
        Self::GPosition,
        Self::GNormal,
        Self::GColor,
        Self::GTextureCoord,
        Self::GShadowValue,
        Self::GSpecularValue,
        Self::GBoneTransfMatrix,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MvpMatrix => "uMVPMatrix",
            Self::NormalMatrix => "uNormalMatrix",
            Self::ModelMatrix => "uModelMatrix",
            Self::InverseViewMatrix => "uInverseViewMatrix",
            Self::ModelViewMatrix => "uModelViewMatrix",
            Self::Color => "uColor",
            Self::ColorInfluence => "uColorInfluence",
            Self::Influence => "uInfluence",
            Self::Transform => "uTransform",
            Self::Time => "uTime",
            Self::Position => "aPosition",
            Self::TextureCoord => "aTextureCoord",
            Self::Normal => "aNormal",
            Self::VertexColor => "aVertexColor",
            Self::VTextureCoord => "vTextureCoord",
            Self::VCubeTextureCoord => "vCubeTextureCoord",
            Self::VNormal => "vNormal",
            Self::VColor => "vColor",
            Self::VEyeDir => "vEyeDir",
            Self::GPosition => "gPosition",
            Self::GNormal => "gNormal",
            Self::GColor => "gColor",
            Self::GTextureCoord => "gTextureCoord",
            Self::GShadowValue => "gShadowValue",
            Self::GSpecularValue => "gSpecularValue",
            Self::GBoneTransfMatrix => "gBoneTransfMatrix",
        }
    }

    #[must_use]
    pub fn data_type(self) -> DataType {
        match self {
            Self::MvpMatrix
            | Self::ModelMatrix
            | Self::InverseViewMatrix
            | Self::ModelViewMatrix
            | Self::GBoneTransfMatrix => DataType::Mat4,
            Self::NormalMatrix | Self::Transform => DataType::Mat3,
            Self::Color
            | Self::Position
            | Self::VertexColor
            | Self::VColor
            | Self::GPosition
            | Self::GColor => DataType::Vec4,
            Self::ColorInfluence
            | Self::Influence
            | Self::Time
            | Self::GShadowValue
            | Self::GSpecularValue => DataType::Float,
            Self::TextureCoord | Self::VTextureCoord | Self::GTextureCoord => DataType::Vec2,
            Self::Normal
            | Self::VCubeTextureCoord
            | Self::VNormal
            | Self::VEyeDir
            | Self::GNormal => DataType::Vec3,
        }
    }

    #[must_use]
    pub fn qualifier(self) -> StorageQualifier {
        match self {
            Self::MvpMatrix
            | Self::NormalMatrix
            | Self::ModelMatrix
            | Self::InverseViewMatrix
            | Self::ModelViewMatrix
            | Self::Color
            | Self::ColorInfluence
            | Self::Influence
            | Self::Transform
            | Self::Time => StorageQualifier::Uniform,
            Self::Position | Self::TextureCoord | Self::Normal | Self::VertexColor => {
                StorageQualifier::Attribute
            }
            Self::VTextureCoord
            | Self::VCubeTextureCoord
            | Self::VNormal
            | Self::VColor
            | Self::VEyeDir => StorageQualifier::Varying,
            Self::GPosition
            | Self::GNormal
            | Self::GColor
            | Self::GTextureCoord
            | Self::GShadowValue
            | Self::GSpecularValue
            | Self::GBoneTransfMatrix => StorageQualifier::Global,
        }
    }

    /// The canonical declaration for this role.
    #[must_use]
    pub fn var(self) -> ShaderVar {
        ShaderVar::new(self.name(), self.data_type(), self.qualifier())
    }
}
