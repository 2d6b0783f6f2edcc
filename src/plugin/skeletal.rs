//! GPU Skinning
//!
//! Blends up to eight bone matrices per vertex into the `gBoneTransfMatrix`
//! global before the core transform. The core vertex shader detects this
//! fragment by [`SKELETAL_ANIMATION_VERTEX`] and multiplies the position and
//! normal by the blended matrix.

use glam::Mat4;

use crate::backend::{Location, VertexStreams};
use crate::dsl::func::cast;
use crate::dsl::{BodyBuilder, DataType, Expr, ShaderStage, ShaderValue};
use crate::errors::Result;
use crate::material::handles::{AttributeBinder, LocationResolver, UniformWriter};
use crate::shader::{Declarations, ShaderVar, ShaderVarKey, SymbolTable};

use super::{InsertLocation, MaterialPlugin, ShaderFragment, impl_plugin_any, undeclared};

pub const SKELETAL_ANIMATION_VERTEX: &str = "SKELETAL_ANIMATION_VERTEX";

const U_BONE_MATRIX: &str = "uBoneMatrix";
const A_BONE_INDEX: [&str; 2] = ["aBoneIndex1", "aBoneIndex2"];
const A_BONE_WEIGHT: [&str; 2] = ["aBoneWeight1", "aBoneWeight2"];

#[derive(Debug)]
struct SkinningVars {
    bones: ShaderVar,
    bone_transform: ShaderVar,
    indices: Vec<ShaderVar>,
    weights: Vec<ShaderVar>,
}

#[derive(Debug)]
struct SkeletalVertexFragment {
    num_joints: u32,
    /// Number of `vec4` index/weight attribute pairs: 1 or 2.
    weight_sets: usize,
    bone_matrices: Vec<Mat4>,
    vars: Option<SkinningVars>,
    bones_loc: Location,
    index_locs: [Location; 2],
    weight_locs: [Location; 2],
}

/// `w.x * bones[int(i.x)] + w.y * bones[int(i.y)] + ...` for one attribute pair.
fn weighted_sum(bones: &ShaderVar, indices: &ShaderVar, weights: &ShaderVar) -> Expr {
    let term = |c: &'static str| weights.swizzle(c) * bones.at(cast(DataType::Int, indices.swizzle(c)));
    term("x") + term("y") + term("z") + term("w")
}

impl ShaderFragment for SkeletalVertexFragment {
    fn shader_id(&self) -> &str {
        SKELETAL_ANIMATION_VERTEX
    }

    fn insert_location(&self) -> InsertLocation {
        InsertLocation::PreTransform
    }

    fn declare(&mut self, decl: &mut Declarations<'_>) -> Result<()> {
        let bone_transform = decl.key(ShaderVarKey::GBoneTransfMatrix)?;
        let bones = decl.declare(ShaderVar::uniform(U_BONE_MATRIX, DataType::Mat4).array(self.num_joints))?;
        let mut indices = Vec::with_capacity(self.weight_sets);
        let mut weights = Vec::with_capacity(self.weight_sets);
        for set in 0..self.weight_sets {
            indices.push(decl.attribute(A_BONE_INDEX[set], DataType::Vec4)?);
            weights.push(decl.attribute(A_BONE_WEIGHT[set], DataType::Vec4)?);
        }
        self.vars = Some(SkinningVars {
            bones,
            bone_transform,
            indices,
            weights,
        });
        Ok(())
    }

    fn main(&self, body: &mut BodyBuilder, _symbols: &SymbolTable) -> Result<()> {
        let Some(vars) = &self.vars else {
            return Err(undeclared(body));
        };
        for (set, (indices, weights)) in vars.indices.iter().zip(&vars.weights).enumerate() {
            let sum = weighted_sum(&vars.bones, indices, weights);
            if set == 0 {
                body.assign(&vars.bone_transform, sum);
            } else {
                body.assign_add(&vars.bone_transform, sum);
            }
        }
        Ok(())
    }

    fn set_locations(&mut self, resolver: &mut LocationResolver<'_>) {
        self.bones_loc = resolver.uniform_named(U_BONE_MATRIX);
        let Some(vars) = &self.vars else {
            return;
        };
        for set in 0..self.weight_sets {
            self.index_locs[set] = resolver.attribute(&vars.indices[set]);
            self.weight_locs[set] = resolver.attribute(&vars.weights[set]);
        }
    }

    fn apply_params(&mut self, writer: &mut UniformWriter<'_>) {
        if self.bone_matrices.is_empty() {
            return;
        }
        let count = self.bone_matrices.len().min(self.num_joints as usize);
        writer.set(self.bones_loc, &self.bone_matrices[..count]);
    }
}

/// Skeletal animation with `num_joints` bones and 4 or 8 weights per vertex.
#[derive(Debug)]
pub struct SkeletalAnimationPlugin {
    vertex: SkeletalVertexFragment,
}

impl SkeletalAnimationPlugin {
    /// `weights_per_vertex` above 4 enables the second index/weight pair.
    #[must_use]
    pub fn new(num_joints: u32, weights_per_vertex: u32) -> Self {
        Self {
            vertex: SkeletalVertexFragment {
                num_joints: num_joints.max(1),
                weight_sets: if weights_per_vertex > 4 { 2 } else { 1 },
                bone_matrices: Vec::new(),
                vars: None,
                bones_loc: Location::NOT_FOUND,
                index_locs: [Location::NOT_FOUND; 2],
                weight_locs: [Location::NOT_FOUND; 2],
            },
        }
    }

    #[must_use]
    pub fn num_joints(&self) -> u32 {
        self.vertex.num_joints
    }

    #[must_use]
    pub fn weights_per_vertex(&self) -> u32 {
        self.vertex.weight_sets as u32 * 4
    }

    /// Current pose. Matrices past `num_joints` are not uploaded.
    pub fn set_bone_matrices(&mut self, matrices: &[Mat4]) {
        self.vertex.bone_matrices.clear();
        self.vertex.bone_matrices.extend_from_slice(matrices);
    }

    #[must_use]
    pub fn bone_matrices(&self) -> &[Mat4] {
        &self.vertex.bone_matrices
    }
}

impl MaterialPlugin for SkeletalAnimationPlugin {
    fn plugin_id(&self) -> &str {
        "skeletal_animation"
    }

    fn fragment(&self, stage: ShaderStage) -> Option<&dyn ShaderFragment> {
        match stage {
            ShaderStage::Vertex => Some(&self.vertex),
            ShaderStage::Fragment => None,
        }
    }

    fn fragment_mut(&mut self, stage: ShaderStage) -> Option<&mut dyn ShaderFragment> {
        match stage {
            ShaderStage::Vertex => Some(&mut self.vertex),
            ShaderStage::Fragment => None,
        }
    }

    fn bind_attributes(&self, binder: &mut AttributeBinder<'_>, streams: &VertexStreams) {
        let v = &self.vertex;
        for set in 0..v.weight_sets {
            binder.bind(v.index_locs[set], streams.bone_indices[set]);
            binder.bind(v.weight_locs[set], streams.bone_weights[set]);
        }
    }

    impl_plugin_any!();
}
