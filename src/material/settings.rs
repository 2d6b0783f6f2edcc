use crate::dsl::Precision;
use crate::shader::ShaderFeatures;

/// Build configuration of a [`Material`](super::Material).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialSettings {
    pub features: ShaderFeatures,
    /// Default float precision of both stages.
    pub precision: Precision,
    /// Report assignments between mismatched types at compose time.
    pub strict_types: bool,
    /// Log both composed sources at `debug` level.
    pub debug_print_sources: bool,
    /// Overrides the texture unit limit reported by the backend.
    pub max_texture_units: Option<u32>,
}

impl Default for MaterialSettings {
    fn default() -> Self {
        Self {
            features: ShaderFeatures::empty(),
            precision: Precision::Mediump,
            strict_types: false,
            debug_print_sources: cfg!(debug_assertions),
            max_texture_units: None,
        }
    }
}

impl MaterialSettings {
    pub fn with_features(mut self, features: ShaderFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_strict_types(mut self, strict: bool) -> Self {
        self.strict_types = strict;
        self
    }

    pub fn with_debug_print_sources(mut self, enabled: bool) -> Self {
        self.debug_print_sources = enabled;
        self
    }

    pub fn with_max_texture_units(mut self, units: u32) -> Self {
        self.max_texture_units = Some(units);
        self
    }

    /// Whether going from `self` to `other` changes the generated source.
    #[must_use]
    pub fn requires_rebuild(&self, other: &Self) -> bool {
        self.features != other.features
            || self.precision != other.precision
            || self.strict_types != other.strict_types
            || self.max_texture_units != other.max_texture_units
    }
}
