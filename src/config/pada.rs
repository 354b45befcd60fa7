//! Main PadaConfig and conversion methods.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::error::Result;
use crate::graph::GraphBuilderConfig;
use crate::matching::CoarseMatcherConfig;
use crate::merge::{MergerConfig, PointMergerConfig};
use crate::pipeline::PipelineConfig;
use crate::refine::RefinerConfig;
use crate::signature::SignatureConfig;
use crate::validation::ValidatorConfig;

/// Default config path, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "configs/pada.yaml";

/// Full pada-match configuration loaded from YAML
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PadaConfig {
    /// Proximity graph construction
    #[serde(default)]
    pub graph: GraphBuilderConfig,

    /// Coarse similarity cascade
    #[serde(default)]
    pub matcher: CoarseMatcherConfig,

    /// Star-vector signatures
    #[serde(default)]
    pub signature: SignatureConfig,

    /// Structural merge
    #[serde(default)]
    pub merger: MergerConfig,

    /// Point-based fallback merge
    #[serde(default)]
    pub point_merger: PointMergerConfig,

    /// Spring relaxation
    #[serde(default)]
    pub refiner: RefinerConfig,

    /// Topology validation
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Stage toggles
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl PadaConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load from default config path (configs/pada.yaml), or defaults
    /// when the file does not exist
    pub fn load_default() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse from YAML string and validate
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check every tunable against its allowed range.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let g = &self.graph;
        at_least("graph.max_neighbors", g.max_neighbors, 1)?;
        positive("graph.distance_threshold", g.distance_threshold)?;

        let m = &self.matcher;
        unit("matcher.min_node_ratio", m.min_node_ratio)?;
        unit("matcher.min_edge_ratio", m.min_edge_ratio)?;
        positive("matcher.degree_tolerance", m.degree_tolerance)?;
        positive("matcher.clustering_tolerance", m.clustering_tolerance)?;
        positive("matcher.density_tolerance", m.density_tolerance)?;
        unit("matcher.detailed_threshold", m.detailed_threshold)?;
        unit("matcher.same_threshold", m.same_threshold)?;
        unit("matcher.similar_threshold", m.similar_threshold)?;
        ordered(
            "matcher.similar_threshold",
            m.similar_threshold,
            "matcher.same_threshold",
            m.same_threshold,
        )?;

        let s = &self.signature;
        at_least("signature.max_vectors", s.max_vectors, 1)?;
        positive("signature.histogram_sharpness", s.histogram_sharpness)?;
        positive(
            "signature.correspondence_sharpness",
            s.correspondence_sharpness,
        )?;

        let mg = &self.merger;
        unit("merger.correspondence_threshold", mg.correspondence_threshold)?;
        at_least("merger.min_matches_for_merge", mg.min_matches_for_merge, 1)?;
        unit(
            "merger.structural_similarity_threshold",
            mg.structural_similarity_threshold,
        )?;
        positive("merger.confidence_boost", mg.confidence_boost)?;
        at_least("merger.fused_neighbors", mg.fused_neighbors, 1)?;
        at_least("merger.transform_top_k", mg.transform_top_k, 1)?;
        positive("merger.fallback_merge_distance", mg.fallback_merge_distance)?;

        let p = &self.point_merger;
        positive("point_merger.merge_distance", p.merge_distance)?;
        unit("point_merger.min_similarity", p.min_similarity)?;
        positive("point_merger.confidence_boost", p.confidence_boost)?;

        let r = &self.refiner;
        at_least("refiner.max_iterations", r.max_iterations, 1)?;
        positive("refiner.spring_constant", r.spring_constant)?;
        non_negative("refiner.repulsion_constant", r.repulsion_constant)?;
        non_negative("refiner.angle_strength", r.angle_strength)?;
        unit("refiner.initial_damping", r.initial_damping)?;
        unit("refiner.min_damping", r.min_damping)?;
        ordered(
            "refiner.min_damping",
            r.min_damping,
            "refiner.initial_damping",
            r.initial_damping,
        )?;
        positive("refiner.max_step_factor", r.max_step_factor)?;
        at_least("refiner.convergence_window", r.convergence_window, 2)?;
        positive("refiner.convergence_variance", r.convergence_variance)?;
        positive("refiner.length_tolerance", r.length_tolerance)?;

        let v = &self.validator;
        positive("validator.distance_tolerance", v.distance_tolerance)?;
        positive("validator.ratio_variance_tolerance", v.ratio_variance_tolerance)?;
        positive("validator.angle_tolerance", v.angle_tolerance)?;
        unit("validator.angle_within_fraction", v.angle_within_fraction)?;
        unit("validator.connectivity_threshold", v.connectivity_threshold)?;
        if v.broken_ratio <= 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "validator.broken_ratio",
                reason: format!("must exceed 1.0, got {}", v.broken_ratio),
            });
        }
        positive("validator.broken_distance", v.broken_distance)?;
        positive("validator.scale_variance_tolerance", v.scale_variance_tolerance)?;
        unit(
            "validator.scale_discrepancy_tolerance",
            v.scale_discrepancy_tolerance,
        )?;
        unit("validator.anisotropy_threshold", v.anisotropy_threshold)?;
        non_negative("validator.min_axis_component", v.min_axis_component)?;
        unit(
            "validator.local_structure_threshold",
            v.local_structure_threshold,
        )?;
        unit("validator.local_node_fraction", v.local_node_fraction)?;
        unit("validator.pass_score", v.pass_score)?;
        unit("validator.critical_weight", v.critical_weight)?;

        at_least(
            "pipeline.min_nodes_for_validation",
            self.pipeline.min_nodes_for_validation,
            1,
        )?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────

fn unit(field: &'static str, value: f32) -> std::result::Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value as f64,
            min: 0.0,
            max: 1.0,
        })
    }
}

fn positive(field: &'static str, value: f32) -> std::result::Result<(), ConfigError> {
    // NaN fails here too
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be positive, got {}", value),
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> std::result::Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be a finite non-negative number, got {}", value),
        })
    }
}

fn at_least(field: &'static str, value: usize, min: usize) -> std::result::Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be at least {}, got {}", min, value),
        })
    }
}

fn ordered(
    lower: &'static str,
    lower_value: f32,
    upper: &'static str,
    upper_value: f32,
) -> std::result::Result<(), ConfigError> {
    if lower_value <= upper_value {
        Ok(())
    } else {
        Err(ConfigError::Ordering { lower, upper })
    }
}
