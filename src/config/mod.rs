//! Unified configuration loading for pada-match.
//!
//! Loads all tunables from a single YAML file with defaults for anything
//! left out.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pada_match::config::PadaConfig;
//!
//! // Load from default path (configs/pada.yaml), or built-in defaults
//! let config = PadaConfig::load_default()?;
//!
//! let pipeline = TopologyPipeline::from_config(&config);
//! ```
//!
//! ## Configuration Sections
//!
//! | Section | Type |
//! |---------|------|
//! | `graph` | [`GraphBuilderConfig`](crate::graph::GraphBuilderConfig) |
//! | `matcher` | [`CoarseMatcherConfig`](crate::matching::CoarseMatcherConfig) |
//! | `signature` | [`SignatureConfig`](crate::signature::SignatureConfig) |
//! | `merger` | [`MergerConfig`](crate::merge::MergerConfig) |
//! | `point_merger` | [`PointMergerConfig`](crate::merge::PointMergerConfig) |
//! | `refiner` | [`RefinerConfig`](crate::refine::RefinerConfig) |
//! | `validator` | [`ValidatorConfig`](crate::validation::ValidatorConfig) |
//! | `pipeline` | [`PipelineConfig`](crate::pipeline::PipelineConfig) |
//!
//! ## Example YAML
//!
//! ```yaml
//! graph:
//!   max_neighbors: 5
//!   distance_threshold: 150.0   # pixels
//!
//! merger:
//!   correspondence_threshold: 0.6
//!   min_matches_for_merge: 5
//!
//! pipeline:
//!   enable_refinement: true
//!   enable_validation: true
//! ```

mod error;
mod pada;

pub use error::ConfigError;
pub use pada::{DEFAULT_CONFIG_PATH, PadaConfig};
