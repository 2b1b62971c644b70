//! Configuration management for the inspection pipelines.
//!
//! This module provides configuration types, validation traits, and the
//! parallel batch policy.

pub mod errors;
pub mod inspection;
pub mod parallel;

pub use errors::{ConfigError, ConfigValidator};
pub use inspection::{
    AssociationMode, EdgeAlarmConfig, FusionConfig, InspectionConfig, MorphologyConfig,
    PreprocessConfig, SegmentationConfig, VotingStrategy,
};
pub use parallel::ParallelPolicy;
