//! The core module of the inspection pipelines.
//!
//! This module contains the fundamental components shared by every stage:
//! - Configuration management and validation
//! - Constants used throughout the pipelines
//! - Error handling
//! - Tensor type aliases
//! - Input validation helpers

pub mod config;
pub mod constants;
pub mod errors;
pub mod validation;

pub use config::{ConfigError, ConfigValidator, InspectionConfig};
pub use constants::*;
pub use errors::{InspectError, InspectResult, ProcessingStage};

/// Dense 1D tensor of f32 values.
pub type Tensor1D = ndarray::Array1<f32>;

/// Dense 2D tensor of f32 values.
pub type Tensor2D = ndarray::Array2<f32>;

/// Dense 3D tensor of f32 values.
pub type Tensor3D = ndarray::Array3<f32>;

/// Dense 4D tensor of f32 values.
pub type Tensor4D = ndarray::Array4<f32>;

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
