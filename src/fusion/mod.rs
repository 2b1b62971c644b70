//! Multi-model fusion stages.
//!
//! Per-model patch features, predictions and confidences flow through
//! [`CrossModelAligner`] → [`SpatialReconstructor`] → [`ConfidenceVoter`] →
//! [`DecisionFusionEngine`]. None of the stages mutate their inputs.

pub mod aligner;
pub mod association;
pub mod decision;
pub mod spatial;
pub mod voter;

pub use aligner::{CrossModelAligner, FeatureProjection};
pub use association::{
    feature_similarity_association, grid_proximity_association, identity_association,
};
pub use decision::{DecisionFusionEngine, DecisionOutput};
pub use spatial::{SpatialFeatureMap, SpatialReconstructor};
pub use voter::{ConfidenceVoter, VoteOutcome};
