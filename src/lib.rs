//! # gmes
//!
//! Growing Multi-Expert Structure: an online competitive-learning engine
//! that incrementally partitions an input space among a bounded arena of
//! adaptive expert predictors.
//!
//! Each control cycle the structure selects the best-matching expert,
//! grows a new one when the winner's conserved learning capacity runs
//! out, adapts the winner, redistributes capacity in proportion to the
//! observed learning progress, and maintains a decaying transition
//! topology between experts. The per-expert activation vector is usable
//! directly as a state representation by downstream learners.
//!
//! ## Quick Start
//!
//! ```
//! use gmes::prelude::*;
//!
//! // Four slots, one seed expert, seeded for reproducibility.
//! let cfg = GmesConfig::with_size(4, 1).with_seed(42);
//! let predictors: Vec<ScalarPredictor> = (0..4).map(|_| ScalarPredictor::new(0.1)).collect();
//! let mut gmes = Gmes::new(cfg, predictors, ()).unwrap();
//!
//! // One cycle per discrete control step of the enclosing application.
//! gmes.execute_cycle(&[0.3]);
//!
//! assert_eq!(gmes.number_of_experts(), 1);
//! assert!(gmes.exists(gmes.winner()));
//! let state: &[f64] = gmes.activations();
//! # assert_eq!(state.len(), 4);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): serialization support for config, diagnostics and
//!   snapshots
//!
//! ## Modules
//!
//! - [`engine`]: the orchestrator and its configuration
//! - [`expert`]: expert slots and the fixed-capacity arena
//! - [`predictor`]: the predictor/payload contracts and a reference
//!   predictor
//! - [`observer`]: read-only observation adapters
//! - [`storage`]: binary checkpoint helpers

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/predictor.rs"]
pub mod predictor;

#[path = "core/expert.rs"]
pub mod expert;

#[path = "core/engine.rs"]
pub mod engine;

#[path = "core/storage.rs"]
pub mod storage;

pub mod observer;

/// Prelude module for convenient imports.
///
/// ```
/// use gmes::prelude::*;
/// ```
pub mod prelude {
    pub use crate::engine::{Diagnostics, Gmes, GmesConfig};
    pub use crate::expert::{Activation, Capacity, Expert, ExpertVec, TransitionWeight};
    pub use crate::observer::{GmesAdapter, GmesSnapshot};
    pub use crate::predictor::{
        Payload, PersistPayload, PersistPredictor, PredictionError, Predictor, ScalarPredictor,
    };
    pub use crate::prng::Prng;
}
