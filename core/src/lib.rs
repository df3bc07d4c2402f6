//! momo-core: mobile-money notification parsing, fraud scoring and payment
//! verification.
//!
//! The pure components (normalize, classifier, risk, matcher, verification)
//! take their inputs as arguments and never touch the store. `engine` and
//! `store` form the service layer that persists what they produce.

pub mod check;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod matcher;
pub mod normalize;
pub mod notification;
pub mod record;
pub mod risk;
pub mod sample;
pub mod store;
pub mod template;
pub mod types;
pub mod verification;

pub use classifier::{parse, parse_batch};
pub use matcher::match_reference;
pub use risk::assess_risk;
pub use verification::verify;
