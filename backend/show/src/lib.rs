//! # Show
//!
//! Shared records and prediction logic for the couples prediction platform.
//!
//! Everything in here is storage agnostic. The server plugs a Redis backed
//! [`store::Store`] in, tests use [`store::MemoryStore`].
//!
//! ## Pools
//!
//! Participants are split into two disjoint pools. Pool A is the male side of the cast,
//! pool B the female side. A pairing always names one member of each, pool A first.

pub mod builder;
pub mod error;
pub mod gateway;
pub mod records;
pub mod roster;
pub mod scoring;
pub mod session;
pub mod store;
pub mod time;

pub use builder::{Activation, CandidateState, PredictionBuilder};
pub use error::{BuilderError, StoreError};
pub use gateway::PredictionGateway;
pub use records::*;
pub use roster::{Roster, RosterProvider};
pub use session::Session;
pub use store::{MemoryStore, Store};
