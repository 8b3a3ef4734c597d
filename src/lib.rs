//! Houston is a workflow orchestration service. Client workers execute the
//! actual work of each stage out of process; Houston arbitrates whether a
//! stage may transition, which stages become eligible next, and when a
//! mission is complete. Mutations of a mission are serialised through a
//! store transaction, so concurrent clients cannot corrupt its state.
//!
//! Mission JSON uses short field names for wire compatibility: `i` id, `n`
//! name, `s` stages, `t` start, `e` end, `p` params, `a` services; each stage
//! carries `n` name, `a` service, `u` upstream, `d` downstream, `p` params,
//! `s` state, `t` start, `e` end.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod mission;
pub mod model;
pub mod store;
pub mod web;

pub use config::HoustonConfig;
pub use error::{HoustonError, Result};
