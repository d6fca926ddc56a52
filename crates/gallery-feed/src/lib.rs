//! Incremental image feed: upstream adapters, merger, the epoch-guarded feed
//! controller, the viewer state machine and the single-owner core loop that
//! binds them to a rendering layer.

pub mod controller;
pub mod core;
pub mod error;
pub mod logging;
pub mod merge;
pub mod upstream;
pub mod viewer;
