//! CDN origin resolution
//!
//! - `resolver`: ordered candidate URLs per asset/quality, with session-scoped demotion
//! - `failover`: per-origin failure tracking that drives demotion

pub mod failover;
pub mod resolver;

pub use failover::{OriginState, OriginStats};
pub use resolver::CdnResolver;
