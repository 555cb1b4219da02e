//! Node traits shared by the voices, buses and drum hits.
//!
//! The engine's signal graph is static: every node is created once and only
//! its parameters move. These traits are the seams between the engine and
//! the pieces it renders or modulates.

/// Core traits shared by all graph nodes.
pub mod node;

pub use node::{GraphNode, Modulatable, RenderCtx, StereoNode};
