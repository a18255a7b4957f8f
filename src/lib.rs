//! # Strata
//!
//! Composition and traversal engine for layered scene-description
//! files. A scene is described by a root layer that stacks weaker
//! sub-layers below itself and pulls in other layers through reference
//! and payload arcs; strata resolves that graph into a single composed
//! hierarchy of typed nodes and answers aggregate and point queries
//! over it.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (node paths, errors)
//! - [`layer`] - Layer data model and layer sources
//! - [`compose`] - Layer stack resolution and node composition
//! - [`stats`] - Aggregate statistics and per-node explanations
//! - [`loader`] - Background loading with supersession
//!
//! ## Example
//!
//! ```ignore
//! use strata::prelude::*;
//! use std::sync::Arc;
//!
//! let source = Arc::new(JsonLayerSource::new("scenes/"));
//! let coordinator = LoadCoordinator::new(source);
//! coordinator.load(Some("root.json"));
//!
//! while let Some(event) = coordinator.recv_blocking() {
//!     let terminal = event.is_terminal();
//!     coordinator.accept(event);
//!     if terminal {
//!         break;
//!     }
//! }
//!
//! if let Some(live) = coordinator.live() {
//!     println!("{} nodes, {} polygons", live.stats.total_nodes, live.stats.total_polygons);
//! }
//! ```

pub mod util;
pub mod layer;
pub mod compose;
pub mod stats;
pub mod loader;

// Re-export commonly used types
pub use util::{Error, NodePath, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::compose::{
        compose, resolve_stack, ComposeWarning, ComposedNode, ComposedTree, Contribution,
        ContributionKind, LayerStack,
    };
    pub use crate::layer::source::{JsonLayerSource, LayerSource, MemoryLayerSource};
    pub use crate::layer::{ArcKind, AttrValue, CompositionArc, Layer, PrimSpec};
    pub use crate::loader::{LoadCoordinator, LoadEvent, LoadHandle};
    pub use crate::stats::{compute_stats, explain_node, AggregateStats, CompositionExplanation};
    pub use crate::util::{Error, NodePath, Result};
}
