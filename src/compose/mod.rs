//! Composition engine.
//!
//! Two stages turn a root layer into an immutable composed hierarchy:
//! - [`resolve_stack`] flattens the sub-layer chain into a
//!   strength-ordered [`LayerStack`]
//! - [`compose`] merges the stack and its reference/payload arcs into a
//!   [`ComposedTree`] of nodes with strength-ordered contribution traces
//!
//! Per-branch failures (cyclic chains, unopenable layers) degrade to
//! [`ComposeWarning`]s attached to the successful portion of the result;
//! they never abort a pass.

mod stack;
mod tree;

pub use stack::{resolve_stack, LayerStack, LayerSummary};
pub use tree::{
    compose, ComposedNode, ComposedTree, Contribution, ContributionKind, ResolvedAttr,
    UNKNOWN_TYPE_NAME,
};

use std::fmt;

use crate::util::NodePath;

/// Non-fatal problem encountered while resolving or composing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComposeWarning {
    /// A named sub-layer could not be opened; resolution continued
    /// with the remaining layers.
    SubLayerUnreadable {
        /// Layer that names the sub-layer.
        layer: String,
        /// The sub-layer path as authored.
        sub_path: String,
        /// Underlying error text.
        detail: String,
    },
    /// A sub-layer chain revisited an identifier already on the current
    /// resolution path; the branch was skipped.
    SubLayerCycle {
        /// Identifier chain up to and including the revisited entry.
        chain: Vec<String>,
    },
    /// An arc chain revisited a target already being expanded; the
    /// subtree was replaced by an unresolved placeholder.
    ArcCycle {
        /// Node the arc is authored at.
        node: NodePath,
        /// Target identifier chain up to and including the revisited entry.
        chain: Vec<String>,
    },
    /// An arc target could not be opened; the subtree was replaced by an
    /// unresolved placeholder.
    ArcTargetUnreadable {
        /// Node the arc is authored at.
        node: NodePath,
        /// Target identifier as authored.
        target: String,
        /// Underlying error text.
        detail: String,
    },
}

impl fmt::Display for ComposeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubLayerUnreadable { layer, sub_path, detail } => {
                write!(f, "sub-layer '{}' of {} unreadable: {}", sub_path, layer, detail)
            }
            Self::SubLayerCycle { chain } => {
                write!(f, "sub-layer cycle: {}", chain.join(" -> "))
            }
            Self::ArcCycle { node, chain } => {
                write!(f, "arc cycle at {}: {}", node, chain.join(" -> "))
            }
            Self::ArcTargetUnreadable { node, target, detail } => {
                write!(f, "arc target '{}' at {} unreadable: {}", target, node, detail)
            }
        }
    }
}
