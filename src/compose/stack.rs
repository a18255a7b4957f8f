//! Composition resolver: sub-layer chains to strength-ordered stacks.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::compose::ComposeWarning;
use crate::layer::source::LayerSource;
use crate::layer::Layer;

/// The ordered sequence of layers reachable from a root layer via its
/// sub-layer paths, flattened depth-first, strongest (root) first.
///
/// Duplicate identifiers collapse to their first (strongest) occurrence.
#[derive(Clone, Debug, Default)]
pub struct LayerStack {
    layers: Vec<Arc<Layer>>,
    warnings: Vec<ComposeWarning>,
}

impl LayerStack {
    /// Layers in strength order, root first.
    #[inline]
    pub fn layers(&self) -> &[Arc<Layer>] {
        &self.layers
    }

    /// Warnings accumulated while resolving.
    #[inline]
    pub fn warnings(&self) -> &[ComposeWarning] {
        &self.warnings
    }

    /// Number of layers in the stack.
    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if the stack is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// One summary row per layer, for presentation.
    pub fn summaries(&self) -> Vec<LayerSummary> {
        self.layers
            .iter()
            .map(|layer| LayerSummary {
                identifier: layer.identifier().to_string(),
                resolved_path: layer.resolved_path().to_string(),
                is_anonymous: layer.is_anonymous(),
                sub_layer_paths: layer.sub_layer_paths().to_vec(),
                spec_count: layer.spec_count(),
            })
            .collect()
    }
}

/// Presentation-friendly metadata for one layer in a stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerSummary {
    pub identifier: String,
    pub resolved_path: String,
    pub is_anonymous: bool,
    pub sub_layer_paths: Vec<String>,
    pub spec_count: usize,
}

/// Resolve a root layer's sub-layer chain into a [`LayerStack`].
///
/// Depth-first, pre-order: each layer's sub-layers are inserted
/// immediately after it and before its siblings, matching declaration
/// order at every level. Cycles are detected against the current
/// resolution path only; an unopenable sub-layer or a cyclic branch is
/// recorded as a warning and resolution continues.
pub fn resolve_stack(root: Arc<Layer>, source: &dyn LayerSource) -> LayerStack {
    let mut stack = LayerStack::default();
    let mut seen = HashSet::new();
    let mut on_path = Vec::new();
    visit(root, source, &mut stack, &mut seen, &mut on_path);
    debug!(layers = stack.len(), warnings = stack.warnings.len(), "layer stack resolved");
    stack
}

fn visit(
    layer: Arc<Layer>,
    source: &dyn LayerSource,
    stack: &mut LayerStack,
    seen: &mut HashSet<String>,
    on_path: &mut Vec<String>,
) {
    let id = layer.identifier().to_string();
    seen.insert(id.clone());
    on_path.push(id.clone());

    let sub_paths = layer.sub_layer_paths().to_vec();
    stack.layers.push(layer);

    for sub_path in sub_paths {
        match source.open(&sub_path) {
            Ok(sub_layer) => {
                let sub_id = sub_layer.identifier();
                if on_path.iter().any(|p| p == sub_id) {
                    let mut chain = on_path.clone();
                    chain.push(sub_id.to_string());
                    warn!(chain = %chain.join(" -> "), "sub-layer cycle, skipping branch");
                    stack.warnings.push(ComposeWarning::SubLayerCycle { chain });
                } else if seen.contains(sub_id) {
                    // Duplicate off the current path: first occurrence wins
                    debug!(layer = sub_id, "duplicate sub-layer dropped");
                } else {
                    visit(sub_layer, source, stack, seen, on_path);
                }
            }
            Err(e) => {
                warn!(sub_layer = sub_path.as_str(), error = %e, "sub-layer unreadable");
                stack.warnings.push(ComposeWarning::SubLayerUnreadable {
                    layer: id.clone(),
                    sub_path,
                    detail: e.to_string(),
                });
            }
        }
    }

    on_path.pop();
}
