//! Node composer: layer stacks plus arcs to a composed node tree.
//!
//! The composed tree is an arena-style node table keyed by path, with
//! ancestors created deterministically before children. Composition is
//! two-phase, and the two phases define the strength contract:
//!
//! 1. Local specs from every layer in the stack, strength order.
//! 2. Arcs, references before payloads, expanded recursively. Arc
//!    contributions are strictly weaker than every local contribution
//!    at the same path.
//!
//! Attributes merge single-pass, strongest first: once set, a value is
//! never overwritten by a weaker contribution. For fixed inputs the
//! result is byte-for-byte reproducible, including contribution order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::compose::{resolve_stack, ComposeWarning, LayerStack, LayerSummary};
use crate::layer::source::LayerSource;
use crate::layer::{ArcKind, CompositionArc, PrimSpec};
use crate::util::NodePath;

/// Type name reported for nodes with no type-declaring contribution.
pub const UNKNOWN_TYPE_NAME: &str = "Unknown";

/// Kind tag of one entry in a node's composition trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContributionKind {
    /// Direct spec from a layer in the root stack.
    Local,
    /// Spec overlaid through a reference arc.
    Reference,
    /// Spec overlaid through a payload arc.
    Payload,
}

impl From<ArcKind> for ContributionKind {
    fn from(kind: ArcKind) -> Self {
        match kind {
            ArcKind::Reference => Self::Reference,
            ArcKind::Payload => Self::Payload,
        }
    }
}

impl fmt::Display for ContributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Reference => write!(f, "reference"),
            Self::Payload => write!(f, "payload"),
        }
    }
}

/// One entry in a node's strength-ordered composition trace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contribution {
    /// Contributing layer identifier; for arcs, the arc target.
    pub layer: String,
    /// How the contribution arrived.
    pub kind: ContributionKind,
}

/// A resolved attribute value with the layer that authored it.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedAttr {
    pub value: crate::layer::AttrValue,
    /// Identifier of the layer the winning value came from.
    pub origin: String,
}

/// One addressable path in the composed hierarchy.
#[derive(Clone, Debug)]
pub struct ComposedNode {
    path: NodePath,
    type_name: Option<String>,
    contributions: SmallVec<[Contribution; 4]>,
    children: BTreeMap<String, NodePath>,
    attributes: BTreeMap<String, ResolvedAttr>,
    unresolved: bool,
}

impl ComposedNode {
    fn synthesized(path: NodePath) -> Self {
        Self {
            path,
            type_name: None,
            contributions: SmallVec::new(),
            children: BTreeMap::new(),
            attributes: BTreeMap::new(),
            unresolved: false,
        }
    }

    /// Node path.
    #[inline]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Composed type name; [`UNKNOWN_TYPE_NAME`] if no contribution
    /// declares one.
    pub fn type_name(&self) -> &str {
        self.type_name.as_deref().unwrap_or(UNKNOWN_TYPE_NAME)
    }

    /// Composition trace, strongest first.
    #[inline]
    pub fn contributions(&self) -> &[Contribution] {
        self.contributions.as_slice()
    }

    /// Immediate children keyed by final path segment, name order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &NodePath)> {
        self.children.iter().map(|(name, path)| (name.as_str(), path))
    }

    /// Number of immediate children.
    #[inline]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Resolved attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &ResolvedAttr)> {
        self.attributes.iter().map(|(name, attr)| (name.as_str(), attr))
    }

    /// Look up one resolved attribute.
    pub fn attribute(&self, name: &str) -> Option<&ResolvedAttr> {
        self.attributes.get(name)
    }

    /// Whether an arc at this node failed to expand (cycle or unreadable
    /// target) and the node stands in for the skipped subtree.
    #[inline]
    pub fn is_unresolved(&self) -> bool {
        self.unresolved
    }
}

/// The full result of one composition pass, immutable once returned.
#[derive(Clone, Debug)]
pub struct ComposedTree {
    nodes: BTreeMap<NodePath, ComposedNode>,
    layers: Vec<LayerSummary>,
    warnings: Vec<ComposeWarning>,
}

impl ComposedTree {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(NodePath::root(), ComposedNode::synthesized(NodePath::root()));
        Self {
            nodes,
            layers: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Look up the node at a path.
    pub fn get(&self, path: &NodePath) -> Option<&ComposedNode> {
        self.nodes.get(path)
    }

    /// The root node.
    pub fn root(&self) -> &ComposedNode {
        // The root entry is created in new() and never removed
        self.nodes
            .get(&NodePath::root())
            .unwrap_or_else(|| unreachable!("composed tree always has a root node"))
    }

    /// Iterate all nodes in deterministic pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = &ComposedNode> {
        self.nodes.values()
    }

    /// Total node count, root included.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if only the root node exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Names of top-level nodes, name order.
    pub fn root_names(&self) -> Vec<&str> {
        self.root().children().map(|(name, _)| name).collect()
    }

    /// Summary rows for the root layer stack this tree was composed from.
    #[inline]
    pub fn layers(&self) -> &[LayerSummary] {
        &self.layers
    }

    /// Warnings accumulated across resolution and composition.
    #[inline]
    pub fn warnings(&self) -> &[ComposeWarning] {
        &self.warnings
    }
}

/// Compose a resolved layer stack and its arcs into a [`ComposedTree`].
pub fn compose(stack: &LayerStack, source: &dyn LayerSource) -> ComposedTree {
    let _span = tracing::debug_span!("compose").entered();

    let mut tree = ComposedTree::new();
    tree.layers = stack.summaries();
    tree.warnings = stack.warnings().to_vec();

    // Phase 1: local specs, stack strength order.
    for layer in stack.layers() {
        for (path, spec) in layer.specs() {
            ensure_node(&mut tree.nodes, path);
            if let Some(node) = tree.nodes.get_mut(path) {
                node.contributions.push(Contribution {
                    layer: layer.identifier().to_string(),
                    kind: ContributionKind::Local,
                });
                merge_spec(node, spec, layer.identifier());
            }
        }
    }

    // Phase 2: arcs, references before payloads.
    let mut chain = Vec::new();
    for arc in collect_arcs(stack) {
        expand_arc(&mut tree, &arc, source, &mut chain);
    }

    debug!(nodes = tree.len(), warnings = tree.warnings.len(), "composition finished");
    tree
}

/// Gather arcs authored anywhere in a stack: all references in stack
/// strength order, then all payloads.
fn collect_arcs(stack: &LayerStack) -> Vec<CompositionArc> {
    let mut arcs = Vec::new();
    for kind in [ArcKind::Reference, ArcKind::Payload] {
        for layer in stack.layers() {
            for (path, spec) in layer.specs() {
                let targets = match kind {
                    ArcKind::Reference => &spec.references,
                    ArcKind::Payload => &spec.payloads,
                };
                for target in targets {
                    arcs.push(CompositionArc {
                        source_path: path.clone(),
                        target: target.clone(),
                        kind,
                    });
                }
            }
        }
    }
    arcs
}

/// Expand one arc: resolve the target's own layer stack, overlay its
/// specs below the arc's source path, then recurse into the arcs the
/// target authors. `chain` tracks target identifiers currently being
/// expanded; re-entering one is a cycle.
fn expand_arc(
    tree: &mut ComposedTree,
    arc: &CompositionArc,
    source: &dyn LayerSource,
    chain: &mut Vec<String>,
) {
    if chain.iter().any(|t| t == &arc.target) {
        let mut cycle = chain.clone();
        cycle.push(arc.target.clone());
        warn!(chain = %cycle.join(" -> "), "arc cycle, skipping subtree");
        tree.warnings.push(ComposeWarning::ArcCycle {
            node: arc.source_path.clone(),
            chain: cycle,
        });
        mark_unresolved(&mut tree.nodes, &arc.source_path);
        return;
    }

    let target_layer = match source.open(&arc.target) {
        Ok(layer) => layer,
        Err(e) => {
            warn!(target = arc.target.as_str(), error = %e, "arc target unreadable");
            tree.warnings.push(ComposeWarning::ArcTargetUnreadable {
                node: arc.source_path.clone(),
                target: arc.target.clone(),
                detail: e.to_string(),
            });
            mark_unresolved(&mut tree.nodes, &arc.source_path);
            return;
        }
    };

    let target_stack = resolve_stack(target_layer, source);
    tree.warnings.extend(target_stack.warnings().iter().cloned());
    chain.push(arc.target.clone());

    // Overlay target specs; the anchor node is touched even if the
    // target authors nothing at its own root.
    let mut touched = BTreeSet::new();
    ensure_node(&mut tree.nodes, &arc.source_path);
    touched.insert(arc.source_path.clone());

    for layer in target_stack.layers() {
        for (spec_path, spec) in layer.specs() {
            let mapped = arc.source_path.join(spec_path);
            ensure_node(&mut tree.nodes, &mapped);
            if let Some(node) = tree.nodes.get_mut(&mapped) {
                merge_spec(node, spec, layer.identifier());
            }
            touched.insert(mapped);
        }
    }

    // One trace entry per touched node, tagged with the arc target.
    for path in &touched {
        if let Some(node) = tree.nodes.get_mut(path) {
            node.contributions.push(Contribution {
                layer: arc.target.clone(),
                kind: arc.kind.into(),
            });
        }
    }

    // Arcs authored inside the target compose below the anchor.
    for nested in collect_arcs(&target_stack) {
        let rebased = CompositionArc {
            source_path: arc.source_path.join(&nested.source_path),
            target: nested.target,
            kind: nested.kind,
        };
        expand_arc(tree, &rebased, source, chain);
    }

    chain.pop();
}

/// Create the node at `path` and every missing ancestor, linking each
/// into its parent's child table. Ancestors synthesize as typeless
/// group nodes.
fn ensure_node(nodes: &mut BTreeMap<NodePath, ComposedNode>, path: &NodePath) {
    let mut current = NodePath::root();
    for segment in path.segments() {
        let child = current.child(segment);
        if let Some(parent) = nodes.get_mut(&current) {
            parent.children.insert(segment.clone(), child.clone());
        }
        nodes
            .entry(child.clone())
            .or_insert_with(|| ComposedNode::synthesized(child.clone()));
        current = child;
    }
}

/// Merge a spec into a node at the current strength level: the type is
/// taken only if none is set yet, and attributes never overwrite values
/// set by a stronger contribution.
fn merge_spec(node: &mut ComposedNode, spec: &PrimSpec, origin: &str) {
    if node.type_name.is_none() {
        if let Some(type_name) = &spec.type_name {
            node.type_name = Some(type_name.clone());
        }
    }
    for (name, value) in &spec.attributes {
        if !node.attributes.contains_key(name) {
            node.attributes.insert(
                name.clone(),
                ResolvedAttr {
                    value: value.clone(),
                    origin: origin.to_string(),
                },
            );
        }
    }
}

fn mark_unresolved(nodes: &mut BTreeMap<NodePath, ComposedNode>, path: &NodePath) {
    ensure_node(nodes, path);
    if let Some(node) = nodes.get_mut(path) {
        node.unresolved = true;
    }
}
