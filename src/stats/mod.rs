//! Traversal and aggregation over composed trees.
//!
//! Two contracts, both linear in tree size and both read-only:
//! - [`compute_stats`] - whole-tree aggregate statistics
//! - [`explain_node`] - the full composition trace for one node
//!
//! Neither re-enters the resolver or the composer, and neither raises:
//! unreadable data degrades to zero/absent so one malformed node cannot
//! blank the stats view.

use std::collections::BTreeMap;

use tracing::debug;

use crate::compose::{ComposedTree, ContributionKind};
use crate::layer::AttrValue;
use crate::util::NodePath;

/// Type name of polygon-mesh nodes.
pub const MESH_TYPE_NAME: &str = "Mesh";

/// Attribute carrying per-face vertex counts on mesh nodes.
pub const FACE_COUNTS_ATTR: &str = "faceVertexCounts";

/// Whole-tree aggregate statistics, derived per pass and never stored
/// on nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregateStats {
    /// All composed nodes, the synthesized root excluded.
    pub total_nodes: u64,
    /// Nodes recognized as polygon meshes.
    pub total_mesh_nodes: u64,
    /// Sum of per-mesh polygon (face) counts.
    pub total_polygons: u64,
    /// Occurrences of each arc target across the whole tree, covering
    /// both references and payloads.
    pub reference_tally: BTreeMap<String, u64>,
}

/// Compute aggregate statistics in a single pre-order traversal.
///
/// A node counts as a mesh when its type is [`MESH_TYPE_NAME`] and it
/// carries a [`FACE_COUNTS_ATTR`] int array; the polygon count is the
/// number of faces, i.e. the array length. A missing or unreadable
/// attribute contributes zero. The reference tally increments once per
/// arc contribution per node, so an asset referenced at five nodes
/// tallies five.
pub fn compute_stats(tree: &ComposedTree) -> AggregateStats {
    let mut stats = AggregateStats::default();

    for node in tree.nodes() {
        if node.path().is_root() {
            continue;
        }
        stats.total_nodes += 1;

        if node.type_name() == MESH_TYPE_NAME {
            match node.attribute(FACE_COUNTS_ATTR).map(|a| &a.value) {
                Some(AttrValue::IntArray(counts)) => {
                    stats.total_mesh_nodes += 1;
                    stats.total_polygons += counts.len() as u64;
                }
                Some(_) => {
                    // Wrong value shape reads as absent, not as an error
                    debug!(node = %node.path(), "mesh node with unreadable face counts");
                }
                None => {}
            }
        }

        for contribution in node.contributions() {
            match contribution.kind {
                ContributionKind::Reference | ContributionKind::Payload => {
                    *stats
                        .reference_tally
                        .entry(contribution.layer.clone())
                        .or_insert(0) += 1;
                }
                ContributionKind::Local => {}
            }
        }
    }

    stats
}

/// A resolved attribute row in a node explanation.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeRow {
    pub name: String,
    pub value: AttrValue,
    /// Identifier of the layer the value came from.
    pub origin: String,
}

/// Full composition trace for one node.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositionExplanation {
    pub path: NodePath,
    pub type_name: String,
    /// One line per contribution, strongest first, tagged with its kind.
    pub trace: Vec<String>,
    /// Resolved attributes with their origin layer, name order.
    pub attributes: Vec<AttributeRow>,
    /// Set when an arc at this node failed to expand.
    pub unresolved: bool,
}

/// Explain the node at `path`.
///
/// Returns None when the path does not exist in this tree - callers
/// render that as an empty detail view, never as a failure.
pub fn explain_node(tree: &ComposedTree, path: &NodePath) -> Option<CompositionExplanation> {
    let node = tree.get(path)?;

    let trace = node
        .contributions()
        .iter()
        .map(|c| format!("{:<9} {}", c.kind.to_string(), c.layer))
        .collect();

    let attributes = node
        .attributes()
        .map(|(name, attr)| AttributeRow {
            name: name.to_string(),
            value: attr.value.clone(),
            origin: attr.origin.clone(),
        })
        .collect();

    Some(CompositionExplanation {
        path: node.path().clone(),
        type_name: node.type_name().to_string(),
        trace,
        attributes,
        unresolved: node.is_unresolved(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{compose, resolve_stack};
    use crate::layer::source::MemoryLayerSource;
    use crate::layer::Layer;
    use std::sync::Arc;

    fn compose_root(root: Layer, source: &MemoryLayerSource) -> ComposedTree {
        let stack = resolve_stack(Arc::new(root), source);
        compose(&stack, source)
    }

    #[test]
    fn test_polygons_count_faces_not_vertices() {
        let source = MemoryLayerSource::new();
        let mut root = Layer::new("root.json", "");
        let spec = root.spec_mut(NodePath::parse("/mesh"));
        spec.type_name = Some("Mesh".into());
        spec.set_attr(FACE_COUNTS_ATTR, AttrValue::IntArray(vec![3, 3, 4]));

        let stats = compute_stats(&compose_root(root, &source));

        assert_eq!(stats.total_nodes, 1);
        assert_eq!(stats.total_mesh_nodes, 1);
        // Three faces, not the vertex sum 10.
        assert_eq!(stats.total_polygons, 3);
    }

    #[test]
    fn test_unreadable_face_counts_degrade_to_non_mesh() {
        let source = MemoryLayerSource::new();
        let mut root = Layer::new("root.json", "");

        let spec = root.spec_mut(NodePath::parse("/bad"));
        spec.type_name = Some("Mesh".into());
        spec.set_attr(FACE_COUNTS_ATTR, AttrValue::Str("oops".into()));

        let spec = root.spec_mut(NodePath::parse("/bare"));
        spec.type_name = Some("Mesh".into());

        let stats = compute_stats(&compose_root(root, &source));

        assert_eq!(stats.total_nodes, 2);
        assert_eq!(stats.total_mesh_nodes, 0);
        assert_eq!(stats.total_polygons, 0);
    }

    #[test]
    fn test_reference_tally_counts_per_node() {
        let source = MemoryLayerSource::new();
        source.register(Layer::new("char_body.json", ""));

        let mut root = Layer::new("root.json", "");
        root.spec_mut(NodePath::parse("/a"))
            .references
            .push("char_body.json".into());
        root.spec_mut(NodePath::parse("/b"))
            .references
            .push("char_body.json".into());
        root.spec_mut(NodePath::parse("/c"))
            .payloads
            .push("char_body.json".into());

        let stats = compute_stats(&compose_root(root, &source));

        // Two references plus one payload, tallied per node.
        assert_eq!(stats.reference_tally.get("char_body.json"), Some(&3));
    }

    #[test]
    fn test_root_not_counted() {
        let source = MemoryLayerSource::new();
        let root = Layer::new("root.json", "");
        let stats = compute_stats(&compose_root(root, &source));
        assert_eq!(stats.total_nodes, 0);
    }

    #[test]
    fn test_explain_missing_path_is_none() {
        let source = MemoryLayerSource::new();
        let tree = compose_root(Layer::new("root.json", ""), &source);
        assert!(explain_node(&tree, &NodePath::parse("/nope")).is_none());
    }

    #[test]
    fn test_explain_orders_trace_strongest_first() {
        let source = MemoryLayerSource::new();

        let mut asset = Layer::new("asset.json", "");
        asset
            .spec_mut(NodePath::root())
            .set_attr("mass", AttrValue::Float(2.0));
        source.register(asset);

        let mut geo = Layer::new("geo.json", "");
        geo.spec_mut(NodePath::parse("/char")).type_name = Some("Xform".into());
        source.register(geo);

        let mut root = Layer::new("root.json", "");
        root.add_sub_layer("geo.json");
        root.spec_mut(NodePath::parse("/char"))
            .references
            .push("asset.json".into());

        let tree = compose_root(root, &source);
        let explanation = explain_node(&tree, &NodePath::parse("/char")).unwrap();

        assert_eq!(explanation.type_name, "Xform");
        assert_eq!(
            explanation.trace,
            vec![
                "local     root.json",
                "local     geo.json",
                "reference asset.json",
            ]
        );
        assert_eq!(explanation.attributes.len(), 1);
        assert_eq!(explanation.attributes[0].origin, "asset.json");
        assert!(!explanation.unresolved);
    }
}
