//! Integration tests composing file-backed layered scenes end to end.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use strata::layer::source::JsonLayerSource;
use strata::loader::{LoadCoordinator, LoadEvent};
use strata::stats::{AggregateStats, FACE_COUNTS_ATTR};
use strata::util::NodePath;

fn write_scene(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).expect("write scene file");
}

/// Drive a load to its terminal event and return the published result.
fn load(dir: &Path, root: &str) -> (Arc<strata::compose::ComposedTree>, AggregateStats) {
    let source = Arc::new(JsonLayerSource::new(dir));
    let coordinator = LoadCoordinator::new(source);
    coordinator.load(Some(root));

    loop {
        let event = coordinator.recv_blocking().expect("worker alive");
        let Some(event) = coordinator.accept(event) else {
            continue;
        };
        match event {
            LoadEvent::Progress { .. } => {}
            LoadEvent::Loaded { tree, stats, .. } => return (tree, stats),
            LoadEvent::Failed { error, .. } => panic!("load failed: {}", error),
        }
    }
}

#[test]
fn test_character_scene_composes() {
    let dir = tempfile::tempdir().unwrap();

    write_scene(
        dir.path(),
        "root.json",
        r#"{
            "subLayers": ["geo.json", "rig.json"],
            "prims": {
                "/char": { "references": ["asset_body.json"] }
            }
        }"#,
    );
    write_scene(
        dir.path(),
        "geo.json",
        r#"{
            "prims": {
                "/char": { "type": "Xform", "attributes": { "scale": 1.0 } }
            }
        }"#,
    );
    write_scene(
        dir.path(),
        "rig.json",
        r#"{
            "prims": {
                "/char": { "type": "Scope", "attributes": { "scale": 2.0, "rigged": true } }
            }
        }"#,
    );
    write_scene(
        dir.path(),
        "asset_body.json",
        r#"{
            "prims": {
                "/body": {
                    "type": "Mesh",
                    "attributes": { "faceVertexCounts": [3, 3, 4] }
                }
            }
        }"#,
    );

    let (tree, stats) = load(dir.path(), "root.json");

    // geo is stronger than rig: its type and scale win, rig fills gaps.
    let char_node = tree.get(&NodePath::parse("/char")).expect("/char");
    assert_eq!(char_node.type_name(), "Xform");
    let scale = char_node.attribute("scale").unwrap();
    assert_eq!(scale.origin, "geo.json");
    let rigged = char_node.attribute("rigged").unwrap();
    assert_eq!(rigged.origin, "rig.json");

    // The referenced asset composes below the arc anchor.
    let body = tree.get(&NodePath::parse("/char/body")).expect("/char/body");
    assert_eq!(body.type_name(), "Mesh");
    assert!(body.attribute(FACE_COUNTS_ATTR).is_some());

    // [3, 3, 4] is three polygons.
    assert_eq!(stats.total_mesh_nodes, 1);
    assert_eq!(stats.total_polygons, 3);
    assert_eq!(stats.reference_tally.get("asset_body.json"), Some(&1));
    assert!(tree.warnings().is_empty());
}

#[test]
fn test_broken_sublayer_still_inspectable() {
    let dir = tempfile::tempdir().unwrap();

    write_scene(
        dir.path(),
        "root.json",
        r#"{
            "subLayers": ["missing.json", "geo.json"],
            "prims": {}
        }"#,
    );
    write_scene(
        dir.path(),
        "geo.json",
        r#"{ "prims": { "/env": { "type": "Xform" } } }"#,
    );

    let (tree, stats) = load(dir.path(), "root.json");

    // One broken sub-layer degrades to a warning; the rest composes.
    assert_eq!(stats.total_nodes, 1);
    assert!(tree.get(&NodePath::parse("/env")).is_some());
    assert_eq!(tree.warnings().len(), 1);
    assert_eq!(tree.layers().len(), 2);
}

#[test]
fn test_sublayer_cycle_terminates_with_warning() {
    let dir = tempfile::tempdir().unwrap();

    write_scene(
        dir.path(),
        "a.json",
        r#"{ "subLayers": ["b.json"], "prims": { "/from_a": {} } }"#,
    );
    write_scene(
        dir.path(),
        "b.json",
        r#"{ "subLayers": ["a.json"], "prims": { "/from_b": {} } }"#,
    );

    let (tree, stats) = load(dir.path(), "a.json");

    // a -> b -> a terminates; both layers contribute once.
    assert_eq!(stats.total_nodes, 2);
    assert_eq!(tree.layers().len(), 2);
    assert_eq!(tree.warnings().len(), 1);
}

#[test]
fn test_reference_tally_across_nodes() {
    let dir = tempfile::tempdir().unwrap();

    write_scene(
        dir.path(),
        "root.json",
        r#"{
            "prims": {
                "/left":  { "references": ["char_body.json"] },
                "/right": { "references": ["char_body.json"] }
            }
        }"#,
    );
    write_scene(dir.path(), "char_body.json", r#"{ "prims": {} }"#);

    let (_tree, stats) = load(dir.path(), "root.json");
    assert_eq!(stats.reference_tally.get("char_body.json"), Some(&2));
}

#[test]
fn test_payload_weaker_than_reference_in_files() {
    let dir = tempfile::tempdir().unwrap();

    write_scene(
        dir.path(),
        "root.json",
        r#"{
            "prims": {
                "/char": {
                    "payloads": ["heavy.json"],
                    "references": ["light.json"]
                }
            }
        }"#,
    );
    write_scene(
        dir.path(),
        "light.json",
        r#"{ "prims": { "/": { "attributes": { "lod": "light" } } } }"#,
    );
    write_scene(
        dir.path(),
        "heavy.json",
        r#"{ "prims": { "/": { "attributes": { "lod": "heavy", "extra": 1 } } } }"#,
    );

    let (tree, stats) = load(dir.path(), "root.json");

    let node = tree.get(&NodePath::parse("/char")).expect("/char");
    let lod = node.attribute("lod").unwrap();
    assert_eq!(lod.origin, "light.json");
    // Payload still contributes what the reference does not set.
    assert!(node.attribute("extra").is_some());
    assert_eq!(stats.reference_tally.len(), 2);
}

#[test]
fn test_superseded_load_never_goes_live() {
    let dir = tempfile::tempdir().unwrap();
    write_scene(dir.path(), "a.json", r#"{ "prims": { "/a": {} } }"#);
    write_scene(dir.path(), "b.json", r#"{ "prims": { "/b": {} } }"#);

    let source = Arc::new(JsonLayerSource::new(dir.path()));
    let coordinator = LoadCoordinator::new(source);

    let _old = coordinator.load(Some("a.json"));
    let new = coordinator.load(Some("b.json"));

    let mut terminals = 0;
    while terminals < 2 {
        let Some(event) = coordinator.recv_blocking() else { break };
        let terminal = event.is_terminal();
        let _ = coordinator.accept(event);
        if terminal {
            terminals += 1;
        }
    }

    let live = coordinator.live().expect("live snapshot");
    assert_eq!(live.generation, new.generation());
    assert!(live.tree.get(&NodePath::parse("/b")).is_some());
    assert!(live.tree.get(&NodePath::parse("/a")).is_none());
}
