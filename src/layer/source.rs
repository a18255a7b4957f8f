//! Layer sources.
//!
//! A [`LayerSource`] turns identifiers into [`Layer`] values. The
//! composition engine only ever reads through this interface; it never
//! writes. Two implementations are provided:
//! - [`MemoryLayerSource`] - layers registered up front, used by tests
//!   and anonymous stages
//! - [`JsonLayerSource`] - layers parsed from JSON documents under a
//!   root directory

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use crate::layer::{AttrValue, Layer};
use crate::util::{Error, NodePath, Result};

/// Read-only access to layers by identifier.
pub trait LayerSource: Send + Sync {
    /// Open the layer with the given identifier.
    fn open(&self, identifier: &str) -> Result<Arc<Layer>>;

    /// Create an empty anonymous layer, used when no path is given.
    fn open_in_memory(&self) -> Arc<Layer>;
}

// ============================================================================
// MemoryLayerSource
// ============================================================================

/// Layer source backed by a registered in-memory layer table.
#[derive(Default)]
pub struct MemoryLayerSource {
    layers: RwLock<HashMap<String, Arc<Layer>>>,
    anon_counter: AtomicU64,
}

impl MemoryLayerSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layer under its own identifier.
    pub fn register(&self, layer: Layer) {
        let mut layers = self.layers.write();
        layers.insert(layer.identifier().to_string(), Arc::new(layer));
    }

    /// Number of registered layers.
    pub fn len(&self) -> usize {
        self.layers.read().len()
    }

    /// Check if no layers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LayerSource for MemoryLayerSource {
    fn open(&self, identifier: &str) -> Result<Arc<Layer>> {
        let layers = self.layers.read();
        layers
            .get(identifier)
            .cloned()
            .ok_or_else(|| Error::LayerNotFound(identifier.to_string()))
    }

    fn open_in_memory(&self) -> Arc<Layer> {
        let n = self.anon_counter.fetch_add(1, Ordering::Relaxed) + 1;
        Arc::new(Layer::anonymous(format!("anon:{}", n)))
    }
}

// ============================================================================
// JsonLayerSource
// ============================================================================

/// On-disk layer document shape.
///
/// ```json
/// {
///   "subLayers": ["geo.json", "rig.json"],
///   "prims": {
///     "/char": { "type": "Xform", "references": ["asset.json"] },
///     "/char/body": {
///       "type": "Mesh",
///       "attributes": { "faceVertexCounts": [3, 3, 4] }
///     }
///   }
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LayerDoc {
    #[serde(rename = "subLayers")]
    sub_layers: Vec<String>,
    prims: HashMap<String, PrimDoc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PrimDoc {
    #[serde(rename = "type")]
    type_name: Option<String>,
    attributes: HashMap<String, serde_json::Value>,
    references: Vec<String>,
    payloads: Vec<String>,
}

/// Layer source that parses JSON layer documents below a root directory.
///
/// Identifiers are paths relative to the root directory; sub-layer paths
/// and arc targets resolve against the same root.
pub struct JsonLayerSource {
    root: PathBuf,
    anon_counter: AtomicU64,
}

impl JsonLayerSource {
    /// Create a source rooted at a directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            anon_counter: AtomicU64::new(0),
        }
    }

    /// Root directory identifiers resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl LayerSource for JsonLayerSource {
    fn open(&self, identifier: &str) -> Result<Arc<Layer>> {
        let path = self.root.join(identifier);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::LayerNotFound(identifier.to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let doc: LayerDoc = serde_json::from_str(&text)
            .map_err(|e| Error::malformed(identifier, e.to_string()))?;

        let mut layer = Layer::new(identifier, path.display().to_string());
        for sub in doc.sub_layers {
            layer.add_sub_layer(sub);
        }
        for (path_str, prim) in doc.prims {
            let spec = layer.spec_mut(NodePath::parse(&path_str));
            spec.type_name = prim.type_name;
            spec.references = prim.references;
            spec.payloads = prim.payloads;
            for (name, value) in &prim.attributes {
                match attr_from_json(value) {
                    Some(attr) => spec.set_attr(name.clone(), attr),
                    None => debug!(
                        layer = identifier,
                        attr = name.as_str(),
                        "skipping attribute with unsupported value shape"
                    ),
                }
            }
        }
        Ok(Arc::new(layer))
    }

    fn open_in_memory(&self) -> Arc<Layer> {
        let n = self.anon_counter.fetch_add(1, Ordering::Relaxed) + 1;
        Arc::new(Layer::anonymous(format!("anon:{}", n)))
    }
}

/// Convert a JSON value into an attribute value.
///
/// Returns None for shapes with no attribute representation (null,
/// nested objects, mixed-type arrays); callers skip those rather than
/// failing the whole document.
fn attr_from_json(value: &serde_json::Value) -> Option<AttrValue> {
    use serde_json::Value;

    match value {
        Value::Bool(b) => Some(AttrValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(AttrValue::Int)
            .or_else(|| n.as_f64().map(AttrValue::Float)),
        Value::String(s) => Some(AttrValue::Str(s.clone())),
        Value::Array(items) => {
            if items.iter().all(|v| v.as_i64().is_some()) {
                let ints = items.iter().filter_map(|v| v.as_i64()).collect();
                return Some(AttrValue::IntArray(ints));
            }
            if items.iter().all(|v| v.as_f64().is_some()) {
                let floats = items.iter().filter_map(|v| v.as_f64()).collect();
                return Some(AttrValue::FloatArray(floats));
            }
            if items.iter().all(|v| v.is_string()) {
                let strings = items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                return Some(AttrValue::StrArray(strings));
            }
            None
        }
        _ => None,
    }
}
