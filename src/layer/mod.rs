//! Layer data model.
//!
//! A [`Layer`] is one addressable source of structural overrides: a file
//! or an in-memory document. It carries an ordered sub-layer list
//! (strongest-first) and a table of [`PrimSpec`]s keyed by node path.
//! Layers are immutable once handed to the composition resolver; every
//! consumer reads them through `Arc<Layer>`.
//!
//! Composition arcs ([`CompositionArc`]) are directed references from a
//! node path to another layer's content, either [`ArcKind::Reference`]
//! (strong) or [`ArcKind::Payload`] (weak).

pub mod source;

use std::collections::BTreeMap;
use std::fmt;

use crate::util::NodePath;

/// A single attribute value authored in a layer.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    StrArray(Vec<String>),
}

impl AttrValue {
    /// View as an int array, if that's what this value is.
    pub fn as_int_array(&self) -> Option<&[i64]> {
        match self {
            Self::IntArray(values) => Some(values),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
            write!(f, "[")?;
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", v)?;
            }
            write!(f, "]")
        }
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(v) => write!(f, "\"{}\"", v),
            Self::IntArray(v) => list(f, v),
            Self::FloatArray(v) => list(f, v),
            Self::StrArray(v) => list(f, v),
        }
    }
}

/// Kind of a composition arc.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArcKind {
    /// Strong arc: composed ahead of payloads at the same node.
    Reference,
    /// Weak arc: composed after references at the same node.
    Payload,
}

impl fmt::Display for ArcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Payload => write!(f, "payload"),
        }
    }
}

/// A directed composition reference from a node path to a target layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositionArc {
    /// Node path the arc is authored at.
    pub source_path: NodePath,
    /// Layer source identifier of the arc target.
    pub target: String,
    /// Reference or payload.
    pub kind: ArcKind,
}

/// Partial node description authored by one layer at one path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimSpec {
    /// Declared type name, if any.
    pub type_name: Option<String>,
    /// Authored attributes.
    pub attributes: BTreeMap<String, AttrValue>,
    /// Reference arc targets, declaration order.
    pub references: Vec<String>,
    /// Payload arc targets, declaration order.
    pub payloads: Vec<String>,
}

impl PrimSpec {
    /// Set an attribute value.
    pub fn set_attr(&mut self, name: impl Into<String>, value: AttrValue) {
        self.attributes.insert(name.into(), value);
    }
}

/// A named, addressable source of structured overrides.
///
/// `identifier` is stable for the lifetime of the layer and unique within
/// a session. `sub_layer_paths` order is authoritative for strength
/// ordering and is never re-sorted.
#[derive(Clone, Debug)]
pub struct Layer {
    identifier: String,
    resolved_path: String,
    is_anonymous: bool,
    sub_layer_paths: Vec<String>,
    specs: BTreeMap<NodePath, PrimSpec>,
}

impl Layer {
    /// Create a layer backed by a resolved file path.
    pub fn new(identifier: impl Into<String>, resolved_path: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            resolved_path: resolved_path.into(),
            is_anonymous: false,
            sub_layer_paths: Vec::new(),
            specs: BTreeMap::new(),
        }
    }

    /// Create an anonymous in-memory layer (empty resolved path).
    pub fn anonymous(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            resolved_path: String::new(),
            is_anonymous: true,
            sub_layer_paths: Vec::new(),
            specs: BTreeMap::new(),
        }
    }

    /// Stable layer identifier.
    #[inline]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Resolved on-disk path; empty for anonymous layers.
    #[inline]
    pub fn resolved_path(&self) -> &str {
        &self.resolved_path
    }

    /// Whether this layer is in-memory only.
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.is_anonymous
    }

    /// Sub-layer paths, strongest-first.
    #[inline]
    pub fn sub_layer_paths(&self) -> &[String] {
        &self.sub_layer_paths
    }

    /// Append a sub-layer path (weaker than all previously added ones).
    pub fn add_sub_layer(&mut self, path: impl Into<String>) {
        self.sub_layer_paths.push(path.into());
    }

    /// Get or create the spec at a path.
    pub fn spec_mut(&mut self, path: NodePath) -> &mut PrimSpec {
        self.specs.entry(path).or_default()
    }

    /// Get the spec at a path, if authored.
    pub fn spec(&self, path: &NodePath) -> Option<&PrimSpec> {
        self.specs.get(path)
    }

    /// Iterate authored specs in deterministic path order.
    pub fn specs(&self) -> impl Iterator<Item = (&NodePath, &PrimSpec)> {
        self.specs.iter()
    }

    /// Number of authored specs.
    #[inline]
    pub fn spec_count(&self) -> usize {
        self.specs.len()
    }
}
