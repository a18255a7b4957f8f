//! Background loading with supersession.
//!
//! Separates resolution and composition from the presentation thread to
//! keep interaction responsive. Each [`LoadCoordinator::load`] call
//! spawns one worker that posts zero or more [`LoadEvent::Progress`]
//! events and exactly one terminal event ([`LoadEvent::Loaded`] or
//! [`LoadEvent::Failed`]) tagged with a monotonic generation counter.
//!
//! Starting a new load supersedes the previous one: there is no
//! mid-flight cancellation, the stale result is simply discarded on
//! arrival by generation comparison in [`LoadCoordinator::accept`]. The
//! accepted tree and stats are published as an immutable snapshot,
//! swapped wholesale; readers clone the `Arc` and are never blocked by
//! a load in progress.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::compose::{compose, resolve_stack, ComposedTree};
use crate::layer::source::LayerSource;
use crate::stats::{compute_stats, explain_node, AggregateStats, CompositionExplanation};
use crate::util::NodePath;

/// Events posted by load workers.
#[derive(Clone, Debug)]
pub enum LoadEvent {
    /// Non-terminal status update.
    Progress { generation: u64, message: String },
    /// Terminal: the composed tree and its statistics are ready.
    Loaded {
        generation: u64,
        tree: Arc<ComposedTree>,
        stats: AggregateStats,
    },
    /// Terminal: the root layer could not be obtained.
    Failed { generation: u64, error: String },
}

impl LoadEvent {
    /// Generation of the load this event belongs to.
    pub fn generation(&self) -> u64 {
        match self {
            Self::Progress { generation, .. }
            | Self::Loaded { generation, .. }
            | Self::Failed { generation, .. } => *generation,
        }
    }

    /// Whether this event ends its load.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Handle identifying one load request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadHandle {
    generation: u64,
}

impl LoadHandle {
    /// Generation assigned to this load.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The most recently accepted load result.
#[derive(Clone, Debug)]
pub struct LiveSnapshot {
    pub generation: u64,
    pub tree: Arc<ComposedTree>,
    pub stats: AggregateStats,
}

/// Coordinates background loads and owns the live snapshot.
pub struct LoadCoordinator {
    source: Arc<dyn LayerSource>,
    tx: Sender<LoadEvent>,
    rx: Mutex<Receiver<LoadEvent>>,
    generation: AtomicU64,
    last_request: Mutex<Option<String>>,
    live: RwLock<Option<LiveSnapshot>>,
}

impl LoadCoordinator {
    /// Create a coordinator over a layer source.
    pub fn new(source: Arc<dyn LayerSource>) -> Self {
        let (tx, rx) = channel();
        Self {
            source,
            tx,
            rx: Mutex::new(rx),
            generation: AtomicU64::new(0),
            last_request: Mutex::new(None),
            live: RwLock::new(None),
        }
    }

    /// Start loading the given layer identifier on a background worker.
    /// None loads an empty anonymous layer.
    ///
    /// Any load still in flight is superseded: its terminal event will
    /// be discarded by [`accept`](Self::accept).
    pub fn load(&self, identifier: Option<&str>) -> LoadHandle {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let request = identifier.map(str::to_string);
        *self.last_request.lock() = request.clone();

        info!(generation, request = request.as_deref().unwrap_or("<in-memory>"), "load started");

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        thread::spawn(move || run_load(source, tx, generation, request));

        LoadHandle { generation }
    }

    /// Re-issue the last requested load, if there was one.
    pub fn reload(&self) -> Option<LoadHandle> {
        let last = self.last_request.lock().clone();
        last.map(|id| self.load(Some(&id)))
    }

    /// Non-blocking event poll.
    pub fn try_recv(&self) -> Option<LoadEvent> {
        self.rx.lock().try_recv().ok()
    }

    /// Blocking event wait; None when all workers are gone.
    pub fn recv_blocking(&self) -> Option<LoadEvent> {
        self.rx.lock().recv().ok()
    }

    /// Filter an event against the current generation and publish
    /// accepted results.
    ///
    /// Returns None for events from superseded loads; those must not
    /// reach the presentation layer and never touch the live snapshot.
    pub fn accept(&self, event: LoadEvent) -> Option<LoadEvent> {
        let current = self.generation.load(Ordering::SeqCst);
        if event.generation() != current {
            debug!(
                generation = event.generation(),
                current, "discarding event from superseded load"
            );
            return None;
        }
        if let LoadEvent::Loaded { generation, tree, stats } = &event {
            *self.live.write() = Some(LiveSnapshot {
                generation: *generation,
                tree: Arc::clone(tree),
                stats: stats.clone(),
            });
            info!(generation = *generation, nodes = tree.len(), "load published");
        }
        Some(event)
    }

    /// The live snapshot, if any load has completed.
    pub fn live(&self) -> Option<LiveSnapshot> {
        self.live.read().clone()
    }

    /// Point query against the live tree. None when no tree is live or
    /// the path does not exist.
    pub fn explain(&self, path: &NodePath) -> Option<CompositionExplanation> {
        let live = self.live.read();
        live.as_ref().and_then(|snapshot| explain_node(&snapshot.tree, path))
    }

    /// Generation of the most recent load request.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Worker body: open the root layer, resolve, compose, aggregate.
/// Posts exactly one terminal event; only root-layer failure is fatal.
fn run_load(
    source: Arc<dyn LayerSource>,
    tx: Sender<LoadEvent>,
    generation: u64,
    request: Option<String>,
) {
    let _ = tx.send(LoadEvent::Progress {
        generation,
        message: "opening root layer".into(),
    });

    let root = match &request {
        Some(identifier) => source.open(identifier),
        None => Ok(source.open_in_memory()),
    };
    let root = match root {
        Ok(layer) => layer,
        Err(e) => {
            let _ = tx.send(LoadEvent::Failed {
                generation,
                error: e.to_string(),
            });
            return;
        }
    };

    let _ = tx.send(LoadEvent::Progress {
        generation,
        message: "resolving layer stack".into(),
    });
    let stack = resolve_stack(root, source.as_ref());

    let _ = tx.send(LoadEvent::Progress {
        generation,
        message: "composing".into(),
    });
    let tree = compose(&stack, source.as_ref());
    let stats = compute_stats(&tree);

    let _ = tx.send(LoadEvent::Loaded {
        generation,
        tree: Arc::new(tree),
        stats,
    });
}
