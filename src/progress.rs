//! Progress-callback trait for per-tree conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ToolchainConfigBuilder::progress_callback`] to receive
//! events as the orchestrator walks through the decision trees of a
//! document. The CLI uses it to drive an `indicatif` progress bar; library
//! callers can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use ebd_toolchain::{ConversionProgressCallback, ToolchainConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_tree_complete(&self, ebd_key: &str, artifacts: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{ebd_key}: {artifacts} files");
//!     }
//! }
//!
//! let config = ToolchainConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each decision tree.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Trees are processed sequentially, but the trait is
/// `Send + Sync` so one callback can be shared with other tasks.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once per document after its EBD keys are known.
    ///
    /// # Arguments
    /// * `document`    — display name of the document
    /// * `total_trees` — number of EBD keys found in it
    fn on_document_start(&self, document: &str, total_trees: usize) {
        let _ = (document, total_trees);
    }

    /// Called before a tree is extracted.
    fn on_tree_start(&self, ebd_key: &str, index: usize, total_trees: usize) {
        let _ = (ebd_key, index, total_trees);
    }

    /// Called when every requested artifact of a tree was written.
    ///
    /// # Arguments
    /// * `ebd_key`   — the tree's key
    /// * `artifacts` — number of files written for it
    fn on_tree_complete(&self, ebd_key: &str, artifacts: usize) {
        let _ = (ebd_key, artifacts);
    }

    /// Called when a tree has no table and was skipped.
    fn on_tree_skipped(&self, ebd_key: &str, reason: &str) {
        let _ = (ebd_key, reason);
    }

    /// Called for every failure of a tree (one tree may report several,
    /// e.g. one per format).
    fn on_tree_error(&self, ebd_key: &str, error: &str) {
        let _ = (ebd_key, error);
    }

    /// Called once after all documents have been processed.
    ///
    /// # Arguments
    /// * `total_trees` — trees attempted across all documents
    /// * `failed`      — trees with at least one failure
    fn on_run_complete(&self, total_trees: usize, failed: usize) {
        let _ = (total_trees, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ToolchainConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
