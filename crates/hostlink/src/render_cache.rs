//! Per-node render package caches
//!
//! Each node keeps the render packages produced for its last run. The
//! visualization pass may read or refill a node's cache from its own
//! thread, so every node cache sits behind its own lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::types::{ElementRef, NodeId};

/// Geometry prepared for display by the host view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPackage {
    /// Element the package was tessellated from, if any
    pub element: Option<ElementRef>,
    /// Opaque display payload
    pub payload: serde_json::Value,
}

/// Render packages for one node
#[derive(Debug, Default)]
pub struct NodeRenderCache {
    pub packages: Vec<RenderPackage>,
}

/// Registry of node render caches
#[derive(Debug, Default)]
pub struct RenderCacheRegistry {
    caches: RwLock<HashMap<NodeId, Arc<Mutex<NodeRenderCache>>>>,
}

impl RenderCacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache cell for a node, created on first use
    pub fn cache_for(&self, node: NodeId) -> Arc<Mutex<NodeRenderCache>> {
        if let Some(cache) = self.caches.read().get(&node) {
            return cache.clone();
        }
        self.caches.write().entry(node).or_default().clone()
    }

    /// Replace a node's render packages
    pub fn store(&self, node: NodeId, packages: Vec<RenderPackage>) {
        self.cache_for(node).lock().packages = packages;
    }

    /// Copy of a node's render packages
    pub fn packages(&self, node: NodeId) -> Vec<RenderPackage> {
        match self.caches.read().get(&node) {
            Some(cache) => cache.lock().packages.clone(),
            None => Vec::new(),
        }
    }

    /// Empty every node cache; returns the number of packages dropped
    pub fn clear_all(&self) -> usize {
        let cells: Vec<_> = self.caches.read().values().cloned().collect();
        let mut dropped = 0;
        for cell in cells {
            let mut cache = cell.lock();
            dropped += cache.packages.len();
            cache.packages.clear();
        }
        dropped
    }

    /// Total number of cached packages
    pub fn package_count(&self) -> usize {
        self.caches
            .read()
            .values()
            .map(|cell| cell.lock().packages.len())
            .sum()
    }
}
