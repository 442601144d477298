//! Named update channels.
//!
//! This module provides `ChannelRegistry`, which maps channel names to the
//! nodes subscribed to them and routes broadcasts into invalidation waves.
//! Channels hold no cached state of their own.

use crate::graph::{Graph, NodeId};
use hashbrown::HashMap;
use quarry_core::Result;
use std::cell::RefCell;
use std::collections::BTreeSet;
use tracing::debug;

/// A registry routing channel broadcasts to subscribed nodes.
///
/// Broadcasting to several channels invalidates the union of their
/// subscribers in a single wave, so a node subscribed to more than one of
/// them rebuilds once.
///
/// # Example
///
/// ```rust
/// use quarry_reactive::{ChannelRegistry, Graph};
///
/// let graph = Graph::new();
/// let channels = ChannelRegistry::new();
///
/// let node = graph.constant("items cursor", 1);
/// graph.get(node).unwrap();
/// channels.subscribe("items", node);
/// channels.subscribe("stock", node);
///
/// let notified = channels.publish(&graph, None, ["items", "stock"]).unwrap();
/// assert_eq!(notified, 1);
/// assert_eq!(graph.rebuild_count(node), 2);
/// ```
pub struct ChannelRegistry {
    /// Channel name -> subscribed nodes
    channels: RefCell<HashMap<String, BTreeSet<NodeId>>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            channels: RefCell::new(HashMap::new()),
        }
    }

    /// Subscribes a node to a channel.
    ///
    /// Returns false if it was already subscribed.
    pub fn subscribe(&self, channel: &str, node: impl Into<NodeId>) -> bool {
        self.channels
            .borrow_mut()
            .entry(channel.to_string())
            .or_default()
            .insert(node.into())
    }

    /// Unsubscribes a node from a channel.
    ///
    /// Returns true if the node was subscribed.
    pub fn unsubscribe(&self, channel: &str, node: impl Into<NodeId>) -> bool {
        let node = node.into();
        let mut channels = self.channels.borrow_mut();
        let Some(subscribers) = channels.get_mut(channel) else {
            return false;
        };
        let removed = subscribers.remove(&node);
        if subscribers.is_empty() {
            channels.remove(channel);
        }
        removed
    }

    /// Unsubscribes a node from every channel. Returns how many it left.
    pub fn unsubscribe_all(&self, node: impl Into<NodeId>) -> usize {
        let node = node.into();
        let mut channels = self.channels.borrow_mut();
        let mut removed = 0;
        for subscribers in channels.values_mut() {
            if subscribers.remove(&node) {
                removed += 1;
            }
        }
        channels.retain(|_, subscribers| !subscribers.is_empty());
        removed
    }

    /// Returns the union of the subscribers of the given channels.
    pub fn subscribers<I, S>(&self, channels: I) -> BTreeSet<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let registry = self.channels.borrow();
        let mut union = BTreeSet::new();
        for channel in channels {
            if let Some(subscribers) = registry.get(channel.as_ref()) {
                union.extend(subscribers.iter().copied());
            }
        }
        union
    }

    /// Returns the channels a node is subscribed to, sorted by name.
    pub fn channels_of(&self, node: impl Into<NodeId>) -> Vec<String> {
        let node = node.into();
        let mut names: Vec<String> = self
            .channels
            .borrow()
            .iter()
            .filter(|(_, subscribers)| subscribers.contains(&node))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Invalidates every subscriber of the given channels, each exactly once.
    ///
    /// `updater` is recorded as the source of the wave. Returns the number of
    /// distinct subscribers invalidated.
    pub fn publish<I, S>(&self, graph: &Graph, updater: Option<NodeId>, channels: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = channels
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .collect();
        let targets = self.subscribers(&names);
        debug!(channels = ?names, subscribers = targets.len(), updater = ?updater, "publish");
        let count = targets.len();
        graph.invalidate_all(targets, updater)?;
        Ok(count)
    }

    /// Invalidates a node together with every subscriber of every channel the
    /// node belongs to. The node itself is always included.
    pub fn publish_from(&self, graph: &Graph, node: impl Into<NodeId>) -> Result<usize> {
        let node = node.into();
        let channels = self.channels_of(node);
        let mut targets = self.subscribers(&channels);
        targets.insert(node);
        debug!(node = %node, channels = ?channels, subscribers = targets.len(), "refresh fan-out");
        let count = targets.len();
        graph.invalidate_all(targets, Some(node))?;
        Ok(count)
    }

    /// Returns the number of channels with at least one subscriber.
    pub fn channel_count(&self) -> usize {
        self.channels.borrow().len()
    }

    /// Returns the number of subscribers of a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .borrow()
            .get(channel)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}
