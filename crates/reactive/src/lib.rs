//! Quarry Reactive - memoized dependency nodes and update channels.
//!
//! This crate implements the incremental-computation engine the query
//! pipeline is built from.
//!
//! # Core Concepts
//!
//! - `Graph`: an arena of nodes keyed by `NodeId`, with typed `Node<V>` handles
//! - `Compute`: the behavior of a node (validate, construct, dispose)
//! - `ChannelRegistry`: named broadcast groups that invalidate nodes across
//!   otherwise unrelated owners
//! - `Flag`: an observable boolean
//!
//! # Example
//!
//! ```rust
//! use quarry_reactive::{compute, Dependencies, Graph};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let graph = Graph::new();
//! let text = graph.constant("text", String::from("SELECT * FROM items"));
//! let length = graph
//!     .add(
//!         "length",
//!         compute(|deps, _| Ok(deps.get::<String>("text")?.len())),
//!         Dependencies::new().value("text", text),
//!     )
//!     .unwrap();
//!
//! let fired = Rc::new(Cell::new(0));
//! let counter = fired.clone();
//! graph.get(length).unwrap();
//! graph.on_invalidate(length, move |_| counter.set(counter.get() + 1)).unwrap();
//!
//! graph.invalidate(text).unwrap();
//! assert_eq!(fired.get(), 1);
//! ```

pub mod channel;
pub mod graph;
pub mod observable;
pub mod subscription;

pub use channel::ChannelRegistry;
pub use graph::{
    compute, Compute, Constant, DepValues, Dependencies, Dependency, FnCompute, Graph,
    Invalidation, Node, NodeId,
};
pub use observable::Flag;
pub use subscription::{ListenerId, Listeners};
