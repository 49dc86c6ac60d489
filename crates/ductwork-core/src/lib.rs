//! Ductwork Core -- a block-grid pipe network engine.
//!
//! Pipes are directed blocks that pull items from the container behind
//! them and push them along a chain of pipes into a container, or out of
//! an open end as a free item. The engine keeps an in-memory index of every
//! loaded pipe and drives transfers from the host's tick. It owns no world
//! data: blocks, inventories and render proxies belong to the host and are
//! reached through the [`world::World`] trait.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::PipeEngine::step`] runs:
//!
//! 1. **Advance** -- Increment the tick counter.
//! 2. **Deferred** -- Run follow-up tasks (neighbor reshaping, block
//!    re-skinning, region restores) that came due.
//! 3. **Transfer** -- On polling ticks, service every node whose own
//!    interval has elapsed.
//!
//! Host events ([`event::WorldEvent`]) are applied between steps with
//! [`engine::PipeEngine::handle_event`].
//!
//! # Persistence
//!
//! There is no save file. Every pipe writes a textual [`marker`] onto its
//! render proxies, the host persists those proxies, and the engine rebuilds
//! a region's nodes from them whenever the region loads ([`reconcile`]).
//!
//! # Key Types
//!
//! - [`engine::PipeEngine`] -- Owns the index and orchestrates everything.
//! - [`catalog::VariantCatalog`] -- Immutable set of pipe variants.
//! - [`index::SpatialNodeIndex`] -- Position-ordered map of pipe nodes.
//! - [`resolver::resolve`] -- Follows a pipe chain to its destination.
//! - [`transfer::TransferScheduler`] -- Decides which ticks poll.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for drop geometry.

pub mod catalog;
pub mod deferred;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod id;
pub mod index;
pub mod item;
pub mod marker;
pub mod pose;
pub mod reconcile;
pub mod resolver;
pub mod rng;
pub mod sim;
pub mod transfer;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ductwork_spatial as spatial;
