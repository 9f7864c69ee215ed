//! Colony Core -- shared foundations for the colony simulation.
//!
//! This crate holds the pieces every other colony crate depends on:
//! deterministic fixed-point arithmetic, identifiers, item stacks and slots,
//! the immutable content [`registry::Registry`], and the tick/state-hash
//! primitives used by the simulation clock.
//!
//! # Key Types
//!
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`id::BuildingId`] -- Stable, versioned handle to a placed building.
//! - [`item::ItemSlot`] -- A single inventory slot holding at most one
//!   [`item::ItemStack`]. Empty is a single state, never a zero-count stack.
//! - [`registry::Registry`] -- Items, recipes, technologies and building
//!   definitions, frozen at startup.
//! - [`sim::StateHash`] -- FNV-1a hash for desync and determinism checks.
//!
//! # Registry Lifecycle
//!
//! ```rust,ignore
//! let mut builder = RegistryBuilder::new();
//! let ore = builder.register_item(ItemDef::new("iron_ore", 50));
//! let registry = builder.build()?;
//! ```

#[cfg(feature = "data-loader")]
pub mod data_loader;
pub mod fixed;
pub mod id;
pub mod item;
pub mod registry;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
