//! Colony Sim -- the tile-based colony simulation built on the colony
//! core, spatial, power and tech-tree crates.
//!
//! A [`world::World`] owns a foundation grid, the buildings placed on it,
//! one power network, the research state, the player inventory and a
//! hand-crafting queue. It advances in fixed 1/60 s steps.
//!
//! # Tick Pipeline
//!
//! Each call to [`world::World::step`] runs:
//!
//! 1. **Pre-tick** -- Clear belt arrival markers.
//! 2. **Power** -- Balance production, consumption and storage; publish
//!    satisfaction.
//! 3. **Buildings** -- Every building steps once, in placement order.
//!    Belts move and hand over items, inserters swing, furnaces and
//!    assemblers craft.
//! 4. **Crafting** -- The front hand-crafting job advances.
//! 5. **Bookkeeping** -- Increment the tick and compute the state hash.
//!
//! Buildings exchange items only through [`transfer::TransferProtocol`],
//! so a belt, inserter or chest never needs to know what it is feeding.
//!
//! # Key Types
//!
//! - [`world::World`] -- Command layer and pipeline orchestrator.
//! - [`building::BuildingArena`] -- Placed buildings in placement order.
//! - [`conveyor::Belt`] -- One-item belt tile with a progress fraction.
//! - [`inserter::Inserter`] -- Swing-arm mover between two buildings.
//! - [`production::ProductionUnit`] -- Furnace and assembler crafting.
//! - [`sim::SimulationClock`] -- Real time to fixed steps.
//! - [`snapshot::SaveState`] -- JSON and binary save format.

pub mod building;
pub mod chest;
pub mod config;
pub mod conveyor;
pub mod crafting;
pub mod event;
pub mod inserter;
pub mod inventory;
pub mod production;
pub mod sim;
pub mod snapshot;
pub mod transfer;
pub mod world;

#[cfg(test)]
mod testing;

pub use config::{RemovalPolicy, SimConfig};
pub use event::{Event, EventKind};
pub use snapshot::{SaveState, SnapshotError};
pub use world::{CommandError, PlacementError, World};
