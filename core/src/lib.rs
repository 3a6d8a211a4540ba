//! idlekeep-core: an incremental-progress simulation engine with durable,
//! checksummed saves.

pub mod action;
pub mod checksum;
pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod event;
pub mod event_subsystem;
pub mod migration;
pub mod observer;
pub mod offline;
pub mod persistence;
pub mod production;
pub mod production_subsystem;
pub mod rng;
pub mod save_queue;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod subsystem;
pub mod types;
