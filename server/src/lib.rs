//! # World Server Library
//!
//! This library provides the authoritative server for a tile-based multiplayer
//! world. Every change to the world (a step, a swing, a spoken line, a monster
//! spawning) is a deferred operation that is scheduled for a point in time and
//! executed later by a single dispatch loop.
//!
//! ## Core Responsibilities
//!
//! ### Deferred Execution
//! Connection handlers, operations and server startup never mutate the world
//! directly. They build an [`operation::Operation`] through the
//! [`factory::OperationFactory`] and hand it to the [`scheduler::Scheduler`]
//! with a delay. The [`game::Game`] loop pops due items in due-time order,
//! breaking ties by insertion order, and runs each one to completion.
//!
//! ### Action Throttling
//! Players cannot act faster than their exhaustion allows. The
//! [`exhaustion::ExhaustionTracker`] remembers, per actor and category, the
//! earliest time the next action of that category may run. An operation that
//! comes due too early is deferred under the same handle instead of running.
//!
//! ### Notifications
//! Operations describe what happened as [`notification::Notification`]s.
//! Spectators are resolved from the world when the notification is
//! dispatched, and each spectator gets its own prepared payload.
//!
//! ## Architecture Design
//!
//! ### Single Consumer Event Loop
//! Producers on any task insert into the shared event queue; only the dispatch
//! loop removes and executes items. Operations therefore never observe each
//! other half done and the world needs no locking.
//!
//! ### Fault Isolation
//! An operation that fails or panics is logged and dropped. Its buffered
//! schedules and notifications are discarded and the loop moves on to the
//! next item.
//!
//! ### UDP-Based Communication
//! Clients talk to the server over UDP with bincode-encoded
//! [`shared::Packet`]s. The network layer only translates packets into
//! scheduled operations and writes prepared payloads back to the socket.
//!
//! ## Module Organization
//!
//! ### Engine (`clock`, `queue`, `scheduler`, `exhaustion`, `game`)
//! Time source, the ordered event queue with lazy cancellation, the public
//! scheduling API, per-actor exhaustion and the dispatch loop.
//!
//! ### Operations (`operation`, `context`, `factory`, `operations`)
//! The operation contract, the context an operation sees while executing,
//! validated construction, and the concrete gameplay operations.
//!
//! ### Delivery (`notification`, `dispatcher`)
//! Notification payloads and per-spectator delivery with fault containment.
//!
//! ### World (`world`, `pathfinding`, `config`)
//! Creatures and tiles, path search, and engine tunables.
//!
//! ### Networking (`client_manager`, `network`)
//! Connection bookkeeping and the UDP front-end.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::clock::MonotonicClock;
//! use server::config::EngineConfig;
//! use server::factory::{DefaultOperationFactory, OperationFactory};
//! use server::game::Game;
//! use server::network::Server;
//! use server::scheduler::Scheduler;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let scheduler = Scheduler::new(Arc::new(MonotonicClock::new()));
//!     let factory: Arc<dyn OperationFactory> =
//!         Arc::new(DefaultOperationFactory::new(config.clone()));
//!
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         32,
//!         Duration::from_secs(5),
//!         scheduler.clone(),
//!         Arc::clone(&factory),
//!     )
//!     .await?;
//!
//!     let mut game = Game::new(config, scheduler, server.outbound()).with_factory(factory);
//!     game.schedule_spawns()?;
//!     tokio::spawn(async move { game.run().await });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod clock;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod exhaustion;
pub mod factory;
pub mod game;
pub mod network;
pub mod notification;
pub mod operation;
pub mod operations;
pub mod pathfinding;
pub mod queue;
pub mod scheduler;
pub mod world;
