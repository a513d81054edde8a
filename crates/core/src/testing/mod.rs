//! Testing utilities and test doubles.
//!
//! This module provides controllable stand-ins for the seams of the
//! processing pipeline, allowing end-to-end tests without a broker or wall
//! clock.
//!
//! # Example
//!
//! ```rust,ignore
//! use contentgate_core::testing::{InMemoryBroker, ManualClock};
//!
//! let broker = InMemoryBroker::new();
//! let clock = ManualClock::new(start);
//!
//! // Wire `broker.connector()` into a BrokerConsumer and `clock` into the processor,
//! // then move time forward to expire leases.
//! clock.advance(chrono::Duration::minutes(6));
//! ```

mod flaky_store;
mod manual_clock;
mod memory_broker;
mod scripted_validator;

pub use flaky_store::FlakyStore;
pub use manual_clock::ManualClock;
pub use memory_broker::InMemoryBroker;
pub use scripted_validator::ScriptedValidator;
