//! # recstream
//!
//! Streams synthetic records from a pool of concurrent producers through a
//! bounded queue into a single serializing consumer, while a monitor samples
//! heap and runtime figures and exports them as OpenTelemetry metrics.
//!
//! The queue is the only backpressure mechanism: producers suspend when it is
//! full. Shutdown is ordered so the queue closes only after every producer
//! has finished, and the run returns only after the consumer has drained it.

pub mod config;
pub mod error;
pub mod generator;
pub mod model;
pub mod monitor;
pub mod pipeline;
pub mod queue;
pub mod sink;
pub mod telemetry;
