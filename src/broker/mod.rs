//! Stream-queue source: pulls decoded JSON payloads from a RabbitMQ stream
//! queue with offset-from-first replay, manual ack, and exponential-backoff
//! reconnect. Mirrors the original `RabbitPartition` consume loop.

mod backoff;
mod source;

pub use backoff::BackoffClock;
pub use source::BrokerSource;
