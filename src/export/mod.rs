//! Export pipeline
//!
//! Streams every key of a store into a single JSON array:
//!
//! - `streaming`: cursor-based key enumeration feeding the key queue
//! - `resolver`: type, value and TTL lookup for one key
//! - `worker`: fixed-size pool of resolvers between the two queues
//! - `writers`: JSON array framing over an output sink
//! - `progress`: shared counter and periodic reporting
//! - `coordinator`: lifecycle, cancellation and the final summary

pub mod coordinator;
pub mod progress;
pub mod record;
pub mod resolver;
pub mod streaming;
pub mod worker;
pub mod writers;

pub use coordinator::{ExportCoordinator, ExportSummary, RunState};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use record::{KeyType, KeyValue, Record, ScoredMember, StreamEntry};
pub use resolver::{KeyError, KeyErrorKind, KeyResolver, ResolveStage};
pub use streaming::KeyScanner;
pub use worker::{PoolHandle, WorkerPool, WorkerStats};
pub use writers::{FileSink, JsonArrayWriter, MemorySink, OutputSink};
