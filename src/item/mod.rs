//! Bundled in-memory readers, writers, processors and filters.
//!
//! These are the small components the engine's own tests and quick starts
//! rely on; production sources and sinks are expected to come from the
//! application.

pub mod collector;
pub mod filter;
pub mod iterable;
pub mod logger;
pub mod noop;

pub use collector::RecordCollector;
pub use filter::RecordNumberBetweenFilter;
pub use iterable::IterableRecordReader;
pub use logger::LoggerWriter;
pub use noop::NoOpRecordWriter;
