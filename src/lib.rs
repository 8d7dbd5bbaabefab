#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # batchflow

 A record-oriented batch processing engine: records flow from a reader
 through an ordered pipeline of filters, validators and processors into a
 writer, in fixed-size batches, while the engine reports metrics, enforces
 an error threshold, drives listener callbacks and honours cancellation.

 ## Features

 + fixed-size batching with a trailing partial batch
 + ordered record pipeline with filter / validator / processor stages
 + five listener families with mirror-symmetric invocation order
 + batch scanning: failed batches are re-written record by record to
   isolate poison records
 + error threshold ending a run once exceeded
 + job executor with per-job cancellation and await-termination
 + process-wide job monitors sampling live metrics

 ## Example

 ```rust
 use batchflow::core::job::{Job, JobBuilder};
 use batchflow::item::{IterableRecordReader, LoggerWriter};

 let mut job = JobBuilder::new()
     .named("greetings")
     .batch_size(2)
     .reader(IterableRecordReader::new(vec!["hello", "world", "again"]))
     .writer(LoggerWriter::new())
     .build();

 let report = job.run();

 assert_eq!(report.metrics().read_count, 3);
 assert_eq!(report.metrics().write_count, 3);
 ```

 ## License

 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.
*/

pub mod core;

/// Error types for batch operations
pub mod error;

/// Bundled in-memory readers, writers, processors and filters
pub mod item;

#[doc(inline)]
pub use error::BatchError;
