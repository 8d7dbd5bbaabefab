use std::{
    marker::PhantomData,
    panic::{self, AssertUnwindSafe},
};

use crate::{
    core::record::Record,
    error::{describe_panic, BatchError},
};

/// Result of applying one pipeline stage to a record.
///
/// - `Ok(Some(record))` when the record continues down the pipeline
/// - `Ok(None)` when the record is filtered; remaining stages are skipped
/// - `Err(error)` when the stage failed; remaining stages are skipped
pub type StageResult<P> = Result<Option<Record<P>>, BatchError>;

/// A stage that may drop records.
pub trait RecordFilter<P> {
    fn filter(&mut self, record: Record<P>) -> StageResult<P>;
}

/// A stage that checks records and drops or rejects invalid ones.
///
/// For the engine a validator behaves exactly like a filter; the separate
/// trait only keeps intent visible at the registration site.
pub trait RecordValidator<P> {
    fn validate(&mut self, record: Record<P>) -> StageResult<P>;
}

/// A stage that transforms a record, possibly changing its payload type.
///
/// Returning `Ok(None)` drops the record as filtered; returning an error
/// counts it against the job's error threshold.
pub trait RecordProcessor<I, O> {
    fn process(&mut self, record: Record<I>) -> StageResult<O>;
}

/// A processor that forwards records unchanged.
#[derive(Debug, Default)]
pub struct PassThroughProcessor<P> {
    _marker: PhantomData<P>,
}

impl<P> PassThroughProcessor<P> {
    pub fn new() -> Self {
        PassThroughProcessor {
            _marker: PhantomData,
        }
    }
}

impl<P> RecordProcessor<P, P> for PassThroughProcessor<P> {
    fn process(&mut self, record: Record<P>) -> StageResult<P> {
        Ok(Some(record))
    }
}

type Chain<I, O> = Box<dyn FnMut(Record<I>) -> StageResult<O> + Send>;

/// Ordered chain of record-level stages between reader and writer.
///
/// Stages are composed in registration order into a single application.
/// A filtered record or a stage failure short-circuits the remaining
/// stages, and every stage call is guarded against panics so a misbehaving
/// stage surfaces as a [`BatchError::Panic`] instead of unwinding the job.
pub struct Pipeline<I, O> {
    chain: Chain<I, O>,
}

impl<I: 'static> Pipeline<I, I> {
    /// A pipeline with no stages; records pass through untouched.
    pub(crate) fn identity() -> Self {
        Pipeline {
            chain: Box::new(|record| Ok(Some(record))),
        }
    }
}

impl<I: 'static, O: 'static> Pipeline<I, O> {
    pub(crate) fn add_filter(self, filter: Box<dyn RecordFilter<O> + Send>) -> Pipeline<I, O> {
        let mut chain = self.chain;
        let mut filter = filter;
        Pipeline {
            chain: Box::new(move |record| match chain(record)? {
                Some(record) => guard_stage("filter", || filter.filter(record)),
                None => Ok(None),
            }),
        }
    }

    pub(crate) fn add_validator(
        self,
        validator: Box<dyn RecordValidator<O> + Send>,
    ) -> Pipeline<I, O> {
        let mut chain = self.chain;
        let mut validator = validator;
        Pipeline {
            chain: Box::new(move |record| match chain(record)? {
                Some(record) => guard_stage("validator", || validator.validate(record)),
                None => Ok(None),
            }),
        }
    }

    pub(crate) fn add_processor<T: 'static>(
        self,
        processor: Box<dyn RecordProcessor<O, T> + Send>,
    ) -> Pipeline<I, T> {
        let mut chain = self.chain;
        let mut processor = processor;
        Pipeline {
            chain: Box::new(move |record| match chain(record)? {
                Some(record) => guard_stage("processor", || processor.process(record)),
                None => Ok(None),
            }),
        }
    }

    /// Runs one record through every stage in registration order.
    pub(crate) fn apply(&mut self, record: Record<I>) -> StageResult<O> {
        (self.chain)(record)
    }
}

fn guard_stage<T>(stage: &str, call: impl FnOnce() -> StageResult<T>) -> StageResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(BatchError::Panic(format!(
            "{stage} stage: {}",
            describe_panic(payload.as_ref())
        ))),
    }
}
