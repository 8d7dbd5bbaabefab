use std::any::Any;

use thiserror::Error;

/// Error reported by a batch component or by the engine itself.
///
/// The string-carrying variants are built by the component that failed
/// (reader, writer, pipeline stage). `Panic` wraps an unwind caught from a
/// user-supplied component; the engine never lets one escape a job run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("RecordReader: {0}")]
    Reader(String),

    #[error("RecordWriter: {0}")]
    Writer(String),

    #[error("RecordProcessor: {0}")]
    Processing(String),

    #[error("RecordValidator: {0}")]
    Validation(String),

    #[error("panic in {0}")]
    Panic(String),

    #[error("error threshold exceeded after {0} errors")]
    ErrorThresholdExceeded(u64),
}

/// Renders the payload of a caught unwind for a `BatchError::Panic`.
pub(crate) fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_should_name_the_failing_component() {
        assert_eq!(
            BatchError::Reader("end of stream".to_string()).to_string(),
            "RecordReader: end of stream"
        );
        assert_eq!(
            BatchError::ErrorThresholdExceeded(3).to_string(),
            "error threshold exceeded after 3 errors"
        );
    }

    #[test]
    fn describe_panic_should_render_common_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(describe_panic(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new("boom".to_string());
        assert_eq!(describe_panic(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(describe_panic(payload.as_ref()), "opaque panic payload");
    }
}
