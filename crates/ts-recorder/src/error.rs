use std::error::Error as StdError;

/// Boxed error returned by external sinks and stores
pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("could not allocate packet buffer of {requested} bytes")]
    Allocation { requested: usize },

    #[error("unknown recorder option `{name}`")]
    UnknownOption { name: String },

    #[error("recording store error: {0}")]
    Store(#[source] BoxError),
}
