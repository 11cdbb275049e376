use std::error::Error;
use std::sync::Arc;

/// Error type accepted from producers and transforms
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Failure surfaced by [`MemoizedTask`](crate::MemoizedTask).
///
/// The inner error is reference counted so a single producer failure can be
/// handed to every caller waiting on the same pending result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    /// The producer's future resolved to an error
    #[error("producer failed: {0}")]
    Producer(#[source] Arc<dyn Error + Send + Sync>),
    /// The transform rejected the produced value
    #[error("transform failed: {0}")]
    Transform(#[source] Arc<dyn Error + Send + Sync>),
}

impl TaskError {
    pub fn producer(err: BoxError) -> Self {
        Self::Producer(Arc::from(err))
    }

    pub fn transform(err: BoxError) -> Self {
        Self::Transform(Arc::from(err))
    }

    /// The error returned by the producer or transform
    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        match self {
            Self::Producer(err) | Self::Transform(err) => &**err,
        }
    }

    pub fn is_producer(&self) -> bool {
        matches!(self, Self::Producer(_))
    }

    pub fn is_transform(&self) -> bool {
        matches!(self, Self::Transform(_))
    }
}
