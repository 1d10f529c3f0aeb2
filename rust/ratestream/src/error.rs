//! Error types for ratestream.

/// Result type alias for ratestream.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for resampling operations.
///
/// Every variant carries plain text so a session can keep its terminal fault
/// and hand out copies of it on later calls.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Invalid quality, runtime or I/O parameters.
    #[error("invalid config: {0}")]
    Config(String),

    /// Unsupported or mismatched sample element types.
    #[error("type error: {0}")]
    Type(String),

    /// Buffer shape does not fit the channel count.
    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// The resampling engine could not be created.
    #[error("create failed: {0}")]
    Create(String),

    /// The resampling engine failed while processing.
    #[error("engine error: {0}")]
    Engine(String),

    /// The registered input provider failed.
    #[error("input provider failed: {0}")]
    Provider(String),

    /// `output` was called before an input provider was registered.
    #[error("no input provider registered")]
    NoProvider,

    /// The resampler has been closed.
    #[error("resampler closed")]
    Closed,
}

impl Error {
    /// Returns true if this error leaves the session unusable.
    ///
    /// Only engine failures are terminal; configuration, type, shape and
    /// provider errors are raised before any state is touched.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Engine(_))
    }
}

/// Buffer shape errors reported by the shape resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    /// A buffer has neither one region nor one region per channel.
    #[error("buffer has {arity} channel region(s), expected 1 or {channels}")]
    InvalidChannelArity { arity: usize, channels: usize },
}
