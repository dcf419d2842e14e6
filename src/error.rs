use thiserror::Error;

/// Errors raised while planning or executing a transform.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FdmtError {
    /// The instrument parameters violate an invariant; no plan was built.
    #[error("invalid instrument configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A frequency pair is non-physical (non-positive, non-finite or inverted).
    #[error("invalid frequency range: f_top = {f_top} MHz, f_bot = {f_bot} MHz")]
    InvalidFrequencyRange { f_top: f64, f_bot: f64 },

    /// A caller-supplied buffer disagrees with the plan's dimensions.
    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("transform plan has not been built")]
    UninitializedPlan,

    #[error("failed to build worker thread pool: {0}")]
    ThreadPool(String),
}

impl FdmtError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn shape_mismatch(
        what: &'static str,
        expected: impl Into<Vec<usize>>,
        actual: impl Into<Vec<usize>>,
    ) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for FdmtError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(err.to_string())
    }
}
