#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("encoder failed to open: {0}")]
    EncoderOpenFailed(String),

    #[error("encoder failed to write a frame: {0}")]
    EncoderWriteFailed(String),

    #[error("filename numeric field exhausted past its fixed width")]
    FilenameGenerationOverflow,

    #[error("crop rectangle {crop:?} is not contained in drawable bounds {bounds:?}")]
    InvalidCropRect {
        crop: capture_drawable::Rect,
        bounds: capture_drawable::Rect,
    },

    /// `now` was earlier than the last-seen monotonic capture time. Per the
    /// original implementation this is treated as idempotent (no emission,
    /// no state change) rather than a hard failure; callers that care can
    /// match on it, but [crate::CaptureCtx::snapshot] never propagates it.
    #[error("now is earlier than the last captured monotonic time")]
    ClockWentBackwards,

    #[error("break_interval must be positive")]
    ZeroBreakInterval,

    #[error(transparent)]
    InvalidFrameRate(#[from] capture_clock::Error),
}

impl From<frame_preparer::Error> for Error {
    fn from(err: frame_preparer::Error) -> Self {
        match err {
            frame_preparer::Error::InvalidCropRect { crop, bounds } => {
                Error::InvalidCropRect { crop, bounds }
            }
        }
    }
}
