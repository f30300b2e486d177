use thiserror::Error;

/// Errors surfaced by the flow engine and the boundary traits.
///
/// `MissingDraftField` means a draft reached a state whose handler needs a
/// selection that was never recorded. That only happens when session data has
/// been corrupted, so callers should discard the session rather than retry.
/// The remaining variants exist for [`SessionStore`](crate::store::SessionStore),
/// [`PresentationAdapter`](crate::render::PresentationAdapter) and
/// [`NotificationSink`](crate::notify::NotificationSink) implementations.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("draft field not set: {0}")]
    MissingDraftField(&'static str),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("presentation error: {0}")]
    Presentation(String),

    #[error("notification delivery failed: {0}")]
    Notification(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
