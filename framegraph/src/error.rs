//! Frame graph error types.

use std::fmt;

use crate::backend::DeviceError;

/// Errors that can occur while building, compiling or executing a frame graph.
///
/// Capacity violations are not represented here: exceeding a configured limit
/// is a static configuration mismatch and panics instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameGraphError {
    /// The configuration passed to the graph is unusable.
    InvalidConfig(String),
    /// The device failed to create a GPU resource.
    ResourceCreationFailed(DeviceError),
    /// The device failed to create a resource view.
    ViewCreationFailed(DeviceError),
    /// The device failed to create a command list.
    CommandListCreationFailed(DeviceError),
    /// A command list could not be reset or closed.
    RecordingFailed {
        pass: String,
        error: DeviceError,
    },
    /// Work could not be handed to a queue.
    SubmissionFailed(DeviceError),
}

impl fmt::Display for FrameGraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid frame graph config: {msg}"),
            Self::ResourceCreationFailed(err) => write!(f, "resource creation failed: {err}"),
            Self::ViewCreationFailed(err) => write!(f, "view creation failed: {err}"),
            Self::CommandListCreationFailed(err) => {
                write!(f, "command list creation failed: {err}")
            }
            Self::RecordingFailed { pass, error } => {
                write!(f, "recording pass '{pass}' failed: {error}")
            }
            Self::SubmissionFailed(err) => write!(f, "submission failed: {err}"),
        }
    }
}

impl std::error::Error for FrameGraphError {}
