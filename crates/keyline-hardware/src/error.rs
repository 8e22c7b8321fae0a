//! Error types for hardware operations.

/// Errors that can occur while driving a key or sounder.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The device is gone (unplugged, port closed).
    #[error("device disconnected: {device}")]
    Disconnected { device: String },

    /// Talking to the device failed.
    #[error("communication error: {message}")]
    Communication { message: String },

    /// The device refused the operation.
    #[error("drive failed: {message}")]
    DriveFailed { message: String },
}
