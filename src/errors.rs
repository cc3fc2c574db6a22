use thiserror::Error;

/// Command timeouts are deliberately not represented here: a late or missing
/// acknowledgement is the `acknowledged = false` branch of
/// [crate::device::CommandResult] and only downgrades to a warning.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port could not be opened: fatal, nothing to capture.
    #[error("failed to open {port}: {source}")]
    ChannelOpen {
        port: String,
        source: serialport::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The log contained no valid GGA sentence at all.
    #[error("no valid GGA sentences found in log")]
    NoObservations,

    /// Observations exist but none passes the quality filter.
    #[error("no fixes pass the quality filter (fix quality > 0, coordinate present)")]
    NoValidFixes,

    #[error("invalid clock time \"{0}\": expected 6 digits (HHMMSS)")]
    InvalidClockTime(String),
}
