use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Input PCM that cannot be analyzed: empty, too short, wrong sample
    /// rate, or carrying non-finite samples.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A file could not be decoded. Non-fatal for source chunks (the
    /// harness skips them), fatal for the clip.
    #[error("decode error: {0}")]
    Decode(String),

    /// Nonsensical tunables, rejected when the matcher is built.
    #[error("invalid config: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The external ffmpeg binary is missing or exited nonzero.
    #[error("ffmpeg: {0}")]
    Tool(String),
}

pub type Result<T> = std::result::Result<T, Error>;
