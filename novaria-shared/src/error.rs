use thiserror::Error;

/// Crate-wide error type. Only [`SimError::NotInitialized`] and a rejected module set (see the
/// script host) are surfaced through public `Result` returns; every other variant is produced
/// locally, absorbed into a diagnostics counter, and logged — it never unwinds the kernel.
#[derive(Debug, Error)]
pub enum SimError {
	#[error("operation attempted before initialization")]
	NotInitialized,

	#[error("envelope failed validation")]
	InvalidEnvelope,

	#[error("command payload failed validation")]
	InvalidCommandPayload,

	#[error("pending queue is at capacity")]
	QueueFull,

	#[error("script call failed: {0}")]
	ScriptCallFailure(String),

	#[error("transport I/O error: {0}")]
	TransportIo(#[from] std::io::Error),

	#[error("chunk not found at ({0}, {1})")]
	ChunkNotFound(i32, i32),

	#[error("script module set rejected: {0}")]
	ConfigMismatch(String),

	#[error("configuration error: {0}")]
	Config(String),
}
