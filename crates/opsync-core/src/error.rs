/// Errors produced at the fetch/stream boundary with the orchestrator.
///
/// Store-internal methods never fail for well-typed input; everything that
/// can go wrong involves the network, and it all funnels through this type.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The push stream ended without the server reporting an error.
    #[error("stream closed by server")]
    StreamClosed,
}
