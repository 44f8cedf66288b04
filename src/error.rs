/// All errors that can occur in this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The secure random source could not supply entropy for a new session id.
    /// No session can safely be issued, so the request should fail.
    #[error("the secure random source failed to supply entropy for a session id")]
    RandomSourceUnavailable(#[source] rand::Error),

    /// A session was attempted to be created while the client already presented the cookie of a live session.
    /// The existing session is authoritative and should be fetched instead.
    #[error("the presented cookie already identifies a live session")]
    SessionAlreadyIssued,

    /// There is no live session for the given cookie value, or no cookie value was given at all.
    /// The caller should fall back to creating a new session.
    #[error("no session exists for the given cookie value")]
    SessionNotFound,

    /// A session was attempted to be saved after it was terminated.
    #[error("the session was terminated and cannot be saved anymore")]
    SessionTerminated,

    /// A session was attempted to be updated, but it does not exist in the store anymore.
    /// This happens if the session was terminated by a concurrent request after it was fetched.
    /// If you receive this error, revert everything that you did while handling the request that
    /// used this session.
    #[error("the session that was attempted to be updated does not exist, which indicates that it was concurrently deleted")]
    UpdatedSessionDoesNotExist,

    /// Tried as often as allowed to generate a session id, but all generated ids already exist.
    #[error("the maximum number of retries to generate a session id was reached")]
    MaximumSessionIdGenerationTriesReached {
        /// The maximum number of retries that was reached.
        maximum: u8,
    },

    /// A session value could not be converted from or into the requested type.
    #[error("failed to convert a session value: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An error occurred in the session store implementation.
    #[error(transparent)]
    SessionStoreConnector(#[from] anyhow::Error),
}
