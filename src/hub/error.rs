use super::codec::CodecError;

/// A rejected hub operation.
///
/// The `Display` text of each variant is exactly the body of the
/// `System: ...` line members see when the rejection is announced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("name is empty or already taken")]
    DuplicateOrEmptyName,

    #[error("Only coordinators are allowed to do that")]
    Unauthorized,

    #[error("Invalid input, name not found")]
    TargetNotFound,

    #[error("Invalid input, name not found")]
    RecipientNotFound,

    #[error("Invalid input, the name not found in coordinator list")]
    NotCoordinator,

    #[error("Invalid request, voting already in process")]
    AlreadyInProgress,

    #[error("Invalid request, there is no voting process")]
    NoActiveVote,

    #[error("Invalid request, you have already voted")]
    AlreadyVoted,
}

/// Failure of one connection. Never leaves the task that owns it.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Codec(#[from] CodecError),
}
