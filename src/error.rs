use thiserror::Error;

/// Errors raised by block allocation, handle construction, and the
/// lock/unlock engines.
///
/// Every variant carries a stable string code (see [`Error::code`])
/// intended for programmatic branching; the `Display` text is for
/// humans and may change between releases, the code never does.
///
/// All failures are raised synchronously at the call that caused them.
/// CAS retry loops inside the engines are ordinary control flow and
/// are never surfaced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested mutex count was zero.
    ///
    /// A block must hold at least one slot.
    #[error("mutex count must be a positive integer")]
    InvalidCount,

    /// The requested mutex count would overflow the block's byte size.
    #[error("mutex count exceeds the maximum supported value")]
    CountExceedsMax,

    /// A raw byte image had a length that is not a multiple of the
    /// 4-byte cell size and cannot be reinterpreted as cells.
    #[error("byte length is not aligned to 32-bit cells")]
    MisalignedLength,

    /// The slot index does not fit inside the block.
    ///
    /// The whole 3-cell slot must lie within the block's cells.
    #[error("mutex index is out of range for the block")]
    IndexOutOfRange,

    /// `unlock` was called on a slot the current thread does not hold,
    /// or on a slot that is not locked at all.
    ///
    /// The slot state is left untouched.
    #[error("mutex is not owned by the current thread")]
    NotOwned,

    /// The recursion counter was zero (or negative when read as a
    /// signed value) where a positive depth was required.
    ///
    /// This is never produced by correct use of the API; it means the
    /// shared cells were tampered with from outside.
    #[error("mutex recursion count underflow")]
    RecursionUnderflow,

    /// The recursion counter reached its maximum depth and one more
    /// re-entrant acquisition would wrap it.
    #[error("mutex recursion count overflow")]
    RecursionOverflow,
}

impl Error {
    /// Returns the stable, machine-matchable code for this error.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// match mutex.unlock() {
    ///     Err(e) if e.code() == "MUTEX_IS_NOT_OWNED_BY_CURRENT_THREAD" => { /* ... */ }
    ///     other => other.unwrap(),
    /// }
    /// ```
    pub const fn code(&self) -> &'static str {
        match self {
            Error::InvalidCount => "COUNT_MUST_BE_A_POSITIVE_SAFE_INTEGER",
            Error::CountExceedsMax => "COUNT_EXCEEDS_MAX_SUPPORTED_VALUE",
            Error::MisalignedLength => "HANDLE_BYTE_LENGTH_IS_NOT_INT32_ALIGNED",
            Error::IndexOutOfRange => "MUTEX_INDEX_OUT_OF_RANGE",
            Error::NotOwned => "MUTEX_IS_NOT_OWNED_BY_CURRENT_THREAD",
            Error::RecursionUnderflow => "MUTEX_RECURSION_COUNT_UNDERFLOW",
            Error::RecursionOverflow => "MUTEX_RECURSION_COUNT_OVERFLOW",
        }
    }
}
