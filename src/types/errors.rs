use std::fmt;

/// Possible errors returned by methods on the keyed collections
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StoreError {
    /// A lookup or a remove was performed for a key that is not present in
    /// the collection. The collection is unchanged.
    NotFound,
    /// An insert was performed for a key that is already present in the
    /// collection. The collection is unchanged.
    AlreadyExists,
    /// A key or a construction parameter is outside the range the
    /// collection supports, e.g. a binary key whose bit offsets would not
    /// fit in a `usize`, or a hash table whose maximum directory cannot be
    /// addressed.
    InvalidKey,
    /// The allocator refused to hand out memory. Single-element operations
    /// leave the collection in its pre-call state; bulk operations leave it
    /// in a well-defined partial state that is safe to retry or to clear.
    OutOfMemory,
    /// A structural invariant does not hold. Produced by the
    /// `check_invariant` methods; indicates a bug in the collection or in
    /// an adapter, not a user error.
    InvariantViolated,
    /// An adapter's delete callback reported a failure during a bulk
    /// teardown. The collection has still been emptied completely.
    DeleteFailed,
}

impl std::error::Error for StoreError {}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StoreError::NotFound => {
                write!(f, "Error: The key cannot be found.")
            }
            StoreError::AlreadyExists => {
                write!(
                    f,
                    "Error: An element with the same key is already stored."
                )
            }
            StoreError::InvalidKey => {
                write!(
                    f,
                    "Error: The key or parameter is outside the supported \
                    range."
                )
            }
            StoreError::OutOfMemory => {
                write!(f, "Error: The allocator is out of memory.")
            }
            StoreError::InvariantViolated => {
                write!(
                    f,
                    "Error: A structural invariant of the collection does \
                    not hold."
                )
            }
            StoreError::DeleteFailed => {
                write!(
                    f,
                    "Error: An element could not be deleted. The collection \
                    has been emptied regardless."
                )
            }
        }
    }
}
