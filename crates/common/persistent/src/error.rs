use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistentError {
    #[error("index {index} is out of bounds for length {length}")]
    OutOfBounds { index: usize, length: usize },
    #[error("list is full (limit {limit})")]
    Full { limit: usize },
    #[error("{actual} elements exceed the limit of {limit}")]
    TooLong { actual: usize, limit: usize },
    #[error("expected exactly {expected} elements, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
