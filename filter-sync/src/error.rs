//! The filter-sync Error type, with its associated functions.
use thiserror::Error;

/// Custom Error type for filter-sync
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterSyncError {
    // For returning multiple errors at once, e.g. while resolving every column of a table
    #[error("Multiple errors: {0:?}")]
    MultipleErrors(Vec<FilterSyncError>),
    // Configuration errors
    #[error("Column {0} has a filter but neither an `id` nor an `accessorKey`")]
    MissingColumnId(String),
    #[error("A {variant} filter does not have a '{property}' property")]
    IllegalFilterProperty { variant: String, property: String },
    #[error("Invalid filter bound {bound}: {message}")]
    InvalidBound { bound: String, message: String },
    #[error("Could not parse configuration: {0}")]
    ConfigError(String),
    // Codec errors
    #[error("Could not encode value for key {key}: {message}")]
    CodecError { key: String, message: String },
    // `serde_json:Error`s are converted to Strings during error mapping because that Error type does not `impl Clone`
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    // Store access errors
    #[error("File I/O error: {0}")]
    IoError(String),
    #[error("Directory {0} not found")]
    PathNotFound(String),
}

/// Checks a Result to see if it is an Error. If it is, add that Error to a Vec of FilterSyncErrors
pub fn add_error<T>(errors: &mut Vec<FilterSyncError>, possible_error: Result<T, FilterSyncError>) {
    if let Err(error) = possible_error {
        errors.push(error)
    };
}

/// Return a Vec of FilterSyncErrors as a single Error, unless the Vec is empty
pub fn return_multiple_errors(errors: Vec<FilterSyncError>) -> Result<(), FilterSyncError> {
    if errors.is_empty() {
        return Ok(());
    }
    // If there is only one Error in the Vec, return it as itself
    if errors.len() == 1 {
        return Err(errors[0].clone());
    }
    Err(FilterSyncError::MultipleErrors(errors))
}
