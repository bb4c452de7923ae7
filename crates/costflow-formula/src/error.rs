//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula tokenizing, parsing or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Character the tokenizer does not accept
    #[error("Unsupported character '{found}' at position {position}")]
    Tokenize { position: usize, found: char },

    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Regular expression that does not compile
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

impl FormulaError {
    /// Whether this error came from tokenizing or parsing (as opposed to evaluation)
    pub fn is_syntax(&self) -> bool {
        matches!(self, FormulaError::Tokenize { .. } | FormulaError::Parse(_))
    }
}
