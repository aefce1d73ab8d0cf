use thiserror::Error;

use crate::loc::Position;

pub type ParseResult<T> = std::result::Result<T, ParseError>;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected `{found}` at {position}, expected {expected}")]
    UnexpectedToken { found: String, expected: String, position: Position },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },
    #[error("invalid token `{text}` at {position}")]
    InvalidToken { text: String, position: Position },
    #[error("invalid assignment target at {position}")]
    InvalidAssignmentTarget { position: Position },
    #[error("invalid number literal `{text}` at {position}")]
    InvalidNumber { text: String, position: Position },
}
