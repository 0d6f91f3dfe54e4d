//! Error types for DQL parsing

use thiserror::Error;

/// Error that occurred during parsing
#[derive(Debug, Clone, Error)]
#[error("Parse error: {message}{}", location_suffix(.position))]
pub struct ParseError {
    pub message: String,
    pub position: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }

    pub fn with_position(mut self, pos: usize) -> Self {
        self.position = Some(pos);
        self
    }
}

fn location_suffix(position: &Option<usize>) -> String {
    match position {
        Some(pos) => format!(" at position {}", pos),
        None => String::new(),
    }
}

impl From<nom::Err<nom::error::Error<&str>>> for ParseError {
    fn from(err: nom::Err<nom::error::Error<&str>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => ParseError::new("Incomplete input"),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                ParseError::new(format!("unexpected input near {:?}", e.input.chars().take(20).collect::<String>()))
            }
        }
    }
}
