//! DQL - Document Query Literals
//!
//! Parses the shell-style literal objects used to describe documents,
//! filters, projections, updates and schema descriptors.
//!
//! # Syntax Overview
//!
//! ```text
//! // Bare or quoted keys, trailing commas allowed
//! { sku: "P001", 'precio': 7500, stock: 20, }
//!
//! // Operators are plain keys
//! { precio: { $gt: 10000 } }
//!
//! // Dates and regular expressions
//! { creadoEn: ISODate("2025-03-01T10:00:00Z"), nombre: /^P/i }
//! { creadoEn: new Date() }
//! ```

mod ast;
mod error;
mod parser;

pub use ast::*;
pub use error::ParseError;

/// Parse a single literal
pub fn parse(input: &str) -> Result<Literal, ParseError> {
    parser::parse_literal(input)
}

/// Parse a literal that must be an object
pub fn parse_object(input: &str) -> Result<Vec<(String, Literal)>, ParseError> {
    match parse(input)? {
        Literal::Object(entries) => Ok(entries),
        other => Err(ParseError::new(format!("Expected an object, found {}", other.kind()))),
    }
}
