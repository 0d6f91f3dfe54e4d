//! DQL Parser using nom
//!
//! Parses shell-style literal text into [`Literal`] trees.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{
        anychar, char, digit1, multispace1, none_of, not_line_ending, one_of, satisfy,
    },
    combinator::{map, map_res, not, opt, recognize, value},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
};

use crate::ast::*;
use crate::error::ParseError;

/// Parse a complete literal
pub fn parse_literal(input: &str) -> Result<Literal, ParseError> {
    let (remaining, lit) = match delimited(ws, literal, ws)(input) {
        Ok(parsed) => parsed,
        Err(err) => {
            let position = match &err {
                nom::Err::Error(e) | nom::Err::Failure(e) => Some(input.len() - e.input.len()),
                nom::Err::Incomplete(_) => None,
            };
            let error = ParseError::from(err);
            return Err(match position {
                Some(pos) => error.with_position(pos),
                None => error,
            });
        }
    };

    // Check for trailing content (ignoring whitespace and semicolons)
    let remaining = remaining.trim().trim_end_matches(';').trim();
    if !remaining.is_empty() {
        return Err(ParseError::new(format!("Unexpected trailing content: {}", remaining))
            .with_position(input.len() - remaining.len()));
    }

    Ok(lit)
}

// ============================================================================
// Whitespace
// ============================================================================

fn ws(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((multispace1, line_comment))))(input)
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("//"), not_line_ending))(input)
}

fn comma(input: &str) -> IResult<&str, ()> {
    value((), tuple((ws, char(','), ws)))(input)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(satisfy(is_ident_char)))
}

// ============================================================================
// Literals
// ============================================================================

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        value(Literal::Null, keyword("null")),
        value(Literal::Bool(true), keyword("true")),
        value(Literal::Bool(false), keyword("false")),
        map(date_literal, Literal::Date),
        number_literal,
        map(string_literal, Literal::String),
        regex_literal,
        map(array_literal, Literal::Array),
        map(object_literal, Literal::Object),
    ))(input)
}

fn number_literal(input: &str) -> IResult<&str, Literal> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |text: &str| -> Result<Literal, std::num::ParseFloatError> {
            let is_float = text.contains(|c: char| matches!(c, '.' | 'e' | 'E'));
            if !is_float {
                // Integers that overflow i64 degrade to doubles
                if let Ok(i) = text.parse::<i64>() {
                    return Ok(Literal::Int(i));
                }
            }
            text.parse::<f64>().map(Literal::Float)
        },
    )(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        delimited(
            char('\''),
            map(
                many0(alt((
                    map(tag("\\'"), |_| "'".to_string()),
                    escape_sequence,
                    map(none_of("'\\"), |c| c.to_string()),
                ))),
                |v| v.join(""),
            ),
            char('\''),
        ),
        delimited(
            char('"'),
            map(
                many0(alt((
                    map(tag("\\\""), |_| "\"".to_string()),
                    escape_sequence,
                    map(none_of("\"\\"), |c| c.to_string()),
                ))),
                |v| v.join(""),
            ),
            char('"'),
        ),
    ))(input)
}

fn escape_sequence(input: &str) -> IResult<&str, String> {
    alt((
        map(tag("\\n"), |_| "\n".to_string()),
        map(tag("\\t"), |_| "\t".to_string()),
        map(tag("\\r"), |_| "\r".to_string()),
        map(tag("\\/"), |_| "/".to_string()),
        map(tag("\\\\"), |_| "\\".to_string()),
        // Unknown escapes keep the escaped character
        map(preceded(char('\\'), anychar), |c| c.to_string()),
    ))(input)
}

fn regex_literal(input: &str) -> IResult<&str, Literal> {
    let (input, _) = char('/')(input)?;
    let (input, pattern) = recognize(many1(alt((
        recognize(pair(char('\\'), anychar)),
        recognize(none_of("/\\\n")),
    ))))(input)?;
    let (input, _) = char('/')(input)?;
    let (input, flags) = take_while(|c: char| c.is_ascii_alphabetic())(input)?;

    Ok((input, Literal::Regex {
        pattern: pattern.to_string(),
        flags: flags.to_string(),
    }))
}

fn date_literal(input: &str) -> IResult<&str, DateTime<Utc>> {
    alt((
        preceded(tag("ISODate"), date_arguments),
        preceded(tuple((tag("new"), multispace1, tag("Date"))), date_arguments),
    ))(input)
}

fn date_arguments(input: &str) -> IResult<&str, DateTime<Utc>> {
    delimited(
        pair(char('('), ws),
        map_res(opt(string_literal), |text: Option<String>| match text {
            Some(text) => parse_datetime(&text),
            None => Ok(Utc::now()),
        }),
        pair(ws, char(')')),
    )(input)
}

/// Accepts RFC 3339, a zone-less `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC),
/// or a bare `YYYY-MM-DD` (midnight UTC).
fn parse_datetime(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = match NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => naive,
        Err(_) => NaiveDateTime::parse_from_str(&format!("{}T00:00:00", text), "%Y-%m-%dT%H:%M:%S")?,
    };
    Ok(Utc.from_utc_datetime(&naive))
}

fn array_literal(input: &str) -> IResult<&str, Vec<Literal>> {
    delimited(
        pair(char('['), ws),
        terminated(separated_list0(comma, literal), opt(comma)),
        pair(ws, char(']')),
    )(input)
}

fn object_literal(input: &str) -> IResult<&str, Vec<(String, Literal)>> {
    delimited(
        pair(char('{'), ws),
        terminated(separated_list0(comma, object_entry), opt(comma)),
        pair(ws, char('}')),
    )(input)
}

fn object_entry(input: &str) -> IResult<&str, (String, Literal)> {
    separated_pair(object_key, tuple((ws, char(':'), ws)), literal)(input)
}

fn object_key(input: &str) -> IResult<&str, String> {
    alt((
        string_literal,
        map(take_while1(|c: char| is_ident_char(c) || c == '.'), String::from),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse_literal("null").unwrap(), Literal::Null);
        assert_eq!(parse_literal("true").unwrap(), Literal::Bool(true));
        assert_eq!(parse_literal("-42").unwrap(), Literal::Int(-42));
        assert_eq!(parse_literal("2.5").unwrap(), Literal::Float(2.5));
        assert_eq!(parse_literal("1e3").unwrap(), Literal::Float(1000.0));
        assert_eq!(parse_literal("'it\\'s'").unwrap(), Literal::String("it's".into()));
    }

    #[test]
    fn test_parse_escaped_quote() {
        let lit = parse_literal(r#"{nombre: "Llave Inglesa 10\""}"#).unwrap();
        assert_eq!(lit.get("nombre"), Some(&Literal::String("Llave Inglesa 10\"".into())));
    }

    #[test]
    fn test_parse_bare_and_quoted_keys() {
        let lit = parse_literal(r#"{sku: "P001", 'precio': 7500, "proveedor.nombre": 'X', $gt: 1}"#).unwrap();
        let entries = lit.as_object().unwrap();
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["sku", "precio", "proveedor.nombre", "$gt"]);
    }

    #[test]
    fn test_parse_iso_date() {
        let lit = parse_literal(r#"ISODate("2025-03-01T10:00:00Z")"#).unwrap();
        match lit {
            Literal::Date(dt) => assert_eq!(dt.to_rfc3339(), "2025-03-01T10:00:00+00:00"),
            other => panic!("Expected Date, got {:?}", other),
        }
        assert!(matches!(parse_literal("new Date()").unwrap(), Literal::Date(_)));
        assert!(matches!(parse_literal("new Date('2025-03-02')").unwrap(), Literal::Date(_)));
        assert!(parse_literal(r#"ISODate("not a date")"#).is_err());
    }

    #[test]
    fn test_parse_regex() {
        let lit = parse_literal(r"{nombre: {$regex: /^P/i}, sku: /^P\d{3,5}$/}").unwrap();
        assert_eq!(
            lit.get("nombre").and_then(|n| n.get("$regex")),
            Some(&Literal::Regex { pattern: "^P".into(), flags: "i".into() })
        );
        assert_eq!(
            lit.get("sku"),
            Some(&Literal::Regex { pattern: r"^P\d{3,5}$".into(), flags: String::new() })
        );
    }

    #[test]
    fn test_trailing_commas_and_comments() {
        let lit = parse_literal(
            "{\n  // first tag\n  tags: [\"a\", \"b\",],\n  stock: 20,\n}",
        )
        .unwrap();
        assert_eq!(lit.get("tags").and_then(|t| t.as_array()).map(|t| t.len()), Some(2));
    }

    #[test]
    fn test_trailing_content_rejected() {
        let err = parse_literal("{a: 1} {b: 2}").unwrap_err();
        assert_eq!(err.position, Some(7));
    }
}
