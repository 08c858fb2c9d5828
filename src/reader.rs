use crate::strings::{self, BuildError};
use crate::tokens::{tokenize, Token, TokenizerError};
use crate::types::{SchemeInt, Value};
use derive_more::Display;
use std::iter::Peekable;
use std::slice;

type Reader<'a> = Peekable<slice::Iter<'a, Token<'a>>>;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum ReadError {
    #[display(fmt = "{}", _0)]
    Tokenizer(TokenizerError),
    #[display(fmt = "bad string literal: {}", _0)]
    BadString(BuildError),
    #[display(fmt = "unexpected end of input")]
    UnexpectedEof,
    #[display(fmt = "unexpected ')'")]
    UnexpectedCloseParen,
    #[display(fmt = "unexpected '.'")]
    UnexpectedDot,
    #[display(fmt = "nothing to read")]
    NoForms,
}

impl From<TokenizerError> for ReadError {
    fn from(e: TokenizerError) -> Self {
        Self::Tokenizer(e)
    }
}

fn meaningful_tokens(input: &str) -> Result<Vec<Token>, ReadError> {
    let tokens = tokenize(input)?;
    Ok(tokens
        .into_iter()
        .filter(|token| !matches!(token, Token::Comment(_)))
        .collect())
}

/// Read the first form in `input`.
pub fn read_str(input: &str) -> Result<Value, ReadError> {
    let tokens = meaningful_tokens(input)?;
    let mut reader = tokens.iter().peekable();
    match reader.peek() {
        None => Err(ReadError::NoForms),
        Some(_) => read_form(&mut reader),
    }
}

/// Read every form in `input`, in order.
pub fn read_all(input: &str) -> Result<Vec<Value>, ReadError> {
    let tokens = meaningful_tokens(input)?;
    let mut reader = tokens.iter().peekable();
    let mut forms = Vec::new();
    while reader.peek().is_some() {
        forms.push(read_form(&mut reader)?);
    }
    Ok(forms)
}

fn read_form(reader: &mut Reader) -> Result<Value, ReadError> {
    match reader.next() {
        Some(Token::OpenParen) => read_list(reader),
        Some(Token::CloseParen) => Err(ReadError::UnexpectedCloseParen),
        Some(Token::Quote) => {
            let quoted = read_form(reader)?;
            Ok(Value::list(vec![Value::symbol("quote"), quoted]))
        }
        Some(Token::StringLiteral(payload)) => strings::build_string(payload)
            .map(Value::String)
            .map_err(ReadError::BadString),
        Some(Token::PlainChars(".")) => Err(ReadError::UnexpectedDot),
        Some(Token::PlainChars(chars)) => Ok(read_atom(chars)),
        Some(Token::Comment(_)) => read_form(reader),
        None => Err(ReadError::UnexpectedEof),
    }
}

// The opening paren has already been consumed.
fn read_list(reader: &mut Reader) -> Result<Value, ReadError> {
    let mut elements = Vec::new();
    loop {
        match reader.peek() {
            None => return Err(ReadError::UnexpectedEof),
            Some(Token::CloseParen) => {
                reader.next();
                return Ok(Value::list(elements));
            }
            Some(Token::PlainChars(".")) => {
                reader.next();
                if elements.is_empty() {
                    return Err(ReadError::UnexpectedDot);
                }
                let tail = read_form(reader)?;
                return match reader.next() {
                    Some(Token::CloseParen) => Ok(Value::improper_list(elements, tail)),
                    Some(_) => Err(ReadError::UnexpectedDot),
                    None => Err(ReadError::UnexpectedEof),
                };
            }
            Some(_) => elements.push(read_form(reader)?),
        }
    }
}

fn looks_numeric(chars: &str) -> bool {
    let unsigned = chars.trim_start_matches(|c: char| c == '+' || c == '-');
    let unsigned = unsigned.strip_prefix('.').unwrap_or(unsigned);
    unsigned.starts_with(|c: char| c.is_ascii_digit())
}

fn read_atom(chars: &str) -> Value {
    match chars {
        "#t" | "true" => return Value::Bool(true),
        "#f" | "false" => return Value::Bool(false),
        "nil" => return Value::Nil,
        _ => {}
    }
    if looks_numeric(chars) {
        if let Ok(x) = chars.parse::<SchemeInt>() {
            return Value::Integer(x);
        }
        if let Ok(x) = chars.parse::<f64>() {
            return Value::Float(x);
        }
    }
    Value::symbol(chars)
}
