use derive_more::Display;
use regex::Regex;

#[derive(Debug, PartialEq, Eq)]
pub enum Token<'a> {
    OpenParen,
    CloseParen,
    Quote,
    /// Contents between the quotes, escapes still encoded.
    StringLiteral(&'a str),
    Comment(&'a str),
    PlainChars(&'a str),
}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum TokenizerError {
    #[display(fmt = "tokenizer failed: unbalanced string literal")]
    UnbalancedString,
    #[display(fmt = "tokenizer failed: no token at {:?}", _0)]
    NoCapture(String),
}

fn create_token(captured: &str) -> Result<Token, TokenizerError> {
    match captured.as_bytes()[0] {
        b'(' => Ok(Token::OpenParen),
        b')' => Ok(Token::CloseParen),
        b'\'' => Ok(Token::Quote),
        b'"' => tokenize_string_literal(captured),
        // ; is ASCII, so slicing past it stays on a char boundary.
        b';' => Ok(Token::Comment(&captured[1..])),
        _ => Ok(Token::PlainChars(captured)),
    }
}

fn tokenize_string_literal(captured: &str) -> Result<Token, TokenizerError> {
    let bytes = captured.as_bytes();
    if bytes.len() == 1 || bytes[bytes.len() - 1] != b'"' {
        return Err(TokenizerError::UnbalancedString);
    }

    // An odd run of backslashes before the final quote escapes it.
    let trailing_backslashes = bytes
        .iter()
        .rev()
        .skip(1)
        .take_while(|&&byte| byte == b'\\')
        .count();
    if trailing_backslashes % 2 == 1 {
        return Err(TokenizerError::UnbalancedString);
    }

    Ok(Token::StringLiteral(&captured[1..captured.len() - 1]))
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, TokenizerError> {
    lazy_static! {
        static ref TOKEN_RE: Regex = Regex::new(
            r#"(?x)                         # ignore whitespace in this pattern & allow comments
                ^\s*                        # leading whitespace, ignored
                (                           # token capture group
                    [()']                   # single special characters
                    |"(?:                   # string literal. its contents, not captured, include:
                        \\.                 #    escapes
                        |[^\\"]             #    anything which isn't a backslash or a quote
                      )*
                      "?                    #    possibly missing a closing quote
                    |;.*                    # comments, to the end of the line
                    |[^\s()'";]*            # zero or more plain characters
                )
                \s*                         # trailing whitespace, ignored
            "#
        )
        .expect("token regex is valid");
    }
    let mut input = input;
    let mut tokens = Vec::new();
    while !input.is_empty() {
        let caps = TOKEN_RE
            .captures(input)
            .ok_or_else(|| TokenizerError::NoCapture(input.to_string()))?;
        let (whole, token) = match (caps.get(0), caps.get(1)) {
            (Some(whole), Some(token)) => (whole, token),
            _ => return Err(TokenizerError::NoCapture(input.to_string())),
        };
        if !token.as_str().is_empty() {
            tokens.push(create_token(token.as_str())?);
        }
        if whole.end() == 0 {
            return Err(TokenizerError::NoCapture(input.to_string()));
        }
        input = &input[whole.end()..];
    }
    Ok(tokens)
}
