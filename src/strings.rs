// Scheme string literals know four escapes: \\, \", \n and \t. The reader
// and the printer share one table so that they stay mutually inverse.

use bimap::BiMap;
use derive_more::Display;

lazy_static! {
    static ref ESCAPES: BiMap<char, char> = {
        let mut m = BiMap::new();
        m.insert('\\', '\\');
        m.insert('"', '"');
        m.insert('n', '\n');
        m.insert('t', '\t');
        m
    };
}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[display(fmt = "unknown escape \\{}", _0)]
    UnknownEscape(char),
    #[display(fmt = "string ends with a lone backslash")]
    UnexpectedSingleBackslash,
}

/// Contents of a literal (without its quotes) to the string it denotes.
pub(crate) fn build_string(src: &str) -> Result<String, BuildError> {
    let mut output = String::with_capacity(src.len());
    let mut chars = src.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        let escaped = chars.next().ok_or(BuildError::UnexpectedSingleBackslash)?;
        let unescaped = ESCAPES
            .get_by_left(&escaped)
            .ok_or(BuildError::UnknownEscape(escaped))?;
        output.push(*unescaped);
    }
    Ok(output)
}

/// A string as a readable, quoted literal.
pub(crate) fn string_repr(src: &str) -> String {
    let mut output = String::with_capacity(src.len() + 2);
    output.push('"');
    for c in src.chars() {
        match ESCAPES.get_by_right(&c) {
            Some(&letter) => {
                output.push('\\');
                output.push(letter);
            }
            None => output.push(c),
        }
    }
    output.push('"');
    output
}
