use crate::strings;
use crate::types::{Procedure, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintMode {
    /// Strings quoted and escaped, so the reader can read them back.
    ReadableRepresentation,
    /// Strings verbatim, as `display` shows them.
    Directly,
}

pub fn pr_str(obj: &Value, mode: PrintMode) -> String {
    match obj {
        Value::Nil => "()".into(),
        Value::Unspecified => "#!unspecified".into(),
        Value::Bool(true) => "#t".into(),
        Value::Bool(false) => "#f".into(),
        Value::Integer(x) => x.to_string(),
        Value::Float(x) => format!("{:?}", x),
        Value::String(s) => match mode {
            PrintMode::ReadableRepresentation => strings::string_repr(s),
            PrintMode::Directly => s.clone(),
        },
        Value::Symbol(s) => s.0.clone(),
        Value::Pair(_) => list_str(obj, mode),
        Value::Procedure(p) => p.to_string(),
        Value::Frame(frame) => frame.to_string(),
    }
}

fn list_str(obj: &Value, mode: PrintMode) -> String {
    let mut elements = obj.iter();
    let mut output = String::from("(");
    for (i, element) in elements.by_ref().enumerate() {
        if i > 0 {
            output.push(' ');
        }
        output.push_str(&pr_str(&element, mode));
    }
    let tail = elements.remainder();
    if elements.is_cyclic() {
        output.push_str(" ...");
    } else if !tail.is_nil() {
        output.push_str(" . ");
        output.push_str(&pr_str(tail, mode));
    }
    output.push(')');
    output
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pr_str(self, PrintMode::ReadableRepresentation))
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#[{}]", self.name())
    }
}
