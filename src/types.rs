use crate::environment::Frame;
use crate::evaluator::{self, Evaluator};
use derive_more::{Deref, Display};
use std::cell::RefCell;
use std::fmt;
use std::ops::{RangeFrom, RangeInclusive};
use std::rc::Rc;

pub type SchemeInt = i64;

#[derive(Deref, Display, Debug, PartialEq, Eq, Hash, Clone)]
pub struct SchemeSymbol(pub String);

impl AsRef<str> for SchemeSymbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SchemeSymbol {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arity {
    Between(RangeInclusive<usize>),
    AtLeast(RangeFrom<usize>),
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self::Between(n..=n)
    }

    pub const fn at_least(n: usize) -> Self {
        Self::AtLeast(n..)
    }

    pub fn contains(&self, n: usize) -> bool {
        match self {
            Self::Between(range) => range.contains(&n),
            Self::AtLeast(range) => range.contains(&n),
        }
    }

    pub fn validate_for(&self, n: usize, name: &str) -> Result<(), BadArgCount> {
        match self.contains(n) {
            true => Ok(()),
            false => Err(BadArgCount::new(name, self.clone(), n)),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Between(r) => {
                if r.start() == r.end() {
                    write!(f, "exactly {}", r.start())
                } else {
                    write!(f, "from {} to {}", r.start(), r.end())
                }
            }
            Arity::AtLeast(r) => write!(f, "at least {}", r.start),
        }
    }
}

/// The `ArityError` of the evaluator: a procedure received the wrong number
/// of arguments.
#[derive(Debug, Display, Clone, PartialEq)]
#[display(
    fmt = "incorrect number of arguments to {}: expected {}, got {}",
    name,
    expected,
    got
)]
pub struct BadArgCount {
    pub name: String,
    pub expected: Arity,
    pub got: usize,
}

impl BadArgCount {
    pub fn new(name: &str, expected: Arity, got: usize) -> Self {
        Self {
            name: name.to_string(),
            expected,
            got,
        }
    }
}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum TypeMismatch {
    #[display(fmt = "expected a number, got {}", _0)]
    NotANumber(String),
    #[display(fmt = "expected an integer, got {}", _0)]
    NotAnInteger(String),
    #[display(fmt = "expected a pair, got {}", _0)]
    NotAPair(String),
    #[display(fmt = "expected a list, got {}", _0)]
    NotAList(String),
    #[display(fmt = "expected a procedure, got {}", _0)]
    NotAProcedure(String),
    #[display(fmt = "expected an environment, got {}", _0)]
    NotAFrame(String),
}

pub type BuiltinFn = fn(&[Value], &Evaluator) -> evaluator::Result;

/// A natively implemented procedure. `arity` describes the arguments the
/// caller writes; when `needs_env` is set the calling frame is appended as
/// one extra, final argument.
pub struct BuiltinProcedure {
    pub name: &'static str,
    pub arity: Arity,
    pub needs_env: bool,
    pub fn_ptr: BuiltinFn,
}

impl fmt::Debug for BuiltinProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "builtin procedure #<{}>", self.name)
    }
}

pub struct LambdaProcedure {
    pub name: String,
    pub formals: Vec<SchemeSymbol>,
    pub body: Value,
    pub env: Rc<Frame>,
}

impl fmt::Debug for LambdaProcedure {
    // Skip the env: it may well contain this procedure.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LambdaProcedure{{name: {:?}, formals: {:?}, body: {:?}}}",
            self.name, self.formals, self.body
        )
    }
}

/// A dynamically scoped procedure: free variables in the body resolve in the
/// frame of whoever calls it.
#[derive(Debug)]
pub struct MuProcedure {
    pub name: String,
    pub formals: Vec<SchemeSymbol>,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub enum Procedure {
    Builtin(&'static BuiltinProcedure),
    Lambda(Rc<LambdaProcedure>),
    Mu(Rc<MuProcedure>),
}

impl Procedure {
    pub fn name(&self) -> &str {
        match self {
            Procedure::Builtin(builtin) => builtin.name,
            Procedure::Lambda(lambda) => &lambda.name,
            Procedure::Mu(mu) => &mu.name,
        }
    }

    fn same_as(&self, other: &Procedure) -> bool {
        match (self, other) {
            (Procedure::Builtin(x), Procedure::Builtin(y)) => std::ptr::eq(*x, *y),
            (Procedure::Lambda(x), Procedure::Lambda(y)) => Rc::ptr_eq(x, y),
            (Procedure::Mu(x), Procedure::Mu(y)) => Rc::ptr_eq(x, y),
            _ => false,
        }
    }
}

/// A list cell. Both halves can be replaced in place (`set-car!`,
/// `set-cdr!`); the evaluator itself never does so.
#[derive(Debug)]
pub struct Pair {
    first: RefCell<Value>,
    rest: RefCell<Value>,
}

impl Pair {
    pub fn first(&self) -> Value {
        self.first.borrow().clone()
    }

    pub fn rest(&self) -> Value {
        self.rest.borrow().clone()
    }

    pub fn set_first(&self, value: Value) {
        self.first.replace(value);
    }

    pub fn set_rest(&self, value: Value) {
        self.rest.replace(value);
    }
}

impl Drop for Pair {
    // Lists nest through both halves, so unlink everything through a work list
    // rather than letting the fields drop recursively.
    fn drop(&mut self) {
        let mut pending = vec![
            std::mem::replace(self.first.get_mut(), Value::Nil),
            std::mem::replace(self.rest.get_mut(), Value::Nil),
        ];
        while let Some(value) = pending.pop() {
            if let Value::Pair(pair) = value {
                if let Ok(mut pair) = Rc::try_unwrap(pair) {
                    pending.push(std::mem::replace(pair.first.get_mut(), Value::Nil));
                    pending.push(std::mem::replace(pair.rest.get_mut(), Value::Nil));
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    /// The empty list.
    Nil,
    /// What a form returns when it has nothing to return.
    Unspecified,
    Bool(bool),
    Integer(SchemeInt),
    Float(f64),
    String(String),
    Symbol(SchemeSymbol),
    Pair(Rc<Pair>),
    Procedure(Procedure),
    Frame(Rc<Frame>),
}

/// Walks the spine of a list. A cyclic spine is detected (tortoise and hare)
/// and ends the walk with the cycle left in `remainder`.
pub struct ListIter {
    cursor: Value,
    tortoise: Value,
    steps: usize,
    cyclic: bool,
}

impl ListIter {
    /// Whatever ended the walk: `Nil` for a proper list.
    pub fn remainder(&self) -> &Value {
        &self.cursor
    }

    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }
}

impl Iterator for ListIter {
    type Item = Value;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cyclic {
            return None;
        }
        let (first, rest) = match &self.cursor {
            Value::Pair(pair) => (pair.first(), pair.rest()),
            _ => return None,
        };
        self.cursor = rest;
        self.steps += 1;
        if self.steps % 2 == 0 {
            if let Value::Pair(slow) = &self.tortoise {
                let next = slow.rest();
                self.tortoise = next;
            }
        }
        if let (Value::Pair(fast), Value::Pair(slow)) = (&self.cursor, &self.tortoise) {
            self.cyclic = Rc::ptr_eq(fast, slow);
        }
        Some(first)
    }
}

impl Value {
    pub fn symbol(name: &str) -> Self {
        Self::Symbol(name.into())
    }

    pub fn cons(first: Value, rest: Value) -> Self {
        Self::Pair(Rc::new(Pair {
            first: RefCell::new(first),
            rest: RefCell::new(rest),
        }))
    }

    pub fn list(elements: Vec<Value>) -> Self {
        Self::improper_list(elements, Value::Nil)
    }

    pub fn improper_list(elements: Vec<Value>, tail: Value) -> Self {
        elements
            .into_iter()
            .rev()
            .fold(tail, |rest, first| Value::cons(first, rest))
    }

    pub fn iter(&self) -> ListIter {
        ListIter {
            cursor: self.clone(),
            tortoise: self.clone(),
            steps: 0,
            cyclic: false,
        }
    }

    /// Elements of a proper list, or `None` if the spine is cyclic or ends in
    /// anything other than `Nil`.
    pub fn list_to_vec(&self) -> Option<Vec<Value>> {
        let mut iter = self.iter();
        let elements: Vec<Value> = iter.by_ref().collect();
        match iter.remainder() {
            Value::Nil => Some(elements),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        let mut iter = self.iter();
        iter.by_ref().for_each(drop);
        iter.remainder().is_nil()
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, Value::Procedure(_))
    }

    /// Anything but a symbol or a combination evaluates to itself.
    pub fn is_self_evaluating(&self) -> bool {
        !matches!(self, Value::Symbol(_) | Value::Pair(_))
    }

    /// Only `#f` is false.
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn as_symbol(&self) -> Option<&SchemeSymbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Result<&Rc<Pair>, TypeMismatch> {
        match self {
            Value::Pair(pair) => Ok(pair),
            _ => Err(TypeMismatch::NotAPair(self.to_string())),
        }
    }

    pub fn as_int(&self) -> Result<SchemeInt, TypeMismatch> {
        match self {
            Value::Integer(x) => Ok(*x),
            _ => Err(TypeMismatch::NotAnInteger(self.to_string())),
        }
    }

    pub fn as_frame(&self) -> Result<&Rc<Frame>, TypeMismatch> {
        match self {
            Value::Frame(frame) => Ok(frame),
            _ => Err(TypeMismatch::NotAFrame(self.to_string())),
        }
    }

    /// Identity as `eq?` sees it: atoms by value, everything else by address.
    pub fn is_eqv(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Pair(x), Pair(y)) => Rc::ptr_eq(x, y),
            (Frame(x), Frame(y)) => Rc::ptr_eq(x, y),
            (Procedure(x), Procedure(y)) => x.same_as(y),
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    // Structural equality, as `equal?` sees it.
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        let (mut x, mut y) = (self.clone(), other.clone());
        loop {
            let (rest_x, rest_y) = match (&x, &y) {
                (Pair(px), Pair(py)) => {
                    if Rc::ptr_eq(px, py) {
                        return true;
                    }
                    if px.first() != py.first() {
                        return false;
                    }
                    (px.rest(), py.rest())
                }
                (Nil, Nil) | (Unspecified, Unspecified) => return true,
                (Bool(a), Bool(b)) => return a == b,
                (Integer(a), Integer(b)) => return a == b,
                (Float(a), Float(b)) => return a == b,
                (String(a), String(b)) => return a == b,
                (Symbol(a), Symbol(b)) => return a == b,
                (Procedure(a), Procedure(b)) => return a.same_as(b),
                (Frame(a), Frame(b)) => return Rc::ptr_eq(a, b),
                _ => return false,
            };
            x = rest_x;
            y = rest_y;
        }
    }
}
