use crate::environment::{self, Frame};
use crate::evaluator::{self, Evaluator};
use crate::reader;
use crate::types::Value;
use derive_more::Display;
use std::path::Path;
use std::rc::Rc;

const PRELUDE: &str = r#"
(define (map f xs)
  (if (null? xs)
      nil
      (cons (f (car xs)) (map f (cdr xs)))))

(define (filter keep? xs)
  (cond ((null? xs) nil)
        ((keep? (car xs)) (cons (car xs) (filter keep? (cdr xs))))
        (else (filter keep? (cdr xs)))))

(define (reduce combine xs initial)
  (if (null? xs)
      initial
      (reduce combine (cdr xs) (combine initial (car xs)))))
"#;

pub type Result<T = Value> = std::result::Result<T, Error>;

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "read error: {}", _0)]
    Read(reader::ReadError),
    #[display(fmt = "{}", _0)]
    Eval(evaluator::Error),
    #[display(fmt = "IO error: {}", _0)]
    Io(std::io::Error),
}

impl std::error::Error for Error {}

impl From<reader::ReadError> for Error {
    fn from(e: reader::ReadError) -> Self {
        Error::Read(e)
    }
}

impl From<evaluator::Error> for Error {
    fn from(e: evaluator::Error) -> Self {
        Error::Eval(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// An evaluator paired with the global frame it evaluates in.
pub struct Interpreter {
    evaluator: Evaluator,
    global: Rc<Frame>,
}

impl Interpreter {
    pub fn new(tail_calls: bool) -> Result<Self> {
        let evaluator = match tail_calls {
            true => Evaluator::default(),
            false => Evaluator::default().without_tail_calls(),
        };
        let interpreter = Self {
            evaluator,
            global: environment::global_frame(),
        };
        interpreter.eval_str(PRELUDE)?;
        Ok(interpreter)
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn global_frame(&self) -> &Rc<Frame> {
        &self.global
    }

    /// Evaluate every form in `source`; the value of the last one is returned.
    pub fn eval_str(&self, source: &str) -> Result {
        let forms = reader::read_all(source)?;
        let sequence = Value::list(forms);
        Ok(self.evaluator.evaluate_sequence(&sequence, &self.global)?)
    }

    /// Read, evaluate and print. Unspecified results print as nothing.
    pub fn rep(&self, line: &str) -> Result<String> {
        match self.eval_str(line)? {
            Value::Unspecified => Ok(String::new()),
            value => Ok(value.to_string()),
        }
    }

    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result {
        let path = path.as_ref();
        log::info!("loading {}", path.display());
        let source = std::fs::read_to_string(path)?;
        self.eval_str(&source)
    }
}
