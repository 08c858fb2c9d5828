#[macro_use]
extern crate lazy_static;

pub mod cmdline;
pub mod core;
pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod printer;
pub mod reader;
pub mod special_forms;
pub mod types;

mod strings;
mod tokens;

pub use environment::Frame;
pub use evaluator::{Evaluator, Outcome, Unevaluated};
pub use interpreter::Interpreter;
pub use types::{Procedure, Value};
