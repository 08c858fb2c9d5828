use crate::environment::{ArityMismatch, Frame, UnknownSymbol};
use crate::special_forms::{FormError, SpecialForms};
use crate::types::{Arity, BadArgCount, Procedure, SchemeSymbol, TypeMismatch, Value};
use derive_more::Display;
use itertools::Itertools;
use std::rc::Rc;

pub type Result<T = Value> = std::result::Result<T, Error>;

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "unknown identifier: {}", _0)]
    UnboundName(SchemeSymbol),
    #[display(fmt = "malformed list: {}", _0)]
    MalformedExpression(Value),
    #[display(fmt = "cannot call: {}", _0)]
    NotApplicable(Value),
    #[display(fmt = "{}", _0)]
    Arity(BadArgCount),
    #[display(fmt = "bad syntax in {}: {}", _0, _1)]
    Form(&'static str, FormError),
    #[display(fmt = "type mismatch: {}", _0)]
    TypeMismatch(TypeMismatch),
    #[display(fmt = "division by zero")]
    DivideByZero,
    #[display(fmt = "{}", _0)]
    User(String),
}

impl std::error::Error for Error {}

impl From<UnknownSymbol> for Error {
    fn from(UnknownSymbol(symbol): UnknownSymbol) -> Self {
        Self::UnboundName(symbol)
    }
}

impl From<TypeMismatch> for Error {
    fn from(t: TypeMismatch) -> Self {
        Self::TypeMismatch(t)
    }
}

/// An expression still owed evaluation in `env`. Only ever travels inside
/// `Outcome::Deferred`, so it can't be mistaken for a value.
#[derive(Debug, Clone)]
pub struct Unevaluated {
    pub expr: Value,
    pub env: Rc<Frame>,
}

/// One step of evaluation: either a final value or a tail call to resume.
#[derive(Debug)]
pub enum Outcome {
    Finished(Value),
    Deferred(Unevaluated),
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Finished(value)
    }
}

/// Owns the special form registry and whether tail calls are trampolined.
pub struct Evaluator {
    special_forms: SpecialForms,
    tail_calls: bool,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(SpecialForms::default())
    }
}

impl Evaluator {
    pub fn new(special_forms: SpecialForms) -> Self {
        Self {
            special_forms,
            tail_calls: true,
        }
    }

    /// Plain recursion: still correct, but every tail call costs stack.
    pub fn without_tail_calls(self) -> Self {
        Self {
            tail_calls: false,
            ..self
        }
    }

    pub fn tail_calls(&self) -> bool {
        self.tail_calls
    }

    pub fn special_forms(&self) -> &SpecialForms {
        &self.special_forms
    }

    /// Evaluate `expr` in `env` to a final value, driving any tail calls to
    /// completion without growing the stack.
    pub fn evaluate(&self, expr: &Value, env: &Rc<Frame>) -> Result {
        let mut outcome = self.eval_step(expr, env)?;
        loop {
            match outcome {
                Outcome::Finished(value) => return Ok(value),
                Outcome::Deferred(Unevaluated { expr, env }) => {
                    log::trace!("resume tail call {}", expr);
                    outcome = self.eval_step(&expr, &env)?;
                }
            }
        }
    }

    /// Evaluate `expr` in tail position: a combination comes back deferred
    /// for the caller's driver loop to pick up.
    pub fn eval_tail(&self, expr: &Value, env: &Rc<Frame>) -> Result<Outcome> {
        if self.tail_calls && expr.is_pair() {
            Ok(Outcome::Deferred(Unevaluated {
                expr: expr.clone(),
                env: env.clone(),
            }))
        } else {
            self.evaluate(expr, env).map(Outcome::Finished)
        }
    }

    fn eval_step(&self, expr: &Value, env: &Rc<Frame>) -> Result<Outcome> {
        log::trace!("eval {}", expr);
        if expr.is_self_evaluating() {
            return Ok(expr.clone().into());
        }
        if let Value::Symbol(symbol) = expr {
            return Ok(env.lookup(symbol)?.into());
        }
        let pair = expr.as_pair()?;
        if !expr.is_list() {
            return Err(Error::MalformedExpression(expr.clone()));
        }
        let (first, rest) = (pair.first(), pair.rest());
        let procedure = match &first {
            Value::Symbol(symbol) => {
                if let Some(handler) = self.special_forms.get(symbol) {
                    log::trace!("special form {}", symbol);
                    return handler(&rest, env, self);
                }
                env.lookup(symbol)?
            }
            _ => self.evaluate(&first, env)?,
        };
        self.apply(&procedure, &rest, env)
    }

    /// Apply `procedure` to the unevaluated operands `args`, evaluating them
    /// in the caller's `env`. The result may be a deferred tail call.
    pub fn apply(&self, procedure: &Value, args: &Value, env: &Rc<Frame>) -> Result<Outcome> {
        let procedure = validate_procedure(procedure)?;
        let args = self.evaluate_operands(args, env)?;
        self.call(procedure, args, env)
    }

    /// As `apply`, but never returns before reaching a final value.
    pub fn complete_apply(&self, procedure: &Value, args: &Value, env: &Rc<Frame>) -> Result {
        let outcome = self.apply(procedure, args, env)?;
        self.force(outcome)
    }

    /// Invoke `procedure` on already-evaluated `args`.
    pub fn call(&self, procedure: &Procedure, mut args: Vec<Value>, env: &Rc<Frame>) -> Result<Outcome> {
        log::trace!("call {} with {}", procedure.name(), pretty_print_args(&args));
        match procedure {
            Procedure::Builtin(builtin) => {
                builtin
                    .arity
                    .validate_for(args.len(), builtin.name)
                    .map_err(Error::Arity)?;
                if builtin.needs_env {
                    args.push(Value::Frame(env.clone()));
                }
                let result = (builtin.fn_ptr)(&args, self);
                match &result {
                    Ok(value) => log::trace!("call to {} resulted in {}", builtin.name, value),
                    Err(e) => log::trace!("call to {} failed: {}", builtin.name, e),
                }
                result.map(Outcome::Finished)
            }
            Procedure::Lambda(lambda) => {
                let frame = bind_formals(&lambda.env, procedure, &lambda.formals, &args)?;
                self.sequence_outcome(&lambda.body, &frame)
            }
            Procedure::Mu(mu) => {
                let frame = bind_formals(env, procedure, &mu.formals, &args)?;
                self.sequence_outcome(&mu.body, &frame)
            }
        }
    }

    pub fn complete_call(&self, procedure: &Procedure, args: Vec<Value>, env: &Rc<Frame>) -> Result {
        let outcome = self.call(procedure, args, env)?;
        self.force(outcome)
    }

    /// Evaluate each expression of the list `expressions` in order and return
    /// the value of the last; `Unspecified` when there are none.
    pub fn evaluate_sequence(&self, expressions: &Value, env: &Rc<Frame>) -> Result {
        let outcome = self.sequence_outcome(expressions, env)?;
        self.force(outcome)
    }

    /// Body evaluation: everything but the last expression for effect, the
    /// last in tail position.
    pub fn sequence_outcome(&self, expressions: &Value, env: &Rc<Frame>) -> Result<Outcome> {
        let expressions = expressions
            .list_to_vec()
            .ok_or_else(|| Error::MalformedExpression(expressions.clone()))?;
        match expressions.split_last() {
            None => Ok(Outcome::Finished(Value::Unspecified)),
            Some((last, init)) => {
                for expr in init {
                    self.evaluate(expr, env)?;
                }
                self.eval_tail(last, env)
            }
        }
    }

    fn force(&self, outcome: Outcome) -> Result {
        match outcome {
            Outcome::Finished(value) => Ok(value),
            Outcome::Deferred(Unevaluated { expr, env }) => self.evaluate(&expr, &env),
        }
    }

    // Results go into a fresh Vec; the operand list itself is left alone.
    fn evaluate_operands(&self, operands: &Value, env: &Rc<Frame>) -> Result<Vec<Value>> {
        let operands = operands
            .list_to_vec()
            .ok_or_else(|| Error::MalformedExpression(operands.clone()))?;
        operands.iter().map(|obj| self.evaluate(obj, env)).collect()
    }
}

fn validate_procedure(value: &Value) -> Result<&Procedure> {
    match value {
        Value::Procedure(procedure) => Ok(procedure),
        _ => Err(Error::NotApplicable(value.clone())),
    }
}

fn bind_formals(
    parent: &Rc<Frame>,
    procedure: &Procedure,
    formals: &[SchemeSymbol],
    args: &[Value],
) -> Result<Rc<Frame>> {
    Frame::make_child_frame(parent, formals, args).map_err(|ArityMismatch { expected, got }| {
        Error::Arity(BadArgCount::new(procedure.name(), Arity::exactly(expected), got))
    })
}

pub(crate) fn pretty_print_args(args: &[Value]) -> String {
    match args.len() {
        0 => "no args".into(),
        1 => args[0].to_string(),
        _ => format!("\n\t{}", args.iter().join("\n\t")),
    }
}
