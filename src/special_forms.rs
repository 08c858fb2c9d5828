use crate::environment::Frame;
use crate::evaluator::{Error, Evaluator, Outcome, Result};
use crate::types::{Arity, LambdaProcedure, MuProcedure, Procedure, SchemeSymbol, Value};
use derive_more::Display;
use itertools::Itertools;
use std::collections::HashMap;
use std::rc::Rc;

/// Receives the operands unevaluated; decides itself what to evaluate and
/// which operand, if any, is in tail position.
pub type SpecialFormFn = fn(&Value, &Rc<Frame>, &Evaluator) -> Result<Outcome>;

/// Special forms by keyword. Built once at startup and handed to the
/// `Evaluator`, which never mutates it.
#[derive(Clone)]
pub struct SpecialForms {
    handlers: HashMap<SchemeSymbol, SpecialFormFn>,
}

impl SpecialForms {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn with(mut self, keyword: &str, handler: SpecialFormFn) -> Self {
        self.handlers.insert(keyword.into(), handler);
        self
    }

    pub fn get(&self, keyword: &SchemeSymbol) -> Option<SpecialFormFn> {
        self.handlers.get(keyword).copied()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.handlers.contains_key(&SchemeSymbol::from(keyword))
    }

    pub fn keywords(&self) -> Vec<&str> {
        self.handlers.keys().map(|k| k.0.as_str()).sorted().collect()
    }
}

impl Default for SpecialForms {
    fn default() -> Self {
        Self::empty()
            .with("quote", apply_quote)
            .with("define", apply_define)
            .with("set!", apply_set)
            .with("begin", apply_begin)
            .with("if", apply_if)
            .with("cond", apply_cond)
            .with("and", apply_and)
            .with("or", apply_or)
            .with("let", apply_let)
            .with("lambda", apply_lambda)
            .with("mu", apply_mu)
    }
}

#[derive(Debug, Display)]
pub enum FormError {
    #[display(fmt = "expected {} operands, got {}", _0, _1)]
    OperandCount(Arity, usize),
    #[display(fmt = "operands are not a proper list")]
    ImproperOperands,
    #[display(fmt = "expected a symbol, got {}", _0)]
    NotASymbol(Value),
    #[display(fmt = "parameter {} appears more than once", _0)]
    DuplicateFormal(SchemeSymbol),
    #[display(fmt = "bad binding {}", _0)]
    BadBinding(Value),
    #[display(fmt = "bad clause {}", _0)]
    BadClause(Value),
}

fn operands(form: &'static str, rest: &Value, arity: Arity) -> Result<Vec<Value>> {
    let operands = rest
        .list_to_vec()
        .ok_or(Error::Form(form, FormError::ImproperOperands))?;
    match arity.contains(operands.len()) {
        true => Ok(operands),
        false => Err(Error::Form(
            form,
            FormError::OperandCount(arity, operands.len()),
        )),
    }
}

fn parse_formals(form: &'static str, formals: &Value) -> Result<Vec<SchemeSymbol>> {
    let formals = formals
        .list_to_vec()
        .ok_or(Error::Form(form, FormError::ImproperOperands))?;
    let mut symbols: Vec<SchemeSymbol> = Vec::with_capacity(formals.len());
    for formal in formals {
        let symbol = match formal {
            Value::Symbol(s) => s,
            other => return Err(Error::Form(form, FormError::NotASymbol(other))),
        };
        if symbols.contains(&symbol) {
            return Err(Error::Form(form, FormError::DuplicateFormal(symbol)));
        }
        symbols.push(symbol);
    }
    Ok(symbols)
}

fn make_lambda(name: &str, formals: Vec<SchemeSymbol>, body: &[Value], env: &Rc<Frame>) -> Value {
    let lambda = LambdaProcedure {
        name: name.to_string(),
        formals,
        body: Value::list(body.to_vec()),
        env: env.clone(),
    };
    Value::Procedure(Procedure::Lambda(Rc::new(lambda)))
}

pub fn apply_quote(rest: &Value, _env: &Rc<Frame>, _evaluator: &Evaluator) -> Result<Outcome> {
    let args = operands("quote", rest, Arity::exactly(1))?;
    Ok(args[0].clone().into())
}

/// `(define name expr)` or `(define (name formals...) body...)`. Evaluates to
/// the defined name.
pub fn apply_define(rest: &Value, env: &Rc<Frame>, evaluator: &Evaluator) -> Result<Outcome> {
    let args = operands("define", rest, Arity::at_least(2))?;
    let (name, value) = match &args[0] {
        Value::Symbol(name) => {
            if args.len() != 2 {
                let count = FormError::OperandCount(Arity::exactly(2), args.len());
                return Err(Error::Form("define", count));
            }
            (name.clone(), evaluator.evaluate(&args[1], env)?)
        }
        Value::Pair(signature) => {
            let name = match signature.first() {
                Value::Symbol(name) => name,
                other => return Err(Error::Form("define", FormError::NotASymbol(other))),
            };
            let formals = parse_formals("define", &signature.rest())?;
            let lambda = make_lambda(&name, formals, &args[1..], env);
            (name, lambda)
        }
        other => return Err(Error::Form("define", FormError::NotASymbol(other.clone()))),
    };
    log::debug!("define {} as {}", name, value);
    env.define(name.clone(), value);
    Ok(Value::Symbol(name).into())
}

pub fn apply_set(rest: &Value, env: &Rc<Frame>, evaluator: &Evaluator) -> Result<Outcome> {
    let args = operands("set!", rest, Arity::exactly(2))?;
    let name = args[0]
        .as_symbol()
        .ok_or_else(|| Error::Form("set!", FormError::NotASymbol(args[0].clone())))?;
    let value = evaluator.evaluate(&args[1], env)?;
    env.set(name, value)?;
    Ok(Value::Unspecified.into())
}

pub fn apply_begin(rest: &Value, env: &Rc<Frame>, evaluator: &Evaluator) -> Result<Outcome> {
    operands("begin", rest, Arity::at_least(1))?;
    evaluator.sequence_outcome(rest, env)
}

pub fn apply_if(rest: &Value, env: &Rc<Frame>, evaluator: &Evaluator) -> Result<Outcome> {
    let args = operands("if", rest, Arity::Between(2..=3))?;
    let condition = evaluator.evaluate(&args[0], env)?;
    if condition.is_true() {
        evaluator.eval_tail(&args[1], env)
    } else if args.len() == 3 {
        evaluator.eval_tail(&args[2], env)
    } else {
        Ok(Value::Unspecified.into())
    }
}

/// Clauses are `(test body...)`; `else` as a test always matches. A clause
/// with no body yields the value of its test.
pub fn apply_cond(rest: &Value, env: &Rc<Frame>, evaluator: &Evaluator) -> Result<Outcome> {
    let clauses = operands("cond", rest, Arity::at_least(0))?;
    for clause in clauses {
        let (test, body) = match clause.list_to_vec().as_deref() {
            Some([test, body @ ..]) => (test.clone(), body.to_vec()),
            _ => return Err(Error::Form("cond", FormError::BadClause(clause))),
        };
        let value = match &test {
            Value::Symbol(s) if s.0 == "else" => Value::Bool(true),
            _ => evaluator.evaluate(&test, env)?,
        };
        if value.is_true() {
            return match body.is_empty() {
                true => Ok(value.into()),
                false => evaluator.sequence_outcome(&Value::list(body), env),
            };
        }
    }
    Ok(Value::Unspecified.into())
}

pub fn apply_and(rest: &Value, env: &Rc<Frame>, evaluator: &Evaluator) -> Result<Outcome> {
    let args = operands("and", rest, Arity::at_least(0))?;
    match args.split_last() {
        None => Ok(Value::Bool(true).into()),
        Some((last, init)) => {
            for expr in init {
                let value = evaluator.evaluate(expr, env)?;
                if !value.is_true() {
                    return Ok(value.into());
                }
            }
            evaluator.eval_tail(last, env)
        }
    }
}

pub fn apply_or(rest: &Value, env: &Rc<Frame>, evaluator: &Evaluator) -> Result<Outcome> {
    let args = operands("or", rest, Arity::at_least(0))?;
    match args.split_last() {
        None => Ok(Value::Bool(false).into()),
        Some((last, init)) => {
            for expr in init {
                let value = evaluator.evaluate(expr, env)?;
                if value.is_true() {
                    return Ok(value.into());
                }
            }
            evaluator.eval_tail(last, env)
        }
    }
}

/// `(let ((name expr)...) body...)`. Every expr is evaluated in the outer
/// frame before any name is bound.
pub fn apply_let(rest: &Value, env: &Rc<Frame>, evaluator: &Evaluator) -> Result<Outcome> {
    let args = operands("let", rest, Arity::at_least(2))?;
    let bindings = args[0]
        .list_to_vec()
        .ok_or_else(|| Error::Form("let", FormError::BadBinding(args[0].clone())))?;

    let mut names = Vec::with_capacity(bindings.len());
    let mut values = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let (name, expr) = match binding.list_to_vec().as_deref() {
            Some([Value::Symbol(name), expr]) => (name.clone(), expr.clone()),
            _ => return Err(Error::Form("let", FormError::BadBinding(binding))),
        };
        if names.contains(&name) {
            return Err(Error::Form("let", FormError::DuplicateFormal(name)));
        }
        values.push(evaluator.evaluate(&expr, env)?);
        names.push(name);
    }

    let child = Frame::spawn_from(env);
    for (name, value) in names.into_iter().zip(values) {
        child.define(name, value);
    }
    evaluator.sequence_outcome(&Value::list(args[1..].to_vec()), &child)
}

pub fn apply_lambda(rest: &Value, env: &Rc<Frame>, _evaluator: &Evaluator) -> Result<Outcome> {
    let args = operands("lambda", rest, Arity::at_least(2))?;
    let formals = parse_formals("lambda", &args[0])?;
    Ok(make_lambda("lambda", formals, &args[1..], env).into())
}

pub fn apply_mu(rest: &Value, _env: &Rc<Frame>, _evaluator: &Evaluator) -> Result<Outcome> {
    let args = operands("mu", rest, Arity::at_least(2))?;
    let mu = MuProcedure {
        name: "mu".to_string(),
        formals: parse_formals("mu", &args[0])?,
        body: Value::list(args[1..].to_vec()),
    };
    Ok(Value::Procedure(Procedure::Mu(Rc::new(mu))).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::global_frame;
    use crate::reader::read_str;

    fn run(source: &str) -> Result {
        let evaluator = Evaluator::default();
        let env = global_frame();
        evaluator.evaluate_sequence(&read_str(&format!("({})", source)).unwrap(), &env)
    }

    fn int(x: i64) -> Value {
        Value::Integer(x)
    }

    #[test]
    fn registry_is_keyed_by_symbol() {
        let forms = SpecialForms::default();
        assert!(forms.contains("lambda"));
        assert!(!forms.contains("car"));
        assert_eq!(
            forms.keywords(),
            vec!["and", "begin", "cond", "define", "if", "lambda", "let", "mu", "or", "quote", "set!"]
        );
    }

    #[test]
    fn forms_shadow_bindings_of_the_same_name() {
        assert_eq!(run("(define if 3) (if #f 1 2)").unwrap(), int(2));
    }

    #[test]
    fn custom_registry() {
        let forms = SpecialForms::empty().with("quote", apply_quote);
        let evaluator = Evaluator::new(forms);
        let env = global_frame();
        let expr = read_str("(quote (a b))").unwrap();
        assert_eq!(
            evaluator.evaluate(&expr, &env).unwrap(),
            read_str("(a b)").unwrap()
        );
        let expr = read_str("(if #t 1 2)").unwrap();
        assert!(matches!(evaluator.evaluate(&expr, &env), Err(Error::UnboundName(_))));
    }

    #[test]
    fn quote_returns_its_operand() {
        assert_eq!(run("'(1 x)").unwrap(), Value::list(vec![int(1), Value::symbol("x")]));
        assert!(matches!(run("(quote)"), Err(Error::Form("quote", _))));
    }

    #[test]
    fn define_returns_the_name() {
        assert_eq!(run("(define x 1)").unwrap(), Value::symbol("x"));
        assert_eq!(run("(define (f) 1)").unwrap(), Value::symbol("f"));
        assert!(matches!(
            run("(define 1 2)"),
            Err(Error::Form("define", FormError::NotASymbol(_)))
        ));
        assert!(matches!(
            run("(define x 1 2)"),
            Err(Error::Form("define", FormError::OperandCount(..)))
        ));
    }

    #[test]
    fn set_requires_an_existing_binding() {
        assert_eq!(run("(define x 1) (set! x 2) x").unwrap(), int(2));
        assert!(matches!(run("(set! nope 2)"), Err(Error::UnboundName(_))));
        let source = "
            (define counter 0)
            (define (bump) (set! counter (+ counter 1)))
            (bump) (bump)
            counter";
        assert_eq!(run(source).unwrap(), int(2));
    }

    #[test]
    fn if_without_alternative() {
        assert_eq!(run("(if #f 1)").unwrap(), Value::Unspecified);
        assert_eq!(run("(if 0 'yes 'no)").unwrap(), Value::symbol("yes"));
    }

    #[test]
    fn cond_clauses() {
        assert_eq!(run("(cond (#f 1) ((+ 1 1)) (else 3))").unwrap(), int(2));
        assert_eq!(run("(cond (#f 1) (else 2 3))").unwrap(), int(3));
        assert_eq!(run("(cond (#f 1))").unwrap(), Value::Unspecified);
        assert!(matches!(run("(cond 1)"), Err(Error::Form("cond", FormError::BadClause(_)))));
    }

    #[test]
    fn and_or_short_circuit() {
        assert_eq!(run("(and)").unwrap(), Value::Bool(true));
        assert_eq!(run("(or)").unwrap(), Value::Bool(false));
        assert_eq!(run("(and 1 #f undefined)").unwrap(), Value::Bool(false));
        assert_eq!(run("(or #f 2 undefined)").unwrap(), int(2));
        assert_eq!(run("(and 1 2 3)").unwrap(), int(3));
    }

    #[test]
    fn let_binds_in_a_new_frame() {
        assert_eq!(run("(define x 1) (let ((x 2) (y x)) (list x y))").unwrap(), Value::list(vec![int(2), int(1)]));
        assert_eq!(run("(define x 1) (let ((x 2)) x) x").unwrap(), int(1));
        assert!(matches!(run("(let ((1 2)) 3)"), Err(Error::Form("let", FormError::BadBinding(_)))));
    }

    #[test]
    fn formals_must_be_distinct_symbols() {
        assert!(matches!(
            run("(lambda (x x) x)"),
            Err(Error::Form("lambda", FormError::DuplicateFormal(_)))
        ));
        assert!(matches!(
            run("(mu (1) 1)"),
            Err(Error::Form("mu", FormError::NotASymbol(_)))
        ));
        assert!(matches!(run("(lambda (x))"), Err(Error::Form("lambda", _))));
    }

    #[test]
    fn tail_positions_of_every_form() {
        let loops = [
            "(define (f n) (cond ((= n 0) 'done) (else (f (- n 1)))))",
            "(define (f n) (and #t (if (= n 0) 'done (f (- n 1)))))",
            "(define (f n) (or (and (= n 0) 'done) (f (- n 1))))",
            "(define (f n) (let ((m (- n 1))) (if (< m 0) 'done (f m))))",
            "(define (f n) (begin 1 (if (= n 0) 'done (f (- n 1)))))",
        ];
        for definition in &loops {
            let source = format!("{} (f 100000)", definition);
            assert_eq!(run(&source).unwrap(), Value::symbol("done"), "{}", definition);
        }
    }

    #[test]
    fn mutual_tail_recursion() {
        let source = "
            (define (even? n) (if (= n 0) #t (odd? (- n 1))))
            (define (odd? n) (if (= n 0) #f (even? (- n 1))))
            (even? 100001)";
        assert_eq!(run(source).unwrap(), Value::Bool(false));
    }

    #[test]
    fn dynamic_tail_loop() {
        let source = "
            (define loop (mu (n) (if (= n 0) 'done (loop (- n 1)))))
            (loop 3000)";
        assert_eq!(run(source).unwrap(), Value::symbol("done"));
    }
}
