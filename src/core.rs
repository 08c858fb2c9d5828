use crate::evaluator::{self, Evaluator};
use crate::printer::{self, PrintMode};
use crate::types::{Arity, BuiltinProcedure, SchemeInt, TypeMismatch, Value};
use itertools::Itertools;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(SchemeInt),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(x) => x as f64,
            Number::Float(x) => x,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(x) => x == 0,
            Number::Float(x) => x == 0.0,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Int(x) => Value::Integer(x),
            Number::Float(x) => Value::Float(x),
        }
    }
}

fn as_number(obj: &Value) -> evaluator::Result<Number> {
    match obj {
        Value::Integer(x) => Ok(Number::Int(*x)),
        Value::Float(x) => Ok(Number::Float(*x)),
        _ => Err(TypeMismatch::NotANumber(obj.to_string()).into()),
    }
}

fn grab_numbers(args: &[Value]) -> evaluator::Result<Vec<Number>> {
    args.iter().map(as_number).collect()
}

fn grab_ints(args: &[Value]) -> evaluator::Result<Vec<SchemeInt>> {
    let type_check: Result<Vec<_>, _> = args.iter().map(Value::as_int).collect();
    type_check.map_err(evaluator::Error::TypeMismatch)
}

fn combine(
    x: Number,
    y: Number,
    int_op: fn(SchemeInt, SchemeInt) -> SchemeInt,
    float_op: fn(f64, f64) -> f64,
) -> Number {
    match (x, y) {
        (Number::Int(x), Number::Int(y)) => Number::Int(int_op(x, y)),
        _ => Number::Float(float_op(x.as_f64(), y.as_f64())),
    }
}

const SUM: BuiltinProcedure = BuiltinProcedure {
    name: "+",
    arity: Arity::at_least(0),
    needs_env: false,
    fn_ptr: sum_,
};

fn sum_(args: &[Value], _: &Evaluator) -> evaluator::Result {
    let value = grab_numbers(args)?
        .into_iter()
        .fold(Number::Int(0), |acc, x| {
            combine(acc, x, SchemeInt::wrapping_add, |a, b| a + b)
        });
    Ok(value.into_value())
}

const SUB: BuiltinProcedure = BuiltinProcedure {
    name: "-",
    arity: Arity::at_least(1),
    needs_env: false,
    fn_ptr: sub_,
};

fn sub_(args: &[Value], _: &Evaluator) -> evaluator::Result {
    let numbers = grab_numbers(args)?;
    let value = match numbers.as_slice() {
        [x] => combine(Number::Int(0), *x, SchemeInt::wrapping_sub, |a, b| a - b),
        [first, rest @ ..] => rest.iter().fold(*first, |acc, &x| {
            combine(acc, x, SchemeInt::wrapping_sub, |a, b| a - b)
        }),
        [] => unreachable!(), // arity checked by the applier
    };
    Ok(value.into_value())
}

const MUL: BuiltinProcedure = BuiltinProcedure {
    name: "*",
    arity: Arity::at_least(0),
    needs_env: false,
    fn_ptr: mul_,
};

fn mul_(args: &[Value], _: &Evaluator) -> evaluator::Result {
    let value = grab_numbers(args)?
        .into_iter()
        .fold(Number::Int(1), |acc, x| {
            combine(acc, x, SchemeInt::wrapping_mul, |a, b| a * b)
        });
    Ok(value.into_value())
}

const DIV: BuiltinProcedure = BuiltinProcedure {
    name: "/",
    arity: Arity::at_least(1),
    needs_env: false,
    fn_ptr: div_,
};

// Exact when both sides are integers and the division comes out even.
fn divide(x: Number, y: Number) -> evaluator::Result<Number> {
    if y.is_zero() {
        return Err(evaluator::Error::DivideByZero);
    }
    match (x, y) {
        (Number::Int(x), Number::Int(y)) if x.wrapping_rem(y) == 0 => {
            Ok(Number::Int(x.wrapping_div(y)))
        }
        _ => Ok(Number::Float(x.as_f64() / y.as_f64())),
    }
}

fn div_(args: &[Value], _: &Evaluator) -> evaluator::Result {
    let numbers = grab_numbers(args)?;
    let value = match numbers.as_slice() {
        [x] => divide(Number::Int(1), *x)?,
        [first, rest @ ..] => rest
            .iter()
            .try_fold(*first, |acc, &x| divide(acc, x))?,
        [] => unreachable!(),
    };
    Ok(value.into_value())
}

fn integer_division(args: &[Value], op: fn(SchemeInt, SchemeInt) -> SchemeInt) -> evaluator::Result {
    match grab_ints(args)?.as_slice() {
        [_, 0] => Err(evaluator::Error::DivideByZero),
        [x, y] => Ok(Value::Integer(op(*x, *y))),
        _ => unreachable!(),
    }
}

const QUOTIENT: BuiltinProcedure = BuiltinProcedure {
    name: "quotient",
    arity: Arity::exactly(2),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| integer_division(args, SchemeInt::wrapping_div),
};

const REMAINDER: BuiltinProcedure = BuiltinProcedure {
    name: "remainder",
    arity: Arity::exactly(2),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| integer_division(args, SchemeInt::wrapping_rem),
};

// Takes the sign of the divisor, unlike remainder.
const MODULO: BuiltinProcedure = BuiltinProcedure {
    name: "modulo",
    arity: Arity::exactly(2),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| {
        integer_division(args, |x, y| {
            let r = x.wrapping_rem(y);
            if r != 0 && (r < 0) != (y < 0) {
                r.wrapping_add(y)
            } else {
                r
            }
        })
    },
};

const ABS: BuiltinProcedure = BuiltinProcedure {
    name: "abs",
    arity: Arity::exactly(1),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| match as_number(&args[0])? {
        Number::Int(x) => Ok(Value::Integer(x.wrapping_abs())),
        Number::Float(x) => Ok(Value::Float(x.abs())),
    },
};

fn comparison_(
    args: &[Value],
    int_comp: fn(&SchemeInt, &SchemeInt) -> bool,
    float_comp: fn(&f64, &f64) -> bool,
) -> evaluator::Result {
    match grab_numbers(args)?.as_slice() {
        [Number::Int(x), Number::Int(y)] => Ok(Value::Bool(int_comp(x, y))),
        [x, y] => Ok(Value::Bool(float_comp(&x.as_f64(), &y.as_f64()))),
        _ => unreachable!(),
    }
}

macro_rules! comparison_builtin {
    ($SYMBOL:tt, $NAME:ident) => {
        paste::item! {
            const $NAME: BuiltinProcedure = BuiltinProcedure {
                name: stringify!($SYMBOL),
                arity: Arity::exactly(2),
                needs_env: false,
                fn_ptr: |args: &[Value], _: &Evaluator| {
                    comparison_(args, SchemeInt::[<$NAME:lower>], f64::[<$NAME:lower>])
                },
            };
        }
    };
}

comparison_builtin!(=, EQ);
comparison_builtin!(<, LT);
comparison_builtin!(<=, LE);
comparison_builtin!(>, GT);
comparison_builtin!(>=, GE);

macro_rules! predicate_builtin {
    ($NAME:ident, $SYMBOL:expr, $TEST:expr) => {
        const $NAME: BuiltinProcedure = BuiltinProcedure {
            name: $SYMBOL,
            arity: Arity::exactly(1),
            needs_env: false,
            fn_ptr: |args: &[Value], _: &Evaluator| Ok(Value::Bool($TEST(&args[0]))),
        };
    };
}

predicate_builtin!(NUMBER_TEST, "number?", Value::is_number);
predicate_builtin!(INTEGER_TEST, "integer?", |obj: &Value| matches!(
    obj,
    Value::Integer(_)
));
predicate_builtin!(BOOLEAN_TEST, "boolean?", |obj: &Value| matches!(
    obj,
    Value::Bool(_)
));
predicate_builtin!(SYMBOL_TEST, "symbol?", Value::is_symbol);
predicate_builtin!(STRING_TEST, "string?", |obj: &Value| matches!(
    obj,
    Value::String(_)
));
predicate_builtin!(PROCEDURE_TEST, "procedure?", Value::is_procedure);
predicate_builtin!(NULL_TEST, "null?", Value::is_nil);
predicate_builtin!(PAIR_TEST, "pair?", Value::is_pair);
predicate_builtin!(LIST_TEST, "list?", Value::is_list);
predicate_builtin!(NOT, "not", |obj: &Value| !obj.is_true());

fn parity_(args: &[Value], want_even: bool) -> evaluator::Result {
    let x = args[0].as_int()?;
    Ok(Value::Bool((x % 2 == 0) == want_even))
}

const ZERO_TEST: BuiltinProcedure = BuiltinProcedure {
    name: "zero?",
    arity: Arity::exactly(1),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| Ok(Value::Bool(as_number(&args[0])?.is_zero())),
};

const EVEN_TEST: BuiltinProcedure = BuiltinProcedure {
    name: "even?",
    arity: Arity::exactly(1),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| parity_(args, true),
};

const ODD_TEST: BuiltinProcedure = BuiltinProcedure {
    name: "odd?",
    arity: Arity::exactly(1),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| parity_(args, false),
};

const EQ_TEST: BuiltinProcedure = BuiltinProcedure {
    name: "eq?",
    arity: Arity::exactly(2),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| Ok(Value::Bool(args[0].is_eqv(&args[1]))),
};

const EQV_TEST: BuiltinProcedure = BuiltinProcedure {
    name: "eqv?",
    ..EQ_TEST
};

const EQUAL_TEST: BuiltinProcedure = BuiltinProcedure {
    name: "equal?",
    arity: Arity::exactly(2),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| Ok(Value::Bool(args[0] == args[1])),
};

const CONS: BuiltinProcedure = BuiltinProcedure {
    name: "cons",
    arity: Arity::exactly(2),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| Ok(Value::cons(args[0].clone(), args[1].clone())),
};

const CAR: BuiltinProcedure = BuiltinProcedure {
    name: "car",
    arity: Arity::exactly(1),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| Ok(args[0].as_pair()?.first()),
};

const CDR: BuiltinProcedure = BuiltinProcedure {
    name: "cdr",
    arity: Arity::exactly(1),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| Ok(args[0].as_pair()?.rest()),
};

const SET_CAR: BuiltinProcedure = BuiltinProcedure {
    name: "set-car!",
    arity: Arity::exactly(2),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| {
        args[0].as_pair()?.set_first(args[1].clone());
        Ok(Value::Unspecified)
    },
};

const SET_CDR: BuiltinProcedure = BuiltinProcedure {
    name: "set-cdr!",
    arity: Arity::exactly(2),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| {
        args[0].as_pair()?.set_rest(args[1].clone());
        Ok(Value::Unspecified)
    },
};

const LIST: BuiltinProcedure = BuiltinProcedure {
    name: "list",
    arity: Arity::at_least(0),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| Ok(Value::list(args.to_vec())),
};

fn proper_list(obj: &Value) -> evaluator::Result<Vec<Value>> {
    obj.list_to_vec()
        .ok_or_else(|| TypeMismatch::NotAList(obj.to_string()).into())
}

const LENGTH: BuiltinProcedure = BuiltinProcedure {
    name: "length",
    arity: Arity::exactly(1),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| {
        Ok(Value::Integer(proper_list(&args[0])?.len() as SchemeInt))
    },
};

const APPEND: BuiltinProcedure = BuiltinProcedure {
    name: "append",
    arity: Arity::at_least(0),
    needs_env: false,
    fn_ptr: append_,
};

// Every argument but the last is copied; the last becomes the shared tail.
fn append_(args: &[Value], _: &Evaluator) -> evaluator::Result {
    let (last, init) = match args.split_last() {
        None => return Ok(Value::Nil),
        Some(split) => split,
    };
    let mut elements = Vec::new();
    for arg in init {
        elements.extend(proper_list(arg)?);
    }
    Ok(Value::improper_list(elements, last.clone()))
}

fn print_internal(args: &[Value], mode: PrintMode, newline: bool) -> evaluator::Result {
    let text = args.iter().map(|arg| printer::pr_str(arg, mode)).join(" ");
    match newline {
        true => println!("{}", text),
        false => print!("{}", text),
    }
    Ok(Value::Unspecified)
}

const DISPLAY: BuiltinProcedure = BuiltinProcedure {
    name: "display",
    arity: Arity::exactly(1),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| print_internal(args, PrintMode::Directly, false),
};

const PRINT: BuiltinProcedure = BuiltinProcedure {
    name: "print",
    arity: Arity::at_least(0),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| {
        print_internal(args, PrintMode::ReadableRepresentation, true)
    },
};

const NEWLINE: BuiltinProcedure = BuiltinProcedure {
    name: "newline",
    arity: Arity::exactly(0),
    needs_env: false,
    fn_ptr: |_: &[Value], _: &Evaluator| {
        println!();
        Ok(Value::Unspecified)
    },
};

const ERROR: BuiltinProcedure = BuiltinProcedure {
    name: "error",
    arity: Arity::at_least(0),
    needs_env: false,
    fn_ptr: |args: &[Value], _: &Evaluator| {
        let message = args
            .iter()
            .map(|arg| printer::pr_str(arg, PrintMode::Directly))
            .join(" ");
        Err(evaluator::Error::User(message))
    },
};

const EVAL: BuiltinProcedure = BuiltinProcedure {
    name: "eval",
    arity: Arity::exactly(1),
    needs_env: true,
    fn_ptr: eval_,
};

fn eval_(args: &[Value], evaluator: &Evaluator) -> evaluator::Result {
    let env = args[1].as_frame()?;
    log::info!("call from scheme to eval with {}", args[0]);
    evaluator.evaluate(&args[0], env)
}

const APPLY: BuiltinProcedure = BuiltinProcedure {
    name: "apply",
    arity: Arity::exactly(2),
    needs_env: true,
    fn_ptr: apply_,
};

fn apply_(args: &[Value], evaluator: &Evaluator) -> evaluator::Result {
    let procedure = match &args[0] {
        Value::Procedure(p) => p,
        other => return Err(evaluator::Error::NotApplicable(other.clone())),
    };
    let values = proper_list(&args[1])?;
    let env = args[2].as_frame()?;
    evaluator.complete_call(procedure, values, env)
}

static BUILTINS: &[BuiltinProcedure] = &[
    // Arithmetic
    SUM, SUB, MUL, DIV, QUOTIENT, REMAINDER, MODULO, ABS,
    // Comparisons
    EQ, LT, LE, GT, GE,
    // Casting and testing
    NUMBER_TEST, INTEGER_TEST, BOOLEAN_TEST, SYMBOL_TEST, STRING_TEST, PROCEDURE_TEST,
    NULL_TEST, PAIR_TEST, LIST_TEST, ZERO_TEST, EVEN_TEST, ODD_TEST,
    NOT, EQ_TEST, EQV_TEST, EQUAL_TEST,
    // Working with lists
    CONS, CAR, CDR, SET_CAR, SET_CDR, LIST, LENGTH, APPEND,
    // Output
    DISPLAY, PRINT, NEWLINE, ERROR,
    // Evaluation
    EVAL, APPLY,
];

type Namespace = HashMap<&'static str, &'static BuiltinProcedure>;
lazy_static! {
    pub static ref CORE: Namespace = BUILTINS.iter().map(|func| (func.name, func)).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::global_frame;
    use crate::reader::read_str;
    use crate::types::BadArgCount;

    fn run(source: &str) -> evaluator::Result {
        let evaluator = Evaluator::default();
        let env = global_frame();
        evaluator.evaluate_sequence(&read_str(&format!("({})", source)).unwrap(), &env)
    }

    fn int(x: SchemeInt) -> Value {
        Value::Integer(x)
    }

    #[test]
    fn every_builtin_is_registered_once() {
        assert_eq!(CORE.len(), BUILTINS.len());
        assert_eq!(CORE["eqv?"].name, "eqv?");
        assert!(CORE["eval"].needs_env);
    }

    #[test]
    fn arithmetic() {
        assert_eq!(run("(+)").unwrap(), int(0));
        assert_eq!(run("(+ 1 2 3)").unwrap(), int(6));
        assert_eq!(run("(- 5)").unwrap(), int(-5));
        assert_eq!(run("(- 10 1 2)").unwrap(), int(7));
        assert_eq!(run("(* 2 3 4)").unwrap(), int(24));
        assert_eq!(run("(+ 1 0.5)").unwrap(), Value::Float(1.5));
        assert_eq!(run("(abs -3)").unwrap(), int(3));
    }

    #[test]
    fn division() {
        assert_eq!(run("(/ 6 3)").unwrap(), int(2));
        assert_eq!(run("(/ 1 2)").unwrap(), Value::Float(0.5));
        assert_eq!(run("(/ 4)").unwrap(), Value::Float(0.25));
        assert!(matches!(run("(/ 1 0)"), Err(evaluator::Error::DivideByZero)));
        assert_eq!(run("(quotient -7 2)").unwrap(), int(-3));
        assert_eq!(run("(remainder -7 2)").unwrap(), int(-1));
        assert_eq!(run("(modulo -7 2)").unwrap(), int(1));
        assert!(matches!(run("(modulo 1 0)"), Err(evaluator::Error::DivideByZero)));
        assert_eq!(run("(modulo 7 -2)").unwrap(), int(-1));
        assert_eq!(run("(modulo -8 2)").unwrap(), int(0));
        assert_eq!(
            run("(modulo 9223372036854775806 9223372036854775807)").unwrap(),
            int(9_223_372_036_854_775_806)
        );
        assert_eq!(
            run("(modulo -9223372036854775807 9223372036854775807)").unwrap(),
            int(0)
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(run("(= 2 2)").unwrap(), Value::Bool(true));
        assert_eq!(run("(< 1 2.5)").unwrap(), Value::Bool(true));
        assert_eq!(run("(>= 1 2)").unwrap(), Value::Bool(false));
        assert!(matches!(
            run("(< 'a 1)"),
            Err(evaluator::Error::TypeMismatch(TypeMismatch::NotANumber(_)))
        ));
    }

    #[test]
    fn predicates() {
        assert_eq!(run("(null? nil)").unwrap(), Value::Bool(true));
        assert_eq!(run("(pair? '(1))").unwrap(), Value::Bool(true));
        assert_eq!(run("(list? (cons 1 2))").unwrap(), Value::Bool(false));
        assert_eq!(run("(procedure? car)").unwrap(), Value::Bool(true));
        assert_eq!(run("(procedure? (mu () 1))").unwrap(), Value::Bool(true));
        assert_eq!(run("(not 0)").unwrap(), Value::Bool(false));
        assert_eq!(run("(even? 4)").unwrap(), Value::Bool(true));
        assert_eq!(run("(odd? -3)").unwrap(), Value::Bool(true));
        assert_eq!(run("(eq? '(1) '(1))").unwrap(), Value::Bool(false));
        assert_eq!(run("(equal? '(1) '(1))").unwrap(), Value::Bool(true));
        assert_eq!(run("(eq? 'a 'a)").unwrap(), Value::Bool(true));
    }

    #[test]
    fn lists() {
        assert_eq!(run("(car (cdr (list 1 2 3)))").unwrap(), int(2));
        assert_eq!(run("(length '(1 2 3))").unwrap(), int(3));
        assert_eq!(run("(append '(1) '(2 3) '())").unwrap(), read_str("(1 2 3)").unwrap());
        assert_eq!(run("(append '(1) 2)").unwrap(), read_str("(1 . 2)").unwrap());
        assert_eq!(
            run("(define x (list 1 2)) (set-car! x 9) (set-cdr! (cdr x) '(3)) x").unwrap(),
            read_str("(9 2 3)").unwrap()
        );
        assert!(matches!(
            run("(car nil)"),
            Err(evaluator::Error::TypeMismatch(TypeMismatch::NotAPair(_)))
        ));
    }

    #[test]
    fn cyclic_lists_are_not_lists() {
        let cycle = "(define x (list 1 2)) (set-cdr! (cdr x) x)";
        assert_eq!(
            run(&format!("{} (list? x)", cycle)).unwrap(),
            Value::Bool(false)
        );
        assert!(matches!(
            run(&format!("{} (length x)", cycle)),
            Err(evaluator::Error::TypeMismatch(TypeMismatch::NotAList(_)))
        ));
        assert_eq!(run(&format!("{} (pair? x)", cycle)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn arity_is_checked_before_the_call() {
        match run("(cons 1)") {
            Err(evaluator::Error::Arity(BadArgCount { name, got, .. })) => {
                assert_eq!(name, "cons");
                assert_eq!(got, 1);
            }
            other => panic!("expected an arity error, got {:?}", other),
        }
        // The implicit environment argument doesn't count.
        assert!(matches!(run("(eval 1 2)"), Err(evaluator::Error::Arity(_))));
    }

    #[test]
    fn eval_uses_the_calling_frame() {
        assert_eq!(run("(eval '(+ 1 2))").unwrap(), int(3));
        assert_eq!(
            run("(define (f x) (eval 'x)) (f 7)").unwrap(),
            int(7)
        );
    }

    #[test]
    fn apply_takes_evaluated_arguments() {
        assert_eq!(run("(apply + '(1 2 3))").unwrap(), int(6));
        assert_eq!(run("(apply list '(a b))").unwrap(), read_str("(a b)").unwrap());
        assert_eq!(
            run("(define (f x) (if (= x 0) 'done (apply f (list (- x 1))))) (f 10)").unwrap(),
            Value::symbol("done")
        );
        assert!(matches!(run("(apply 1 '())"), Err(evaluator::Error::NotApplicable(_))));
    }

    #[test]
    fn error_carries_its_message() {
        match run("(error \"bad thing:\" 42)") {
            Err(evaluator::Error::User(message)) => assert_eq!(message, "bad thing: 42"),
            other => panic!("expected a user error, got {:?}", other),
        }
    }
}
