use scheme_eval::evaluator;
use scheme_eval::interpreter::{self, Interpreter};
use scheme_eval::Value;

fn interpreter() -> Interpreter {
    Interpreter::new(true).unwrap()
}

fn eval(source: &str) -> Value {
    interpreter().eval_str(source).unwrap()
}

fn print(source: &str) -> String {
    interpreter().rep(source).unwrap()
}

#[test]
fn recursive_procedures() {
    let source = "
        (define (fact n)
          (if (= n 0) 1 (* n (fact (- n 1)))))
        (define (fib n)
          (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2)))))
        (list (fact 10) (fib 15))";
    assert_eq!(print(source), "(3628800 610)");
}

#[test]
fn counters_keep_private_state() {
    let source = "
        (define (make-counter)
          (let ((count 0))
            (lambda ()
              (set! count (+ count 1))
              count)))
        (define a (make-counter))
        (define b (make-counter))
        (a) (a) (b)
        (list (a) (b))";
    assert_eq!(print(source), "(3 2)");
}

#[test]
fn higher_order_procedures_and_the_prelude() {
    let source = "
        (define (compose f g) (lambda (x) (f (g x))))
        (define add1 (lambda (x) (+ x 1)))
        (reduce + (map (compose add1 add1) (filter even? (list 1 2 3 4))) 0)";
    assert_eq!(eval(source), Value::Integer(10));
}

#[test]
fn eval_and_apply_builtins() {
    assert_eq!(eval("(eval '(+ 1 2 3))"), Value::Integer(6));
    assert_eq!(eval("(apply + (list 1 2 3))"), Value::Integer(6));
    assert_eq!(
        eval("(define (sq x) (* x x)) (apply sq (list 9))"),
        Value::Integer(81)
    );
}

#[test]
fn dotted_data_prints_back() {
    assert_eq!(print("(cons 1 (cons 2 3))"), "(1 2 . 3)");
    assert_eq!(print("'(a \"b\" #t)"), "(a \"b\" #t)");
    assert_eq!(print("car"), "#[car]");
    assert_eq!(print("(define (f) 1) f"), "#[f]");
}

#[test]
fn long_tail_recursive_loop() {
    let source = "
        (define (count-up i n)
          (if (= i n) i (count-up (+ i 1) n)))
        (count-up 0 100000)";
    assert_eq!(eval(source), Value::Integer(100_000));
}

#[test]
fn long_loop_building_deeply_nested_data() {
    let source = "
        (define (nest n acc)
          (if (= n 0) 'ok (nest (- n 1) (list acc))))
        (nest 100000 1)";
    assert_eq!(eval(source), Value::symbol("ok"));
}

#[test]
fn cyclic_lists_stay_finite() {
    let interpreter = interpreter();
    interpreter
        .eval_str("(define x (list 1)) (set-cdr! x x)")
        .unwrap();
    assert_eq!(interpreter.eval_str("(list? x)").unwrap(), Value::Bool(false));
    assert!(interpreter.eval_str("(length x)").is_err());
    assert!(interpreter.rep("x").unwrap().ends_with("...)"));
}

#[test]
fn long_loops_through_cond_and_or() {
    let source = "
        (define (even-steps n)
          (cond ((= n 0) #t)
                (else (and #t (or #f (even-steps (- n 1)))))))
        (even-steps 100000)";
    assert_eq!(eval(source), Value::Bool(true));
}

#[test]
fn trampoline_and_plain_recursion_agree() {
    let source = "
        (define (sum-to n acc)
          (if (= n 0) acc (sum-to (- n 1) (+ acc n))))
        (sum-to 100 0)";
    let with = Interpreter::new(true).unwrap().eval_str(source).unwrap();
    let without = Interpreter::new(false).unwrap().eval_str(source).unwrap();
    assert_eq!(with, Value::Integer(5050));
    assert_eq!(with, without);
}

#[test]
fn errors_render_for_the_user() {
    let interpreter = interpreter();
    let message = |source: &str| interpreter.eval_str(source).unwrap_err().to_string();
    assert_eq!(message("nope"), "unknown identifier: nope");
    assert_eq!(message("(1 2)"), "cannot call: 1");
    assert_eq!(
        message("(car)"),
        "incorrect number of arguments to car: expected exactly 1, got 0"
    );
    assert_eq!(message("(error \"boom\")"), "boom");
}

#[test]
fn an_error_leaves_earlier_definitions_in_place() {
    let interpreter = interpreter();
    match interpreter.eval_str("(define kept 1) (car 1)") {
        Err(interpreter::Error::Eval(evaluator::Error::TypeMismatch(_))) => {}
        other => panic!("expected a type mismatch, got {:?}", other),
    }
    assert_eq!(interpreter.eval_str("kept").unwrap(), Value::Integer(1));
}

#[test]
fn files_are_loaded_into_the_global_frame() {
    let path = std::env::temp_dir().join(format!("scheme-eval-{}.scm", std::process::id()));
    std::fs::write(&path, "(define (triple x) (* 3 x))\n(triple 4)\n").unwrap();
    let interpreter = interpreter();
    assert_eq!(interpreter.load_file(&path).unwrap(), Value::Integer(12));
    assert_eq!(interpreter.eval_str("(triple 5)").unwrap(), Value::Integer(15));
    std::fs::remove_file(&path).ok();
}
