use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::time::Instant;

use crate::environment::Environment;
use crate::error::{ErrorReporter, RuntimeError};
use crate::expr::{AssignData, BinaryData, CallData, Expr, ExprId, ExprVisitor, GroupingData, LiteralData, LogicalData, UnaryData, VariableData};
use crate::function::{Function, NativeFunction};
use crate::stmt::{BlockData, ExpressionData, FunctionData, IfData, PrintData, ReturnData, Stmt, StmtVisitor, VarData, WhileData};
use crate::token::{Token, Type};
use crate::value::{Callable, Value};

/// What an expression or statement evaluation can unwind with, besides a
/// plain value. `Return` carries a value up through however many nested
/// blocks sit between a `return` statement and the call that should
/// receive it; `Error` is a runtime error propagating to the point where
/// it gets reported. Keeping these distinct, rather than one exception
/// type a throw-based interpreter would use, means a `return` can never
/// accidentally be caught as an error or vice versa.
#[derive(Debug)]
pub enum Signal {
    Return(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for Signal {
    fn from(err: RuntimeError) -> Self {
        Signal::Error(err)
    }
}

pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    writer: Box<dyn Write>,
}

impl Interpreter {
    pub fn new(writer: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::default()));
        for (name, native) in NativeFunction::globals(Instant::now()) {
            globals.borrow_mut().define(name, Value::Callable(Rc::new(native)));
        }

        Interpreter { environment: Rc::clone(&globals), globals, locals: HashMap::new(), writer }
    }

    /// Recorded by the resolver: `id` is this many scopes away from
    /// wherever it is looked up from at runtime.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Runs a whole program. A runtime error is reported once and stops
    /// execution of the remaining top-level statements; it never
    /// propagates as a Rust panic or `Result` out of this call.
    pub fn interpret(&mut self, statements: &[Stmt], reporter: &mut ErrorReporter) {
        for statement in statements {
            match self.execute(statement) {
                Ok(()) => {}
                Err(Signal::Error(err)) => {
                    reporter.report_runtime(&err);
                    break;
                }
                Err(Signal::Return(_)) => {
                    unreachable!("the resolver rejects return statements outside a function")
                }
            }
        }
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<(), Signal> {
        stmt.accept(self)
    }

    pub fn execute_block(&mut self, statements: &[Stmt], environment: Rc<RefCell<Environment>>) -> Result<(), Signal> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result = Ok(());
        for statement in statements {
            if let Err(signal) = self.execute(statement) {
                result = Err(signal);
                break;
            }
        }

        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, Signal> {
        expr.accept(self)
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    fn numeric_operand(operator: &Token, value: Value) -> Result<f64, RuntimeError> {
        match value {
            Value::Number(n) => Ok(n),
            _ => Err(RuntimeError::new(operator.clone(), "Operand must be a number.")),
        }
    }

    fn numeric_operands(operator: &Token, left: Value, right: Value) -> Result<(f64, f64), RuntimeError> {
        match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok((l, r)),
            _ => Err(RuntimeError::new(operator.clone(), "Operands must be numbers.")),
        }
    }
}

impl ExprVisitor<Result<Value, Signal>> for Interpreter {
    fn visit_literal(&mut self, data: &LiteralData) -> Result<Value, Signal> {
        Ok(match &data.value {
            crate::literal::Literal::Nil => Value::Nil,
            crate::literal::Literal::Bool(b) => Value::Bool(*b),
            crate::literal::Literal::Number(n) => Value::Number(*n),
            crate::literal::Literal::String(s) => Value::String(s.clone()),
        })
    }

    fn visit_grouping(&mut self, data: &GroupingData) -> Result<Value, Signal> {
        self.evaluate(&data.expression)
    }

    fn visit_unary(&mut self, data: &UnaryData) -> Result<Value, Signal> {
        let right = self.evaluate(&data.right)?;

        match data.operator.r#type {
            Type::Minus => Ok(Value::Number(-Self::numeric_operand(&data.operator, right)?)),
            Type::Bang => Ok(Value::Bool(!right.is_truthy())),
            _ => unreachable!("parser only ever produces unary '-' and '!'"),
        }
    }

    fn visit_binary(&mut self, data: &BinaryData) -> Result<Value, Signal> {
        let left = self.evaluate(&data.left)?;
        let right = self.evaluate(&data.right)?;
        let op = &data.operator;

        let value = match op.r#type {
            Type::Plus => match (left, right) {
                (Value::Number(l), Value::Number(r)) => Value::Number(l + r),
                (Value::String(l), Value::String(r)) => Value::String(l + &r),
                _ => return Err(RuntimeError::new(op.clone(), "Operands must be two numbers or two strings.").into()),
            },
            Type::Minus => {
                let (l, r) = Self::numeric_operands(op, left, right)?;
                Value::Number(l - r)
            }
            Type::Star => {
                let (l, r) = Self::numeric_operands(op, left, right)?;
                Value::Number(l * r)
            }
            Type::Slash => {
                let (l, r) = Self::numeric_operands(op, left, right)?;
                if r == 0.0 {
                    return Err(RuntimeError::new(op.clone(), "Division by zero.").into());
                }
                Value::Number(l / r)
            }
            Type::Greater => {
                let (l, r) = Self::numeric_operands(op, left, right)?;
                Value::Bool(l > r)
            }
            Type::GreaterEqual => {
                let (l, r) = Self::numeric_operands(op, left, right)?;
                Value::Bool(l >= r)
            }
            Type::Less => {
                let (l, r) = Self::numeric_operands(op, left, right)?;
                Value::Bool(l < r)
            }
            Type::LessEqual => {
                let (l, r) = Self::numeric_operands(op, left, right)?;
                Value::Bool(l <= r)
            }
            Type::EqualEqual => Value::Bool(left == right),
            Type::BangEqual => Value::Bool(left != right),
            _ => unreachable!("parser only ever produces these binary operators"),
        };

        Ok(value)
    }

    fn visit_logical(&mut self, data: &LogicalData) -> Result<Value, Signal> {
        let left = self.evaluate(&data.left)?;

        match data.operator.r#type {
            Type::Or if left.is_truthy() => Ok(left),
            Type::Or => self.evaluate(&data.right),
            Type::And if !left.is_truthy() => Ok(left),
            Type::And => self.evaluate(&data.right),
            _ => unreachable!("parser only ever produces 'and'/'or' as logical operators"),
        }
    }

    fn visit_variable(&mut self, data: &VariableData) -> Result<Value, Signal> {
        self.look_up_variable(data.id, &data.name).map_err(Signal::Error)
    }

    fn visit_assign(&mut self, data: &AssignData) -> Result<Value, Signal> {
        let value = self.evaluate(&data.value)?;

        match self.locals.get(&data.id) {
            Some(&distance) => Environment::assign_at(&self.environment, distance, &data.name, value.clone()),
            None => self.globals.borrow_mut().assign(&data.name, value.clone())?,
        }

        Ok(value)
    }

    fn visit_call(&mut self, data: &CallData) -> Result<Value, Signal> {
        let callee = self.evaluate(&data.callee)?;

        let mut arguments = Vec::with_capacity(data.arguments.len());
        for argument in &data.arguments {
            arguments.push(self.evaluate(argument)?);
        }

        let Value::Callable(callable) = callee else {
            return Err(RuntimeError::new(data.paren.clone(), "Can only call functions and classes.").into());
        };

        if arguments.len() != callable.arity() {
            return Err(RuntimeError::new(
                data.paren.clone(),
                format!("Expected {} arguments but got {}.", callable.arity(), arguments.len()),
            )
            .into());
        }

        callable.call(self, arguments).map_err(Signal::Error)
    }
}

impl StmtVisitor<Result<(), Signal>> for Interpreter {
    fn visit_expression(&mut self, data: &ExpressionData) -> Result<(), Signal> {
        self.evaluate(&data.expr)?;
        Ok(())
    }

    fn visit_print(&mut self, data: &PrintData) -> Result<(), Signal> {
        let value = self.evaluate(&data.expr)?;
        let _ = writeln!(self.writer, "{value}");
        Ok(())
    }

    fn visit_var(&mut self, data: &VarData) -> Result<(), Signal> {
        let value = match &data.initializer {
            Some(initializer) => self.evaluate(initializer)?,
            None => Value::Nil,
        };
        self.environment.borrow_mut().define(&data.name.lexeme, value);
        Ok(())
    }

    fn visit_block(&mut self, data: &BlockData) -> Result<(), Signal> {
        let scope = Rc::new(RefCell::new(Environment::new(Some(Rc::clone(&self.environment)))));
        self.execute_block(&data.statements, scope)
    }

    fn visit_if(&mut self, data: &IfData) -> Result<(), Signal> {
        if self.evaluate(&data.condition)?.is_truthy() {
            self.execute(&data.then_branch)
        } else if let Some(else_branch) = &data.else_branch {
            self.execute(else_branch)
        } else {
            Ok(())
        }
    }

    fn visit_while(&mut self, data: &WhileData) -> Result<(), Signal> {
        while self.evaluate(&data.condition)?.is_truthy() {
            self.execute(&data.body)?;
        }
        Ok(())
    }

    fn visit_function(&mut self, data: &Rc<FunctionData>) -> Result<(), Signal> {
        let function = Function::new(Rc::clone(data), Rc::clone(&self.environment));
        self.environment.borrow_mut().define(&data.name.lexeme, Value::Callable(Rc::new(function)));
        Ok(())
    }

    fn visit_return(&mut self, data: &ReturnData) -> Result<(), Signal> {
        let value = match &data.value {
            Some(expr) => self.evaluate(expr)?,
            None => Value::Nil,
        };
        Err(Signal::Return(value))
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn run(source: &str) -> String {
        struct Sink(Rc<RefCell<Vec<u8>>>);
        impl Write for Sink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.borrow_mut().write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let output = Rc::new(RefCell::new(Vec::new()));
        let mut reporter = ErrorReporter::new(Box::new(Sink(Rc::clone(&output))));

        let tokens = Scanner::new(source).scan_tokens(&mut reporter);
        let mut parser = Parser::new(tokens);
        let statements = parser.parse(&mut reporter);
        assert!(!reporter.had_error(), "unexpected static error in {source:?}");

        let mut interpreter = Interpreter::new(Box::new(Sink(Rc::clone(&output))));
        {
            let mut resolver = Resolver::new(&mut interpreter, &mut reporter);
            resolver.resolve(&statements);
        }
        assert!(!reporter.had_error(), "unexpected resolve error in {source:?}");

        interpreter.interpret(&statements, &mut reporter);
        assert!(!reporter.had_runtime_error(), "unexpected runtime error in {source:?}");

        String::from_utf8(output.borrow().clone()).unwrap()
    }

    #[test]
    fn arithmetic_and_print() {
        assert_eq!(run("print 1 + 2 * 3;"), "7\n");
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(run(r#"print "a" + "b";"#), "ab\n");
    }

    #[test]
    fn block_scoping_shadows_then_restores() {
        let source = r#"
            var a = "outer";
            {
                var a = "inner";
                print a;
            }
            print a;
        "#;
        assert_eq!(run(source), "inner\nouter\n");
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun count() {
                    i = i + 1;
                    print i;
                }
                return count;
            }
            var counter = makeCounter();
            counter();
            counter();
        "#;
        assert_eq!(run(source), "1\n2\n");
    }

    #[test]
    fn while_and_for_loops() {
        assert_eq!(run("for (var i = 0; i < 3; i = i + 1) print i;"), "0\n1\n2\n");
    }

    #[test]
    fn logical_operators_short_circuit_and_return_an_operand() {
        assert_eq!(run(r#"print "hi" or 2;"#), "hi\n");
        assert_eq!(run("print nil and 2;"), "nil\n");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error_not_infinity() {
        let mut reporter = ErrorReporter::new(Box::new(std::io::sink()));
        let tokens = Scanner::new("print 1 / 0;").scan_tokens(&mut reporter);
        let mut parser = Parser::new(tokens);
        let statements = parser.parse(&mut reporter);
        assert!(!reporter.had_error());

        let mut interpreter = Interpreter::new(Box::new(std::io::sink()));
        {
            let mut resolver = Resolver::new(&mut interpreter, &mut reporter);
            resolver.resolve(&statements);
        }
        interpreter.interpret(&statements, &mut reporter);
        assert!(reporter.had_runtime_error());
    }
}
