use std::cell::RefCell;
use std::fmt::{self, Debug, Display};
use std::rc::Rc;
use std::time::Instant;

use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::interpreter::{Interpreter, Signal};
use crate::stmt::FunctionData;
use crate::value::{Callable, Value};

/// A user-defined function. `closure` is the environment active at the
/// point the `fun` statement ran, not the environment at the call site —
/// capturing it is what makes nested functions close over their
/// enclosing locals instead of only ever seeing globals.
#[derive(Clone)]
pub struct Function {
    declaration: Rc<FunctionData>,
    closure: Rc<RefCell<Environment>>,
}

impl Function {
    pub fn new(declaration: Rc<FunctionData>, closure: Rc<RefCell<Environment>>) -> Self {
        Function { declaration, closure }
    }
}

impl Callable for Function {
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut environment = Environment::new(Some(Rc::clone(&self.closure)));

        for (param, arg) in self.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, arg);
        }

        match interpreter.execute_block(&self.declaration.body, Rc::new(RefCell::new(environment))) {
            Ok(()) => Ok(Value::Nil),
            Err(Signal::Return(value)) => Ok(value),
            Err(Signal::Error(err)) => Err(err),
        }
    }

    fn arity(&self) -> usize {
        self.declaration.params.len()
    }
}

impl Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme)
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme)
    }
}

/// A builtin installed directly into the global scope. The only one the
/// language defines is `clock`, used by timing-sensitive test scripts.
pub struct NativeFunction {
    name: &'static str,
    arity: usize,
    function: fn(&mut Interpreter, Vec<Value>) -> Result<Value, RuntimeError>,
}

impl NativeFunction {
    pub fn globals(started_at: Instant) -> Vec<(&'static str, NativeFunction)> {
        vec![(
            "clock",
            NativeFunction {
                name: "clock",
                arity: 0,
                function: move |_, _| Ok(Value::Number(started_at.elapsed().as_secs_f64())),
            },
        )]
    }
}

impl Callable for NativeFunction {
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        (self.function)(interpreter, arguments)
    }

    fn arity(&self) -> usize {
        self.arity
    }
}

impl Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn: {}>", self.name)
    }
}

impl Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn: {}>", self.name)
    }
}
