use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;

/// A single scope in the environment chain. Global scope is the root,
/// with no `enclosing`; every block, function call, and closure pushes
/// one more link. Shared via `Rc<RefCell<_>>` because a closure and its
/// call site can both hold a reference to the same scope after the
/// defining function has returned.
#[derive(Debug)]
pub struct Environment {
    pub enclosing: Option<Rc<RefCell<Environment>>>,
    variables: HashMap<String, Value>,
}

impl Environment {
    pub fn new(enclosing: Option<Rc<RefCell<Environment>>>) -> Self {
        Environment { enclosing, variables: HashMap::new() }
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
        let mut current = Rc::clone(env);
        for _ in 0..distance {
            let parent = current
                .borrow()
                .enclosing
                .clone()
                .expect("resolver-computed distance to stay within the environment chain");
            current = parent;
        }
        current
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if self.variables.contains_key(&name.lexeme) {
            self.variables.insert(name.lexeme.clone(), value);
            return Ok(());
        }

        if let Some(enclosing) = &self.enclosing {
            return enclosing.borrow_mut().assign(name, value);
        }

        Err(RuntimeError::new(name.clone(), format!("Undefined variable '{}'.", name.lexeme)))
    }

    /// Assigns at a distance computed by the resolver. `self` must be the
    /// environment the lookup started from; `env_rc` is a handle to that
    /// same environment, needed because walking ancestors requires `Rc`
    /// clones rather than `&self` borrows.
    pub fn assign_at(env_rc: &Rc<RefCell<Environment>>, distance: usize, name: &Token, value: Value) {
        if distance == 0 {
            env_rc.borrow_mut().variables.insert(name.lexeme.clone(), value);
        } else {
            Environment::ancestor(env_rc, distance).borrow_mut().variables.insert(name.lexeme.clone(), value);
        }
    }

    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.variables.get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(enclosing) = &self.enclosing {
            return enclosing.borrow().get(name);
        }

        Err(RuntimeError::new(name.clone(), format!("Undefined variable '{}'.", name.lexeme)))
    }

    pub fn get_at(env_rc: &Rc<RefCell<Environment>>, distance: usize, name: &Token) -> Result<Value, RuntimeError> {
        let env = if distance == 0 { Rc::clone(env_rc) } else { Environment::ancestor(env_rc, distance) };

        let found = env.borrow().variables.get(&name.lexeme).cloned();
        found.ok_or_else(|| RuntimeError::new(name.clone(), format!("Undefined variable '{}'.", name.lexeme)))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Location, Type};

    fn token(name: &str) -> Token {
        Token::new(Type::Identifier, name.to_string(), None, Location::new(1))
    }

    #[test]
    fn get_falls_through_to_enclosing_scope() {
        let globals = Rc::new(RefCell::new(Environment::default()));
        globals.borrow_mut().define("x", Value::Number(1.0));
        let inner = Environment::new(Some(Rc::clone(&globals)));

        assert_eq!(inner.get(&token("x")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn get_undefined_is_a_runtime_error() {
        let env = Environment::default();
        assert!(env.get(&token("missing")).is_err());
    }

    #[test]
    fn assign_requires_prior_definition() {
        let mut env = Environment::default();
        assert!(env.assign(&token("x"), Value::Number(1.0)).is_err());

        env.define("x", Value::Nil);
        assert!(env.assign(&token("x"), Value::Number(2.0)).is_ok());
        assert_eq!(env.get(&token("x")).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn get_at_and_assign_at_target_the_right_ancestor() {
        let globals = Rc::new(RefCell::new(Environment::default()));
        globals.borrow_mut().define("x", Value::Number(1.0));
        let inner = Rc::new(RefCell::new(Environment::new(Some(Rc::clone(&globals)))));
        inner.borrow_mut().define("x", Value::Number(99.0));

        assert_eq!(Environment::get_at(&inner, 1, &token("x")).unwrap(), Value::Number(1.0));
        assert_eq!(Environment::get_at(&inner, 0, &token("x")).unwrap(), Value::Number(99.0));

        Environment::assign_at(&inner, 1, &token("x"), Value::Number(42.0));
        assert_eq!(globals.borrow().get(&token("x")).unwrap(), Value::Number(42.0));
    }
}
