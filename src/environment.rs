use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// One lexical scope: a name-to-value map plus an optional link to the
/// enclosing scope. Scopes are shared (`Rc<RefCell<..>>`) because call
/// frames and closures keep their defining environment alive.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Write in this scope. Redefinition overwrites.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Read wherever the name is defined, walking parent links.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(LoxError::runtime(
                name,
                format!("Undefined variable '{}'", name.lexeme),
            ))
        }
    }

    /// Write where the name is already defined, walking parent links.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if self.values.contains_key(&name.lexeme) {
            self.values.insert(name.lexeme.clone(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(LoxError::runtime(
                name,
                format!("Undefined variable '{}'", name.lexeme),
            ))
        }
    }

    /// The scope exactly `distance` parent links up from `env`.
    ///
    /// A missing link means the resolver's distance and the runtime scope
    /// chain disagree, which is a bug in this crate, not in the script.
    fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
        let mut env = Rc::clone(env);

        for _ in 0..distance {
            let next = env
                .borrow()
                .enclosing
                .clone()
                .expect("scope chain shorter than resolved distance");
            env = next;
        }

        env
    }

    /// Read directly from the scope `distance` hops up.
    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &Token) -> Result<Value> {
        let scope = Self::ancestor(env, distance);
        let value = scope.borrow().values.get(&name.lexeme).cloned();

        value.ok_or_else(|| {
            LoxError::runtime(name, format!("Undefined variable '{}'", name.lexeme))
        })
    }

    /// Write directly into the scope `distance` hops up.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &Token,
        value: Value,
    ) -> Result<()> {
        let scope = Self::ancestor(env, distance);
        let mut scope = scope.borrow_mut();

        if scope.values.contains_key(&name.lexeme) {
            scope.values.insert(name.lexeme.clone(), value);
            Ok(())
        } else {
            Err(LoxError::runtime(
                name,
                format!("Undefined variable '{}'", name.lexeme),
            ))
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn name(lexeme: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, lexeme.to_string(), 1)
    }

    #[test]
    fn define_then_get() {
        let mut env = Environment::new();
        env.define("answer", Value::Number(42.0));

        assert_eq!(env.get(&name("answer")).unwrap(), Value::Number(42.0));
    }

    #[test]
    fn redefinition_overwrites() {
        let mut env = Environment::new();
        env.define("x", Value::Number(1.0));
        env.define("x", Value::Number(2.0));

        assert_eq!(env.get(&name("x")).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn get_walks_parent_links() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("x", Value::Bool(true));

        let inner = Environment::with_enclosing(Rc::clone(&globals));

        assert_eq!(inner.get(&name("x")).unwrap(), Value::Bool(true));
    }

    #[test]
    fn assign_writes_where_defined() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("x", Value::Number(1.0));

        let mut inner = Environment::with_enclosing(Rc::clone(&globals));
        inner.assign(&name("x"), Value::Number(5.0)).unwrap();

        assert_eq!(
            globals.borrow().get(&name("x")).unwrap(),
            Value::Number(5.0)
        );
    }

    #[test]
    fn assign_to_undefined_is_an_error() {
        let mut env = Environment::new();

        assert!(env.assign(&name("missing"), Value::Nil).is_err());
    }

    #[test]
    fn shadowing_leaves_outer_binding_intact() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("x", Value::Number(1.0));

        let mut inner = Environment::with_enclosing(Rc::clone(&globals));
        inner.define("x", Value::Number(2.0));

        assert_eq!(inner.get(&name("x")).unwrap(), Value::Number(2.0));
        assert_eq!(
            globals.borrow().get(&name("x")).unwrap(),
            Value::Number(1.0)
        );
    }

    #[test]
    fn get_at_skips_exactly_distance_scopes() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("x", Value::Number(1.0));

        let middle = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &globals,
        ))));
        middle.borrow_mut().define("x", Value::Number(2.0));

        let inner = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &middle,
        ))));

        assert_eq!(
            Environment::get_at(&inner, 1, &name("x")).unwrap(),
            Value::Number(2.0)
        );
        assert_eq!(
            Environment::get_at(&inner, 2, &name("x")).unwrap(),
            Value::Number(1.0)
        );
    }
}
