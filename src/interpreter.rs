use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;
use std::time::Instant;

use log::debug;

use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::expr::Expr;
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};
use crate::value::{Callable, LoxClass, LoxFunction, NativeFunction, Value};

/// Identity of an expression node for the resolution side table. AST nodes
/// stay put for the interpreter's lifetime (the driver keeps every parsed
/// program alive), so the address is a stable key.
#[inline]
fn expr_key(expr: &Expr) -> usize {
    expr as *const Expr as usize
}

/// Tree-walking evaluator.
///
/// Holds the global scope, the environment of the code currently running,
/// and the resolver-built side table mapping expression identity to scope
/// distance. `print` output goes to a pluggable writer so tests can capture
/// it.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<usize, usize>,
    output: Box<dyn Write>,
    started: Instant,
    is_returning: Option<Value>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(output: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::Native(Rc::new(NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: clock_native,
            })),
        );

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
            started: Instant::now(),
            is_returning: None,
        }
    }

    /// Record a resolved scope distance for a variable occurrence. Called
    /// by the resolver; absence of an entry means the global scope.
    pub(crate) fn note_local(&mut self, expr: &Expr, depth: usize) {
        self.locals.insert(expr_key(expr), depth);
    }

    /// Take the value left behind by a `return` statement, ending the
    /// unwind. Used at the function-call boundary.
    pub(crate) fn take_return(&mut self) -> Option<Value> {
        self.is_returning.take()
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            self.execute(stmt)?;
        }

        Ok(())
    }

    // ── statements ──────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> Result<()> {
        // A pending `return` skips everything until the call boundary
        // takes it.
        if self.is_returning.is_some() {
            return Ok(());
        }

        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value: Value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let scope = Environment::with_enclosing(Rc::clone(&self.environment));

                self.execute_block(statements, Rc::new(RefCell::new(scope)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    self.execute(body)?;

                    if self.is_returning.is_some() {
                        break;
                    }
                }

                Ok(())
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                let scope = Environment::with_enclosing(Rc::clone(&self.environment));
                let previous =
                    mem::replace(&mut self.environment, Rc::new(RefCell::new(scope)));

                let result = self.execute_for(
                    initializer.as_deref(),
                    condition.as_ref(),
                    increment.as_ref(),
                    body,
                );

                self.environment = previous;

                result
            }

            Stmt::Function(declaration) => {
                let function =
                    LoxFunction::new(Rc::clone(declaration), Rc::clone(&self.environment));

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let result = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("return with {}", result);

                self.is_returning = Some(result);

                Ok(())
            }

            Stmt::Class { name, methods } => {
                // Two-step definition: methods see the class through the
                // enclosing scope by name, never by direct reference.
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Nil);

                let mut method_map: HashMap<String, Rc<LoxFunction>> = HashMap::new();

                for method in methods {
                    let function =
                        LoxFunction::new(Rc::clone(method), Rc::clone(&self.environment));
                    method_map.insert(method.name.lexeme.clone(), Rc::new(function));
                }

                let class = LoxClass::new(name.lexeme.clone(), method_map);

                self.environment
                    .borrow_mut()
                    .assign(name, Value::Class(Rc::new(class)))?;

                Ok(())
            }
        }
    }

    /// Run `statements` in `environment`, restoring the previous scope on
    /// every exit path. Also the entry point for function bodies.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<()> {
        let previous = mem::replace(&mut self.environment, environment);

        let mut result = Ok(());

        for stmt in statements {
            result = self.execute(stmt);

            if result.is_err() {
                break;
            }
        }

        self.environment = previous;

        result
    }

    /// Loop machinery for `for`, run inside the statement's own scope. An
    /// absent condition is truthy.
    fn execute_for(
        &mut self,
        initializer: Option<&Stmt>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &Stmt,
    ) -> Result<()> {
        if let Some(init) = initializer {
            self.execute(init)?;
        }

        loop {
            let keep_going = match condition {
                Some(cond) => is_truthy(&self.evaluate(cond)?),
                None => true,
            };

            if !keep_going {
                break;
            }

            self.execute(body)?;

            if self.is_returning.is_some() {
                break;
            }

            if let Some(step) = increment {
                self.evaluate(step)?;
            }
        }

        Ok(())
    }

    // ── expressions ─────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(token) => evaluate_literal(token),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let value = self.evaluate(right)?;

                evaluate_unary(operator, value)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;
                let right_val = self.evaluate(right)?;

                evaluate_binary(operator, left_val, right_val)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                // Short-circuit: the result is an operand value, never a
                // coerced boolean.
                match operator.token_type {
                    TokenType::OR if is_truthy(&left_val) => Ok(left_val),
                    TokenType::OR => self.evaluate(right),
                    _ if !is_truthy(&left_val) => Ok(left_val),
                    _ => self.evaluate(right),
                }
            }

            Expr::Variable(name) => self.look_up_variable(name, expr),

            Expr::This(keyword) => self.look_up_variable(keyword, expr),

            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;

                if let Some(&distance) = self.locals.get(&expr_key(expr)) {
                    Environment::assign_at(&self.environment, distance, name, value.clone())?;
                } else {
                    self.globals.borrow_mut().assign(name, value.clone())?;
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                let callable: &dyn Callable = match &callee_val {
                    Value::Native(f) => f.as_ref(),
                    Value::Function(f) => f.as_ref(),
                    Value::Class(c) => c,
                    _ => {
                        return Err(LoxError::runtime(
                            paren,
                            "Can only call functions and classes.",
                        ));
                    }
                };

                if args.len() != callable.arity() {
                    return Err(LoxError::runtime(
                        paren,
                        format!(
                            "Expected {} arguments but got {}",
                            callable.arity(),
                            args.len()
                        ),
                    ));
                }

                callable.call(self, args)
            }

            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        if let Some(value) = instance.borrow().field(&name.lexeme) {
                            return Ok(value);
                        }

                        let method = instance.borrow().class.find_method(&name.lexeme);

                        match method {
                            Some(method) => {
                                Ok(Value::Function(Rc::new(method.bind(Rc::clone(&instance)))))
                            }

                            None => Err(LoxError::runtime(
                                name,
                                format!("Undefined property '{}'", name.lexeme),
                            )),
                        }
                    }

                    _ => Err(LoxError::runtime(name, "Only instances have properties.")),
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;

                        instance.borrow_mut().set_field(&name.lexeme, value.clone());

                        Ok(value)
                    }

                    _ => Err(LoxError::runtime(name, "Only instances have fields.")),
                }
            }
        }
    }

    /// Resolution-directed lookup: a recorded distance pins the read to an
    /// exact scope; otherwise the name is global.
    fn look_up_variable(&self, name: &Token, expr: &Expr) -> Result<Value> {
        if let Some(&distance) = self.locals.get(&expr_key(expr)) {
            Environment::get_at(&self.environment, distance, name)
        } else {
            self.globals.borrow().get(name)
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn evaluate_literal(token: &Token) -> Result<Value> {
    match &token.token_type {
        TokenType::NUMBER(n) => Ok(Value::Number(*n)),

        TokenType::STRING(s) => Ok(Value::String(s.clone())),

        TokenType::TRUE => Ok(Value::Bool(true)),

        TokenType::FALSE => Ok(Value::Bool(false)),

        TokenType::NIL => Ok(Value::Nil),

        _ => Err(LoxError::runtime(token, "Invalid literal")),
    }
}

fn evaluate_unary(operator: &Token, value: Value) -> Result<Value> {
    match operator.token_type {
        TokenType::MINUS => match value {
            Value::Number(n) => Ok(Value::Number(-n)),

            _ => Err(LoxError::runtime(operator, "Operand must be a number.")),
        },

        TokenType::BANG => Ok(Value::Bool(!is_truthy(&value))),

        _ => Err(LoxError::runtime(operator, "Invalid unary operator")),
    }
}

fn evaluate_binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    match operator.token_type {
        TokenType::PLUS => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

            _ => Err(LoxError::runtime(
                operator,
                "Operands must be two numbers or two strings",
            )),
        },

        TokenType::MINUS => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

            _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
        },

        TokenType::STAR => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

            _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
        },

        // Division by zero follows IEEE-754: infinities and NaN, no error.
        TokenType::SLASH => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),

            _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
        },

        TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),

        TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

        TokenType::LESS => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),

            _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
        },

        TokenType::LESS_EQUAL => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

            _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
        },

        TokenType::GREATER => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),

            _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
        },

        TokenType::GREATER_EQUAL => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),

            _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
        },

        _ => Err(LoxError::runtime(operator, "Invalid binary operator")),
    }
}

/// `nil` and `false` are falsy; everything else (including 0 and "") is
/// truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}

fn clock_native(interpreter: &mut Interpreter, _args: &[Value]) -> Result<Value> {
    Ok(Value::Number(interpreter.started.elapsed().as_secs_f64()))
}
