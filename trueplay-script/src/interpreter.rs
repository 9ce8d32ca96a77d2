//! Tree-walking evaluator

use crate::ast::*;
use crate::builtins;
use crate::env::{self, Env, Scope};
use crate::error::{Result, ScriptError, Span};
use crate::lexer::tokenize;
use crate::methods;
use crate::parser::parse;
use crate::value::{format_number, Function, PropertyMap, Value};
use std::rc::Rc;
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_STEPS: u64 = 5_000_000;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;
/// Deepest call nesting a configuration may ask for
pub const MAX_CALL_DEPTH: usize = 256;
pub const DEFAULT_MAX_COLLECTION_LEN: usize = 10_000_000;
pub const DEFAULT_MAX_STRING_LEN: usize = 100_000_000;

/// How often (in steps) the wall clock is consulted
const CLOCK_INTERVAL: u64 = 64;

/// Bounds on a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub timeout: Option<Duration>,
    pub max_steps: Option<u64>,
    pub max_call_depth: usize,
    /// Longest array a script may grow, in elements
    pub max_collection_len: usize,
    /// Longest string a script may build, in bytes
    pub max_string_len: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            max_steps: Some(DEFAULT_MAX_STEPS),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
            max_string_len: DEFAULT_MAX_STRING_LEN,
        }
    }
}

impl ExecutionLimits {
    /// No time or step bound; the call depth and size bounds always apply
    pub fn unlimited() -> Self {
        Self {
            timeout: None,
            max_steps: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
            max_string_len: DEFAULT_MAX_STRING_LEN,
        }
    }
}

/// How a statement finished
enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Script interpreter
///
/// Holds the global scope (built-ins plus embedder bindings) and the
/// counters enforcing [`ExecutionLimits`].
pub struct Interpreter {
    globals: Env,
    limits: ExecutionLimits,
    steps: u64,
    depth: usize,
    deadline: Option<Instant>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_limits(ExecutionLimits::default())
    }

    pub fn with_limits(limits: ExecutionLimits) -> Self {
        let mut interp = Self {
            globals: Scope::root(),
            limits,
            steps: 0,
            depth: 0,
            deadline: None,
        };
        builtins::install(&mut interp);
        interp
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    pub fn set_limits(&mut self, limits: ExecutionLimits) {
        self.limits = limits;
    }

    /// Steps taken by the current (or last) run
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Bind a global visible to every script run by this interpreter
    pub fn define_global(&mut self, name: &str, value: Value) {
        self.globals.borrow_mut().define(name, value);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        env::lookup(&self.globals, name)
    }

    /// Parse and run `source` as a function body
    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        let tokens = tokenize(source)?;
        let program = parse(&tokens)?;
        self.run(&program)
    }

    /// Run a program as a function body: a top-level `return` ends it with a
    /// value, falling off the end yields `undefined`.
    pub fn run(&mut self, program: &Program) -> Result<Value> {
        self.steps = 0;
        self.depth = 0;
        self.deadline = self.limits.timeout.map(|timeout| Instant::now() + timeout);

        let scope = Scope::child(&self.globals);
        let result = self.exec_body(&program.body, &scope);
        scope.borrow_mut().clear();

        match result? {
            Completion::Return(value) => Ok(value),
            Completion::Normal => Ok(Value::Undefined),
            Completion::Break | Completion::Continue => Err(ScriptError::ParserError {
                span: program.span,
                message: "Illegal break or continue statement".to_string(),
            }),
        }
    }

    /// Call a script or native function from Rust
    pub fn call(&mut self, func: &Value, args: &[Value]) -> Result<Value> {
        self.call_function(func, args, Span::default())
    }

    fn tick(&mut self, span: Span) -> Result<()> {
        self.steps += 1;
        if let Some(limit) = self.limits.max_steps {
            if self.steps > limit {
                return Err(ScriptError::StepLimitExceeded { span, limit });
            }
        }
        if self.steps % CLOCK_INTERVAL == 0 {
            if let (Some(deadline), Some(timeout)) = (self.deadline, self.limits.timeout) {
                if Instant::now() >= deadline {
                    return Err(ScriptError::Timeout {
                        span,
                        limit_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    });
                }
            }
        }
        Ok(())
    }

    // ===== Statements =====

    /// Run a statement list, hoisting its function declarations first
    fn exec_body(&mut self, body: &[Stmt], env: &Env) -> Result<Completion> {
        for stmt in body {
            if let Stmt::Function(decl) = stmt {
                if let Some(name) = &decl.name {
                    env.borrow_mut().define(name, closure(decl, env));
                }
            }
        }

        for stmt in body {
            match self.exec_stmt(stmt, env)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> Result<Completion> {
        self.tick(stmt.span())?;

        match stmt {
            Stmt::Declaration {
                kind,
                declarations,
                span,
            } => {
                for decl in declarations {
                    let value = match &decl.init {
                        Some(init) => self.eval_expr(init, env)?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(&decl.target, value, env, *kind, *span)?;
                }
                Ok(Completion::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval_expr(expr, env)?;
                Ok(Completion::Normal)
            }
            Stmt::If {
                cond, then, otherwise, ..
            } => {
                if self.eval_expr(cond, env)?.is_truthy() {
                    self.exec_stmt(then, env)
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise, env)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::While { cond, body, span } => {
                loop {
                    self.tick(*span)?;
                    if !self.eval_expr(cond, env)?.is_truthy() {
                        break;
                    }
                    match self.exec_stmt(body, env)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
                span,
            } => self.exec_for(init.as_deref(), cond.as_ref(), update.as_ref(), body, *span, env),
            Stmt::ForOf {
                kind,
                target,
                iterable,
                body,
                span,
            } => {
                let iterable = self.eval_expr(iterable, env)?;
                let items = self.iterate(&iterable, *span)?;
                self.exec_each(items, *kind, target, body, *span, env)
            }
            Stmt::ForIn {
                kind,
                target,
                object,
                body,
                span,
            } => {
                let object = self.eval_expr(object, env)?;
                let keys = keys_of(&object).into_iter().map(Value::String).collect();
                self.exec_each(keys, *kind, target, body, *span, env)
            }
            Stmt::Block(body, _) => self.exec_body(body, &Scope::child(env)),
            Stmt::Return(value, _) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::Throw(expr, span) => {
                let value = self.eval_expr(expr, env)?;
                Err(ScriptError::Thrown { span: *span, value })
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
                span,
            } => self.exec_try(block, param.as_ref(), handler.as_deref(), finalizer.as_deref(), *span, env),
            Stmt::Break(_) => Ok(Completion::Break),
            Stmt::Continue(_) => Ok(Completion::Continue),
            Stmt::Function(_) | Stmt::Empty => Ok(Completion::Normal),
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        span: Span,
        env: &Env,
    ) -> Result<Completion> {
        let scope = Scope::child(env);
        if let Some(init) = init {
            self.exec_stmt(init, &scope)?;
        }

        loop {
            self.tick(span)?;
            if let Some(cond) = cond {
                if !self.eval_expr(cond, &scope)?.is_truthy() {
                    break;
                }
            }
            match self.exec_stmt(body, &scope)? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }
            if let Some(update) = update {
                self.eval_expr(update, &scope)?;
            }
        }
        Ok(Completion::Normal)
    }

    /// Body of `for...of` / `for...in`: a fresh binding per item
    fn exec_each(
        &mut self,
        items: Vec<Value>,
        kind: DeclKind,
        target: &Pattern,
        body: &Stmt,
        span: Span,
        env: &Env,
    ) -> Result<Completion> {
        for item in items {
            self.tick(span)?;
            let scope = Scope::child(env);
            self.bind_pattern(target, item, &scope, kind, span)?;
            match self.exec_stmt(body, &scope)? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        param: Option<&Pattern>,
        handler: Option<&[Stmt]>,
        finalizer: Option<&[Stmt]>,
        span: Span,
        env: &Env,
    ) -> Result<Completion> {
        let outcome = match (self.exec_body(block, &Scope::child(env)), handler) {
            (Err(err), Some(handler)) if err.is_catchable() => {
                let scope = Scope::child(env);
                if let Some(param) = param {
                    self.bind_pattern(param, err.into_value(), &scope, DeclKind::Let, span)?;
                }
                self.exec_body(handler, &scope)
            }
            (outcome, _) => outcome,
        };

        if let Some(finalizer) = finalizer {
            // limit violations end the run without further script code
            if matches!(&outcome, Err(err) if !err.is_catchable()) {
                return outcome;
            }
            let completion = self.exec_body(finalizer, &Scope::child(env))?;
            if !matches!(completion, Completion::Normal) {
                return Ok(completion);
            }
        }
        outcome
    }

    /// Bind `value` to a declaration target
    fn bind_pattern(&mut self, pattern: &Pattern, value: Value, env: &Env, kind: DeclKind, span: Span) -> Result<()> {
        match pattern {
            Pattern::Ident(name) => {
                env.borrow_mut()
                    .declare(name, value, kind.is_mutable(), kind == DeclKind::Var, span)
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    return Err(ScriptError::type_error(
                        span,
                        format!("Cannot destructure '{}' as it is {}.", value.to_display_string(), value.to_display_string()),
                    ));
                }
                for (key, target) in props {
                    let item = self.get_property(&value, key, span)?;
                    self.bind_pattern(target, item, env, kind, span)?;
                }
                if let Some(rest) = rest {
                    let remaining: PropertyMap = match &value {
                        Value::Object(map) => map
                            .borrow()
                            .iter()
                            .filter(|(k, _)| !props.iter().any(|(p, _)| p == *k))
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                        _ => PropertyMap::new(),
                    };
                    self.bind_pattern(&Pattern::Ident(rest.clone()), Value::object(remaining), env, kind, span)?;
                }
                Ok(())
            }
            Pattern::Array { items, rest } => {
                let values = self.iterate(&value, span)?;
                for (i, target) in items.iter().enumerate() {
                    if let Some(target) = target {
                        let item = values.get(i).cloned().unwrap_or_default();
                        self.bind_pattern(target, item, env, kind, span)?;
                    }
                }
                if let Some(rest) = rest {
                    let tail = values.get(items.len()..).map(<[Value]>::to_vec).unwrap_or_default();
                    self.bind_pattern(&Pattern::Ident(rest.clone()), Value::array(tail), env, kind, span)?;
                }
                Ok(())
            }
        }
    }

    /// Items visited by `for...of`, spread and array destructuring
    fn iterate(&self, value: &Value, span: Span) -> Result<Vec<Value>> {
        match value {
            Value::Array(items) => Ok(items.borrow().clone()),
            Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            other => Err(ScriptError::type_error(
                span,
                format!("{} is not iterable", describe_value(other)),
            )),
        }
    }

    // ===== Expressions =====

    fn eval_expr(&mut self, expr: &Expr, env: &Env) -> Result<Value> {
        match expr {
            Expr::Literal(literal, _) => Ok(literal_value(literal)),
            Expr::Template(parts, _) => self.eval_template(parts, env),
            Expr::Ident(name, span) => self.lookup(name, *span, env),
            Expr::Array(elements, _) => Ok(Value::array(self.eval_elements(elements, env)?)),
            Expr::Object(props, _) => self.eval_object(props, env),
            Expr::Function(decl) => Ok(closure(decl, env)),
            Expr::Unary(op, operand, span) => self.eval_unary(*op, operand, *span, env),
            Expr::Update {
                op,
                prefix,
                target,
                span,
            } => self.eval_update(*op, *prefix, target, *span, env),
            Expr::Binary(left, op, right, span) => {
                let left = self.eval_expr(left, env)?;
                let right = self.eval_expr(right, env)?;
                self.operate(*op, &left, &right, *span)
            }
            Expr::Logical(left, op, right, _) => {
                let left = self.eval_expr(left, env)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval_expr(right, env)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                if self.eval_expr(test, env)?.is_truthy() {
                    self.eval_expr(consequent, env)
                } else {
                    self.eval_expr(alternate, env)
                }
            }
            Expr::Assign {
                op,
                target,
                value,
                span,
            } => self.eval_assign(*op, target, value, *span, env),
            Expr::Member {
                object,
                property,
                optional,
                span,
            } => {
                let object = self.eval_expr(object, env)?;
                if *optional && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                self.get_property(&object, property, *span)
            }
            Expr::Index {
                object,
                index,
                optional,
                span,
            } => {
                let object = self.eval_expr(object, env)?;
                if *optional && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let index = self.eval_expr(index, env)?;
                self.get_index(&object, &index, *span)
            }
            Expr::Call {
                callee,
                args,
                optional,
                span,
            } => self.eval_call(callee, args, *optional, *span, env),
            Expr::New { callee, args, span } => {
                let ctor = self.eval_expr(callee, env)?;
                if !matches!(ctor, Value::Function(_)) {
                    return Err(ScriptError::type_error(
                        *span,
                        format!("{} is not a constructor", callee.label()),
                    ));
                }
                let args = self.eval_elements(args, env)?;
                self.call_function(&ctor, &args, *span)
            }
            // host calls complete synchronously
            Expr::Await(operand, _) => self.eval_expr(operand, env),
        }
    }

    fn lookup(&self, name: &str, span: Span, env: &Env) -> Result<Value> {
        env::lookup(env, name).ok_or_else(|| ScriptError::reference_error(span, format!("{} is not defined", name)))
    }

    fn eval_template(&mut self, parts: &[TemplatePart], env: &Env) -> Result<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                TemplatePart::Str(text) => out.push_str(text),
                TemplatePart::Expr(expr) => {
                    out.push_str(&self.eval_expr(expr, env)?.to_display_string());
                    self.check_string_len(out.len(), expr.span())?;
                }
            }
        }
        Ok(Value::String(out))
    }

    fn eval_elements(&mut self, elements: &[Element], env: &Env) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            match element {
                Element::Item(expr) => values.push(self.eval_expr(expr, env)?),
                Element::Spread(expr) => {
                    let source = self.eval_expr(expr, env)?;
                    let spread = self.iterate(&source, expr.span())?;
                    self.check_array_len(values.len().saturating_add(spread.len()), expr.span())?;
                    values.extend(spread);
                }
            }
        }
        Ok(values)
    }

    /// [`binary_op`] with the result held to the string length limit
    fn operate(&self, op: BinaryOp, left: &Value, right: &Value, span: Span) -> Result<Value> {
        let value = binary_op(op, left, right, span)?;
        if let Value::String(s) = &value {
            self.check_string_len(s.len(), span)?;
        }
        Ok(value)
    }

    /// RangeError when an array would grow past `max_collection_len`
    pub(crate) fn check_array_len(&self, len: usize, span: Span) -> Result<()> {
        if len > self.limits.max_collection_len {
            return Err(ScriptError::range_error(span, "Invalid array length"));
        }
        Ok(())
    }

    /// RangeError when a string would grow past `max_string_len` bytes
    pub(crate) fn check_string_len(&self, len: usize, span: Span) -> Result<()> {
        if len > self.limits.max_string_len {
            return Err(ScriptError::range_error(span, "Invalid string length"));
        }
        Ok(())
    }

    fn eval_object(&mut self, defs: &[PropDef], env: &Env) -> Result<Value> {
        let mut props = PropertyMap::new();
        for def in defs {
            match def {
                PropDef::KeyValue(key, value) => {
                    let key = match key {
                        PropKey::Named(name) => name.clone(),
                        PropKey::Computed(expr) => property_key(&self.eval_expr(expr, env)?),
                    };
                    let value = self.eval_expr(value, env)?;
                    props.insert(key, value);
                }
                PropDef::Spread(expr) => match self.eval_expr(expr, env)? {
                    Value::Object(source) => {
                        for (k, v) in source.borrow().iter() {
                            props.insert(k.clone(), v.clone());
                        }
                    }
                    Value::Array(items) => {
                        for (i, v) in items.borrow().iter().enumerate() {
                            props.insert(i.to_string(), v.clone());
                        }
                    }
                    Value::String(s) => {
                        for (i, c) in s.chars().enumerate() {
                            props.insert(i.to_string(), Value::String(c.to_string()));
                        }
                    }
                    _ => {}
                },
            }
        }
        Ok(Value::object(props))
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, span: Span, env: &Env) -> Result<Value> {
        if op == UnaryOp::Typeof {
            // `typeof undeclared` is not an error
            if let Expr::Ident(name, _) = operand {
                return Ok(Value::string(env::lookup(env, name).map_or("undefined", |v| v.type_of())));
            }
            return Ok(Value::string(self.eval_expr(operand, env)?.type_of()));
        }

        let value = self.eval_expr(operand, env)?;
        match (op, value) {
            (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
            (UnaryOp::Neg, Value::BigInt(n)) => n
                .checked_neg()
                .map(Value::BigInt)
                .ok_or_else(|| ScriptError::range_error(span, "Maximum BigInt size exceeded")),
            (UnaryOp::Neg, value) => Ok(Value::Number(-value.to_number())),
            (UnaryOp::Plus, Value::BigInt(_)) => Err(ScriptError::type_error(span, "Cannot convert a BigInt value to a number")),
            (UnaryOp::Plus, value) => Ok(Value::Number(value.to_number())),
            (UnaryOp::Typeof, value) => Ok(Value::string(value.type_of())),
        }
    }

    fn eval_update(&mut self, op: UpdateOp, prefix: bool, target: &Expr, span: Span, env: &Env) -> Result<Value> {
        let delta = match op {
            UpdateOp::Increment => 1,
            UpdateOp::Decrement => -1,
        };
        let step = |current: &Value| -> Result<(Value, Value)> {
            match current {
                Value::BigInt(n) => {
                    let next = n
                        .checked_add(delta)
                        .ok_or_else(|| ScriptError::range_error(span, "Maximum BigInt size exceeded"))?;
                    Ok((Value::BigInt(*n), Value::BigInt(next)))
                }
                other => {
                    let n = other.to_number();
                    Ok((Value::Number(n), Value::Number(n + delta as f64)))
                }
            }
        };

        let (old, new) = match target {
            Expr::Ident(name, ident_span) => {
                let current = self.lookup(name, *ident_span, env)?;
                let (old, new) = step(&current)?;
                env::assign(env, name, new.clone(), span)?;
                (old, new)
            }
            Expr::Member { object, property, .. } => {
                let object = self.eval_expr(object, env)?;
                let current = self.get_property(&object, property, span)?;
                let (old, new) = step(&current)?;
                self.set_property(&object, property, new.clone(), span)?;
                (old, new)
            }
            Expr::Index { object, index, .. } => {
                let object = self.eval_expr(object, env)?;
                let key = property_key(&self.eval_expr(index, env)?);
                let current = self.get_property(&object, &key, span)?;
                let (old, new) = step(&current)?;
                self.set_property(&object, &key, new.clone(), span)?;
                (old, new)
            }
            _ => {
                return Err(ScriptError::ParserError {
                    span,
                    message: "Invalid left-hand side expression in update operation".to_string(),
                })
            }
        };

        Ok(if prefix { new } else { old })
    }

    fn eval_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr, span: Span, env: &Env) -> Result<Value> {
        match target {
            Expr::Ident(name, ident_span) => {
                let value = match op.binary() {
                    Some(bin) => {
                        let current = self.lookup(name, *ident_span, env)?;
                        let rhs = self.eval_expr(value, env)?;
                        self.operate(bin, &current, &rhs, span)?
                    }
                    None => self.eval_expr(value, env)?,
                };
                env::assign(env, name, value.clone(), span)?;
                Ok(value)
            }
            Expr::Member { object, property, .. } => {
                let object = self.eval_expr(object, env)?;
                let value = self.compound_value(op, &object, property, value, span, env)?;
                self.set_property(&object, property, value.clone(), span)?;
                Ok(value)
            }
            Expr::Index { object, index, .. } => {
                let object = self.eval_expr(object, env)?;
                let key = property_key(&self.eval_expr(index, env)?);
                let value = self.compound_value(op, &object, &key, value, span, env)?;
                self.set_property(&object, &key, value.clone(), span)?;
                Ok(value)
            }
            _ => Err(ScriptError::ParserError {
                span,
                message: "Invalid left-hand side in assignment".to_string(),
            }),
        }
    }

    fn compound_value(
        &mut self,
        op: AssignOp,
        object: &Value,
        key: &str,
        value: &Expr,
        span: Span,
        env: &Env,
    ) -> Result<Value> {
        match op.binary() {
            Some(bin) => {
                let current = self.get_property(object, key, span)?;
                let rhs = self.eval_expr(value, env)?;
                self.operate(bin, &current, &rhs, span)
            }
            None => self.eval_expr(value, env),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Element], optional: bool, span: Span, env: &Env) -> Result<Value> {
        match callee {
            Expr::Member {
                object,
                property,
                optional: optional_member,
                ..
            } => {
                let receiver = self.eval_expr(object, env)?;
                if *optional_member && receiver.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let args = self.eval_elements(args, env)?;
                self.call_method(&receiver, property, &args, callee, optional, span)
            }
            Expr::Index {
                object,
                index,
                optional: optional_member,
                ..
            } => {
                let receiver = self.eval_expr(object, env)?;
                if *optional_member && receiver.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = property_key(&self.eval_expr(index, env)?);
                let args = self.eval_elements(args, env)?;
                self.call_method(&receiver, &key, &args, callee, optional, span)
            }
            _ => {
                let func = self.eval_expr(callee, env)?;
                if optional && func.is_nullish() {
                    return Ok(Value::Undefined);
                }
                if !matches!(func, Value::Function(_)) {
                    return Err(ScriptError::type_error(span, format!("{} is not a function", callee.label())));
                }
                let args = self.eval_elements(args, env)?;
                self.call_function(&func, &args, span)
            }
        }
    }

    /// `receiver.name(args)`: own function properties, then host methods,
    /// then the built-in methods of the receiver's type
    fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: &[Value],
        callee: &Expr,
        optional: bool,
        span: Span,
    ) -> Result<Value> {
        if let Value::Host(host) = receiver {
            let host = Rc::clone(host);
            if let Some(result) = host.call_method(self, name, args) {
                return result.map_err(|err| err.or_span(span));
            }
        }

        let member = self.get_property(receiver, name, span)?;
        if matches!(member, Value::Function(_)) {
            return self.call_function(&member, args, span);
        }

        if let Some(result) = methods::call(self, receiver, name, args) {
            return result.map_err(|err| err.or_span(span));
        }

        if optional && member.is_nullish() {
            return Ok(Value::Undefined);
        }
        Err(ScriptError::type_error(span, format!("{} is not a function", callee.label())))
    }

    fn call_function(&mut self, func: &Value, args: &[Value], span: Span) -> Result<Value> {
        let Value::Function(function) = func else {
            return Err(ScriptError::type_error(
                span,
                format!("{} is not a function", describe_value(func)),
            ));
        };

        if self.depth >= self.limits.max_call_depth {
            return Err(ScriptError::CallDepthExceeded {
                span,
                limit: self.limits.max_call_depth,
            });
        }
        self.tick(span)?;

        self.depth += 1;
        let result = match function.as_ref() {
            Function::Native(native) => {
                let func = Rc::clone(&native.func);
                func(self, args).map_err(|err| err.or_span(span))
            }
            Function::Closure { decl, env } => self.call_closure(decl, env, args, span),
        };
        self.depth -= 1;
        result
    }

    fn call_closure(&mut self, decl: &FunctionDecl, env: &Env, args: &[Value], span: Span) -> Result<Value> {
        let scope = Scope::child(env);

        for (i, param) in decl.params.iter().enumerate() {
            let value = if param.rest {
                Value::array(args.get(i..).map(<[Value]>::to_vec).unwrap_or_default())
            } else {
                match (args.get(i), &param.default) {
                    (Some(arg), _) if !matches!(arg, Value::Undefined) => arg.clone(),
                    (_, Some(default)) => self.eval_expr(default, &scope)?,
                    _ => Value::Undefined,
                }
            };
            self.bind_pattern(&param.pattern, value, &scope, DeclKind::Var, span)?;
        }

        match &decl.body {
            FunctionBody::Expr(expr) => self.eval_expr(expr, &scope),
            FunctionBody::Block(body) => match self.exec_body(body, &scope)? {
                Completion::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    // ===== Properties =====

    /// `object[key]` with a fast path for integer array indices
    fn get_index(&mut self, object: &Value, index: &Value, span: Span) -> Result<Value> {
        if let (Value::Array(items), Value::Number(n)) = (object, index) {
            if n.fract() == 0.0 && *n >= 0.0 {
                return Ok(items.borrow().get(*n as usize).cloned().unwrap_or_default());
            }
        }
        self.get_property(object, &property_key(index), span)
    }

    pub fn get_property(&self, object: &Value, key: &str, span: Span) -> Result<Value> {
        let value = match object {
            Value::Undefined | Value::Null => {
                return Err(ScriptError::type_error(
                    span,
                    format!(
                        "Cannot read properties of {} (reading '{}')",
                        object.to_display_string(),
                        key
                    ),
                ))
            }
            Value::String(s) => match key {
                "length" => Value::Number(s.chars().count() as f64),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or_default(),
            },
            Value::Array(items) => {
                let items = items.borrow();
                match key {
                    "length" => Value::Number(items.len() as f64),
                    _ => key
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| items.get(i).cloned())
                        .unwrap_or_default(),
                }
            }
            Value::Object(props) => props.borrow().get(key).cloned().unwrap_or_default(),
            Value::Function(func) => match (key, func.as_ref()) {
                ("name", func) => Value::string(func.name()),
                (_, Function::Native(native)) => native.props.get(key).cloned().unwrap_or_default(),
                _ => Value::Undefined,
            },
            Value::Host(host) => host.get(key).unwrap_or_default(),
            Value::Bool(_) | Value::Number(_) | Value::BigInt(_) => Value::Undefined,
        };
        Ok(value)
    }

    fn set_property(&mut self, object: &Value, key: &str, value: Value, span: Span) -> Result<()> {
        match object {
            Value::Object(props) => {
                props.borrow_mut().insert(key.to_string(), value);
            }
            Value::Array(items) => {
                let mut items = items.borrow_mut();
                if key == "length" {
                    let len = value.to_number();
                    if len.fract() != 0.0 || len < 0.0 || len > self.limits.max_collection_len as f64 {
                        return Err(ScriptError::range_error(span, "Invalid array length"));
                    }
                    items.resize(len as usize, Value::Undefined);
                } else if let Ok(index) = key.parse::<usize>() {
                    if index >= items.len() {
                        self.check_array_len(index.saturating_add(1), span)?;
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                }
            }
            Value::Undefined | Value::Null => {
                return Err(ScriptError::type_error(
                    span,
                    format!(
                        "Cannot set properties of {} (setting '{}')",
                        object.to_display_string(),
                        key
                    ),
                ))
            }
            // writes to primitives and host objects are dropped
            _ => {}
        }
        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.globals.borrow_mut().clear();
    }
}

fn closure(decl: &Rc<FunctionDecl>, env: &Env) -> Value {
    Value::Function(Rc::new(Function::Closure {
        decl: Rc::clone(decl),
        env: Rc::clone(env),
    }))
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Undefined => Value::Undefined,
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::BigInt(n) => Value::BigInt(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

/// Short description of a value for error messages
fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Array(_) | Value::Object(_) => "object".to_string(),
        other => other.to_display_string(),
    }
}

/// Property key of a computed member access
pub fn property_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(*n),
        other => other.to_display_string(),
    }
}

/// Enumerable keys, as visited by `for...in` and `Object.keys`
pub fn keys_of(value: &Value) -> Vec<String> {
    match value {
        Value::Object(props) => props.borrow().keys().cloned().collect(),
        Value::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
        Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn mixing_error(span: Span) -> ScriptError {
    ScriptError::type_error(span, "Cannot mix BigInt and other types, use explicit conversions")
}

fn overflow_error(span: Span) -> ScriptError {
    ScriptError::range_error(span, "Maximum BigInt size exceeded")
}

/// Arrays, objects and functions take part in `+` and `==` as strings
fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Host(_) => {
            Value::String(value.to_display_string())
        }
        other => other.clone(),
    }
}

/// Apply a binary operator to two evaluated operands
pub fn binary_op(op: BinaryOp, left: &Value, right: &Value, span: Span) -> Result<Value> {
    match op {
        BinaryOp::Add => add(left, right, span),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem | BinaryOp::Pow => {
            arithmetic(op, left, right, span)
        }
        BinaryOp::Eq => Ok(Value::Bool(left.loose_equals(right))),
        BinaryOp::Ne => Ok(Value::Bool(!left.loose_equals(right))),
        BinaryOp::StrictEq => Ok(Value::Bool(left.strict_equals(right))),
        BinaryOp::StrictNe => Ok(Value::Bool(!left.strict_equals(right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Ok(Value::Bool(compare(op, left, right))),
        BinaryOp::In => {
            let key = property_key(left);
            match right {
                Value::Object(props) => Ok(Value::Bool(props.borrow().contains_key(&key))),
                Value::Array(items) => Ok(Value::Bool(
                    key == "length" || key.parse::<usize>().is_ok_and(|i| i < items.borrow().len()),
                )),
                Value::Host(host) => Ok(Value::Bool(host.get(&key).is_some())),
                other => Err(ScriptError::type_error(
                    span,
                    format!("Cannot use 'in' operator to search for '{}' in {}", key, other.to_display_string()),
                )),
            }
        }
    }
}

fn add(left: &Value, right: &Value, span: Span) -> Result<Value> {
    if let (Value::BigInt(a), Value::BigInt(b)) = (left, right) {
        return a.checked_add(*b).map(Value::BigInt).ok_or_else(|| overflow_error(span));
    }

    let left = to_primitive(left);
    let right = to_primitive(right);
    match (&left, &right) {
        (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!(
            "{}{}",
            left.to_display_string(),
            right.to_display_string()
        ))),
        (Value::BigInt(_), _) | (_, Value::BigInt(_)) => Err(mixing_error(span)),
        _ => Ok(Value::Number(left.to_number() + right.to_number())),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value, span: Span) -> Result<Value> {
    match (left, right) {
        (Value::BigInt(a), Value::BigInt(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div | BinaryOp::Rem if b == 0 => {
                    return Err(ScriptError::range_error(span, "Division by zero"))
                }
                BinaryOp::Div => a.checked_div(b),
                BinaryOp::Rem => a.checked_rem(b),
                BinaryOp::Pow => {
                    let exp = u32::try_from(b)
                        .map_err(|_| ScriptError::range_error(span, "Exponent must be non-negative"))?;
                    a.checked_pow(exp)
                }
                _ => None,
            };
            result.map(Value::BigInt).ok_or_else(|| overflow_error(span))
        }
        (Value::BigInt(_), _) | (_, Value::BigInt(_)) => Err(mixing_error(span)),
        _ => {
            let (a, b) = (left.to_number(), right.to_number());
            let result = match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                BinaryOp::Pow => a.powf(b),
                _ => f64::NAN,
            };
            Ok(Value::Number(result))
        }
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    let ordering = match (to_primitive(left), to_primitive(right)) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(&b)),
        (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_value() {
        let mut interp = Interpreter::new();
        let value = interp.eval_source("const a = 2; return a * 21").unwrap();
        assert_eq!(value.as_number(), Some(42.0));
    }

    #[test]
    fn test_no_return_is_undefined() {
        let mut interp = Interpreter::new();
        let value = interp.eval_source("let x = 1").unwrap();
        assert!(matches!(value, Value::Undefined));
    }

    #[test]
    fn test_step_limit() {
        let mut interp = Interpreter::with_limits(ExecutionLimits {
            timeout: None,
            max_steps: Some(1_000),
            max_call_depth: 16,
            ..ExecutionLimits::default()
        });
        let err = interp.eval_source("while (true) {}").unwrap_err();
        assert!(matches!(err, ScriptError::StepLimitExceeded { limit: 1_000, .. }));
        assert!(!err.is_catchable());
    }

    #[test]
    fn test_timeout() {
        let mut interp = Interpreter::with_limits(ExecutionLimits {
            timeout: Some(Duration::from_millis(20)),
            max_steps: None,
            max_call_depth: 16,
            ..ExecutionLimits::default()
        });
        let err = interp.eval_source("let i = 0; while (true) { i++ }").unwrap_err();
        assert!(matches!(err, ScriptError::Timeout { limit_ms: 20, .. }));
    }
}
