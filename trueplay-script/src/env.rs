//! Lexical scopes

use crate::error::{Result, ScriptError, Span};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope; closures keep their defining scope alive
pub type Env = Rc<RefCell<Scope>>;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

#[derive(Default)]
pub struct Scope {
    vars: HashMap<String, Binding>,
    parent: Option<Env>,
}

impl Scope {
    /// Fresh root scope
    pub fn root() -> Env {
        Rc::new(RefCell::new(Scope::default()))
    }

    /// Child scope of `parent`
    pub fn child(parent: &Env) -> Env {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    /// Bind a name in this scope.
    ///
    /// `let`/`const` may not rebind a name already declared in the same scope.
    pub fn declare(&mut self, name: &str, value: Value, mutable: bool, redeclare: bool, span: Span) -> Result<()> {
        if !redeclare && self.vars.contains_key(name) {
            return Err(ScriptError::ParserError {
                span,
                message: format!("Identifier '{}' has already been declared", name),
            });
        }
        self.vars.insert(name.to_string(), Binding { value, mutable });
        Ok(())
    }

    /// Bind or overwrite a mutable name
    pub fn define(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), Binding { value, mutable: true });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Remove every binding, breaking closure reference cycles
    pub fn clear(&mut self) {
        self.vars.clear();
    }
}

/// Look a name up through the scope chain
pub fn lookup(env: &Env, name: &str) -> Option<Value> {
    let mut current = Rc::clone(env);
    loop {
        let next = {
            let scope = current.borrow();
            if let Some(binding) = scope.vars.get(name) {
                return Some(binding.value.clone());
            }
            scope.parent.clone()?
        };
        current = next;
    }
}

/// Assign to the nearest binding of `name`
pub fn assign(env: &Env, name: &str, value: Value, span: Span) -> Result<()> {
    let mut current = Rc::clone(env);
    loop {
        let next = {
            let mut scope = current.borrow_mut();
            if let Some(binding) = scope.vars.get_mut(name) {
                if !binding.mutable {
                    return Err(ScriptError::type_error(span, "Assignment to constant variable."));
                }
                binding.value = value;
                return Ok(());
            }
            scope.parent.clone()
        };
        match next {
            Some(parent) => current = parent,
            None => return Err(ScriptError::reference_error(span, format!("{} is not defined", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing_and_assign() {
        let root = Scope::root();
        root.borrow_mut()
            .declare("x", Value::Number(1.0), true, false, Span::default())
            .unwrap();
        let inner = Scope::child(&root);
        inner
            .borrow_mut()
            .declare("x", Value::Number(2.0), true, false, Span::default())
            .unwrap();

        assign(&inner, "x", Value::Number(3.0), Span::default()).unwrap();
        assert_eq!(lookup(&inner, "x").and_then(|v| v.as_number()), Some(3.0));
        assert_eq!(lookup(&root, "x").and_then(|v| v.as_number()), Some(1.0));
    }

    #[test]
    fn test_const_and_undeclared() {
        let root = Scope::root();
        root.borrow_mut()
            .declare("c", Value::Null, false, false, Span::default())
            .unwrap();
        assert!(matches!(
            assign(&root, "c", Value::Null, Span::default()),
            Err(ScriptError::TypeError { .. })
        ));
        assert!(matches!(
            assign(&root, "missing", Value::Null, Span::default()),
            Err(ScriptError::ReferenceError { .. })
        ));
        assert!(root
            .borrow_mut()
            .declare("c", Value::Null, false, false, Span::default())
            .is_err());
    }
}
