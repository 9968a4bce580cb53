//! Scopes of bound values.
//!
//! A [`RuntimeContext`] is immutable once built. Executing a `fetch`, a
//! `foreach` iteration or a `concurrently` block builds a new context that
//! points at its parent; lookups walk outward through that chain. Contexts
//! are shared between concurrent branches through `Arc` and never need a
//! lock.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde_json::Value;

use crate::ast::{Binding, StringTemplate, TemplatePart, ValueRef, ValueSpec};
use crate::error::RuntimeError;

#[derive(Debug)]
pub struct RuntimeContext {
    values: Arc<HashMap<Binding, Value>>,
    parent: Option<Arc<RuntimeContext>>,
    concurrency: NonZeroUsize,
}

impl RuntimeContext {
    /// An empty top-level scope.
    pub fn root(concurrency: NonZeroUsize) -> Arc<Self> {
        Self::with_values(HashMap::new(), concurrency)
    }

    /// A top-level scope pre-populated with `values`.
    pub fn with_values(values: HashMap<Binding, Value>, concurrency: NonZeroUsize) -> Arc<Self> {
        Arc::new(Self {
            values: Arc::new(values),
            parent: None,
            concurrency,
        })
    }

    /// A child scope binding `name` to `value`, with the same concurrency bound.
    pub fn child(self: &Arc<Self>, name: Binding, value: Value) -> Arc<Self> {
        let mut values = HashMap::with_capacity(1);
        values.insert(name, value);
        Arc::new(Self {
            values: Arc::new(values),
            parent: Some(Arc::clone(self)),
            concurrency: self.concurrency,
        })
    }

    /// The same scope with a different concurrency bound.
    pub fn with_concurrency(self: &Arc<Self>, concurrency: NonZeroUsize) -> Arc<Self> {
        Arc::new(Self {
            values: Arc::clone(&self.values),
            parent: self.parent.clone(),
            concurrency,
        })
    }

    pub fn concurrency(&self) -> NonZeroUsize {
        self.concurrency
    }

    pub fn parent(&self) -> Option<&Arc<RuntimeContext>> {
        self.parent.as_ref()
    }

    fn lookup(&self, name: &Binding) -> Option<&Value> {
        match self.values.get(name) {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|p| p.lookup(name)),
        }
    }

    /// Reads `spec` from `bound`, mapping a path miss to `ValueNotFound`.
    fn read(spec: &ValueSpec, bound: Option<&Value>) -> Result<Value, RuntimeError> {
        bound
            .and_then(|value| spec.path.read(value).ok())
            .ok_or_else(|| not_found(spec))
    }

    /// Resolves `spec` through the scope chain as text.
    ///
    /// Strings are returned as-is and numbers in their JSON form; any other
    /// kind of value is an `InvalidValueType`.
    pub fn get_string(&self, spec: &ValueSpec) -> Result<String, RuntimeError> {
        match Self::read(spec, self.lookup(&spec.name))? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(invalid_type(spec)),
        }
    }

    /// Resolves `spec` in this scope only (parents are not consulted) and
    /// requires an array.
    pub fn get_sequence(&self, spec: &ValueSpec) -> Result<Vec<Value>, RuntimeError> {
        match Self::read(spec, self.values.get(&spec.name))? {
            Value::Array(items) => Ok(items),
            _ => Err(invalid_type(spec)),
        }
    }

    /// Renders `template`, stopping at the first reference that fails.
    pub fn render(&self, template: &StringTemplate) -> Result<String, RuntimeError> {
        template
            .parts()
            .iter()
            .try_fold(String::new(), |mut out, part| {
                match part {
                    TemplatePart::Literal(text) => out.push_str(text),
                    TemplatePart::Reference(spec) => out.push_str(&self.get_string(spec)?),
                }
                Ok(out)
            })
    }

    pub fn resolve(&self, value: &ValueRef) -> Result<String, RuntimeError> {
        match value {
            ValueRef::Spec(spec) => self.get_string(spec),
            ValueRef::Template(template) => self.render(template),
        }
    }
}

fn not_found(spec: &ValueSpec) -> RuntimeError {
    RuntimeError::ValueNotFound {
        name: spec.name.to_string(),
        path: spec.path.suffix().to_string(),
    }
}

fn invalid_type(spec: &ValueSpec) -> RuntimeError {
    RuntimeError::InvalidValueType {
        name: spec.name.to_string(),
        path: spec.path.suffix().to_string(),
    }
}
