//! Component definitions.
//!
//! A component is a pure function from props and context reads to a tree
//! snapshot. The only side effects allowed inside it are the hook
//! registrations on [`RenderCtx`](crate::runtime::RenderCtx): declaring state
//! cells, declaring effects, providing context. Everything observable happens
//! later, driven by the scheduler.
//!
//! Prop shapes are declared once per definition as a [`ParamSpec`] and
//! validated when an instance mounts or receives new props, so a malformed
//! prop bag aborts the pass instead of leaking into a render.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::config;
use crate::error::EngineError;
use crate::runtime::RenderCtx;
use crate::tree::Node;
use crate::types::{Value, ValueKind};

/// Render function: `(props, context reads) -> snapshot`.
pub type RenderFn = Rc<dyn Fn(&mut RenderCtx) -> Result<Node, EngineError>>;

// =============================================================================
// ParamSpec
// =============================================================================

/// Statically declared parameter record for a component definition.
#[derive(Clone, Debug, Default)]
pub struct ParamSpec {
    fields: BTreeMap<String, ParamField>,
}

#[derive(Clone, Debug)]
struct ParamField {
    kind: ValueKind,
    required: bool,
}

impl ParamSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required field.
    pub fn required(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.insert(name.into(), ParamField { kind, required: true });
        self
    }

    /// Declare an optional field.
    pub fn optional(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.insert(name.into(), ParamField { kind, required: false });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check a prop bag against this record. `Null` props count as an empty
    /// record. With `strict` set, fields outside the declaration are rejected.
    pub fn validate(
        &self,
        component: &str,
        props: &Value,
        strict: bool,
    ) -> Result<(), EngineError> {
        let empty = BTreeMap::new();
        let fields = match props {
            Value::Null => &empty,
            Value::Record(fields) => fields,
            other => {
                return Err(EngineError::PropShape {
                    component: component.to_string(),
                    reason: format!("props must be a record, got {}", other.kind()),
                });
            }
        };

        for (name, spec) in &self.fields {
            match fields.get(name) {
                Some(value) if value.kind() != spec.kind => {
                    return Err(EngineError::PropShape {
                        component: component.to_string(),
                        reason: format!(
                            "field `{name}` has kind {}, expected {}",
                            value.kind(),
                            spec.kind
                        ),
                    });
                }
                None if spec.required => {
                    return Err(EngineError::PropShape {
                        component: component.to_string(),
                        reason: format!("missing required field `{name}`"),
                    });
                }
                _ => {}
            }
        }

        if strict {
            for name in fields.keys() {
                if !self.fields.contains_key(name) {
                    return Err(EngineError::PropShape {
                        component: component.to_string(),
                        reason: format!("unknown field `{name}`"),
                    });
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// ComponentDef
// =============================================================================

/// A component definition: name, declared parameter record, render function.
///
/// Definitions are shared behind `Rc`; pointer identity is the type identity
/// the reconciler uses, so two definitions with the same name are still
/// distinct types.
pub struct ComponentDef {
    name: String,
    params: ParamSpec,
    render: RenderFn,
}

impl ComponentDef {
    pub fn new(
        name: impl Into<String>,
        params: ParamSpec,
        render: impl Fn(&mut RenderCtx) -> Result<Node, EngineError> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            params,
            render: Rc::new(render),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn render(&self, ctx: &mut RenderCtx) -> Result<Node, EngineError> {
        (self.render)(ctx)
    }

    pub(crate) fn validate_props(&self, props: &Value) -> Result<(), EngineError> {
        self.params
            .validate(&self.name, props, config::get().strict_props)
    }

    /// Reconciler type identity.
    pub fn same_def(a: &Rc<ComponentDef>, b: &Rc<ComponentDef>) -> bool {
        Rc::ptr_eq(a, b)
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ParamSpec {
        ParamSpec::new()
            .required("a", ValueKind::Int)
            .optional("label", ValueKind::Str)
    }

    #[test]
    fn test_validate_ok() {
        let props = Value::record([("a", Value::Int(5555))]);
        spec().validate("c1", &props, true).unwrap();

        let with_optional =
            Value::record([("a", Value::Int(1)), ("label", Value::from("hi"))]);
        spec().validate("c1", &with_optional, true).unwrap();
    }

    #[test]
    fn test_validate_missing_required() {
        let err = spec().validate("c1", &Value::Null, true).unwrap_err();
        assert!(matches!(err, EngineError::PropShape { .. }));
    }

    #[test]
    fn test_validate_kind_mismatch() {
        let props = Value::record([("a", Value::from("not an int"))]);
        let err = spec().validate("c1", &props, true).unwrap_err();
        assert!(matches!(err, EngineError::PropShape { .. }));
    }

    #[test]
    fn test_validate_unknown_field_strict_only() {
        let props = Value::record([("a", Value::Int(1)), ("extra", Value::Int(2))]);
        assert!(spec().validate("c1", &props, true).is_err());
        spec().validate("c1", &props, false).unwrap();
    }

    #[test]
    fn test_empty_spec_accepts_null() {
        ParamSpec::new().validate("bare", &Value::Null, true).unwrap();
    }

    #[test]
    fn test_same_def_is_pointer_identity() {
        let a = ComponentDef::new("x", ParamSpec::new(), |_| Ok(Node::text("")));
        let b = ComponentDef::new("x", ParamSpec::new(), |_| Ok(Node::text("")));
        assert!(ComponentDef::same_def(&a, &a.clone()));
        assert!(!ComponentDef::same_def(&a, &b));
    }
}
