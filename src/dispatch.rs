//! Method registry and argument binding.
//!
//! Handlers declare their parameter names up front ([`ParamSchema`]) instead
//! of being inspected reflectively. The dispatcher uses that schema to bind
//! positional or named params into a single ordered argument list, and to
//! produce the same arity/keyword-mismatch wording a dynamically dispatched
//! handler would.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::Params;

/// The ordered, named positional parameters a handler accepts. All
/// parameters are currently required; there is no support for optional or
/// variadic parameters (see `SPEC_FULL.md` Open Questions).
#[derive(Debug, Clone, Default)]
pub struct ParamSchema {
    pub names: Vec<&'static str>,
}

impl ParamSchema {
    pub fn new(names: &[&'static str]) -> Self {
        ParamSchema {
            names: names.to_vec(),
        }
    }

    pub fn none() -> Self {
        ParamSchema { names: Vec::new() }
    }

    pub fn arity(&self) -> usize {
        self.names.len()
    }
}

/// Bound arguments, normalized into handler-declared order regardless of
/// whether the caller sent a positional array or a named object.
#[derive(Debug, Clone, Default)]
pub struct Args(pub Vec<Value>);

impl Args {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }
}

/// A registered JSON-RPC method.
#[async_trait]
pub trait Handler: Send + Sync {
    fn schema(&self) -> &ParamSchema;
    async fn call(&self, args: Args) -> Result<Value>;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Adapts a plain async closure into a [`Handler`], the way most methods end
/// up being registered in practice.
pub struct FnHandler<F> {
    schema: ParamSchema,
    func: F,
}

impl<F> FnHandler<F> {
    pub fn new(schema: ParamSchema, func: F) -> Self {
        FnHandler { schema, func }
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(Args) -> BoxFuture<'a, Result<Value>> + Send + Sync,
{
    fn schema(&self) -> &ParamSchema {
        &self.schema
    }

    async fn call(&self, args: Args) -> Result<Value> {
        (self.func)(args).await
    }
}

/// Immutable, shareable table of method name -> handler.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
}

impl MethodRegistry {
    pub fn builder() -> MethodRegistryBuilder {
        MethodRegistryBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(name)
    }
}

#[derive(Default)]
pub struct MethodRegistryBuilder {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl MethodRegistryBuilder {
    pub fn new() -> Self {
        MethodRegistryBuilder {
            handlers: HashMap::new(),
        }
    }

    pub fn method<H: Handler + 'static>(mut self, name: impl Into<String>, handler: H) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn method_fn<F>(self, name: impl Into<String>, schema: ParamSchema, func: F) -> Self
    where
        F: for<'a> Fn(Args) -> BoxFuture<'a, Result<Value>> + Send + Sync + 'static,
    {
        self.method(name, FnHandler::new(schema, func))
    }

    pub fn build(self) -> MethodRegistry {
        MethodRegistry {
            handlers: Arc::new(self.handlers),
        }
    }
}

/// Looks up `method` and binds `params` against its schema, then invokes it.
pub async fn dispatch_call(
    registry: &MethodRegistry,
    method: &str,
    params: Option<Params>,
) -> Result<Value> {
    let handler = registry
        .get(method)
        .ok_or_else(|| Error::MethodNotFound(method.to_string()))?;
    let args = bind_args(method, handler.schema(), params)?;
    handler.call(args).await
}

/// Binds positional or named params against a schema, producing the same
/// family of messages a dynamically typed dispatcher would:
/// `jsonrpc_<name>() takes N positional arguments but M were given`,
/// `jsonrpc_<name>() missing N required positional argument(s): '...'`, and
/// `jsonrpc_<name>() got an unexpected keyword argument '...'`.
pub fn bind_args(display_name: &str, schema: &ParamSchema, params: Option<Params>) -> Result<Args> {
    let arity = schema.arity();
    match params {
        None => {
            if arity == 0 {
                Ok(Args(Vec::new()))
            } else {
                Err(Error::InvalidParams(missing_message(display_name, &schema.names)))
            }
        }
        Some(Params::Positional(values)) => {
            if values.len() != arity {
                Err(Error::InvalidParams(positional_mismatch_message(
                    display_name,
                    arity,
                    values.len(),
                )))
            } else {
                Ok(Args(values))
            }
        }
        Some(Params::Named(map)) => {
            for key in map.keys() {
                if !schema.names.contains(&key.as_str()) {
                    return Err(Error::InvalidParams(format!(
                        "jsonrpc_{display_name}() got an unexpected keyword argument '{key}'"
                    )));
                }
            }
            let mut missing: Vec<&'static str> = Vec::new();
            let mut values = Vec::with_capacity(arity);
            for name in &schema.names {
                match map.get(*name) {
                    Some(v) => values.push(v.clone()),
                    None => missing.push(name),
                }
            }
            if missing.is_empty() {
                Ok(Args(values))
            } else {
                Err(Error::InvalidParams(missing_message(display_name, &missing)))
            }
        }
    }
}

fn positional_mismatch_message(name: &str, arity: usize, given: usize) -> String {
    let takes = arity + 1;
    let given_count = given + 1;
    let plural = if takes == 1 { "argument" } else { "arguments" };
    format!("jsonrpc_{name}() takes {takes} positional {plural} but {given_count} were given")
}

fn missing_message(name: &str, missing: &[&'static str]) -> String {
    let count = missing.len();
    let plural = if count == 1 { "argument" } else { "arguments" };
    let list = missing
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("jsonrpc_{name}() missing {count} required positional {plural}: {list}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn positional_arity_mismatch_matches_legacy_wording() {
        let schema = ParamSchema::new(&["data"]);
        let err = bind_args(
            "echo",
            &schema,
            Some(Params::Positional(vec![json!("abc"), json!("def")])),
        )
        .unwrap_err();
        assert_eq!(
            err.message(),
            "jsonrpc_echo() takes 2 positional arguments but 3 were given"
        );
    }

    #[test]
    fn zero_arity_mismatch_uses_singular_argument() {
        let schema = ParamSchema::none();
        let err = bind_args(
            "sql",
            &schema,
            Some(Params::Positional(vec![json!("aa"), json!("bb")])),
        )
        .unwrap_err();
        assert_eq!(
            err.message(),
            "jsonrpc_sql() takes 1 positional argument but 3 were given"
        );
    }

    #[test]
    fn missing_required_named_param() {
        let schema = ParamSchema::new(&["data"]);
        let mut map = serde_json::Map::new();
        map.insert("wrongname".to_string(), json!("arg"));
        let err = bind_args("echo", &schema, Some(Params::Named(map))).unwrap_err();
        assert_eq!(
            err.message(),
            "jsonrpc_echo() got an unexpected keyword argument 'wrongname'"
        );
    }

    #[test]
    fn absent_params_with_required_schema_is_missing_not_arity() {
        let schema = ParamSchema::new(&["data"]);
        let err = bind_args("echo", &schema, None).unwrap_err();
        assert_eq!(
            err.message(),
            "jsonrpc_echo() missing 1 required positional argument: 'data'"
        );
    }

    #[test]
    fn positional_params_in_order_bind_correctly() {
        let schema = ParamSchema::new(&["data"]);
        let args = bind_args("echo", &schema, Some(Params::Positional(vec![json!("hi")]))).unwrap();
        assert_eq!(args.get(0), Some(&json!("hi")));
    }

    #[test]
    fn named_params_reorder_into_schema_order() {
        let schema = ParamSchema::new(&["a", "b"]);
        let mut map = serde_json::Map::new();
        map.insert("b".to_string(), json!(2));
        map.insert("a".to_string(), json!(1));
        let args = bind_args("pair", &schema, Some(Params::Named(map))).unwrap();
        assert_eq!(args.0, vec![json!(1), json!(2)]);
    }
}
