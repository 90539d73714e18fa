//! Field registry: every resolvable field path and its resolver.
//!
//! Resolvers are type-erased async functions keyed by `Type.field`. A field
//! whose policy may check ownership also registers an owner lookup, run by
//! the gate before admission and only when the policy needs it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use catgraph_admission::IdentityContext;

use crate::resolvers::ResolveError;
use crate::state::AppState;

pub type ResolveFuture = BoxFuture<'static, Result<Value, ResolveError>>;
pub type ResolveFn = Arc<dyn Fn(ResolveCtx) -> ResolveFuture + Send + Sync>;

pub type OwnerFuture = BoxFuture<'static, Result<Option<String>, ResolveError>>;
pub type OwnerFn = Arc<dyn Fn(AppState, Map<String, Value>) -> OwnerFuture + Send + Sync>;

/// Everything a resolver sees.
pub struct ResolveCtx {
    pub state: AppState,
    pub caller: IdentityContext,
    pub args: Map<String, Value>,
    /// The enclosing object, for child fields such as `Cat.owner`.
    pub parent: Option<Value>,
}

/// Root operation a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    fn of(type_name: &str) -> Option<Self> {
        match type_name {
            "Query" => Some(Self::Query),
            "Mutation" => Some(Self::Mutation),
            _ => None,
        }
    }
}

/// What a field returns, as far as child selections are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Cat,
    CatList,
    Other,
}

impl ReturnShape {
    pub fn child_type(self) -> Option<&'static str> {
        match self {
            Self::Cat | Self::CatList => Some("Cat"),
            Self::Other => None,
        }
    }
}

#[derive(Clone)]
pub struct FieldDef {
    path: String,
    operation: Option<OperationKind>,
    shape: ReturnShape,
    resolver: ResolveFn,
    owner: Option<OwnerFn>,
}

impl FieldDef {
    pub fn new<F, Fut>(type_name: &str, field_name: &str, shape: ReturnShape, resolver: F) -> Self
    where
        F: Fn(ResolveCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
    {
        Self {
            path: format!("{type_name}.{field_name}"),
            operation: OperationKind::of(type_name),
            shape,
            resolver: Arc::new(move |ctx| Box::pin(resolver(ctx))),
            owner: None,
        }
    }

    /// Attach the lookup that finds the owner of the resource `args` name.
    pub fn with_owner<F, Fut>(mut self, lookup: F) -> Self
    where
        F: Fn(AppState, Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<String>, ResolveError>> + Send + 'static,
    {
        self.owner = Some(Arc::new(move |state, args| Box::pin(lookup(state, args))));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The part after the dot.
    pub fn field_name(&self) -> &str {
        self.path
            .split_once('.')
            .map_or(self.path.as_str(), |(_, field)| field)
    }

    /// `None` for child fields.
    pub fn operation(&self) -> Option<OperationKind> {
        self.operation
    }

    pub fn shape(&self) -> ReturnShape {
        self.shape
    }

    pub(crate) fn resolve(&self, ctx: ResolveCtx) -> ResolveFuture {
        (self.resolver)(ctx)
    }

    pub(crate) fn owner_lookup(&self) -> Option<&OwnerFn> {
        self.owner.as_ref()
    }
}

impl std::fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef")
            .field("path", &self.path)
            .field("operation", &self.operation)
            .field("shape", &self.shape)
            .field("owner_lookup", &self.owner.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: HashMap<String, FieldDef>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any earlier definition of the same path.
    pub fn register(&mut self, def: FieldDef) {
        self.fields.insert(def.path.clone(), def);
    }

    pub fn get(&self, path: &str) -> Option<&FieldDef> {
        self.fields.get(path)
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn constant(_ctx: ResolveCtx) -> Result<Value, ResolveError> {
        Ok(Value::Bool(true))
    }

    #[test]
    fn operation_follows_type_name() {
        let query = FieldDef::new("Query", "cats", ReturnShape::CatList, constant);
        let child = FieldDef::new("Cat", "owner", ReturnShape::Other, constant);
        assert_eq!(query.path(), "Query.cats");
        assert_eq!(query.operation(), Some(OperationKind::Query));
        assert_eq!(child.operation(), None);
        assert_eq!(ReturnShape::CatList.child_type(), Some("Cat"));
    }

    #[test]
    fn register_replaces_and_sorts() {
        let mut registry = FieldRegistry::new();
        registry.register(FieldDef::new("Query", "users", ReturnShape::Other, constant));
        registry.register(FieldDef::new("Query", "cats", ReturnShape::CatList, constant));
        registry.register(FieldDef::new("Query", "cats", ReturnShape::CatList, constant));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.paths(), vec!["Query.cats", "Query.users"]);
    }
}
