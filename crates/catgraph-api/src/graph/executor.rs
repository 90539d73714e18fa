//! # Document Execution
//!
//! A document is planned against the [`FieldRegistry`] first. Planning
//! rejects the whole request (400) for unknown fields, mixed operations,
//! duplicate response keys and child selections on fields that do not
//! return cats. Nothing is admitted or resolved for a rejected document.
//!
//! Execution then admits and resolves each root field independently:
//!
//! - Query fields run concurrently; mutation fields run one after another in
//!   document order.
//! - A denied or failed field is `null` and contributes one error. Siblings
//!   are unaffected.
//! - Child fields (`Cat.owner`) are admitted and resolved once per returned
//!   cat, after the root field succeeds.

use std::collections::HashSet;

use futures::future::join_all;
use serde_json::{Map, Value};

use catgraph_admission::{FieldPath, GateError, IdentityContext};

use crate::error::AppError;
use crate::graph::registry::{FieldDef, FieldRegistry, OperationKind, ResolveCtx};
use crate::graph::request::QueryDocument;
use crate::graph::response::{FieldError, GraphResponse, PathSegment};
use crate::resolvers::ResolveError;
use crate::state::AppState;

/// A validated document.
#[derive(Debug)]
pub struct Plan<'a> {
    pub operation: OperationKind,
    pub fields: Vec<PlannedField<'a>>,
}

#[derive(Debug)]
pub struct PlannedField<'a> {
    pub key: String,
    pub def: &'a FieldDef,
    pub args: Map<String, Value>,
    pub children: Vec<&'a FieldDef>,
}

/// Validate `document` against `registry`.
pub fn plan(registry: &FieldRegistry, document: QueryDocument) -> Result<Plan<'_>, AppError> {
    if document.selections.is_empty() {
        return Err(AppError::BadRequest("document has no selections".into()));
    }

    let mut operation = None;
    let mut keys = HashSet::new();
    let mut fields = Vec::with_capacity(document.selections.len());

    for selection in document.selections {
        let path = FieldPath::parse(&selection.field)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let def = registry
            .get(&path.to_string())
            .ok_or_else(|| AppError::BadRequest(format!("unknown field {path}")))?;
        let kind = def
            .operation()
            .ok_or_else(|| AppError::BadRequest(format!("{path} is not a Query or Mutation field")))?;
        match operation {
            None => operation = Some(kind),
            Some(existing) if existing != kind => {
                return Err(AppError::BadRequest(
                    "a document may not mix Query and Mutation fields".into(),
                ));
            }
            Some(_) => {}
        }

        let key = match selection.alias {
            Some(alias) if alias.trim().is_empty() => {
                return Err(AppError::BadRequest(format!("empty alias on {path}")));
            }
            Some(alias) => alias,
            None => path.field_name().to_string(),
        };
        if !keys.insert(key.clone()) {
            return Err(AppError::BadRequest(format!("duplicate response key '{key}'")));
        }

        let mut children = Vec::with_capacity(selection.select.len());
        for child in &selection.select {
            let child_type = def.shape().child_type().ok_or_else(|| {
                AppError::BadRequest(format!("{path} has no selectable child fields"))
            })?;
            let child_def = registry
                .get(&format!("{child_type}.{child}"))
                .ok_or_else(|| AppError::BadRequest(format!("unknown field {child_type}.{child}")))?;
            if children.iter().any(|c: &&FieldDef| c.path() == child_def.path()) {
                return Err(AppError::BadRequest(format!("{child} selected twice on {path}")));
            }
            children.push(child_def);
        }

        fields.push(PlannedField {
            key,
            def,
            args: selection.args,
            children,
        });
    }

    let operation = operation.ok_or_else(|| AppError::BadRequest("document has no selections".into()))?;
    Ok(Plan { operation, fields })
}

/// Plan and run `document` on behalf of `caller`.
pub async fn execute(
    state: &AppState,
    caller: &IdentityContext,
    document: QueryDocument,
) -> Result<GraphResponse, AppError> {
    let plan = plan(&state.registry, document)?;
    tracing::debug!(
        operation = ?plan.operation,
        fields = plan.fields.len(),
        request_id = caller.request_id(),
        "executing document"
    );

    let outcomes = match plan.operation {
        OperationKind::Query => {
            join_all(plan.fields.into_iter().map(|f| resolve_field(state, caller, f))).await
        }
        OperationKind::Mutation => {
            let mut outcomes = Vec::with_capacity(plan.fields.len());
            for field in plan.fields {
                outcomes.push(resolve_field(state, caller, field).await);
            }
            outcomes
        }
    };

    let mut response = GraphResponse {
        data: Map::new(),
        errors: Vec::new(),
    };
    for (key, value, errors) in outcomes {
        response.data.insert(key, value);
        response.errors.extend(errors);
    }
    Ok(response)
}

async fn resolve_field(
    state: &AppState,
    caller: &IdentityContext,
    field: PlannedField<'_>,
) -> (String, Value, Vec<FieldError>) {
    let PlannedField {
        key,
        def,
        args,
        children,
    } = field;

    let mut value = match run_gated(state, caller, def, args).await {
        Ok(value) => value,
        Err(err) => {
            let error = FieldError::from_gate(err, def.path(), vec![key.as_str().into()]);
            return (key, Value::Null, vec![error]);
        }
    };

    let mut errors = Vec::new();
    for child in children {
        resolve_children(state, caller, &key, child, &mut value, &mut errors).await;
    }
    (key, value, errors)
}

async fn run_gated(
    state: &AppState,
    caller: &IdentityContext,
    def: &FieldDef,
    args: Map<String, Value>,
) -> Result<Value, GateError<ResolveError>> {
    let ctx = ResolveCtx {
        state: state.clone(),
        caller: caller.clone(),
        args: args.clone(),
        parent: None,
    };
    match def.owner_lookup() {
        Some(lookup) => {
            state
                .gate
                .guard_owned(def.path(), caller, || lookup(state.clone(), args), || def.resolve(ctx))
                .await
        }
        None => state.gate.guard(def.path(), caller, || def.resolve(ctx)).await,
    }
}

/// Resolve `child` on every cat in `value`, writing results in place.
async fn resolve_children(
    state: &AppState,
    caller: &IdentityContext,
    key: &str,
    child: &FieldDef,
    value: &mut Value,
    errors: &mut Vec<FieldError>,
) {
    let name = child.field_name();
    match value {
        Value::Array(items) => {
            let results = join_all(items.iter().enumerate().map(|(i, item)| {
                let path = vec![key.into(), i.into(), name.into()];
                resolve_child(state, caller, child, item.clone(), path)
            }))
            .await;
            for (item, result) in items.iter_mut().zip(results) {
                write_child(item, name, result, errors);
            }
        }
        Value::Object(_) => {
            let path = vec![key.into(), name.into()];
            let result = resolve_child(state, caller, child, value.clone(), path).await;
            write_child(value, name, result, errors);
        }
        _ => {}
    }
}

async fn resolve_child(
    state: &AppState,
    caller: &IdentityContext,
    child: &FieldDef,
    parent: Value,
    path: Vec<PathSegment>,
) -> Result<Value, FieldError> {
    let ctx = ResolveCtx {
        state: state.clone(),
        caller: caller.clone(),
        args: Map::new(),
        parent: Some(parent),
    };
    state
        .gate
        .guard(child.path(), caller, || child.resolve(ctx))
        .await
        .map_err(|err| FieldError::from_gate(err, child.path(), path))
}

fn write_child(
    target: &mut Value,
    name: &str,
    result: Result<Value, FieldError>,
    errors: &mut Vec<FieldError>,
) {
    let resolved = result.unwrap_or_else(|err| {
        errors.push(err);
        Value::Null
    });
    if let Value::Object(object) = target {
        object.insert(name.to_string(), resolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::registry::ReturnShape;
    use crate::graph::request::Selection;

    async fn constant(_ctx: ResolveCtx) -> Result<Value, ResolveError> {
        Ok(Value::Null)
    }

    fn registry() -> FieldRegistry {
        let mut registry = FieldRegistry::new();
        registry.register(FieldDef::new("Query", "cats", ReturnShape::CatList, constant));
        registry.register(FieldDef::new("Query", "users", ReturnShape::Other, constant));
        registry.register(FieldDef::new("Mutation", "deleteCat", ReturnShape::Cat, constant));
        registry.register(FieldDef::new("Cat", "owner", ReturnShape::Other, constant));
        registry
    }

    fn select(field: &str) -> Selection {
        Selection {
            field: field.to_string(),
            alias: None,
            args: Map::new(),
            select: Vec::new(),
        }
    }

    fn doc(selections: Vec<Selection>) -> QueryDocument {
        QueryDocument { selections }
    }

    fn rejection(document: QueryDocument) -> String {
        let registry = registry();
        match plan(&registry, document) {
            Err(AppError::BadRequest(message)) => message,
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn plans_aliases_and_children() {
        let registry = registry();
        let mut cats = select("Query.cats");
        cats.select = vec!["owner".into()];
        let mut again = select("Query.cats");
        again.alias = Some("moreCats".into());

        let plan = plan(&registry, doc(vec![cats, again])).unwrap();
        assert_eq!(plan.operation, OperationKind::Query);
        assert_eq!(plan.fields[0].key, "cats");
        assert_eq!(plan.fields[0].children[0].path(), "Cat.owner");
        assert_eq!(plan.fields[1].key, "moreCats");
    }

    #[test]
    fn rejects_empty_document() {
        assert!(rejection(doc(vec![])).contains("no selections"));
    }

    #[test]
    fn rejects_unknown_field() {
        assert!(rejection(doc(vec![select("Query.dogs")])).contains("unknown field"));
    }

    #[test]
    fn rejects_malformed_path() {
        rejection(doc(vec![select("cats")]));
    }

    #[test]
    fn rejects_child_field_at_root() {
        assert!(rejection(doc(vec![select("Cat.owner")])).contains("not a Query or Mutation"));
    }

    #[test]
    fn rejects_mixed_operations() {
        let message = rejection(doc(vec![select("Query.cats"), select("Mutation.deleteCat")]));
        assert!(message.contains("mix"));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let message = rejection(doc(vec![select("Query.cats"), select("Query.cats")]));
        assert!(message.contains("duplicate response key"));
    }

    #[test]
    fn rejects_children_on_non_cat_fields() {
        let mut users = select("Query.users");
        users.select = vec!["owner".into()];
        assert!(rejection(doc(vec![users])).contains("no selectable child fields"));
    }

    #[test]
    fn rejects_unknown_child() {
        let mut cats = select("Query.cats");
        cats.select = vec!["whiskers".into()];
        assert!(rejection(doc(vec![cats])).contains("Cat.whiskers"));
    }

    #[test]
    fn write_child_records_errors_as_null() {
        let mut cat = serde_json::json!({ "owner": "u1" });
        let mut errors = Vec::new();
        let err = FieldError::from_resolver(
            &ResolveError::NotFound("user u1 not found".into()),
            "Cat.owner",
            vec!["catById".into(), "owner".into()],
        );
        write_child(&mut cat, "owner", Err(err), &mut errors);
        assert_eq!(cat["owner"], Value::Null);
        assert_eq!(errors.len(), 1);
    }
}
