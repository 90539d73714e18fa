//! User fields, proxied to the identity service.
//!
//! Self-service mutations forward the caller's own bearer token; admin
//! mutations additionally forward the caller's role. Without a configured
//! identity service every field here answers `SERVICE_UNAVAILABLE`.

use serde_json::Value;

use catgraph_auth_client::{AuthClient, Credentials, UserInput};

use crate::graph::{FieldDef, FieldRegistry, ResolveCtx, ReturnShape};
use crate::resolvers::{arg, to_json, ResolveError};
use crate::state::AppState;

pub fn register(registry: &mut FieldRegistry) {
    registry.register(FieldDef::new("Cat", "owner", ReturnShape::Other, cat_owner));

    registry.register(FieldDef::new("Query", "checkToken", ReturnShape::Other, check_token));
    registry.register(FieldDef::new("Query", "userById", ReturnShape::Other, user_by_id));
    registry.register(FieldDef::new("Query", "users", ReturnShape::Other, users));
    registry.register(FieldDef::new("Mutation", "login", ReturnShape::Other, login));

    registry.register(FieldDef::new("Mutation", "register", ReturnShape::Other, register_user));
    registry.register(FieldDef::new("Mutation", "updateUser", ReturnShape::Other, update_user));
    registry.register(FieldDef::new("Mutation", "deleteUser", ReturnShape::Other, delete_user));
    registry.register(FieldDef::new(
        "Mutation",
        "updateUserAsAdmin",
        ReturnShape::Other,
        update_user_as_admin,
    ));
    registry.register(FieldDef::new(
        "Mutation",
        "deleteUserAsAdmin",
        ReturnShape::Other,
        delete_user_as_admin,
    ));
}

fn client(state: &AppState) -> Result<&AuthClient, ResolveError> {
    state
        .auth
        .as_ref()
        .ok_or_else(|| ResolveError::Unavailable("identity service is not configured".into()))
}

fn token(ctx: &ResolveCtx) -> Result<&str, ResolveError> {
    ctx.caller
        .token()
        .ok_or_else(|| ResolveError::Unauthenticated("a bearer token is required".into()))
}

/// The user behind a cat's `owner` id.
async fn cat_owner(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let owner = ctx
        .parent
        .as_ref()
        .and_then(|cat| cat.get("owner"))
        .and_then(Value::as_str)
        .ok_or_else(|| ResolveError::Internal("Cat.owner resolved without a parent cat".into()))?;
    match client(&ctx.state)?.user_by_id(owner).await? {
        Some(user) => to_json(user),
        None => Err(ResolveError::NotFound(format!("user {owner} not found"))),
    }
}

async fn check_token(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let token = token(&ctx)?;
    to_json(client(&ctx.state)?.check_token(token).await?)
}

async fn user_by_id(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let id: String = arg(&ctx.args, "id")?;
    to_json(client(&ctx.state)?.user_by_id(&id).await?)
}

async fn users(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    to_json(client(&ctx.state)?.users().await?)
}

async fn login(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let credentials: Credentials = arg(&ctx.args, "credentials")?;
    let response = client(&ctx.state)?.login(&credentials).await?;
    tracing::info!(user_id = %response.user.id, "user logged in");
    to_json(response)
}

async fn register_user(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let user: UserInput = arg(&ctx.args, "user")?;
    to_json(client(&ctx.state)?.register(&user).await?)
}

async fn update_user(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let user: UserInput = arg(&ctx.args, "user")?;
    let token = token(&ctx)?;
    to_json(client(&ctx.state)?.update_user(token, &user).await?)
}

async fn delete_user(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let token = token(&ctx)?;
    to_json(client(&ctx.state)?.delete_user(token).await?)
}

async fn update_user_as_admin(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let id: String = arg(&ctx.args, "id")?;
    let user: UserInput = arg(&ctx.args, "user")?;
    let (token, role) = admin_credentials(&ctx)?;
    let updated = client(&ctx.state)?
        .update_user_as_admin(token, role, &id, &user)
        .await?;
    tracing::info!(user_id = %id, admin = ?ctx.caller.subject_id(), "user updated by admin");
    to_json(updated)
}

async fn delete_user_as_admin(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let id: String = arg(&ctx.args, "id")?;
    let (token, role) = admin_credentials(&ctx)?;
    let deleted = client(&ctx.state)?
        .delete_user_as_admin(token, role, &id)
        .await?;
    tracing::info!(user_id = %id, admin = ?ctx.caller.subject_id(), "user deleted by admin");
    to_json(deleted)
}

fn admin_credentials(ctx: &ResolveCtx) -> Result<(&str, &str), ResolveError> {
    let token = token(ctx)?;
    let role = ctx
        .caller
        .role()
        .ok_or_else(|| ResolveError::Unauthenticated("a signed-in role is required".into()))?;
    Ok((token, role))
}
