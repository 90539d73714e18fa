//! Cat fields.

use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::geo::rectangle_bounds;
use crate::graph::{FieldDef, FieldRegistry, ResolveCtx, ReturnShape};
use crate::model::{CatInput, CatPatch, Coordinates};
use crate::resolvers::{arg, args_as, to_json, uuid_arg, ResolveError};
use crate::state::AppState;

pub fn register(registry: &mut FieldRegistry) {
    registry.register(FieldDef::new("Query", "catById", ReturnShape::Cat, cat_by_id));
    registry.register(FieldDef::new("Query", "cats", ReturnShape::CatList, cats));
    registry.register(FieldDef::new("Query", "catsByArea", ReturnShape::CatList, cats_by_area));
    registry.register(FieldDef::new("Query", "catsByOwner", ReturnShape::CatList, cats_by_owner));

    registry.register(FieldDef::new("Mutation", "createCat", ReturnShape::Cat, create_cat));
    registry.register(
        FieldDef::new("Mutation", "updateCat", ReturnShape::Cat, update_cat).with_owner(cat_owner),
    );
    registry.register(
        FieldDef::new("Mutation", "deleteCat", ReturnShape::Cat, delete_cat).with_owner(cat_owner),
    );
    registry.register(FieldDef::new("Mutation", "updateCatAsAdmin", ReturnShape::Cat, update_cat));
    registry.register(FieldDef::new("Mutation", "deleteCatAsAdmin", ReturnShape::Cat, delete_cat));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AreaArgs {
    top_right: Coordinates,
    bottom_left: Coordinates,
}

async fn cat_by_id(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let id = uuid_arg(&ctx.args, "id")?;
    to_json(ctx.state.cats.get(id).await?)
}

async fn cats(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    to_json(ctx.state.cats.list().await?)
}

async fn cats_by_area(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let area: AreaArgs = args_as(&ctx.args)?;
    let bounds = rectangle_bounds(area.top_right.into(), area.bottom_left.into());
    to_json(ctx.state.cats.within(&bounds).await?)
}

async fn cats_by_owner(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let owner: String = arg(&ctx.args, "ownerId")?;
    to_json(ctx.state.cats.by_owner(&owner).await?)
}

async fn create_cat(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let owner = ctx
        .caller
        .subject_id()
        .ok_or_else(|| ResolveError::Unauthenticated("creating a cat requires a signed-in user".into()))?
        .to_string();
    let input: CatInput = args_as(&ctx.args)?;
    input.validate().map_err(ResolveError::BadUserInput)?;

    let cat = ctx.state.cats.insert(input.into_cat(owner)).await?;
    tracing::info!(cat_id = %cat.id, owner = %cat.owner, "cat created");
    to_json(cat)
}

async fn update_cat(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let id = uuid_arg(&ctx.args, "id")?;
    let patch: CatPatch = args_as(&ctx.args)?;
    patch.validate().map_err(ResolveError::BadUserInput)?;

    let cat = ctx
        .state
        .cats
        .update(id, &patch)
        .await?
        .ok_or_else(|| not_found(id))?;
    tracing::info!(cat_id = %id, subject_id = ?ctx.caller.subject_id(), "cat updated");
    to_json(cat)
}

async fn delete_cat(ctx: ResolveCtx) -> Result<Value, ResolveError> {
    let id = uuid_arg(&ctx.args, "id")?;
    let cat = ctx.state.cats.delete(id).await?.ok_or_else(|| not_found(id))?;
    tracing::info!(cat_id = %id, subject_id = ?ctx.caller.subject_id(), "cat deleted");
    to_json(cat)
}

/// Owner of the cat named by the `id` argument.
async fn cat_owner(state: AppState, args: Map<String, Value>) -> Result<Option<String>, ResolveError> {
    let id = uuid_arg(&args, "id")?;
    Ok(state.cats.owner_of(id).await?)
}

fn not_found(id: Uuid) -> ResolveError {
    ResolveError::NotFound(format!("cat {id} not found"))
}
