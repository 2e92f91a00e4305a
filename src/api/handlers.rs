use serde::Serialize;
use warp::{http::StatusCode, reject::Rejection, reply::Response};

use crate::{
    actions::{
        authenticate_user, get_user_by_id, register_user, update_user, Attribute,
        AttributeRepository, RecipeRepository,
    },
    error::Error,
    form::{AttributeForm, AttributeQuery, LoginForm, RecipeForm, RecipeQuery, UserForm},
    jwt::SessionData,
    schema::{UserProfile, Uuid},
};

use super::{
    reply::{json, no_content},
    AppState,
};

pub(super) async fn create_user(form: UserForm, state: AppState) -> Result<Response, Rejection> {
    let user = form.validate_new()?;
    let mut conn = state.acquire().await?;
    let user = register_user(&mut conn, user).await?;

    Ok(json(&UserProfile::from(user), StatusCode::CREATED))
}

pub(super) async fn create_token(form: LoginForm, state: AppState) -> Result<Response, Rejection> {
    let (email, password) = form.validate()?;
    let mut conn = state.acquire().await?;
    let user = authenticate_user(&mut conn, &email, &password).await?;
    let token = state.keys.generate_jwt_session(&user)?;

    Ok(json(&serde_json::json!({ "token": token }), StatusCode::OK))
}

pub(super) async fn get_me(session: SessionData, state: AppState) -> Result<Response, Rejection> {
    let mut conn = state.acquire().await?;
    let user = get_user_by_id(&mut conn, session.user_id)
        .await?
        .ok_or_else(|| Error::not_found("user"))?;

    Ok(json(&UserProfile::from(user), StatusCode::OK))
}

pub(super) async fn update_me(
    session: SessionData,
    form: UserForm,
    partial: bool,
    state: AppState,
) -> Result<Response, Rejection> {
    let changes = form.validate_changes(partial)?;
    let mut conn = state.acquire().await?;
    let user = update_user(&mut conn, session.user_id, changes).await?;

    Ok(json(&UserProfile::from(user), StatusCode::OK))
}

pub(super) async fn list_attributes<T: Attribute + Serialize>(
    session: SessionData,
    query: AttributeQuery,
    state: AppState,
) -> Result<Response, Rejection> {
    let assigned_only = query.assigned_only()?;
    let mut conn = state.acquire().await?;
    let rows = AttributeRepository::<T>::new(&mut conn)
        .list(session.user_id, assigned_only)
        .await?;

    Ok(json(&rows, StatusCode::OK))
}

pub(super) async fn create_attribute<T: Attribute + Serialize>(
    session: SessionData,
    form: AttributeForm,
    state: AppState,
) -> Result<Response, Rejection> {
    let name = form.validate_new()?;
    let mut conn = state.acquire().await?;
    let row = AttributeRepository::<T>::new(&mut conn)
        .create(session.user_id, &name)
        .await?;

    Ok(json(&row, StatusCode::CREATED))
}

pub(super) async fn get_attribute<T: Attribute + Serialize>(
    id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let mut conn = state.acquire().await?;
    let row = AttributeRepository::<T>::new(&mut conn)
        .get(session.user_id, id)
        .await?;

    Ok(json(&row, StatusCode::OK))
}

pub(super) async fn update_attribute<T: Attribute + Serialize>(
    id: Uuid,
    session: SessionData,
    form: AttributeForm,
    partial: bool,
    state: AppState,
) -> Result<Response, Rejection> {
    let changes = form.validate_changes(partial)?;
    let mut conn = state.acquire().await?;
    let row = AttributeRepository::<T>::new(&mut conn)
        .update(session.user_id, id, changes)
        .await?;

    Ok(json(&row, StatusCode::OK))
}

pub(super) async fn delete_attribute<T: Attribute>(
    id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let mut conn = state.acquire().await?;
    AttributeRepository::<T>::new(&mut conn)
        .delete(session.user_id, id)
        .await?;

    Ok(no_content())
}

pub(super) async fn list_recipes(
    session: SessionData,
    query: RecipeQuery,
    state: AppState,
) -> Result<Response, Rejection> {
    let filter = query.filter()?;
    let mut conn = state.acquire().await?;
    let recipes = RecipeRepository::new(&mut conn)
        .list(session.user_id, &filter)
        .await?;

    Ok(json(&recipes, StatusCode::OK))
}

pub(super) async fn create_recipe(
    session: SessionData,
    form: RecipeForm,
    state: AppState,
) -> Result<Response, Rejection> {
    let recipe = form.validate_new()?;
    let mut conn = state.acquire().await?;
    let recipe = RecipeRepository::new(&mut conn)
        .create(session.user_id, recipe)
        .await?;

    Ok(json(&recipe, StatusCode::CREATED))
}

pub(super) async fn get_recipe(
    id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let mut conn = state.acquire().await?;
    let recipe = RecipeRepository::new(&mut conn)
        .get(session.user_id, id)
        .await?;

    Ok(json(&recipe, StatusCode::OK))
}

pub(super) async fn update_recipe(
    id: Uuid,
    session: SessionData,
    form: RecipeForm,
    partial: bool,
    state: AppState,
) -> Result<Response, Rejection> {
    let changes = form.validate_changes(partial)?;
    let mut conn = state.acquire().await?;
    let recipe = RecipeRepository::new(&mut conn)
        .update(session.user_id, id, changes)
        .await?;

    Ok(json(&recipe, StatusCode::OK))
}

pub(super) async fn delete_recipe(
    id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let mut conn = state.acquire().await?;
    RecipeRepository::new(&mut conn)
        .delete(session.user_id, id)
        .await?;

    Ok(no_content())
}
