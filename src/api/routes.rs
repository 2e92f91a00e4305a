use std::convert::Infallible;

use serde::{de::DeserializeOwned, Serialize};
use warp::{filters::BoxedFilter, reject::Rejection, reply::Response, Filter, Reply};

use crate::{
    actions::Attribute,
    form::{AttributeForm, AttributeQuery, LoginForm, RecipeForm, RecipeQuery, UserForm},
    jwt::SessionData,
    middleware::with_session,
    schema::{Ingredient, Tag, Uuid},
};

use super::{handlers, reply::handle_rejection, AppState};

const BODY_LIMIT: u64 = 64 * 1024;

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Copy {
    warp::body::content_length_limit(BODY_LIMIT).and(warp::body::json())
}

/// The whole API with error rendering and request logging, ready to serve.
pub fn api(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    routes(state)
        .recover(handle_rejection)
        .with(warp::log("recipe_backend::api"))
}

/// All resource routes under `/api`. Rejections are left to the caller.
pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    user_routes(state.clone())
        .or(attribute_routes::<Tag>("tags", state.clone()))
        .unify()
        .or(attribute_routes::<Ingredient>("ingredients", state.clone()))
        .unify()
        .or(recipe_routes(state))
        .unify()
        .boxed()
}

fn user_routes(state: AppState) -> BoxedFilter<(Response,)> {
    let session = with_session(state.pool.clone(), state.keys.clone());
    let me = warp::path!("api" / "user" / "me");

    let create = warp::path!("api" / "user" / "create")
        .and(warp::post())
        .and(json_body::<UserForm>())
        .and(with_state(state.clone()))
        .and_then(handlers::create_user);

    let token = warp::path!("api" / "user" / "token")
        .and(warp::post())
        .and(json_body::<LoginForm>())
        .and(with_state(state.clone()))
        .and_then(handlers::create_token);

    let get_me = me
        .and(warp::get())
        .and(session.clone())
        .and(with_state(state.clone()))
        .and_then(handlers::get_me);

    let patch_me = me
        .and(warp::patch())
        .and(session.clone())
        .and(json_body::<UserForm>())
        .and(with_state(state.clone()))
        .and_then(|session: SessionData, form: UserForm, state: AppState| {
            handlers::update_me(session, form, true, state)
        });

    let put_me = me
        .and(warp::put())
        .and(session)
        .and(json_body::<UserForm>())
        .and(with_state(state))
        .and_then(|session: SessionData, form: UserForm, state: AppState| {
            handlers::update_me(session, form, false, state)
        });

    create
        .or(token)
        .unify()
        .or(get_me)
        .unify()
        .or(patch_me)
        .unify()
        .or(put_me)
        .unify()
        .boxed()
}

/// `/api/{segment}` and `/api/{segment}/{id}` for tags and ingredients.
fn attribute_routes<T>(segment: &'static str, state: AppState) -> BoxedFilter<(Response,)>
where
    T: Attribute + Serialize + Send + Sync + 'static,
{
    let session = with_session(state.pool.clone(), state.keys.clone());
    let collection = warp::path("api").and(warp::path(segment)).and(warp::path::end());
    let item = warp::path("api")
        .and(warp::path(segment))
        .and(warp::path::param::<Uuid>())
        .and(warp::path::end());

    let list = collection
        .clone()
        .and(warp::get())
        .and(session.clone())
        .and(warp::query::<AttributeQuery>())
        .and(with_state(state.clone()))
        .and_then(handlers::list_attributes::<T>);

    let create = collection
        .and(warp::post())
        .and(session.clone())
        .and(json_body::<AttributeForm>())
        .and(with_state(state.clone()))
        .and_then(handlers::create_attribute::<T>);

    let get = item
        .clone()
        .and(warp::get())
        .and(session.clone())
        .and(with_state(state.clone()))
        .and_then(handlers::get_attribute::<T>);

    let patch = item
        .clone()
        .and(warp::patch())
        .and(session.clone())
        .and(json_body::<AttributeForm>())
        .and(with_state(state.clone()))
        .and_then(|id: Uuid, session: SessionData, form: AttributeForm, state: AppState| {
            handlers::update_attribute::<T>(id, session, form, true, state)
        });

    let put = item
        .clone()
        .and(warp::put())
        .and(session.clone())
        .and(json_body::<AttributeForm>())
        .and(with_state(state.clone()))
        .and_then(|id: Uuid, session: SessionData, form: AttributeForm, state: AppState| {
            handlers::update_attribute::<T>(id, session, form, false, state)
        });

    let delete = item
        .and(warp::delete())
        .and(session)
        .and(with_state(state))
        .and_then(handlers::delete_attribute::<T>);

    list.or(create)
        .unify()
        .or(get)
        .unify()
        .or(patch)
        .unify()
        .or(put)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

fn recipe_routes(state: AppState) -> BoxedFilter<(Response,)> {
    let session = with_session(state.pool.clone(), state.keys.clone());
    let collection = warp::path!("api" / "recipes");
    let item = warp::path!("api" / "recipes" / Uuid);

    let list = collection
        .and(warp::get())
        .and(session.clone())
        .and(warp::query::<RecipeQuery>())
        .and(with_state(state.clone()))
        .and_then(handlers::list_recipes);

    let create = collection
        .and(warp::post())
        .and(session.clone())
        .and(json_body::<RecipeForm>())
        .and(with_state(state.clone()))
        .and_then(handlers::create_recipe);

    let get = item
        .and(warp::get())
        .and(session.clone())
        .and(with_state(state.clone()))
        .and_then(handlers::get_recipe);

    let patch = item
        .and(warp::patch())
        .and(session.clone())
        .and(json_body::<RecipeForm>())
        .and(with_state(state.clone()))
        .and_then(|id: Uuid, session: SessionData, form: RecipeForm, state: AppState| {
            handlers::update_recipe(id, session, form, true, state)
        });

    let put = item
        .and(warp::put())
        .and(session.clone())
        .and(json_body::<RecipeForm>())
        .and(with_state(state.clone()))
        .and_then(|id: Uuid, session: SessionData, form: RecipeForm, state: AppState| {
            handlers::update_recipe(id, session, form, false, state)
        });

    let delete = item
        .and(warp::delete())
        .and(session)
        .and(with_state(state))
        .and_then(handlers::delete_recipe);

    list.or(create)
        .unify()
        .or(get)
        .unify()
        .or(patch)
        .unify()
        .or(put)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}
