use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};

use crate::{
    error::{Error, QueryError},
    form::{NewRecipe, RecipeChanges, RecipeFilter},
    schema::{Ingredient, Recipe, RecipeDetail, Tag, Uuid},
};

use super::attributes::{linked, replace_links};

/// Recipes of one owner, bound to a caller supplied connection or transaction.
/// Multi-row writes open their own transaction on it (a savepoint when the
/// caller already holds one).
pub struct RecipeRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> RecipeRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Newest first. Non-empty filter lists keep recipes linked to any of the given ids.
    pub async fn list(
        &mut self,
        owner: Uuid,
        filter: &RecipeFilter,
    ) -> Result<Vec<RecipeDetail>, Error> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT r.* FROM recipes r WHERE r.user_id = ");
        query.push_bind(owner);

        if !filter.tags.is_empty() {
            query.push(" AND EXISTS (SELECT 1 FROM recipe_tags rt");
            query.push(" WHERE rt.recipe_id = r.id AND rt.tag_id = ANY(");
            query.push_bind(filter.tags.clone());
            query.push("))");
        }
        if !filter.ingredients.is_empty() {
            query.push(" AND EXISTS (SELECT 1 FROM recipe_ingredients ri");
            query.push(" WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY(");
            query.push_bind(filter.ingredients.clone());
            query.push("))");
        }
        query.push(" ORDER BY r.id DESC");

        let rows: Vec<Recipe> = query
            .build_query_as()
            .fetch_all(&mut *self.conn)
            .await
            .map_err(QueryError::from)?;

        with_links(&mut *self.conn, owner, rows).await
    }

    pub async fn get(&mut self, owner: Uuid, id: Uuid) -> Result<RecipeDetail, Error> {
        let row = fetch_owned(&mut *self.conn, owner, id, false).await?;
        single(with_links(&mut *self.conn, owner, vec![row]).await?)
    }

    /// Inserts the recipe, resolves tag and ingredient names with get-or-create
    /// and links them, all in one transaction.
    pub async fn create(&mut self, owner: Uuid, recipe: NewRecipe) -> Result<RecipeDetail, Error> {
        let mut tr = self
            .conn
            .begin()
            .await
            .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

        let row: Recipe = sqlx::query_as(
            "
            INSERT INTO recipes (user_id, title, time_minutes, price, link, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(owner)
        .bind(&recipe.title)
        .bind(recipe.time_minutes)
        .bind(recipe.price)
        .bind(&recipe.link)
        .bind(&recipe.description)
        .fetch_one(&mut *tr)
        .await
        .map_err(QueryError::from)?;

        replace_links::<Tag>(&mut tr, owner, row.id, &recipe.tags).await?;
        replace_links::<Ingredient>(&mut tr, owner, row.id, &recipe.ingredients).await?;

        let detail = single(with_links(&mut tr, owner, vec![row]).await?)?;

        tr.commit()
            .await
            .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

        log::info!("Created recipe {} for user {owner}", detail.id);
        Ok(detail)
    }

    /// Applies the given changes. A supplied tag or ingredient list replaces the
    /// whole association set; an absent one leaves it as is.
    pub async fn update(
        &mut self,
        owner: Uuid,
        id: Uuid,
        changes: RecipeChanges,
    ) -> Result<RecipeDetail, Error> {
        let mut tr = self
            .conn
            .begin()
            .await
            .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

        let current = fetch_owned(&mut tr, owner, id, true).await?;

        let row: Recipe = sqlx::query_as(
            "
            UPDATE recipes
            SET title = $1, time_minutes = $2, price = $3, link = $4, description = $5
            WHERE id = $6 AND user_id = $7
            RETURNING *
            ",
        )
        .bind(changes.title.unwrap_or(current.title))
        .bind(changes.time_minutes.unwrap_or(current.time_minutes))
        .bind(changes.price.unwrap_or(current.price))
        .bind(changes.link.unwrap_or(current.link))
        .bind(changes.description.unwrap_or(current.description))
        .bind(id)
        .bind(owner)
        .fetch_one(&mut *tr)
        .await
        .map_err(QueryError::from)?;

        if let Some(tags) = &changes.tags {
            replace_links::<Tag>(&mut tr, owner, id, tags).await?;
        }
        if let Some(ingredients) = &changes.ingredients {
            replace_links::<Ingredient>(&mut tr, owner, id, ingredients).await?;
        }

        let detail = single(with_links(&mut tr, owner, vec![row]).await?)?;

        tr.commit()
            .await
            .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

        log::info!("Updated recipe {id} of user {owner}");
        Ok(detail)
    }

    /// Link rows cascade; the linked tags and ingredients stay.
    pub async fn delete(&mut self, owner: Uuid, id: Uuid) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *self.conn)
            .await
            .map_err(QueryError::from)?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("recipe"));
        }

        log::info!("Deleted recipe {id} of user {owner}");
        Ok(())
    }
}

async fn fetch_owned(
    conn: &mut PgConnection,
    owner: Uuid,
    id: Uuid,
    for_update: bool,
) -> Result<Recipe, Error> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row: Option<Recipe> = sqlx::query_as(&format!(
        "SELECT * FROM recipes WHERE id = $1 AND user_id = $2{lock}"
    ))
    .bind(id)
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| Error::not_found("recipe"))
}

async fn with_links(
    conn: &mut PgConnection,
    owner: Uuid,
    rows: Vec<Recipe>,
) -> Result<Vec<RecipeDetail>, Error> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let mut tags = linked::<Tag>(&mut *conn, owner, &ids).await?;
    let mut ingredients = linked::<Ingredient>(&mut *conn, owner, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let tags = tags.remove(&row.id).unwrap_or_default();
            let ingredients = ingredients.remove(&row.id).unwrap_or_default();
            RecipeDetail::from_parts(row, tags, ingredients)
        })
        .collect())
}

fn single(mut details: Vec<RecipeDetail>) -> Result<RecipeDetail, Error> {
    details.pop().ok_or_else(|| Error::not_found("recipe"))
}
