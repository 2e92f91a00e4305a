use std::{collections::HashMap, marker::PhantomData};

use sqlx::{postgres::PgRow, Connection, FromRow, PgConnection};

use crate::{
    error::{Error, QueryError},
    form::AttributeChanges,
    schema::{AttributeRef, Ingredient, LinkedAttribute, Tag, Uuid},
};

/// An owner-scoped name entity that recipes link to through a join table.
pub trait Attribute: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    const TABLE: &'static str;
    const LINK_TABLE: &'static str;
    const LINK_COLUMN: &'static str;
    const LABEL: &'static str;

    fn id(&self) -> Uuid;
}

impl Attribute for Tag {
    const TABLE: &'static str = "tags";
    const LINK_TABLE: &'static str = "recipe_tags";
    const LINK_COLUMN: &'static str = "tag_id";
    const LABEL: &'static str = "tag";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Attribute for Ingredient {
    const TABLE: &'static str = "ingredients";
    const LINK_TABLE: &'static str = "recipe_ingredients";
    const LINK_COLUMN: &'static str = "ingredient_id";
    const LABEL: &'static str = "ingredient";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Repository over one attribute table, bound to a caller supplied connection
/// or transaction. Every statement is filtered on the owner.
pub struct AttributeRepository<'c, T: Attribute> {
    conn: &'c mut PgConnection,
    _attribute: PhantomData<T>,
}

pub type TagRepository<'c> = AttributeRepository<'c, Tag>;
pub type IngredientRepository<'c> = AttributeRepository<'c, Ingredient>;

impl<'c, T: Attribute> AttributeRepository<'c, T> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self {
            conn,
            _attribute: PhantomData,
        }
    }

    /// Owner's rows by name descending. With `assigned_only`, only rows linked to
    /// at least one of the owner's recipes, each listed once.
    pub async fn list(&mut self, owner: Uuid, assigned_only: bool) -> Result<Vec<T>, Error> {
        let query = if assigned_only {
            format!(
                "
                SELECT a.id, a.user_id, a.name
                FROM {table} a
                WHERE a.user_id = $1
                AND EXISTS (
                    SELECT 1
                    FROM {link} l
                    INNER JOIN recipes r ON r.id = l.recipe_id
                    WHERE l.{column} = a.id AND r.user_id = $1
                )
                ORDER BY a.name DESC, a.id DESC
                ",
                table = T::TABLE,
                link = T::LINK_TABLE,
                column = T::LINK_COLUMN,
            )
        } else {
            format!(
                "SELECT id, user_id, name FROM {} WHERE user_id = $1 ORDER BY name DESC, id DESC",
                T::TABLE
            )
        };

        let rows: Vec<T> = sqlx::query_as(&query)
            .bind(owner)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(QueryError::from)?;

        log::trace!(
            "> Listed {} {} rows for user {owner} (assigned_only: {assigned_only})",
            rows.len(),
            T::LABEL
        );
        Ok(rows)
    }

    pub async fn get(&mut self, owner: Uuid, id: Uuid) -> Result<T, Error> {
        let row: Option<T> = sqlx::query_as(&format!(
            "SELECT id, user_id, name FROM {} WHERE id = $1 AND user_id = $2",
            T::TABLE
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(QueryError::from)?;

        row.ok_or_else(|| Error::not_found(T::LABEL))
    }

    pub async fn create(&mut self, owner: Uuid, name: &str) -> Result<T, Error> {
        insert(&mut *self.conn, owner, name).await
    }

    /// Reuses the owner's oldest row with exactly this name, inserting one if none exists.
    pub async fn get_or_create(&mut self, owner: Uuid, name: &str) -> Result<T, Error> {
        let mut tr = self
            .conn
            .begin()
            .await
            .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

        let row = get_or_create(&mut tr, owner, name).await?;

        tr.commit()
            .await
            .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;
        Ok(row)
    }

    pub async fn update(
        &mut self,
        owner: Uuid,
        id: Uuid,
        changes: AttributeChanges,
    ) -> Result<T, Error> {
        let Some(name) = changes.name else {
            return self.get(owner, id).await;
        };

        let row: Option<T> = sqlx::query_as(&format!(
            "UPDATE {} SET name = $1 WHERE id = $2 AND user_id = $3 RETURNING id, user_id, name",
            T::TABLE
        ))
        .bind(&name)
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(QueryError::from)?;

        let row = row.ok_or_else(|| Error::not_found(T::LABEL))?;
        log::debug!("Renamed {} {id} of user {owner} to {name:?}", T::LABEL);
        Ok(row)
    }

    /// Recipe links go with the row through `ON DELETE CASCADE`.
    pub async fn delete(&mut self, owner: Uuid, id: Uuid) -> Result<(), Error> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1 AND user_id = $2",
            T::TABLE
        ))
        .bind(id)
        .bind(owner)
        .execute(&mut *self.conn)
        .await
        .map_err(QueryError::from)?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(T::LABEL));
        }

        log::debug!("Deleted {} {id} of user {owner}", T::LABEL);
        Ok(())
    }
}

async fn insert<T: Attribute>(
    conn: &mut PgConnection,
    owner: Uuid,
    name: &str,
) -> Result<T, Error> {
    let row: T = sqlx::query_as(&format!(
        "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id, user_id, name",
        T::TABLE
    ))
    .bind(owner)
    .bind(name)
    .fetch_one(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    log::debug!("Created {} {} for user {owner}", T::LABEL, row.id());
    Ok(row)
}

/// Must run inside a transaction: the advisory lock on (table, owner) is held
/// until commit, so concurrent writers of one owner cannot both insert a name.
pub(crate) async fn get_or_create<T: Attribute>(
    conn: &mut PgConnection,
    owner: Uuid,
    name: &str,
) -> Result<T, Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), $2)")
        .bind(T::TABLE)
        .bind(owner)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    let existing: Option<T> = sqlx::query_as(&format!(
        "SELECT id, user_id, name FROM {} WHERE user_id = $1 AND name = $2 ORDER BY id LIMIT 1",
        T::TABLE
    ))
    .bind(owner)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    match existing {
        Some(row) => Ok(row),
        None => insert(&mut *conn, owner, name).await,
    }
}

/// Replaces the recipe's link set with the given names, resolving each with
/// get-or-create. Runs on the caller's transaction.
pub(crate) async fn replace_links<T: Attribute>(
    conn: &mut PgConnection,
    owner: Uuid,
    recipe_id: Uuid,
    names: &[String],
) -> Result<(), Error> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE recipe_id = $1 AND user_id = $2",
        T::LINK_TABLE
    ))
    .bind(recipe_id)
    .bind(owner)
    .execute(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    for name in names {
        let attribute: T = get_or_create(&mut *conn, owner, name).await?;

        // The owner is part of both foreign keys, so a foreign row can never be linked.
        sqlx::query(&format!(
            "
            INSERT INTO {link} (recipe_id, {column}, user_id)
            SELECT $1, a.id, a.user_id FROM {table} a WHERE a.id = $2 AND a.user_id = $3
            ON CONFLICT DO NOTHING
            ",
            link = T::LINK_TABLE,
            column = T::LINK_COLUMN,
            table = T::TABLE,
        ))
        .bind(recipe_id)
        .bind(attribute.id())
        .bind(owner)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;
    }

    Ok(())
}

/// Linked rows of the given recipes, grouped by recipe id and sorted by name.
pub(crate) async fn linked<T: Attribute>(
    conn: &mut PgConnection,
    owner: Uuid,
    recipe_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<AttributeRef>>, Error> {
    let rows: Vec<LinkedAttribute> = sqlx::query_as(&format!(
        "
        SELECT l.recipe_id AS recipe_id, a.id AS id, a.name AS name
        FROM {link} l
        INNER JOIN {table} a ON a.id = l.{column}
        WHERE l.recipe_id = ANY($1) AND l.user_id = $2
        ORDER BY a.name, a.id
        ",
        link = T::LINK_TABLE,
        table = T::TABLE,
        column = T::LINK_COLUMN,
    ))
    .bind(recipe_ids.to_vec())
    .bind(owner)
    .fetch_all(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Uuid, Vec<AttributeRef>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.recipe_id).or_default().push(row.into());
    });

    Ok(hashmap)
}
