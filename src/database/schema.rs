use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

pub type Uuid = i32;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

/// Public view of an account.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            name: user.name,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Tag {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub name: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Ingredient {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub name: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub description: Option<String>,
}

/// Tag or ingredient row joined through a recipe's link table.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct LinkedAttribute {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AttributeRef {
    pub id: Uuid,
    pub name: String,
}

impl From<LinkedAttribute> for AttributeRef {
    fn from(value: LinkedAttribute) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

/// A recipe with its tag and ingredient sets, as served to clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeDetail {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<AttributeRef>,
    pub ingredients: Vec<AttributeRef>,
}

impl RecipeDetail {
    pub fn from_parts(
        recipe: Recipe,
        tags: Vec<AttributeRef>,
        ingredients: Vec<AttributeRef>,
    ) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
            description: recipe.description,
            tags,
            ingredients,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_serializes_without_owner() {
        let tag = Tag {
            id: 7,
            user_id: 3,
            name: "Dinner".into(),
        };

        let value = serde_json::to_value(&tag).unwrap();

        assert_eq!(value, serde_json::json!({"id": 7, "name": "Dinner"}));
    }

    #[test]
    fn recipe_price_serializes_as_fixed_decimal_string() {
        let recipe = Recipe {
            id: 1,
            user_id: 1,
            title: "Apple Juice".into(),
            time_minutes: 5,
            price: Decimal::new(550, 2),
            link: None,
            description: None,
        };

        let detail = RecipeDetail::from_parts(
            recipe,
            vec![],
            vec![AttributeRef {
                id: 4,
                name: "Apples".into(),
            }],
        );
        let value = serde_json::to_value(&detail).unwrap();

        assert_eq!(value["price"], "5.50");
        assert_eq!(value["ingredients"][0]["name"], "Apples");
        assert!(value.get("user_id").is_none());
    }
}
