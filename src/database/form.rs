use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    constants::{
        BLANK_FIELD, EMAIL_MAX_LENGTH, LINK_MAX_LENGTH, NAME_MAX_LENGTH, PASSWORD_MIN_LENGTH,
        PRICE_DECIMAL_PLACES, PRICE_MAX_DIGITS, REQUIRED_FIELD, TITLE_MAX_LENGTH,
    },
    error::{Error, FieldErrors},
    schema::Uuid,
};

use super::error::TypeError;

/// Collects per-field messages while a payload is validated.
#[derive(Default)]
struct Form {
    errors: FieldErrors,
}

impl Form {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    fn required<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.push(field, REQUIRED_FIELD);
        }
        value
    }

    fn text(&mut self, field: &str, value: String, max: usize) -> Option<String> {
        let value = value.trim().to_string();
        if value.is_empty() {
            self.push(field, BLANK_FIELD);
            return None;
        }
        if value.chars().count() > max {
            self.push(
                field,
                format!("Ensure this field has no more than {max} characters."),
            );
            return None;
        }
        Some(value)
    }

    /// Blank optional text is stored as absent.
    fn optional_text(
        &mut self,
        field: &str,
        value: Option<String>,
        max: Option<usize>,
    ) -> Option<String> {
        let value = value?.trim().to_string();
        if value.is_empty() {
            return None;
        }
        if let Some(max) = max {
            if value.chars().count() > max {
                self.push(
                    field,
                    format!("Ensure this field has no more than {max} characters."),
                );
                return None;
            }
        }
        Some(value)
    }

    fn time_minutes(&mut self, value: i64) -> Option<i32> {
        if value < 0 {
            self.push("time_minutes", "Ensure this value is greater than or equal to 0.");
            return None;
        }
        match i32::try_from(value) {
            Ok(value) => Some(value),
            Err(_) => {
                self.push("time_minutes", "Ensure this value is less than or equal to 2147483647.");
                None
            }
        }
    }

    fn price(&mut self, value: Decimal) -> Option<Decimal> {
        let value = value.normalize();
        let mut valid = true;
        if value.is_sign_negative() && !value.is_zero() {
            self.push("price", "Ensure this value is greater than or equal to 0.");
            valid = false;
        }
        if value.scale() > PRICE_DECIMAL_PLACES {
            let places = PRICE_DECIMAL_PLACES;
            self.push(
                "price",
                format!("Ensure that there are no more than {places} decimal places."),
            );
            valid = false;
        }
        let whole_digits = PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES;
        if value.trunc().abs() >= Decimal::from(10_i64.pow(whole_digits)) {
            self.push(
                "price",
                format!(
                    "Ensure that there are no more than {whole_digits} digits \
                     before the decimal point."
                ),
            );
            valid = false;
        }
        // Keep the stored precision: 5.5 becomes 5.50
        let mut value = value.abs();
        value.rescale(PRICE_DECIMAL_PLACES);
        valid.then_some(value)
    }

    /// Trims, validates and de-duplicates names, keeping first-seen order.
    fn names(&mut self, field: &str, values: Vec<NameInput>) -> Option<Vec<String>> {
        let mut names: Vec<String> = Vec::with_capacity(values.len());
        let mut valid = true;

        for (index, value) in values.into_iter().enumerate() {
            let name = value.into_name().trim().to_string();
            if name.is_empty() {
                self.push(field, format!("Item {index}: {BLANK_FIELD}"));
                valid = false;
            } else if name.chars().count() > NAME_MAX_LENGTH {
                self.push(
                    field,
                    format!(
                        "Item {index}: Ensure this field has no more than \
                         {NAME_MAX_LENGTH} characters."
                    ),
                );
                valid = false;
            } else if !names.contains(&name) {
                names.push(name);
            }
        }

        valid.then_some(names)
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, Error> {
        if self.errors.is_empty() {
            Ok(value())
        } else {
            Err(Error::invalid_fields(self.errors))
        }
    }
}

/// A tag or ingredient reference in a recipe payload: `"Dinner"` or `{"name": "Dinner"}`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum NameInput {
    Plain(String),
    Object { name: String },
}

impl NameInput {
    pub fn into_name(self) -> String {
        match self {
            NameInput::Plain(name) => name,
            NameInput::Object { name } => name,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct RecipeForm {
    pub title: Option<String>,
    pub time_minutes: Option<i64>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<NameInput>>,
    pub ingredients: Option<Vec<NameInput>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
}

/// Validated recipe update. `None` leaves a column untouched; for `link` and
/// `description`, `Some(None)` clears it. A `Some` tag/ingredient list replaces
/// the whole association set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

impl RecipeForm {
    pub fn validate_new(self) -> Result<NewRecipe, Error> {
        let changes = self.validate_changes(false)?;

        Ok(NewRecipe {
            title: changes.title.unwrap_or_default(),
            time_minutes: changes.time_minutes.unwrap_or_default(),
            price: changes.price.unwrap_or_default(),
            link: changes.link.flatten(),
            description: changes.description.flatten(),
            tags: changes.tags.unwrap_or_default(),
            ingredients: changes.ingredients.unwrap_or_default(),
        })
    }

    /// `partial` is PATCH semantics: only supplied fields are validated and applied.
    /// Otherwise title, time_minutes and price are required and an absent link or
    /// description is cleared.
    pub fn validate_changes(self, partial: bool) -> Result<RecipeChanges, Error> {
        let mut form = Form::default();

        let (title, time_minutes, price) = if partial {
            (self.title, self.time_minutes, self.price)
        } else {
            (
                form.required("title", self.title),
                form.required("time_minutes", self.time_minutes),
                form.required("price", self.price),
            )
        };

        let title = title.and_then(|title| form.text("title", title, TITLE_MAX_LENGTH));
        let time_minutes = time_minutes.and_then(|minutes| form.time_minutes(minutes));
        let price = price.and_then(|price| form.price(price));

        let link = if partial && self.link.is_none() {
            None
        } else {
            Some(form.optional_text("link", self.link, Some(LINK_MAX_LENGTH)))
        };
        let description = if partial && self.description.is_none() {
            None
        } else {
            Some(form.optional_text("description", self.description, None))
        };

        let tags = self.tags.and_then(|tags| form.names("tags", tags));
        let ingredients = self
            .ingredients
            .and_then(|ingredients| form.names("ingredients", ingredients));

        form.finish(|| RecipeChanges {
            title,
            time_minutes,
            price,
            link,
            description,
            tags,
            ingredients,
        })
    }
}

/// Body of tag and ingredient writes.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct AttributeForm {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeChanges {
    pub name: Option<String>,
}

impl AttributeForm {
    pub fn validate_new(self) -> Result<String, Error> {
        let changes = self.validate_changes(false)?;
        Ok(changes.name.unwrap_or_default())
    }

    pub fn validate_changes(self, partial: bool) -> Result<AttributeChanges, Error> {
        let mut form = Form::default();

        let name = if partial {
            self.name
        } else {
            form.required("name", self.name)
        };
        let name = name.and_then(|name| form.text("name", name, NAME_MAX_LENGTH));

        form.finish(|| AttributeChanges { name })
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct UserForm {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

impl UserForm {
    pub fn validate_new(self) -> Result<NewUser, Error> {
        let changes = self.validate_changes(false)?;

        Ok(NewUser {
            email: changes.email.unwrap_or_default(),
            password: changes.password.unwrap_or_default(),
            name: changes.name.unwrap_or_default(),
        })
    }

    pub fn validate_changes(self, partial: bool) -> Result<UserChanges, Error> {
        let mut form = Form::default();

        let (email, password, name) = if partial {
            (self.email, self.password, self.name)
        } else {
            (
                form.required("email", self.email),
                form.required("password", self.password),
                form.required("name", self.name),
            )
        };

        let email = email
            .and_then(|email| form.text("email", email, EMAIL_MAX_LENGTH))
            .and_then(|email| match normalize_email(&email) {
                Some(email) => Some(email),
                None => {
                    form.push("email", "Enter a valid email address.");
                    None
                }
            });
        let password = password.and_then(|password| {
            if password.chars().count() < PASSWORD_MIN_LENGTH {
                form.push(
                    "password",
                    format!("Ensure this field has at least {PASSWORD_MIN_LENGTH} characters."),
                );
                None
            } else {
                Some(password)
            }
        });
        let name = name.and_then(|name| form.text("name", name, NAME_MAX_LENGTH));

        form.finish(|| UserChanges {
            email,
            password,
            name,
        })
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct LoginForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginForm {
    pub fn validate(self) -> Result<(String, String), Error> {
        let mut form = Form::default();
        let email = form
            .required("email", self.email)
            .and_then(|email| form.text("email", email, EMAIL_MAX_LENGTH));
        let password = form.required("password", self.password);

        form.finish(|| {
            let email = email.unwrap_or_default();
            (
                normalize_email(&email).unwrap_or(email),
                password.unwrap_or_default(),
            )
        })
    }
}

/// Lower-cases the domain part, leaving the local part as typed.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim();
    let (local, domain) = email.rsplit_once('@')?;
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || email.chars().any(char::is_whitespace)
    {
        return None;
    }
    Some(format!("{local}@{}", domain.to_lowercase()))
}

/// Query string of tag and ingredient listings.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct AttributeQuery {
    pub assigned_only: Option<String>,
}

impl AttributeQuery {
    pub fn assigned_only(&self) -> Result<bool, TypeError> {
        match self.assigned_only.as_deref().map(str::trim) {
            None | Some("") => Ok(false),
            Some("true") | Some("True") => Ok(true),
            Some("false") | Some("False") => Ok(false),
            Some(value) => value
                .parse::<i64>()
                .map(|value| value != 0)
                .map_err(|_| TypeError::new("assigned_only", "Must be an integer.")),
        }
    }
}

/// Query string of recipe listings: comma separated tag and ingredient ids.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct RecipeQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<Uuid>,
}

impl RecipeQuery {
    pub fn filter(&self) -> Result<RecipeFilter, TypeError> {
        Ok(RecipeFilter {
            tags: parse_ids("tags", self.tags.as_deref())?,
            ingredients: parse_ids("ingredients", self.ingredients.as_deref())?,
        })
    }
}

fn parse_ids(field: &str, value: Option<&str>) -> Result<Vec<Uuid>, TypeError> {
    let Some(value) = value else {
        return Ok(vec![]);
    };

    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<Uuid>()
                .map_err(|_| TypeError::new(field, "Expected a comma separated list of ids."))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn recipe_form(value: serde_json::Value) -> RecipeForm {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn new_recipe_requires_title_time_and_price() {
        let error = recipe_form(json!({})).validate_new().unwrap_err();

        assert_eq!(error.kind, ErrorKind::InvalidInput);
        for field in ["title", "time_minutes", "price"] {
            assert_eq!(error.fields[field], vec![REQUIRED_FIELD.to_string()]);
        }
    }

    #[test]
    fn new_recipe_accepts_names_in_both_shapes() {
        let recipe = recipe_form(json!({
            "title": " Apple Juice ",
            "time_minutes": 5,
            "price": "5.5",
            "tags": ["Breakfast", {"name": "Vegan"}, "Breakfast"],
            "ingredients": ["Apples"],
        }))
        .validate_new()
        .unwrap();

        assert_eq!(recipe.title, "Apple Juice");
        assert_eq!(recipe.price, Decimal::new(550, 2));
        assert_eq!(recipe.price.to_string(), "5.50");
        assert_eq!(recipe.tags, vec!["Breakfast".to_string(), "Vegan".to_string()]);
        assert_eq!(recipe.ingredients, vec!["Apples".to_string()]);
        assert_eq!(recipe.link, None);
    }

    #[test]
    fn numeric_price_is_accepted() {
        let recipe = recipe_form(json!({"title": "Toast", "time_minutes": 0, "price": 2}))
            .validate_new()
            .unwrap();

        assert_eq!(recipe.price.to_string(), "2.00");
        assert_eq!(recipe.time_minutes, 0);
    }

    #[test]
    fn out_of_range_numbers_are_reported_per_field() {
        let error = recipe_form(json!({
            "title": "Bad",
            "time_minutes": -1,
            "price": "-0.5",
        }))
        .validate_new()
        .unwrap_err();

        assert!(error.fields.contains_key("time_minutes"));
        assert!(error.fields.contains_key("price"));
        assert!(!error.fields.contains_key("title"));
    }

    #[test]
    fn price_precision_is_enforced() {
        let error = recipe_form(json!({"title": "x", "time_minutes": 1, "price": "1.005"}))
            .validate_new()
            .unwrap_err();
        assert_eq!(
            error.fields["price"],
            vec!["Ensure that there are no more than 2 decimal places.".to_string()]
        );

        let error = recipe_form(json!({"title": "x", "time_minutes": 1, "price": "1000"}))
            .validate_new()
            .unwrap_err();
        assert!(error.fields["price"][0].contains("3 digits"));
    }

    #[test]
    fn blank_tag_names_are_rejected() {
        let error = recipe_form(json!({
            "title": "x",
            "time_minutes": 1,
            "price": "1.00",
            "tags": ["ok", "  "],
        }))
        .validate_new()
        .unwrap_err();

        assert_eq!(error.fields["tags"], vec![format!("Item 1: {BLANK_FIELD}")]);
    }

    #[test]
    fn partial_changes_only_touch_given_fields() {
        let changes = recipe_form(json!({"title": "New title"}))
            .validate_changes(true)
            .unwrap();

        assert_eq!(
            changes,
            RecipeChanges {
                title: Some("New title".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn full_changes_clear_absent_optional_fields() {
        let changes = recipe_form(json!({"title": "t", "time_minutes": 3, "price": "1.00"}))
            .validate_changes(false)
            .unwrap();

        assert_eq!(changes.link, Some(None));
        assert_eq!(changes.description, Some(None));
        assert_eq!(changes.tags, None);
    }

    #[test]
    fn empty_tag_list_clears_associations() {
        let changes = recipe_form(json!({"tags": []})).validate_changes(true).unwrap();

        assert_eq!(changes.tags, Some(vec![]));
        assert_eq!(changes.ingredients, None);
    }

    #[test]
    fn attribute_name_rules() {
        let form: AttributeForm = serde_json::from_value(json!({"name": "  "})).unwrap();
        assert_eq!(
            form.validate_changes(true).unwrap_err().fields["name"],
            vec![BLANK_FIELD.to_string()]
        );

        let form: AttributeForm = serde_json::from_value(json!({})).unwrap();
        assert_eq!(form.clone().validate_changes(true).unwrap(), AttributeChanges::default());
        assert!(form.validate_new().is_err());
    }

    #[test]
    fn emails_are_normalized_on_the_domain_only() {
        assert_eq!(
            normalize_email("Test1@EXAMPLE.com").as_deref(),
            Some("Test1@example.com")
        );
        assert_eq!(
            normalize_email(" test4@example.COM ").as_deref(),
            Some("test4@example.com")
        );
        assert_eq!(normalize_email("no-at-sign"), None);
        assert_eq!(normalize_email("@example.com"), None);
    }

    #[test]
    fn user_form_rules() {
        let form: UserForm = serde_json::from_value(json!({
            "email": "test@example.com",
            "password": "pw",
            "name": "Test",
        }))
        .unwrap();

        let error = form.validate_new().unwrap_err();
        assert_eq!(error.fields.len(), 1);
        assert!(error.fields.contains_key("password"));

        let form: UserForm = serde_json::from_value(json!({"name": "Renamed"})).unwrap();
        let changes = form.validate_changes(true).unwrap();
        assert_eq!(changes.name.as_deref(), Some("Renamed"));
        assert_eq!(changes.email, None);
    }

    #[test]
    fn assigned_only_flag_parsing() {
        let query = |value: Option<&str>| AttributeQuery {
            assigned_only: value.map(str::to_string),
        };

        assert!(!query(None).assigned_only().unwrap());
        assert!(!query(Some("0")).assigned_only().unwrap());
        assert!(query(Some("1")).assigned_only().unwrap());
        assert!(query(Some("true")).assigned_only().unwrap());
        assert!(query(Some("yes")).assigned_only().is_err());
    }

    #[test]
    fn recipe_filter_parsing() {
        let query = RecipeQuery {
            tags: Some("1, 2,".into()),
            ingredients: None,
        };
        assert_eq!(
            query.filter().unwrap(),
            RecipeFilter {
                tags: vec![1, 2],
                ingredients: vec![],
            }
        );

        let query = RecipeQuery {
            tags: None,
            ingredients: Some("1,x".into()),
        };
        assert!(query.filter().is_err());
    }
}
