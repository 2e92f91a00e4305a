mod attributes;
mod recipes;
mod users;

pub use attributes::{Attribute, AttributeRepository, IngredientRepository, TagRepository};
pub use recipes::RecipeRepository;
pub use users::{authenticate_user, get_user, get_user_by_id, register_user, update_user};
