mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
}
mod constants;

pub mod api;
pub mod config;

pub use authentication::*;
pub use constants::*;
pub use database::*;
