pub mod cache;
pub mod form;
pub mod middleware;
pub mod templates;
pub mod validation;
