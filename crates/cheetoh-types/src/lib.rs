pub mod api;
pub mod events;
pub mod lenient;
pub mod models;
