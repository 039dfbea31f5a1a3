pub mod api;
pub mod app_state;
pub mod category_tree;
pub mod models;
pub mod session;
