pub mod notification;
pub mod recipe;
