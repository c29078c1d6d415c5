pub mod handlers;
pub mod keyboards;
