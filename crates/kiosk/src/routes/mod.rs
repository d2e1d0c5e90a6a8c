//! Status routes

pub mod accessibility;
pub mod health;
