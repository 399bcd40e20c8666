//! `almacen-core`: shared building blocks for the Almacen client.
//!
//! This crate contains **pure** primitives (no IO, no async).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::UserId;
pub use value_object::{Email, Secret, ValueObject};
