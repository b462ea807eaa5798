//! formtrans-schema: form schemas and the registry that serves them.
//!
//! Provides the typed [`FormSchema`] / [`FieldSpec`] model, the
//! [`FieldValue`] representation of translated values (including the
//! `Unknown` marker), parsing of the registry transport format, and the
//! [`FormRegistry`] lookup contract with in-memory and file-backed
//! implementations.

pub mod deserialize;
pub mod registry;
pub mod types;

pub use deserialize::{form_from_json, forms_from_json};
pub use registry::{FileRegistry, FormRegistry, InMemoryRegistry, RegistryError};
pub use types::*;
