//! Variables module.
//!
//! This module provides template resolution for requests: `{{name}}` lookups
//! across the environment, collection and global scopes, scope-pinned lookups
//! (`{{$global.name}}`, `{{$collection.name}}`), vault lookups
//! (`{{vault:name}}`), and dynamic variables such as `{{$guid}}`.

pub mod request;
pub mod substitution;
pub mod system;

pub use request::{resolve_auth, resolve_key_value_pairs, resolve_request};
pub use substitution::{
    find_variable_references, resolve, MissingVariablePolicy, VarError, VariableContext,
};
pub use system::resolve_dynamic_variable;
