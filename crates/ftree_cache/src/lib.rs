//! Directory-climbing cache for "nearest context file" lookups.
//!
//! Both the resolver's package.json probe and its node_modules-presence probe
//! are the same shape: starting from some file, walk up through ancestor
//! directories until a directory holding a particular filename is found, and
//! remember the answer (including "not found") for every directory visited
//! along the way. [`context_data::FileContextCache`] is that shape, generic
//! over what counts as "found" via [`context_data::ContextData`].

pub mod context_data;

pub use context_data::{ContextData, FileContextCache, WithCache};
