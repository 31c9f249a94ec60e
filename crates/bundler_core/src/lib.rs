//! The orchestrator wiring components A–F of §2's pipeline together:
//! Resolver, Parser, Transformer, Graph Builder, Tree Shaker + Chunker,
//! Emitter. The equivalent of the teacher's
//! `good_fences_runner::GoodFencesRunner` — owns the [`env::BuildEnv`],
//! drives one-shot builds ([`build::build`]) and incremental dev-mode
//! rebuilds ([`dev::DevSession`]), and is the one crate allowed to know
//! about every other crate in the workspace.

pub mod build;
pub mod dev;
pub mod env;

pub use build::{build, write_output, BuildOutput};
pub use dev::DevSession;
pub use env::{BuildEnv, EmitEnv, ResolveEnv};
