//! Thin CLI surface over `bundler_core` (§1 "Out of scope: the CLI
//! front-end"). Mirrors the teacher's `src/cli.rs` + `src/bin/good-fences.rs`
//! split: a `clap::Parser` struct here, a `main` in `src/bin/jsbundle.rs`
//! that does nothing but parse args, load a config and drive a build or a
//! dev session.

pub mod cli;
