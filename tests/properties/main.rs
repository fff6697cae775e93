//! Properties every backend must (or, for the weak ones, may fail to) hold
//!
//! Run the opt-in stress suite with:
//! `cargo test --test properties -- --ignored`

#[path = "../common/mod.rs"]
mod common;

mod bookkeeping;
mod compensation;
mod oversell;
mod percentile;
mod stress;
