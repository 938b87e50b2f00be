//! # Gatehouse (console session & authorization core)
//!
//! `gatehouse` owns the one stateful part of the school administration
//! console: who is signed in, how far through authentication they are, and
//! what they are allowed to see.
//!
//! ## Session lifecycle
//!
//! A session is exactly one of `Anonymous`, `TwoFactorPending`,
//! `Authenticated` or the transient `Expired` marker. It is hydrated once at
//! startup from the persistent token store and afterwards only changes through
//! the orchestrator entry points: `login`, `verify_two_factor`, `logout` and
//! forced expiry (timer-detected or signalled by any collaborator that saw a
//! `401`).
//!
//! ## Redirects & permissions
//!
//! Navigation is derived, never scattered across pages: a pure redirect
//! policy maps `(session, path)` to at most one target, and permission checks
//! are pure functions of the current user's role.
//!
//! Credentials are verified by the remote API only. Bearer tokens are opaque
//! here apart from their decodable expiry and must never be logged.

pub mod backend;
pub mod cli;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
