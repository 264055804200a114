//! # Afiliados (session and identity lifecycle client)
//!
//! `afiliados` is the client side of the Afiliados Pro platform. The identity
//! provider authenticates users and issues short-lived bearer tokens; the backend
//! API owns user records, plans and tools. This crate owns everything in between.
//!
//! ## Session lifecycle
//!
//! - **Session window:** a signed-in identity is honored for at most
//!   `T_session` (24 hours by default) measured from the first time this client
//!   observed it, regardless of how long the provider keeps its tokens valid.
//!   The window start is persisted in the durable local store, so it survives
//!   restarts of the client.
//! - **Provisioning:** after sign-in the backend must hold a user record for
//!   the identity. `POST /users/bootstrap` is issued at most once at a time,
//!   retried twice (2s, 4s) on failure, and never again once it succeeded for
//!   that uid on this client.
//! - **Step-up re-authentication:** email and password changes re-prove the
//!   caller's credentials first, using whichever method the account actually
//!   uses (password or social).
//!
//! ## Layout
//!
//! - [`identity`]: identity provider capability and a REST implementation.
//! - [`gateway`]: backend HTTP gateway capability, typed endpoint helpers.
//! - [`session`]: the session store, policy, provisioning and re-authentication.
//! - [`storage`]: durable key/value store (the local-storage analogue).
//! - [`cli`]: the `afiliados` command line front end.

pub mod cli;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod identity;
pub mod session;
pub mod storage;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
