//! Server-side HTTP sessions bound to a cookie.
//!
//! This crate issues opaque session ids, hands them to the client as a cookie value,
//! and keeps the data of each session on the server in a [`SessionStore`].
//! The HTTP layer is not part of this crate: it passes the raw value of the session cookie
//! (or `None` if the client sent none) in, and receives a [`SessionCookieCommand`] back
//! that tells it which `Set-Cookie` header to emit.
//!
//! # Lifecycle
//!
//! A session is created detached from the store with [`SessionStore::create`].
//! It only becomes visible to [`SessionStore::fetch`] once it was persisted with
//! [`Session::save`] (or [`SessionStore::persist`]).
//! A session that is dropped without being saved leaves no trace in the store.
//! [`Session::terminate`] removes the session from the store for good; saving it afterwards fails.
//!
//! # Security
//!
//! Session ids are drawn from the operating system's secure random source and carry 256 bits of
//! entropy by default. If the random source fails, no session is created.
//! Ids are secret, so they are never logged and their `Debug` output only shows a short
//! fingerprint.
//!
//! The cookie attributes are configured with [`SessionStoreConfig`].
//! By default only `Path=/` is set. Deployments served over HTTPS should enable
//! [`SessionStoreConfig::http_only`] and [`SessionStoreConfig::secure`].
//!
//! # Example
//!
//! ```
//! use cookie_sessions::{SessionCookieCommand, SessionStore, MemoryStore, SessionValue};
//!
//! # fn main() -> cookie_sessions::Result {
//! // Init a new session store we can persist sessions to.
//! let store: SessionStore = SessionStore::new(MemoryStore::new());
//!
//! // The first request carries no session cookie, so a new session is created.
//! let mut session = store.load_or_create("sid", None)?;
//! session.set("user", "alice");
//!
//! // Saving makes the session visible and tells us which cookie to set.
//! let SessionCookieCommand::Set { cookie_value, .. } = session.save()? else {
//!     unreachable!("saving always sets the cookie")
//! };
//!
//! // The next request presents the cookie and gets the same session back.
//! let session = store.load_or_create("sid", Some(cookie_value.as_str()))?;
//! assert_eq!(session.get("user"), Some(&SessionValue::from("alice")));
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]
#![deny(
    future_incompatible,
    missing_debug_implementations,
    nonstandard_style,
    missing_docs,
    unreachable_pub,
    missing_copy_implementations,
    unused_qualifications
)]

mod error;
mod memory_store;
mod session;
mod session_store;
mod session_value;

pub use error::Error;
pub use memory_store::{DefaultLogger, MemoryStore, NoLogger, Operation, OperationLogger};
pub use session::{Session, SessionId, SessionRecord};
pub use session_store::id_generator::{
    DebugSessionIdGenerator, DefaultSessionIdGenerator, RngSessionIdGenerator, SessionIdGenerator,
    MINIMUM_ID_BYTES,
};
pub use session_store::{
    SessionCookieCommand, SessionStore, SessionStoreConfig, SessionStoreImplementation,
    UpdateSessionResult, WriteSessionResult, DEFAULT_COOKIE_NAME,
};
pub use session_value::SessionValue;

/// A result with this crate's [`Error`] and a default return type of `()`.
pub type Result<T = (), E = Error> = std::result::Result<T, E>;
