use crate::session::SessionState;
use crate::{
    DefaultSessionIdGenerator, Error, MemoryStore, Result, Session, SessionId, SessionIdGenerator,
    SessionRecord,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub(crate) mod id_generator;

/// The cookie name used by [`SessionStoreConfig::default`].
pub const DEFAULT_COOKIE_NAME: &str = "default-cookie";

/// A session store.
///
/// This is the user-facing interface of the session store, and the single authority over which
/// sessions exist. It owns the mapping from session ids to sessions, generates the ids of new
/// sessions, and decides which cookie the client should receive.
///
/// The store is a cheap handle: cloning it yields another handle to the same sessions.
/// Construct one store when the process starts and hand clones of it to whatever handles requests.
/// All operations are safe to call concurrently. They lock the store only for the duration of
/// the in-memory operation on the backend, and never block otherwise.
#[derive(Debug)]
pub struct SessionStore<Implementation = MemoryStore, Generator = DefaultSessionIdGenerator> {
    inner: Arc<SessionStoreInner<Implementation, Generator>>,
}

#[derive(Debug)]
struct SessionStoreInner<Implementation, Generator> {
    state: Mutex<LockedState<Implementation, Generator>>,
    config: SessionStoreConfig,
}

/// Everything guarded by the store lock. Id generation and id reservation happen under the same lock,
/// so concurrent creates can never be handed the same id.
#[derive(Debug)]
struct LockedState<Implementation, Generator> {
    implementation: Implementation,
    id_generator: Generator,
}

/// The configuration of a [`SessionStore`].
///
/// The defaults set no cookie attributes other than `Path=/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionStoreConfig {
    /// The cookie name used by [`SessionStore::load_or_create_default`].
    pub default_cookie_name: String,
    /// The `Path` attribute of the session cookie.
    pub cookie_path: String,
    /// If true, the session cookie gets the `HttpOnly` attribute.
    pub http_only: bool,
    /// If true, the session cookie gets the `Secure` attribute.
    pub secure: bool,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            default_cookie_name: DEFAULT_COOKIE_NAME.to_owned(),
            cookie_path: "/".to_owned(),
            http_only: false,
            secure: false,
        }
    }
}

impl<Implementation: SessionStoreImplementation, Generator: SessionIdGenerator + Default>
    SessionStore<Implementation, Generator>
{
    /// Create a new session store with the given implementation and the default configuration.
    pub fn new(implementation: Implementation) -> Self {
        Self::new_with_id_generator(implementation, Generator::default())
    }
}

impl<Implementation: SessionStoreImplementation, Generator: SessionIdGenerator>
    SessionStore<Implementation, Generator>
{
    /// Create a new session store with the given implementation and session id generator.
    pub fn new_with_id_generator(implementation: Implementation, id_generator: Generator) -> Self {
        Self::new_with_config(implementation, id_generator, SessionStoreConfig::default())
    }

    /// Create a new session store with the given implementation, session id generator and configuration.
    pub fn new_with_config(
        implementation: Implementation,
        id_generator: Generator,
        config: SessionStoreConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                state: Mutex::new(LockedState {
                    implementation,
                    id_generator,
                }),
                config,
            }),
        }
    }

    /// Returns the configuration of this store.
    pub fn config(&self) -> &SessionStoreConfig {
        &self.inner.config
    }

    /// Returns true if a session with the given id was persisted and not destroyed since.
    pub fn exists(&self, id: &SessionId) -> Result<bool> {
        Ok(self.inner.state.lock().implementation.contains_session(id)?)
    }

    /// Create a new session associated with the cookie `cookie_name`.
    ///
    /// `presented_cookie` is the value of that cookie as sent by the client, if any.
    /// If it identifies a live session, creation fails with [`Error::SessionAlreadyIssued`],
    /// as the existing session should be used instead.
    ///
    /// The new session is not visible to [`SessionStore::fetch`] until it is saved.
    /// Its id is reserved until then, and released again if the session is dropped without saving.
    pub fn create(
        &self,
        cookie_name: impl Into<String>,
        presented_cookie: Option<&str>,
    ) -> Result<Session<Implementation, Generator>> {
        let id = {
            let mut state = self.inner.state.lock();
            if let Some(cookie_value) = presented_cookie {
                let presented_id = SessionId::from_cookie_value(cookie_value);
                if state.implementation.contains_session(&presented_id)? {
                    return Err(Error::SessionAlreadyIssued);
                }
            }
            state.reserve_new_id()?
        };

        log::debug!("created session {}", id.fingerprint());
        Ok(Session::new_created(id, cookie_name.into(), self.clone()))
    }

    /// Get a session from the store.
    ///
    /// The `cookie_value` is the value of the session cookie sent by the client, or `None` if the client sent none.
    /// Fails with [`Error::SessionNotFound`] in both cases where there is no such session:
    /// if no cookie was sent, and if its value does not identify a live session.
    ///
    /// The returned session is a copy of the stored one. Changes to it become visible once it is saved.
    pub fn fetch(&self, cookie_value: Option<&str>) -> Result<Session<Implementation, Generator>> {
        let Some(cookie_value) = cookie_value else {
            return Err(Error::SessionNotFound);
        };
        let id = SessionId::from_cookie_value(cookie_value);
        let record = self.inner.state.lock().implementation.read_session(&id)?;

        match record {
            Some(record) => Ok(Session::new_from_record(record, self.clone())),
            None => {
                log::trace!("no session {}", id.fingerprint());
                Err(Error::SessionNotFound)
            }
        }
    }

    /// Fetch the session identified by `presented_cookie`, or create a new one if there is none.
    ///
    /// This is the sequence to run once per request before handing the session to request handling.
    pub fn load_or_create(
        &self,
        cookie_name: impl Into<String>,
        presented_cookie: Option<&str>,
    ) -> Result<Session<Implementation, Generator>> {
        match self.fetch(presented_cookie) {
            Err(Error::SessionNotFound) => self.create(cookie_name, presented_cookie),
            result => result,
        }
    }

    /// Like [`SessionStore::load_or_create`], with the cookie name from the configuration.
    pub fn load_or_create_default(
        &self,
        presented_cookie: Option<&str>,
    ) -> Result<Session<Implementation, Generator>> {
        let cookie_name = self.inner.config.default_cookie_name.clone();
        self.load_or_create(cookie_name, presented_cookie)
    }

    /// Store the current state of a session, overwriting any previously stored state.
    ///
    /// Returns the command to set the session cookie on the client.
    ///
    /// Fails with [`Error::SessionTerminated`] if the session was terminated, and with
    /// [`Error::UpdatedSessionDoesNotExist`] if the session was saved or fetched before, but was
    /// destroyed since.
    pub fn persist(
        &self,
        session: &mut Session<Implementation, Generator>,
    ) -> Result<SessionCookieCommand> {
        let record = session.to_record();
        {
            let mut state = self.inner.state.lock();
            match session.state {
                SessionState::Terminated => return Err(Error::SessionTerminated),
                SessionState::Created => match state.implementation.create_session(&record)? {
                    WriteSessionResult::Ok => {}
                    WriteSessionResult::SessionIdExists => return Err(Error::SessionAlreadyIssued),
                },
                SessionState::Persisted => match state.implementation.update_session(&record)? {
                    UpdateSessionResult::Ok => {}
                    UpdateSessionResult::SessionDoesNotExist => {
                        return Err(Error::UpdatedSessionDoesNotExist)
                    }
                },
            }
        }

        session.state = SessionState::Persisted;
        log::debug!("persisted session {}", record.id.fingerprint());
        Ok(self.set_command(record))
    }

    /// Remove the session with the given id from the store.
    /// Removing a session that does not exist is not an error.
    pub fn destroy(&self, id: &SessionId) -> Result {
        self.inner.state.lock().implementation.delete_session(id)?;
        log::debug!("destroyed session {}", id.fingerprint());
        Ok(())
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.state.lock().implementation.count_sessions()?)
    }

    /// Returns true if there are no live sessions.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Empties the entire store, deleting all sessions.
    pub fn clear_store(&self) -> Result {
        self.inner.state.lock().implementation.clear()?;
        Ok(())
    }

    /// Gives `f` access to the store implementation, holding the store lock for the duration of the call.
    ///
    /// **This function is supposed to be used in tests only.**
    /// `f` must not call into this store or drop an unsaved [`Session`] of it, as that takes the
    /// same lock again and deadlocks.
    pub fn inspect_implementation<T>(&self, f: impl FnOnce(&Implementation) -> T) -> T {
        f(&self.inner.state.lock().implementation)
    }

    pub(crate) fn release_session_id(&self, id: &SessionId) -> Result {
        self.inner
            .state
            .lock()
            .implementation
            .release_session_id(id)?;
        Ok(())
    }

    fn set_command(&self, record: SessionRecord) -> SessionCookieCommand {
        let config = &self.inner.config;
        SessionCookieCommand::Set {
            cookie_name: record.cookie_name,
            cookie_value: record.id.into(),
            path: config.cookie_path.clone(),
            http_only: config.http_only,
            secure: config.secure,
        }
    }

    pub(crate) fn removal_command(&self, cookie_name: &str) -> SessionCookieCommand {
        let config = &self.inner.config;
        SessionCookieCommand::Delete {
            cookie_name: cookie_name.to_owned(),
            path: config.cookie_path.clone(),
            http_only: config.http_only,
            secure: config.secure,
        }
    }
}

impl<Implementation: SessionStoreImplementation, Generator: SessionIdGenerator>
    LockedState<Implementation, Generator>
{
    fn reserve_new_id(&mut self) -> Result<SessionId> {
        if let Some(maximum) = Implementation::MAXIMUM_RETRIES_ON_ID_COLLISION {
            for _ in 0..maximum {
                if let Some(id) = self.try_reserve_new_id()? {
                    return Ok(id);
                }
            }

            Err(Error::MaximumSessionIdGenerationTriesReached { maximum })
        } else {
            loop {
                if let Some(id) = self.try_reserve_new_id()? {
                    return Ok(id);
                }
            }
        }
    }

    fn try_reserve_new_id(&mut self) -> Result<Option<SessionId>> {
        let id = self.id_generator.generate_id()?;
        match self.implementation.reserve_session_id(&id)? {
            WriteSessionResult::Ok => Ok(Some(id)),
            WriteSessionResult::SessionIdExists => {
                log::trace!("session id {} collided, retrying", id.fingerprint());
                Ok(None)
            }
        }
    }
}

impl<Implementation, Generator> Clone for SessionStore<Implementation, Generator> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// This is the backend-facing interface of the session store.
/// It defines simple [CRUD]-methods on sessions, plus the reservation of ids for sessions that
/// were created but not yet stored.
///
/// The session id is expected to be the primary key, uniquely identifying a session.
/// All methods are called with the store lock held, so implementations need no synchronisation of their own.
///
/// [CRUD]: https://en.wikipedia.org/wiki/Create,_read,_update_and_delete
pub trait SessionStoreImplementation {
    /// Reserving an id fails if the id already exists.
    /// This constant indicates how often the caller should retry with different randomly generated ids until it should give up.
    /// The value `None` indicates that the caller should never give up, possibly looping infinitely.
    const MAXIMUM_RETRIES_ON_ID_COLLISION: Option<u8>;

    /// Returns true if a session with the given `id` is stored. Reserved ids do not count.
    fn contains_session(&mut self, id: &SessionId) -> anyhow::Result<bool>;

    /// Reserve the given `id` for a session that will be created later.
    /// Fails with [`WriteSessionResult::SessionIdExists`] if the id is stored or reserved already.
    fn reserve_session_id(&mut self, id: &SessionId) -> anyhow::Result<WriteSessionResult>;

    /// Release a reservation made with [`reserve_session_id`](Self::reserve_session_id).
    /// Does nothing if the id is not reserved.
    fn release_session_id(&mut self, id: &SessionId) -> anyhow::Result<()>;

    /// Store a new session, turning the reservation of its id into a stored session.
    /// Fails with [`WriteSessionResult::SessionIdExists`] if a session with the same id is stored already.
    fn create_session(&mut self, record: &SessionRecord) -> anyhow::Result<WriteSessionResult>;

    /// Read the session with the given `id`.
    fn read_session(&mut self, id: &SessionId) -> anyhow::Result<Option<SessionRecord>>;

    /// Replace the stored session with the id of `record`.
    /// Fails with [`UpdateSessionResult::SessionDoesNotExist`] if there is no such session.
    fn update_session(&mut self, record: &SessionRecord) -> anyhow::Result<UpdateSessionResult>;

    /// Delete the session with the given `id`.
    /// Does nothing if there is no such session. Reservations are left untouched.
    fn delete_session(&mut self, id: &SessionId) -> anyhow::Result<()>;

    /// Delete all sessions in the store.
    fn clear(&mut self) -> anyhow::Result<()>;

    /// Returns the number of stored sessions.
    fn count_sessions(&mut self) -> anyhow::Result<usize>;
}

/// The result of writing a session or reserving its id, indicating if the write succeeded, or if the id collided.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum WriteSessionResult {
    /// The session could be written without id collision.
    Ok,
    /// The session could not be written, because the chosen id already exists.
    SessionIdExists,
}

/// The result of updating a session, indicating if the update succeeded, or if the session is gone.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum UpdateSessionResult {
    /// The session was updated.
    Ok,
    /// The session could not be updated, because it does not exist.
    SessionDoesNotExist,
}

/// Indicates how the client's session cookie should be updated.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SessionCookieCommand {
    /// Set the session cookie.
    Set {
        /// The name of the session cookie.
        cookie_name: String,
        /// The value of the session cookie, i.e. the session id.
        cookie_value: String,
        /// The `Path` attribute of the session cookie.
        path: String,
        /// Whether the session cookie gets the `HttpOnly` attribute.
        http_only: bool,
        /// Whether the session cookie gets the `Secure` attribute.
        secure: bool,
    },
    /// Delete the session cookie.
    Delete {
        /// The name of the session cookie.
        cookie_name: String,
        /// The `Path` attribute of the session cookie.
        path: String,
        /// Whether the session cookie gets the `HttpOnly` attribute.
        http_only: bool,
        /// Whether the session cookie gets the `Secure` attribute.
        secure: bool,
    },
}

impl SessionCookieCommand {
    /// Returns the name of the cookie this command is about.
    pub fn cookie_name(&self) -> &str {
        match self {
            Self::Set { cookie_name, .. } | Self::Delete { cookie_name, .. } => cookie_name,
        }
    }

    /// Renders the value of the `Set-Cookie` header that executes this command.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use cookie_sessions::SessionCookieCommand;
    /// let command = SessionCookieCommand::Set {
    ///     cookie_name: "sid".into(),
    ///     cookie_value: "abc".into(),
    ///     path: "/".into(),
    ///     http_only: true,
    ///     secure: false,
    /// };
    /// assert_eq!(command.to_header_value(), "sid=abc; Path=/; HttpOnly");
    /// ```
    pub fn to_header_value(&self) -> String {
        let (mut header, http_only, secure) = match self {
            Self::Set {
                cookie_name,
                cookie_value,
                path,
                http_only,
                secure,
            } => (
                format!("{cookie_name}={cookie_value}; Path={path}"),
                *http_only,
                *secure,
            ),
            Self::Delete {
                cookie_name,
                path,
                http_only,
                secure,
            } => (
                format!("{cookie_name}=; Path={path}; Max-Age=0"),
                *http_only,
                *secure,
            ),
        };
        if http_only {
            header.push_str("; HttpOnly");
        }
        if secure {
            header.push_str("; Secure");
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionCookieCommand, SessionStoreConfig, DEFAULT_COOKIE_NAME};

    #[test]
    fn test_default_config() {
        let config = SessionStoreConfig::default();
        assert_eq!(config.default_cookie_name, DEFAULT_COOKIE_NAME);
        assert_eq!(config.cookie_path, "/");
        assert!(!config.http_only);
        assert!(!config.secure);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SessionStoreConfig =
            serde_json::from_str(r#"{"http_only": true, "secure": true}"#).unwrap();
        assert_eq!(
            config,
            SessionStoreConfig {
                http_only: true,
                secure: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_header_values() {
        let set = SessionCookieCommand::Set {
            cookie_name: "sid".into(),
            cookie_value: "abc".into(),
            path: "/".into(),
            http_only: false,
            secure: false,
        };
        assert_eq!(set.to_header_value(), "sid=abc; Path=/");
        assert_eq!(set.cookie_name(), "sid");

        let delete = SessionCookieCommand::Delete {
            cookie_name: "sid".into(),
            path: "/app".into(),
            http_only: true,
            secure: true,
        };
        assert_eq!(
            delete.to_header_value(),
            "sid=; Path=/app; Max-Age=0; HttpOnly; Secure"
        );
    }
}
