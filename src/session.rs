use crate::session_store::{SessionStore, SessionStoreImplementation};
use crate::{
    DefaultSessionIdGenerator, MemoryStore, Result, SessionCookieCommand, SessionIdGenerator,
    SessionValue,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

/// A session with a client.
///
/// A session is obtained from a [`SessionStore`], either newly created or fetched by the value
/// of the client's session cookie. It is an owned copy of the session's state: changes made to it
/// only become visible to other requests once it is saved with [`Session::save`].
///
/// A newly created session that is dropped without being saved leaves no trace in the store.
///
/// A session must not be shared between requests. Two requests presenting the same cookie each
/// get their own copy, and the last one to save wins.
#[must_use]
pub struct Session<
    Implementation: SessionStoreImplementation = MemoryStore,
    Generator: SessionIdGenerator = DefaultSessionIdGenerator,
> {
    id: SessionId,
    cookie_name: String,
    values: HashMap<String, SessionValue>,
    pub(crate) state: SessionState,
    store: SessionStore<Implementation, Generator>,
}

/// The state of a session from the point of view of the store.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum SessionState {
    /// The session was created for this request and its id is reserved, but it was never saved.
    Created,
    /// The session was saved to the store at least once, or was fetched from it.
    Persisted,
    /// The session was terminated. It cannot be saved anymore.
    Terminated,
}

/// A session id.
///
/// The session id is the value of the session cookie and the key of the session in the store.
/// It is secret, so its `Debug` implementation only shows a fingerprint.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

/// The stored state of a session, as handed to and returned by a [`SessionStoreImplementation`].
///
/// The `id` field always equals the key the record is stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The id of the session.
    pub id: SessionId,
    /// The name of the cookie that carries the session id.
    pub cookie_name: String,
    /// The data of the session.
    pub values: HashMap<String, SessionValue>,
}

impl<Implementation: SessionStoreImplementation, Generator: SessionIdGenerator>
    Session<Implementation, Generator>
{
    pub(crate) fn new_created(
        id: SessionId,
        cookie_name: String,
        store: SessionStore<Implementation, Generator>,
    ) -> Self {
        Self {
            id,
            cookie_name,
            values: HashMap::new(),
            state: SessionState::Created,
            store,
        }
    }

    pub(crate) fn new_from_record(
        record: SessionRecord,
        store: SessionStore<Implementation, Generator>,
    ) -> Self {
        let SessionRecord {
            id,
            cookie_name,
            values,
        } = record;
        Self {
            id,
            cookie_name,
            values,
            state: SessionState::Persisted,
            store,
        }
    }

    pub(crate) fn to_record(&self) -> SessionRecord {
        SessionRecord {
            id: self.id.clone(),
            cookie_name: self.cookie_name.clone(),
            values: self.values.clone(),
        }
    }

    /// Returns the id of this session, which is also the value of its cookie.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the name of the cookie this session is associated with.
    pub fn name(&self) -> &str {
        &self.cookie_name
    }

    /// Returns the value stored under `key`, or `None` if there is none.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use cookie_sessions::{MemoryStore, SessionStore, SessionValue};
    /// # fn main() -> cookie_sessions::Result {
    /// let store: SessionStore = SessionStore::new(MemoryStore::new());
    /// let mut session = store.create("sid", None)?;
    /// assert_eq!(session.get("user"), None);
    /// session.set("user", "alice");
    /// assert_eq!(session.get("user"), Some(&SessionValue::Text("alice".into())));
    /// # Ok(()) }
    /// ```
    pub fn get(&self, key: &str) -> Option<&SessionValue> {
        self.values.get(key)
    }

    /// Stores `value` under `key`, overwriting any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SessionValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Removes the value stored under `key` and returns it, if there was one.
    pub fn delete(&mut self, key: &str) -> Option<SessionValue> {
        self.values.remove(key)
    }

    /// Returns true if a value is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns an iterator over all keys and values of this session.
    pub fn values(&self) -> impl Iterator<Item = (&str, &SessionValue)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Stores any serializable value under `key` as [`SessionValue::Json`].
    ///
    /// # Example
    ///
    /// ```rust
    /// # use cookie_sessions::{MemoryStore, SessionStore};
    /// # fn main() -> cookie_sessions::Result {
    /// let store: SessionStore = SessionStore::new(MemoryStore::new());
    /// let mut session = store.create("sid", None)?;
    /// session.set_serialized("cart", &vec![3, 1, 4])?;
    /// assert_eq!(session.get_deserialized::<Vec<u32>>("cart")?, Some(vec![3, 1, 4]));
    /// # Ok(()) }
    /// ```
    pub fn set_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.into(), SessionValue::Json(value));
        Ok(())
    }

    /// Reads the value stored under `key` as type `T`.
    ///
    /// Returns `Ok(None)` if there is no value under `key`, and an error if the value does not have the shape of `T`.
    pub fn get_deserialized<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.values
            .get(key)
            .map(|value| serde_json::from_value(value.to_json()).map_err(Into::into))
            .transpose()
    }

    /// Returns true if this session was saved to the store at least once, or was fetched from it, and was not terminated.
    pub fn is_persisted(&self) -> bool {
        self.state == SessionState::Persisted
    }

    /// Returns true if this session was terminated.
    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    /// Saves this session to its store, making its current state visible to subsequent fetches.
    ///
    /// Returns the command to set the session cookie on the client.
    /// Saving repeatedly simply overwrites the stored state.
    ///
    /// Fails with [`Error::SessionTerminated`](crate::Error::SessionTerminated) if the session was terminated.
    pub fn save(&mut self) -> Result<SessionCookieCommand> {
        let store = self.store.clone();
        store.persist(self)
    }

    /// Terminates this session, removing it from its store.
    ///
    /// Returns the command to delete the session cookie on the client.
    /// Terminating a session more than once is not an error.
    /// After termination, the session cannot be saved anymore.
    pub fn terminate(&mut self) -> Result<SessionCookieCommand> {
        match self.state {
            // Never stored, so only the reservation of its id has to go.
            SessionState::Created => self.store.release_session_id(&self.id)?,
            SessionState::Persisted => self.store.destroy(&self.id)?,
            SessionState::Terminated => return Ok(self.store.removal_command(&self.cookie_name)),
        }
        self.state = SessionState::Terminated;
        log::debug!("terminated session {}", self.id.fingerprint());
        Ok(self.store.removal_command(&self.cookie_name))
    }
}

impl<Implementation: SessionStoreImplementation, Generator: SessionIdGenerator> Drop
    for Session<Implementation, Generator>
{
    fn drop(&mut self) {
        if self.state == SessionState::Created {
            if let Err(error) = self.store.release_session_id(&self.id) {
                log::warn!(
                    "failed to release the id of unsaved session {}: {error}",
                    self.id.fingerprint()
                );
            }
        }
    }
}

impl<Implementation: SessionStoreImplementation, Generator: SessionIdGenerator> Debug
    for Session<Implementation, Generator>
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("cookie_name", &self.cookie_name)
            .field("values", &self.values)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SessionId {
    /// Interprets a cookie value as session id.
    ///
    /// This does not check that a session with this id exists.
    pub fn from_cookie_value(cookie_value: &str) -> Self {
        Self(cookie_value.to_owned())
    }

    /// Returns the id as a string, to be used as cookie value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short fingerprint of this id that identifies it in logs without revealing it.
    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(self.0.as_bytes()).to_hex();
        hash.as_str()[..16].to_owned()
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl Debug for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionId({})", self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::SessionId;
    use crate::{DebugSessionIdGenerator, Error, MemoryStore, SessionStore, SessionValue};
    use serde::{Deserialize, Serialize};

    fn debug_store() -> SessionStore<MemoryStore, DebugSessionIdGenerator> {
        SessionStore::new_with_id_generator(MemoryStore::new(), DebugSessionIdGenerator::default())
    }

    #[test]
    fn test_accessors() {
        let store = debug_store();
        let mut session = store.create("sid", None).unwrap();
        assert_eq!(session.name(), "sid");
        assert_eq!(session.id(), &DebugSessionIdGenerator::id_at(0));
        assert!(!session.contains_key("user"));

        session.set("user", "alice");
        session.set("user", "bob");
        session.set("visits", 2);
        assert_eq!(session.get("user"), Some(&SessionValue::from("bob")));
        assert_eq!(session.values().count(), 2);

        assert_eq!(session.delete("user"), Some(SessionValue::from("bob")));
        assert_eq!(session.delete("user"), None);
        assert_eq!(session.get("user"), None);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Cart {
        items: Vec<String>,
        total: u32,
    }

    #[test]
    fn test_serialized_values() {
        let store = debug_store();
        let mut session = store.create("sid", None).unwrap();
        let cart = Cart {
            items: vec!["apple".into()],
            total: 3,
        };
        session.set_serialized("cart", &cart).unwrap();
        assert_eq!(session.get_deserialized::<Cart>("cart").unwrap(), Some(cart));
        assert_eq!(session.get_deserialized::<Cart>("missing").unwrap(), None);

        session.set("user", "alice");
        assert_eq!(
            session.get_deserialized::<String>("user").unwrap(),
            Some("alice".to_owned())
        );
        assert!(matches!(
            session.get_deserialized::<Cart>("user"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_state_transitions() {
        let store = debug_store();
        let mut session = store.create("sid", None).unwrap();
        assert!(!session.is_persisted());
        session.save().unwrap();
        assert!(session.is_persisted());
        session.terminate().unwrap();
        assert!(session.is_terminated());
        assert!(!session.is_persisted());
    }

    #[test]
    fn test_id_debug_does_not_leak() {
        let id = SessionId::from_cookie_value("very-secret-cookie-value");
        let debug = format!("{id:?}");
        assert!(!debug.contains("very-secret"));
        assert_eq!(debug, format!("SessionId({})", id.fingerprint()));
        assert_eq!(id.fingerprint().len(), 16);
        assert_eq!(String::from(id), "very-secret-cookie-value");
    }
}
