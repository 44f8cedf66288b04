use crate::session_store::{UpdateSessionResult, WriteSessionResult};
use crate::{SessionId, SessionRecord, SessionStoreImplementation};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// # in-memory session store
/// Because there is no external
/// persistence, this session store is ephemeral and will be cleared
/// on server restart.
///
/// # ***READ THIS BEFORE USING IN A PRODUCTION DEPLOYMENT***
///
/// Storing sessions only in memory brings the following problems:
///
/// 1. All sessions must fit in available memory (important for high load services)
/// 2. Sessions do not expire. They are removed only if they are terminated or the store is cleared.
///    If sessions are not cleaned up properly it might result in OOM
/// 3. All sessions will be lost on shutdown
/// 4. If the service is clustered particular session will be stored only on a single instance.
///    This might be solved by using load balancers with sticky sessions.
///
/// The `Logger` records the operations performed on the store, see [`MemoryStore::new_with_logger`].
#[derive(Debug, Clone)]
pub struct MemoryStore<Logger = NoLogger> {
    session_map: HashMap<SessionId, Arc<SessionRecord>>,
    reserved_ids: HashSet<SessionId>,
    logger: Logger,
}

/// An operation performed on a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Checked whether a session exists.
    ContainsSession {
        /// The id of the session.
        id: SessionId,
    },
    /// Reserved the id of a new session.
    ReserveSessionId {
        /// The reserved id.
        id: SessionId,
    },
    /// Released the id of a new session that was never stored.
    ReleaseSessionId {
        /// The released id.
        id: SessionId,
    },
    /// Stored a new session.
    CreateSession {
        /// The stored session.
        record: SessionRecord,
    },
    /// Read a session.
    ReadSession {
        /// The id of the session.
        id: SessionId,
    },
    /// Replaced a stored session.
    UpdateSession {
        /// The new state of the session.
        record: SessionRecord,
    },
    /// Deleted a session.
    DeleteSession {
        /// The id of the session.
        id: SessionId,
    },
    /// Deleted all sessions.
    Clear,
    /// Counted the stored sessions.
    CountSessions,
}

/// A type that records the operations performed on a [`MemoryStore`].
pub trait OperationLogger {
    /// Record the given operation.
    fn log(&mut self, operation: Operation);
}

/// A logger that ignores all operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLogger;

/// A logger that records all operations in order.
#[derive(Debug, Clone, Default)]
pub struct DefaultLogger {
    operations: Vec<Operation>,
}

impl OperationLogger for NoLogger {
    fn log(&mut self, _operation: Operation) {}
}

impl OperationLogger for DefaultLogger {
    fn log(&mut self, operation: Operation) {
        self.operations.push(operation);
    }
}

impl DefaultLogger {
    /// Returns the recorded operations.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns the recorded operations while consuming the logger.
    pub fn into_inner(self) -> Vec<Operation> {
        self.operations
    }
}

impl<Logger: OperationLogger> SessionStoreImplementation for MemoryStore<Logger> {
    const MAXIMUM_RETRIES_ON_ID_COLLISION: Option<u8> = None;

    fn contains_session(&mut self, id: &SessionId) -> anyhow::Result<bool> {
        self.logger
            .log(Operation::ContainsSession { id: id.clone() });
        Ok(self.session_map.contains_key(id))
    }

    fn reserve_session_id(&mut self, id: &SessionId) -> anyhow::Result<WriteSessionResult> {
        self.logger
            .log(Operation::ReserveSessionId { id: id.clone() });
        if self.session_map.contains_key(id) || !self.reserved_ids.insert(id.clone()) {
            Ok(WriteSessionResult::SessionIdExists)
        } else {
            Ok(WriteSessionResult::Ok)
        }
    }

    fn release_session_id(&mut self, id: &SessionId) -> anyhow::Result<()> {
        self.logger
            .log(Operation::ReleaseSessionId { id: id.clone() });
        self.reserved_ids.remove(id);
        Ok(())
    }

    fn create_session(&mut self, record: &SessionRecord) -> anyhow::Result<WriteSessionResult> {
        self.logger.log(Operation::CreateSession {
            record: record.clone(),
        });
        // replace with `try_insert` once stable #82766
        if self.session_map.contains_key(&record.id) {
            Ok(WriteSessionResult::SessionIdExists)
        } else {
            self.reserved_ids.remove(&record.id);
            self.session_map
                .insert(record.id.clone(), Arc::new(record.clone()));
            Ok(WriteSessionResult::Ok)
        }
    }

    fn read_session(&mut self, id: &SessionId) -> anyhow::Result<Option<SessionRecord>> {
        self.logger.log(Operation::ReadSession { id: id.clone() });
        Ok(self
            .session_map
            .get(id)
            .map(|record| record.as_ref().clone()))
    }

    fn update_session(&mut self, record: &SessionRecord) -> anyhow::Result<UpdateSessionResult> {
        self.logger.log(Operation::UpdateSession {
            record: record.clone(),
        });
        match self.session_map.get_mut(&record.id) {
            Some(stored) => {
                *stored = Arc::new(record.clone());
                Ok(UpdateSessionResult::Ok)
            }
            None => Ok(UpdateSessionResult::SessionDoesNotExist),
        }
    }

    fn delete_session(&mut self, id: &SessionId) -> anyhow::Result<()> {
        self.logger.log(Operation::DeleteSession { id: id.clone() });
        self.session_map.remove(id);
        Ok(())
    }

    fn clear(&mut self) -> anyhow::Result<()> {
        self.logger.log(Operation::Clear);
        self.session_map.clear();
        Ok(())
    }

    fn count_sessions(&mut self) -> anyhow::Result<usize> {
        self.logger.log(Operation::CountSessions);
        Ok(self.session_map.len())
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Default::default()
    }
}

impl MemoryStore<DefaultLogger> {
    /// Create a new empty memory store that records all operations performed on it.
    pub fn new_with_logger() -> Self {
        Default::default()
    }
}

impl<Logger> MemoryStore<Logger> {
    /// Returns the number of sessions in the memory store.
    pub fn len(&self) -> usize {
        self.session_map.len()
    }

    /// Returns true if the memory store is empty.
    pub fn is_empty(&self) -> bool {
        self.session_map.is_empty()
    }

    /// Returns the number of ids reserved for sessions that were created but not yet stored.
    pub fn reserved_len(&self) -> usize {
        self.reserved_ids.len()
    }

    /// Calls `f` on each stored session.
    ///
    /// **This function is supposed to be used in tests only.**
    pub fn for_each(&self, mut f: impl FnMut(&SessionRecord)) {
        for record in self.session_map.values() {
            f(record);
        }
    }

    /// Returns the operation logger.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Returns the operation logger while consuming the store.
    pub fn into_logger(self) -> Logger {
        self.logger
    }
}

impl<Logger: Default> Default for MemoryStore<Logger> {
    fn default() -> Self {
        Self {
            session_map: Default::default(),
            reserved_ids: Default::default(),
            logger: Default::default(),
        }
    }
}
