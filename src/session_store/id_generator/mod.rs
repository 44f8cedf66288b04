use crate::{Error, Result, SessionId};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

/// The minimum number of random bytes in a session id.
pub const MINIMUM_ID_BYTES: usize = 32;

/// A type with the ability to generate session ids.
pub trait SessionIdGenerator {
    /// Generate a session id, i.e. a string that is a valid HTTP cookie value.
    ///
    /// Fails if no secure id can be generated. Implementations must never return an empty or weak id instead.
    fn generate_id(&mut self) -> Result<SessionId>;
}

/// A session id generator with focus on security.
/// It draws `ID_BYTES` bytes from a cryptographically secure random generator and encodes them
/// as unpadded base64url, which only uses the characters `A-Z a-z 0-9 - _`.
///
/// `ID_BYTES` must be at least [`MINIMUM_ID_BYTES`], otherwise using the generator fails to compile.
#[derive(Debug, Clone, Default)]
pub struct RngSessionIdGenerator<R = OsRng, const ID_BYTES: usize = 32> {
    rng: R,
}

/// The default session id generator, drawing 32 bytes from the operating system's random source.
pub type DefaultSessionIdGenerator = RngSessionIdGenerator<OsRng>;

impl<R: RngCore + CryptoRng, const ID_BYTES: usize> RngSessionIdGenerator<R, ID_BYTES> {
    const ENOUGH_ENTROPY: () = assert!(
        ID_BYTES >= MINIMUM_ID_BYTES,
        "session ids need at least 32 random bytes"
    );

    /// Create a new generator drawing from the given random generator.
    pub fn new(rng: R) -> Self {
        let () = Self::ENOUGH_ENTROPY;
        Self { rng }
    }
}

impl<R: RngCore + CryptoRng, const ID_BYTES: usize> SessionIdGenerator
    for RngSessionIdGenerator<R, ID_BYTES>
{
    fn generate_id(&mut self) -> Result<SessionId> {
        let () = Self::ENOUGH_ENTROPY;
        let mut bytes = [0u8; ID_BYTES];
        self.rng
            .try_fill_bytes(&mut bytes)
            .map_err(Error::RandomSourceUnavailable)?;
        Ok(SessionId::from_cookie_value(&URL_SAFE_NO_PAD.encode(bytes)))
    }
}

/// A debug session id generator that generates an ascending sequence of integers, formatted as strings padded with zeroes.
///
/// **The ids are predictable, so this generator must only be used in tests.**
#[derive(Debug, Clone, Default)]
#[allow(missing_copy_implementations)]
pub struct DebugSessionIdGenerator {
    next_index: usize,
}

impl DebugSessionIdGenerator {
    /// The length of the generated ids, equal to the length of a default secure id.
    pub const ID_LENGTH: usize = 43;

    /// Create a generator whose next id is the one with the given index.
    pub fn starting_at(next_index: usize) -> Self {
        Self { next_index }
    }

    /// Returns the id that is generated for the given index.
    pub fn id_at(index: usize) -> SessionId {
        SessionId::from_cookie_value(&format!("{:0width$}", index, width = Self::ID_LENGTH))
    }
}

impl SessionIdGenerator for DebugSessionIdGenerator {
    fn generate_id(&mut self) -> Result<SessionId> {
        let id = Self::id_at(self.next_index);
        self.next_index += 1;
        Ok(id)
    }
}
