//! Interpreter traits for the collaborator ports.
//!
//! The rotation engine never talks to rsync or host tooling directly; it
//! emits [`SyncEffect`](super::SyncEffect) values and hands them to an
//! interpreter. The trait-based design enables:
//! - Mock interpreters for testing the pass without real transfers
//! - Logging/tracing interpreters
//!
//! Unlike a long-running service, a pass is a single sequential invocation,
//! so the ports are synchronous.

use super::{SyncEffect, SyncOutcome};

/// Interprets sync effects against the remote mirror.
///
/// Implementations are constructed with the remote target, so all effects
/// executed through a single interpreter instance are scoped to that target.
///
/// # Example (mock for testing)
///
/// ```ignore
/// struct MockTransport {
///     calls: RefCell<Vec<SyncEffect>>,
/// }
///
/// impl SyncInterpreter for MockTransport {
///     type Error = String;
///
///     fn interpret(&self, effect: SyncEffect) -> Result<SyncOutcome, String> {
///         self.calls.borrow_mut().push(effect);
///         Ok(SyncOutcome::Complete)
///     }
/// }
/// ```
pub trait SyncInterpreter {
    /// The error type returned by this interpreter.
    type Error;

    /// Execute a sync effect and return its outcome.
    fn interpret(&self, effect: SyncEffect) -> Result<SyncOutcome, Self::Error>;
}

/// Dumps the configured database to a byte stream.
///
/// Consumed only when the due set is non-empty; skipped entirely when no
/// database is configured.
pub trait DatabaseDumper {
    /// The error type returned by this dumper.
    type Error;

    /// Produce the dump bytes.
    fn dump(&self) -> Result<Vec<u8>, Self::Error>;
}

/// Lists the host's installed packages as text.
pub trait PackageInventory {
    /// The error type returned by this inventory.
    type Error;

    /// Produce the inventory listing.
    fn list(&self) -> Result<String, Self::Error>;
}
