use crate::error::PersistenceError;
use fixturegraph_schema::Bean;

/// The minimal storage contract the engine drives.
///
/// A transaction is begun before the first `persist` and committed only when
/// every step succeeded; on error it is left open for the implementor to
/// clean up.
pub trait PersistenceContext {
    fn begin_transaction(&mut self) -> Result<(), PersistenceError>;

    fn commit_transaction(&mut self) -> Result<(), PersistenceError>;

    fn persist(&mut self, bean: &Bean) -> Result<(), PersistenceError>;

    /// Saved means the surrogate identifier has been assigned.
    fn is_saved(&self, bean: &Bean) -> bool {
        !bean.is_unsaved()
    }
}
