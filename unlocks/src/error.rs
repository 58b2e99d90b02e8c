use {crate::grant::PersistenceError, thiserror::Error};

#[derive(Debug, Error)]
pub enum UnlockError {
    #[error("unlockable `{0}` is not in the catalog")]
    Unknown(String),
    /// `granted` lists the ids that were persisted before the failure in the
    /// same pass; they are final and still need to be signalled.
    #[error("failed to persist grant of `{id}`")]
    Persistence {
        id: String,
        granted: Vec<String>,
        #[source]
        source: PersistenceError,
    },
}
