use uuid::Uuid;

use crate::domain::{Class, Member};

/// A stored record together with the version it was read at.
///
/// Versions drive the optimistic concurrency protocol: a later commit that
/// carries a stale version is rejected instead of overwriting a newer
/// write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

/// Everything one coordinator operation writes: the class plus every
/// member record it touched.
///
/// The `version` fields carry the versions the records were read at. A
/// commit applies all of the writes or none of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteSet {
    pub class: Versioned<Class>,
    pub members: Vec<Versioned<Member>>,
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait StorePort {
    async fn get_class(&self, class_id: Uuid) -> Result<Versioned<Class>, Error>;
    async fn get_member(&self, member_id: Uuid) -> Result<Versioned<Member>, Error>;

    /// Atomically persists the write set.
    ///
    /// Succeeds only if every record in the set is still at the version it
    /// was read at, and then bumps every version. On any mismatch nothing
    /// is persisted and the commit fails with [`Error::VersionConflict`].
    async fn commit(&self, write: WriteSet) -> Result<(), Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Domain-level error when a class does not exist
    #[error("class {0} does not exist")]
    ClassNotFound(Uuid),

    /// Domain-level error when a member does not exist
    #[error("member {0} does not exist")]
    MemberNotFound(Uuid),

    /// Another transaction committed between this one's read and its
    /// write. Nothing was persisted; re-reading and re-applying is safe.
    #[error("record {record_id} changed since it was read")]
    VersionConflict { record_id: Uuid },

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
