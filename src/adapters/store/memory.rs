use crate::{
    domain::{Class, Member},
    ports::store::{Error, StorePort, Versioned, WriteSet},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use uuid::Uuid;

/// In-memory record store.
///
/// A single mutex guards both record maps, so every load and every commit
/// is atomic and isolated. The lock is released between a caller's reads
/// and its commit; writes based on reads that went stale in that window
/// are caught by the version check and rejected whole.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    classes: HashMap<Uuid, Versioned<Class>>,
    members: HashMap<Uuid, Versioned<Member>>,
}

impl MemoryStore {
    /// Registers a class record at version 0.
    ///
    /// Record creation belongs to the administrative lifecycle outside the
    /// coordinator, which is why this is an inherent method and not part
    /// of [`StorePort`].
    pub fn insert_class(&self, class: Class) -> Result<(), Error> {
        self.inner.lock()?.classes.insert(
            class.class_id,
            Versioned {
                record: class,
                version: 0,
            },
        );
        Ok(())
    }

    /// Registers a member record at version 0. See
    /// [`MemoryStore::insert_class`].
    pub fn insert_member(&self, member: Member) -> Result<(), Error> {
        self.inner.lock()?.members.insert(
            member.member_id,
            Versioned {
                record: member,
                version: 0,
            },
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorePort for MemoryStore {
    async fn get_class(&self, class_id: Uuid) -> Result<Versioned<Class>, Error> {
        self.inner
            .lock()?
            .classes
            .get(&class_id)
            .cloned()
            .ok_or(Error::ClassNotFound(class_id))
    }

    async fn get_member(&self, member_id: Uuid) -> Result<Versioned<Member>, Error> {
        self.inner
            .lock()?
            .members
            .get(&member_id)
            .cloned()
            .ok_or(Error::MemberNotFound(member_id))
    }

    async fn commit(&self, write: WriteSet) -> Result<(), Error> {
        let mut inner = self.inner.lock()?;

        // Every expected version is checked before anything is touched, so
        // a single stale record rejects the whole set.
        let class_id = write.class.record.class_id;
        let stored = inner
            .classes
            .get(&class_id)
            .ok_or(Error::ClassNotFound(class_id))?;
        if stored.version != write.class.version {
            return Err(Error::VersionConflict {
                record_id: class_id,
            });
        }
        for member in &write.members {
            let member_id = member.record.member_id;
            let stored = inner
                .members
                .get(&member_id)
                .ok_or(Error::MemberNotFound(member_id))?;
            if stored.version != member.version {
                return Err(Error::VersionConflict {
                    record_id: member_id,
                });
            }
        }

        inner.classes.insert(
            class_id,
            Versioned {
                record: write.class.record,
                version: write.class.version + 1,
            },
        );
        for member in write.members {
            let member_id = member.record.member_id;
            inner.members.insert(
                member_id,
                Versioned {
                    record: member.record,
                    version: member.version + 1,
                },
            );
        }

        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }
}

/// Erased [`PoisonError`]
///
/// `PoisonError` keeps the `MutexGuard` internally, which is not send. Thus we erase the error
/// and only keep the string representation instead.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

/// We need to create a custom `From` implementation here for an error that's specific to this
/// adapter.
impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use speculoos::prelude::*;
    use std::num::NonZeroU32;

    fn empty_class(seats: u32, wait_slots: u32) -> Class {
        Class::new(
            Uuid::new_v4(),
            "Spin Intervals".to_string(),
            Utc::now(),
            NonZeroU32::new(seats).unwrap(),
            wait_slots,
        )
    }

    #[tokio::test]
    async fn test_insert_get_roundtrip() {
        let store = MemoryStore::default();
        let class = empty_class(2, 1);
        let member = Member::new(Uuid::new_v4(), "Avery".to_string());

        store.insert_class(class.clone()).unwrap();
        store.insert_member(member.clone()).unwrap();

        let res = store.get_class(class.class_id).await;
        assert_that!(res).is_ok().is_equal_to(Versioned {
            record: class,
            version: 0,
        });
        let res = store.get_member(member.member_id).await;
        assert_that!(res).is_ok().is_equal_to(Versioned {
            record: member,
            version: 0,
        });
    }

    #[tokio::test]
    async fn test_get_missing_records() {
        let store = MemoryStore::default();

        let res = store.get_class(Uuid::new_v4()).await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::ClassNotFound(_)));

        let res = store.get_member(Uuid::new_v4()).await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::MemberNotFound(_)));
    }

    #[tokio::test]
    async fn test_commit_bumps_versions() {
        let store = MemoryStore::default();
        let class = empty_class(2, 0);
        let member = Member::new(Uuid::new_v4(), "Avery".to_string());
        store.insert_class(class.clone()).unwrap();
        store.insert_member(member.clone()).unwrap();

        let mut snapshot = store.get_class(class.class_id).await.unwrap();
        let mut member_snapshot = store.get_member(member.member_id).await.unwrap();
        let placement = snapshot.record.admit(member.member_id).unwrap();
        member_snapshot.record.register(class.class_id, placement);

        let res = store
            .commit(WriteSet {
                class: snapshot.clone(),
                members: vec![member_snapshot],
            })
            .await;
        assert_that!(res).is_ok();

        let stored = store.get_class(class.class_id).await.unwrap();
        assert_that!(stored.version).is_equal_to(1);
        assert_that!(stored.record.enrolled()).is_equal_to(&[member.member_id][..]);
        let stored = store.get_member(member.member_id).await.unwrap();
        assert_that!(stored.version).is_equal_to(1);
        assert_that!(stored.record.has_reservation(class.class_id)).is_equal_to(true);
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_class() {
        let store = MemoryStore::default();
        let class = empty_class(2, 0);
        store.insert_class(class.clone()).unwrap();

        // Two transactions read the same version; the first one to commit
        // wins and the second is turned away.
        let mut first = store.get_class(class.class_id).await.unwrap();
        let mut second = store.get_class(class.class_id).await.unwrap();
        first.record.admit(Uuid::new_v4()).unwrap();
        second.record.admit(Uuid::new_v4()).unwrap();

        let res = store
            .commit(WriteSet {
                class: first,
                members: Vec::new(),
            })
            .await;
        assert_that!(res).is_ok();

        let res = store
            .commit(WriteSet {
                class: second,
                members: Vec::new(),
            })
            .await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::VersionConflict { .. }));

        // The winner's write is intact.
        let stored = store.get_class(class.class_id).await.unwrap();
        assert_that!(stored.version).is_equal_to(1);
        assert_that!(stored.record.enrolled_count()).is_equal_to(1);
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryStore::default();
        let class = empty_class(2, 0);
        let member = Member::new(Uuid::new_v4(), "Avery".to_string());
        store.insert_class(class.clone()).unwrap();
        store.insert_member(member.clone()).unwrap();

        // A snapshot of the member taken before another transaction
        // touches that record.
        let stale_member = store.get_member(member.member_id).await.unwrap();

        let mut class_snapshot = store.get_class(class.class_id).await.unwrap();
        let mut member_snapshot = store.get_member(member.member_id).await.unwrap();
        let placement = class_snapshot.record.admit(member.member_id).unwrap();
        member_snapshot.record.register(class.class_id, placement);
        store
            .commit(WriteSet {
                class: class_snapshot,
                members: vec![member_snapshot],
            })
            .await
            .unwrap();

        // Fresh class read, stale member snapshot: the commit must reject
        // the whole set, class write included.
        let mut class_snapshot = store.get_class(class.class_id).await.unwrap();
        class_snapshot.record.admit(Uuid::new_v4()).unwrap();
        let res = store
            .commit(WriteSet {
                class: class_snapshot,
                members: vec![stale_member],
            })
            .await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::VersionConflict { .. }));

        let stored = store.get_class(class.class_id).await.unwrap();
        assert_that!(stored.version).is_equal_to(1);
        assert_that!(stored.record.enrolled_count()).is_equal_to(1);
    }
}
