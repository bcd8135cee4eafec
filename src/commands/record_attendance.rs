use std::{
    collections::HashSet,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    domain::Class,
    ports::store::{StorePort, WriteSet},
};
use tower::Service;
use uuid::Uuid;

use super::{run_transaction, Coordinator, Error};

/// Closes out a held class with its final attendance sheet.
///
/// Ids that are not on the enrollment roster are stale and ignored.
/// Enrolled members missing from both lists keep their reservation
/// untouched.
#[derive(Clone, Debug)]
pub struct RecordAttendanceRequest {
    pub class_id: Uuid,
    pub present: Vec<Uuid>,
    pub absent: Vec<Uuid>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RecordAttendanceResponse {
    /// The class as committed, with its roster frozen.
    pub class: Class,
    /// Enrolled members credited with attending.
    pub recorded_present: usize,
    /// Enrolled members recorded as no-shows.
    pub recorded_absent: usize,
}

impl<S> Service<RecordAttendanceRequest> for Coordinator<S>
where
    S: StorePort + Send + Sync + 'static,
{
    type Response = RecordAttendanceResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RecordAttendanceRequest) -> Self::Future {
        let store = self.store.clone();
        let max_attempts = self.max_commit_attempts;
        Box::pin(async move {
            let present: HashSet<Uuid> = req.present.iter().copied().collect();
            let absent: HashSet<Uuid> = req.absent.iter().copied().collect();
            if let Some(conflicted) = present.intersection(&absent).next() {
                return Err(Error::InvalidRequest(
                    format!("member {conflicted} is marked both present and absent").into(),
                ));
            }

            let res = run_transaction(max_attempts, || {
                let store = store.clone();
                let present = present.clone();
                let absent = absent.clone();
                let class_id = req.class_id;
                async move {
                    // Close the class before touching any member record
                    let mut class = store.get_class(class_id).await?;
                    class.record.mark_attendance_taken()?;

                    // Walk the roster; ids outside it are skipped
                    let mut members = Vec::new();
                    let mut recorded_present = 0;
                    let mut recorded_absent = 0;
                    for member_id in class.record.enrolled() {
                        let was_present = present.contains(member_id);
                        if !was_present && !absent.contains(member_id) {
                            continue;
                        }
                        let mut member = store.get_member(*member_id).await?;
                        if was_present {
                            member.record.mark_present(class_id);
                            recorded_present += 1;
                        } else {
                            member.record.mark_absent(class_id);
                            recorded_absent += 1;
                        }
                        members.push(member);
                    }

                    store
                        .commit(WriteSet {
                            class: class.clone(),
                            members,
                        })
                        .await?;

                    Ok(RecordAttendanceResponse {
                        class: class.record,
                        recorded_present,
                        recorded_absent,
                    })
                }
            })
            .await?;

            tracing::info!(
                class_id = %req.class_id,
                present = res.recorded_present,
                absent = res.recorded_absent,
                "attendance recorded"
            );

            Ok(res)
        })
    }
}
