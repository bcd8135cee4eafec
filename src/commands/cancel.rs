use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    domain::{Class, Withdrawal},
    ports::store::{StorePort, WriteSet},
};
use tower::Service;
use uuid::Uuid;

use super::{run_transaction, Coordinator, Error};

/// Releases `member_id`'s seat or waitlist slot in `class_id`.
#[derive(Clone, Copy, Debug)]
pub struct CancelRequest {
    pub member_id: Uuid,
    pub class_id: Uuid,
}

#[derive(Debug, PartialEq, Eq)]
pub struct CancelResponse {
    /// The class as committed by this cancellation.
    pub class: Class,
    /// The waitlisted member moved into the freed seat, when the
    /// cancellation freed one and the waitlist was non-empty.
    pub promoted: Option<Uuid>,
}

impl<S> Service<CancelRequest> for Coordinator<S>
where
    S: StorePort + Send + Sync + 'static,
{
    type Response = CancelResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CancelRequest) -> Self::Future {
        let store = self.store.clone();
        let max_attempts = self.max_commit_attempts;
        Box::pin(async move {
            let res = run_transaction(max_attempts, || {
                let store = store.clone();
                async move {
                    // Fetch fresh snapshots
                    let mut class = store.get_class(req.class_id).await?;
                    let mut member = store.get_member(req.member_id).await?;

                    // Withdraw; freeing a seat promotes the waitlist head
                    let withdrawal = class.record.withdraw(req.member_id)?;
                    match withdrawal {
                        Withdrawal::Seat { .. } => member.record.remove_reservation(req.class_id),
                        Withdrawal::WaitList => member.record.remove_waitlist(req.class_id),
                    }

                    // The promoted member's record moves in the same commit
                    let mut members = vec![member];
                    let promoted = match withdrawal {
                        Withdrawal::Seat {
                            promoted: Some(next_id),
                        } => {
                            let mut next = store.get_member(next_id).await?;
                            next.record.promote(req.class_id);
                            members.push(next);
                            Some(next_id)
                        }
                        _ => None,
                    };

                    store
                        .commit(WriteSet {
                            class: class.clone(),
                            members,
                        })
                        .await?;

                    Ok(CancelResponse {
                        class: class.record,
                        promoted,
                    })
                }
            })
            .await?;

            if let Some(promoted) = res.promoted {
                tracing::info!(
                    class_id = %req.class_id,
                    member_id = %req.member_id,
                    %promoted,
                    "freed seat handed to the waitlist head"
                );
            }

            Ok(res)
        })
    }
}
