use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    domain::{Class, Placement},
    ports::store::{StorePort, WriteSet},
};
use tower::Service;
use uuid::Uuid;

use super::{run_transaction, Coordinator, Error};

/// Books `member_id` into `class_id`, or onto its waitlist once the seats
/// are gone.
#[derive(Clone, Copy, Debug)]
pub struct ReserveRequest {
    pub member_id: Uuid,
    pub class_id: Uuid,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ReserveResponse {
    /// The class as committed by this reservation.
    pub class: Class,
    /// Where the member landed.
    pub placement: Placement,
}

impl<S> Service<ReserveRequest> for Coordinator<S>
where
    S: StorePort + Send + Sync + 'static,
{
    type Response = ReserveResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ReserveRequest) -> Self::Future {
        let store = self.store.clone();
        let max_attempts = self.max_commit_attempts;
        Box::pin(async move {
            let res = run_transaction(max_attempts, || {
                let store = store.clone();
                async move {
                    // Fetch fresh snapshots
                    let mut class = store.get_class(req.class_id).await?;
                    let mut member = store.get_member(req.member_id).await?;

                    // Admit into a seat or onto the waitlist, and mirror
                    // the placement on the member record
                    let placement = class.record.admit(req.member_id)?;
                    member.record.register(req.class_id, placement);

                    // Commit both records or neither
                    store
                        .commit(WriteSet {
                            class: class.clone(),
                            members: vec![member],
                        })
                        .await?;

                    Ok(ReserveResponse {
                        class: class.record,
                        placement,
                    })
                }
            })
            .await?;

            tracing::debug!(
                class_id = %req.class_id,
                member_id = %req.member_id,
                placement = ?res.placement,
                "reservation committed"
            );

            Ok(res)
        })
    }
}
