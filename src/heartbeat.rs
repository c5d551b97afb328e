//! Heartbeat Loop (C4): keeps the membership alive for a single
//! generation, tripping `closed` on rebalance or transport failure.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::connection::{BrokerRef, KafkaConnection};
use crate::error::{classify, classify_transport, ErrorAction, ErrorContext};
use crate::generation::{peek_task, Closed};
use crate::protocol::HeartbeatRequest;

/// Runs until `closed` fires, either because this loop tripped it or
/// because some other component (a fetch loop, a commit) did.
///
/// At most one heartbeat is ever in flight: the loop awaits each
/// response before sleeping, and never spawns a second send while the
/// first is outstanding.
pub async fn run(
    conn: Arc<dyn KafkaConnection>,
    coordinator: BrokerRef,
    closed: Closed,
    group_id: String,
    generation_id: i32,
    member_id: String,
    interval: Duration,
) {
    loop {
        let req = HeartbeatRequest {
            group_id: group_id.clone(),
            generation_id,
            member_id: member_id.clone(),
        };

        let outcome = peek_task(&closed, None, || async { Some(conn.heartbeat(&coordinator, req).await) }).await;

        match outcome {
            None => return,
            Some(Ok(resp)) => match classify(resp.error_code, ErrorContext::Heartbeat) {
                ErrorAction::Ok => {}
                _ => {
                    debug!(
                        "member `{}` heartbeat for generation {} failed with {:?}, closing",
                        member_id, generation_id, resp.error_code
                    );
                    closed.trip();
                    return;
                }
            },
            Some(Err(err)) => {
                warn!(
                    "member `{}` heartbeat transport failure for generation {}: {}",
                    member_id, generation_id, err
                );
                if classify_transport(ErrorContext::Heartbeat) != ErrorAction::Ok {
                    closed.trip();
                }
                return;
            }
        }

        // Race the sleep against `closed`: whichever completes first
        // wins, so a close tripped mid-sleep by another component wakes
        // this loop immediately instead of after the full interval.
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = closed.wait() => return,
        }

        if closed.is_closed() {
            return;
        }
    }
}
