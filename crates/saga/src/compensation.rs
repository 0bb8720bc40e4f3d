//! Reservation tracking and rollback for one checkout.

use std::time::Duration;

use domain::ProductId;
use store::{ReleaseOutcome, StockLedger};

use crate::state::SagaState;

/// One committed stock decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A reservation that could not be given back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRelease {
    pub reservation: Reservation,
    pub reason: String,
}

/// What compensation managed to undo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationReport {
    pub released: Vec<Reservation>,
    pub failed: Vec<FailedRelease>,
}

impl CompensationReport {
    /// Returns true if every reservation was returned to stock.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Tracks the stock one checkout holds and gives it back when the checkout aborts.
///
/// Owned by a single saga run and dropped when the run ends.
#[derive(Debug, Default)]
pub struct CompensationSupervisor {
    state: SagaState,
    reservations: Vec<Reservation>,
}

impl CompensationSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Reservations currently held.
    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    /// Records a successful reservation.
    pub fn record(&mut self, product_id: ProductId, quantity: u32) {
        debug_assert!(self.state.can_reserve(), "reserve in {}", self.state);
        if self.state == SagaState::Idle {
            self.advance(SagaState::Reserving);
        }
        self.reservations.push(Reservation {
            product_id,
            quantity,
        });
    }

    /// Marks the end of the reservation phase.
    pub fn all_reserved(&mut self) {
        if self.state == SagaState::Idle {
            self.advance(SagaState::Reserving);
        }
        self.advance(SagaState::AllReserved);
    }

    /// Marks the order as durably written. Held reservations now belong to the order.
    pub fn persisted(&mut self) {
        self.advance(SagaState::Persisted);
        self.reservations.clear();
    }

    /// Stops tracking held reservations without releasing them.
    ///
    /// For when it is unknown whether the order that owns them was written.
    pub fn forget(&mut self) -> Vec<Reservation> {
        std::mem::take(&mut self.reservations)
    }

    /// Releases every held reservation, newest first.
    ///
    /// Each release gets its own `grace` budget. Failures are logged and
    /// reported but never stop the remaining releases.
    pub async fn compensate<L>(&mut self, ledger: &L, grace: Duration) -> CompensationReport
    where
        L: StockLedger + ?Sized,
    {
        if self.state == SagaState::Idle {
            self.advance(SagaState::Reserving);
        }
        if self.state != SagaState::Aborting {
            self.advance(SagaState::Aborting);
        }

        let mut report = CompensationReport::default();
        while let Some(reservation) = self.reservations.pop() {
            tracing::info!(
                step = "release_stock",
                product_id = %reservation.product_id,
                quantity = reservation.quantity,
                "compensation step started"
            );
            let outcome = tokio::time::timeout(
                grace,
                ledger.release(&reservation.product_id, reservation.quantity),
            )
            .await;

            let failure = match outcome {
                Ok(Ok(ReleaseOutcome::Released)) => None,
                Ok(Ok(ReleaseOutcome::NotFound)) => Some("product no longer exists".to_string()),
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!("release timed out after {grace:?}")),
            };

            match failure {
                None => {
                    metrics::counter!("saga_compensation_releases_total").increment(1);
                    report.released.push(reservation);
                }
                Some(reason) => {
                    metrics::counter!("saga_compensation_failures_total").increment(1);
                    tracing::warn!(
                        product_id = %reservation.product_id,
                        quantity = reservation.quantity,
                        %reason,
                        "failed to release reserved stock"
                    );
                    report.failed.push(FailedRelease {
                        reservation,
                        reason,
                    });
                }
            }
        }

        self.advance(SagaState::Compensated);
        report
    }

    fn advance(&mut self, next: SagaState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal saga transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }
}

/// Owns a checkout's [`CompensationSupervisor`] and releases whatever it
/// still holds if the checkout future is dropped before it settles.
///
/// A dropped caller (client disconnect, outer timeout) stops polling the saga
/// between two awaits. On drop the remaining reservations are handed to a
/// task on the current runtime.
pub struct ReservationGuard<L>
where
    L: StockLedger + Clone + 'static,
{
    supervisor: CompensationSupervisor,
    ledger: L,
    grace: Duration,
}

impl<L> ReservationGuard<L>
where
    L: StockLedger + Clone + 'static,
{
    pub fn new(ledger: L, grace: Duration) -> Self {
        Self {
            supervisor: CompensationSupervisor::new(),
            ledger,
            grace,
        }
    }

    pub fn supervisor(&mut self) -> &mut CompensationSupervisor {
        &mut self.supervisor
    }

    /// Releases every held reservation in place, see [`CompensationSupervisor::compensate`].
    pub async fn compensate(&mut self) -> CompensationReport {
        self.supervisor.compensate(&self.ledger, self.grace).await
    }
}

impl<L> Drop for ReservationGuard<L>
where
    L: StockLedger + Clone + 'static,
{
    fn drop(&mut self) {
        if self.supervisor.reservations().is_empty() {
            return;
        }
        let mut supervisor = std::mem::take(&mut self.supervisor);
        let held = supervisor.reservations().len();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(held, "checkout dropped while holding stock, releasing in background");
                let ledger = self.ledger.clone();
                let grace = self.grace;
                handle.spawn(async move {
                    supervisor.compensate(&ledger, grace).await;
                });
            }
            Err(_) => {
                metrics::counter!("saga_compensation_failures_total").increment(held as u64);
                tracing::error!(held, "checkout dropped outside a runtime, reserved stock not released");
            }
        }
    }
}
