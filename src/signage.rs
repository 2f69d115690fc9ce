//! Second-screen signage coordinator.
//!
//! Pure in-memory, per-merchant state: POS pushes a QR to display, the
//! signage screen polls it, a webhook flips it to paid, and the screen
//! acks once it has spoken the confirmation and is ready to go back to
//! idle/rotating content. There is no persistence here by design -- this
//! is ephemeral UI coordination, not a ledger.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignageStatus {
    WaitingPayment,
    Paid,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignageDisplay {
    pub qr_image: String,
    pub amount: f64,
    pub status: SignageStatus,
}

#[derive(Default)]
pub struct SignageCoordinator {
    state: Mutex<HashMap<i64, SignageDisplay>>,
}

impl SignageCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// POS calls this right after generating a PromptPay QR.
    pub fn set_display(&self, store_id: i64, qr_image: String, amount: f64) {
        self.state.lock().insert(
            store_id,
            SignageDisplay {
                qr_image,
                amount,
                status: SignageStatus::WaitingPayment,
            },
        );
    }

    /// Webhook ingestion calls this once a back-transaction resolves to
    /// this store. No-op if nothing is currently displaying -- the
    /// payment may have come in after the customer already left the
    /// counter or the POS session was cancelled.
    pub fn set_paid(&self, store_id: i64) {
        if let Some(display) = self.state.lock().get_mut(&store_id) {
            display.status = SignageStatus::Paid;
        }
    }

    /// Signage screen polls this.
    pub fn display(&self, store_id: i64) -> Option<SignageDisplay> {
        self.state.lock().get(&store_id).cloned()
    }

    /// Signage screen calls this after announcing the payment, to drop
    /// back into idle/rotating content.
    pub fn ack_paid(&self, store_id: i64) {
        self.state.lock().remove(&store_id);
    }

    /// POS calls this if the customer cancels before paying.
    pub fn clear(&self, store_id: i64) {
        self.state.lock().remove(&store_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_display_then_poll_returns_waiting_payment() {
        let coord = SignageCoordinator::new();
        coord.set_display(1, "data:image/png;base64,abc".to_string(), 120.0);

        let display = coord.display(1).unwrap();
        assert_eq!(display.status, SignageStatus::WaitingPayment);
        assert_eq!(display.amount, 120.0);
    }

    #[test]
    fn set_paid_flips_status_for_active_display() {
        let coord = SignageCoordinator::new();
        coord.set_display(1, "qr".to_string(), 50.0);
        coord.set_paid(1);

        assert_eq!(coord.display(1).unwrap().status, SignageStatus::Paid);
    }

    #[test]
    fn set_paid_on_absent_display_is_a_no_op() {
        let coord = SignageCoordinator::new();
        coord.set_paid(99);
        assert!(coord.display(99).is_none());
    }

    #[test]
    fn ack_paid_clears_the_display() {
        let coord = SignageCoordinator::new();
        coord.set_display(1, "qr".to_string(), 50.0);
        coord.set_paid(1);
        coord.ack_paid(1);

        assert!(coord.display(1).is_none());
    }

    #[test]
    fn clear_cancels_a_pending_display() {
        let coord = SignageCoordinator::new();
        coord.set_display(2, "qr".to_string(), 10.0);
        coord.clear(2);
        assert!(coord.display(2).is_none());
    }
}
