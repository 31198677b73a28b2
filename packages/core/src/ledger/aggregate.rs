//! Transaction history and running totals.
//!
//! Totals only move when a transaction is `Completed`, so they always equal
//! the sum of completed amounts per kind. Ordering of the history is
//! newest-first and display-only.

use std::collections::VecDeque;

use serde::Serialize;

use crate::ledger::{
    error::LedgerError,
    transaction::{PaymentTransaction, TransactionKind, TransactionStatus},
};
use crate::services::payments::{to_minor_units, PaymentProcessor, Payout};

/// Smallest balance that can be withdrawn.
pub const MINIMUM_WITHDRAWAL: f64 = 10.00;

/// Summed amounts per transaction kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total_earnings: f64,
    pub total_spent: f64,
}

#[derive(Debug, Default)]
pub struct AggregateLedger {
    transactions: VecDeque<PaymentTransaction>,
    totals: Totals,
    withdrawn: f64,
    payouts: Vec<Payout>,
}

impl AggregateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a transaction. Counts toward totals only if already
    /// `Completed`.
    pub fn record_transaction(&mut self, tx: PaymentTransaction) {
        if tx.status == TransactionStatus::Completed {
            self.apply(tx.kind, tx.amount);
        }
        tracing::debug!(
            "Recorded {} transaction {} for {:.4} {} ({})",
            tx.kind.as_str(),
            tx.id,
            tx.amount,
            tx.currency,
            tx.status.as_str(),
        );
        self.transactions.push_front(tx);
    }

    /// Processor confirmed the transaction: `Pending -> Completed`.
    pub fn confirm(&mut self, tx_id: &str, reference: Option<String>) -> Result<&PaymentTransaction, LedgerError> {
        let tx = self.find_mut(tx_id)?;
        tx.complete(reference)?;
        let (kind, amount) = (tx.kind, tx.amount);
        self.apply(kind, amount);
        self.get(tx_id)
            .ok_or_else(|| LedgerError::unknown_transaction(tx_id))
    }

    /// Processor rejected the transaction: `Pending -> Failed`.
    pub fn mark_failed(&mut self, tx_id: &str) -> Result<(), LedgerError> {
        self.find_mut(tx_id)?.fail()
    }

    fn apply(&mut self, kind: TransactionKind, amount: f64) {
        match kind {
            TransactionKind::Earning => self.totals.total_earnings += amount,
            TransactionKind::Payment => self.totals.total_spent += amount,
        }
    }

    fn find_mut(&mut self, tx_id: &str) -> Result<&mut PaymentTransaction, LedgerError> {
        self.transactions
            .iter_mut()
            .find(|t| t.id == tx_id)
            .ok_or_else(|| LedgerError::unknown_transaction(tx_id))
    }

    pub fn get(&self, tx_id: &str) -> Option<&PaymentTransaction> {
        self.transactions.iter().find(|t| t.id == tx_id)
    }

    /// Newest first.
    pub fn transactions(&self) -> impl Iterator<Item = &PaymentTransaction> {
        self.transactions.iter()
    }

    /// The `n` most recent transactions.
    pub fn recent(&self, n: usize) -> Vec<&PaymentTransaction> {
        self.transactions.iter().take(n).collect()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn total_earnings(&self) -> f64 {
        self.totals.total_earnings
    }

    pub fn total_spent(&self) -> f64 {
        self.totals.total_spent
    }

    /// Totals re-derived from the history rather than the running sums.
    pub fn recompute_totals(&self) -> Totals {
        self.transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Completed)
            .fold(Totals::default(), |mut acc, t| {
                match t.kind {
                    TransactionKind::Earning => acc.total_earnings += t.amount,
                    TransactionKind::Payment => acc.total_spent += t.amount,
                }
                acc
            })
    }

    /// Earnings not yet paid out.
    pub fn available_balance(&self) -> f64 {
        self.totals.total_earnings - self.withdrawn
    }

    pub fn total_withdrawn(&self) -> f64 {
        self.withdrawn
    }

    pub fn payouts(&self) -> &[Payout] {
        &self.payouts
    }

    /// Pay out the whole available balance, to the cent, to `destination`.
    ///
    /// Fails with [`LedgerError::BelowMinimum`] under
    /// [`MINIMUM_WITHDRAWAL`]. A processor failure leaves the ledger as it
    /// was.
    pub async fn withdraw(
        &mut self,
        processor: &(dyn PaymentProcessor + Send + Sync),
        destination: &str,
    ) -> Result<Payout, LedgerError> {
        // Running sums drift below the cent; compare and pay in whole cents.
        let available_cents = to_minor_units(self.available_balance());
        if available_cents < to_minor_units(MINIMUM_WITHDRAWAL) {
            return Err(LedgerError::BelowMinimum {
                available: self.available_balance(),
                minimum: MINIMUM_WITHDRAWAL,
            });
        }
        let amount = available_cents as f64 / 100.0;

        let payout = processor.process_payout(amount, destination).await?;

        self.withdrawn += payout.amount;
        self.payouts.push(payout.clone());
        tracing::info!(
            "Withdrew {:.2} to {} (payout {})",
            payout.amount,
            destination,
            payout.payout_id
        );
        Ok(payout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::services::payments::SimulatedProcessor;

    fn completed(id: &str, kind: TransactionKind, amount: f64) -> PaymentTransaction {
        let mut tx = pending(id, kind, amount);
        tx.status = TransactionStatus::Completed;
        tx
    }

    fn pending(id: &str, kind: TransactionKind, amount: f64) -> PaymentTransaction {
        PaymentTransaction::pending(id, kind, amount, "USD", "1", Utc::now())
    }

    #[test]
    fn completed_earning_adds_exact_amount() {
        let mut ledger = AggregateLedger::new();
        ledger.record_transaction(completed("t1", TransactionKind::Earning, 5.00));
        assert_eq!(ledger.total_earnings(), 5.00);
        assert_eq!(ledger.total_spent(), 0.0);
    }

    #[test]
    fn payment_never_affects_earnings() {
        let mut ledger = AggregateLedger::new();
        ledger.record_transaction(completed("t1", TransactionKind::Payment, 3.25));
        assert_eq!(ledger.total_earnings(), 0.0);
        assert_eq!(ledger.total_spent(), 3.25);
    }

    #[test]
    fn pending_transactions_do_not_count_until_confirmed() {
        let mut ledger = AggregateLedger::new();
        ledger.record_transaction(pending("t1", TransactionKind::Earning, 2.0));
        assert_eq!(ledger.total_earnings(), 0.0);

        ledger.confirm("t1", Some("pi_abc".to_string())).unwrap();
        assert_eq!(ledger.total_earnings(), 2.0);
        assert_eq!(
            ledger.get("t1").unwrap().processor_reference.as_deref(),
            Some("pi_abc")
        );
    }

    #[test]
    fn confirming_twice_does_not_double_count() {
        let mut ledger = AggregateLedger::new();
        ledger.record_transaction(pending("t1", TransactionKind::Payment, 1.5));
        ledger.confirm("t1", None).unwrap();
        assert!(ledger.confirm("t1", None).is_err());
        assert_eq!(ledger.total_spent(), 1.5);
    }

    #[test]
    fn failed_transactions_never_count() {
        let mut ledger = AggregateLedger::new();
        ledger.record_transaction(pending("t1", TransactionKind::Earning, 4.0));
        ledger.mark_failed("t1").unwrap();
        assert!(ledger.confirm("t1", None).is_err());
        assert_eq!(ledger.total_earnings(), 0.0);
    }

    #[test]
    fn unknown_transaction_is_reported() {
        let mut ledger = AggregateLedger::new();
        assert!(matches!(
            ledger.confirm("missing", None),
            Err(LedgerError::UnknownTransaction { .. })
        ));
    }

    #[test]
    fn history_is_newest_first_and_totals_match_history() {
        let mut ledger = AggregateLedger::new();
        ledger.record_transaction(completed("t1", TransactionKind::Earning, 0.83));
        ledger.record_transaction(completed("t2", TransactionKind::Earning, 0.58));
        ledger.record_transaction(pending("t3", TransactionKind::Payment, 0.2));
        ledger.record_transaction(completed("t4", TransactionKind::Payment, 0.4));

        let ids: Vec<_> = ledger.transactions().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t4", "t3", "t2", "t1"]);
        assert_eq!(ledger.recent(2).len(), 2);

        let derived = ledger.recompute_totals();
        assert!((derived.total_earnings - ledger.total_earnings()).abs() < 1e-9);
        assert!((derived.total_spent - ledger.total_spent()).abs() < 1e-9);
        assert!((ledger.total_earnings() - 1.41).abs() < 1e-9);
    }

    #[tokio::test]
    async fn withdrawal_below_minimum_fails() {
        let mut ledger = AggregateLedger::new();
        ledger.record_transaction(completed("t1", TransactionKind::Earning, 9.99));

        let err = ledger
            .withdraw(&SimulatedProcessor::instant(), "card_4242")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::BelowMinimum { .. }));
        assert!(ledger.payouts().is_empty());
    }

    #[tokio::test]
    async fn minimum_reached_through_many_small_earnings() {
        let mut ledger = AggregateLedger::new();
        for i in 0..100 {
            let id = format!("t{}", i);
            ledger.record_transaction(pending(&id, TransactionKind::Earning, 0.10));
            ledger.confirm(&id, None).unwrap();
        }
        assert!(ledger.total_earnings() < MINIMUM_WITHDRAWAL);

        let payout = ledger
            .withdraw(&SimulatedProcessor::instant(), "card_4242")
            .await
            .unwrap();
        assert_eq!(payout.amount, 10.00);
        assert_eq!(ledger.total_withdrawn(), 10.00);
    }

    #[tokio::test]
    async fn a_cent_short_is_below_minimum() {
        let mut ledger = AggregateLedger::new();
        ledger.record_transaction(completed("t1", TransactionKind::Earning, 9.99));
        assert!(matches!(
            ledger.withdraw(&SimulatedProcessor::instant(), "card_4242").await,
            Err(LedgerError::BelowMinimum { .. })
        ));
        assert!(ledger.payouts().is_empty());
    }

    #[tokio::test]
    async fn withdrawal_at_minimum_succeeds() {
        let mut ledger = AggregateLedger::new();
        ledger.record_transaction(completed("t1", TransactionKind::Earning, 10.00));

        let payout = ledger
            .withdraw(&SimulatedProcessor::instant(), "card_4242")
            .await
            .unwrap();
        assert_eq!(payout.amount, 10.00);
        assert!(payout.payout_id.starts_with("po_"));
        assert_eq!(ledger.available_balance(), 0.0);
        assert_eq!(ledger.total_withdrawn(), 10.00);
        assert_eq!(ledger.total_earnings(), 10.00);
    }

    #[tokio::test]
    async fn second_withdrawal_needs_new_earnings() {
        let mut ledger = AggregateLedger::new();
        ledger.record_transaction(completed("t1", TransactionKind::Earning, 12.0));
        let processor = SimulatedProcessor::instant();

        ledger.withdraw(&processor, "card_4242").await.unwrap();
        assert!(matches!(
            ledger.withdraw(&processor, "card_4242").await,
            Err(LedgerError::BelowMinimum { .. })
        ));
    }

    #[tokio::test]
    async fn processor_failure_leaves_balance_untouched() {
        let mut ledger = AggregateLedger::new();
        ledger.record_transaction(completed("t1", TransactionKind::Earning, 25.0));

        let err = ledger
            .withdraw(&SimulatedProcessor::failing("card declined"), "card_4242")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Processor(_)));
        assert_eq!(ledger.available_balance(), 25.0);
        assert_eq!(ledger.total_earnings(), 25.0);
    }
}
