//! Tick-based accrual and the per-connection state machine.
//!
//! `Connecting -> Connected -> Disconnected`, with `Error` reachable from
//! either live state. `Disconnected` and `Error` are terminal: a reconnect
//! is a new record.

use chrono::{DateTime, Utc};

use crate::ledger::{
    error::LedgerError,
    types::{Connection, ConnectionStatus},
};

/// Assumed consumption while connected, in GB per hour.
pub const DEFAULT_GB_PER_HOUR: f64 = 0.5;

/// Advance a connected record by `elapsed_secs`.
///
/// Data used is derived from total duration and a fixed consumption rate,
/// not from the measured upload/download figures. The locked-in rate is
/// never recomputed. Returns `false` (and changes nothing) unless the
/// connection is `Connected`.
pub fn advance(connection: &mut Connection, elapsed_secs: u64, gb_per_hour: f64) -> bool {
    if connection.status != ConnectionStatus::Connected {
        return false;
    }

    let duration = connection.duration.saturating_add(elapsed_secs);
    let data_used_gb = duration as f64 / 3600.0 * gb_per_hour;

    connection.duration = duration;
    connection.bandwidth.total = data_used_gb;
    connection.accrual = connection
        .accrual
        .with_amount(data_used_gb * connection.pricing.current_rate);

    true
}

/// Applies [`advance`] with a fixed consumption rate
#[derive(Debug, Clone, Copy)]
pub struct AccrualLedger {
    gb_per_hour: f64,
}

impl AccrualLedger {
    pub fn new(gb_per_hour: f64) -> Self {
        Self { gb_per_hour }
    }

    pub fn gb_per_hour(&self) -> f64 {
        self.gb_per_hour
    }

    pub fn advance(&self, connection: &mut Connection, elapsed_secs: u64) -> bool {
        advance(connection, elapsed_secs, self.gb_per_hour)
    }

    /// Advance every connected record, returning how many moved.
    pub fn advance_all<'a, I>(&self, connections: I, elapsed_secs: u64) -> usize
    where
        I: IntoIterator<Item = &'a mut Connection>,
    {
        connections
            .into_iter()
            .filter_map(|c| self.advance(c, elapsed_secs).then_some(()))
            .count()
    }
}

impl Default for AccrualLedger {
    fn default() -> Self {
        Self::new(DEFAULT_GB_PER_HOUR)
    }
}

impl Connection {
    fn transition(
        &mut self,
        allowed_from: &[ConnectionStatus],
        to: ConnectionStatus,
    ) -> Result<ConnectionStatus, LedgerError> {
        let from = self.status;
        if !allowed_from.contains(&from) {
            return Err(LedgerError::InvalidTransition {
                id: self.id.clone(),
                from,
                to,
            });
        }
        self.status = to;
        Ok(from)
    }

    /// Handshake succeeded; accrual starts on the next tick.
    pub fn mark_connected(&mut self) -> Result<(), LedgerError> {
        self.transition(&[ConnectionStatus::Connecting], ConnectionStatus::Connected)
            .map(|_| ())
    }

    /// Stop accruing. The record's duration, total and amount are final from
    /// here on. Returns the status it left.
    pub fn disconnect(&mut self, at: DateTime<Utc>) -> Result<ConnectionStatus, LedgerError> {
        let from = self.transition(
            &[ConnectionStatus::Connecting, ConnectionStatus::Connected],
            ConnectionStatus::Disconnected,
        )?;
        self.ended_at = Some(at);
        Ok(from)
    }

    /// Handshake or link failure. Returns the status it left.
    pub fn fail(&mut self, at: DateTime<Utc>) -> Result<ConnectionStatus, LedgerError> {
        let from = self.transition(
            &[ConnectionStatus::Connecting, ConnectionStatus::Connected],
            ConnectionStatus::Error,
        )?;
        self.ended_at = Some(at);
        Ok(from)
    }
}
