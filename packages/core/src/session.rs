//! In-memory session state.
//!
//! `SessionStore` is the single writer for connections, the transaction
//! ledger and the sharing flag. Callers share it as
//! `Arc<RwLock<SessionStore>>` between the accrual loop and whatever drives
//! user actions.
//!
//! Whether anything is accruing is published on a `watch` channel so the
//! scheduler can start and stop its timer without polling.

use std::sync::Arc;

use tokio::sync::watch;

use crate::bandwidth::{BandwidthStats, Throughput};
use crate::clock::{Clock, SystemClock};
use crate::ledger::{
    AccrualLedger, AggregateLedger, Connection, ConnectionStatus, ConnectionType, LedgerError,
    PaymentTransaction, PeerInfo, PeerLocation, Quality, TransactionKind,
};
use crate::nodes::{NetworkNode, NodeDirectory};
use crate::pricing::{DemandLevel, PricingEngine, PricingError};
use crate::services::payments::{PaymentProcessor, Payout, ProcessorError};
use crate::settings::{NetworkType, ShareSettings};

pub struct SessionStore {
    engine: PricingEngine,
    accrual: AccrualLedger,
    ledger: AggregateLedger,
    connections: Vec<Connection>,
    nodes: NodeDirectory,
    settings: ShareSettings,
    bandwidth: BandwidthStats,
    sharing: bool,
    network: Option<NetworkType>,
    currency: String,
    clock: Arc<dyn Clock>,
    next_connection: u64,
    next_transaction: u64,
    accruing: watch::Sender<bool>,
}

impl SessionStore {
    pub fn new(engine: PricingEngine, nodes: NodeDirectory, settings: ShareSettings) -> Self {
        let (accruing, _) = watch::channel(false);
        Self {
            engine,
            accrual: AccrualLedger::default(),
            ledger: AggregateLedger::new(),
            connections: Vec::new(),
            nodes,
            settings: settings.normalized(),
            bandwidth: BandwidthStats::default(),
            sharing: true,
            network: None,
            currency: "USD".to_string(),
            clock: Arc::new(SystemClock),
            next_connection: 0,
            next_transaction: 0,
            accruing,
        }
    }

    pub fn with_accrual(mut self, accrual: AccrualLedger) -> Self {
        self.accrual = accrual;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    // ---- connection lifecycle ----

    /// Start consuming bandwidth from a discovered node. The node's distance
    /// is quoted now and the quote stays with the connection.
    pub fn connect_to_node(&mut self, node_id: &str, demand: DemandLevel) -> Result<String, LedgerError> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| LedgerError::unknown_node(node_id))?;
        if !node.available {
            return Err(LedgerError::NodeUnavailable { id: node_id.to_string() });
        }
        let distance_km = node.distance_km.ok_or_else(|| {
            PricingError::validation(format!("node {} has no known distance", node_id))
        })?;
        let peer = peer_from_node(node, distance_km);

        self.open(peer, ConnectionType::Consumer, demand)
    }

    /// Start sharing bandwidth with a peer that asked for it. Refused while
    /// sharing is off or the current network type is not allowed.
    pub fn accept_peer(&mut self, peer: PeerInfo, demand: DemandLevel) -> Result<String, LedgerError> {
        if !self.sharing {
            return Err(LedgerError::SharingDisabled);
        }
        if let Some(network) = self.network {
            if !self.settings.allows(network) {
                return Err(LedgerError::NetworkNotAllowed { network });
            }
        }
        self.open(peer, ConnectionType::Provider, demand)
    }

    fn open(&mut self, peer: PeerInfo, connection_type: ConnectionType, demand: DemandLevel) -> Result<String, LedgerError> {
        let active = self.connections.iter().filter(|c| c.is_active()).count();
        if active >= self.settings.max_connections as usize {
            return Err(LedgerError::ConnectionLimit {
                max: self.settings.max_connections,
            });
        }

        let quote = self.engine.quote(peer.location.distance_km, demand)?;

        self.next_connection += 1;
        let id = format!("conn-{}", self.next_connection);
        tracing::info!(
            "Opening {:?} connection {} with {} at {:.3}/GB",
            connection_type,
            id,
            peer.peer_name,
            quote.current_rate
        );

        let connection = Connection::new(id.clone(), peer, connection_type, quote, self.clock.now());
        self.connections.push(connection);
        Ok(id)
    }

    /// Handshake finished; the connection accrues from the next tick.
    pub fn mark_connected(&mut self, id: &str) -> Result<(), LedgerError> {
        self.connection_mut(id)?.mark_connected()?;
        self.publish_accruing();
        Ok(())
    }

    /// Close a connection. If it was accruing, its final amount is booked as
    /// a pending transaction whose id is returned.
    pub fn disconnect(&mut self, id: &str) -> Result<Option<String>, LedgerError> {
        let now = self.clock.now();
        let from = self.connection_mut(id)?.disconnect(now)?;
        let tx = self.book_final_amount(id, from)?;
        self.publish_accruing();
        Ok(tx)
    }

    /// Mark a connection as failed. Anything accrued before the failure is
    /// still booked.
    pub fn fail(&mut self, id: &str) -> Result<Option<String>, LedgerError> {
        let now = self.clock.now();
        let from = self.connection_mut(id)?.fail(now)?;
        tracing::warn!("Connection {} failed while {}", id, from);
        let tx = self.book_final_amount(id, from)?;
        self.publish_accruing();
        Ok(tx)
    }

    fn book_final_amount(&mut self, id: &str, from: ConnectionStatus) -> Result<Option<String>, LedgerError> {
        if from != ConnectionStatus::Connected {
            return Ok(None);
        }

        let connection = self.connection(id).ok_or_else(|| LedgerError::unknown_connection(id))?;
        let kind = match connection.connection_type {
            ConnectionType::Provider => TransactionKind::Earning,
            ConnectionType::Consumer => TransactionKind::Payment,
        };
        let amount = connection.accrual.amount();

        self.next_transaction += 1;
        let tx_id = format!("txn-{:03}", self.next_transaction);
        let tx = PaymentTransaction::pending(
            tx_id.clone(),
            kind,
            amount,
            self.currency.clone(),
            id,
            self.clock.now(),
        );
        self.ledger.record_transaction(tx);
        Ok(Some(tx_id))
    }

    pub fn set_quality(&mut self, id: &str, quality: Quality) -> Result<(), LedgerError> {
        self.connection_mut(id)?.quality = quality;
        Ok(())
    }

    // ---- accrual ----

    /// Advance every connected record by `elapsed_secs`. Returns how many
    /// were advanced.
    pub fn tick(&mut self, elapsed_secs: u64) -> usize {
        self.accrual.advance_all(self.connections.iter_mut(), elapsed_secs)
    }

    /// Fold in a throughput sample, capped at `max_bandwidth_mbps`.
    pub fn record_bandwidth(&mut self, sample: Throughput, interval_secs: f64) {
        let cap = f64::from(self.settings.max_bandwidth_mbps);
        let capped = Throughput {
            upload: sample.upload.min(cap),
            download: sample.download.min(cap),
        };
        self.bandwidth.record(capped, interval_secs);
    }

    pub fn is_accruing(&self) -> bool {
        self.connections
            .iter()
            .any(|c| c.status == ConnectionStatus::Connected)
    }

    /// Receiver that flips whenever [`is_accruing`](Self::is_accruing) changes.
    pub fn subscribe_accruing(&self) -> watch::Receiver<bool> {
        self.accruing.subscribe()
    }

    fn publish_accruing(&self) {
        let accruing = self.is_accruing();
        self.accruing.send_if_modified(|current| {
            if *current == accruing {
                false
            } else {
                *current = accruing;
                true
            }
        });
    }

    // ---- settlement ----

    /// Ask the processor to settle a pending transaction. Only a `succeeded`
    /// intent completes it and counts toward the totals. Any other intent
    /// status, or a processor failure, leaves it pending and is returned as
    /// an error.
    pub async fn settle(
        &mut self,
        tx_id: &str,
        processor: &(dyn PaymentProcessor + Send + Sync),
    ) -> Result<&PaymentTransaction, LedgerError> {
        let tx = self
            .ledger
            .get(tx_id)
            .ok_or_else(|| LedgerError::unknown_transaction(tx_id))?;
        if tx.is_final() {
            return Err(LedgerError::transaction_finalized(tx_id));
        }
        let (amount, currency) = (tx.amount, tx.currency.clone());

        let intent = processor.create_intent(amount, &currency).await.map_err(|err| {
            tracing::error!("Settlement of {} via {} failed: {}", tx_id, processor.processor_name(), err);
            err
        })?;

        if !intent.is_succeeded() {
            tracing::warn!(
                "Intent {} for {} came back {}; leaving it pending",
                intent.id,
                tx_id,
                intent.status
            );
            return Err(ProcessorError::Rejected {
                message: format!("payment intent {} is {}", intent.id, intent.status),
            }
            .into());
        }

        self.ledger.confirm(tx_id, Some(intent.id))
    }

    /// Give up on a pending transaction.
    pub fn reject(&mut self, tx_id: &str) -> Result<(), LedgerError> {
        self.ledger.mark_failed(tx_id)
    }

    pub async fn withdraw(
        &mut self,
        processor: &(dyn PaymentProcessor + Send + Sync),
        destination: &str,
    ) -> Result<Payout, LedgerError> {
        self.ledger.withdraw(processor, destination).await
    }

    // ---- sharing & discovery ----

    pub fn toggle_sharing(&mut self) -> bool {
        self.sharing = !self.sharing;
        tracing::info!("Sharing {}", if self.sharing { "enabled" } else { "disabled" });
        self.sharing
    }

    pub fn is_sharing(&self) -> bool {
        self.sharing
    }

    pub fn discover_nodes(&self) -> Vec<&NetworkNode> {
        self.nodes.discover(&self.settings)
    }

    /// With `auto_connect` on and nothing being consumed, connect to the
    /// nearest discovered node. Returns the new connection id, if any.
    pub fn auto_connect(&mut self, demand: DemandLevel) -> Result<Option<String>, LedgerError> {
        if !self.settings.auto_connect {
            return Ok(None);
        }
        let consuming = self
            .connections
            .iter()
            .any(|c| c.is_active() && c.connection_type == ConnectionType::Consumer);
        if consuming {
            return Ok(None);
        }

        let nearest = match self.discover_nodes().first() {
            Some(node) => node.id.clone(),
            None => {
                tracing::debug!("Auto-connect found no matching node");
                return Ok(None);
            }
        };
        tracing::info!("Auto-connecting to {}", nearest);
        self.connect_to_node(&nearest, demand).map(Some)
    }

    /// The network type the device is currently on, when known.
    pub fn set_network(&mut self, network: NetworkType) {
        self.network = Some(network);
    }

    pub fn network(&self) -> Option<NetworkType> {
        self.network
    }

    pub fn update_settings(&mut self, settings: ShareSettings) -> Result<(), LedgerError> {
        let settings = settings.normalized();
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    // ---- accessors ----

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    fn connection_mut(&mut self, id: &str) -> Result<&mut Connection, LedgerError> {
        self.connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| LedgerError::unknown_connection(id))
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn active_connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .filter(|c| c.status == ConnectionStatus::Connected)
    }

    pub fn ledger(&self) -> &AggregateLedger {
        &self.ledger
    }

    pub fn engine(&self) -> &PricingEngine {
        &self.engine
    }

    /// New quotes use the updated engine; existing connections keep theirs.
    pub fn engine_mut(&mut self) -> &mut PricingEngine {
        &mut self.engine
    }

    pub fn nodes(&self) -> &NodeDirectory {
        &self.nodes
    }

    pub fn settings(&self) -> &ShareSettings {
        &self.settings
    }

    pub fn bandwidth(&self) -> &BandwidthStats {
        &self.bandwidth
    }
}

fn peer_from_node(node: &NetworkNode, distance_km: f64) -> PeerInfo {
    PeerInfo {
        peer_id: node.id.clone(),
        peer_name: node.name.clone(),
        location: PeerLocation {
            latitude: node.location.latitude,
            longitude: node.location.longitude,
            address: node.location.address.clone(),
            distance_km,
        },
    }
}
