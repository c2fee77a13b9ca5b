//! The gradient scheduler main loop (§4.10).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use bpf_algorithms::clock::Timestamp;
use bpf_codec::SeqTracker;
use bpf_config::BpfConfig;
use bpf_pool::PacketPool;
use bpf_queue::{BinConfig, QueueDepths, QueueStore};
use bpf_transport::{EdgeIn, Frame, NeighborId, SendOutcome, Transport};
use bpf_types::{BinIndex, DstVec, Gradient, TimestampMode};
use tracing::{debug, error, info, warn};

use crate::classify::Classifier;
use crate::error::ForwarderError;
use crate::topology::Topology;

/// One tick's worth of (destination, neighbor) gradients: `solutions` holds
/// the total-byte gradients, sorted in descending order and capped at
/// `max_solutions_k` (§4.10 step 6) for dispatch selection; `ls_solutions`
/// holds the uncapped latency-sensitive-byte gradients, reported alongside
/// so `QueueStore::process_gradient_update` can recompute both per-bin caps.
struct TickGradients {
    solutions: Vec<Gradient>,
    ls_solutions: Vec<Gradient>,
}

fn compute_gradients(store: &QueueStore, topology: &Topology, max_k: usize) -> TickGradients {
    let mut grads = Vec::new();
    let mut ls_grads = Vec::new();
    for dst in topology.destinations() {
        let (local_total, local_ls) = store.depths_for_bpf(dst).unwrap_or_default();
        for neighbor in topology.neighbors_for(dst) {
            let nbr_depth = store.nbr_depth(dst, neighbor.0);
            let value = local_total as i64 - nbr_depth.total_bytes as i64;
            if value > 0 {
                grads.push(Gradient::new(value, dst, neighbor.0));
            }
            let ls_value = local_ls as i64 - nbr_depth.ls_bytes as i64;
            if ls_value > 0 {
                ls_grads.push(Gradient::new(ls_value, dst, neighbor.0));
            }
        }
    }
    grads.sort_by(|a, b| b.cmp(a));
    grads.truncate(max_k);
    TickGradients { solutions: grads, ls_solutions: ls_grads }
}

/// Owns every per-node piece of mutable state the main loop touches:
/// queues, the neighbor topology, QLAM replay trackers, and the monotonic
/// clock every algorithm below is driven by.
pub struct Forwarder {
    config: BpfConfig,
    pool: Arc<PacketPool>,
    store: QueueStore,
    topology: Topology,
    transport: Arc<dyn Transport>,
    edge_in: Option<Arc<dyn EdgeIn>>,
    classifier: Box<dyn Classifier>,
    qlam_trackers: HashMap<u32, SeqTracker>,
    qlam_seq: u16,
    started_at: Instant,
}

impl Forwarder {
    pub fn new(
        config: BpfConfig,
        pool: Arc<PacketPool>,
        transport: Arc<dyn Transport>,
        classifier: Box<dyn Classifier>,
    ) -> Self {
        let bin_config = BinConfig {
            multicast: config.forwarder.multicast_enabled,
            drop_policy: config.queue.drop_policy,
            algorithm: bpf_algorithms::AntiStarvationAlgorithm::Base,
            zlr_tuning: config.zlr.to_tuning(),
            asap_tuning: config.asap.to_tuning(),
        };
        let store = QueueStore::new(Arc::clone(&pool)).with_default_bin_config(bin_config);
        Forwarder {
            config,
            pool,
            store,
            topology: Topology::new(),
            transport,
            edge_in: None,
            classifier,
            qlam_trackers: HashMap::new(),
            qlam_seq: 0,
            started_at: Instant::now(),
        }
    }

    pub fn with_edge_in(mut self, edge_in: Arc<dyn EdgeIn>) -> Self {
        self.edge_in = Some(edge_in);
        self
    }

    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    pub fn now(&self) -> Timestamp {
        self.started_at.elapsed()
    }

    fn bin_config_for(&self, dst: BinIndex) -> BinConfig {
        let ov = self.config.override_for(dst);
        BinConfig {
            multicast: ov.multicast,
            drop_policy: ov.drop_policy.unwrap_or(self.config.queue.drop_policy),
            algorithm: ov.algorithm,
            zlr_tuning: self.config.zlr.to_tuning(),
            asap_tuning: self.config.asap.to_tuning(),
        }
    }

    /// Step 2: classify and admit one edge-ingress datagram.
    pub fn ingest_edge_bytes(&mut self, raw: &[u8]) -> Result<(), ForwarderError> {
        let Some((class, bin, payload)) = self.classifier.classify(raw) else {
            warn!("edge packet failed classification, dropping");
            return Ok(());
        };
        let now = self.now();
        let mut pkt = self.pool.get(TimestampMode::Now).map_err(ForwarderError::Pool)?;
        pkt.meta.latency_class = class;
        pkt.meta.dst_vec = DstVec::single(bin);
        pkt.meta.virtual_length = payload.len() as u32;
        pkt.data = payload.to_vec();

        let cfg = self.bin_config_for(bin);
        let mgr = self.store.get_or_create_bin_with(bin, cfg);
        if let Err((returned, e)) = mgr.enqueue(now, pkt) {
            self.pool.recycle(returned);
            warn!(bin = bin.0, error = %e, "edge packet rejected by bin queue");
        }
        Ok(())
    }

    /// Step 3: apply a frame received from a neighbor's transport.
    pub fn ingest_transport_frame(
        &mut self,
        neighbor: Option<NeighborId>,
        frame: Frame,
    ) -> Result<(), ForwarderError> {
        match frame {
            Frame::Qlam(bytes) => {
                let Some(neighbor) = neighbor else {
                    warn!("QLAM frame from unrecognized neighbor address, dropping");
                    return Ok(());
                };
                let tracker = self.qlam_trackers.entry(neighbor.0).or_insert_with(SeqTracker::new);
                match bpf_codec::decode_frame(&bytes) {
                    Ok((seq, entries)) => {
                        if tracker.is_stale(seq) {
                            debug!(neighbor = neighbor.0, seq, "stale QLAM frame discarded");
                            return Ok(());
                        }
                        for (bin, depth) in entries {
                            self.store.set_nbr_queue_depths(bin, neighbor.0, depth)?;
                        }
                        tracker.accept(seq);
                    }
                    Err(e) => {
                        warn!(neighbor = neighbor.0, error = %e, "malformed QLAM frame dropped, retaining prior depths");
                    }
                }
                Ok(())
            }
            Frame::Data { latency_class, dst_vec, virtual_length, payload } => {
                let Some(bin) = dst_vec.iter().next() else {
                    warn!("data frame with empty destination set, dropping");
                    return Ok(());
                };
                let now = self.now();
                let mut pkt = self.pool.get(TimestampMode::Now).map_err(ForwarderError::Pool)?;
                pkt.meta.latency_class = latency_class;
                pkt.meta.dst_vec = dst_vec;
                pkt.meta.virtual_length = virtual_length.max(payload.len() as u32);
                pkt.data = payload;

                let cfg = self.bin_config_for(bin);
                let mgr = self.store.get_or_create_bin_with(bin, cfg);
                if let Err((returned, e)) = mgr.enqueue(now, pkt) {
                    self.pool.recycle(returned);
                    warn!(bin = bin.0, error = %e, "transport-relayed packet rejected by bin queue");
                }
                Ok(())
            }
        }
    }

    /// Steps 4-7: housekeeping, gradient computation, and one dispatch
    /// batch. Returns the number of packets actually sent.
    pub async fn run_tick(&mut self) -> Result<usize, ForwarderError> {
        let now = self.now();

        let estimates = self.transport.drain_capacity_estimates().await;
        let mut total_bps = 0u64;
        for estimate in &estimates {
            self.store.process_capacity_update(estimate.neighbor.0, estimate.trans_bps);
            total_bps += estimate.trans_bps;
        }
        let capacity_share_bps = if estimates.is_empty() { 0.0 } else { total_bps as f64 / estimates.len() as f64 };

        self.store.periodic_adjust_queue_values(now, capacity_share_bps);

        let gradients = compute_gradients(&self.store, &self.topology, self.config.forwarder.max_solutions_k);
        self.store.process_gradient_update(
            &gradients.solutions,
            &gradients.ls_solutions,
            self.config.forwarder.gradient_cap_hysteresis_bytes,
        );
        let mut sent = 0;

        for solution in gradients.solutions {
            let dst = solution.dst_bin;
            let neighbor = NeighborId(solution.path_ctrl);

            let Some(mgr) = self.store.bin_mut(dst) else { continue };
            let Some((class, _avail)) = mgr.next_dequeue_size(DstVec::single(dst)) else {
                continue;
            };

            let xmit_size = self.transport.xmit_queue_size(neighbor).await.unwrap_or(0);
            if xmit_size > self.config.forwarder.max_solutions_k as u64 * 1500 {
                continue;
            }

            let outcome = match mgr.dequeue(now, class, u32::MAX, DstVec::single(dst))? {
                Some(o) => o,
                None => continue,
            };
            let (class, bytes, cloned) = (outcome.class, outcome.bytes, outcome.cloned);

            match self.transport.send_packet(neighbor, outcome.packet).await {
                Ok(SendOutcome::Accepted) => {
                    sent += 1;
                }
                Ok(SendOutcome::Refused(packet)) => {
                    warn!(dst = dst.0, neighbor = neighbor.0, "transport refused send, requeuing at head");
                    let mgr = self.store.bin_mut(dst).expect("bin exists, just dequeued from it");
                    mgr.requeue_head(now, bpf_queue::DequeueOutcome { packet, class, bytes, cloned });
                    break;
                }
                Err(e) => {
                    error!(dst = dst.0, neighbor = neighbor.0, error = %e, "transport send failed, packet lost");
                }
            }
        }

        for dropped in self.transport.drain_dropped_packets().await {
            self.pool.recycle(dropped);
        }

        Ok(sent)
    }

    /// Step 8: broadcast this node's local depths to every known neighbor.
    pub async fn emit_qlam(&mut self) -> Result<(), ForwarderError> {
        let depths = self.store.local_depths();
        let frame = bpf_codec::encode_frame(&depths, self.qlam_seq);
        self.qlam_seq = self.qlam_seq.wrapping_add(1);

        for neighbor in self.topology.all_neighbors() {
            if let Err(e) = self.transport.send_qlam(neighbor, frame.clone()).await {
                warn!(neighbor = neighbor.0, error = %e, "QLAM emission failed");
            }
        }
        Ok(())
    }

    /// Drain and apply exactly one ready frame from the transport, if any is
    /// immediately available; used by [`Self::run`] inside the `select!`.
    pub async fn recv_and_apply_one(&mut self) -> Result<(), ForwarderError> {
        let (neighbor, frame) = self.transport.recv_frame().await?;
        self.ingest_transport_frame(neighbor, frame)
    }

    /// Step 1-2: block for one datagram from the local edge and admit it.
    /// When no edge is attached this never completes, so it's safe to poll
    /// unconditionally from [`Self::run`]'s `select!`.
    pub async fn recv_and_ingest_one_edge_packet(&mut self) -> Result<(), ForwarderError> {
        let Some(edge) = self.edge_in.clone() else {
            return std::future::pending().await;
        };
        let mut scratch = self.pool.get(TimestampMode::None).map_err(ForwarderError::Pool)?;
        let n = edge.recv(&mut scratch, 0).await?;
        scratch.data.truncate(n);
        let raw = std::mem::take(&mut scratch.data);
        self.pool.recycle(scratch);
        self.ingest_edge_bytes(&raw)
    }

    /// Shutdown (§5): drain every queue without transmitting.
    pub fn shutdown(&mut self) {
        info!("forwarder shutting down, purging all queues");
        self.store.purge_all();
    }

    pub fn check_invariants(&self) -> Result<(), ForwarderError> {
        self.store.check_invariants().map_err(ForwarderError::Queue)
    }

    /// The full cooperative loop (§4.10, §5). Runs until `shutdown` is
    /// signaled via `cancel`. The select-style multiplexer over raw `fd,
    /// events` becomes a `tokio::select!` over: one in-flight transport
    /// receive, one in-flight edge receive, and three periodic interval
    /// ticks, which is the async-native reinterpretation of the same
    /// suspension-point contract (§5: "the select-style multiplexer is the
    /// only explicit suspension point").
    pub async fn run(&mut self, cancel: tokio::sync::watch::Receiver<bool>) -> Result<(), ForwarderError> {
        let mut cancel = cancel;
        let mut asap_tick = tokio::time::interval(std::time::Duration::from_millis(self.config.forwarder.asap_tick_ms));
        let mut qlam_tick = tokio::time::interval(std::time::Duration::from_millis(self.config.forwarder.qlam_interval_ms));
        let mut stats_tick = tokio::time::interval(std::time::Duration::from_millis(self.config.forwarder.stats_interval_ms));

        info!("forwarder main loop starting");
        loop {
            tokio::select! {
                biased;
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        break;
                    }
                }
                _ = asap_tick.tick() => {
                    if let Err(e) = self.run_tick().await {
                        if ForwarderError::is_fatal(&e) {
                            error!(error = %e, "fatal condition detected, terminating forwarder");
                            return Err(e);
                        }
                        warn!(error = %e, "tick error absorbed");
                    }
                }
                _ = qlam_tick.tick() => {
                    if let Err(e) = self.emit_qlam().await {
                        warn!(error = %e, "qlam emission error absorbed");
                    }
                }
                _ = stats_tick.tick() => {
                    debug!("statistics roll-up tick");
                }
                result = self.recv_and_ingest_one_edge_packet() => {
                    if let Err(e) = result {
                        warn!(error = %e, "edge packet ingestion error absorbed");
                    }
                }
                result = self.transport.recv_frame() => {
                    match result {
                        Ok((neighbor, frame)) => {
                            if let Err(e) = self.ingest_transport_frame(neighbor, frame) {
                                warn!(error = %e, "transport frame ingestion error absorbed");
                            }
                        }
                        Err(e) => warn!(error = %e, "transport receive error"),
                    }
                }
            }
        }
        self.shutdown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::HeaderClassifier;
    use async_trait::async_trait;
    use bpf_pool::Packet;
    use bpf_transport::{CapacityEstimate, TransportError};
    use bpf_types::LatencyClass;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeTransport {
        sent: Mutex<Vec<(NeighborId, usize)>>,
        refuse_next: Mutex<bool>,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send_packet(&self, neighbor: NeighborId, pkt: Packet) -> Result<SendOutcome, TransportError> {
            let mut refuse = self.refuse_next.lock();
            if *refuse {
                *refuse = false;
                return Ok(SendOutcome::Refused(pkt));
            }
            self.sent.lock().push((neighbor, pkt.data.len()));
            Ok(SendOutcome::Accepted)
        }
        async fn xmit_queue_size(&self, _neighbor: NeighborId) -> Result<u64, TransportError> {
            Ok(0)
        }
        async fn drain_capacity_estimates(&self) -> Vec<CapacityEstimate> {
            Vec::new()
        }
        async fn drain_dropped_packets(&self) -> Vec<Packet> {
            Vec::new()
        }
        async fn send_qlam(&self, _neighbor: NeighborId, _bytes: Vec<u8>) -> Result<(), TransportError> {
            Ok(())
        }
        async fn recv_frame(&self) -> Result<(Option<NeighborId>, Frame), TransportError> {
            std::future::pending().await
        }
    }

    fn forwarder() -> Forwarder {
        let pool = Arc::new(PacketPool::new_standalone());
        let transport: Arc<dyn Transport> = Arc::new(FakeTransport::default());
        Forwarder::new(BpfConfig::default(), pool, transport, Box::new(HeaderClassifier))
    }

    #[tokio::test]
    async fn tick_with_no_traffic_sends_nothing() {
        let mut fwd = forwarder();
        fwd.topology_mut().add_route(BinIndex(1), NeighborId(1));
        let sent = fwd.run_tick().await.unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn positive_gradient_drains_a_packet() {
        let mut fwd = forwarder();
        fwd.topology_mut().add_route(BinIndex(1), NeighborId(1));
        let raw = [LatencyClass::NormalLatency as u8, 1, 9, 9, 9];
        fwd.ingest_edge_bytes(&raw).unwrap();

        let sent = fwd.run_tick().await.unwrap();
        assert_eq!(sent, 1);
    }

    #[tokio::test]
    async fn transport_refusal_requeues_and_preserves_bytes() {
        let pool = Arc::new(PacketPool::new_standalone());
        let transport = Arc::new(FakeTransport::default());
        *transport.refuse_next.lock() = true;
        let transport_dyn: Arc<dyn Transport> = transport;
        let mut fwd = Forwarder::new(BpfConfig::default(), pool, transport_dyn, Box::new(HeaderClassifier));
        fwd.topology_mut().add_route(BinIndex(3), NeighborId(5));
        let raw = [LatencyClass::NormalLatency as u8, 3, 1, 2];
        fwd.ingest_edge_bytes(&raw).unwrap();

        let sent = fwd.run_tick().await.unwrap();
        assert_eq!(sent, 0);
        fwd.check_invariants().unwrap();
    }
}
