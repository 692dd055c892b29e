//! Scan orchestration.
//!
//! One scan owns one `TopologyGraph`. Phases run strictly in sequence —
//! device discovery, router discovery, FDT reads, finalize — and within
//! a phase requests are awaited one at a time, trading throughput for
//! bounded network load and unambiguous response attribution. Per-window
//! and per-probe failures are swallowed and logged; only configuration
//! validation is fatal. Whatever was written before a cancellation is a
//! valid, possibly incomplete, graph.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use uuid::Uuid;

use bacmap_core::{BacnetAddress, DeviceInstance, NetworkNumber, VendorId};
use bacmap_graph::{NodeKey, NodeKind, Property, PropertyValue, RelationKind, TopologyGraph};

use crate::bvll::BvllService;
use crate::config::ScannerConfig;
use crate::error::{DiscoverError, Result};
use crate::subnets::SubnetTable;
use crate::transport::{BacnetApplication, BvllTransport, FdtEntry, IAm, RouterAdvert};
use crate::windows::WindowPlanner;

/// Scanner-local working state, rebuilt for every run. Not persisted.
struct ScanState {
    subnets: SubnetTable,
    /// Networks reported by routed (non-IP) devices; drives router
    /// discovery.
    networks: BTreeSet<NetworkNumber>,
    /// Networks announced by routers; materialized in finalize.
    announced_networks: BTreeSet<NetworkNumber>,
    bbmds: BTreeMap<IpAddr, NodeKey>,
    bbmd_bdt: BTreeMap<IpAddr, Vec<IpAddr>>,
    bbmd_fdt: BTreeMap<IpAddr, Vec<FdtEntry>>,
}

impl ScanState {
    fn new(config: &ScannerConfig) -> Self {
        Self {
            subnets: SubnetTable::new(config.subnets.clone(), config.synthesized_prefix_len),
            networks: BTreeSet::new(),
            announced_networks: BTreeSet::new(),
            bbmds: BTreeMap::new(),
            bbmd_bdt: BTreeMap::new(),
            bbmd_fdt: BTreeMap::new(),
        }
    }
}

/// Metadata about a completed scan run.
#[derive(Debug)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub duration: Duration,
    pub summary: ScanSummary,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub devices: usize,
    pub bbmds: usize,
    pub routers: usize,
    pub subnets: usize,
    pub networks: usize,
}

impl ScanSummary {
    fn from_graph(graph: &TopologyGraph) -> Self {
        Self {
            devices: graph.count_of_kind(NodeKind::Device),
            bbmds: graph.count_of_kind(NodeKind::Bbmd),
            routers: graph.count_of_kind(NodeKind::Router),
            subnets: graph.count_of_kind(NodeKind::Subnet),
            networks: graph.count_of_kind(NodeKind::Network),
        }
    }
}

/// The adaptive topology scanner.
pub struct TopologyScanner<A, T> {
    config: ScannerConfig,
    app: A,
    bvll: BvllService<T>,
    /// Prior scan's graph; read only for window density hints.
    prior: TopologyGraph,
    scanner_key: NodeKey,
}

impl<A: BacnetApplication, T: BvllTransport> TopologyScanner<A, T> {
    /// Validates the configuration before anything touches the network;
    /// a bad configuration is the one fatal error of a scan.
    pub fn new(
        config: ScannerConfig,
        app: A,
        bvll: BvllService<T>,
        prior: TopologyGraph,
    ) -> Result<Self> {
        config.validate()?;
        let scanner_key = NodeKey::scanner(&config.local_name);
        Ok(Self {
            config,
            app,
            bvll,
            prior,
            scanner_key,
        })
    }

    /// Run one full scan into the caller's graph.
    ///
    /// The `&mut` borrow keeps graph mutation exclusive to this scan; if
    /// the future is dropped mid-run the caller keeps whatever was
    /// written so far.
    pub async fn run(&self, graph: &mut TopologyGraph) -> Result<ScanReport> {
        let scan_id = Uuid::new_v4();
        let started = Instant::now();
        tracing::info!(
            scan_id = %scan_id,
            low = self.config.low_limit,
            high = self.config.high_limit,
            "Starting topology scan"
        );

        let mut state = ScanState::new(&self.config);
        self.seed_scanner_node(graph, &mut state)?;

        self.discover_devices(graph, &mut state).await;
        tokio::task::yield_now().await;
        self.discover_routers(graph, &mut state).await;
        tokio::task::yield_now().await;
        self.read_foreign_device_tables(&mut state).await;
        self.finalize_topology(graph, &state);

        let summary = ScanSummary::from_graph(graph);
        let duration = started.elapsed();
        tracing::info!(
            scan_id = %scan_id,
            devices = summary.devices,
            bbmds = summary.bbmds,
            routers = summary.routers,
            subnets = summary.subnets,
            networks = summary.networks,
            duration_ms = duration.as_millis() as u64,
            "Topology scan complete"
        );

        Ok(ScanReport {
            scan_id,
            duration,
            summary,
        })
    }

    /// Record the scanning station itself as the distinguished self-node.
    fn seed_scanner_node(&self, graph: &mut TopologyGraph, state: &mut ScanState) -> Result<()> {
        let address: BacnetAddress = self
            .config
            .local_address
            .parse()
            .map_err(|e: bacmap_core::CoreError| DiscoverError::Config(e.to_string()))?;

        graph.ensure(&self.scanner_key);
        graph.set_property(
            &self.scanner_key,
            Property::Label,
            PropertyValue::Text(self.config.local_name.clone()),
        );
        graph.set_property(
            &self.scanner_key,
            Property::DeviceInstance,
            PropertyValue::Integer(i64::from(self.config.local_instance)),
        );
        graph.set_property(
            &self.scanner_key,
            Property::Address,
            PropertyValue::Text(address.to_string()),
        );
        graph.set_property(
            &self.scanner_key,
            Property::VendorId,
            PropertyValue::Iri(VendorId(self.config.vendor_identifier).iri()),
        );

        if let Some(ip) = address.as_ip() {
            let subnet = state.subnets.resolve(ip);
            graph.add_relation(
                &self.scanner_key,
                RelationKind::DeviceOnSubnet,
                NodeKey::subnet(subnet),
            )?;
        }
        Ok(())
    }

    /// Phase 1: adaptive Who-Is sweep over the configured instance range.
    async fn discover_devices(&self, graph: &mut TopologyGraph, state: &mut ScanState) {
        // Limits were validated in the setup gate.
        let (Ok(low), Ok(high)) = (
            DeviceInstance::new(self.config.low_limit),
            DeviceInstance::new(self.config.high_limit),
        ) else {
            return;
        };
        let planner = WindowPlanner::new(
            &self.prior,
            low,
            high,
            self.config.empty_step_size,
            self.config.full_step_size,
        );

        for window in planner.windows() {
            tracing::debug!(low = %window.low, high = %window.high, "Scanning device window");
            let i_ams = match self.app.who_is(window.low, window.high).await {
                Ok(i_ams) => i_ams,
                Err(e) => {
                    // Zero results for this window; the sweep goes on.
                    tracing::warn!(
                        low = %window.low,
                        high = %window.high,
                        error = %e,
                        "Who-Is window failed, continuing"
                    );
                    continue;
                }
            };

            for i_am in i_ams {
                if let Err(e) = self.record_i_am(graph, state, &i_am).await {
                    tracing::warn!(
                        device = %i_am.device_id,
                        address = %i_am.address,
                        error = %e,
                        "Skipping device"
                    );
                }
            }
            tokio::task::yield_now().await;
        }
    }

    /// Classify one I-Am response and write it into the graph.
    async fn record_i_am(
        &self,
        graph: &mut TopologyGraph,
        state: &mut ScanState,
        i_am: &IAm,
    ) -> Result<()> {
        match &i_am.address {
            BacnetAddress::Ip { addr, .. } => {
                let ip = *addr;

                // Probe first: a positive read also captures the BDT for
                // finalize-time peer resolution.
                let probed = match self.bvll.read_broadcast_distribution_table(ip).await {
                    Some(entries) => {
                        state.bbmd_bdt.insert(ip, entries);
                        true
                    }
                    None => false,
                };
                let is_bbmd = probed || self.config.bbmds.contains(&ip);

                let key = if is_bbmd {
                    NodeKey::bbmd(i_am.device_id)
                } else {
                    NodeKey::device(i_am.device_id)
                };
                self.set_common_properties(graph, &key, i_am);

                let subnet = state.subnets.resolve(ip);
                let relation = if is_bbmd {
                    RelationKind::BbmdBroadcastDomain
                } else {
                    RelationKind::DeviceOnSubnet
                };
                graph.add_relation(&key, relation, NodeKey::subnet(subnet))?;

                if is_bbmd {
                    state.bbmds.insert(ip, key);
                }
            }
            BacnetAddress::Route { network, .. } => {
                // Not IP-mappable: hang the device off its logical
                // network and remember the network for router discovery.
                let key = NodeKey::device(i_am.device_id);
                self.set_common_properties(graph, &key, i_am);
                graph.add_relation(
                    &key,
                    RelationKind::DeviceOnNetwork,
                    NodeKey::network(*network),
                )?;
                state.networks.insert(*network);
            }
        }
        Ok(())
    }

    fn set_common_properties(&self, graph: &mut TopologyGraph, key: &NodeKey, i_am: &IAm) {
        graph.set_property(key, Property::Label, PropertyValue::Text(key.to_string()));
        graph.set_property(
            key,
            Property::DeviceInstance,
            PropertyValue::Integer(i64::from(i_am.device_id.get())),
        );
        graph.set_property(
            key,
            Property::Address,
            PropertyValue::Text(i_am.address.to_string()),
        );
        graph.set_property(
            key,
            Property::VendorId,
            PropertyValue::Iri(i_am.vendor_id.iri()),
        );
    }

    /// Phase 2: one Who-Is-Router-To-Network per discovered network,
    /// scoped per network to bound load on a large internetwork.
    async fn discover_routers(&self, graph: &mut TopologyGraph, state: &mut ScanState) {
        let networks: Vec<NetworkNumber> = state.networks.iter().copied().collect();
        for network in networks {
            tracing::debug!(network = %network, "Probing routers to network");
            let adverts = match self.app.who_is_router_to_network(network).await {
                Ok(adverts) => adverts,
                Err(e) => {
                    tracing::warn!(
                        network = %network,
                        error = %e,
                        "Who-Is-Router-To-Network failed, continuing"
                    );
                    continue;
                }
            };

            for advert in adverts {
                if let Err(e) = self.record_router(graph, state, &advert) {
                    tracing::warn!(
                        router = %advert.address,
                        error = %e,
                        "Skipping router"
                    );
                }
            }
            tokio::task::yield_now().await;
        }
    }

    fn record_router(
        &self,
        graph: &mut TopologyGraph,
        state: &mut ScanState,
        advert: &RouterAdvert,
    ) -> Result<()> {
        let key = NodeKey::router(&advert.address);
        graph.set_property(&key, Property::Label, PropertyValue::Text(key.to_string()));
        graph.set_property(
            &key,
            Property::Address,
            PropertyValue::Text(advert.address.to_string()),
        );

        // Every announcement is retained; repeated probes only add.
        for network in &advert.networks {
            graph.add_relation(&key, RelationKind::RouterToNetwork, NodeKey::network(*network))?;
            state.announced_networks.insert(*network);
        }

        match advert.address.as_ip().and_then(|ip| state.subnets.find(ip)) {
            Some(subnet) => {
                graph.add_relation(&key, RelationKind::DeviceOnSubnet, NodeKey::subnet(subnet))?;
            }
            None => {
                tracing::debug!(
                    router = %key,
                    adapter = %advert.adapter,
                    "Router outside known subnets, attaching to scanner node"
                );
                graph.add_relation(&self.scanner_key, RelationKind::UnassociatedRouter, key)?;
            }
        }
        Ok(())
    }

    /// Phase 3: best-effort FDT reads from the configured BBMD list.
    async fn read_foreign_device_tables(&self, state: &mut ScanState) {
        for &ip in &self.config.bbmds {
            if let Some(entries) = self.bvll.read_foreign_device_table(ip).await {
                tracing::debug!(bbmd = %ip, entries = entries.len(), "Foreign device table read");
                state.bbmd_fdt.insert(ip, entries);
            }
        }
    }

    /// Materialize subnet and network nodes, then resolve BDT entries to
    /// peer relations. Peer resolution waits until here because a BDT may
    /// name a BBMD discovered later in the same scan.
    fn finalize_topology(&self, graph: &mut TopologyGraph, state: &ScanState) {
        for &subnet in state.subnets.all() {
            graph.ensure(&NodeKey::subnet(subnet));
        }
        for &network in state.networks.iter().chain(state.announced_networks.iter()) {
            graph.ensure(&NodeKey::network(network));
        }

        for (ip, entries) in &state.bbmd_bdt {
            let Some(bbmd_key) = state.bbmds.get(ip) else {
                continue;
            };
            for entry in entries {
                if let Some(peer_key) = state.bbmds.get(entry) {
                    if let Err(e) =
                        graph.add_relation(bbmd_key, RelationKind::BdtEntry, peer_key.clone())
                    {
                        tracing::warn!(bbmd = %bbmd_key, error = %e, "Skipping BDT entry");
                    }
                }
            }
        }

        if !state.bbmd_fdt.is_empty() {
            let registrations: usize = state.bbmd_fdt.values().map(Vec::len).sum();
            tracing::debug!(
                tables = state.bbmd_fdt.len(),
                registrations,
                "Foreign device tables collected"
            );
        }
    }
}
