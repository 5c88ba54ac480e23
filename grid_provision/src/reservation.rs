use crate::capacity::{CloudUnits, Rsu, UnsupportedSizeError};
use crate::lifecycle::NextAction;
use crate::schema::Date;
use crate::signing::{SigningRequest, SigningSignature};
use crate::workloads::{
    Container, DebugWorkload, Gateway4To6, GatewayDelegate, GatewayProxy, GatewayReverseProxy,
    GatewaySubdomain, K8s, NetworkResource, PublicIp, Qemu, VirtualMachine, Volume, Workload,
    WorkloadDescriptor, WorkloadResult, Zdb,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A reservation as stored by the explorer.
///
/// `json` is the exact string the customer signed. It is kept next to the decoded data, so the
/// signature can be verified regardless of how the data is encoded later on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reservation {
    /// Id assigned by the explorer.
    pub id: i64,
    /// Frozen encoding of `data_reservation`.
    pub json: String,
    /// The workloads and terms of the reservation.
    pub data_reservation: ReservationData,
    /// Id of the customer.
    pub customer_tid: i64,
    /// Hex encoded signature of the customer over `json`.
    pub customer_signature: String,
    /// Lifecycle state, owned by the explorer.
    pub next_action: NextAction,
    /// Provisioning signatures.
    pub signatures_provision: Vec<SigningSignature>,
    /// Farmer signatures.
    pub signatures_farmer: Vec<SigningSignature>,
    /// Deletion signatures.
    pub signatures_delete: Vec<SigningSignature>,
    /// Moment the reservation was signed.
    pub epoch: Date,
    /// Free form metadata.
    pub metadata: String,
    /// Results reported by the nodes.
    pub results: Vec<WorkloadResult>,
}

impl Reservation {
    /// Check the frozen encoding still decodes to the data of the reservation.
    pub fn json_matches_data(&self) -> bool {
        match serde_json::from_str::<ReservationData>(&self.json) {
            Ok(frozen) => frozen == self.data_reservation,
            Err(_) => false,
        }
    }

    /// Check if the reservation is past its expiration.
    pub fn is_expired(&self, now: Date) -> bool {
        self.data_reservation.expiration_reservation < now
    }

    /// Check if the deletion quorum is reached with the collected signatures.
    pub fn delete_quorum_reached(&self) -> bool {
        crate::signing::quorum_reached(
            &self.signatures_delete,
            &self.data_reservation.signing_request_delete,
        )
    }
}

/// The payload of a reservation: its workloads grouped by type, and the terms under which they
/// are deployed.
///
/// The declaration order of the fields is the order of the canonical encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationData {
    /// Human readable description.
    pub description: String,
    /// Currencies the customer can pay with.
    pub currencies: Vec<String>,
    /// Who needs to sign before the reservation is provisioned.
    pub signing_request_provision: SigningRequest,
    /// Who needs to sign before the reservation is deleted.
    pub signing_request_delete: SigningRequest,
    /// Containers.
    pub containers: Vec<Container>,
    /// Volumes.
    pub volumes: Vec<Volume>,
    /// 0-db namespaces.
    pub zdbs: Vec<Zdb>,
    /// Network resources.
    #[serde(rename = "network_resource")]
    pub network_resources: Vec<NetworkResource>,
    /// Kubernetes nodes.
    pub kubernetes: Vec<K8s>,
    /// Virtual machines.
    pub virtual_machines: Vec<VirtualMachine>,
    /// Qemu virtual machines.
    pub qemus: Vec<Qemu>,
    /// Gateway proxies.
    pub proxies: Vec<GatewayProxy>,
    /// Gateway reverse proxies.
    pub reverse_proxies: Vec<GatewayReverseProxy>,
    /// Gateway subdomains.
    pub subdomains: Vec<GatewaySubdomain>,
    /// Domains delegated to gateways.
    pub domain_delegates: Vec<GatewayDelegate>,
    /// Gateway IPv4 to IPv6 tunnels.
    pub gateway4to6: Vec<Gateway4To6>,
    /// Public IPv4 addresses.
    pub public_ips: Vec<PublicIp>,
    /// Diagnostics requests.
    pub debug: Vec<DebugWorkload>,
    /// Deadline for the reservation to be provisioned.
    pub expiration_provisioning: Date,
    /// Moment the reservation expires.
    pub expiration_reservation: Date,
}

impl ReservationData {
    /// Append a workload to the sequence of its type. No deduplication is done.
    pub fn push(&mut self, workload: Workload) {
        match workload {
            Workload::Container(w) => self.containers.push(w),
            Workload::Volume(w) => self.volumes.push(w),
            Workload::Zdb(w) => self.zdbs.push(w),
            Workload::Kubernetes(w) => self.kubernetes.push(w),
            Workload::VirtualMachine(w) => self.virtual_machines.push(w),
            Workload::Qemu(w) => self.qemus.push(w),
            Workload::Proxy(w) => self.proxies.push(w),
            Workload::ReverseProxy(w) => self.reverse_proxies.push(w),
            Workload::Subdomain(w) => self.subdomains.push(w),
            Workload::DomainDelegate(w) => self.domain_delegates.push(w),
            Workload::Gateway4To6(w) => self.gateway4to6.push(w),
            Workload::NetworkResource(w) => self.network_resources.push(w),
            Workload::PublicIp(w) => self.public_ips.push(w),
            Workload::Debug(w) => self.debug.push(w),
        }
    }

    /// All workloads of the reservation, in encoding order.
    pub fn workloads(&self) -> Vec<&dyn WorkloadDescriptor> {
        fn all<T: WorkloadDescriptor>(ws: &[T]) -> impl Iterator<Item = &dyn WorkloadDescriptor> {
            ws.iter().map(|w| w as &dyn WorkloadDescriptor)
        }

        all(&self.containers)
            .chain(all(&self.volumes))
            .chain(all(&self.zdbs))
            .chain(all(&self.network_resources))
            .chain(all(&self.kubernetes))
            .chain(all(&self.virtual_machines))
            .chain(all(&self.qemus))
            .chain(all(&self.proxies))
            .chain(all(&self.reverse_proxies))
            .chain(all(&self.subdomains))
            .chain(all(&self.domain_delegates))
            .chain(all(&self.gateway4to6))
            .chain(all(&self.public_ips))
            .chain(all(&self.debug))
            .collect()
    }

    /// The canonical encoding of the payload, which is what gets signed.
    pub fn canonical_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Resources consumed per node by the workloads of the reservation.
    pub fn rsu_per_node(&self) -> Result<BTreeMap<String, Rsu>, UnsupportedSizeError> {
        let mut nodes: BTreeMap<String, Rsu> = BTreeMap::new();
        for workload in self.workloads() {
            let rsu = workload.rsu()?;
            *nodes.entry(workload.info().node_id.clone()).or_default() += rsu;
        }
        Ok(nodes)
    }

    /// Cloud units consumed per second by all workloads of the reservation.
    ///
    /// Units are computed per node and then summed, as this is how nodes bill their capacity.
    pub fn cloud_units(&self) -> Result<CloudUnits, UnsupportedSizeError> {
        Ok(self
            .rsu_per_node()?
            .values()
            .fold(CloudUnits::default(), |acc, rsu| acc + rsu.cloud_units()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Reservation, ReservationData};
    use crate::lifecycle::NextAction;
    use crate::schema::Date;
    use crate::signing::{SigningRequest, SigningSignature};
    use crate::workloads::{
        ContainerCapacity, Container, DiskType, K8s, Volume, Workload, WorkloadType,
    };

    fn volume(node: &str, size: u64) -> Volume {
        let mut v = Volume::default();
        v.info.workload_type = WorkloadType::Volume;
        v.info.node_id = node.to_string();
        v.size = size;
        v.volume_type = DiskType::Ssd;
        v
    }

    #[test]
    fn push_appends_without_dedup() {
        let mut data = ReservationData::default();
        data.push(Workload::Volume(volume("node1", 10)));
        data.push(Workload::Volume(volume("node1", 10)));
        assert_eq!(data.volumes.len(), 2);
        assert_eq!(data.workloads().len(), 2);
    }

    #[test]
    fn canonical_json_is_stable() {
        let mut data = ReservationData::default();
        let mut c = Container::default();
        c.info.node_id = "node1".to_string();
        c.environment.insert("b".to_string(), "2".to_string());
        c.environment.insert("a".to_string(), "1".to_string());
        data.push(Workload::Container(c));

        let first = data.canonical_json().unwrap();
        let decoded: ReservationData = serde_json::from_str(&first).unwrap();
        assert_eq!(decoded.canonical_json().unwrap(), first);
        assert!(first.starts_with(r#"{"description":"","currencies":[]"#));
        assert!(first.find(r#""a":"1""#) < first.find(r#""b":"2""#));
        assert!(first.contains(r#""network_resource":[]"#));
    }

    #[test]
    fn resources_per_node() {
        let mut data = ReservationData::default();
        data.push(Workload::Volume(volume("node1", 10)));
        data.push(Workload::Volume(volume("node2", 5)));
        let mut c = Container::default();
        c.info.node_id = "node1".to_string();
        c.capacity = ContainerCapacity {
            cpu: 2,
            memory: 4096,
            disk_type: DiskType::Ssd,
            disk_size: 1024,
        };
        data.push(Workload::Container(c));

        let nodes = data.rsu_per_node().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes["node1"].sru, 11.);
        assert_eq!(nodes["node1"].cru, 2);
        assert_eq!(nodes["node1"].mru, 4.);
        assert_eq!(nodes["node2"].sru, 5.);

        let cu = data.cloud_units().unwrap();
        assert_eq!(cu.cu, 0.95);
    }

    #[test]
    fn unknown_tier_fails_aggregation() {
        let mut data = ReservationData::default();
        let mut k = K8s::default();
        k.info.node_id = "node1".to_string();
        k.size = 100;
        data.push(Workload::Kubernetes(k));
        assert!(data.rsu_per_node().is_err());
    }

    #[test]
    fn expiration_and_quorum() {
        let mut r = Reservation::default();
        r.data_reservation.expiration_reservation = Date::from_unix(100);
        assert!(r.is_expired(Date::from_unix(101)));
        assert!(!r.is_expired(Date::from_unix(99)));

        r.data_reservation.signing_request_delete = SigningRequest::single(4);
        assert!(!r.delete_quorum_reached());
        r.signatures_delete.push(SigningSignature {
            tid: 4,
            ..Default::default()
        });
        assert!(r.delete_quorum_reached());
        assert_eq!(r.next_action, NextAction::Create);
    }

    #[test]
    fn json_mismatch_is_detected() {
        let mut r = Reservation::default();
        assert!(!r.json_matches_data());
        r.json = r.data_reservation.canonical_json().unwrap();
        assert!(r.json_matches_data());
        r.data_reservation.description = "changed".to_string();
        assert!(!r.json_matches_data());
    }
}
