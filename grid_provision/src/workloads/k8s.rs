use super::{ReservationInfo, WorkloadDescriptor, WorkloadType};
use crate::capacity::{size_tier, Rsu, UnsupportedSizeError};
use crate::signing::Challenge;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A kubernetes node. The first node of a cluster is the master, workers list the address of the
/// master in `master_ips`.
///
/// `plain_cluster_secret` only lives in memory until the node is built. Building encrypts it for
/// the node into `cluster_secret`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct K8s {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// Size tier of the node.
    pub size: u16,
    /// Name of the network the node joins.
    pub network_id: String,
    /// Address of the node in the network.
    pub ipaddress: Option<IpAddr>,
    /// Secret shared by all nodes of the cluster, encrypted for the node.
    pub cluster_secret: String,
    /// Plaintext cluster secret.
    #[serde(skip)]
    pub plain_cluster_secret: String,
    /// Addresses of the masters, empty for a master.
    pub master_ips: Vec<IpAddr>,
    /// Ssh keys allowed on the node.
    pub ssh_keys: Vec<String>,
    /// Workload id of a public ip reserved for the node, 0 if there is none.
    pub public_ip: i64,
}

pub(super) fn ip_text(ip: &Option<IpAddr>) -> String {
    ip.map(|ip| ip.to_string()).unwrap_or_default()
}

impl WorkloadDescriptor for K8s {
    fn info(&self) -> &ReservationInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ReservationInfo {
        &mut self.info
    }

    fn rsu(&self) -> Result<Rsu, UnsupportedSizeError> {
        size_tier(WorkloadType::Kubernetes, self.size)
    }

    fn encode_challenge(&self, challenge: &mut Challenge) {
        challenge
            .push(self.size)
            .push(&self.network_id)
            .push(ip_text(&self.ipaddress))
            .push(&self.cluster_secret)
            .push_all(&self.master_ips)
            .push_all(&self.ssh_keys)
            .push(self.public_ip);
    }
}

#[cfg(test)]
mod tests {
    use super::K8s;
    use crate::capacity::Rsu;
    use crate::workloads::WorkloadDescriptor;

    #[test]
    fn size_tiers() {
        let mut k = K8s {
            size: 1,
            ..Default::default()
        };
        assert_eq!(
            k.rsu().unwrap(),
            Rsu {
                cru: 1,
                mru: 2.,
                sru: 50.,
                ..Default::default()
            }
        );

        k.size = 2;
        assert_eq!(
            k.rsu().unwrap(),
            Rsu {
                cru: 2,
                mru: 4.,
                sru: 100.,
                ..Default::default()
            }
        );

        k.size = 0;
        assert!(k.rsu().is_err());
        k.size = 99;
        let err = k.rsu().unwrap_err();
        assert_eq!(err.size(), 99);
    }

    #[test]
    fn challenge_covers_masters() {
        let k = K8s {
            size: 1,
            network_id: "net".to_string(),
            ipaddress: Some("10.1.1.2".parse().unwrap()),
            ..Default::default()
        };
        let mut worker = k.clone();
        worker.master_ips.push("10.1.1.1".parse().unwrap());
        assert_ne!(k.signature_challenge(), worker.signature_challenge());
    }
}
