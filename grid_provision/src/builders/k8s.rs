use super::{Buildable, ValidationError, WorkloadBuilder};
use crate::encryption::{SecretEncryptor, SecretResult};
use crate::workloads::{K8s, ReservationInfo, WorkloadType};
use std::net::IpAddr;

/// Builds a [`K8s`] node.
pub type K8sBuilder = WorkloadBuilder<K8s>;

impl Buildable for K8s {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.network_id.is_empty() {
            return Err("kubernetes node needs a network".into());
        }
        if self.ipaddress.is_none() {
            return Err("kubernetes node needs an address in its network".into());
        }
        Ok(())
    }

    fn encrypt_secrets(&mut self, encryptor: &dyn SecretEncryptor) -> SecretResult<()> {
        if self.plain_cluster_secret.is_empty() {
            return Ok(());
        }
        self.cluster_secret = encryptor
            .encrypt_secret(&self.plain_cluster_secret, &self.info.node_id)
            .map_err(|e| e.with_subject("cluster secret".to_string()))?;
        self.plain_cluster_secret.clear();
        Ok(())
    }
}

impl K8sBuilder {
    /// Start building a kubernetes node of the given size tier.
    pub fn new(node_id: String, size: u16, network_id: String, ipaddress: IpAddr) -> Self {
        WorkloadBuilder::from_workload(K8s {
            info: ReservationInfo::new(WorkloadType::Kubernetes, node_id),
            size,
            network_id,
            ipaddress: Some(ipaddress),
            ..Default::default()
        })
    }

    /// Set the size tier.
    pub fn with_size(mut self, size: u16) -> Self {
        self.workload.size = size;
        self
    }

    /// Set the secret shared by the nodes of the cluster. It is encrypted for the node on build.
    pub fn with_cluster_secret(mut self, secret: String) -> Self {
        self.workload.plain_cluster_secret = secret;
        self
    }

    /// Join the cluster of the given masters as a worker.
    pub fn with_master_ips(mut self, master_ips: Vec<IpAddr>) -> Self {
        self.workload.master_ips = master_ips;
        self
    }

    /// Set the ssh keys allowed on the node.
    pub fn with_ssh_keys(mut self, ssh_keys: Vec<String>) -> Self {
        self.workload.ssh_keys = ssh_keys;
        self
    }

    /// Attach a reserved public ip.
    pub fn with_public_ip(mut self, public_ip_workload: i64) -> Self {
        self.workload.public_ip = public_ip_workload;
        self
    }
}
