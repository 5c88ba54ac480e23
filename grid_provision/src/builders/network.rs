use super::{Buildable, ValidationError, WorkloadBuilder};
use crate::encryption::{SecretEncryptor, SecretResult};
use crate::schema::IpRange;
use crate::workloads::{NetworkResource, ReservationInfo, WireguardPeer, WorkloadType};
use crate::ProvisionResult;
use std::io::Write;

/// Builds a single [`NetworkResource`].
pub type NetworkResourceBuilder = WorkloadBuilder<NetworkResource>;

/// A network spanning multiple nodes. Implementations allocate subnets and wireguard peers, and
/// produce the network resource of every node in the network.
pub trait NetworkTopology {
    /// Add a node to the network. The node gets `subnet`, and listens for wireguard on `port`.
    /// A hidden node only connects out to the other nodes.
    fn add_node(
        &mut self,
        node_id: &str,
        subnet: IpRange,
        port: u16,
        force_hidden: bool,
    ) -> ProvisionResult<()>;

    /// Give an external machine access to the network. Returns the wireguard configuration for
    /// the machine.
    fn add_access(
        &mut self,
        node_id: &str,
        subnet: IpRange,
        wg_public_key: &str,
        ipv4: bool,
    ) -> ProvisionResult<String>;

    /// Remove a node from the network.
    fn remove_node(&mut self, node_id: &str) -> ProvisionResult<()>;

    /// Save the state of the network, so it can be extended later on.
    fn save(&self, writer: &mut dyn Write) -> ProvisionResult<()>;

    /// The network resources of all nodes in the network.
    fn resources(&self) -> Vec<NetworkResource>;
}

impl Buildable for NetworkResource {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err("network name cannot be empty".into());
        }
        if self.wireguard_public_key.is_empty() {
            return Err("network resource needs a wireguard public key".into());
        }
        Ok(())
    }

    fn encrypt_secrets(&mut self, encryptor: &dyn SecretEncryptor) -> SecretResult<()> {
        if self.wireguard_private_key.is_empty() {
            return Ok(());
        }
        self.wireguard_private_key_encrypted = encryptor
            .encrypt_secret(&self.wireguard_private_key, &self.info.node_id)
            .map_err(|e| e.with_subject("wireguard private key".to_string()))?;
        self.wireguard_private_key.clear();
        Ok(())
    }
}

impl NetworkResourceBuilder {
    /// Start building the resource of network `name` on a node.
    pub fn new(node_id: String, name: String, network_iprange: IpRange, iprange: IpRange) -> Self {
        WorkloadBuilder::from_workload(NetworkResource {
            info: ReservationInfo::new(WorkloadType::NetworkResource, node_id),
            name,
            network_iprange,
            iprange,
            ..Default::default()
        })
    }

    /// Set the wireguard interface of the node. The private key is encrypted for the node on
    /// build.
    pub fn with_wireguard(mut self, private_key: String, public_key: String, port: u16) -> Self {
        self.workload.wireguard_private_key = private_key;
        self.workload.wireguard_public_key = public_key;
        self.workload.wireguard_listen_port = port;
        self
    }

    /// Add a wireguard peer.
    pub fn with_peer(mut self, peer: WireguardPeer) -> Self {
        self.workload.peers.push(peer);
        self
    }
}
