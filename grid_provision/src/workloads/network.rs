use super::{ReservationInfo, WorkloadDescriptor};
use crate::capacity::{Rsu, UnsupportedSizeError};
use crate::schema::IpRange;
use crate::signing::Challenge;
use serde::{Deserialize, Serialize};

/// The part of a network living on a single node: the node's subnet, its wireguard interface and
/// the peers it connects to.
///
/// `wireguard_private_key` is only present before the resource is built. Building encrypts it for
/// the node into `wireguard_private_key_encrypted`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkResource {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// Name of the network.
    pub name: String,
    /// Range of the whole network.
    pub network_iprange: IpRange,
    /// Plaintext wireguard private key of the node.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub wireguard_private_key: String,
    /// Wireguard private key of the node, encrypted for the node.
    pub wireguard_private_key_encrypted: String,
    /// Wireguard public key of the node.
    pub wireguard_public_key: String,
    /// Port the node listens on for wireguard.
    pub wireguard_listen_port: u16,
    /// Subnet of the node.
    pub iprange: IpRange,
    /// Peers of the node.
    pub peers: Vec<WireguardPeer>,
}

/// A wireguard peer of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireguardPeer {
    /// Wireguard public key of the peer.
    pub public_key: String,
    /// Endpoint of the peer, empty if the peer is not publicly reachable.
    pub endpoint: String,
    /// Subnet of the peer.
    pub iprange: IpRange,
    /// Ranges routed through the peer.
    pub allowed_iprange: Vec<IpRange>,
}

impl WorkloadDescriptor for NetworkResource {
    fn info(&self) -> &ReservationInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ReservationInfo {
        &mut self.info
    }

    fn rsu(&self) -> Result<Rsu, UnsupportedSizeError> {
        Ok(Rsu::default())
    }

    fn encode_challenge(&self, challenge: &mut Challenge) {
        challenge
            .push(&self.name)
            .push(self.network_iprange)
            .push(&self.wireguard_private_key_encrypted)
            .push(&self.wireguard_public_key)
            .push(self.wireguard_listen_port)
            .push(self.iprange);
        for peer in &self.peers {
            challenge
                .push(&peer.public_key)
                .push(&peer.endpoint)
                .push(peer.iprange)
                .push_all(&peer.allowed_iprange);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NetworkResource, WireguardPeer};
    use crate::workloads::WorkloadDescriptor;

    #[test]
    fn peers_are_signed() {
        let nr = NetworkResource {
            name: "net".to_string(),
            iprange: "10.1.1.0/24".parse().unwrap(),
            ..Default::default()
        };
        let mut peered = nr.clone();
        peered.peers.push(WireguardPeer {
            public_key: "key".to_string(),
            iprange: "10.1.2.0/24".parse().unwrap(),
            allowed_iprange: vec!["10.1.2.0/24".parse().unwrap()],
            ..Default::default()
        });
        assert_ne!(nr.signature_challenge(), peered.signature_challenge());
    }

    #[test]
    fn plaintext_key_is_not_encoded_when_empty() {
        let nr = NetworkResource::default();
        let encoded = serde_json::to_string(&nr).unwrap();
        assert!(!encoded.contains("\"wireguard_private_key\""));
    }
}
