use super::{DiskType, ReservationInfo, WorkloadDescriptor};
use crate::capacity::{round_units, Rsu, UnsupportedSizeError};
use crate::signing::Challenge;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// A container running an flist.
///
/// `environment` holds plaintext variables and only exists before the container is built.
/// Building encrypts every variable for the node into `secret_environment`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// Url of the flist to run.
    pub flist: String,
    /// Hub the flist is hosted on.
    pub hub_url: String,
    /// Plaintext environment variables.
    pub environment: BTreeMap<String, String>,
    /// Environment variables encrypted for the node.
    pub secret_environment: BTreeMap<String, String>,
    /// Command to run in the container.
    pub entrypoint: String,
    /// Start the container in interactive mode.
    pub interactive: bool,
    /// Volumes mounted in the container.
    pub volumes: Vec<ContainerMount>,
    /// Networks the container joins.
    pub network_connection: Vec<NetworkConnection>,
    /// Resources reserved for the container.
    pub capacity: ContainerCapacity,
}

/// A volume mounted in a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerMount {
    /// Global id of the volume workload.
    pub volume_id: String,
    /// Path the volume is mounted on.
    pub mountpoint: String,
}

/// Membership of a container in a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConnection {
    /// Name of the network.
    pub network_id: String,
    /// Address of the container in the network.
    pub ipaddress: IpAddr,
    /// Also give the container a public IPv6 address.
    #[serde(default)]
    pub public_ip6: bool,
    /// Also give the container a yggdrasil address.
    #[serde(default)]
    pub yggdrasil_ip: bool,
}

/// Resources reserved for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerCapacity {
    /// Amount of virtual cpus.
    pub cpu: u64,
    /// Memory in MiB.
    pub memory: u64,
    /// Medium backing the root filesystem.
    pub disk_type: DiskType,
    /// Size of the root filesystem in MiB.
    pub disk_size: u64,
}

impl Default for ContainerCapacity {
    fn default() -> Self {
        ContainerCapacity {
            cpu: 1,
            memory: 1024,
            disk_type: DiskType::Ssd,
            disk_size: 256,
        }
    }
}

impl ContainerCapacity {
    /// Resources consumed by a container with this capacity.
    pub fn rsu(&self) -> Rsu {
        let (sru, hru) = self
            .disk_type
            .split(round_units(self.disk_size as f64 / 1024.));
        Rsu {
            cru: self.cpu,
            mru: round_units(self.memory as f64 / 1024.),
            sru,
            hru,
            ipv4u: 0,
        }
    }
}

impl WorkloadDescriptor for Container {
    fn info(&self) -> &ReservationInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ReservationInfo {
        &mut self.info
    }

    fn rsu(&self) -> Result<Rsu, UnsupportedSizeError> {
        Ok(self.capacity.rsu())
    }

    fn encode_challenge(&self, challenge: &mut Challenge) {
        challenge
            .push(&self.flist)
            .push(&self.hub_url)
            .push(&self.entrypoint)
            .push(self.interactive);
        for (k, v) in &self.environment {
            challenge.push(format!("{}={}", k, v));
        }
        for (k, v) in &self.secret_environment {
            challenge.push(format!("{}={}", k, v));
        }
        for mount in &self.volumes {
            challenge.push(&mount.volume_id).push(&mount.mountpoint);
        }
        for conn in &self.network_connection {
            challenge
                .push(&conn.network_id)
                .push(conn.ipaddress)
                .push(conn.public_ip6)
                .push(conn.yggdrasil_ip);
        }
        challenge
            .push(self.capacity.cpu)
            .push(self.capacity.memory)
            .push(self.capacity.disk_size)
            .push(self.capacity.disk_type);
    }
}
