use super::k8s::ip_text;
use super::{ReservationInfo, WorkloadDescriptor, WorkloadType};
use crate::capacity::{size_tier, Rsu, UnsupportedSizeError};
use crate::signing::Challenge;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A virtual machine running a grid image, sized by tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMachine {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// Name of the image to boot.
    pub name: String,
    /// Name of the network the vm joins.
    pub network_id: String,
    /// Address of the vm in the network.
    pub ipaddress: Option<IpAddr>,
    /// Ssh keys allowed on the vm.
    pub ssh_keys: Vec<String>,
    /// Workload id of a public ip reserved for the vm, 0 if there is none.
    pub public_ip: i64,
    /// Size tier of the vm.
    pub size: u16,
}

impl WorkloadDescriptor for VirtualMachine {
    fn info(&self) -> &ReservationInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ReservationInfo {
        &mut self.info
    }

    fn rsu(&self) -> Result<Rsu, UnsupportedSizeError> {
        size_tier(WorkloadType::VirtualMachine, self.size)
    }

    fn encode_challenge(&self, challenge: &mut Challenge) {
        challenge
            .push(&self.name)
            .push(&self.network_id)
            .push(self.public_ip)
            .push(ip_text(&self.ipaddress))
            .push_all(&self.ssh_keys)
            .push(self.size);
    }
}
