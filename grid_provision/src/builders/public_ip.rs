use super::{Buildable, ValidationError, WorkloadBuilder};
use crate::schema::IpRange;
use crate::workloads::{PublicIp, ReservationInfo, WorkloadType};

/// Builds a [`PublicIp`] reservation.
pub type PublicIpBuilder = WorkloadBuilder<PublicIp>;

impl Buildable for PublicIp {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.ipaddress.ip().is_ipv4() {
            return Err(format!("public ip {} is not an IPv4 address", self.ipaddress).into());
        }
        if self.ipaddress.ip().is_unspecified() {
            return Err("public ip cannot be unspecified".into());
        }
        Ok(())
    }
}

impl PublicIpBuilder {
    /// Reserve the public address `ipaddress` of the farm of the node.
    pub fn new(node_id: String, ipaddress: IpRange) -> Self {
        WorkloadBuilder::from_workload(PublicIp {
            info: ReservationInfo::new(WorkloadType::PublicIp, node_id),
            ipaddress,
        })
    }
}
