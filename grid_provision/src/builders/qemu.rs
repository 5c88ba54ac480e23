use super::{Buildable, ValidationError, WorkloadBuilder};
use crate::workloads::{Qemu, QemuCapacity, ReservationInfo, WorkloadType};
use std::net::IpAddr;

/// Builds a [`Qemu`] virtual machine.
pub type QemuBuilder = WorkloadBuilder<Qemu>;

impl Buildable for Qemu {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.image.is_empty() {
            return Err("qemu image cannot be empty".into());
        }
        if self.capacity.cpu == 0 || self.capacity.memory == 0 {
            return Err("qemu machine needs cpu and memory".into());
        }
        Ok(())
    }
}

impl QemuBuilder {
    /// Start building a machine booting `image`.
    pub fn new(node_id: String, image: String, capacity: QemuCapacity) -> Self {
        WorkloadBuilder::from_workload(Qemu {
            info: ReservationInfo::new(WorkloadType::Qemu, node_id),
            image,
            capacity,
            ..Default::default()
        })
    }

    /// Set the address of the machine.
    pub fn with_ipaddress(mut self, ipaddress: IpAddr) -> Self {
        self.workload.ipaddress = Some(ipaddress);
        self
    }
}
