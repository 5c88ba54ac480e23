use super::{Buildable, ValidationError, WorkloadBuilder};
use crate::workloads::{ReservationInfo, VirtualMachine, WorkloadType};
use std::net::IpAddr;

/// Builds a [`VirtualMachine`].
pub type VirtualMachineBuilder = WorkloadBuilder<VirtualMachine>;

impl Buildable for VirtualMachine {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err("virtual machine image cannot be empty".into());
        }
        if self.network_id.is_empty() {
            return Err("virtual machine needs a network".into());
        }
        Ok(())
    }
}

impl VirtualMachineBuilder {
    /// Start building a virtual machine running the image `name`.
    pub fn new(
        node_id: String,
        name: String,
        size: u16,
        network_id: String,
        ipaddress: IpAddr,
    ) -> Self {
        WorkloadBuilder::from_workload(VirtualMachine {
            info: ReservationInfo::new(WorkloadType::VirtualMachine, node_id),
            name,
            network_id,
            ipaddress: Some(ipaddress),
            size,
            ..Default::default()
        })
    }

    /// Set the ssh keys allowed on the machine.
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

#[cfg(test)]
mod tests {
    use super::VirtualMachineBuilder;
    use crate::builders::test_util::FakeEncryptor;
    use crate::workloads::WorkloadType;

    #[test]
    fn build() {
        let vm = VirtualMachineBuilder::new(
            "node1".to_string(),
            "ubuntu-20.04".to_string(),
            2,
            "net".to_string(),
            "10.1.3.2".parse().unwrap(),
        )
        .with_public_ip(12)
        .build(&FakeEncryptor::default())
        .unwrap();
        assert_eq!(vm.info.workload_type, WorkloadType::VirtualMachine);
        assert_eq!(vm.public_ip, 12);
    }

    #[test]
    fn image_is_required() {
        let res = VirtualMachineBuilder::new(
            "node1".to_string(),
            String::new(),
            2,
            "net".to_string(),
            "10.1.3.2".parse().unwrap(),
        )
        .build(&FakeEncryptor::default());
        assert!(res.is_err());
    }
}
