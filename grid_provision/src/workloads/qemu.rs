use super::k8s::ip_text;
use super::{ReservationInfo, WorkloadDescriptor};
use crate::capacity::{round_units, Rsu, UnsupportedSizeError};
use crate::signing::Challenge;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A virtual machine booting an arbitrary image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Qemu {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// Address of the vm.
    pub ipaddress: Option<IpAddr>,
    /// Url of the image to boot.
    pub image: String,
    /// Resources reserved for the vm.
    pub capacity: QemuCapacity,
}

/// Resources reserved for a qemu vm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QemuCapacity {
    /// Amount of virtual cpus.
    pub cpu: u64,
    /// Memory in MiB.
    pub memory: u64,
    /// Disk size in GiB.
    pub hdd: u64,
}

impl WorkloadDescriptor for Qemu {
    fn info(&self) -> &ReservationInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ReservationInfo {
        &mut self.info
    }

    fn rsu(&self) -> Result<Rsu, UnsupportedSizeError> {
        Ok(Rsu {
            cru: self.capacity.cpu,
            mru: round_units(self.capacity.memory as f64 / 1024.),
            hru: self.capacity.hdd as f64,
            ..Default::default()
        })
    }

    fn encode_challenge(&self, challenge: &mut Challenge) {
        challenge
            .push(ip_text(&self.ipaddress))
            .push(&self.image)
            .push(self.capacity.cpu)
            .push(self.capacity.memory)
            .push(self.capacity.hdd);
    }
}

#[cfg(test)]
mod tests {
    use super::{Qemu, QemuCapacity};
    use crate::workloads::test_util::{assert_signed_fields, assert_unsigned_envelope_fields};
    use crate::workloads::{ReservationInfo, WorkloadDescriptor, WorkloadType};

    fn qemu() -> Qemu {
        Qemu {
            info: ReservationInfo::new(WorkloadType::Qemu, "node1".to_string()),
            ipaddress: Some("10.1.4.2".parse().unwrap()),
            image: "https://images.grid.tf/ubuntu.qcow2".to_string(),
            capacity: QemuCapacity {
                cpu: 2,
                memory: 2048,
                hdd: 20,
            },
        }
    }

    #[test]
    fn challenge_fields() {
        let q = qemu();
        assert!(String::from_utf8(q.signature_challenge())
            .unwrap()
            .ends_with("10.1.4.2https://images.grid.tf/ubuntu.qcow22204820"));
        assert_signed_fields(
            &q,
            &[
                ("ipaddress", |w: &mut Qemu| {
                    w.ipaddress = Some("10.1.4.3".parse().unwrap())
                }),
                ("image", |w: &mut Qemu| w.image.push_str(".old")),
                ("cpu", |w: &mut Qemu| w.capacity.cpu = 4),
                ("memory", |w: &mut Qemu| w.capacity.memory = 4096),
                ("hdd", |w: &mut Qemu| w.capacity.hdd = 40),
            ],
        );
        assert_unsigned_envelope_fields(&q);
    }

    #[test]
    fn rsu() {
        let q = Qemu {
            capacity: QemuCapacity {
                cpu: 2,
                memory: 512,
                hdd: 20,
            },
            ..Default::default()
        };
        let rsu = q.rsu().unwrap();
        assert_eq!(rsu.cru, 2);
        assert_eq!(rsu.mru, 0.5);
        assert_eq!(rsu.hru, 20.);
    }
}
