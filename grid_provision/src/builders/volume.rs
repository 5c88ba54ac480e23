use super::{Buildable, ValidationError, WorkloadBuilder};
use crate::workloads::{DiskType, ReservationInfo, Volume, WorkloadType};

/// Builds a [`Volume`].
pub type VolumeBuilder = WorkloadBuilder<Volume>;

impl Buildable for Volume {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.size == 0 {
            return Err("volume size cannot be 0".into());
        }
        Ok(())
    }
}

impl VolumeBuilder {
    /// Start building a volume of `size` GiB.
    pub fn new(node_id: String, size: u64, volume_type: DiskType) -> Self {
        WorkloadBuilder::from_workload(Volume {
            info: ReservationInfo::new(WorkloadType::Volume, node_id),
            size,
            volume_type,
        })
    }

    /// Set the size in GiB.
    pub fn with_size(mut self, size: u64) -> Self {
        self.workload.size = size;
        self
    }

    /// Set the disk type.
    pub fn with_type(mut self, volume_type: DiskType) -> Self {
        self.workload.volume_type = volume_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::VolumeBuilder;
    use crate::builders::test_util::FakeEncryptor;
    use crate::workloads::DiskType;

    #[test]
    fn zero_size_is_rejected() {
        let enc = FakeEncryptor::default();
        assert!(VolumeBuilder::new("node1".to_string(), 0, DiskType::Hdd)
            .build(&enc)
            .is_err());
        let v = VolumeBuilder::new("node1".to_string(), 0, DiskType::Hdd)
            .with_size(5)
            .with_type(DiskType::Ssd)
            .build(&enc)
            .unwrap();
        assert_eq!(v.size, 5);
        assert_eq!(v.volume_type, DiskType::Ssd);
    }
}
