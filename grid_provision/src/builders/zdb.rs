use super::{Buildable, ValidationError, WorkloadBuilder};
use crate::encryption::{SecretEncryptor, SecretResult};
use crate::workloads::{DiskType, ReservationInfo, WorkloadType, Zdb, ZdbMode};

/// Builds a [`Zdb`] namespace.
pub type ZdbBuilder = WorkloadBuilder<Zdb>;

impl Buildable for Zdb {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.size == 0 {
            return Err("zdb size cannot be 0".into());
        }
        Ok(())
    }

    fn encrypt_secrets(&mut self, encryptor: &dyn SecretEncryptor) -> SecretResult<()> {
        if self.plain_password.is_empty() {
            return Ok(());
        }
        self.password = encryptor
            .encrypt_secret(&self.plain_password, &self.info.node_id)
            .map_err(|e| e.with_subject("zdb password".to_string()))?;
        self.plain_password.clear();
        Ok(())
    }
}

impl ZdbBuilder {
    /// Start building a namespace of `size` GiB.
    pub fn new(node_id: String, size: u64, mode: ZdbMode, disk_type: DiskType) -> Self {
        WorkloadBuilder::from_workload(Zdb {
            info: ReservationInfo::new(WorkloadType::Zdb, node_id),
            size,
            mode,
            disk_type,
            ..Default::default()
        })
    }

    /// Set the password of the namespace. It is encrypted for the node on build.
    pub fn with_password(mut self, password: String) -> Self {
        self.workload.plain_password = password;
        self
    }

    /// Make the namespace publicly readable.
    pub fn with_public(mut self, public: bool) -> Self {
        self.workload.public = public;
        self
    }

    /// Set the mode.
    pub fn with_mode(mut self, mode: ZdbMode) -> Self {
        self.workload.mode = mode;
        self
    }
}
