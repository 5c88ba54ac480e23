use super::{ReservationInfo, WorkloadDescriptor};
use crate::capacity::{Rsu, UnsupportedSizeError};
use crate::signing::Challenge;
use serde::{Deserialize, Serialize};

/// Request for diagnostics from a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugWorkload {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// Request a full system diagnostic.
    pub sysdiag: bool,
}

impl WorkloadDescriptor for DebugWorkload {
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
        challenge.push(self.sysdiag);
    }
}

#[cfg(test)]
mod tests {
    use super::DebugWorkload;
    use crate::schema::Date;
    use crate::workloads::test_util::{assert_signed_fields, assert_unsigned_envelope_fields};
    use crate::workloads::{ReservationInfo, WorkloadType};

    fn debug() -> DebugWorkload {
        DebugWorkload {
            info: ReservationInfo::new(WorkloadType::Debug, "node1".to_string()),
            sysdiag: false,
        }
    }

    #[test]
    fn challenge_fields() {
        assert_signed_fields(
            &debug(),
            &[
                ("sysdiag", |w: &mut DebugWorkload| w.sysdiag = true),
                ("customer_tid", |w: &mut DebugWorkload| w.info.customer_tid = 4),
                ("id", |w: &mut DebugWorkload| w.info.id = 12),
                ("workload_id", |w: &mut DebugWorkload| w.info.workload_id = 2),
                ("pool_id", |w: &mut DebugWorkload| w.info.pool_id = 3),
                ("description", |w: &mut DebugWorkload| {
                    w.info.description = "diag".to_string()
                }),
                ("metadata", |w: &mut DebugWorkload| {
                    w.info.metadata = "meta".to_string()
                }),
                ("epoch", |w: &mut DebugWorkload| {
                    w.info.epoch = Date::from_unix(100)
                }),
                ("workload_type", |w: &mut DebugWorkload| {
                    w.info.workload_type = WorkloadType::Volume
                }),
                ("node_id", |w: &mut DebugWorkload| {
                    w.info.node_id = "node2".to_string()
                }),
                ("expiration_provisioning", |w: &mut DebugWorkload| {
                    w.info.expiration_provisioning = Date::from_unix(200)
                }),
            ],
        );
        assert_unsigned_envelope_fields(&debug());
    }
}
