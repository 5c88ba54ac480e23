use super::{DiskType, ReservationInfo, WorkloadDescriptor};
use crate::capacity::{Rsu, UnsupportedSizeError};
use crate::signing::Challenge;
use serde::{Deserialize, Serialize};

/// A block volume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volume {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// Size in GiB.
    pub size: u64,
    /// Medium backing the volume.
    #[serde(rename = "type")]
    pub volume_type: DiskType,
}

impl WorkloadDescriptor for Volume {
    fn info(&self) -> &ReservationInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ReservationInfo {
        &mut self.info
    }

    fn rsu(&self) -> Result<Rsu, UnsupportedSizeError> {
        let (sru, hru) = self.volume_type.split(self.size as f64);
        Ok(Rsu {
            sru,
            hru,
            ..Default::default()
        })
    }

    fn encode_challenge(&self, challenge: &mut Challenge) {
        challenge.push(self.size).push(self.volume_type);
    }
}
