use super::{DiskType, ReservationInfo, WorkloadDescriptor};
use crate::capacity::{Rsu, UnsupportedSizeError};
use crate::signing::Challenge;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt;
use std::str::FromStr;

/// A 0-db namespace.
///
/// `plain_password` only lives in memory until the namespace is built. Building encrypts it for
/// the node into `password`, so a serialized namespace never holds the plaintext.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Zdb {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// Size in GiB.
    pub size: u64,
    /// Namespace mode.
    pub mode: ZdbMode,
    /// Namespace password, encrypted for the node.
    pub password: String,
    /// Plaintext namespace password.
    #[serde(skip)]
    pub plain_password: String,
    /// Medium backing the namespace.
    pub disk_type: DiskType,
    /// Make the namespace publicly readable.
    pub public: bool,
}

/// Mode of a 0-db namespace.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
pub enum ZdbMode {
    /// Sequential mode, keys are assigned by the database.
    #[default]
    Seq = 0,
    /// User mode, keys are chosen by the user.
    User = 1,
}

impl fmt::Display for ZdbMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ZdbMode::Seq => "seq",
            ZdbMode::User => "user",
        })
    }
}

impl FromStr for ZdbMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seq" => Ok(ZdbMode::Seq),
            "user" => Ok(ZdbMode::User),
            other => Err(format!("unknown zdb mode {}", other)),
        }
    }
}

impl WorkloadDescriptor for Zdb {
    fn info(&self) -> &ReservationInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ReservationInfo {
        &mut self.info
    }

    fn rsu(&self) -> Result<Rsu, UnsupportedSizeError> {
        let (sru, hru) = self.disk_type.split(self.size as f64);
        Ok(Rsu {
            sru,
            hru,
            ..Default::default()
        })
    }

    fn encode_challenge(&self, challenge: &mut Challenge) {
        challenge
            .push(self.size)
            .push(self.mode)
            .push(&self.password)
            .push(self.disk_type)
            .push(self.public);
    }
}
