use super::{ReservationInfo, WorkloadDescriptor};
use crate::capacity::{Rsu, UnsupportedSizeError};
use crate::schema::IpRange;
use crate::signing::Challenge;
use serde::{Deserialize, Serialize};

/// A public IPv4 address reserved from the farm of the node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicIp {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// The reserved address.
    pub ipaddress: IpRange,
}

impl WorkloadDescriptor for PublicIp {
    fn info(&self) -> &ReservationInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ReservationInfo {
        &mut self.info
    }

    fn rsu(&self) -> Result<Rsu, UnsupportedSizeError> {
        Ok(Rsu {
            ipv4u: 1,
            ..Default::default()
        })
    }

    fn encode_challenge(&self, challenge: &mut Challenge) {
        challenge.push(self.ipaddress);
    }
}

#[cfg(test)]
mod tests {
    use super::PublicIp;
    use crate::workloads::test_util::{assert_signed_fields, assert_unsigned_envelope_fields};
    use crate::workloads::{ReservationInfo, WorkloadDescriptor, WorkloadType};

    fn public_ip() -> PublicIp {
        PublicIp {
            info: ReservationInfo::new(WorkloadType::PublicIp, "node1".to_string()),
            ipaddress: "185.69.166.150/32".parse().unwrap(),
        }
    }

    #[test]
    fn challenge_fields() {
        let ip = public_ip();
        assert!(String::from_utf8(ip.signature_challenge())
            .unwrap()
            .ends_with("185.69.166.150/32"));
        assert_signed_fields(
            &ip,
            &[("ipaddress", |w: &mut PublicIp| {
                w.ipaddress = "185.69.166.151/32".parse().unwrap()
            })],
        );
        assert_unsigned_envelope_fields(&ip);
    }

    #[test]
    fn consumes_one_ipv4_unit() {
        assert_eq!(public_ip().rsu().unwrap().ipv4u, 1);
    }
}
