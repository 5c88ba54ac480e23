use crate::builders::ValidationError;
use crate::identity::Identity;
use crate::schema::Date;
use crate::workloads::WorkloadType;
use crate::ProvisionResult;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Size tiers of kubernetes nodes and virtual machines: (tier, cru, mru in GiB, sru in GiB).
const SIZE_TIERS: [(u16, u64, f64, f64); 18] = [
    (1, 1, 2., 50.),
    (2, 2, 4., 100.),
    (3, 2, 8., 25.),
    (4, 2, 8., 50.),
    (5, 2, 8., 200.),
    (6, 4, 16., 50.),
    (7, 4, 16., 100.),
    (8, 4, 16., 400.),
    (9, 8, 32., 100.),
    (10, 8, 32., 200.),
    (11, 8, 32., 800.),
    (12, 1, 64., 200.),
    (13, 1, 64., 400.),
    (14, 1, 64., 800.),
    (15, 1, 2., 25.),
    (16, 2, 4., 50.),
    (17, 4, 8., 50.),
    (18, 1, 1., 25.),
];

/// Resource units consumed by a workload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rsu {
    /// Virtual cpus.
    pub cru: u64,
    /// Memory in GiB.
    pub mru: f64,
    /// SSD storage in GiB.
    pub sru: f64,
    /// HDD storage in GiB.
    pub hru: f64,
    /// Public IPv4 addresses.
    pub ipv4u: u64,
}

impl Rsu {
    /// Convert to the cloud units the grid bills in.
    pub fn cloud_units(&self) -> CloudUnits {
        CloudUnits {
            cu: round_to(
                (self.mru / 4. * 0.95).min(self.cru as f64 * 2.),
                1000.,
            ),
            su: round_to(self.hru / 1093. + self.sru / 91., 1000.),
            ipv4u: self.ipv4u as f64,
        }
    }
}

impl Add for Rsu {
    type Output = Rsu;

    fn add(mut self, rhs: Rsu) -> Rsu {
        self += rhs;
        self
    }
}

impl AddAssign for Rsu {
    fn add_assign(&mut self, rhs: Rsu) {
        self.cru += rhs.cru;
        self.mru += rhs.mru;
        self.sru += rhs.sru;
        self.hru += rhs.hru;
        self.ipv4u += rhs.ipv4u;
    }
}

/// Resources expressed in billing units. All units are per second of usage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CloudUnits {
    /// Compute units.
    pub cu: f64,
    /// Storage units.
    pub su: f64,
    /// Public IPv4 units.
    pub ipv4u: f64,
}

impl CloudUnits {
    /// The amount of whole units to buy to keep these resources running for the given amount of
    /// seconds.
    pub fn for_duration(&self, seconds: u64) -> (u64, u64, u64) {
        let secs = seconds as f64;
        (
            (self.cu * secs).ceil() as u64,
            (self.su * secs).ceil() as u64,
            (self.ipv4u * secs).ceil() as u64,
        )
    }
}

impl Add for CloudUnits {
    type Output = CloudUnits;

    fn add(self, rhs: CloudUnits) -> CloudUnits {
        CloudUnits {
            cu: self.cu + rhs.cu,
            su: self.su + rhs.su,
            ipv4u: self.ipv4u + rhs.ipv4u,
        }
    }
}

fn round_to(v: f64, precision: f64) -> f64 {
    (v * precision).round() / precision
}

/// Round a fractional amount of units to 4 digits.
pub(crate) fn round_units(v: f64) -> f64 {
    round_to(v, 10000.)
}

/// Look up the resources of a size tier.
pub fn size_tier(workload_type: WorkloadType, size: u16) -> Result<Rsu, UnsupportedSizeError> {
    SIZE_TIERS
        .iter()
        .find(|(tier, ..)| *tier == size)
        .map(|&(_, cru, mru, sru)| Rsu {
            cru,
            mru,
            sru,
            ..Default::default()
        })
        .ok_or(UnsupportedSizeError {
            workload_type,
            size,
        })
}

/// A workload requests a size tier which does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedSizeError {
    workload_type: WorkloadType,
    size: u16,
}

impl UnsupportedSizeError {
    /// The requested size tier.
    pub fn size(&self) -> u16 {
        self.size
    }

    /// The type of workload requesting the tier.
    pub fn workload_type(&self) -> WorkloadType {
        self.workload_type
    }
}

impl fmt::Display for UnsupportedSizeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "unsupported size {} for {} workload",
            self.size, self.workload_type
        )
    }
}

impl std::error::Error for UnsupportedSizeError {}

/// Request to create a capacity pool, or to add capacity to an existing one when `pool_id` is
/// set.
///
/// Only whole units can be bought. Since a unit is a tiny amount of capacity, rounding up never
/// costs much.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityReservationData {
    /// Pool to add capacity to, 0 to create a new pool.
    pub pool_id: i64,
    /// Compute units to buy.
    pub cus: u64,
    /// Storage units to buy.
    pub sus: u64,
    /// Public IPv4 units to buy.
    #[serde(rename = "ipv4u")]
    pub ipv4us: u64,
    /// Nodes the pool can be used on.
    pub node_ids: Vec<String>,
    /// Currencies the customer can pay with.
    pub currencies: Vec<String>,
}

impl CapacityReservationData {
    /// Check the request is complete.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.node_ids.is_empty() {
            return Err("pool must be applicable to at least 1 node".to_string().into());
        }
        if self.cus == 0 && self.sus == 0 && self.ipv4us == 0 {
            return Err("capacity reservation does not buy any units".to_string().into());
        }
        Ok(())
    }
}

/// Create a validated capacity reservation request.
pub fn compute_capacity(
    pool_id: i64,
    cus: u64,
    sus: u64,
    node_ids: Vec<String>,
    currencies: Vec<String>,
) -> Result<CapacityReservationData, ValidationError> {
    let data = CapacityReservationData {
        pool_id,
        cus,
        sus,
        ipv4us: 0,
        node_ids,
        currencies,
    };
    data.validate()?;
    Ok(data)
}

/// A signed capacity reservation, as submitted to the explorer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityReservation {
    /// Id assigned by the explorer.
    pub id: i64,
    /// Frozen encoding of `data_reservation`, as signed by the customer.
    pub json: String,
    /// The request.
    pub data_reservation: CapacityReservationData,
    /// Id of the customer.
    pub customer_tid: i64,
    /// Hex encoded signature of the customer over `json`.
    pub customer_signature: String,
}

impl CapacityReservation {
    /// Validate and sign a capacity reservation request.
    pub fn sign(
        data: CapacityReservationData,
        identity: &Identity,
    ) -> ProvisionResult<CapacityReservation> {
        data.validate()?;
        let json = serde_json::to_string(&data)?;
        let customer_signature = identity.sign_hex(json.as_bytes());
        debug!(
            "signed capacity reservation for pool {} ({} cu, {} su) as customer {}",
            data.pool_id,
            data.cus,
            data.sus,
            identity.id()
        );

        Ok(CapacityReservation {
            id: 0,
            json,
            data_reservation: data,
            customer_tid: identity.id(),
            customer_signature,
        })
    }

    /// Check the reservation is signed, and its frozen encoding matches the data.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.customer_tid == 0 {
            return Err("customer_tid is required".to_string().into());
        }
        if self.customer_signature.is_empty() {
            return Err("customer_signature is required".to_string().into());
        }
        self.data_reservation.validate()?;

        let frozen: CapacityReservationData = serde_json::from_str(&self.json)
            .map_err(|e| ValidationError::from(format!("invalid json data on reservation: {}", e)))?;
        if frozen != self.data_reservation {
            return Err("json data does not match the reservation data"
                .to_string()
                .into());
        }
        Ok(())
    }
}

/// Used resources of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capacity {
    /// Virtual cpus.
    pub cpu: u64,
    /// Memory in GiB.
    pub mru: f64,
    /// HDD storage in GiB.
    pub hru: f64,
    /// SSD storage in GiB.
    pub sru: f64,
}

impl AddAssign<Rsu> for Capacity {
    fn add_assign(&mut self, rsu: Rsu) {
        self.cpu += rsu.cru;
        self.mru += rsu.mru;
        self.hru += rsu.hru;
        self.sru += rsu.sru;
    }
}

/// A capacity pool as tracked by the explorer. Workloads assigned to the pool consume its
/// units over time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityPool {
    /// Id of the pool.
    pub pool_id: i64,
    /// Compute unit seconds left.
    pub cus: f64,
    /// Storage unit seconds left.
    pub sus: f64,
    /// Public IPv4 unit seconds left.
    pub ipv4us: f64,
    /// Moment the unit balance was last computed.
    pub last_updated: Date,
    /// Compute units used per second by the active workloads.
    pub active_cu: f64,
    /// Storage units used per second by the active workloads.
    pub active_su: f64,
    /// Public IPv4 units used per second by the active workloads.
    pub active_ipv4: f64,
    /// Moment the pool runs out of units at the current usage.
    pub empty_at: Date,
    /// Nodes the pool can be used on.
    pub node_ids: Vec<String>,
    /// Workloads currently consuming the pool.
    pub active_workload_ids: Vec<i64>,
    /// Owner of the pool.
    pub customer_tid: i64,
    /// Resources used by the active workloads.
    pub used_capacity: Capacity,
}

impl CapacityPool {
    /// Check if workloads on the given node can be paid from this pool.
    pub fn covers_node(&self, node_id: &str) -> bool {
        self.node_ids.iter().any(|n| n == node_id)
    }

    /// Seconds left until the pool is empty, negative if it already is.
    pub fn remaining_lifetime(&self, now: Date) -> i64 {
        self.empty_at.unix() - now.unix()
    }

    /// Build the request which tops up the pool so it lives for `target_lifetime` seconds at the
    /// current usage. Returns `None` if the pool already has enough units.
    pub fn extension(
        &self,
        target_lifetime: u64,
        currencies: Vec<String>,
    ) -> Option<CapacityReservationData> {
        let missing_cu = self.active_cu * target_lifetime as f64 - self.cus;
        let missing_su = self.active_su * target_lifetime as f64 - self.sus;
        let missing_ipv4 = self.active_ipv4 * target_lifetime as f64 - self.ipv4us;

        let data = CapacityReservationData {
            pool_id: self.pool_id,
            cus: missing_cu.max(0.).ceil() as u64,
            sus: missing_su.max(0.).ceil() as u64,
            ipv4us: missing_ipv4.max(0.).ceil() as u64,
            node_ids: self.node_ids.clone(),
            currencies,
        };
        if data.validate().is_err() {
            return None;
        }
        Some(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    #[test]
    fn unknown_tiers_fail() {
        assert!(size_tier(WorkloadType::Kubernetes, 0).is_err());
        assert!(size_tier(WorkloadType::Kubernetes, 19).is_err());
        let err = size_tier(WorkloadType::VirtualMachine, 42).unwrap_err();
        assert_eq!(err.to_string(), "unsupported size 42 for virtual_machine workload");
        assert_eq!(size_tier(WorkloadType::Kubernetes, 18).unwrap().mru, 1.);
    }

    #[test]
    fn cloud_units() {
        let rsu = Rsu {
            cru: 2,
            mru: 4.,
            sru: 91.,
            hru: 1093.,
            ipv4u: 1,
        };
        let cu = rsu.cloud_units();
        assert_eq!(cu.cu, 0.95);
        assert_eq!(cu.su, 2.);
        assert_eq!(cu.ipv4u, 1.);
        assert_eq!(cu.for_duration(10), (10, 20, 10));
    }

    #[test]
    fn compute_capacity_validation() {
        assert!(compute_capacity(0, 10, 10, vec![], vec!["TFT".to_string()]).is_err());
        assert!(compute_capacity(0, 0, 0, vec!["node".to_string()], vec![]).is_err());
        let data = compute_capacity(3, 10, 0, vec!["node".to_string()], vec![]).unwrap();
        assert_eq!(data.pool_id, 3);
    }

    #[test]
    fn capacity_reservation_encoding() {
        let data = compute_capacity(0, 1, 2, vec!["node".to_string()], vec!["TFT".to_string()])
            .unwrap();
        assert_eq!(
            serde_json::to_string(&data).unwrap(),
            r#"{"pool_id":0,"cus":1,"sus":2,"ipv4u":0,"node_ids":["node"],"currencies":["TFT"]}"#
        );
    }

    #[test]
    fn signed_capacity_reservation() {
        let id = Identity::from_seed(5, &[1u8; 32]).unwrap();
        let data = compute_capacity(0, 1, 2, vec!["node".to_string()], vec!["TFT".to_string()])
            .unwrap();
        let reservation = CapacityReservation::sign(data, &id).unwrap();
        assert!(reservation.validate().is_ok());
        assert!(crate::signing::verify(
            &id.public_key(),
            reservation.json.as_bytes(),
            &reservation.customer_signature
        ));

        let mut tampered = reservation.clone();
        tampered.data_reservation.cus = 100;
        assert!(tampered.validate().is_err());

        let mut unsigned = reservation;
        unsigned.customer_signature.clear();
        assert!(unsigned.validate().is_err());
    }

    #[test]
    fn pool_extension() {
        let pool = CapacityPool {
            pool_id: 4,
            cus: 100.,
            sus: 1000.,
            active_cu: 1.,
            active_su: 1.,
            node_ids: vec!["node".to_string()],
            empty_at: Date::from_unix(1000),
            ..Default::default()
        };
        assert_eq!(pool.remaining_lifetime(Date::from_unix(900)), 100);
        assert!(pool.covers_node("node"));

        let ext = pool.extension(500, vec!["TFT".to_string()]).unwrap();
        assert_eq!(ext.pool_id, 4);
        assert_eq!(ext.cus, 400);
        assert_eq!(ext.sus, 0);

        assert!(pool.extension(50, vec![]).is_none());
    }

    #[test]
    fn used_capacity() {
        let mut used = Capacity::default();
        used += Rsu {
            cru: 1,
            mru: 2.,
            sru: 50.,
            ..Default::default()
        };
        used += Rsu {
            hru: 10.,
            ..Default::default()
        };
        assert_eq!(used.cpu, 1);
        assert_eq!(used.hru, 10.);
    }
}
