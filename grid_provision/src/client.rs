use crate::capacity::{CapacityPool, CapacityReservation, CapacityReservationData};
use crate::explorer::{CapacityPoolCreateResponse, Explorer, ReservationCreateResponse};
use crate::identity::Identity;
use crate::lifecycle::NextAction;
use crate::reservation::{Reservation, ReservationData};
use crate::signing::{sign_delete, sign_reservation};
use crate::{ProvisionError, ProvisionResult};
use log::{debug, info, warn};
use std::sync::Arc;

/// Result of a deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The deletion signature was accepted by the explorer.
    Signed,
    /// The reservation is in a terminal state, nothing was sent.
    NothingToDelete(NextAction),
}

/// Signs reservations and capacity reservations on behalf of a user, and submits them to an
/// explorer.
pub struct ReservationClient<E> {
    explorer: E,
    identity: Arc<Identity>,
    currencies: Vec<String>,
}

impl<E: Explorer> ReservationClient<E> {
    /// Create a new client. All signed reservations can be paid with the given currencies.
    pub fn new(explorer: E, identity: Arc<Identity>, currencies: Vec<String>) -> Self {
        ReservationClient {
            explorer,
            identity,
            currencies,
        }
    }

    /// The explorer used by the client.
    pub fn explorer(&self) -> &E {
        &self.explorer
    }

    /// Sign a reservation without submitting it.
    pub fn prepare(&self, reservation: Reservation) -> ProvisionResult<Reservation> {
        let Reservation {
            data_reservation,
            metadata,
            ..
        } = reservation;
        let mut signed = sign_reservation(data_reservation, &self.identity, &self.currencies)?;
        signed.metadata = metadata;
        Ok(signed)
    }

    /// Sign a reservation and submit it to the explorer.
    pub async fn deploy(&self, reservation: Reservation) -> ProvisionResult<ReservationCreateResponse> {
        let signed = self.prepare(reservation)?;
        let workloads = signed.data_reservation.workloads().len();

        let response = self.explorer.create(&signed).await.map_err(|e| {
            ProvisionError::remote(
                format!("reservation of customer {}", self.identity.id()),
                e,
            )
        })?;

        info!(
            "reservation {} with {} workloads created",
            response.id, workloads
        );
        Ok(response)
    }

    /// Request the deletion of a reservation.
    ///
    /// The reservation is fetched first, as the signature covers its stored encoding. A
    /// reservation in a terminal state is left alone.
    pub async fn delete_reservation(&self, id: i64) -> ProvisionResult<DeleteOutcome> {
        let reservation = self.explorer.get(id).await.map_err(|e| {
            ProvisionError::remote(format!("reservation {}", id), e)
        })?;

        if !reservation.next_action.accepts_delete() {
            debug!(
                "reservation {} is already {}, not signing for deletion",
                id, reservation.next_action
            );
            return Ok(DeleteOutcome::NothingToDelete(reservation.next_action));
        }
        if !reservation
            .data_reservation
            .signing_request_delete
            .signers
            .contains(&self.identity.id())
        {
            warn!(
                "user {} is not listed as a deletion signer of reservation {}",
                self.identity.id(),
                id
            );
        }

        let signature = sign_delete(&reservation, &self.identity);
        self.explorer
            .sign_delete(id, self.identity.id(), &signature)
            .await
            .map_err(|e| {
                ProvisionError::remote(
                    format!(
                        "deletion of reservation {} signed by {}",
                        id,
                        self.identity.id()
                    ),
                    e,
                )
            })?;

        info!("reservation {} marked as to be deleted", id);
        Ok(DeleteOutcome::Signed)
    }

    /// Sign a capacity reservation and submit it to the explorer.
    pub async fn deploy_capacity_pool(
        &self,
        mut data: CapacityReservationData,
    ) -> ProvisionResult<CapacityPoolCreateResponse> {
        data.currencies = self.currencies.clone();
        let reservation = CapacityReservation::sign(data, &self.identity)?;

        let response = self.explorer.pool_create(&reservation).await.map_err(|e| {
            let pool = reservation.data_reservation.pool_id;
            let context = if pool == 0 {
                format!("new capacity pool of customer {}", self.identity.id())
            } else {
                format!("capacity pool {}", pool)
            };
            ProvisionError::remote(context, e)
        })?;

        info!(
            "capacity reservation {} created ({} cu, {} su, {} ipv4u)",
            response.reservation_id,
            reservation.data_reservation.cus,
            reservation.data_reservation.sus,
            reservation.data_reservation.ipv4us
        );
        Ok(response)
    }

    /// Fetch a capacity pool.
    pub async fn pool_get(&self, id: i64) -> ProvisionResult<CapacityPool> {
        self.explorer
            .pool_get(id)
            .await
            .map_err(|e| ProvisionError::remote(format!("capacity pool {}", id), e))
    }

    /// Fetch all capacity pools of the user.
    pub async fn pools_by_owner(&self) -> ProvisionResult<Vec<CapacityPool>> {
        let owner = self.identity.id();
        self.explorer
            .pools_get_by_owner(owner)
            .await
            .map_err(|e| ProvisionError::remote(format!("capacity pools of customer {}", owner), e))
    }

    /// Top up a pool so it lives at least `target_lifetime` seconds at its current usage.
    /// Returns nothing if the pool already has enough units.
    pub async fn extend_pool(
        &self,
        id: i64,
        target_lifetime: u64,
    ) -> ProvisionResult<Option<CapacityPoolCreateResponse>> {
        let pool = self.pool_get(id).await?;
        match pool.extension(target_lifetime, self.currencies.clone()) {
            Some(data) => {
                debug!(
                    "pool {} needs {} cu and {} su to live {} more seconds",
                    id, data.cus, data.sus, target_lifetime
                );
                Ok(Some(self.deploy_capacity_pool(data).await?))
            }
            None => {
                debug!("pool {} has enough capacity", id);
                Ok(None)
            }
        }
    }
}

/// The capacity to buy to keep all workloads of a reservation running for `seconds`. The pool
/// can be used on every node the reservation deploys to.
pub fn capacity_for(
    data: &ReservationData,
    seconds: u64,
    pool_id: i64,
) -> ProvisionResult<CapacityReservationData> {
    let nodes = data.rsu_per_node()?;
    let units = data.cloud_units()?;
    let (cus, sus, ipv4us) = units.for_duration(seconds);

    let capacity = CapacityReservationData {
        pool_id,
        cus,
        sus,
        ipv4us,
        node_ids: nodes.into_keys().collect(),
        currencies: Vec::new(),
    };
    capacity.validate()?;
    Ok(capacity)
}

#[cfg(test)]
mod tests {
    use super::capacity_for;
    use crate::builders::test_util::FakeEncryptor;
    use crate::builders::VolumeBuilder;
    use crate::reservation::ReservationData;
    use crate::workloads::DiskType;

    #[test]
    fn capacity_for_reservation() {
        let enc = FakeEncryptor::default();
        let mut data = ReservationData::default();
        for node in &["node2", "node1"] {
            let v = VolumeBuilder::new(node.to_string(), 91, DiskType::Ssd)
                .build(&enc)
                .unwrap();
            data.push(v.into());
        }

        let capacity = capacity_for(&data, 3600, 0).unwrap();
        assert_eq!(capacity.node_ids, vec!["node1", "node2"]);
        assert_eq!(capacity.sus, 7200);
        assert_eq!(capacity.cus, 0);

        assert!(capacity_for(&ReservationData::default(), 3600, 0).is_err());
    }
}
