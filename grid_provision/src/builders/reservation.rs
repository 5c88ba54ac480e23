use super::{NetworkTopology, ValidationError, WorkloadBuilder};
use crate::encryption::SecretEncryptor;
use crate::reservation::{Reservation, ReservationData};
use crate::schema::Date;
use crate::signing::SigningRequest;
use crate::workloads::Workload;
use crate::ProvisionResult;
use chrono::{Duration, Utc};
use std::io::{Read, Write};

/// Bundles built workloads into a reservation.
///
/// The builder does not sign the reservation, this is done when it is deployed with a
/// [`ReservationClient`](crate::client::ReservationClient).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservationBuilder {
    reservation: Reservation,
}

impl ReservationBuilder {
    /// An empty reservation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a staged reservation from its JSON form.
    pub fn load<R: Read>(reader: R) -> ProvisionResult<Self> {
        Ok(ReservationBuilder {
            reservation: serde_json::from_reader(reader)?,
        })
    }

    /// Save the staged reservation in its JSON form.
    pub fn save<W: Write>(&self, writer: W) -> ProvisionResult<()> {
        Ok(serde_json::to_writer(writer, &self.reservation)?)
    }

    /// The payload assembled so far.
    pub fn data(&self) -> &ReservationData {
        &self.reservation.data_reservation
    }

    /// Set the description.
    pub fn with_description(mut self, description: String) -> Self {
        self.reservation.data_reservation.description = description;
        self
    }

    /// Set the metadata.
    pub fn with_metadata(mut self, metadata: String) -> Self {
        self.reservation.metadata = metadata;
        self
    }

    /// Keep the reservation alive for `duration` from now. The same moment is used as
    /// provisioning deadline.
    pub fn with_duration(self, duration: Duration) -> Self {
        let expiration = Date::from(Utc::now() + duration);
        self.with_expiration_provisioning(expiration)
            .with_expiration_reservation(expiration)
    }

    /// Set the provisioning deadline.
    pub fn with_expiration_provisioning(mut self, expiration: Date) -> Self {
        self.reservation.data_reservation.expiration_provisioning = expiration;
        self
    }

    /// Set the moment the reservation expires.
    pub fn with_expiration_reservation(mut self, expiration: Date) -> Self {
        self.reservation.data_reservation.expiration_reservation = expiration;
        self
    }

    /// Set who needs to sign before the reservation is provisioned.
    pub fn with_signing_request_provision(mut self, request: SigningRequest) -> Self {
        self.reservation.data_reservation.signing_request_provision = request;
        self
    }

    /// Append a built workload.
    pub fn add<W: Into<Workload>>(mut self, workload: W) -> Self {
        self.reservation.data_reservation.push(workload.into());
        self
    }

    /// Build and append the network resources of every node of a network.
    pub fn add_network(
        mut self,
        network: &dyn NetworkTopology,
        encryptor: &dyn SecretEncryptor,
    ) -> ProvisionResult<Self> {
        for resource in network.resources() {
            let built = WorkloadBuilder::from_workload(resource).build(encryptor)?;
            self.reservation.data_reservation.push(built.into());
        }
        Ok(self)
    }

    /// Finish the reservation and stamp its epoch.
    pub fn build(mut self) -> Result<Reservation, ValidationError> {
        if self.reservation.id != 0 {
            return Err(format!(
                "reservation already has id {}, ids are assigned by the explorer",
                self.reservation.id
            )
            .into());
        }
        let data = &self.reservation.data_reservation;
        if data.workloads().is_empty() {
            return Err("reservation does not contain any workload".into());
        }
        data.signing_request_provision.validate()?;
        if !data.expiration_provisioning.is_zero()
            && !data.expiration_reservation.is_zero()
            && data.expiration_provisioning > data.expiration_reservation
        {
            return Err("provisioning deadline is after the reservation expiration".into());
        }

        self.reservation.epoch = Date::now();
        Ok(self.reservation)
    }
}
