use super::ValidationError;
use crate::capacity::{CapacityReservationData, CloudUnits};
use crate::ProvisionResult;
use std::io::{Read, Write};

/// Assembles a request to buy capacity, either for a new pool or to extend an existing one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapacityReservationBuilder {
    data: CapacityReservationData,
}

impl CapacityReservationBuilder {
    /// Start a request for a pool usable on the given nodes.
    pub fn new(node_ids: Vec<String>) -> Self {
        CapacityReservationBuilder {
            data: CapacityReservationData {
                node_ids,
                ..Default::default()
            },
        }
    }

    /// Load a staged request from its JSON form.
    pub fn load<R: Read>(reader: R) -> ProvisionResult<Self> {
        Ok(CapacityReservationBuilder {
            data: serde_json::from_reader(reader)?,
        })
    }

    /// Save the request in its JSON form. Only valid requests are saved.
    pub fn save<W: Write>(&self, writer: W) -> ProvisionResult<()> {
        self.data.validate()?;
        Ok(serde_json::to_writer(writer, &self.data)?)
    }

    /// Add the capacity to an existing pool.
    pub fn with_pool_id(mut self, pool_id: i64) -> Self {
        self.data.pool_id = pool_id;
        self
    }

    /// Set the compute units to buy.
    pub fn with_cus(mut self, cus: u64) -> Self {
        self.data.cus = cus;
        self
    }

    /// Set the storage units to buy.
    pub fn with_sus(mut self, sus: u64) -> Self {
        self.data.sus = sus;
        self
    }

    /// Set the public IPv4 units to buy.
    pub fn with_ipv4us(mut self, ipv4us: u64) -> Self {
        self.data.ipv4us = ipv4us;
        self
    }

    /// Buy enough units to keep `units` running for `seconds`.
    pub fn with_units_for(mut self, units: CloudUnits, seconds: u64) -> Self {
        let (cus, sus, ipv4us) = units.for_duration(seconds);
        self.data.cus = cus;
        self.data.sus = sus;
        self.data.ipv4us = ipv4us;
        self
    }

    /// Set the currencies the customer can pay with.
    pub fn with_currencies(mut self, currencies: Vec<String>) -> Self {
        self.data.currencies = currencies;
        self
    }

    /// Validate and return the request.
    pub fn build(self) -> Result<CapacityReservationData, ValidationError> {
        self.data.validate()?;
        Ok(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::CapacityReservationBuilder;
    use crate::capacity::CloudUnits;

    #[test]
    fn save_validates() {
        let mut buf = Vec::new();
        assert!(CapacityReservationBuilder::new(vec!["node1".to_string()])
            .save(&mut buf)
            .is_err());
        assert!(buf.is_empty());

        let builder = CapacityReservationBuilder::new(vec!["node1".to_string()]).with_cus(10);
        builder.save(&mut buf).unwrap();
        assert_eq!(CapacityReservationBuilder::load(buf.as_slice()).unwrap(), builder);
    }

    #[test]
    fn units_for_duration() {
        let units = CloudUnits {
            cu: 0.5,
            su: 0.25,
            ipv4u: 0.,
        };
        let data = CapacityReservationBuilder::new(vec!["node1".to_string()])
            .with_units_for(units, 3)
            .with_currencies(vec!["TFT".to_string()])
            .build()
            .unwrap();
        assert_eq!((data.cus, data.sus, data.ipv4us), (2, 1, 0));
    }

    #[test]
    fn nodes_are_required() {
        assert!(CapacityReservationBuilder::new(vec![])
            .with_cus(1)
            .with_sus(1)
            .with_ipv4us(1)
            .build()
            .is_err());
    }
}
