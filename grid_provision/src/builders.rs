//! Builders assemble workloads from user input, validate them, and encrypt their secrets for the
//! node which will run them.
//!
//! Every workload type is built with a [`WorkloadBuilder`], which owns the workload while it is
//! being assembled. Builders are consumed by their `with_` methods and by `build`, so a cloned
//! builder never shares any state with the original. A builder can be saved to and loaded from
//! its JSON form, which allows staging a workload over multiple invocations of a tool.
//!
//! Plaintext secrets are never part of the JSON form. Only a built workload carries its secrets,
//! encrypted for the node, and building it again leaves them untouched.

use crate::encryption::{SecretEncryptor, SecretResult};
use crate::schema::Date;
use crate::workloads::{DebugWorkload, ReservationInfo, Workload, WorkloadDescriptor, WorkloadType};
use crate::ProvisionResult;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};

mod capacity;
mod container;
mod gateway;
mod k8s;
mod network;
mod public_ip;
mod qemu;
mod reservation;
mod vm;
mod volume;
mod zdb;

pub use capacity::CapacityReservationBuilder;
pub use container::ContainerBuilder;
pub use gateway::{
    Gateway4To6Builder, GatewayDelegateBuilder, GatewayProxyBuilder, GatewayReverseProxyBuilder,
    GatewaySubdomainBuilder,
};
pub use k8s::K8sBuilder;
pub use network::{NetworkResourceBuilder, NetworkTopology};
pub use public_ip::PublicIpBuilder;
pub use qemu::QemuBuilder;
pub use reservation::ReservationBuilder;
pub use vm::VirtualMachineBuilder;
pub use volume::VolumeBuilder;
pub use zdb::ZdbBuilder;

/// Debug workloads carry no input besides the envelope.
pub type DebugBuilder = WorkloadBuilder<DebugWorkload>;

/// A workload is missing required input, or holds inconsistent values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    msg: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid input: {}", self.msg)
    }
}

impl std::error::Error for ValidationError {}

impl From<String> for ValidationError {
    fn from(msg: String) -> Self {
        ValidationError { msg }
    }
}

impl From<&str> for ValidationError {
    fn from(msg: &str) -> Self {
        ValidationError {
            msg: msg.to_string(),
        }
    }
}

/// The type specific part of building a workload.
pub trait Buildable: WorkloadDescriptor + Serialize + DeserializeOwned + Into<Workload> {
    /// Check the type specific fields. The envelope is checked by the builder.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Replace plaintext secrets by their encrypted form. Workloads without secrets don't need
    /// to do anything.
    fn encrypt_secrets(&mut self, _encryptor: &dyn SecretEncryptor) -> SecretResult<()> {
        Ok(())
    }
}

/// Assembles a single workload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkloadBuilder<W> {
    workload: W,
}

impl<W: Buildable> WorkloadBuilder<W> {
    /// Continue building an existing workload.
    pub fn from_workload(workload: W) -> Self {
        WorkloadBuilder { workload }
    }

    /// Load a staged workload from its JSON form.
    pub fn load<R: Read>(reader: R) -> ProvisionResult<Self> {
        Ok(WorkloadBuilder {
            workload: serde_json::from_reader(reader)?,
        })
    }

    /// Save the staged workload in its JSON form.
    pub fn save<Wr: Write>(&self, writer: Wr) -> ProvisionResult<()> {
        Ok(serde_json::to_writer(writer, &self.workload)?)
    }

    /// The workload as assembled so far.
    pub fn workload(&self) -> &W {
        &self.workload
    }

    /// Set the node the workload is deployed on.
    pub fn with_node_id(mut self, node_id: String) -> Self {
        self.workload.info_mut().node_id = node_id;
        self
    }

    /// Set the capacity pool paying for the workload.
    pub fn with_pool_id(mut self, pool_id: i64) -> Self {
        self.workload.info_mut().pool_id = pool_id;
        self
    }

    /// Set the id of the workload within its reservation.
    pub fn with_workload_id(mut self, workload_id: i64) -> Self {
        self.workload.info_mut().workload_id = workload_id;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: String) -> Self {
        self.workload.info_mut().description = description;
        self
    }

    /// Set the metadata.
    pub fn with_metadata(mut self, metadata: String) -> Self {
        self.workload.info_mut().metadata = metadata;
        self
    }

    /// Set the reference.
    pub fn with_reference(mut self, reference: String) -> Self {
        self.workload.info_mut().reference = reference;
        self
    }

    /// Set the provisioning deadline of the workload.
    pub fn with_expiration_provisioning(mut self, expiration: Date) -> Self {
        self.workload.info_mut().expiration_provisioning = expiration;
        self
    }

    /// Validate the workload, encrypt its secrets for the node and stamp the epoch.
    ///
    /// Nothing is returned if any of these steps fail, in particular a workload is never
    /// returned with only part of its secrets encrypted.
    pub fn build(mut self, encryptor: &dyn SecretEncryptor) -> ProvisionResult<W> {
        let info = self.workload.info();
        if info.node_id.is_empty() {
            return Err(ValidationError::from("node id cannot be empty").into());
        }
        if info.id != 0 {
            return Err(ValidationError::from(format!(
                "workload already has id {}, ids are assigned by the explorer",
                info.id
            ))
            .into());
        }
        self.workload.validate()?;
        self.workload
            .rsu()
            .map_err(|e| ValidationError::from(e.to_string()))?;

        self.workload.encrypt_secrets(encryptor)?;
        self.workload.info_mut().epoch = Date::now();

        debug!(
            "built {} workload for node {}",
            self.workload.workload_type(),
            self.workload.info().node_id
        );

        Ok(self.workload)
    }
}

fn rebuild<W: Buildable>(workload: W, encryptor: &dyn SecretEncryptor) -> ProvisionResult<Workload> {
    WorkloadBuilder::from_workload(workload)
        .build(encryptor)
        .map(Into::into)
}

/// Build a staged workload of any type.
pub fn build_workload(
    workload: Workload,
    encryptor: &dyn SecretEncryptor,
) -> ProvisionResult<Workload> {
    match workload {
        Workload::Container(w) => rebuild(w, encryptor),
        Workload::Volume(w) => rebuild(w, encryptor),
        Workload::Zdb(w) => rebuild(w, encryptor),
        Workload::Kubernetes(w) => rebuild(w, encryptor),
        Workload::VirtualMachine(w) => rebuild(w, encryptor),
        Workload::Qemu(w) => rebuild(w, encryptor),
        Workload::Proxy(w) => rebuild(w, encryptor),
        Workload::ReverseProxy(w) => rebuild(w, encryptor),
        Workload::Subdomain(w) => rebuild(w, encryptor),
        Workload::DomainDelegate(w) => rebuild(w, encryptor),
        Workload::Gateway4To6(w) => rebuild(w, encryptor),
        Workload::NetworkResource(w) => rebuild(w, encryptor),
        Workload::PublicIp(w) => rebuild(w, encryptor),
        Workload::Debug(w) => rebuild(w, encryptor),
    }
}

impl Buildable for DebugWorkload {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl DebugBuilder {
    /// Request diagnostics from a node.
    pub fn new(node_id: String, sysdiag: bool) -> Self {
        WorkloadBuilder {
            workload: DebugWorkload {
                info: ReservationInfo::new(WorkloadType::Debug, node_id),
                sysdiag,
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::encryption::{SecretEncryptor, SecretError, SecretErrorKind, SecretResult};
    use std::cell::Cell;

    /// Encryptor which wraps plaintexts in a recognizable way, and can be told to fail.
    #[derive(Default)]
    pub struct FakeEncryptor {
        pub fail_on: Option<String>,
        pub calls: Cell<usize>,
    }

    impl SecretEncryptor for FakeEncryptor {
        fn encrypt_secret(&self, plaintext: &str, node_id: &str) -> SecretResult<String> {
            self.calls.set(self.calls.get() + 1);
            if plaintext.is_empty() {
                return Ok(String::new());
            }
            if self.fail_on.as_deref() == Some(plaintext) {
                return Err(SecretError::new(
                    SecretErrorKind::Encrypt,
                    node_id,
                    "cipher failure".to_string(),
                ));
            }
            Ok(format!("enc({})", plaintext))
        }
    }
}
