use super::{Buildable, ValidationError, WorkloadBuilder};
use crate::encryption::{SecretEncryptor, SecretResult};
use crate::workloads::{
    Container, ContainerCapacity, ContainerMount, NetworkConnection, ReservationInfo, WorkloadType,
};
use std::collections::BTreeMap;

/// Hub flists are downloaded from, unless another one is set.
pub const DEFAULT_HUB_URL: &str = "https://hub.grid.tf/";

/// Builds a [`Container`].
pub type ContainerBuilder = WorkloadBuilder<Container>;

impl Buildable for Container {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.flist.is_empty() {
            return Err("flist cannot be empty".into());
        }
        if self.capacity.cpu == 0 {
            return Err("container needs at least 1 cpu".into());
        }
        if self.capacity.memory == 0 {
            return Err("container needs memory".into());
        }
        Ok(())
    }

    fn encrypt_secrets(&mut self, encryptor: &dyn SecretEncryptor) -> SecretResult<()> {
        let encrypted = encryptor.encrypt_map(&self.environment, &self.info.node_id)?;
        self.secret_environment.extend(encrypted);
        self.environment.clear();
        Ok(())
    }
}

impl ContainerBuilder {
    /// Start building a container running `flist` on a node.
    pub fn new(node_id: String, flist: String, capacity: ContainerCapacity) -> Self {
        WorkloadBuilder::from_workload(Container {
            info: ReservationInfo::new(WorkloadType::Container, node_id),
            flist,
            hub_url: DEFAULT_HUB_URL.to_string(),
            capacity,
            ..Default::default()
        })
    }

    /// Set the flist.
    pub fn with_flist(mut self, flist: String) -> Self {
        self.workload.flist = flist;
        self
    }

    /// Set the hub the flist is downloaded from.
    pub fn with_hub_url(mut self, hub_url: String) -> Self {
        self.workload.hub_url = hub_url;
        self
    }

    /// Set the capacity.
    pub fn with_capacity(mut self, capacity: ContainerCapacity) -> Self {
        self.workload.capacity = capacity;
        self
    }

    /// Set the entrypoint.
    pub fn with_entrypoint(mut self, entrypoint: String) -> Self {
        self.workload.entrypoint = entrypoint;
        self
    }

    /// Run the container in interactive mode.
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.workload.interactive = interactive;
        self
    }

    /// Add an environment variable. All variables are encrypted for the node on build.
    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.workload.environment.insert(key, value);
        self
    }

    /// Add environment variables in `key=value` form.
    pub fn with_envs(mut self, envs: &[String]) -> Result<Self, ValidationError> {
        let parsed = split_envs(envs)?;
        self.workload.environment.extend(parsed);
        Ok(self)
    }

    /// Mount volumes, given in `volume_id:mountpoint` form.
    pub fn with_mounts(mut self, mounts: &[String]) -> Result<Self, ValidationError> {
        for mount in mounts {
            let (volume_id, mountpoint) = mount.split_once(':').ok_or_else(|| {
                ValidationError::from(format!(
                    "mount '{}' is not in volume_id:mountpoint form",
                    mount
                ))
            })?;
            if volume_id.is_empty() || !mountpoint.starts_with('/') {
                return Err(format!("mount '{}' needs a volume and an absolute path", mount).into());
            }
            self.workload.volumes.push(ContainerMount {
                volume_id: volume_id.to_string(),
                mountpoint: mountpoint.to_string(),
            });
        }
        Ok(self)
    }

    /// Connect the container to a network.
    pub fn with_network_connection(mut self, connection: NetworkConnection) -> Self {
        self.workload.network_connection.push(connection);
        self
    }
}

fn split_envs(envs: &[String]) -> Result<BTreeMap<String, String>, ValidationError> {
    let mut parsed = BTreeMap::new();
    for env in envs {
        match env.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                parsed.insert(key.to_string(), value.to_string());
            }
            // never echo the value, it might be a secret
            _ => {
                return Err(format!(
                    "environment variable '{}' is not in key=value form",
                    env.split('=').next().unwrap_or_default()
                )
                .into())
            }
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::{ContainerBuilder, DEFAULT_HUB_URL};
    use crate::builders::test_util::FakeEncryptor;
    use crate::workloads::{ContainerCapacity, NetworkConnection};
    use crate::ProvisionErrorKind;

    fn builder() -> ContainerBuilder {
        ContainerBuilder::new(
            "node1".to_string(),
            "https://hub.grid.tf/tf-official-apps/ubuntu.flist".to_string(),
            ContainerCapacity::default(),
        )
    }

    #[test]
    fn defaults() {
        let c = builder().workload().clone();
        assert_eq!(c.hub_url, DEFAULT_HUB_URL);
        assert_eq!(c.capacity.cpu, 1);
        assert_eq!(c.capacity.memory, 1024);
        assert_eq!(c.info.workload_id, 1);
        assert_eq!(c.info.id, 0);
    }

    #[test]
    fn empty_flist_is_rejected() {
        let err = builder()
            .with_flist(String::new())
            .build(&FakeEncryptor::default())
            .unwrap_err();
        assert_eq!(err.kind(), &ProvisionErrorKind::Validation);
    }

    #[test]
    fn environment_is_encrypted() {
        let c = builder()
            .with_envs(&["FOO=bar".to_string(), "EMPTY=".to_string()])
            .unwrap()
            .with_network_connection(NetworkConnection {
                network_id: "net".to_string(),
                ipaddress: "10.1.1.2".parse().unwrap(),
                public_ip6: false,
                yggdrasil_ip: false,
            })
            .build(&FakeEncryptor::default())
            .unwrap();

        assert!(c.environment.is_empty());
        assert_eq!(c.secret_environment["FOO"], "enc(bar)");
        assert_eq!(c.secret_environment["EMPTY"], "");
    }

    #[test]
    fn failed_encryption_names_key_not_value() {
        let enc = FakeEncryptor {
            fail_on: Some("s3cr3t".to_string()),
            ..Default::default()
        };
        let err = builder()
            .with_env("PASSWORD".to_string(), "s3cr3t".to_string())
            .build(&enc)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("PASSWORD"));
        assert!(!msg.contains("s3cr3t"));
    }

    #[test]
    fn malformed_input() {
        assert!(builder().with_envs(&["novalue".to_string()]).is_err());
        assert!(builder().with_envs(&["=x".to_string()]).is_err());
        assert!(builder().with_mounts(&["vol1".to_string()]).is_err());
        assert!(builder().with_mounts(&["vol1:relative".to_string()]).is_err());
        let c = builder()
            .with_mounts(&["12-1:/data".to_string()])
            .unwrap()
            .workload()
            .clone();
        assert_eq!(c.volumes[0].mountpoint, "/data");
    }

    #[test]
    fn clones_do_not_share_state() {
        let base = builder();
        let a = base
            .clone()
            .with_env("A".to_string(), "1".to_string())
            .build(&FakeEncryptor::default())
            .unwrap();
        let b = base.build(&FakeEncryptor::default()).unwrap();
        assert_eq!(a.secret_environment.len(), 1);
        assert!(b.secret_environment.is_empty());
    }
}
