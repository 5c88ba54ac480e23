use crate::capacity::{Rsu, UnsupportedSizeError};
use crate::signing::Challenge;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt;
use std::str::FromStr;

mod container;
mod debug;
mod gateway;
mod info;
mod k8s;
mod network;
mod public_ip;
mod qemu;
mod vm;
mod volume;
mod zdb;

pub use container::{Container, ContainerCapacity, ContainerMount, NetworkConnection};
pub use debug::DebugWorkload;
pub use gateway::{
    Gateway4To6, GatewayDelegate, GatewayProxy, GatewayReverseProxy, GatewaySubdomain,
};
pub use info::{ReservationInfo, ResultState, WorkloadResult};
pub use k8s::K8s;
pub use network::{NetworkResource, WireguardPeer};
pub use public_ip::PublicIp;
pub use qemu::{Qemu, QemuCapacity};
pub use vm::VirtualMachine;
pub use volume::Volume;
pub use zdb::{Zdb, ZdbMode};

/// The type tag of a workload, as it is known on the explorer.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
pub enum WorkloadType {
    /// A 0-db namespace.
    #[default]
    Zdb = 0,
    /// A container running an flist.
    Container = 1,
    /// A block volume.
    Volume = 2,
    /// Legacy network definition, superseded by network resources.
    Network = 3,
    /// A kubernetes node.
    Kubernetes = 4,
    /// A TCP proxy on a gateway.
    Proxy = 5,
    /// A reverse tunnel proxy on a gateway.
    ReverseProxy = 6,
    /// A subdomain managed by a gateway.
    Subdomain = 7,
    /// A domain delegated to a gateway.
    DomainDelegate = 8,
    /// An IPv4 to IPv6 tunnel on a gateway.
    Gateway4To6 = 9,
    /// The part of a network living on a single node.
    NetworkResource = 10,
    /// A public IPv4 address.
    PublicIp = 11,
    /// A virtual machine running a grid image.
    VirtualMachine = 12,
    /// A virtual machine running an arbitrary image.
    Qemu = 13,
    /// A diagnostics request towards a node.
    Debug = 14,
}

impl WorkloadType {
    /// The lowercase name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            WorkloadType::Zdb => "zdb",
            WorkloadType::Container => "container",
            WorkloadType::Volume => "volume",
            WorkloadType::Network => "network",
            WorkloadType::Kubernetes => "kubernetes",
            WorkloadType::Proxy => "proxy",
            WorkloadType::ReverseProxy => "reverse_proxy",
            WorkloadType::Subdomain => "subdomain",
            WorkloadType::DomainDelegate => "domain_delegate",
            WorkloadType::Gateway4To6 => "gateway4to6",
            WorkloadType::NetworkResource => "network_resource",
            WorkloadType::PublicIp => "public_ip",
            WorkloadType::VirtualMachine => "virtual_machine",
            WorkloadType::Qemu => "qemu",
            WorkloadType::Debug => "debug",
        }
    }
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Disk medium backing a storage workload.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
pub enum DiskType {
    /// Spinning disks.
    #[default]
    Hdd = 0,
    /// Solid state disks.
    Ssd = 1,
}

impl DiskType {
    /// Split a size in GiB into (sru, hru) according to the disk type.
    pub(crate) fn split(&self, size: f64) -> (f64, f64) {
        match self {
            DiskType::Ssd => (size, 0.),
            DiskType::Hdd => (0., size),
        }
    }
}

impl fmt::Display for DiskType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            DiskType::Hdd => "hdd",
            DiskType::Ssd => "ssd",
        })
    }
}

impl FromStr for DiskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hdd" => Ok(DiskType::Hdd),
            "ssd" => Ok(DiskType::Ssd),
            other => Err(format!("unknown disk type {}", other)),
        }
    }
}

/// Capabilities shared by every workload variant.
pub trait WorkloadDescriptor {
    /// The envelope shared by all workloads.
    fn info(&self) -> &ReservationInfo;

    /// Mutable access to the envelope.
    fn info_mut(&mut self) -> &mut ReservationInfo;

    /// The resources this workload consumes on its node. Fails for unknown size tiers.
    fn rsu(&self) -> Result<Rsu, UnsupportedSizeError>;

    /// Append the type specific fields to the challenge.
    fn encode_challenge(&self, challenge: &mut Challenge);

    /// The type of the workload.
    fn workload_type(&self) -> WorkloadType {
        self.info().workload_type
    }

    /// The bytes which are signed to authorize this workload: the envelope challenge, followed by
    /// the type specific fields.
    fn signature_challenge(&self) -> Vec<u8> {
        let mut challenge = self.info().signature_challenge();
        self.encode_challenge(&mut challenge);
        challenge.into_bytes()
    }
}

/// Any workload which can be part of a reservation.
#[derive(Debug, Clone, PartialEq)]
pub enum Workload {
    /// See [`Container`].
    Container(Container),
    /// See [`Volume`].
    Volume(Volume),
    /// See [`Zdb`].
    Zdb(Zdb),
    /// See [`K8s`].
    Kubernetes(K8s),
    /// See [`VirtualMachine`].
    VirtualMachine(VirtualMachine),
    /// See [`Qemu`].
    Qemu(Qemu),
    /// See [`GatewayProxy`].
    Proxy(GatewayProxy),
    /// See [`GatewayReverseProxy`].
    ReverseProxy(GatewayReverseProxy),
    /// See [`GatewaySubdomain`].
    Subdomain(GatewaySubdomain),
    /// See [`GatewayDelegate`].
    DomainDelegate(GatewayDelegate),
    /// See [`Gateway4To6`].
    Gateway4To6(Gateway4To6),
    /// See [`NetworkResource`].
    NetworkResource(NetworkResource),
    /// See [`PublicIp`].
    PublicIp(PublicIp),
    /// See [`DebugWorkload`].
    Debug(DebugWorkload),
}

impl Workload {
    /// Access the variant through its shared capabilities.
    pub fn descriptor(&self) -> &dyn WorkloadDescriptor {
        match self {
            Workload::Container(w) => w,
            Workload::Volume(w) => w,
            Workload::Zdb(w) => w,
            Workload::Kubernetes(w) => w,
            Workload::VirtualMachine(w) => w,
            Workload::Qemu(w) => w,
            Workload::Proxy(w) => w,
            Workload::ReverseProxy(w) => w,
            Workload::Subdomain(w) => w,
            Workload::DomainDelegate(w) => w,
            Workload::Gateway4To6(w) => w,
            Workload::NetworkResource(w) => w,
            Workload::PublicIp(w) => w,
            Workload::Debug(w) => w,
        }
    }

    /// Mutable access to the variant through its shared capabilities.
    pub fn descriptor_mut(&mut self) -> &mut dyn WorkloadDescriptor {
        match self {
            Workload::Container(w) => w,
            Workload::Volume(w) => w,
            Workload::Zdb(w) => w,
            Workload::Kubernetes(w) => w,
            Workload::VirtualMachine(w) => w,
            Workload::Qemu(w) => w,
            Workload::Proxy(w) => w,
            Workload::ReverseProxy(w) => w,
            Workload::Subdomain(w) => w,
            Workload::DomainDelegate(w) => w,
            Workload::Gateway4To6(w) => w,
            Workload::NetworkResource(w) => w,
            Workload::PublicIp(w) => w,
            Workload::Debug(w) => w,
        }
    }

    /// The envelope of the workload.
    pub fn info(&self) -> &ReservationInfo {
        self.descriptor().info()
    }

    /// The type of the workload.
    pub fn workload_type(&self) -> WorkloadType {
        self.descriptor().workload_type()
    }

    /// See [`WorkloadDescriptor::rsu`].
    pub fn rsu(&self) -> Result<Rsu, UnsupportedSizeError> {
        self.descriptor().rsu()
    }

    /// See [`WorkloadDescriptor::signature_challenge`].
    pub fn signature_challenge(&self) -> Vec<u8> {
        self.descriptor().signature_challenge()
    }
}

impl Serialize for Workload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Workload::Container(w) => w.serialize(serializer),
            Workload::Volume(w) => w.serialize(serializer),
            Workload::Zdb(w) => w.serialize(serializer),
            Workload::Kubernetes(w) => w.serialize(serializer),
            Workload::VirtualMachine(w) => w.serialize(serializer),
            Workload::Qemu(w) => w.serialize(serializer),
            Workload::Proxy(w) => w.serialize(serializer),
            Workload::ReverseProxy(w) => w.serialize(serializer),
            Workload::Subdomain(w) => w.serialize(serializer),
            Workload::DomainDelegate(w) => w.serialize(serializer),
            Workload::Gateway4To6(w) => w.serialize(serializer),
            Workload::NetworkResource(w) => w.serialize(serializer),
            Workload::PublicIp(w) => w.serialize(serializer),
            Workload::Debug(w) => w.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Workload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let tag = value
            .get("workload_type")
            .cloned()
            .ok_or_else(|| de::Error::missing_field("workload_type"))?;
        let workload_type: WorkloadType = serde_json::from_value(tag).map_err(de::Error::custom)?;

        let workload = match workload_type {
            WorkloadType::Container => serde_json::from_value(value).map(Workload::Container),
            WorkloadType::Volume => serde_json::from_value(value).map(Workload::Volume),
            WorkloadType::Zdb => serde_json::from_value(value).map(Workload::Zdb),
            WorkloadType::Kubernetes => serde_json::from_value(value).map(Workload::Kubernetes),
            WorkloadType::VirtualMachine => {
                serde_json::from_value(value).map(Workload::VirtualMachine)
            }
            WorkloadType::Qemu => serde_json::from_value(value).map(Workload::Qemu),
            WorkloadType::Proxy => serde_json::from_value(value).map(Workload::Proxy),
            WorkloadType::ReverseProxy => serde_json::from_value(value).map(Workload::ReverseProxy),
            WorkloadType::Subdomain => serde_json::from_value(value).map(Workload::Subdomain),
            WorkloadType::DomainDelegate => {
                serde_json::from_value(value).map(Workload::DomainDelegate)
            }
            WorkloadType::Gateway4To6 => serde_json::from_value(value).map(Workload::Gateway4To6),
            WorkloadType::NetworkResource => {
                serde_json::from_value(value).map(Workload::NetworkResource)
            }
            WorkloadType::PublicIp => serde_json::from_value(value).map(Workload::PublicIp),
            WorkloadType::Debug => serde_json::from_value(value).map(Workload::Debug),
            WorkloadType::Network => {
                return Err(de::Error::custom(
                    "legacy network workloads are not supported, use network resources",
                ))
            }
        };

        workload.map_err(de::Error::custom)
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Workload {
                fn from(w: $ty) -> Self {
                    Workload::$variant(w)
                }
            }
        )*
    };
}

impl_from_variant!(
    Container(Container),
    Volume(Volume),
    Zdb(Zdb),
    Kubernetes(K8s),
    VirtualMachine(VirtualMachine),
    Qemu(Qemu),
    Proxy(GatewayProxy),
    ReverseProxy(GatewayReverseProxy),
    Subdomain(GatewaySubdomain),
    DomainDelegate(GatewayDelegate),
    Gateway4To6(Gateway4To6),
    NetworkResource(NetworkResource),
    PublicIp(PublicIp),
    Debug(DebugWorkload),
);


#[cfg(test)]
mod tests {
    use super::{DiskType, Volume, Workload, WorkloadType};

    #[test]
    fn workload_type_wire_values() {
        assert_eq!(serde_json::to_string(&WorkloadType::Zdb).unwrap(), "0");
        assert_eq!(serde_json::to_string(&WorkloadType::Kubernetes).unwrap(), "4");
        assert_eq!(
            serde_json::to_string(&WorkloadType::NetworkResource).unwrap(),
            "10"
        );
        assert_eq!(WorkloadType::ReverseProxy.to_string(), "reverse_proxy");
        assert_eq!("ssd".parse::<DiskType>().unwrap(), DiskType::Ssd);
        assert!("nvme".parse::<DiskType>().is_err());
    }

    #[test]
    fn tagged_decoding() {
        let mut volume = Volume::default();
        volume.info.workload_type = WorkloadType::Volume;
        volume.info.node_id = "node1".to_string();
        volume.size = 10;
        volume.volume_type = DiskType::Ssd;

        let encoded = serde_json::to_string(&Workload::Volume(volume.clone())).unwrap();
        let decoded: Workload = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, Workload::Volume(volume));
    }

    #[test]
    fn untagged_and_legacy_decoding_fails() {
        assert!(serde_json::from_str::<Workload>(r#"{"node_id": "node1"}"#).is_err());
        assert!(serde_json::from_str::<Workload>(r#"{"workload_type": 3}"#).is_err());
        assert!(serde_json::from_str::<Workload>(r#"{"workload_type": 99}"#).is_err());
    }
}
