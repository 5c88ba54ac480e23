use super::{Buildable, ValidationError, WorkloadBuilder};
use crate::encryption::{SecretEncryptor, SecretResult};
use crate::workloads::{
    Gateway4To6, GatewayDelegate, GatewayProxy, GatewayReverseProxy, GatewaySubdomain,
    ReservationInfo, WorkloadType,
};

/// Builds a [`GatewayProxy`].
pub type GatewayProxyBuilder = WorkloadBuilder<GatewayProxy>;
/// Builds a [`GatewayReverseProxy`].
pub type GatewayReverseProxyBuilder = WorkloadBuilder<GatewayReverseProxy>;
/// Builds a [`GatewaySubdomain`].
pub type GatewaySubdomainBuilder = WorkloadBuilder<GatewaySubdomain>;
/// Builds a [`GatewayDelegate`].
pub type GatewayDelegateBuilder = WorkloadBuilder<GatewayDelegate>;
/// Builds a [`Gateway4To6`] tunnel.
pub type Gateway4To6Builder = WorkloadBuilder<Gateway4To6>;

fn require_domain(domain: &str) -> Result<(), ValidationError> {
    if domain.is_empty() {
        return Err("gateway domain cannot be empty".into());
    }
    Ok(())
}

impl Buildable for GatewayProxy {
    fn validate(&self) -> Result<(), ValidationError> {
        require_domain(&self.domain)?;
        if self.addr.is_empty() {
            return Err("proxy needs an address to forward to".into());
        }
        Ok(())
    }
}

impl Buildable for GatewayReverseProxy {
    fn validate(&self) -> Result<(), ValidationError> {
        require_domain(&self.domain)
    }

    fn encrypt_secrets(&mut self, encryptor: &dyn SecretEncryptor) -> SecretResult<()> {
        if self.plain_secret.is_empty() {
            return Ok(());
        }
        self.secret = encryptor
            .encrypt_secret(&self.plain_secret, &self.info.node_id)
            .map_err(|e| e.with_subject("reverse proxy secret".to_string()))?;
        self.plain_secret.clear();
        Ok(())
    }
}

impl Buildable for GatewaySubdomain {
    fn validate(&self) -> Result<(), ValidationError> {
        require_domain(&self.domain)?;
        if self.ips.is_empty() {
            return Err("subdomain needs at least 1 address".into());
        }
        Ok(())
    }
}

impl Buildable for GatewayDelegate {
    fn validate(&self) -> Result<(), ValidationError> {
        require_domain(&self.domain)
    }
}

impl Buildable for Gateway4To6 {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.public_key.is_empty() {
            return Err("4to6 tunnel needs a wireguard public key".into());
        }
        Ok(())
    }
}

impl GatewayProxyBuilder {
    /// Forward `domain` on the gateway to `addr`.
    pub fn new(node_id: String, domain: String, addr: String, port: u32, port_tls: u32) -> Self {
        WorkloadBuilder::from_workload(GatewayProxy {
            info: ReservationInfo::new(WorkloadType::Proxy, node_id),
            domain,
            addr,
            port,
            port_tls,
        })
    }
}

impl GatewayReverseProxyBuilder {
    /// Serve `domain` through a tunnel opened with `secret`. The secret is encrypted for the
    /// gateway on build.
    pub fn new(node_id: String, domain: String, secret: String) -> Self {
        WorkloadBuilder::from_workload(GatewayReverseProxy {
            info: ReservationInfo::new(WorkloadType::ReverseProxy, node_id),
            domain,
            plain_secret: secret,
            ..Default::default()
        })
    }
}

impl GatewaySubdomainBuilder {
    /// Point a subdomain of the gateway at `ips`.
    pub fn new(node_id: String, domain: String, ips: Vec<String>) -> Self {
        WorkloadBuilder::from_workload(GatewaySubdomain {
            info: ReservationInfo::new(WorkloadType::Subdomain, node_id),
            domain,
            ips,
        })
    }
}

impl GatewayDelegateBuilder {
    /// Delegate `domain` to the gateway.
    pub fn new(node_id: String, domain: String) -> Self {
        WorkloadBuilder::from_workload(GatewayDelegate {
            info: ReservationInfo::new(WorkloadType::DomainDelegate, node_id),
            domain,
        })
    }
}

impl Gateway4To6Builder {
    /// Open a tunnel for the client with the given wireguard key.
    pub fn new(node_id: String, public_key: String) -> Self {
        WorkloadBuilder::from_workload(Gateway4To6 {
            info: ReservationInfo::new(WorkloadType::Gateway4To6, node_id),
            public_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::test_util::FakeEncryptor;

    #[test]
    fn domains_are_required() {
        let enc = FakeEncryptor::default();
        let node = || "gw1".to_string();
        assert!(GatewayDelegateBuilder::new(node(), String::new())
            .build(&enc)
            .is_err());
        assert!(
            GatewaySubdomainBuilder::new(node(), String::new(), vec!["1.1.1.1".to_string()])
                .build(&enc)
                .is_err()
        );
        assert!(GatewaySubdomainBuilder::new(node(), "app".to_string(), vec![])
            .build(&enc)
            .is_err());
        assert!(
            GatewayProxyBuilder::new(node(), "a.grid.tf".to_string(), String::new(), 80, 443)
                .build(&enc)
                .is_err()
        );
        assert!(Gateway4To6Builder::new(node(), String::new())
            .build(&enc)
            .is_err());
        assert!(Gateway4To6Builder::new(node(), "pk".to_string())
            .build(&enc)
            .is_ok());
    }

    #[test]
    fn reverse_proxy_secret_is_encrypted() {
        let enc = FakeEncryptor::default();
        let rp = GatewayReverseProxyBuilder::new(
            "gw1".to_string(),
            "app.grid.tf".to_string(),
            "tunnel".to_string(),
        )
        .build(&enc)
        .unwrap();
        assert_eq!(rp.secret, "enc(tunnel)");
        assert!(rp.plain_secret.is_empty());
        assert_eq!(enc.calls.get(), 1);

        // building again keeps the ciphertext as is
        let rebuilt = GatewayReverseProxyBuilder::from_workload(rp)
            .build(&enc)
            .unwrap();
        assert_eq!(rebuilt.secret, "enc(tunnel)");
        assert_eq!(enc.calls.get(), 1);
    }
}
