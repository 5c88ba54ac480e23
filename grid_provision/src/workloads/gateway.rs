use super::{ReservationInfo, WorkloadDescriptor};
use crate::capacity::{Rsu, UnsupportedSizeError};
use crate::signing::Challenge;
use serde::{Deserialize, Serialize};

/// A TCP proxy on a gateway, forwarding a domain to an address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayProxy {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// Domain served by the gateway.
    pub domain: String,
    /// Address traffic is forwarded to.
    pub addr: String,
    /// Port plain traffic is forwarded to.
    pub port: u32,
    /// Port TLS traffic is forwarded to.
    pub port_tls: u32,
}

/// A reverse tunnel proxy on a gateway. The backend connects to the gateway using the secret.
///
/// `plain_secret` only lives in memory until the proxy is built. Building encrypts it for the
/// gateway into `secret`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayReverseProxy {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// Domain served by the gateway.
    pub domain: String,
    /// Secret used by the backend to connect, encrypted for the gateway.
    pub secret: String,
    /// Plaintext secret.
    #[serde(skip)]
    pub plain_secret: String,
}

/// A subdomain of the gateway, pointing to a set of addresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySubdomain {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// The subdomain.
    pub domain: String,
    /// Addresses the subdomain resolves to.
    pub ips: Vec<String>,
}

/// A domain delegated to the name servers of a gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayDelegate {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// The delegated domain.
    pub domain: String,
}

/// An IPv4 to IPv6 wireguard tunnel on a gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gateway4To6 {
    /// The shared workload envelope.
    #[serde(flatten)]
    pub info: ReservationInfo,
    /// Wireguard public key of the client.
    pub public_key: String,
}

macro_rules! gateway_descriptor {
    ($ty:ty, |$w:ident, $c:ident| $encode:block) => {
        impl WorkloadDescriptor for $ty {
            fn info(&self) -> &ReservationInfo {
                &self.info
            }

            fn info_mut(&mut self) -> &mut ReservationInfo {
                &mut self.info
            }

            // gateways don't consume capacity of the pool
            fn rsu(&self) -> Result<Rsu, UnsupportedSizeError> {
                Ok(Rsu::default())
            }

            fn encode_challenge(&self, $c: &mut Challenge) {
                let $w = self;
                $encode
            }
        }
    };
}

gateway_descriptor!(GatewayProxy, |w, c| {
    c.push(&w.domain)
        .push(&w.addr)
        .push(w.port)
        .push(w.port_tls);
});

gateway_descriptor!(GatewayReverseProxy, |w, c| {
    c.push(&w.domain).push(&w.secret);
});

gateway_descriptor!(GatewaySubdomain, |w, c| {
    c.push(&w.domain).push_all(&w.ips);
});

gateway_descriptor!(GatewayDelegate, |w, c| {
    c.push(&w.domain);
});

gateway_descriptor!(Gateway4To6, |w, c| {
    c.push(&w.public_key);
});

#[cfg(test)]
mod tests {
    use super::{
        Gateway4To6, GatewayDelegate, GatewayProxy, GatewayReverseProxy, GatewaySubdomain,
    };
    use crate::capacity::Rsu;
    use crate::workloads::test_util::{assert_signed_fields, assert_unsigned_envelope_fields};
    use crate::workloads::WorkloadDescriptor;

    #[test]
    fn proxy_challenge_fields() {
        let p = GatewayProxy {
            domain: "app.grid.tf".to_string(),
            addr: "10.0.0.1".to_string(),
            port: 80,
            port_tls: 443,
            ..Default::default()
        };
        assert_signed_fields(
            &p,
            &[
                ("domain", |w: &mut GatewayProxy| w.domain.push_str(".com")),
                ("addr", |w: &mut GatewayProxy| w.addr = "10.0.0.2".to_string()),
                ("port", |w: &mut GatewayProxy| w.port = 8080),
                ("port_tls", |w: &mut GatewayProxy| w.port_tls = 8443),
            ],
        );
        assert_unsigned_envelope_fields(&p);
    }

    #[test]
    fn reverse_proxy_challenge_fields() {
        let rp = GatewayReverseProxy {
            domain: "app.grid.tf".to_string(),
            secret: "enc(tunnel)".to_string(),
            ..Default::default()
        };
        assert!(String::from_utf8(rp.signature_challenge())
            .unwrap()
            .ends_with("app.grid.tfenc(tunnel)"));
        assert_signed_fields(
            &rp,
            &[
                ("domain", |w: &mut GatewayReverseProxy| w.domain.push_str(".com")),
                ("secret", |w: &mut GatewayReverseProxy| {
                    w.secret = "enc(other)".to_string()
                }),
            ],
        );
        assert_unsigned_envelope_fields(&rp);

        // only the encrypted secret is signed
        let mut plain = rp.clone();
        plain.plain_secret = "tunnel".to_string();
        assert_eq!(rp.signature_challenge(), plain.signature_challenge());
    }

    #[test]
    fn subdomain_challenge_fields() {
        let s = GatewaySubdomain {
            domain: "app.grid.tf".to_string(),
            ips: vec!["1.1.1.1".to_string(), "2.2.2.2".to_string()],
            ..Default::default()
        };
        assert_signed_fields(
            &s,
            &[
                ("domain", |w: &mut GatewaySubdomain| w.domain.push_str(".com")),
                ("ips", |w: &mut GatewaySubdomain| w.ips.reverse()),
            ],
        );
        assert_unsigned_envelope_fields(&s);
    }

    #[test]
    fn delegate_challenge_fields() {
        let d = GatewayDelegate {
            domain: "grid.tf".to_string(),
            ..Default::default()
        };
        assert_signed_fields(
            &d,
            &[("domain", |w: &mut GatewayDelegate| {
                w.domain = "grid.com".to_string()
            })],
        );
        assert_unsigned_envelope_fields(&d);
    }

    #[test]
    fn gateway_4to6_challenge_fields() {
        let t = Gateway4To6 {
            public_key: "pk".to_string(),
            ..Default::default()
        };
        assert!(String::from_utf8(t.signature_challenge())
            .unwrap()
            .ends_with("pk"));
        assert_signed_fields(
            &t,
            &[("public_key", |w: &mut Gateway4To6| w.public_key.push('2'))],
        );
        assert_unsigned_envelope_fields(&t);
    }

    #[test]
    fn proxy_challenge() {
        let p = GatewayProxy {
            domain: "app.grid.tf".to_string(),
            addr: "10.0.0.1".to_string(),
            port: 80,
            port_tls: 443,
            ..Default::default()
        };
        let challenge = String::from_utf8(p.signature_challenge()).unwrap();
        assert!(challenge.ends_with("app.grid.tf10.0.0.180443"));
        assert_eq!(p.rsu().unwrap(), Rsu::default());
    }

    #[test]
    fn subdomain_ips_are_signed() {
        let s = GatewaySubdomain {
            domain: "app.grid.tf".to_string(),
            ips: vec!["1.1.1.1".to_string()],
            ..Default::default()
        };
        let mut other = s.clone();
        other.ips.push("2.2.2.2".to_string());
        assert_ne!(s.signature_challenge(), other.signature_challenge());
    }
}
