use crate::identity::{Identity, PUBLIC_KEY_LENGTH};
use log::trace;
use sodiumoxide::crypto::{box_, sealedbox};
use std::collections::BTreeMap;
use std::convert::TryInto;
use std::fmt;

/// Result type for secret encryption and decryption operations
pub type SecretResult<T> = Result<T, SecretError>;

/// Resolves the ed25519 public key of a node from its id.
pub trait KeyResolver {
    /// Get the raw public key of the node with the given id.
    fn public_key(&self, node_id: &str) -> SecretResult<[u8; PUBLIC_KEY_LENGTH]>;
}

/// A [`KeyResolver`] which decodes the key from the node id itself. Node ids on the grid are the
/// base58 encoded ed25519 public keys of the nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeIdKeyResolver;

impl KeyResolver for NodeIdKeyResolver {
    fn public_key(&self, node_id: &str) -> SecretResult<[u8; PUBLIC_KEY_LENGTH]> {
        let raw = multibase::Base::Base58Btc.decode(node_id).map_err(|e| {
            SecretError::key_resolution(node_id, format!("node id is not base58: {}", e))
        })?;
        let key: [u8; PUBLIC_KEY_LENGTH] = raw.try_into().map_err(|raw: Vec<u8>| {
            SecretError::key_resolution(
                node_id,
                format!(
                    "decoded key has length {}, expected {}",
                    raw.len(),
                    PUBLIC_KEY_LENGTH
                ),
            )
        })?;
        ed25519_dalek::PublicKey::from_bytes(&key).map_err(|e| {
            SecretError::key_resolution(node_id, format!("not an ed25519 key: {}", e))
        })?;
        Ok(key)
    }
}

/// Encrypts secrets so only a specific node can read them.
pub trait SecretEncryptor {
    /// Encrypt a plaintext for the node with the given id. The ciphertext is hex encoded. An
    /// empty plaintext produces an empty ciphertext.
    fn encrypt_secret(&self, plaintext: &str, node_id: &str) -> SecretResult<String>;

    /// Encrypt every value of a map. Either all values are encrypted, or an error is returned
    /// naming the key which failed.
    fn encrypt_map(
        &self,
        values: &BTreeMap<String, String>,
        node_id: &str,
    ) -> SecretResult<BTreeMap<String, String>> {
        let mut encrypted = BTreeMap::new();
        for (key, value) in values {
            let ciphertext = self
                .encrypt_secret(value, node_id)
                .map_err(|e| e.with_subject(format!("key '{}'", key)))?;
            encrypted.insert(key.clone(), ciphertext);
        }
        Ok(encrypted)
    }
}

/// Secret encryption using libsodium sealed boxes. The ed25519 key of the node is converted to
/// its curve25519 counterpart, so a node can open the box with its identity key.
#[derive(Debug, Clone, Default)]
pub struct SealedBoxEncryptor<R> {
    resolver: R,
}

impl SealedBoxEncryptor<NodeIdKeyResolver> {
    /// Create an encryptor which derives node keys from the node ids.
    pub fn new() -> Self {
        Self::with_resolver(NodeIdKeyResolver)
    }
}

impl<R: KeyResolver> SealedBoxEncryptor<R> {
    /// Create an encryptor using a custom key resolver.
    pub fn with_resolver(resolver: R) -> Self {
        SealedBoxEncryptor { resolver }
    }
}

impl<R: KeyResolver> SecretEncryptor for SealedBoxEncryptor<R> {
    fn encrypt_secret(&self, plaintext: &str, node_id: &str) -> SecretResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        init_sodium(node_id)?;

        let key = self.resolver.public_key(node_id)?;
        let curve_key = ed25519_pk_to_curve25519(&key)
            .map_err(|msg| SecretError::key_resolution(node_id, msg))?;
        trace!("sealing {} byte secret for node {}", plaintext.len(), node_id);

        let ciphertext = sealedbox::seal(plaintext.as_bytes(), &box_::PublicKey(curve_key));
        Ok(hex::encode(ciphertext))
    }
}

/// Open a secret encrypted with a [`SealedBoxEncryptor`], using the identity of the node it was
/// encrypted for.
pub fn decrypt_secret(ciphertext: &str, node: &Identity) -> SecretResult<String> {
    if ciphertext.is_empty() {
        return Ok(String::new());
    }
    let node_id = node.node_id();
    init_sodium(&node_id)?;

    let raw = hex::decode(ciphertext).map_err(|e| {
        SecretError::new(
            SecretErrorKind::Decrypt,
            &node_id,
            format!("ciphertext is not hex: {}", e),
        )
    })?;
    let pk = ed25519_pk_to_curve25519(&node.public_key())
        .map_err(|msg| SecretError::key_resolution(&node_id, msg))?;
    let sk = ed25519_sk_to_curve25519(&node.keypair_bytes())
        .map_err(|msg| SecretError::new(SecretErrorKind::Decrypt, &node_id, msg))?;

    let plain = sealedbox::open(&raw, &box_::PublicKey(pk), &box_::SecretKey(sk)).map_err(|_| {
        SecretError::new(
            SecretErrorKind::Decrypt,
            &node_id,
            "sealed box could not be opened".to_string(),
        )
    })?;
    String::from_utf8(plain).map_err(|e| {
        SecretError::new(
            SecretErrorKind::Decrypt,
            &node_id,
            format!("plaintext is not utf-8: {}", e),
        )
    })
}

fn init_sodium(node_id: &str) -> SecretResult<()> {
    sodiumoxide::init().map_err(|_| {
        SecretError::new(
            SecretErrorKind::Encrypt,
            node_id,
            "libsodium could not be initialized".to_string(),
        )
    })
}

fn ed25519_pk_to_curve25519(key: &[u8; PUBLIC_KEY_LENGTH]) -> Result<[u8; 32], String> {
    let mut curve = [0u8; 32];
    // SAFETY: both buffers are exactly 32 bytes as required by libsodium.
    let res = unsafe {
        libsodium_sys::crypto_sign_ed25519_pk_to_curve25519(curve.as_mut_ptr(), key.as_ptr())
    };
    if res != 0 {
        return Err("public key can't be converted to curve25519".to_string());
    }
    Ok(curve)
}

fn ed25519_sk_to_curve25519(keypair: &[u8; 64]) -> Result<[u8; 32], String> {
    let mut curve = [0u8; 32];
    // SAFETY: libsodium reads the 64 byte secret key (seed and public key), writes 32 bytes.
    let res = unsafe {
        libsodium_sys::crypto_sign_ed25519_sk_to_curve25519(curve.as_mut_ptr(), keypair.as_ptr())
    };
    if res != 0 {
        return Err("secret key can't be converted to curve25519".to_string());
    }
    Ok(curve)
}

/// Errors related to encrypting and decrypting secrets
#[derive(Debug)]
pub struct SecretError {
    kind: SecretErrorKind,
    node_id: String,
    subject: Option<String>,
    msg: String,
}

impl SecretError {
    /// Create a new error for the given node. Custom [`SecretEncryptor`] implementations use this
    /// to report their failures.
    pub fn new(kind: SecretErrorKind, node_id: &str, msg: String) -> Self {
        SecretError {
            kind,
            node_id: node_id.to_string(),
            subject: None,
            msg,
        }
    }

    fn key_resolution(node_id: &str, msg: String) -> Self {
        SecretError::new(SecretErrorKind::KeyResolution, node_id, msg)
    }

    /// Attach a description of the value which failed to encrypt, e.g. the name of an
    /// environment variable. Never pass the value itself.
    pub fn with_subject(mut self, subject: String) -> Self {
        self.subject = Some(subject);
        self
    }

    /// The kind of failure.
    pub fn kind(&self) -> SecretErrorKind {
        self.kind
    }

    /// Whether the error comes from failing to resolve the key of the node.
    pub fn is_key_resolution(&self) -> bool {
        self.kind == SecretErrorKind::KeyResolution
    }
}

impl fmt::Display for SecretError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} for node {}", self.kind, self.node_id)?;
        if let Some(ref subject) = self.subject {
            write!(f, " ({})", subject)?;
        }
        write!(f, ": {}", self.msg)
    }
}

impl std::error::Error for SecretError {}

/// Specific error type related to secret encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretErrorKind {
    /// The public key of the node could not be derived
    KeyResolution,
    /// Error while encrypting data
    Encrypt,
    /// Error while decrypting data
    Decrypt,
}

impl fmt::Display for SecretErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Operation {}",
            match self {
                SecretErrorKind::KeyResolution => "RESOLVE KEY",
                SecretErrorKind::Encrypt => "ENCRYPT",
                SecretErrorKind::Decrypt => "DECRYPT",
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{decrypt_secret, SealedBoxEncryptor, SecretEncryptor, SecretErrorKind};
    use crate::identity::Identity;
    use std::collections::BTreeMap;

    fn node() -> Identity {
        Identity::from_seed(0, &[42u8; 32]).unwrap()
    }

    #[test]
    fn sealed_box_roundtrip() {
        let node = node();
        let enc = SealedBoxEncryptor::new();

        let ciphertext = enc.encrypt_secret("supersecret", &node.node_id()).unwrap();
        assert_ne!(ciphertext, "supersecret");
        assert!(hex::decode(&ciphertext).is_ok());

        let plain = decrypt_secret(&ciphertext, &node).unwrap();
        assert_eq!(plain, "supersecret");
    }

    #[test]
    fn empty_plaintext() {
        let enc = SealedBoxEncryptor::new();
        assert_eq!(enc.encrypt_secret("", &node().node_id()).unwrap(), "");
        // an empty secret does not even require a valid node
        assert_eq!(enc.encrypt_secret("", "not a node").unwrap(), "");
    }

    #[test]
    fn other_node_cant_open() {
        let enc = SealedBoxEncryptor::new();
        let ciphertext = enc.encrypt_secret("supersecret", &node().node_id()).unwrap();

        let other = Identity::from_seed(0, &[7u8; 32]).unwrap();
        let err = decrypt_secret(&ciphertext, &other).unwrap_err();
        assert_eq!(err.kind(), SecretErrorKind::Decrypt);
    }

    #[test]
    fn unresolvable_node() {
        let enc = SealedBoxEncryptor::new();
        let err = enc.encrypt_secret("secret", "0OIl").unwrap_err();
        assert!(err.is_key_resolution());

        // valid base58, but too short to be a key
        let err = enc.encrypt_secret("secret", "3mJr7AoUXx2Wqd").unwrap_err();
        assert!(err.is_key_resolution());
        assert!(!err.to_string().contains("secret\""));
    }

    #[test]
    fn map_error_names_key() {
        let enc = SealedBoxEncryptor::new();
        let mut env = BTreeMap::new();
        env.insert("DB_PASSWORD".to_string(), "hunter2".to_string());

        let err = enc.encrypt_map(&env, "bad").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("DB_PASSWORD"));
        assert!(!msg.contains("hunter2"));

        let encrypted = enc.encrypt_map(&env, &node().node_id()).unwrap();
        assert_eq!(
            decrypt_secret(&encrypted["DB_PASSWORD"], &node()).unwrap(),
            "hunter2"
        );
    }
}
