use bip39::Mnemonic;
use ed25519_dalek::{Keypair, PublicKey, SecretKey, SignatureError, Signer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Length of an ed25519 public key.
pub const PUBLIC_KEY_LENGTH: usize = ed25519_dalek::PUBLIC_KEY_LENGTH;

/// Errors while creating or using an [`Identity`].
#[derive(Debug)]
pub enum IdentityError {
    /// The mnemonic could not be parsed.
    Mnemonic(bip39::Error),
    /// The key material is not a valid ed25519 key.
    Signature(SignatureError),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdentityError::Mnemonic(e) => write!(f, "invalid mnemonic: {}", e),
            IdentityError::Signature(e) => write!(f, "invalid key material: {}", e),
        }
    }
}

impl std::error::Error for IdentityError {}

impl From<bip39::Error> for IdentityError {
    fn from(err: bip39::Error) -> IdentityError {
        IdentityError::Mnemonic(err)
    }
}

impl From<SignatureError> for IdentityError {
    fn from(err: SignatureError) -> IdentityError {
        IdentityError::Signature(err)
    }
}

/// A user (or node) identity: a numeric id known to the explorer, and the ed25519 key pair used
/// to sign on its behalf.
pub struct Identity {
    user_id: i64,
    keypair: Keypair,
}

impl Identity {
    /// Load an identity from a bip39 mnemonic. The entropy of the mnemonic is used as ed25519
    /// seed, so only 24 word mnemonics produce a valid key.
    pub fn from_mnemonic(user_id: i64, mnemonic: &str) -> Result<Identity, IdentityError> {
        let mnemonic = Mnemonic::from_str(mnemonic)?;
        Identity::from_seed(user_id, &mnemonic.to_entropy())
    }

    /// Load an identity from a raw 32 byte ed25519 seed.
    pub fn from_seed(user_id: i64, seed: &[u8]) -> Result<Identity, IdentityError> {
        let secret: SecretKey = SecretKey::from_bytes(seed)?;
        let public: PublicKey = (&secret).into();

        Ok(Identity {
            user_id,
            keypair: Keypair { secret, public },
        })
    }

    /// The id of this identity on the explorer.
    pub fn id(&self) -> i64 {
        self.user_id
    }

    /// The raw ed25519 public key.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.keypair.public.to_bytes()
    }

    /// The id a node carrying this key pair has on the grid, i.e. the base58 encoded public key.
    pub fn node_id(&self) -> String {
        multibase::Base::Base58Btc.encode(self.keypair.public.as_bytes())
    }

    /// The full key pair in libsodium layout (seed followed by public key).
    pub(crate) fn keypair_bytes(&self) -> [u8; ed25519_dalek::KEYPAIR_LENGTH] {
        self.keypair.to_bytes()
    }

    /// Sign the raw input.
    pub fn sign(&self, input: &[u8]) -> [u8; 64] {
        self.keypair.sign(input).to_bytes()
    }

    /// Sign the raw input, and return the signature hex encoded.
    pub fn sign_hex(&self, input: &[u8]) -> String {
        hex::encode(self.sign(input))
    }

    /// Sign the sha256 digest of the input.
    pub fn hash_and_sign(&self, input: &[u8]) -> [u8; 64] {
        let mut hasher = Sha256::new();
        hasher.update(input);
        let result = hasher.finalize();
        self.keypair.sign(result.as_slice()).to_bytes()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}
