//! The authorization protocol of the grid.
//!
//! Authorization never signs raw JSON of individual workloads. Every workload defines a
//! signature challenge: a fixed ordered concatenation of the fields which matter for
//! authorization, rendered in their textual form without separators. A reservation as a whole is
//! authorized by signing its frozen JSON encoding, which is stored next to the decoded data so the
//! explorer can verify the exact bytes that were signed.

use crate::builders::ValidationError;
use crate::identity::Identity;
use crate::reservation::{Reservation, ReservationData};
use crate::schema::Date;
use crate::workloads::WorkloadDescriptor;
use crate::ProvisionResult;
use ed25519_dalek::{PublicKey, Signature, Verifier};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::convert::TryFrom;
use std::fmt;

/// Ordered byte concatenation of the textual form of values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Challenge {
    buf: Vec<u8>,
}

impl Challenge {
    /// An empty challenge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the textual form of a value.
    pub fn push<T: fmt::Display>(&mut self, value: T) -> &mut Self {
        self.buf.extend_from_slice(value.to_string().as_bytes());
        self
    }

    /// Append the textual form of every value, in order.
    pub fn push_all<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        for value in values {
            self.push(value);
        }
        self
    }

    /// The challenge so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the challenge, returning the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// A request for signatures: who can sign, and how many signatures are needed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningRequest {
    /// Ids of the users allowed to sign.
    pub signers: Vec<i64>,
    /// Minimum amount of distinct signers needed.
    pub quorum_min: i64,
}

impl SigningRequest {
    /// A request which only needs the given user to sign.
    pub fn single(signer: i64) -> Self {
        SigningRequest {
            signers: vec![signer],
            quorum_min: 1,
        }
    }

    /// Check the quorum can be reached with the listed signers.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quorum_min < 0 {
            return Err(format!("signing quorum {} is negative", self.quorum_min).into());
        }
        if self.quorum_min as usize > self.signers.len() {
            return Err(format!(
                "signing quorum {} can't be reached with {} signers",
                self.quorum_min,
                self.signers.len()
            )
            .into());
        }
        Ok(())
    }
}

/// A signature added to a reservation or workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningSignature {
    /// Id of the signer.
    pub tid: i64,
    /// Hex encoded signature.
    pub signature: String,
    /// Moment of signing.
    pub epoch: Date,
}

/// The action a workload signature authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadAction {
    /// Provision the workload.
    Provision,
    /// Delete the workload.
    Delete,
}

impl fmt::Display for WorkloadAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            WorkloadAction::Provision => "provision",
            WorkloadAction::Delete => "delete",
        })
    }
}

/// Verify a hex encoded ed25519 signature. Any malformed input is a failed verification.
pub fn verify(public_key: &[u8], msg: &[u8], signature: &str) -> bool {
    let pk = match PublicKey::from_bytes(public_key) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    let raw = match hex::decode(signature) {
        Ok(raw) => raw,
        Err(_) => return false,
    };
    let sig = match Signature::try_from(raw.as_slice()) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    pk.verify(msg, &sig).is_ok()
}

/// Sign a reservation payload on behalf of the identity.
///
/// The customer is set as the only required signer for deletion, and the currencies the
/// customer can pay with are set, overwriting whatever the payload held. The payload is then
/// frozen in its canonical JSON form, and that exact string is signed.
pub fn sign_reservation(
    mut data: ReservationData,
    identity: &Identity,
    currencies: &[String],
) -> ProvisionResult<Reservation> {
    data.signing_request_delete = SigningRequest::single(identity.id());
    data.currencies = currencies.to_vec();

    let json = data.canonical_json()?;
    let customer_signature = identity.sign_hex(json.as_bytes());
    debug!(
        "signed reservation payload of {} bytes as customer {}",
        json.len(),
        identity.id()
    );

    Ok(Reservation {
        json,
        data_reservation: data,
        customer_tid: identity.id(),
        customer_signature,
        epoch: Date::now(),
        ..Default::default()
    })
}

/// Verify the customer signature of a reservation against the key of the customer. This also
/// checks that the frozen JSON still matches the decoded payload.
pub fn verify_reservation(reservation: &Reservation, public_key: &[u8]) -> bool {
    if !reservation.json_matches_data() {
        trace!("reservation {} json does not match its data", reservation.id);
        return false;
    }
    verify(
        public_key,
        reservation.json.as_bytes(),
        &reservation.customer_signature,
    )
}

/// The bytes signed to request deletion of a reservation: its id followed by its frozen JSON.
pub fn delete_challenge(reservation: &Reservation) -> Vec<u8> {
    let mut challenge = Challenge::new();
    challenge.push(reservation.id).push(&reservation.json);
    challenge.into_bytes()
}

/// Sign the deletion of a reservation, hex encoded.
pub fn sign_delete(reservation: &Reservation, identity: &Identity) -> String {
    identity.sign_hex(&delete_challenge(reservation))
}

fn workload_action_message(
    workload: &dyn WorkloadDescriptor,
    action: WorkloadAction,
    signer: i64,
) -> Vec<u8> {
    let mut suffix = Challenge::new();
    suffix.push(action).push(signer);

    let mut msg = workload.signature_challenge();
    msg.extend_from_slice(suffix.as_bytes());
    msg
}

/// Sign an action on a single workload. The signed message is the sha256 digest of the workload
/// challenge, the action, and the id of the signer.
pub fn sign_workload(
    workload: &dyn WorkloadDescriptor,
    action: WorkloadAction,
    identity: &Identity,
) -> SigningSignature {
    let msg = workload_action_message(workload, action, identity.id());
    SigningSignature {
        tid: identity.id(),
        signature: hex::encode(identity.hash_and_sign(&msg)),
        epoch: Date::now(),
    }
}

/// Verify a signature made with [`sign_workload`].
pub fn verify_workload(
    workload: &dyn WorkloadDescriptor,
    action: WorkloadAction,
    signature: &SigningSignature,
    public_key: &[u8],
) -> bool {
    let msg = workload_action_message(workload, action, signature.tid);
    let digest = Sha256::digest(&msg);
    verify(public_key, digest.as_slice(), &signature.signature)
}

/// Count the distinct signers of the request which have signed.
pub fn count_signatures(signatures: &[SigningSignature], request: &SigningRequest) -> usize {
    let allowed: BTreeSet<i64> = request.signers.iter().copied().collect();
    signatures
        .iter()
        .map(|sig| sig.tid)
        .filter(|tid| allowed.contains(tid))
        .collect::<BTreeSet<_>>()
        .len()
}

/// Check if enough distinct signers of the request have signed.
pub fn quorum_reached(signatures: &[SigningSignature], request: &SigningRequest) -> bool {
    count_signatures(signatures, request) as i64 >= request.quorum_min
}
