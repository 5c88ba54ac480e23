use crate::identity::Identity;
use chrono::{DateTime, Utc};

/// Format of the `date` header.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// The headers covered by the signature, in signing order.
const SIGNED_HEADERS: &str = "(created) date threebot-id";

/// The headers which authenticate a request to the explorer. The `Authorization` value is an
/// http signature over the creation time and the other two headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AuthHeaders {
    pub date: String,
    pub threebot_id: String,
    pub authorization: String,
}

impl AuthHeaders {
    /// Sign a request made by `identity` at `now`.
    pub fn new(identity: &Identity, now: DateTime<Utc>) -> Self {
        let created = now.timestamp();
        let date = now.format(HTTP_DATE_FORMAT).to_string();
        let threebot_id = identity.id().to_string();

        let signature = identity.sign(signing_string(created, &date, &threebot_id).as_bytes());
        let authorization = format!(
            r#"Signature keyId="{}",algorithm="ed25519",created="{}",headers="{}",signature="{}""#,
            threebot_id,
            created,
            SIGNED_HEADERS,
            base64::encode(&signature)
        );

        AuthHeaders {
            date,
            threebot_id,
            authorization,
        }
    }
}

fn signing_string(created: i64, date: &str, threebot_id: &str) -> String {
    format!(
        "(created): {}\ndate: {}\nthreebot-id: {}",
        created, date, threebot_id
    )
}
