use chrono::{DateTime, TimeZone, Utc};
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// A point in time, encoded as seconds since the unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Date(i64);

impl Date {
    /// Create a new date from a unix timestamp in seconds.
    pub const fn from_unix(secs: i64) -> Self {
        Date(secs)
    }

    /// The current time.
    pub fn now() -> Self {
        Date(Utc::now().timestamp())
    }

    /// The date as a unix timestamp in seconds.
    pub fn unix(&self) -> i64 {
        self.0
    }

    /// Check if this date is unset.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Convert to a [`DateTime`], if the timestamp is representable.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.0, 0).single()
    }
}

impl From<DateTime<Utc>> for Date {
    fn from(dt: DateTime<Utc>) -> Self {
        Date(dt.timestamp())
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An IP network, i.e. an address and a prefix length. Encoded as `address/prefix`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpRange {
    ip: IpAddr,
    prefix: u8,
}

impl IpRange {
    /// Create a new range. Fails if the prefix is longer than the address.
    pub fn new(ip: IpAddr, prefix: u8) -> Result<Self, IpRangeParseError> {
        let max = if ip.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(IpRangeParseError(format!(
                "prefix length {} exceeds {} bits",
                prefix, max
            )));
        }
        Ok(IpRange { ip, prefix })
    }

    /// The address part of the range.
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// The prefix length of the range.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }
}

impl Default for IpRange {
    fn default() -> Self {
        IpRange {
            ip: IpAddr::from([0, 0, 0, 0]),
            prefix: 0,
        }
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix)
    }
}

impl FromStr for IpRange {
    type Err = IpRangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip, prefix) = s
            .split_once('/')
            .ok_or_else(|| IpRangeParseError(format!("missing prefix length in {}", s)))?;
        let ip = ip
            .parse::<IpAddr>()
            .map_err(|e| IpRangeParseError(format!("invalid address {}: {}", ip, e)))?;
        let prefix = prefix
            .parse::<u8>()
            .map_err(|e| IpRangeParseError(format!("invalid prefix {}: {}", prefix, e)))?;
        IpRange::new(ip, prefix)
    }
}

impl Serialize for IpRange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for IpRange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(IpRangeVisitor)
    }
}

struct IpRangeVisitor;

impl<'de> Visitor<'de> for IpRangeVisitor {
    type Value = IpRange;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an ip network in the form address/prefix")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        v.parse().map_err(E::custom)
    }
}

/// Error returned when an [`IpRange`] can't be parsed.
#[derive(Debug)]
pub struct IpRangeParseError(String);

impl fmt::Display for IpRangeParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IpRangeParseError {}

#[cfg(test)]
mod tests {
    use super::{Date, IpRange};

    #[test]
    fn ip_range_encoding() {
        let range: IpRange = "10.1.0.0/16".parse().unwrap();
        assert_eq!(range.prefix(), 16);
        assert_eq!(serde_json::to_string(&range).unwrap(), r#""10.1.0.0/16""#);

        let decoded: IpRange = serde_json::from_str(r#""2a02:1802:5e::/64""#).unwrap();
        assert_eq!(decoded.to_string(), "2a02:1802:5e::/64");

        assert!("10.1.0.0/33".parse::<IpRange>().is_err());
        assert!("10.1.0.0".parse::<IpRange>().is_err());
    }

    #[test]
    fn date_encoding() {
        let date = Date::from_unix(1_600_000_000);
        assert_eq!(serde_json::to_string(&date).unwrap(), "1600000000");
        assert_eq!(date.to_string(), "1600000000");
    }
}
