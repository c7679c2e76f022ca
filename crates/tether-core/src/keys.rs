//! Composite link identities.
//!
//! Providers and consumers share the same identity shape: the owning
//! deployment, the instance group and job that declare the link, and
//! the link name itself. The dot-joined rendering
//! (`deployment.instance_group.job.link_name`) is the stable form used
//! for storage keys, diagnostics, and the legacy embedded format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a dot-joined link key.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("malformed link key '{0}': expected deployment.instance_group.job.link_name")]
    Malformed(String),
}

/// Stable composite identity of a link provider or consumer.
///
/// Segments must not contain `.`. Derived ordering sorts by
/// deployment name first, which is the order diagnostics rely on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkKey {
    pub deployment: String,
    pub instance_group: String,
    pub job: String,
    pub link_name: String,
}

impl LinkKey {
    pub fn new(deployment: &str, instance_group: &str, job: &str, link_name: &str) -> Self {
        Self {
            deployment: deployment.to_string(),
            instance_group: instance_group.to_string(),
            job: job.to_string(),
            link_name: link_name.to_string(),
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.deployment, self.instance_group, self.job, self.link_name
        )
    }
}

impl FromStr for LinkKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [deployment, instance_group, job, link_name]
                if parts.iter().all(|p| !p.is_empty()) =>
            {
                Ok(LinkKey::new(deployment, instance_group, job, link_name))
            }
            _ => Err(KeyError::Malformed(s.to_string())),
        }
    }
}

impl TryFrom<String> for LinkKey {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LinkKey> for String {
    fn from(key: LinkKey) -> String {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_dot_joined_form() {
        let key = LinkKey::new("d1", "web", "mysql", "db");
        assert_eq!(key.to_string(), "d1.web.mysql.db");
        assert_eq!("d1.web.mysql.db".parse::<LinkKey>().unwrap(), key);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!("d1.web.mysql".parse::<LinkKey>().is_err());
        assert!("d1.web.mysql.db.extra".parse::<LinkKey>().is_err());
        assert!("".parse::<LinkKey>().is_err());
    }

    #[test]
    fn rejects_empty_segments() {
        assert!("d1..mysql.db".parse::<LinkKey>().is_err());
    }

    #[test]
    fn serializes_as_string() {
        let key = LinkKey::new("d1", "web", "mysql", "db");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"d1.web.mysql.db\"");
        let back: LinkKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn orders_by_deployment_first() {
        let a = LinkKey::new("a", "z", "z", "z");
        let b = LinkKey::new("b", "a", "a", "a");
        assert!(a < b);
    }
}
