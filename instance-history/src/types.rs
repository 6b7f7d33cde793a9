//! Core types for the instance history library
//!
//! This module defines the identity and classification types shared by the
//! per-instance builders and the node aggregation. Everything here is a plain
//! value: no type in this module tracks state across events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp type used throughout the library
pub type Timestamp = DateTime<Utc>;

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Prefix of fully qualified Compute Engine resource URLs
const COMPUTE_URL_PREFIX: &str = "https://compute.googleapis.com/compute/v1/";

/// Errors that can occur while reconstructing histories
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("Out-of-order event for instance {instance_id}: {timestamp} is newer than previously processed {previous}")]
    OutOfOrderEvent {
        instance_id: u64,
        previous: Timestamp,
        timestamp: Timestamp,
    },

    #[error("Event for instance {instance_id} at {timestamp} predates its creation at {created}")]
    EventBeforeCreation {
        instance_id: u64,
        created: Timestamp,
        timestamp: Timestamp,
    },

    #[error("Event for instance {actual} routed to builder for instance {expected}")]
    InstanceMismatch { expected: u64, actual: u64 },

    #[error("Invalid resource reference: {0}")]
    InvalidReference(String),

    #[error("Unknown tenancy: {0}")]
    UnknownTenancy(String),
}

/// Hosting model of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tenancy {
    /// Not (yet) determined from any event
    #[default]
    Unknown,
    /// Shared, multi-tenant infrastructure
    Fleet,
    /// Dedicated sole-tenant node
    SoleTenant,
}

impl Tenancy {
    /// True for `Fleet` and `SoleTenant`
    pub fn is_known(&self) -> bool {
        !matches!(self, Tenancy::Unknown)
    }
}

impl fmt::Display for Tenancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tenancy::Unknown => write!(f, "unknown"),
            Tenancy::Fleet => write!(f, "fleet"),
            Tenancy::SoleTenant => write!(f, "sole_tenant"),
        }
    }
}

impl FromStr for Tenancy {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(Tenancy::Unknown),
            "fleet" => Ok(Tenancy::Fleet),
            "sole_tenant" | "soletenant" | "sole-tenant" => Ok(Tenancy::SoleTenant),
            _ => Err(HistoryError::UnknownTenancy(s.to_string())),
        }
    }
}

/// How much of an instance's record is known vs. reconstructed
///
/// Set once, when a builder is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceHistoryState {
    /// Identity, tenancy and image are all known
    Complete,
    /// Project, zone and name were never observed
    MissingName,
    /// Tenancy could not be determined
    MissingTenancy,
    /// No image was observed (the insert event was not found)
    MissingImage,
    /// Sole-tenant placements were found, but no stop or delete bounding them
    MissingStopEvent,
}

impl InstanceHistoryState {
    pub fn is_complete(&self) -> bool {
        matches!(self, InstanceHistoryState::Complete)
    }
}

impl fmt::Display for InstanceHistoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceHistoryState::Complete => write!(f, "Complete"),
            InstanceHistoryState::MissingName => write!(f, "MissingName"),
            InstanceHistoryState::MissingTenancy => write!(f, "MissingTenancy"),
            InstanceHistoryState::MissingImage => write!(f, "MissingImage"),
            InstanceHistoryState::MissingStopEvent => write!(f, "MissingStopEvent"),
        }
    }
}

/// Strip the optional API URL prefix and split a resource path into segments
fn path_segments(path: &str) -> Vec<&str> {
    path.strip_prefix(COMPUTE_URL_PREFIX)
        .unwrap_or(path)
        .trim_matches('/')
        .split('/')
        .collect()
}

/// Reference to a VM instance: `projects/{project}/zones/{zone}/instances/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceReference {
    pub project_id: String,
    pub zone: String,
    pub name: String,
}

impl InstanceReference {
    pub fn new(
        project_id: impl Into<String>,
        zone: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            zone: zone.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for InstanceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/zones/{}/instances/{}",
            self.project_id, self.zone, self.name
        )
    }
}

impl FromStr for InstanceReference {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self> {
        match path_segments(s).as_slice() {
            ["projects", project, "zones", zone, "instances", name]
                if !project.is_empty() && !zone.is_empty() && !name.is_empty() =>
            {
                Ok(Self::new(*project, *zone, *name))
            }
            _ => Err(HistoryError::InvalidReference(s.to_string())),
        }
    }
}

impl TryFrom<String> for InstanceReference {
    type Error = HistoryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<InstanceReference> for String {
    fn from(value: InstanceReference) -> Self {
        value.to_string()
    }
}

/// Reference to a global disk image: `projects/{project}/global/images/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageReference {
    pub project_id: String,
    pub name: String,
}

impl ImageReference {
    pub fn new(project_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/global/images/{}", self.project_id, self.name)
    }
}

impl FromStr for ImageReference {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self> {
        match path_segments(s).as_slice() {
            ["projects", project, "global", "images", name]
                if !project.is_empty() && !name.is_empty() =>
            {
                Ok(Self::new(*project, *name))
            }
            _ => Err(HistoryError::InvalidReference(s.to_string())),
        }
    }
}

impl TryFrom<String> for ImageReference {
    type Error = HistoryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ImageReference> for String {
    fn from(value: ImageReference) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_reference_parsing() {
        let reference: InstanceReference = "projects/project-1/zones/us-central1-a/instances/vm-1"
            .parse()
            .unwrap();
        assert_eq!(reference, InstanceReference::new("project-1", "us-central1-a", "vm-1"));
        assert_eq!(
            reference.to_string(),
            "projects/project-1/zones/us-central1-a/instances/vm-1"
        );
    }

    #[test]
    fn test_instance_reference_accepts_api_url() {
        let reference: InstanceReference =
            "https://compute.googleapis.com/compute/v1/projects/p/zones/z/instances/n"
                .parse()
                .unwrap();
        assert_eq!(reference.name, "n");
    }

    #[test]
    fn test_invalid_references_are_rejected() {
        assert!("projects/p/zones/z".parse::<InstanceReference>().is_err());
        assert!("projects//zones/z/instances/n".parse::<InstanceReference>().is_err());
        assert!("projects/p/images/i".parse::<ImageReference>().is_err());
        assert!(matches!(
            "".parse::<ImageReference>(),
            Err(HistoryError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_image_reference_parsing() {
        let image: ImageReference = "projects/project-1/global/images/image-1".parse().unwrap();
        assert_eq!(image.project_id, "project-1");
        assert_eq!(image.name, "image-1");
        assert_eq!(format!("{}", image), "projects/project-1/global/images/image-1");
    }

    #[test]
    fn test_tenancy_parsing() {
        assert_eq!("fleet".parse::<Tenancy>().unwrap(), Tenancy::Fleet);
        assert_eq!("SoleTenant".parse::<Tenancy>().unwrap(), Tenancy::SoleTenant);
        assert!("dedicated".parse::<Tenancy>().is_err());
        assert!(!Tenancy::default().is_known());
    }
}
