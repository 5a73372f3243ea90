//! Entity types, secondary indexes, and write kinds for the single table.
//!
//! `EntityType` serializes as the `SCREAMING_SNAKE_CASE` discriminator stored
//! in the `entityType` attribute (`"USER"`, `"CIRCLE_MEMBER"`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Discriminator of every record kind stored in the single table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    User,
    Circle,
    CircleMember,
    Story,
    Business,
    Resource,
    ImageAsset,
    Feedback,
    Incident,
    AdvisoryReview,
    PremiumSource,
    Personalization,
}

impl EntityType {
    pub const ALL: [Self; 12] = [
        Self::User,
        Self::Circle,
        Self::CircleMember,
        Self::Story,
        Self::Business,
        Self::Resource,
        Self::ImageAsset,
        Self::Feedback,
        Self::Incident,
        Self::AdvisoryReview,
        Self::PremiumSource,
        Self::Personalization,
    ];

    /// Return the discriminator stored in the `entityType` attribute.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Circle => "CIRCLE",
            Self::CircleMember => "CIRCLE_MEMBER",
            Self::Story => "STORY",
            Self::Business => "BUSINESS",
            Self::Resource => "RESOURCE",
            Self::ImageAsset => "IMAGE_ASSET",
            Self::Feedback => "FEEDBACK",
            Self::Incident => "INCIDENT",
            Self::AdvisoryReview => "ADVISORY_REVIEW",
            Self::PremiumSource => "PREMIUM_SOURCE",
            Self::Personalization => "PERSONALIZATION",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownEntityType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Gsi
// ---------------------------------------------------------------------------

/// One of the four global secondary indexes of the table.
///
/// Attribute names are fixed: `GSI{n}PK` / `GSI{n}SK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gsi {
    #[serde(rename = "GSI1")]
    Gsi1,
    #[serde(rename = "GSI2")]
    Gsi2,
    #[serde(rename = "GSI3")]
    Gsi3,
    #[serde(rename = "GSI4")]
    Gsi4,
}

impl Gsi {
    pub const ALL: [Self; 4] = [Self::Gsi1, Self::Gsi2, Self::Gsi3, Self::Gsi4];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gsi1 => "GSI1",
            Self::Gsi2 => "GSI2",
            Self::Gsi3 => "GSI3",
            Self::Gsi4 => "GSI4",
        }
    }

    /// Partition-key attribute of this index.
    #[must_use]
    pub const fn partition_key(self) -> &'static str {
        match self {
            Self::Gsi1 => "GSI1PK",
            Self::Gsi2 => "GSI2PK",
            Self::Gsi3 => "GSI3PK",
            Self::Gsi4 => "GSI4PK",
        }
    }

    /// Sort-key attribute of this index.
    #[must_use]
    pub const fn sort_key(self) -> &'static str {
        match self {
            Self::Gsi1 => "GSI1SK",
            Self::Gsi2 => "GSI2SK",
            Self::Gsi3 => "GSI3SK",
            Self::Gsi4 => "GSI4SK",
        }
    }
}

impl fmt::Display for Gsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gsi {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GSI1" => Ok(Self::Gsi1),
            "GSI2" => Ok(Self::Gsi2),
            "GSI3" => Ok(Self::Gsi3),
            "GSI4" => Ok(Self::Gsi4),
            other => Err(CoreError::UnknownIndex(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// WriteKind
// ---------------------------------------------------------------------------

/// Request kind of a batch write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Put,
    Delete,
}

impl WriteKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
