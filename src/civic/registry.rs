//! Closed registry of issue categories and statuses.
//!
//! Every persisted category and status is one of these variants. Parsing an
//! unknown string fails instead of falling back to a default label.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pothole,
    Streetlight,
    Garbage,
    Water,
    Traffic,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Pothole,
        Self::Streetlight,
        Self::Garbage,
        Self::Water,
        Self::Traffic,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pothole => "pothole",
            Self::Streetlight => "streetlight",
            Self::Garbage => "garbage",
            Self::Water => "water",
            Self::Traffic => "traffic",
            Self::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pothole => "Pothole",
            Self::Streetlight => "Street Light",
            Self::Garbage => "Garbage",
            Self::Water => "Water Issue",
            Self::Traffic => "Traffic",
            Self::Other => "Other",
        }
    }

    /// Marker color used by the map dashboard.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Pothole => "#FF6B6B",
            Self::Streetlight => "#4ECDC4",
            Self::Garbage => "#95E1D3",
            Self::Water => "#38ADA9",
            Self::Traffic => "#FFD93D",
            Self::Other => "#A8DADC",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pothole" => Ok(Self::Pothole),
            "streetlight" => Ok(Self::Streetlight),
            "garbage" => Ok(Self::Garbage),
            "water" => Ok(Self::Water),
            "traffic" => Ok(Self::Traffic),
            "other" => Ok(Self::Other),
            _ => Err(format!(
                "Invalid category '{}'. Valid values: pothole, streetlight, garbage, water, traffic, other",
                s
            )),
        }
    }
}

/// Lifecycle status of an issue. `Pending` is the initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 3] = [Self::Pending, Self::InProgress, Self::Resolved];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Pending => "#FFD93D",
            Self::InProgress => "#4ECDC4",
            Self::Resolved => "#95E1D3",
        }
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

/// One row of display metadata, as served to the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntry {
    pub value: String,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryView {
    pub categories: Vec<RegistryEntry>,
    pub statuses: Vec<RegistryEntry>,
}

impl RegistryView {
    pub fn build() -> Self {
        let categories = Category::ALL
            .iter()
            .map(|c| RegistryEntry {
                value: c.as_str().to_string(),
                label: c.label().to_string(),
                color: c.color().to_string(),
            })
            .collect();
        let statuses = IssueStatus::ALL
            .iter()
            .map(|s| RegistryEntry {
                value: s.as_str().to_string(),
                label: s.label().to_string(),
                color: s.color().to_string(),
            })
            .collect();
        Self {
            categories,
            statuses,
        }
    }
}
