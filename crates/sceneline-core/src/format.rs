//! Structural format ids and pipeline policy.
//!
//! The format id set is a shared contract: the classifier, the escalation
//! scorer, and the review service all speak exactly these ten names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DocumentError;

/// Structural role of one screenplay line or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatId {
    Basmala,
    #[serde(rename = "scene-header-1")]
    SceneHeader1,
    #[serde(rename = "scene-header-2")]
    SceneHeader2,
    #[serde(rename = "scene-header-3")]
    SceneHeader3,
    Action,
    Character,
    Dialogue,
    Parenthetical,
    Transition,
    SceneHeaderTopLine,
}

/// Line types and block formats are the same enum on every side of the wire.
pub type LineType = FormatId;

impl FormatId {
    /// The allowed type enum, in wire order.
    pub const ALL: [FormatId; 10] = [
        Self::Action,
        Self::Dialogue,
        Self::Character,
        Self::SceneHeader1,
        Self::SceneHeader2,
        Self::SceneHeader3,
        Self::SceneHeaderTopLine,
        Self::Transition,
        Self::Parenthetical,
        Self::Basmala,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basmala => "basmala",
            Self::SceneHeader1 => "scene-header-1",
            Self::SceneHeader2 => "scene-header-2",
            Self::SceneHeader3 => "scene-header-3",
            Self::Action => "action",
            Self::Character => "character",
            Self::Dialogue => "dialogue",
            Self::Parenthetical => "parenthetical",
            Self::Transition => "transition",
            Self::SceneHeaderTopLine => "scene-header-top-line",
        }
    }

    pub fn is_scene_header(&self) -> bool {
        matches!(
            self,
            Self::SceneHeader1 | Self::SceneHeader2 | Self::SceneHeader3 | Self::SceneHeaderTopLine
        )
    }

    /// Lines that open or continue a speech run.
    pub fn is_speech(&self) -> bool {
        matches!(self, Self::Character | Self::Dialogue | Self::Parenthetical)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatId {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| DocumentError::UnknownFormat(s.to_string()))
    }
}

/// How many classified lines may collapse into one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    #[default]
    None,
    Safe,
    Aggressive,
}

impl MergePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Safe => "safe",
            Self::Aggressive => "aggressive",
        }
    }
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(Self::None),
            "safe" => Ok(Self::Safe),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(format!("unknown merge policy '{other}'")),
        }
    }
}

/// What the classifier may do to a line besides labelling it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierRole {
    /// Type only; text passes through untouched.
    #[default]
    LabelOnly,
    /// Type plus whitespace/punctuation canonicalisation.
    LimitedRewrite,
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructurePipelinePolicy {
    #[serde(default)]
    pub merge_policy: MergePolicy,
    #[serde(default)]
    pub classifier_role: ClassifierRole,
}

impl StructurePipelinePolicy {
    pub fn new(merge_policy: MergePolicy, classifier_role: ClassifierRole) -> Self {
        Self {
            merge_policy,
            classifier_role,
        }
    }
}
