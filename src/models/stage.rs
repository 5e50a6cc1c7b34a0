use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::RoleContext;

/// Ids above this value are sub-stages, ids in `1..=SUBSTAGE_THRESHOLD` are stages.
pub const SUBSTAGE_THRESHOLD: u32 = 100;

/// Numeric stage id.
///
/// Stages and sub-stages share a single id space: `0` means "no sub-stage",
/// `1..=100` is a top-level stage and anything above 100 is a sub-stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(u32);

impl StageId {
    /// Reserved sub-stage id meaning "no sub-stage set"
    pub const NONE: StageId = StageId(0);

    pub const fn new(raw: u32) -> Self {
        StageId(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// True for ids above the sub-stage threshold
    pub fn is_substage(self) -> bool {
        self.0 > SUBSTAGE_THRESHOLD
    }

    /// True for top-level stage ids (`1..=100`)
    pub fn is_stage(self) -> bool {
        self.0 > 0 && self.0 <= SUBSTAGE_THRESHOLD
    }
}

impl From<u32> for StageId {
    fn from(raw: u32) -> Self {
        StageId(raw)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the catalog source.
///
/// The source is denormalized: a stage with labels for three roles arrives as
/// three rows that repeat the stage columns and differ in `role`/`text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub id: u32,
    pub name: String,
    pub side: String,
    pub priority: i64,
    #[serde(default)]
    pub is_hidden_substage: bool,
    pub role: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Fully merged stage or sub-stage definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub id: StageId,
    pub name: String,
    pub side: String,
    pub priority: i64,
    pub is_hidden_substage: bool,
    pub text_by_role: BTreeMap<String, String>,
}

impl StageDefinition {
    pub fn is_substage(&self) -> bool {
        self.id.is_substage()
    }

    /// Label for the given role, if the catalog has one
    pub fn text_for(&self, role: &RoleContext) -> Option<&str> {
        self.text_by_role.get(role.as_str()).map(String::as_str)
    }
}

/// Reference to a stage either by symbolic name or by numeric id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StageRef {
    Id(StageId),
    Name(String),
}

impl StageRef {
    /// Parse a user supplied reference; all-digit strings are ids.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(id) = trimmed.parse::<u32>() {
                return StageRef::Id(StageId(id));
            }
        }
        StageRef::Name(trimmed.to_string())
    }
}

impl fmt::Display for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageRef::Id(id) => write!(f, "#{}", id),
            StageRef::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for StageRef {
    fn from(raw: &str) -> Self {
        StageRef::parse(raw)
    }
}

impl From<String> for StageRef {
    fn from(raw: String) -> Self {
        StageRef::parse(&raw)
    }
}

impl From<&String> for StageRef {
    fn from(raw: &String) -> Self {
        StageRef::parse(raw)
    }
}

impl From<StageId> for StageRef {
    fn from(id: StageId) -> Self {
        StageRef::Id(id)
    }
}

impl From<u32> for StageRef {
    fn from(id: u32) -> Self {
        StageRef::Id(StageId(id))
    }
}

impl From<&StageRef> for StageRef {
    fn from(r: &StageRef) -> Self {
        r.clone()
    }
}

/// One or more stage references, as accepted by `is`/`is_not`
pub trait StageSet {
    fn into_refs(self) -> Vec<StageRef>;
}

impl StageSet for &str {
    fn into_refs(self) -> Vec<StageRef> {
        vec![StageRef::parse(self)]
    }
}

impl StageSet for String {
    fn into_refs(self) -> Vec<StageRef> {
        vec![StageRef::parse(&self)]
    }
}

impl StageSet for StageId {
    fn into_refs(self) -> Vec<StageRef> {
        vec![StageRef::Id(self)]
    }
}

impl StageSet for StageRef {
    fn into_refs(self) -> Vec<StageRef> {
        vec![self]
    }
}

impl StageSet for &[&str] {
    fn into_refs(self) -> Vec<StageRef> {
        self.iter().map(|s| StageRef::parse(s)).collect()
    }
}

impl<const N: usize> StageSet for [&str; N] {
    fn into_refs(self) -> Vec<StageRef> {
        self.iter().map(|s| StageRef::parse(s)).collect()
    }
}

impl StageSet for Vec<&str> {
    fn into_refs(self) -> Vec<StageRef> {
        self.into_iter().map(StageRef::parse).collect()
    }
}

impl StageSet for Vec<String> {
    fn into_refs(self) -> Vec<StageRef> {
        self.iter().map(|s| StageRef::parse(s)).collect()
    }
}

impl StageSet for &[StageRef] {
    fn into_refs(self) -> Vec<StageRef> {
        self.to_vec()
    }
}

impl StageSet for Vec<StageRef> {
    fn into_refs(self) -> Vec<StageRef> {
        self
    }
}
