use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Duration given to poses that arrive without one.
pub const DEFAULT_DURATION: u32 = 7;
/// Shortest hold the editor accepts.
pub const MIN_DURATION: u32 = 1;
/// Longest hold accepted anywhere.
pub const MAX_DURATION: u32 = 300;

/// Clips an edited duration into the accepted hold range.
pub fn clamp_duration(seconds: u32) -> u32 {
    seconds.clamp(MIN_DURATION, MAX_DURATION)
}

/// Runtime identity of a pose instance inside a flow.
///
/// Never persisted; assigned when a pose enters a flow and on every load,
/// so two copies of the same catalog pose stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PoseUid(u64);

/// Which side of the body a pose is held on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Side {
    #[default]
    None,
    Left,
    Right,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::None => "",
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }

    /// Cycles none -> left -> right -> none.
    pub fn next(self) -> Self {
        match self {
            Side::None => Side::Left,
            Side::Left => Side::Right,
            Side::Right => Side::None,
        }
    }
}

impl From<String> for Side {
    fn from(value: String) -> Self {
        Side::from(value.as_str())
    }
}

impl From<&str> for Side {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Side::Left,
            "right" | "r" => Side::Right,
            _ => Side::None,
        }
    }
}

impl From<Side> for String {
    fn from(side: Side) -> Self {
        side.label().to_string()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single posture with its display and timing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pose {
    pub name: String,
    #[serde(default)]
    pub sanskrit: String,
    #[serde(default)]
    pub side: Side,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub transitions_asana: Vec<String>,
    #[serde(default = "default_duration", deserialize_with = "deserialize_duration")]
    pub duration: u32,
    #[serde(default)]
    pub chakra: Option<String>,
    #[serde(skip)]
    pub uid: PoseUid,
    #[serde(skip)]
    pub selected: bool,
}

impl Pose {
    pub fn new(name: impl Into<String>, duration: u32) -> Self {
        Self {
            name: name.into(),
            sanskrit: String::new(),
            side: Side::None,
            image: String::new(),
            description: String::new(),
            difficulty: String::new(),
            tags: Vec::new(),
            transitions_asana: Vec::new(),
            duration,
            chakra: None,
            uid: PoseUid::default(),
            selected: false,
        }
    }

    /// Name shown in tables, with the side appended when one is set.
    pub fn display_name(&self) -> String {
        match self.side {
            Side::None => self.name.clone(),
            side => format!("{} ({})", self.name, side),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

fn default_duration() -> u32 {
    DEFAULT_DURATION
}

/// Accepts any JSON value for a duration; anything that is not a usable
/// non-negative number counts as zero.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let seconds = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s.round().min(u32::MAX as f64) as u32,
        _ => 0,
    })
}

/// Opaque section identifier, persisted as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(String);

impl SectionId {
    pub fn generate() -> Self {
        Self(format!("section-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named group of poses, referenced by position in the owning flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    #[serde(default)]
    pub asana_ids: Vec<usize>,
    #[serde(default)]
    pub collapsed: bool,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SectionId::generate(),
            name: name.into(),
            asana_ids: Vec::new(),
            collapsed: false,
        }
    }

    pub fn contains(&self, position: usize) -> bool {
        self.asana_ids.binary_search(&position).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.asana_ids.is_empty()
    }

    /// First (lowest) position in the section.
    pub fn first_position(&self) -> Option<usize> {
        self.asana_ids.first().copied()
    }
}

/// Display sort direction of the flow table.
///
/// New poses always land on the row shown first: ascending prepends,
/// descending appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }
}

/// A named, ordered sequence of poses with non-overlapping sections.
///
/// Position in `asanas` is the only ordering authority. Every section holds
/// sorted, in-range positions and no position appears in two sections. The
/// mutating operations live in `sequence.rs` and `reorder.rs`; each one
/// validates before touching anything, so a rejected call leaves the flow
/// unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    #[serde(rename = "flowID", default)]
    pub flow_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub time: u32,
    #[serde(default)]
    pub(crate) asanas: Vec<Pose>,
    #[serde(default)]
    pub(crate) sections: Vec<Section>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_edited: DateTime<Utc>,
    #[serde(default)]
    pub last_flowed: Option<DateTime<Utc>>,
    #[serde(skip)]
    next_uid: u64,
}

impl Default for Flow {
    fn default() -> Self {
        Self::new("Untitled flow")
    }
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            flow_id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            time: 0,
            asanas: Vec::new(),
            sections: Vec::new(),
            created: now,
            last_edited: now,
            last_flowed: None,
            next_uid: 0,
        }
    }

    /// Assembles a flow from raw parts and normalizes it.
    pub fn from_parts(
        name: impl Into<String>,
        description: impl Into<String>,
        poses: Vec<Pose>,
        sections: Vec<Section>,
    ) -> Self {
        let mut flow = Self::new(name);
        flow.description = description.into();
        flow.asanas = poses;
        flow.sections = sections;
        flow.normalize();
        flow
    }

    pub fn len(&self) -> usize {
        self.asanas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asanas.is_empty()
    }

    pub fn poses(&self) -> &[Pose] {
        &self.asanas
    }

    pub fn pose(&self, position: usize) -> Option<&Pose> {
        self.asanas.get(position)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, id: &SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| &s.id == id)
    }

    pub(crate) fn section_index(&self, id: &SectionId) -> Option<usize> {
        self.sections.iter().position(|s| &s.id == id)
    }

    /// The section a position belongs to, if any.
    pub fn section_of(&self, position: usize) -> Option<&Section> {
        self.sections.iter().find(|s| s.contains(position))
    }

    pub(crate) fn section_index_of(&self, position: usize) -> Option<usize> {
        self.sections.iter().position(|s| s.contains(position))
    }

    pub(crate) fn allocate_uid(&mut self) -> PoseUid {
        self.next_uid += 1;
        PoseUid(self.next_uid)
    }

    /// Sums every pose duration and caches the result in `time`.
    pub fn calculate_total_duration(&mut self) -> u32 {
        self.time = self.asanas.iter().map(|p| p.duration).sum();
        self.time
    }

    /// Derived duration of one section's member poses.
    pub fn section_duration(&self, id: &SectionId) -> u32 {
        self.section(id)
            .map(|section| {
                section
                    .asana_ids
                    .iter()
                    .filter_map(|&p| self.asanas.get(p))
                    .map(|p| p.duration)
                    .sum()
            })
            .unwrap_or(0)
    }

    pub fn touch(&mut self) {
        self.last_edited = Utc::now();
    }

    /// Brings a flow from storage or import into a consistent state.
    ///
    /// Assigns fresh pose identities, clamps durations, drops section
    /// positions that are out of range, duplicated or already claimed by an
    /// earlier section, and refreshes the cached total.
    pub fn normalize(&mut self) {
        if self.flow_id.trim().is_empty() {
            self.flow_id = Uuid::new_v4().to_string();
        }

        let mut next = 0;
        for pose in &mut self.asanas {
            next += 1;
            pose.uid = PoseUid(next);
            pose.selected = false;
            pose.duration = pose.duration.min(MAX_DURATION);
        }
        self.next_uid = next;

        let len = self.asanas.len();
        let mut claimed = HashSet::new();
        for section in &mut self.sections {
            section.asana_ids.sort_unstable();
            section.asana_ids.dedup();
            section.asana_ids.retain(|&p| p < len && claimed.insert(p));
        }

        self.calculate_total_duration();
    }

    /// Checks the positional invariant: in range, sorted, no overlaps.
    pub fn is_consistent(&self) -> bool {
        let len = self.asanas.len();
        let mut seen = HashSet::new();
        self.sections.iter().all(|section| {
            section.asana_ids.windows(2).all(|w| w[0] < w[1])
                && section.asana_ids.iter().all(|&p| p < len && seen.insert(p))
        })
    }
}
