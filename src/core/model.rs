//! Records that flow through the compression pipeline.
//!
//! Items are created by the chunker and never destroyed; engine stages hand
//! back new views (filtered lists, id maps) instead of mutating shared
//! records in place.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of an [`Item`] within one run
pub type ItemId = usize;

/// Identifier of a topic [`Group`]
pub type GroupIndex = usize;

/// Group membership of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupId
{
    /// Not yet placed by the partitioner
    #[default]
    Unassigned,

    /// Member of the group with this id
    Group(GroupIndex),
}

impl fmt::Display for GroupId
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        match self
        {
            GroupId::Unassigned => write!(f, "unassigned"),
            GroupId::Group(id) => write!(f, "{id}"),
        }
    }
}

/// A unit of source text (a chunk) tracked through dedup and clustering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item
{
    /// Unique, run-stable identifier
    pub id: ItemId,

    /// Body text
    pub text: String,

    /// Source file the text came from
    pub origin: String,

    /// Estimated token count of `text`
    pub token_count: usize,

    /// Optional precomputed embedding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Set when another item represents this one
    #[serde(default)]
    pub is_duplicate: bool,

    /// Topic assignment
    #[serde(default)]
    pub group_id: GroupId,
}

impl Item
{
    /// Build an item with default flags and no embedding
    pub fn new(
        id: ItemId,
        text: impl Into<String>,
        origin: impl Into<String>,
        token_count: usize,
    ) -> Self
    {
        Self {
            id,
            text: text.into(),
            origin: origin.into(),
            token_count,
            embedding: None,
            is_duplicate: false,
            group_id: GroupId::Unassigned,
        }
    }
}

/// A topic cluster, later enriched with a summary and facts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Group
{
    pub id: GroupIndex,

    /// Members in discovery order
    #[serde(default)]
    pub items: Vec<Item>,

    /// Short human-readable name
    pub label: String,

    /// Summary text attached after clustering
    #[serde(default)]
    pub summary: String,

    /// Extracted fact sentences
    #[serde(default)]
    pub facts: Vec<String>,
}

impl Group
{
    pub fn new(
        id: GroupIndex,
        label: impl Into<String>,
    ) -> Self
    {
        Self { id, label: label.into(), ..Default::default() }
    }
}

/// The three-tier compressed output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TieredOutput
{
    pub topic: String,
    pub overview: String,
    pub groups: Vec<Group>,
    pub input_token_count: usize,
    pub output_token_count: usize,
    pub file_count: usize,
}

/// How the partitioner arrived at its group count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KSelection
{
    /// Two or fewer items, a single group by construction
    Trivial,

    /// Best silhouette among the viable candidates
    Scored
    {
        k: usize,
        silhouette: f64,
    },

    /// No candidate was viable; `min_k` used without validation
    Fallback
    {
        k: usize,
    },
}

impl KSelection
{
    /// Target group count that was chosen
    pub fn k(&self) -> usize
    {
        match self
        {
            KSelection::Trivial => 1,
            KSelection::Scored { k, .. } | KSelection::Fallback { k } => *k,
        }
    }

    pub fn is_fallback(&self) -> bool
    {
        matches!(self, KSelection::Fallback { .. })
    }
}

impl fmt::Display for KSelection
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        match self
        {
            KSelection::Trivial => write!(f, "trivial (<= 2 items)"),
            KSelection::Scored { k, silhouette } => write!(f, "k={k} (silhouette {silhouette:.3})"),
            KSelection::Fallback { k } => write!(f, "k={k} (fallback, unvalidated)"),
        }
    }
}

/// Full result of a compression run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult
{
    pub output: TieredOutput,
    pub total_items: usize,
    pub unique_items: usize,
    pub duplicate_items: usize,
    pub group_count: usize,
    pub k_selection: KSelection,
}

/// Outcome of a prune run
#[derive(Debug, Clone, Serialize)]
pub struct PruneResult
{
    pub output: TieredOutput,
    pub original_group_count: usize,
    pub pruned_group_count: usize,

    /// Labels removed by the floor filter or the budget loop, in removal order
    pub removed_labels: Vec<String>,

    /// (survivor label, consumed label) for every merge
    pub merged_pairs: Vec<(String, String)>,

    /// Estimated tokens of the remaining output
    pub output_token_count: usize,

    /// Requested budget (0 = unlimited)
    pub budget: usize,
}

impl PruneResult
{
    /// True when the one-group floor stopped the budget loop early
    pub fn over_budget(&self) -> bool
    {
        self.budget > 0 && self.output_token_count > self.budget
    }
}
