//! Data models for infrastructure segments, buildings and planning results

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use crate::error::{PlanError, PlanResult};

/// Physical kind of a connection segment, or the `Intact` sentinel for
/// segments that need no work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentKind {
    Aerial,
    SemiAerial,
    Conduit,
    Intact,
    /// Anything the loader could not map; the cost model rejects it.
    Other(String),
}

impl SegmentKind {
    /// Map an already-normalized token (lowercase, ascii, `-` separated).
    pub fn from_normalized(token: &str) -> Self {
        match token {
            "aerial" | "aerien" => Self::Aerial,
            "semi-aerial" | "semiaerial" | "semi-aerien" | "semiaerien" => Self::SemiAerial,
            "conduit" | "fourreau" | "fouraux" => Self::Conduit,
            "intact" | "infra-intacte" | "intacte" => Self::Intact,
            other => Self::Other(other.to_string()),
        }
    }

    /// Lower is faster to repair. Only the three repairable kinds are ranked.
    pub fn speed_rank(&self) -> Option<u8> {
        match self {
            Self::Aerial => Some(0),
            Self::SemiAerial => Some(1),
            Self::Conduit => Some(2),
            Self::Intact | Self::Other(_) => None,
        }
    }

    pub fn is_intact(&self) -> bool {
        matches!(self, Self::Intact)
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aerial => write!(f, "aerial"),
            Self::SemiAerial => write!(f, "semi-aerial"),
            Self::Conduit => write!(f, "conduit"),
            Self::Intact => write!(f, "intact"),
            Self::Other(raw) => write!(f, "{}", raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildingType {
    Hospital,
    School,
    Residential,
}

impl BuildingType {
    /// Anything that is neither a hospital nor a school is residential.
    pub fn from_normalized(token: &str) -> Self {
        if token.contains("hopital") || token.contains("hospital") {
            Self::Hospital
        } else if token.contains("ecole") || token.contains("school") {
            Self::School
        } else {
            Self::Residential
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hospital => "hospital",
            Self::School => "school",
            Self::Residential => "residential",
        }
    }
}

impl fmt::Display for BuildingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repair difficulty: length per house served.
///
/// Kept as a tagged value instead of an IEEE infinity so that ordering and
/// summation stay explicit. Finite values are always non-negative.
#[derive(Debug, Clone, Copy)]
pub enum Difficulty {
    Finite(f64),
    Infinite,
}

impl Difficulty {
    pub const ZERO: Difficulty = Difficulty::Finite(0.0);

    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::Infinite)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Finite(v) if *v == 0.0)
    }

    /// The `(is_infinite, value)` view; infinite difficulties report `f64::INFINITY`.
    pub fn value(&self) -> f64 {
        match self {
            Self::Finite(v) => *v,
            Self::Infinite => f64::INFINITY,
        }
    }
}

impl PartialEq for Difficulty {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Difficulty {}

impl PartialOrd for Difficulty {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Difficulty {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Finite(a), Self::Finite(b)) => a.total_cmp(b),
            (Self::Finite(_), Self::Infinite) => Ordering::Less,
            (Self::Infinite, Self::Finite(_)) => Ordering::Greater,
            (Self::Infinite, Self::Infinite) => Ordering::Equal,
        }
    }
}

impl Add for Difficulty {
    type Output = Difficulty;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::Finite(a), Self::Finite(b)) => Self::Finite(a + b),
            _ => Self::Infinite,
        }
    }
}

impl Sum for Difficulty {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        let mut total = Self::ZERO;
        for d in iter {
            total = total + d;
            if total.is_infinite() {
                break;
            }
        }
        total
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(v) => write!(f, "{:.3}", v),
            Self::Infinite => write!(f, "inf"),
        }
    }
}

/// Total scheduling order: difficulty first, then building id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DifficultyKey<'a> {
    pub difficulty: Difficulty,
    pub building_id: &'a str,
}

/// One normalized input row as handed over by the loader
#[derive(Debug, Clone)]
pub struct InputRow {
    pub building_id: String,
    pub building_type: BuildingType,
    pub infra_id: String,
    pub infra_kind: SegmentKind,
    pub length: f64,
    pub house_count: i64,
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub id: String,
    pub length: f64,
    /// Kind as loaded; stays readable after the segment is repaired.
    pub kind: SegmentKind,
    pub house_count: u32,
    repaired: bool,
}

impl Segment {
    /// Build a segment, rejecting negative or non-finite measurements.
    /// Segments loaded as `Intact` start out repaired.
    pub fn new(id: impl Into<String>, length: f64, kind: SegmentKind, house_count: i64) -> PlanResult<Self> {
        let id = id.into();
        if !length.is_finite() || length < 0.0 {
            return Err(PlanError::InvalidSegment {
                id,
                reason: format!("length must be a non-negative number, got {}", length),
            });
        }
        let house_count = u32::try_from(house_count).map_err(|_| PlanError::InvalidSegment {
            id: id.clone(),
            reason: format!("house count must be a non-negative integer, got {}", house_count),
        })?;
        let repaired = kind.is_intact();
        Ok(Self {
            id,
            length,
            kind,
            house_count,
            repaired,
        })
    }

    pub fn is_repaired(&self) -> bool {
        self.repaired
    }

    /// Whether this segment needed work when it was loaded
    pub fn needs_work(&self) -> bool {
        !self.kind.is_intact()
    }

    /// Returns true only if the segment was not already repaired.
    pub(crate) fn mark_repaired(&mut self) -> bool {
        !std::mem::replace(&mut self.repaired, true)
    }
}

#[derive(Debug, Clone)]
pub struct Building {
    pub id: String,
    pub building_type: BuildingType,
    /// Referenced segment ids, duplicates collapsed
    pub segments: Vec<String>,
}

impl Building {
    pub fn new(id: impl Into<String>, building_type: BuildingType) -> Self {
        Self {
            id: id.into(),
            building_type,
            segments: Vec::new(),
        }
    }

    pub fn with_segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for segment in segments {
            self.add_segment(segment);
        }
        self
    }

    pub fn add_segment(&mut self, segment: impl Into<String>) {
        let segment = segment.into();
        if !self.segments.contains(&segment) {
            self.segments.push(segment);
        }
    }
}

/// One step of the repair plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub step: usize,
    pub building_id: String,
    pub difficulty: Difficulty,
    pub segments_repaired: usize,
    /// Houses served by the segments still unrepaired at selection
    pub houses: u64,
    /// Length of the segments still unrepaired at selection
    pub length: f64,
}

/// One segment worked on for a building, with its own cost
#[derive(Debug, Clone, PartialEq)]
pub struct CostedSegment {
    pub id: String,
    pub kind: SegmentKind,
    pub length: f64,
    pub person_hours: f64,
    /// Calendar hours with the effective crew
    pub duration: f64,
    pub material_cost: f64,
    pub labor_cost: f64,
}

impl CostedSegment {
    pub fn total_cost(&self) -> f64 {
        self.material_cost + self.labor_cost
    }
}

/// A building placed in a work phase, with its aggregate cost
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseAssignment {
    pub phase: u8,
    pub building_id: String,
    pub building_type: BuildingType,
    pub material_cost: f64,
    pub labor_cost: f64,
    pub duration: f64,
    /// Segments worked on for this building, by id
    pub segments: Vec<CostedSegment>,
}

impl PhaseAssignment {
    pub fn total_cost(&self) -> f64 {
        self.material_cost + self.labor_cost
    }

    pub fn segment_ids(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.id.as_str())
    }
}
