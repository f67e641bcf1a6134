use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Default stock sheet width in mm
pub const DEFAULT_SHEET_WIDTH: u32 = 2750;
/// Default stock sheet height in mm
pub const DEFAULT_SHEET_HEIGHT: u32 = 1830;
/// Default saw kerf (gap left between neighbouring pieces) in mm
pub const DEFAULT_KERF: u32 = 5;
/// Default cap on expanded piece instances per plan
pub const DEFAULT_MAX_PIECES: u64 = 100_000;

/// Stock sheet and saw settings shared by every group of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackSettings {
    #[serde(default = "default_sheet_width")]
    pub sheet_width: u32,
    #[serde(default = "default_sheet_height")]
    pub sheet_height: u32,
    #[serde(default = "default_kerf")]
    pub kerf: u32,
    /// Retry pieces turned by 90 degrees when they do not fit as given
    #[serde(default)]
    pub allow_rotation: bool,
    /// Upper bound on the summed quantity of all demands
    #[serde(default = "default_max_pieces")]
    pub max_pieces: u64,
}

fn default_sheet_width() -> u32 {
    DEFAULT_SHEET_WIDTH
}

fn default_sheet_height() -> u32 {
    DEFAULT_SHEET_HEIGHT
}

fn default_kerf() -> u32 {
    DEFAULT_KERF
}

fn default_max_pieces() -> u64 {
    DEFAULT_MAX_PIECES
}

impl Default for PackSettings {
    fn default() -> Self {
        Self {
            sheet_width: DEFAULT_SHEET_WIDTH,
            sheet_height: DEFAULT_SHEET_HEIGHT,
            kerf: DEFAULT_KERF,
            allow_rotation: false,
            max_pieces: DEFAULT_MAX_PIECES,
        }
    }
}

impl PackSettings {
    pub fn sheet_area(&self) -> u64 {
        self.sheet_width as u64 * self.sheet_height as u64
    }
}

/// Material, colour and thickness; pieces only share a sheet when these match
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialKey {
    pub material: String,
    pub color: String,
    pub thickness: String,
}

impl fmt::Display for MaterialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.material, self.thickness, self.color)
    }
}

/// Which edges of a piece get edge banding.
///
/// Top and bottom run along the piece width, left and right along its depth.
/// Accepts booleans, 0/1 and yes/no style strings from design exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeBanding {
    #[serde(rename = "edge_top", default, deserialize_with = "deserialize_flag")]
    pub top: bool,
    #[serde(rename = "edge_bottom", default, deserialize_with = "deserialize_flag")]
    pub bottom: bool,
    #[serde(rename = "edge_left", default, deserialize_with = "deserialize_flag")]
    pub left: bool,
    #[serde(rename = "edge_right", default, deserialize_with = "deserialize_flag")]
    pub right: bool,
}

impl EdgeBanding {
    /// Banding lengths for one piece of the given unrotated size.
    pub fn lengths(&self, width: u32, depth: u32) -> EdgeBandingTotals {
        let along = |flag: bool, length: u32| if flag { length as u64 } else { 0 };
        EdgeBandingTotals {
            top: along(self.top, width),
            bottom: along(self.bottom, width),
            left: along(self.left, depth),
            right: along(self.right, depth),
        }
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(value) => Ok(value != 0),
        Flag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "x" | "1" => Ok(true),
            "false" | "no" | "n" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid edge flag '{}'",
                other
            ))),
        },
    }
}

/// Edge banding length per edge, in mm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeBandingTotals {
    pub top: u64,
    pub bottom: u64,
    pub left: u64,
    pub right: u64,
}

impl EdgeBandingTotals {
    pub fn total(&self) -> u64 {
        self.top + self.bottom + self.left + self.right
    }

    /// Scales per-piece lengths up to a whole quantity.
    pub fn times(self, count: u64) -> Self {
        Self {
            top: self.top * count,
            bottom: self.bottom * count,
            left: self.left * count,
            right: self.right * count,
        }
    }
}

impl Add for EdgeBandingTotals {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            top: self.top + other.top,
            bottom: self.bottom + other.bottom,
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl AddAssign for EdgeBandingTotals {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// A request for `quantity` copies of one rectangular piece
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceDemand {
    /// Display name from the design file
    #[serde(default)]
    pub label: String,
    pub material: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub thickness: String,
    pub width: u32,
    pub depth: u32,
    pub quantity: u32,
    #[serde(flatten)]
    pub edges: EdgeBanding,
}

impl PieceDemand {
    pub fn key(&self) -> MaterialKey {
        MaterialKey {
            material: self.material.clone(),
            color: self.color.clone(),
            thickness: self.thickness.clone(),
        }
    }

    /// Footprint of a single piece in mm²
    pub fn area(&self) -> u64 {
        self.width as u64 * self.depth as u64
    }

    /// Banding needed for a single piece
    pub fn edge_banding(&self) -> EdgeBandingTotals {
        self.edges.lengths(self.width, self.depth)
    }
}

/// Placement of one piece instance on a sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedPiece {
    /// Position of the instance in the expanded input, unique within a plan
    pub sequence_index: usize,
    /// Index of the demand this instance came from
    pub demand_index: usize,
    pub label: String,
    /// Top-left corner in mm
    pub x: u32,
    pub y: u32,
    /// Footprint on the sheet after rotation
    pub width: u32,
    pub height: u32,
    pub rotated: bool,
    #[serde(flatten)]
    pub edges: EdgeBanding,
}

impl PlacedPiece {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// True when the open rectangles of both pieces intersect.
    pub fn overlaps(&self, other: &PlacedPiece) -> bool {
        (self.x as u64) < other.right()
            && (other.x as u64) < self.right()
            && (self.y as u64) < other.bottom()
            && (other.y as u64) < self.bottom()
    }

    /// Banding follows the piece, so lengths use the unrotated size.
    pub fn edge_banding(&self) -> EdgeBandingTotals {
        if self.rotated {
            self.edges.lengths(self.height, self.width)
        } else {
            self.edges.lengths(self.width, self.height)
        }
    }

    pub fn perimeter(&self) -> u64 {
        2 * (self.width as u64 + self.height as u64)
    }
}

/// A single stock sheet with its placed pieces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    /// 0-based; numbered within a group while packing, across the plan afterwards
    pub index: usize,
    #[serde(flatten)]
    pub key: MaterialKey,
    pub width: u32,
    pub height: u32,
    pub placed_pieces: Vec<PlacedPiece>,
    /// Sheet area not covered by pieces, in mm²
    pub waste_area: u64,
    /// Covered share of the sheet, 0-100
    pub utilization: f64,
}

impl Sheet {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn used_area(&self) -> u64 {
        self.placed_pieces.iter().map(PlacedPiece::area).sum()
    }
}

/// Piece count, area and banding for one material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialTotals {
    #[serde(flatten)]
    pub key: MaterialKey,
    pub piece_count: u64,
    /// Sum of piece areas in mm²
    pub total_area: u64,
    /// Sum of banded edge lengths in mm
    pub edge_banding_length: u64,
}

/// Per-material rollup handed to cost reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialSummary {
    #[serde(flatten)]
    pub totals: MaterialTotals,
    pub sheet_count: u32,
}

/// Input: demands plus the stock they are cut from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutPlanRequest {
    #[serde(default)]
    pub settings: PackSettings,
    pub demands: Vec<PieceDemand>,
}

/// Output: every sheet of the plan and the project-wide statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutPlanData {
    pub settings: PackSettings,
    pub sheets: Vec<Sheet>,
    pub total_sheets: u32,
    pub total_pieces: u64,
    pub total_used_area: u64,
    pub total_waste_area: u64,
    /// Total edge banding length in mm
    pub total_cut_length: u64,
    /// Sum of piece perimeters in mm, a rough measure of saw travel
    pub perimeter_length: u64,
    pub edge_banding: EdgeBandingTotals,
    pub average_utilization: f64,
}

/// Error type for cut planning
#[derive(Debug, thiserror::Error)]
pub enum CutPlanError {
    #[error("Invalid demand #{index} ('{label}'): {reason}")]
    InvalidDemand {
        index: usize,
        label: String,
        reason: String,
    },

    #[error(
        "Piece '{label}' (demand #{demand_index}, {material}) of {width}x{depth} mm does not fit on a {sheet_width}x{sheet_height} mm sheet"
    )]
    PieceTooLarge {
        demand_index: usize,
        label: String,
        material: MaterialKey,
        width: u32,
        depth: u32,
        sheet_width: u32,
        sheet_height: u32,
    },

    #[error("Aggregation mismatch: {0}")]
    AggregationMismatch(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Packing cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CutPlanError>;
