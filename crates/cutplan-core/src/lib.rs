//! Cutting-plan engine: packs rectangular furniture pieces onto stock sheets.
//!
//! Demands are grouped by material, each group is packed by a [`Packer`]
//! (the shelf heuristic in [`ShelfPacker`] by default), and the sheets are
//! rolled up into a [`CutPlanData`].

pub mod planner;
pub mod types;

pub use planner::{
    aggregate, group_demands, material_totals, pack, CutPlanner, MaterialGroup, Packer,
    PieceInstance, ShelfPacker,
};
pub use types::*;
