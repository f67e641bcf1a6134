use crate::types::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

mod grouper;
mod shelf;
mod summary;

pub use grouper::{group_demands, MaterialGroup, PieceInstance};
pub use shelf::ShelfPacker;
pub use summary::{aggregate, material_totals};

/// Strategy that lays out the pieces of one material group on stock sheets.
///
/// Implementations must place every instance of the group exactly once,
/// keep pieces inside the sheet and never overlap them. Sheet indices are
/// group-local; the planner renumbers them across the whole plan.
pub trait Packer {
    fn name(&self) -> &'static str;

    fn pack_group(
        &self,
        group: &MaterialGroup<'_>,
        settings: &PackSettings,
        cancelled: &AtomicBool,
    ) -> Result<Vec<Sheet>>;
}

/// Turns a list of piece demands into a cutting plan.
pub struct CutPlanner<P = ShelfPacker> {
    settings: PackSettings,
    packer: P,
    cancelled: Arc<AtomicBool>,
}

impl CutPlanner<ShelfPacker> {
    /// Validates settings and builds a planner using the shelf packer.
    pub fn new(settings: PackSettings) -> Result<Self> {
        Self::with_packer(settings, ShelfPacker)
    }
}

impl<P: Packer> CutPlanner<P> {
    /// Validates settings and builds a planner around a custom packing strategy.
    pub fn with_packer(settings: PackSettings, packer: P) -> Result<Self> {
        if settings.sheet_width == 0 || settings.sheet_height == 0 {
            return Err(CutPlanError::InvalidSettings(format!(
                "sheet size {}x{} mm must be positive in both directions",
                settings.sheet_width, settings.sheet_height
            )));
        }

        Ok(Self {
            settings,
            packer,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shares an externally owned cancellation flag with this planner.
    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Returns a handle that aborts a running plan when set to `true`.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Runs grouping, packing and aggregation over the demands.
    ///
    /// All demands are validated before the first sheet is created.
    pub fn plan(&self, demands: &[PieceDemand]) -> Result<CutPlanData> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(CutPlanError::Cancelled);
        }

        let groups = group_demands(demands, self.settings.max_pieces)?;

        let mut group_sheets = Vec::with_capacity(groups.len());
        for group in &groups {
            let sheets = self
                .packer
                .pack_group(group, &self.settings, &self.cancelled)?;
            debug!(
                material = %group.key,
                pieces = group.instances.len(),
                sheets = sheets.len(),
                packer = self.packer.name(),
                "packed material group"
            );
            group_sheets.push(sheets);
        }

        let plan = aggregate(&self.settings, demands, group_sheets)?;

        info!(
            groups = groups.len(),
            sheets = plan.total_sheets,
            pieces = plan.total_pieces,
            utilization = plan.average_utilization,
            "cut plan ready"
        );

        Ok(plan)
    }
}

/// Packs demands onto sheets of the given size with the default kerf and no rotation.
pub fn pack(demands: &[PieceDemand], sheet_width: u32, sheet_height: u32) -> Result<CutPlanData> {
    let settings = PackSettings {
        sheet_width,
        sheet_height,
        ..PackSettings::default()
    };
    CutPlanner::new(settings)?.plan(demands)
}
