use super::grouper::{MaterialGroup, PieceInstance};
use super::Packer;
use crate::types::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{trace, warn};

/// Next-fit-decreasing shelf packer.
///
/// Pieces are sorted by descending area and laid out left to right in rows
/// ("shelves"). Each sheet only ever offers its open shelf and one new shelf
/// below it; sheets are tried in creation order and a new sheet is opened
/// when none of them takes the piece.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShelfPacker;

impl Packer for ShelfPacker {
    fn name(&self) -> &'static str {
        "shelf"
    }

    fn pack_group(
        &self,
        group: &MaterialGroup<'_>,
        settings: &PackSettings,
        cancelled: &AtomicBool,
    ) -> Result<Vec<Sheet>> {
        if let Some(instance) = group
            .instances
            .iter()
            .find(|instance| !fits_on_empty_sheet(instance, settings))
        {
            return Err(too_large(instance, settings));
        }

        let mut order: Vec<&PieceInstance<'_>> = group.instances.iter().collect();
        order.sort_by(|a, b| {
            b.area()
                .cmp(&a.area())
                .then_with(|| a.sequence_index.cmp(&b.sequence_index))
        });

        let mut sheets: Vec<SheetBuilder> = Vec::new();

        for instance in order {
            if cancelled.load(Ordering::Relaxed) {
                warn!(material = %group.key, "packing cancelled");
                return Err(CutPlanError::Cancelled);
            }

            let target = sheets.iter().enumerate().find_map(|(idx, sheet)| {
                sheet
                    .try_place(instance, settings)
                    .map(|placement| (idx, placement))
            });

            match target {
                Some((idx, placement)) => sheets[idx].push(placement),
                None => {
                    let mut sheet = SheetBuilder::new(sheets.len());
                    let placement = sheet
                        .try_place(instance, settings)
                        .ok_or_else(|| too_large(instance, settings))?;
                    trace!(material = %group.key, sheet = sheet.index, "opened sheet");
                    sheet.push(placement);
                    sheets.push(sheet);
                }
            }
        }

        Ok(sheets
            .into_iter()
            .map(|sheet| sheet.finish(&group.key, settings))
            .collect())
    }
}

/// Next free position on a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ShelfCursor {
    pub x: u32,
    pub y: u32,
    /// Height of the tallest piece on the open shelf
    pub shelf_height: u32,
}

impl ShelfCursor {
    /// Derives the cursor from the pieces already on a sheet.
    ///
    /// The open shelf is the run of trailing pieces sharing the last piece's `y`.
    pub(super) fn from_placed(placed: &[PlacedPiece], kerf: u32) -> Self {
        let Some(last) = placed.last() else {
            return Self {
                x: 0,
                y: 0,
                shelf_height: 0,
            };
        };

        let shelf_height = placed
            .iter()
            .rev()
            .take_while(|piece| piece.y == last.y)
            .map(|piece| piece.height)
            .max()
            .unwrap_or(last.height);

        Self {
            x: last.x.saturating_add(last.width).saturating_add(kerf),
            y: last.y,
            shelf_height,
        }
    }

    /// Cursor at the start of a new shelf below the open one.
    pub(super) fn next_shelf(self, kerf: u32) -> Self {
        Self {
            x: 0,
            y: self
                .y
                .saturating_add(self.shelf_height)
                .saturating_add(kerf),
            shelf_height: 0,
        }
    }

    fn fits(&self, width: u32, height: u32, settings: &PackSettings) -> bool {
        self.x as u64 + width as u64 <= settings.sheet_width as u64
            && self.y as u64 + height as u64 <= settings.sheet_height as u64
    }
}

/// Sheet under construction; frozen into a [`Sheet`] once the group is packed.
#[derive(Debug)]
pub(super) struct SheetBuilder {
    index: usize,
    placed: Vec<PlacedPiece>,
}

impl SheetBuilder {
    pub(super) fn new(index: usize) -> Self {
        Self {
            index,
            placed: Vec::new(),
        }
    }

    pub(super) fn cursor(&self, kerf: u32) -> ShelfCursor {
        ShelfCursor::from_placed(&self.placed, kerf)
    }

    /// Tries the open shelf first, then a new shelf below it.
    pub(super) fn try_place(
        &self,
        instance: &PieceInstance<'_>,
        settings: &PackSettings,
    ) -> Option<PlacedPiece> {
        let cursor = self.cursor(settings.kerf);
        place_at(instance, cursor, settings)
            .or_else(|| place_at(instance, cursor.next_shelf(settings.kerf), settings))
    }

    pub(super) fn push(&mut self, placement: PlacedPiece) {
        self.placed.push(placement);
    }

    pub(super) fn finish(self, key: &MaterialKey, settings: &PackSettings) -> Sheet {
        let sheet_area = settings.sheet_area();
        let used_area: u64 = self.placed.iter().map(PlacedPiece::area).sum();
        let waste_area = sheet_area.saturating_sub(used_area);
        let utilization = if sheet_area > 0 {
            100.0 * (1.0 - waste_area as f64 / sheet_area as f64)
        } else {
            0.0
        };

        Sheet {
            index: self.index,
            key: key.clone(),
            width: settings.sheet_width,
            height: settings.sheet_height,
            placed_pieces: self.placed,
            waste_area,
            utilization,
        }
    }
}

/// Places the piece as given at the cursor, falling back to rotation when allowed.
fn place_at(
    instance: &PieceInstance<'_>,
    cursor: ShelfCursor,
    settings: &PackSettings,
) -> Option<PlacedPiece> {
    if cursor.fits(instance.width(), instance.depth(), settings) {
        return Some(placement(instance, cursor, false));
    }

    if settings.allow_rotation {
        try_rotate(instance, cursor, settings)
    } else {
        None
    }
}

/// Places the piece turned by 90 degrees if that footprint fits at the cursor.
///
/// Square pieces never rotate since turning them changes nothing.
pub(super) fn try_rotate(
    instance: &PieceInstance<'_>,
    cursor: ShelfCursor,
    settings: &PackSettings,
) -> Option<PlacedPiece> {
    if instance.width() == instance.depth() {
        return None;
    }

    cursor
        .fits(instance.depth(), instance.width(), settings)
        .then(|| placement(instance, cursor, true))
}

fn placement(instance: &PieceInstance<'_>, cursor: ShelfCursor, rotated: bool) -> PlacedPiece {
    let (width, height) = if rotated {
        (instance.depth(), instance.width())
    } else {
        (instance.width(), instance.depth())
    };

    PlacedPiece {
        sequence_index: instance.sequence_index,
        demand_index: instance.demand_index,
        label: instance.demand.label.clone(),
        x: cursor.x,
        y: cursor.y,
        width,
        height,
        rotated,
        edges: instance.demand.edges,
    }
}

/// Whether the piece fits an empty sheet in any allowed orientation.
pub(super) fn fits_on_empty_sheet(instance: &PieceInstance<'_>, settings: &PackSettings) -> bool {
    let (width, depth) = (instance.width(), instance.depth());
    let upright = width <= settings.sheet_width && depth <= settings.sheet_height;
    let turned =
        settings.allow_rotation && depth <= settings.sheet_width && width <= settings.sheet_height;
    upright || turned
}

fn too_large(instance: &PieceInstance<'_>, settings: &PackSettings) -> CutPlanError {
    CutPlanError::PieceTooLarge {
        demand_index: instance.demand_index,
        label: instance.demand.label.clone(),
        material: instance.demand.key(),
        width: instance.width(),
        depth: instance.depth(),
        sheet_width: settings.sheet_width,
        sheet_height: settings.sheet_height,
    }
}
