use crate::types::*;
use std::collections::HashMap;

/// Concatenates per-group sheets, numbers them across the plan and computes
/// the project-wide statistics.
///
/// The result is checked against the demands: every demanded piece must be
/// placed exactly once and every sheet's area must balance.
pub fn aggregate(
    settings: &PackSettings,
    demands: &[PieceDemand],
    group_sheets: Vec<Vec<Sheet>>,
) -> Result<CutPlanData> {
    let mut sheets: Vec<Sheet> = group_sheets.into_iter().flatten().collect();
    for (index, sheet) in sheets.iter_mut().enumerate() {
        sheet.index = index;
    }

    reconcile(demands, &sheets)?;

    let total_sheets = sheets.len() as u32;
    let total_pieces: u64 = sheets.iter().map(|s| s.placed_pieces.len() as u64).sum();
    let total_waste_area: u64 = sheets.iter().map(|s| s.waste_area).sum();
    let total_used_area: u64 = sheets.iter().map(|s| s.area() - s.waste_area).sum();

    let mut edge_banding = EdgeBandingTotals::default();
    let mut perimeter_length = 0;
    for piece in sheets.iter().flat_map(|s| &s.placed_pieces) {
        edge_banding += piece.edge_banding();
        perimeter_length += piece.perimeter();
    }

    let average_utilization = if sheets.is_empty() {
        0.0
    } else {
        sheets.iter().map(|s| s.utilization).sum::<f64>() / sheets.len() as f64
    };

    Ok(CutPlanData {
        settings: *settings,
        sheets,
        total_sheets,
        total_pieces,
        total_used_area,
        total_waste_area,
        total_cut_length: edge_banding.total(),
        perimeter_length,
        edge_banding,
        average_utilization,
    })
}

fn reconcile(demands: &[PieceDemand], sheets: &[Sheet]) -> Result<()> {
    let demanded: u64 = demands.iter().map(|d| d.quantity as u64).sum();

    if demanded > 0 && sheets.is_empty() {
        return Err(CutPlanError::AggregationMismatch(format!(
            "{} pieces demanded but no sheets were produced",
            demanded
        )));
    }

    let placed: u64 = sheets.iter().map(|s| s.placed_pieces.len() as u64).sum();
    if placed != demanded {
        return Err(CutPlanError::AggregationMismatch(format!(
            "{} pieces placed but {} were demanded",
            placed, demanded
        )));
    }

    // Sized by pieces that already exist on the sheets.
    let mut seen = vec![false; placed as usize];
    for sheet in sheets {
        if sheet.waste_area + sheet.used_area() != sheet.area() {
            return Err(CutPlanError::AggregationMismatch(format!(
                "sheet {} ({}) does not balance: waste {} + used {} != {}",
                sheet.index,
                sheet.key,
                sheet.waste_area,
                sheet.used_area(),
                sheet.area()
            )));
        }

        for piece in &sheet.placed_pieces {
            match seen.get_mut(piece.sequence_index) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(CutPlanError::AggregationMismatch(format!(
                        "piece instance {} placed twice or not demanded",
                        piece.sequence_index
                    )))
                }
            }
        }
    }

    if let Some(missing) = seen.iter().position(|placed| !placed) {
        return Err(CutPlanError::AggregationMismatch(format!(
            "piece instance {} of {} was never placed",
            missing, demanded
        )));
    }

    Ok(())
}

/// Piece count, area and banding per material, straight from the demands.
///
/// Materials are listed in the order they are first seen.
pub fn material_totals(demands: &[PieceDemand]) -> Vec<MaterialTotals> {
    let mut totals: Vec<MaterialTotals> = Vec::new();
    let mut positions: HashMap<MaterialKey, usize> = HashMap::new();

    for demand in demands {
        let key = demand.key();
        let position = *positions.entry(key.clone()).or_insert_with(|| {
            totals.push(empty_totals(key));
            totals.len() - 1
        });

        let count = demand.quantity as u64;
        let entry = &mut totals[position];
        entry.piece_count += count;
        entry.total_area += demand.area() * count;
        entry.edge_banding_length += demand.edge_banding().times(count).total();
    }

    totals
}

impl CutPlanData {
    /// Re-aggregates the plan by material for cost reporting.
    pub fn material_summaries(&self) -> Vec<MaterialSummary> {
        let mut summaries: Vec<MaterialSummary> = Vec::new();
        let mut positions: HashMap<&MaterialKey, usize> = HashMap::new();

        for sheet in &self.sheets {
            let position = *positions.entry(&sheet.key).or_insert_with(|| {
                summaries.push(MaterialSummary {
                    totals: empty_totals(sheet.key.clone()),
                    sheet_count: 0,
                });
                summaries.len() - 1
            });

            let summary = &mut summaries[position];
            summary.sheet_count += 1;
            for piece in &sheet.placed_pieces {
                summary.totals.piece_count += 1;
                summary.totals.total_area += piece.area();
                summary.totals.edge_banding_length += piece.edge_banding().total();
            }
        }

        summaries
    }
}

fn empty_totals(key: MaterialKey) -> MaterialTotals {
    MaterialTotals {
        key,
        piece_count: 0,
        total_area: 0,
        edge_banding_length: 0,
    }
}
