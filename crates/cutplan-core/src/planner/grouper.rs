use crate::types::*;
use std::collections::HashMap;

/// One unit of a demand's quantity.
#[derive(Debug, Clone, Copy)]
pub struct PieceInstance<'a> {
    /// Position in the expanded input, used to break sorting ties
    pub sequence_index: usize,
    pub demand_index: usize,
    pub demand: &'a PieceDemand,
}

impl PieceInstance<'_> {
    pub fn width(&self) -> u32 {
        self.demand.width
    }

    pub fn depth(&self) -> u32 {
        self.demand.depth
    }

    pub fn area(&self) -> u64 {
        self.demand.area()
    }
}

/// Instances sharing a material key, in input order.
#[derive(Debug, Clone)]
pub struct MaterialGroup<'a> {
    pub key: MaterialKey,
    pub instances: Vec<PieceInstance<'a>>,
}

/// Rejects any demand with a zero dimension or quantity, and the demand that
/// pushes the total piece count past `max_pieces`.
pub(super) fn validate_demands(demands: &[PieceDemand], max_pieces: u64) -> Result<()> {
    let mut piece_count: u64 = 0;
    for (index, demand) in demands.iter().enumerate() {
        piece_count += demand.quantity as u64;
        let reason = if demand.width == 0 {
            "width must be positive".to_string()
        } else if demand.depth == 0 {
            "depth must be positive".to_string()
        } else if demand.quantity == 0 {
            "quantity must be at least 1".to_string()
        } else if piece_count > max_pieces {
            format!(
                "quantity {} brings the plan to {} pieces, over the limit of {}",
                demand.quantity, piece_count, max_pieces
            )
        } else {
            continue;
        };

        return Err(CutPlanError::InvalidDemand {
            index,
            label: demand.label.clone(),
            reason,
        });
    }
    Ok(())
}

/// Validates all demands, then expands them into per-material groups.
///
/// Groups come out in the order their key is first seen. Expansion only
/// starts once the total piece count is known to be within `max_pieces`.
pub fn group_demands(
    demands: &[PieceDemand],
    max_pieces: u64,
) -> Result<Vec<MaterialGroup<'_>>> {
    validate_demands(demands, max_pieces)?;

    let mut groups: Vec<MaterialGroup<'_>> = Vec::new();
    let mut positions: HashMap<MaterialKey, usize> = HashMap::new();
    let mut sequence_index = 0;

    for (demand_index, demand) in demands.iter().enumerate() {
        let key = demand.key();
        let position = *positions.entry(key.clone()).or_insert_with(|| {
            groups.push(MaterialGroup {
                key,
                instances: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[position];
        for _ in 0..demand.quantity {
            group.instances.push(PieceInstance {
                sequence_index,
                demand_index,
                demand,
            });
            sequence_index += 1;
        }
    }

    Ok(groups)
}
