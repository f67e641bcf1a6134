//! End-to-end scenarios through the public planning API.

use cutplan_core::{
    pack, CutPlanError, CutPlanRequest, CutPlanner, EdgeBanding, PackSettings, PieceDemand,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn demand(material: &str, width: u32, depth: u32, quantity: u32) -> PieceDemand {
    PieceDemand {
        label: format!("{}x{}", width, depth),
        material: material.to_string(),
        color: "White".to_string(),
        thickness: "15mm".to_string(),
        width,
        depth,
        quantity,
        edges: EdgeBanding::default(),
    }
}

#[test]
fn test_two_pieces_share_one_sheet() {
    let plan = pack(&[demand("MDF/White/15mm", 700, 400, 2)], 2750, 1830).unwrap();

    assert_eq!(plan.total_sheets, 1);
    let pieces = &plan.sheets[0].placed_pieces;
    assert_eq!(pieces.len(), 2);
    assert!(!pieces[0].overlaps(&pieces[1]));

    let expected = 2.0 * 700.0 * 400.0 / (2750.0 * 1830.0) * 100.0;
    assert!((plan.sheets[0].utilization - expected).abs() < 1e-9);
    assert!((plan.average_utilization - 11.13).abs() < 0.01);
}

#[test]
fn test_materials_never_share_a_sheet() {
    let demands = vec![demand("MDF", 500, 500, 1), demand("Oak", 500, 500, 1)];
    let plan = pack(&demands, 2750, 1830).unwrap();

    assert_eq!(plan.total_sheets, 2);
    assert_eq!(plan.sheets[0].key.material, "MDF");
    assert_eq!(plan.sheets[1].key.material, "Oak");
    assert!(plan.sheets.iter().all(|s| s.placed_pieces.len() == 1));
}

#[test]
fn test_piece_larger_than_sheet_in_every_orientation() {
    let settings = PackSettings {
        allow_rotation: true,
        ..PackSettings::default()
    };
    let result = CutPlanner::new(settings)
        .unwrap()
        .plan(&[demand("MDF", 3000, 2000, 1)]);

    assert!(matches!(result, Err(CutPlanError::PieceTooLarge { .. })));
}

#[test]
fn test_fifty_identical_pieces_spill_over_sheets() {
    let plan = pack(&[demand("MDF", 900, 600, 50)], 2750, 1830).unwrap();
    let sheet_area = 2750u64 * 1830;

    // Three per row, three rows per sheet with a 5 mm kerf.
    assert_eq!(plan.total_sheets, 6);
    assert_eq!(plan.sheets[0].placed_pieces.len(), 9);
    assert_eq!(plan.sheets[5].placed_pieces.len(), 5);
    assert_eq!(plan.total_pieces, 50);
    assert_eq!(plan.total_used_area, 50 * 900 * 600);
    assert_eq!(
        plan.total_waste_area,
        plan.total_sheets as u64 * sheet_area - plan.total_used_area
    );
}

#[test]
fn test_zero_quantity_is_rejected() {
    let result = pack(&[demand("MDF", 900, 600, 0)], 2750, 1830);
    assert!(matches!(
        result,
        Err(CutPlanError::InvalidDemand { index: 0, .. })
    ));
}

#[test]
fn test_request_with_custom_sheet_and_banding() {
    let request: CutPlanRequest = serde_json::from_str(
        r#"{
            "settings": { "sheet_width": 2750, "sheet_height": 1850, "kerf": 4 },
            "demands": [
                { "label": "Side", "material": "Chipboard", "color": "Oak", "thickness": "18",
                  "width": 720, "depth": 560, "quantity": 2, "edge_top": true, "edge_left": "1" }
            ]
        }"#,
    )
    .unwrap();

    let plan = CutPlanner::new(request.settings)
        .unwrap()
        .plan(&request.demands)
        .unwrap();
    assert_eq!(plan.sheets[0].height, 1850);
    assert_eq!(plan.total_cut_length, 2 * (720 + 560));

    let summaries = plan.material_summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].sheet_count, 1);
    assert_eq!(summaries[0].totals.total_area, 2 * 720 * 560);
}

#[test]
fn test_shared_cancellation_flag() {
    let flag = Arc::new(AtomicBool::new(true));
    let planner = CutPlanner::new(PackSettings::default())
        .unwrap()
        .with_cancellation(Arc::clone(&flag));

    let result = planner.plan(&[demand("MDF", 100, 100, 1000)]);
    assert!(matches!(result, Err(CutPlanError::Cancelled)));
}
