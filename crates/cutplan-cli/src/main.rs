use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use cutplan_core::{CutPlanData, CutPlanRequest, CutPlanner, PackSettings};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cutplan")]
#[command(about = "Cutting plan generator - pack furniture parts onto stock sheets", long_about = None)]
struct Cli {
    /// Print engine logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack piece demands onto stock sheets
    Pack {
        /// Input file with settings and demands (YAML or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the cut plan (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        overrides: SettingsOverrides,
    },

    /// Summarize a saved cut plan per material
    Materials {
        /// Cut plan file (JSON)
        #[arg(short, long)]
        input: PathBuf,
    },
}

/// Command-line values that win over the input file's settings
#[derive(clap::Args)]
struct SettingsOverrides {
    /// Stock sheet width in mm
    #[arg(long)]
    sheet_width: Option<u32>,

    /// Stock sheet height in mm
    #[arg(long)]
    sheet_height: Option<u32>,

    /// Saw kerf in mm
    #[arg(long)]
    kerf: Option<u32>,

    /// Allow pieces to be turned by 90 degrees
    #[arg(long)]
    rotate: bool,

    /// Refuse inputs with more pieces than this
    #[arg(long)]
    max_pieces: Option<u64>,
}

impl SettingsOverrides {
    fn apply(&self, settings: &mut PackSettings) {
        if let Some(width) = self.sheet_width {
            settings.sheet_width = width;
        }
        if let Some(height) = self.sheet_height {
            settings.sheet_height = height;
        }
        if let Some(kerf) = self.kerf {
            settings.kerf = kerf;
        }
        if self.rotate {
            settings.allow_rotation = true;
        }
        if let Some(max_pieces) = self.max_pieces {
            settings.max_pieces = max_pieces;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
    }

    match cli.command {
        Commands::Pack {
            input,
            output,
            overrides,
        } => {
            pack_command(&input, output, &overrides)?;
        }
        Commands::Materials { input } => {
            materials_command(&input)?;
        }
    }

    Ok(())
}

fn load_request(input: &Path) -> Result<CutPlanRequest> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;

    let request = match input.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    Ok(request)
}

fn pack_command(
    input: &Path,
    output: Option<PathBuf>,
    overrides: &SettingsOverrides,
) -> Result<()> {
    println!("{}", "🔍 Loading demands...".bright_blue());

    let mut request = load_request(input)?;
    overrides.apply(&mut request.settings);

    let settings = request.settings;
    let piece_count: u64 = request.demands.iter().map(|d| d.quantity as u64).sum();
    println!(
        "  {} demands, {} pieces",
        request.demands.len().to_string().bright_white().bold(),
        piece_count.to_string().bright_white().bold()
    );
    println!(
        "  Sheet {}x{} mm, kerf {} mm{}",
        settings.sheet_width,
        settings.sheet_height,
        settings.kerf,
        if settings.allow_rotation {
            ", rotation on"
        } else {
            ""
        }
    );
    println!();

    println!("{}", "🚀 Packing...".bright_blue());

    let planner = CutPlanner::new(settings)?;
    let plan = planner.plan(&request.demands)?;

    println!();
    println!("{}", "✅ Cut plan ready!".bright_green().bold());
    println!();

    print_plan(&plan);

    let json = serde_json::to_string_pretty(&plan)?;
    if let Some(output_path) = output {
        std::fs::write(&output_path, json)
            .with_context(|| format!("writing {}", output_path.display()))?;
        println!(
            "💾 Saved cut plan to {}",
            output_path.display().to_string().bright_white()
        );
    } else {
        println!("{}", json);
    }

    Ok(())
}

fn print_plan(plan: &CutPlanData) {
    println!("{}", "📊 Results:".bright_yellow().bold());
    for sheet in &plan.sheets {
        println!(
            "    • Sheet {} ({}): {} pieces, {:.1}% used",
            sheet.index + 1,
            sheet.key.to_string().bright_white(),
            sheet.placed_pieces.len(),
            sheet.utilization
        );
    }
    println!();
    println!(
        "  Total sheets: {}",
        plan.total_sheets.to_string().bright_white().bold()
    );
    println!(
        "  Average utilization: {}",
        format!("{:.1}%", plan.average_utilization).bright_white()
    );
    println!(
        "  Waste: {} mm²",
        plan.total_waste_area.to_string().bright_white()
    );
    println!(
        "  Edge banding: {} mm (top {}, bottom {}, left {}, right {})",
        plan.total_cut_length.to_string().bright_green(),
        plan.edge_banding.top,
        plan.edge_banding.bottom,
        plan.edge_banding.left,
        plan.edge_banding.right
    );
    println!();
}

fn materials_command(input: &Path) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let plan: CutPlanData = serde_json::from_str(&content)?;

    println!("{}", "📦 Materials:".bright_yellow().bold());
    for summary in plan.material_summaries() {
        let totals = &summary.totals;
        println!(
            "    • {}: {} sheets, {} pieces, {:.2} m², {:.2} m banding",
            totals.key.to_string().bright_white(),
            summary.sheet_count,
            totals.piece_count,
            totals.total_area as f64 / 1_000_000.0,
            totals.edge_banding_length as f64 / 1000.0
        );
    }

    Ok(())
}
