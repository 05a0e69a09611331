use nalgebra::Vector3;
use std::env;
use std::fs;
use std::path::Path;
use tree_detector::config::load_config;
use tree_detector::diagnostics::DetectionReport;
use tree_detector::{PointCloud, TreeDetector};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args()
        .nth(1)
        .ok_or_else(|| "usage: tree-detector <config.json>".to_string())?;
    let config = load_config(Path::new(&config_path))?;

    let cloud = load_cloud(&config.input_path)?;
    let detector = TreeDetector::new(config.detector_params.clone());
    let report = detector
        .process_with_diagnostics(&cloud)
        .map_err(|e| e.to_string())?;

    print_text_summary(&report);

    if let Some(path) = &config.output.json_out {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize JSON: {e}"))?;
        fs::write(path, json).map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
        println!("\nJSON report written to {}", path.display());
    }

    Ok(())
}

/// Whitespace-separated `x y z` or `x y z h` rows; `#` starts a comment.
fn load_cloud(path: &Path) -> Result<PointCloud, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read cloud {}: {e}", path.display()))?;

    let mut points = Vec::new();
    let mut heights = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<f64> = line
            .split_whitespace()
            .map(|f| {
                f.parse::<f64>()
                    .map_err(|e| format!("{}:{}: {e}", path.display(), lineno + 1))
            })
            .collect::<Result<_, _>>()?;
        match fields.as_slice() {
            [x, y, z] => points.push(Vector3::new(*x, *y, *z)),
            [x, y, z, h] => {
                points.push(Vector3::new(*x, *y, *z));
                heights.push(*h);
            }
            _ => {
                return Err(format!(
                    "{}:{}: expected 3 or 4 columns, got {}",
                    path.display(),
                    lineno + 1,
                    fields.len()
                ))
            }
        }
    }

    let cloud = if heights.is_empty() {
        PointCloud::new(points)
    } else {
        PointCloud::with_normalized_heights(points, heights)
    };
    cloud.map_err(|e| e.to_string())
}

fn print_text_summary(report: &DetectionReport) {
    let plot = &report.plot;
    println!("Detection summary");
    println!("  points: {}", report.trace.input.points);
    println!("  stripe points: {}", report.trace.input.stripe_points);
    println!("  trees: {}", plot.trees.len());
    println!("  latency_ms: {:.3}", plot.latency_ms);
    for tree in &plot.trees {
        let dbh = tree
            .dbh
            .diameter
            .map(|d| format!("{:.3}", d))
            .unwrap_or_else(|| "-".to_string());
        let height = tree
            .height
            .map(|h| format!("{:.2}", h))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  tree {:>3}: at ({:>7.2}, {:>7.2})  height {}  dbh {}  points {}",
            tree.id, tree.location[0], tree.location[1], height, dbh, tree.point_count
        );
    }
    for stage in &report.trace.timings.stages {
        println!("    {:>8}: {:.2} ms", stage.label, stage.elapsed_ms);
    }
}
