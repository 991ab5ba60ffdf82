use crate::cli::AnalyzeArgs;
use crate::config::build_analysis_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use fepkit::engine::estimator::{DirectionTotal, FreeEnergySummary, PathEstimate};
use fepkit::engine::progress::ProgressReporter;
use fepkit::workflows;
use tracing::{info, warn};

pub fn run(args: AnalyzeArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let config = build_analysis_config(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Analyzing '{}' at {} K ({} sampling)...",
        config.calculation_path.display(),
        config.temperature,
        config.sampling
    );
    let result = workflows::analysis::run(&config, &reporter)?;

    if result.windows.is_empty() {
        warn!("No windows were found; nothing to report.");
        println!("Warning: no window folders were found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<16} {:>9} {:>12} {:>10} {:>8}",
        "Window", "Direction", "dG", "SE", "Samples"
    );
    for window in &result.windows {
        let estimate = &window.estimate;
        let (delta_g, error) = match (estimate.delta_g(), estimate.standard_error()) {
            (Some(dg), Some(se)) => (format!("{dg:.5}"), format!("{se:.5}")),
            _ => ("-".to_string(), "-".to_string()),
        };
        println!(
            "{:<16} {:>9} {:>12} {:>10} {:>8}",
            window.window.folder_name(),
            window.window.direction(),
            delta_g,
            error,
            estimate.samples()
        );
    }

    if result.channels.len() > 1 {
        for channel in &result.channels {
            println!();
            println!("{} stage:", channel.channel);
            print_summary(&channel.summary, &channel.path);
        }
    }
    println!();
    println!("Overall:");
    print_summary(&result.overall, &result.path);

    if let Some(path) = &config.report_path {
        println!("✓ Window table written to: {}", path.display());
    }

    Ok(())
}

fn print_summary(summary: &FreeEnergySummary, path: &PathEstimate) {
    match path {
        PathEstimate::DoubleWide(total) => {
            print_total("forward", &summary.forward);
            print_total("backward", &summary.backward);
            print_total("path (f - b)", total);
        }
        PathEstimate::DoubleEnded { forward, reverse } => {
            print_total("forward", forward);
            print_total("reverse (-b)", reverse);
        }
    }
    if summary.empty_windows > 0 {
        println!("  {} window(s) had no samples", summary.empty_windows);
    }
}

fn print_total(label: &str, total: &DirectionTotal) {
    println!(
        "  {:<14} dG = {:>10.5} +/- {:.5} kcal/mol ({} windows)",
        label, total.delta_g, total.standard_error, total.windows
    );
}
