use crate::cli::ScheduleArgs;
use crate::config::build_schedule_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use fepkit::engine::progress::ProgressReporter;
use fepkit::workflows;
use tracing::info;

pub fn run(args: ScheduleArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let config = build_schedule_config(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Generating {} templates with {} sampling...",
        if config.stages.is_split() {
            "split-channel"
        } else {
            "dual-channel"
        },
        config.sampling
    );
    let result = workflows::alchemy::run(&config, &reporter)?;

    let topology = &result.topology;
    println!(
        "Fragment of {} atoms {} along lambda ({} linker bonds).",
        topology.fragment_atom_ids().count(),
        if topology.explicit_is_final() {
            "grows"
        } else {
            "vanishes"
        },
        topology.connecting_bonds().count()
    );
    println!(
        "✓ {} templates written under: {}",
        result.templates.len(),
        config.output_dir.display()
    );

    Ok(())
}
