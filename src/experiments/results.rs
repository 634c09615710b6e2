use std::io::{self, Write};

use fixcheck_experiments::{
    cli,
    error::Result,
    logger,
    report::{collect_reports, export_csv, ResultsConfig},
    summary::write_report,
    targets::target_patches,
};

fn main() -> Result<()> {
    logger::init();
    let arguments = cli::results_cli();
    let config = ResultsConfig {
        dataset: arguments.dataset,
        results_root: arguments.results_root,
        assertion_generation: arguments.assertion_generation,
    };

    let collection = collect_reports(&config, &target_patches())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_report(&collection, &mut out)?;
    out.flush()?;

    if let Some(path) = arguments.export {
        export_csv(&collection.reports, &path)?;
        tracing::info!(path = %path.display(), patches = collection.reports.len(), "exported per-patch table");
    }
    Ok(())
}
