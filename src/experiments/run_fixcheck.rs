use fixcheck_experiments::{
    cli,
    error::Result,
    logger,
    runner::{run_subject, RunConfig},
};

/*
Runs FixCheck on a single subject of the defect-repairing dataset and moves everything it
produced to fixcheck-output/defects-repairing/<subject>/<assertion generation>.
*/

fn main() -> Result<()> {
    logger::init();
    let config = RunConfig::try_from(cli::runner_cli())?;
    let moved = run_subject(&config)?;
    println!("Moved {} outputs for {}", moved.len(), config.subject_id);
    Ok(())
}
