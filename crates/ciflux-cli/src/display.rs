use ciflux_core::{Matrix, StageListing};
use colored::*;
use std::path::Path;

/// Print the stage/job tree of a prepared pipeline.
pub fn print_matrix(source: &Path, matrix: &Matrix) {
    println!();
    println!(
        "{}",
        format!(
            " ciflux v{} — Pipeline for {}",
            env!("CARGO_PKG_VERSION"),
            source.display()
        )
        .bold()
    );
    println!(" {} Image: {}", "|-".dimmed(), matrix.image.cyan());
    println!(
        " {} {} jobs in {} stages",
        "|-".dimmed(),
        matrix.job_count(),
        matrix.stages.len()
    );

    for (stage, jobs) in matrix.stage_groups() {
        println!();
        println!(
            " {} ({})",
            format!("Jobs for {}", stage).bold().underline(),
            jobs.len()
        );
        if jobs.is_empty() {
            println!(" {} {}", "|-".dimmed(), "nothing to run".dimmed());
            continue;
        }
        for (name, job) in jobs {
            let id = job
                .variables
                .get("CI_JOB_ID")
                .map(|id| format!(" #{}", id).dimmed().to_string())
                .unwrap_or_default();
            println!(" {} {}{}", "|-".dimmed(), name.green(), id);
        }
    }
    println!();
}

/// Print every command a run would execute, stage by stage.
pub fn print_run(listing: &[StageListing]) {
    for stage in listing {
        println!("{} {}", "Stage:".bold(), stage.stage.cyan());
        for job in &stage.jobs {
            println!("  {} {}", "Job:".bold(), job.name.green());
            for cmd in &job.script {
                println!("    {}", cmd);
            }
        }
    }
}
