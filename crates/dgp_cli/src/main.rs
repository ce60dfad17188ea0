//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `dgp_core` linkage.
//! - Summarize the project document found under a directory argument.

use dgp_core::document::{load_from_dir, PROJECT_DOCUMENT_NAME};
use dgp_core::{EntityKind, ProjectTree};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("dgp_core version={}", dgp_core::core_version());

    let Some(dir) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };
    match load_from_dir(Path::new(&dir), PROJECT_DOCUMENT_NAME) {
        Ok((document, tree)) => {
            println!("document={}", document.display());
            print_summary(&tree);
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("event=cli_summary module=cli status=error dir={dir} error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_summary(tree: &ProjectTree) {
    let project = tree.project();
    println!("project={} id={}", project.name(), project.oid());
    println!("gravimeters={}", tree.gravimeters().len());
    for flight in tree.flights() {
        let datasets = tree.datasets_of(flight.oid());
        let files: usize = datasets
            .iter()
            .map(|dataset| tree.datafiles_of(dataset.oid()).len())
            .sum();
        println!(
            "flight={} datasets={} files={}",
            flight.name(),
            datasets.len(),
            files
        );
    }
    let segments = tree
        .walk()
        .into_iter()
        .filter_map(|oid| tree.find(oid))
        .filter(|entity| entity.kind() == EntityKind::DataSegment)
        .count();
    println!("segments={segments}");
}
