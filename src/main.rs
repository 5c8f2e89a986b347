mod cli;
mod logging;
mod prompt;

use clap::Parser;
use cli::Cli;
use framecheck_core::{progress, Pipeline};
use indicatif::ProgressBar;
use std::error::Error;
use std::io;
use std::path::Path;

type CliResult<T> = Result<T, Box<dyn Error>>;

fn main() {
    let cli = Cli::parse();
    let progress_bar = ProgressBar::new(0);
    progress_bar.set_style(progress::spinner_style());
    if let Err(error) = logging::init(&progress_bar) {
        eprintln!("Logging disabled: {}", error);
    }

    match run(cli, &progress_bar) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    }
}

/// Returns false when some directories failed but the batch kept going.
fn run(cli: Cli, progress_bar: &ProgressBar) -> CliResult<bool> {
    let config = cli.quality_config()?;
    let directories = if cli.directories.is_empty() {
        let directory = progress_bar
            .suspend(|| prompt::read_directory(&mut io::stdin().lock(), &mut io::stdout()))?;
        vec![directory]
    } else {
        cli.directories.clone()
    };

    let pipeline = Pipeline::new(config).with_keep_going(cli.keep_going);
    tracing::debug!(config = ?pipeline.config(), "resolved configuration");

    let assume_yes = cli.yes;
    let mut confirm = |report: &Path| {
        assume_yes
            || progress_bar.suspend(|| {
                prompt::confirm_overwrite(&mut io::stdin().lock(), &mut io::stdout(), report)
            })
    };

    let result = pipeline.run(&directories, &mut confirm, progress_bar);
    progress_bar.finish_and_clear();
    let summary = result?;

    for report in summary.skipped() {
        println!("Kept existing report {}", report.display());
    }
    for error in &summary.failures {
        eprintln!("{}", error);
    }

    Ok(summary.failures.is_empty())
}
