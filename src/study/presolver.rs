//! Invocation of the external presolver.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{error, info};

/// Binary containers the presolver produces next to the command script.
pub const PRESOLVER_OUTPUTS: [&str; 2] = ["geombc.dat.1", "restart.0.1"];

#[derive(Error, Debug)]
pub enum PresolverError {
    #[error("Failed to start presolver {path}: {source}")]
    Spawn { path: PathBuf, #[source] source: io::Error },
    #[error("Presolver exited with {0}")]
    ExitStatus(String),
    #[error("Presolver reported an error: {0}")]
    ReportedError(String),
    #[error("Presolver output {0} is missing")]
    MissingOutput(PathBuf),
    #[error("Failed to move presolver output {path}: {source}")]
    Move { path: PathBuf, #[source] source: io::Error },
}

/// Run `executable` on the command script at `script` from the script's
/// directory, then move its outputs into `output_dir`.
///
/// Output lines are forwarded to the log. A non-zero exit status or any line
/// containing `ERROR` fails the run.
pub fn run_presolver(executable: &Path, script: &Path, output_dir: &Path) -> Result<Vec<PathBuf>, PresolverError> {
    let work_dir = script.parent().unwrap_or(Path::new("."));
    let script_name = script.file_name().unwrap_or(script.as_os_str());
    info!("Running presolver from {}", executable.display());

    let output = Command::new(executable)
        .arg(script_name)
        .current_dir(work_dir)
        .output()
        .map_err(|source| PresolverError::Spawn { path: executable.to_path_buf(), source })?;

    let mut first_error = None;
    for stream in [&output.stdout, &output.stderr] {
        for line in String::from_utf8_lossy(stream).lines() {
            if line.contains("ERROR") {
                error!("{}", line);
                first_error.get_or_insert_with(|| line.to_owned());
            } else {
                info!("{}", line);
            }
        }
    }

    if !output.status.success() {
        error!("Presolver run has failed");
        return Err(PresolverError::ExitStatus(output.status.to_string()));
    }
    if let Some(line) = first_error {
        return Err(PresolverError::ReportedError(line));
    }

    info!("Moving output files to output folder");
    let mut moved = Vec::with_capacity(PRESOLVER_OUTPUTS.len());
    for name in PRESOLVER_OUTPUTS {
        let from = work_dir.join(name);
        let to = output_dir.join(name);
        if !from.exists() {
            return Err(PresolverError::MissingOutput(from));
        }
        move_file(&from, &to).map_err(|source| PresolverError::Move { path: from.clone(), source })?;
        moved.push(to);
    }
    Ok(moved)
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}
