//! Host filesystem path resolution for job outputs.
//!
//! Job identifiers and declared output paths come from the coordinator and
//! are joined onto host paths, so both are checked here before any
//! filesystem access. A job id must be one plain path component that is
//! also a valid container name suffix; a declared output path is re-rooted
//! under the job's output directory and may not contain `..`.

use std::path::{Component, Path, PathBuf};

use crate::error::{AgentError, Result};

/// Longest job id accepted
const MAX_JOB_ID_LEN: usize = 128;

/// Check that a job id is safe to use as a directory name and container name.
///
/// Accepts `[A-Za-z0-9][A-Za-z0-9_.-]*`, which also rules out `.` and `..`.
pub fn validate_job_id(job_id: &str) -> Result<()> {
    let mut chars = job_id.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if !first_ok || !rest_ok || job_id.len() > MAX_JOB_ID_LEN {
        return Err(AgentError::PathRejected(format!("invalid job id {:?}", job_id)));
    }
    Ok(())
}

/// Directory on the host that holds one job's outputs: `<root>/<job_id>`.
pub fn job_output_dir(root: &Path, job_id: &str) -> Result<PathBuf> {
    validate_job_id(job_id)?;
    Ok(root.join(job_id))
}

/// Turn a declared output path into a path relative to the job's output root.
///
/// Leading root markers and `.` components are dropped. Any `..` or
/// platform prefix component is rejected rather than resolved, so the
/// result can never point outside the root.
pub fn normalize_output_path(declared: &str) -> Result<PathBuf> {
    let mut relative = PathBuf::new();

    for component in Path::new(declared).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => relative.push(part),
            Component::ParentDir | Component::Prefix(_) => {
                return Err(AgentError::PathRejected(format!(
                    "output path {:?} escapes the output directory",
                    declared
                )));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(AgentError::PathRejected(format!("output path {:?} names no file", declared)));
    }

    Ok(relative)
}

/// Resolve a declared output path to its host location under `output_root`.
pub fn resolve_output(output_root: &Path, declared: &str) -> Result<PathBuf> {
    Ok(output_root.join(normalize_output_path(declared)?))
}

/// Retrieval reference for an artifact: `/outputs/<job_id>/<relative path>`.
pub fn artifact_uri(job_id: &str, relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/outputs/{}/{}", job_id, parts.join("/"))
}
