//! Artifact collection from a finished job's output directory.
//!
//! Declared outputs are looked up under the job's output root, in declared
//! order. Missing, unreadable, non-regular or path-rejected outputs are
//! skipped with a log line; the rest are hashed over their full contents.
//! The workload controls what is on disk, so each output is resolved
//! through symlinks and must still land under the output root.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::domain::{Artifact, Job};
use crate::error::{AgentError, Result};
use crate::paths;

/// Collect artifacts for every declared output present under `output_root`.
///
/// Deterministic: the same directory contents always produce the same list.
pub fn collect(job: &Job, output_root: &Path) -> Vec<Artifact> {
    let root = match fs::canonicalize(output_root) {
        Ok(root) => root,
        Err(e) => {
            warn!("Output directory {} unavailable: {}", output_root.display(), e);
            return Vec::new();
        }
    };

    let mut artifacts = Vec::with_capacity(job.outputs.len());

    for output in &job.outputs {
        match collect_one(&job.job_id, &root, &output.path) {
            Ok(Some(artifact)) => {
                debug!(
                    "Collected {} for job {} ({} bytes, sha256 {})",
                    artifact.path, job.job_id, artifact.size, artifact.sha256
                );
                artifacts.push(artifact);
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping output {} of job {}: {}", output.path, job.job_id, e),
        }
    }

    artifacts
}

/// Hash one declared output. `Ok(None)` means the file is absent.
///
/// `root` must already be canonical.
fn collect_one(job_id: &str, root: &Path, declared: &str) -> Result<Option<Artifact>> {
    let relative = paths::normalize_output_path(declared)?;

    let resolved = match fs::canonicalize(root.join(&relative)) {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("Output file not found: {}", root.join(&relative).display());
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    if !resolved.starts_with(root) {
        return Err(AgentError::PathRejected(format!(
            "output {:?} resolves outside the output directory",
            declared
        )));
    }

    if !fs::metadata(&resolved)?.is_file() {
        warn!("Output is not a regular file: {}", resolved.display());
        return Ok(None);
    }

    let (sha256, size) = hash_file(&resolved)?;

    Ok(Some(Artifact {
        path: declared.to_string(),
        sha256,
        size,
        local_uri: paths::artifact_uri(job_id, &relative),
    }))
}

/// Stream a file through SHA-256; size and digest come from the same read.
fn hash_file(path: &Path) -> Result<(String, u64)> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher)?;
    Ok((hex::encode(hasher.finalize()), size))
}

/// Hex-encoded SHA-256 digest
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HI_SHA256: &str = "98ea6e4f216f2fb4b69fff9b3a44842c38686ca685f3f55dc48c5d3fb1107be4";

    fn job() -> Job {
        Job::new("j1", "alpine", vec![])
            .with_output("/result.txt")
            .with_output("/missing.txt")
    }

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(sha256_hex(b"hi\n"), HI_SHA256);
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_collect_present_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("result.txt"), b"hi\n").unwrap();

        let artifacts = collect(&job(), dir.path());

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, "/result.txt");
        assert_eq!(artifacts[0].sha256, HI_SHA256);
        assert_eq!(artifacts[0].size, 3);
        assert_eq!(artifacts[0].local_uri, "/outputs/j1/result.txt");
    }

    #[test]
    fn test_hash_matches_direct_computation() {
        let dir = tempdir().unwrap();
        let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
        fs::write(dir.path().join("result.txt"), &payload).unwrap();

        let artifacts = collect(&job(), dir.path());

        assert_eq!(artifacts[0].sha256, hex::encode(Sha256::digest(&payload)));
        assert_eq!(artifacts[0].size, payload.len() as u64);
    }

    #[test]
    fn test_missing_outputs_skipped() {
        let dir = tempdir().unwrap();
        assert!(collect(&job(), dir.path()).is_empty());
    }

    #[test]
    fn test_collection_is_idempotent() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("result.txt"), b"hi\n").unwrap();
        fs::write(dir.path().join("missing.txt"), b"now present").unwrap();

        let first = collect(&job(), dir.path());
        let second = collect(&job(), dir.path());

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_declared_order_preserved() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let job = Job::new("j1", "alpine", vec![]).with_output("/b.txt").with_output("/a.txt");

        let paths: Vec<String> = collect(&job, dir.path()).into_iter().map(|a| a.path).collect();

        assert_eq!(paths, vec!["/b.txt", "/a.txt"]);
    }

    #[test]
    fn test_nested_output() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("reports")).unwrap();
        fs::write(dir.path().join("reports/summary.json"), b"{}").unwrap();
        let job = Job::new("j1", "alpine", vec![]).with_output("/reports/summary.json");

        let artifacts = collect(&job, dir.path());

        assert_eq!(artifacts[0].local_uri, "/outputs/j1/reports/summary.json");
    }

    #[test]
    fn test_traversal_does_not_escape_root() {
        let outer = tempdir().unwrap();
        let root = outer.path().join("j1");
        fs::create_dir_all(&root).unwrap();
        fs::write(outer.path().join("secret.txt"), b"host secret").unwrap();
        let job = Job::new("j1", "alpine", vec![]).with_output("/../secret.txt");

        assert!(collect(&job, &root).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_rejected() {
        let outer = tempdir().unwrap();
        let root = outer.path().join("j1");
        fs::create_dir_all(&root).unwrap();
        fs::write(outer.path().join("host-secret.txt"), b"host secret bytes").unwrap();
        std::os::unix::fs::symlink("../host-secret.txt", root.join("result.txt")).unwrap();

        let job = Job::new("j1", "alpine", vec![]).with_output("/result.txt");

        assert!(collect(&job, &root).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_out_of_root_rejected() {
        let outer = tempdir().unwrap();
        let root = outer.path().join("j1");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(outer.path().join("elsewhere")).unwrap();
        fs::write(outer.path().join("elsewhere/summary.json"), b"{}").unwrap();
        std::os::unix::fs::symlink(outer.path().join("elsewhere"), root.join("reports")).unwrap();

        let job = Job::new("j1", "alpine", vec![]).with_output("/reports/summary.json");

        assert!(collect(&job, &root).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_within_root_collected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("real.txt"), b"hi\n").unwrap();
        std::os::unix::fs::symlink("real.txt", dir.path().join("result.txt")).unwrap();

        let job = Job::new("j1", "alpine", vec![]).with_output("/result.txt");
        let artifacts = collect(&job, dir.path());

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].sha256, HI_SHA256);
        assert_eq!(artifacts[0].local_uri, "/outputs/j1/result.txt");
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let dir = tempdir().unwrap();
        assert!(collect(&job(), &dir.path().join("absent")).is_empty());
    }

    #[test]
    fn test_directory_output_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("result.txt")).unwrap();
        assert!(collect(&job(), dir.path()).is_empty());
    }
}
