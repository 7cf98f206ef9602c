//! Repository gateway backed by the `git` command line
//!
//! Network operations (clone, pull) and working-tree resets shell out to
//! `git`; revision queries and change detection use libgit2.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use git2::{Oid, Repository};
use tokio::process::Command;
use tracing::{debug, info};

use super::gateway::{LocationStatus, PullOutcome, RepositoryGateway};
use super::remote::RemoteUrl;
use crate::{Error, Result};

/// Gateway for a single working copy
#[derive(Debug, Clone)]
pub struct GitCliGateway {
    root: PathBuf,
    git_path: String,
}

impl GitCliGateway {
    /// Create a gateway for the working copy at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            git_path: "git".to_string(),
        }
    }

    /// Use a custom git executable
    pub fn with_git_path(mut self, path: impl Into<String>) -> Self {
        self.git_path = path.into();
        self
    }

    async fn run_git(&self, args: &[&str], cwd: &Path) -> Result<Output> {
        debug!(args = ?args, cwd = %cwd.display(), "Running git");

        Command::new(&self.git_path)
            .args(args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::Command(format!(
                        "git executable not found at '{}'. Is git installed?",
                        self.git_path
                    ))
                } else {
                    Error::Command(format!("Failed to run git {}: {}", args.join(" "), e))
                }
            })
    }

    /// Run git in the working copy and fail on a non-zero exit
    async fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run_git(args, &self.root).await?;

        if !output.status.success() {
            return Err(Error::Command(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output)
    }

    async fn clone_into(&self, url: &str) -> Result<()> {
        let remote = RemoteUrl::parse(url)?;

        let parent = match self.root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent).await.map_err(|e| {
            Error::Clone(format!("Failed to create {}: {}", parent.display(), e))
        })?;

        info!(remote = %remote, host = ?remote.host, path = %self.root.display(), "Cloning repository");

        let root = self.root.to_string_lossy().into_owned();
        let output = self
            .run_git(&["clone", remote.clone_url.as_str(), root.as_str()], Path::new("."))
            .await
            .map_err(|e| Error::Clone(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_clone_failure(&remote, &stderr));
        }

        Ok(())
    }
}

fn classify_clone_failure(remote: &RemoteUrl, stderr: &str) -> Error {
    if stderr.contains("Authentication failed") || stderr.contains("Permission denied") {
        return Error::Clone(format!(
            "Authentication failed for {}. Check your credentials or repository access.",
            remote
        ));
    }

    if stderr.contains("Could not resolve host") || stderr.contains("unable to access") {
        return Error::Clone(format!(
            "Network error cloning {}. Check your internet connection.",
            remote
        ));
    }

    if stderr.contains("not found") || stderr.contains("does not exist") {
        return Error::Clone(format!(
            "Repository not found: {}. Check the URL is correct.",
            remote
        ));
    }

    Error::Clone(format!("git clone failed: {}", stderr.trim()))
}

/// Current head commit, `None` for an unborn branch
fn head_oid(root: &Path) -> Result<Option<Oid>> {
    let repo = Repository::open(root)?;

    let head = match repo.head() {
        Ok(head) => head,
        Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let id = head.peel_to_commit()?.id();
    Ok(Some(id))
}

/// Paths that differ between two commits, in diff order, without duplicates
///
/// Renames contribute both the old and the new path.
pub(crate) fn changed_files(root: &Path, old: Option<Oid>, new: Oid) -> Result<Vec<String>> {
    if old == Some(new) {
        return Ok(Vec::new());
    }

    let repo = Repository::open(root)?;
    let new_tree = repo.find_commit(new)?.tree()?;
    let old_tree = match old {
        Some(oid) => Some(repo.find_commit(oid)?.tree()?),
        None => None,
    };

    let mut diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), None)?;
    diff.find_similar(None)?;

    let mut files: Vec<String> = Vec::new();
    for delta in diff.deltas() {
        for path in [delta.old_file().path(), delta.new_file().path()]
            .into_iter()
            .flatten()
        {
            let path = path.to_string_lossy().into_owned();
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Build the outcome of a pull that has already merged
fn detect_changes(root: &Path, before: Option<Oid>) -> Result<PullOutcome> {
    let after = head_oid(root)
        .map_err(|e| Error::ChangeDetection(e.to_string()))?
        .ok_or_else(|| Error::ChangeDetection("No commits after pull".to_string()))?;
    let changed_files =
        changed_files(root, before, after).map_err(|e| Error::ChangeDetection(e.to_string()))?;

    Ok(PullOutcome {
        changed_files,
        head_revision: after.to_string(),
    })
}

#[async_trait]
impl RepositoryGateway for GitCliGateway {
    fn location(&self) -> &Path {
        &self.root
    }

    async fn ensure_location(&self, url: &str) -> Result<LocationStatus> {
        if self.root.exists() {
            return Ok(LocationStatus::Present);
        }

        self.clone_into(url).await?;
        info!(path = %self.root.display(), "Repository cloned");
        Ok(LocationStatus::Cloned)
    }

    async fn pull(&self) -> Result<PullOutcome> {
        let root = self.root.clone();
        let before = tokio::task::spawn_blocking(move || head_oid(&root))
            .await
            .map_err(|e| Error::Other(format!("Head lookup task failed: {}", e)))?
            .map_err(|e| Error::Pull(e.to_string()))?;

        self.run_checked(&["pull", "--no-rebase", "--no-edit"])
            .await
            .map_err(|e| Error::Pull(e.to_string()))?;

        // Past the merge: errors are change detection failures, never pull failures
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || detect_changes(&root, before))
            .await
            .map_err(|e| Error::ChangeDetection(format!("Change detection task failed: {}", e)))?
    }

    async fn force_reset(&self) -> Result<()> {
        self.run_checked(&["reset", "--hard"]).await?;
        self.run_checked(&["clean", "-f"]).await?;
        info!(path = %self.root.display(), "Working copy reset to last known head");
        Ok(())
    }

    async fn current_head_revision(&self) -> Result<String> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || head_oid(&root))
            .await
            .map_err(|e| Error::Other(format!("Head lookup task failed: {}", e)))??
            .map(|oid| oid.to_string())
            .ok_or_else(|| Error::Other("Repository has no commits".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Commit, Signature};
    use std::fs;
    use tempfile::TempDir;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str) -> Oid {
        let workdir = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (path, contents) in files {
            let full = workdir.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, contents).unwrap();
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();

        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parents: Vec<Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&Commit> = parents.iter().collect();

        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    #[test]
    fn test_changed_files_between_commits() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();

        let first = commit_files(&repo, &[("README.md", "hello")], "initial");
        let second = commit_files(
            &repo,
            &[("README.md", "hello again"), ("src/index.ts", "export {}")],
            "update",
        );

        let files = changed_files(temp.path(), Some(first), second).unwrap();
        assert_eq!(files, vec!["README.md".to_string(), "src/index.ts".to_string()]);
    }

    #[test]
    fn test_changed_files_same_commit_is_empty() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let head = commit_files(&repo, &[("README.md", "hello")], "initial");

        assert!(changed_files(temp.path(), Some(head), head).unwrap().is_empty());
    }

    #[test]
    fn test_detection_failure_after_merge_is_distinct() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let head = commit_files(&repo, &[("src/index.ts", "export {}")], "initial");

        let outcome = detect_changes(temp.path(), None).unwrap();
        assert_eq!(outcome.changed_files, vec!["src/index.ts".to_string()]);
        assert_eq!(outcome.head_revision, head.to_string());

        // A pre-merge head that does not exist cannot be diffed
        let bogus = Oid::from_str("0123456789012345678901234567890123456789").unwrap();
        let err = detect_changes(temp.path(), Some(bogus)).unwrap_err();
        assert!(matches!(err, Error::ChangeDetection(_)));

        let missing = temp.path().join("not-a-repo");
        let err = detect_changes(&missing, None).unwrap_err();
        assert!(matches!(err, Error::ChangeDetection(_)));
    }

    #[test]
    fn test_head_oid_unborn() {
        let temp = TempDir::new().unwrap();
        Repository::init(temp.path()).unwrap();
        assert!(head_oid(temp.path()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clone_then_pull_has_no_changes() {
        if !git_available() {
            return;
        }

        let upstream_dir = TempDir::new().unwrap();
        let upstream = Repository::init(upstream_dir.path()).unwrap();
        commit_files(&upstream, &[("src/index.ts", "export {}")], "initial");

        let work = TempDir::new().unwrap();
        let gateway = GitCliGateway::new(work.path().join("site"));

        let url = upstream_dir.path().to_string_lossy().into_owned();
        let status = gateway.ensure_location(&url).await.unwrap();
        assert_eq!(status, LocationStatus::Cloned);
        assert_eq!(
            gateway.ensure_location(&url).await.unwrap(),
            LocationStatus::Present
        );

        let outcome = gateway.pull().await.unwrap();
        assert!(!outcome.has_changes());
        assert_eq!(outcome.head_revision, gateway.current_head_revision().await.unwrap());
    }

    #[tokio::test]
    async fn test_pull_reports_upstream_changes() {
        if !git_available() {
            return;
        }

        let upstream_dir = TempDir::new().unwrap();
        let upstream = Repository::init(upstream_dir.path()).unwrap();
        commit_files(&upstream, &[("README.md", "hello")], "initial");

        let work = TempDir::new().unwrap();
        let gateway = GitCliGateway::new(work.path().join("site"));
        gateway
            .ensure_location(&upstream_dir.path().to_string_lossy())
            .await
            .unwrap();

        let head = commit_files(&upstream, &[("src/content/a.png", "png")], "asset");

        let outcome = gateway.pull().await.unwrap();
        assert_eq!(outcome.changed_files, vec!["src/content/a.png".to_string()]);
        assert_eq!(outcome.head_revision, head.to_string());
    }

    #[tokio::test]
    async fn test_force_reset_discards_local_edits() {
        if !git_available() {
            return;
        }

        let upstream_dir = TempDir::new().unwrap();
        let upstream = Repository::init(upstream_dir.path()).unwrap();
        commit_files(&upstream, &[("README.md", "hello")], "initial");

        let work = TempDir::new().unwrap();
        let root = work.path().join("site");
        let gateway = GitCliGateway::new(&root);
        gateway
            .ensure_location(&upstream_dir.path().to_string_lossy())
            .await
            .unwrap();

        fs::write(root.join("README.md"), "local edit").unwrap();
        fs::write(root.join("stray.txt"), "untracked").unwrap();

        gateway.force_reset().await.unwrap();

        assert_eq!(fs::read_to_string(root.join("README.md")).unwrap(), "hello");
        assert!(!root.join("stray.txt").exists());
    }

    #[tokio::test]
    async fn test_clone_failure_is_reported() {
        if !git_available() {
            return;
        }

        let work = TempDir::new().unwrap();
        let gateway = GitCliGateway::new(work.path().join("site"));
        let missing = work.path().join("no-such-upstream");

        let err = gateway
            .ensure_location(&missing.to_string_lossy())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Clone(_)));
        assert!(!work.path().join("site").exists());
    }

    #[tokio::test]
    async fn test_missing_git_executable() {
        let temp = TempDir::new().unwrap();
        let gateway = GitCliGateway::new(temp.path()).with_git_path("/nonexistent/git-binary");
        let err = gateway.force_reset().await.unwrap_err();
        assert!(matches!(err, Error::Command(_)));
    }
}
