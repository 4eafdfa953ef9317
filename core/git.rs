use git2::Repository;
use log;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct GitInfo {
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub author: Option<String>,
}

/// Supplies repository details for the metadata header.
pub trait GitInfoProvider: Send + Sync {
    fn git_info(&self, project_root: &Path) -> GitInfo;
}

/// Opens the enclosing repository with libgit2. The author comes from the
/// layered git config (repository, global, system), so includes are honoured.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepositoryReader;

impl GitInfoProvider for RepositoryReader {
    fn git_info(&self, project_root: &Path) -> GitInfo {
        let repo = match Repository::discover(project_root) {
            Ok(repo) => repo,
            Err(e) => {
                log::debug!(
                    "No git repository found above {}: {}",
                    project_root.display(),
                    e.message()
                );
                return GitInfo::default();
            }
        };
        log::trace!("Reading git info from {}", repo.path().display());

        GitInfo {
            branch: current_branch(&repo),
            commit: head_commit(&repo),
            author: repo
                .config()
                .ok()
                .and_then(|config| config.get_string("user.name").ok()),
        }
    }
}

fn current_branch(repo: &Repository) -> Option<String> {
    match repo.head() {
        Ok(head) if head.is_branch() => head.shorthand().map(str::to_string),
        Ok(_) => None,
        // unborn branch: HEAD still names it symbolically
        Err(_) => repo
            .find_reference("HEAD")
            .ok()?
            .symbolic_target()
            .map(|target| target.strip_prefix("refs/heads/").unwrap_or(target).to_string()),
    }
}

fn head_commit(repo: &Repository) -> Option<String> {
    let commit = repo.head().ok()?.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Oid, Signature};
    use std::fs;
    use tempfile::tempdir;

    fn commit_file(repo: &Repository, name: &str) -> Result<Oid, git2::Error> {
        let mut index = repo.index()?;
        index.add_path(Path::new(name))?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let signature = Signature::now("Ada Lovelace", "ada@example.com")?;
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit()?],
            Err(_) => Vec::new(),
        };
        let parent_refs: Vec<_> = parents.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, "add file", &tree, &parent_refs)
    }

    #[test]
    fn reads_branch_commit_and_author() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;
        repo.config()?.set_str("user.name", "Ada Lovelace")?;
        repo.set_head("refs/heads/main")?;
        fs::write(dir.path().join("README.md"), "hello\n")?;
        let oid = commit_file(&repo, "README.md")?;

        let nested = dir.path().join("src");
        fs::create_dir_all(&nested)?;
        let info = RepositoryReader.git_info(&nested);
        assert_eq!(info.branch.as_deref(), Some("main"));
        assert_eq!(info.commit, Some(oid.to_string()));
        assert_eq!(info.author.as_deref(), Some("Ada Lovelace"));
        Ok(())
    }

    #[test]
    fn detached_head_has_commit_but_no_branch() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;
        fs::write(dir.path().join("a.txt"), "a\n")?;
        let oid = commit_file(&repo, "a.txt")?;
        repo.set_head_detached(oid)?;

        let info = RepositoryReader.git_info(dir.path());
        assert_eq!(info.branch, None);
        assert_eq!(info.commit, Some(oid.to_string()));
        Ok(())
    }

    #[test]
    fn unborn_branch_has_name_but_no_commit() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;
        repo.set_head("refs/heads/trunk")?;

        let info = RepositoryReader.git_info(dir.path());
        assert_eq!(info.branch.as_deref(), Some("trunk"));
        assert_eq!(info.commit, None);
        Ok(())
    }

    #[test]
    fn outside_a_repository_everything_is_unknown() -> std::io::Result<()> {
        let dir = tempdir()?;
        let info = RepositoryReader.git_info(dir.path());
        assert_eq!(info.branch, None);
        assert_eq!(info.commit, None);
        Ok(())
    }
}
