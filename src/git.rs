//! Git operations and remote discovery.

use std::process::Command;

use thiserror::Error;
use tracing::debug;

// =============================================================================
// Errors
// =============================================================================

/// Errors from running the git binary.
#[derive(Debug, Error)]
pub enum GitError {
    /// The git binary couldn't be spawned.
    #[error("failed to execute git {args}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },

    /// Git ran but exited unsuccessfully.
    #[error("git {args} failed: {stderr}")]
    CommandFailed { args: String, stderr: String },

    /// No branch is checked out (detached HEAD).
    #[error("no branch checked out")]
    DetachedHead,
}

/// Errors from parsing a single remote URL.
#[derive(Debug, Error, PartialEq)]
pub enum RemoteUrlError {
    #[error("unsupported remote URL scheme (supported: ssh://, https://): {0}")]
    UnsupportedScheme(String),

    #[error("malformed remote URL, expected <host>/<owner>/<project>: {0}")]
    Malformed(String),
}

/// Errors from looking up the GitLab remote of the working copy.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no remote configured in this working copy")]
    NoRemotes,

    #[error("this working copy has no remote pointing at a '{host_pattern}' host")]
    NoMatchingRemote { host_pattern: String },

    #[error("failed to parse URL of remote '{remote}'")]
    InvalidRemote {
        remote: String,
        #[source]
        source: RemoteUrlError,
    },

    #[error(transparent)]
    Git(#[from] GitError),
}

// =============================================================================
// Git Client
// =============================================================================

/// The subset of git the tool depends on.
pub trait GitClient {
    /// Names of the configured remotes, in the order git lists them.
    fn list_remote_names(&self) -> Result<Vec<String>, GitError>;

    /// The configured URL of a remote, trimmed.
    fn get_remote_url(&self, remote: &str) -> Result<String, GitError>;

    /// Name of the checked out branch.
    fn get_current_branch(&self) -> Result<String, GitError>;
}

/// [`GitClient`] backed by the `git` executable found on `PATH`.
#[derive(Debug, Default)]
pub struct SystemGit;

impl SystemGit {
    fn output(&self, args: &[&str]) -> Result<String, GitError> {
        let output = Command::new("git")
            .args(args)
            .output()
            .map_err(|source| GitError::Spawn {
                args: args.join(" "),
                source,
            })?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl GitClient for SystemGit {
    fn list_remote_names(&self) -> Result<Vec<String>, GitError> {
        let stdout = self.output(&["remote"])?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn get_remote_url(&self, remote: &str) -> Result<String, GitError> {
        Ok(self.output(&["remote", "get-url", remote])?.trim().to_string())
    }

    fn get_current_branch(&self) -> Result<String, GitError> {
        let branch = self.output(&["branch", "--show-current"])?;
        let branch = branch.trim();

        if branch.is_empty() {
            return Err(GitError::DetachedHead);
        }

        Ok(branch.to_string())
    }
}

// =============================================================================
// Remote Identity
// =============================================================================

/// The project a remote URL points at.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteIdentity {
    /// The URL as configured in git.
    pub raw_url: String,
    /// The hostname (e.g. "gitlab.example.com").
    pub host: String,
    /// The user or group owning the project.
    pub owner: String,
    /// The project name without a `.git` extension.
    pub project: String,
}

impl RemoteIdentity {
    /// `<owner>/<project>`, the path GitLab uses to address the project.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.project)
    }

    /// The project's home page.
    pub fn web_url(&self) -> String {
        format!("https://{}/{}/{}", self.host, self.owner, self.project)
    }
}

/// Parses a git remote URL into a [`RemoteIdentity`].
///
/// Supported formats:
/// - SSH: `ssh://<user>@<host>/<owner>/<project>[.git]`
/// - HTTPS: `https://<host>/<owner>/<project>[.git]`
///
/// Path segments after the project are ignored.
///
/// # Errors
///
/// Fails with [`RemoteUrlError::UnsupportedScheme`] for any other scheme, and
/// with [`RemoteUrlError::Malformed`] if host, owner or project is missing.
pub fn parse_remote_url(url: &str) -> Result<RemoteIdentity, RemoteUrlError> {
    let url = url.trim();

    let location = if let Some(rest) = url.strip_prefix("ssh://") {
        match rest.split_once('@') {
            Some((_, location)) => location,
            None => rest,
        }
    } else if let Some(rest) = url.strip_prefix("https://") {
        rest
    } else {
        return Err(RemoteUrlError::UnsupportedScheme(url.to_string()));
    };
    let location = location.strip_suffix(".git").unwrap_or(location);
    let segments: Vec<&str> = location.split('/').collect();

    let [host, owner, project, ..] = segments.as_slice() else {
        return Err(RemoteUrlError::Malformed(url.to_string()));
    };

    if host.is_empty() || owner.is_empty() || project.is_empty() {
        return Err(RemoteUrlError::Malformed(url.to_string()));
    }

    Ok(RemoteIdentity {
        raw_url: url.to_string(),
        host: host.to_string(),
        owner: owner.to_string(),
        project: project.to_string(),
    })
}

/// Finds the remote of the working copy whose host starts with
/// `host_pattern`.
///
/// Every configured remote must have a parsable URL. When several remotes
/// match, the first one git lists wins.
///
/// # Errors
///
/// Fails if git can't be run, there are no remotes, a remote URL can't be
/// parsed, or no remote host starts with `host_pattern`.
pub fn discover_remote(
    git: &impl GitClient,
    host_pattern: &str,
) -> Result<RemoteIdentity, DiscoveryError> {
    let names = git.list_remote_names()?;

    if names.is_empty() {
        return Err(DiscoveryError::NoRemotes);
    }

    let mut identities = Vec::with_capacity(names.len());

    for name in names {
        let url = git.get_remote_url(&name)?;
        let identity =
            parse_remote_url(&url).map_err(|source| DiscoveryError::InvalidRemote {
                remote: name.clone(),
                source,
            })?;

        debug!(remote = %name, host = %identity.host, "parsed remote");

        identities.push(identity);
    }

    identities
        .into_iter()
        .find(|identity| identity.host.starts_with(host_pattern))
        .ok_or_else(|| DiscoveryError::NoMatchingRemote {
            host_pattern: host_pattern.to_string(),
        })
}
