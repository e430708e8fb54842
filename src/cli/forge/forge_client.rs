//! Capabilities the command handlers need from the GitLab API.

use clap::ValueEnum;
use thiserror::Error;

use crate::cli::{
    issue::{CreateIssueOptions, Issue, UpdateIssueOptions},
    merge_request::{CreateMergeRequestOptions, MergeRequest, UpdateMergeRequestOptions},
    operation::ListFilters,
};

/// State transition requested by `--state-event`.
#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum StateEvent {
    Close,
    Reopen,
}

impl StateEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateEvent::Close => "close",
            StateEvent::Reopen => "reopen",
        }
    }
}

/// Errors from GitLab API calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested project, issue or merge request doesn't exist (or the
    /// token can't see it).
    #[error("not found: {0}")]
    NotFound(String),

    /// The API answered with a non-success status.
    #[error("GitLab API returned {status} for {url}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    /// The request couldn't be sent or the response couldn't be read.
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The configured API URL can't be extended with a path.
    #[error("invalid GitLab API URL: {0}")]
    InvalidUrl(String),

    /// The response body didn't have the expected shape.
    #[error("failed to parse GitLab API response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

pub trait MergeRequestClient {
    /// Fetches a single merge request of a project.
    fn get_merge_request(&self, project: &str, iid: u64) -> Result<MergeRequest, ApiError>;

    /// Lists merge requests of a project, or of every project visible to the
    /// user if `project` is `None`.
    fn list_merge_requests(
        &self,
        project: Option<&str>,
        filters: &ListFilters,
    ) -> Result<Vec<MergeRequest>, ApiError>;

    fn create_merge_request(
        &self,
        project: &str,
        options: &CreateMergeRequestOptions,
    ) -> Result<MergeRequest, ApiError>;

    fn update_merge_request(
        &self,
        project: &str,
        iid: u64,
        options: &UpdateMergeRequestOptions,
    ) -> Result<MergeRequest, ApiError>;
}

pub trait IssueClient {
    /// Fetches a single issue of a project.
    fn get_issue(&self, project: &str, iid: u64) -> Result<Issue, ApiError>;

    /// Lists issues of a project, or of every project visible to the user if
    /// `project` is `None`.
    fn list_issues(
        &self,
        project: Option<&str>,
        filters: &ListFilters,
    ) -> Result<Vec<Issue>, ApiError>;

    fn create_issue(&self, project: &str, options: &CreateIssueOptions)
    -> Result<Issue, ApiError>;

    fn update_issue(
        &self,
        project: &str,
        iid: u64,
        options: &UpdateIssueOptions,
    ) -> Result<Issue, ApiError>;
}

pub trait RepositoryClient {
    /// Reads the raw content of a file at the given ref.
    fn get_raw_file(&self, project: &str, path: &str, git_ref: &str) -> Result<String, ApiError>;
}
