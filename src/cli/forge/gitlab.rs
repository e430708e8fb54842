use reqwest::{
    StatusCode,
    blocking::{RequestBuilder, Response},
};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::{Url, form_urlencoded::byte_serialize};

use crate::cli::{
    forge::{
        ApiError, IssueClient, MergeRequestClient, RepositoryClient, http_client::HttpClient,
    },
    issue::{CreateIssueOptions, Issue, UpdateIssueOptions},
    merge_request::{CreateMergeRequestOptions, MergeRequest, UpdateMergeRequestOptions},
    operation::ListFilters,
};

/// Client for the GitLab REST API (v4).
pub struct GitLabClient {
    api_url: String,
    http_client: HttpClient,
}

impl GitLabClient {
    /// Creates a client for the API at `api_url` (e.g.
    /// `https://gitlab.com/api/v4`) authenticating with `private_token`.
    pub fn new(api_url: String, private_token: String) -> Self {
        GitLabClient {
            api_url: api_url.trim_end_matches('/').to_string(),
            http_client: HttpClient::new(private_token),
        }
    }

    fn project_url(&self, project: &str, resource: &str) -> String {
        let encoded_project: String = byte_serialize(project.as_bytes()).collect();

        format!("{}/projects/{encoded_project}/{resource}", self.api_url)
    }

    fn list_url(&self, project: Option<&str>, resource: &str) -> String {
        match project {
            Some(project) => self.project_url(project, resource),
            None => format!("{}/{resource}", self.api_url),
        }
    }

    fn list<T: DeserializeOwned>(&self, url: &str, filters: &ListFilters) -> Result<T, ApiError> {
        let scope = to_api_scope(&filters.scope);
        let request = self.http_client.get(url).query(&[
            ("state", filters.state.as_str()),
            ("scope", scope.as_str()),
            ("order_by", filters.order_by.as_str()),
            ("sort", filters.sort.as_str()),
        ]);

        self.send_json(request.query(&[("per_page", filters.limit)]), url)
    }

    fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, ApiError> {
        debug!(%url, "sending GitLab API request");

        let response = request.send().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(url.to_string()));
        }

        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }

        Ok(response)
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, ApiError> {
        self.send(request, url)?
            .json::<T>()
            .map_err(|source| ApiError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

impl MergeRequestClient for GitLabClient {
    fn get_merge_request(&self, project: &str, iid: u64) -> Result<MergeRequest, ApiError> {
        let url = self.project_url(project, &format!("merge_requests/{iid}"));
        let mr: GitLabMergeRequest = self.send_json(self.http_client.get(&url), &url)?;

        Ok(mr.into())
    }

    fn list_merge_requests(
        &self,
        project: Option<&str>,
        filters: &ListFilters,
    ) -> Result<Vec<MergeRequest>, ApiError> {
        let url = self.list_url(project, "merge_requests");
        let mrs: Vec<GitLabMergeRequest> = self.list(&url, filters)?;

        Ok(mrs.into_iter().map(Into::into).collect())
    }

    fn create_merge_request(
        &self,
        project: &str,
        options: &CreateMergeRequestOptions,
    ) -> Result<MergeRequest, ApiError> {
        let url = self.project_url(project, "merge_requests");
        let mut request_body = serde_json::json!({
            "source_branch": options.source_branch,
            "target_branch": options.target_branch,
            "title": options.title,
            "description": options.description,
        });

        if let Some(assignee_id) = options.assignee_id {
            request_body["assignee_id"] = assignee_id.into();
        }

        let mr: GitLabMergeRequest =
            self.send_json(self.http_client.post(&url).json(&request_body), &url)?;

        Ok(mr.into())
    }

    fn update_merge_request(
        &self,
        project: &str,
        iid: u64,
        options: &UpdateMergeRequestOptions,
    ) -> Result<MergeRequest, ApiError> {
        let url = self.project_url(project, &format!("merge_requests/{iid}"));
        let mut request_body = serde_json::json!({});

        if let Some(title) = options.title {
            request_body["title"] = title.into();
        }

        if let Some(description) = options.description {
            request_body["description"] = description.into();
        }

        if let Some(state_event) = options.state_event {
            request_body["state_event"] = state_event.as_str().into();
        }

        if let Some(assignee_id) = options.assignee_id {
            request_body["assignee_id"] = assignee_id.into();
        }

        let mr: GitLabMergeRequest =
            self.send_json(self.http_client.put(&url).json(&request_body), &url)?;

        Ok(mr.into())
    }
}

impl IssueClient for GitLabClient {
    fn get_issue(&self, project: &str, iid: u64) -> Result<Issue, ApiError> {
        let url = self.project_url(project, &format!("issues/{iid}"));
        let issue: GitLabIssue = self.send_json(self.http_client.get(&url), &url)?;

        Ok(issue.into())
    }

    fn list_issues(
        &self,
        project: Option<&str>,
        filters: &ListFilters,
    ) -> Result<Vec<Issue>, ApiError> {
        let url = self.list_url(project, "issues");
        let issues: Vec<GitLabIssue> = self.list(&url, filters)?;

        Ok(issues.into_iter().map(Into::into).collect())
    }

    fn create_issue(
        &self,
        project: &str,
        options: &CreateIssueOptions,
    ) -> Result<Issue, ApiError> {
        let url = self.project_url(project, "issues");
        let mut request_body = serde_json::json!({
            "title": options.title,
            "description": options.description,
        });

        if let Some(assignee_id) = options.assignee_id {
            request_body["assignee_ids"] = serde_json::json!([assignee_id]);
        }

        let issue: GitLabIssue =
            self.send_json(self.http_client.post(&url).json(&request_body), &url)?;

        Ok(issue.into())
    }

    fn update_issue(
        &self,
        project: &str,
        iid: u64,
        options: &UpdateIssueOptions,
    ) -> Result<Issue, ApiError> {
        let url = self.project_url(project, &format!("issues/{iid}"));
        let mut request_body = serde_json::json!({});

        if let Some(title) = options.title {
            request_body["title"] = title.into();
        }

        if let Some(description) = options.description {
            request_body["description"] = description.into();
        }

        if let Some(state_event) = options.state_event {
            request_body["state_event"] = state_event.as_str().into();
        }

        if let Some(assignee_id) = options.assignee_id {
            request_body["assignee_ids"] = serde_json::json!([assignee_id]);
        }

        let issue: GitLabIssue =
            self.send_json(self.http_client.put(&url).json(&request_body), &url)?;

        Ok(issue.into())
    }
}

impl RepositoryClient for GitLabClient {
    fn get_raw_file(&self, project: &str, path: &str, git_ref: &str) -> Result<String, ApiError> {
        let url = self.raw_file_url(project, path)?;
        let request = self.http_client.get(&url).query(&[("ref", git_ref)]);

        self.send(request, &url)?
            .text()
            .map_err(|source| ApiError::Decode { url, source })
    }
}

impl GitLabClient {
    /// `path` is a single percent-encoded segment, so `/` becomes `%2F` and a
    /// space becomes `%20`.
    fn raw_file_url(&self, project: &str, path: &str) -> Result<String, ApiError> {
        let mut url =
            Url::parse(&self.api_url).map_err(|_| ApiError::InvalidUrl(self.api_url.clone()))?;

        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.api_url.clone()))?
            .pop_if_empty()
            .extend(["projects", project, "repository", "files", path, "raw"]);

        Ok(url.into())
    }
}

/// The CLI spells scopes with dashes, the API with underscores.
fn to_api_scope(scope: &str) -> String {
    scope.replace('-', "_")
}

// =============================================================================
// API Types
// =============================================================================

#[derive(Debug, serde::Deserialize)]
struct GitLabUser {
    username: String,
}

#[derive(Debug, serde::Deserialize)]
struct GitLabReferences {
    full: String,
}

/// GitLab API response for merge requests.
/// https://docs.gitlab.com/api/merge_requests/
#[derive(Debug, serde::Deserialize)]
struct GitLabMergeRequest {
    iid: u64,
    title: String,
    description: Option<String>,
    state: String,
    author: GitLabUser,
    assignee: Option<GitLabUser>,
    source_branch: String,
    target_branch: String,
    created_at: String,
    updated_at: String,
    web_url: String,
    references: GitLabReferences,
}

impl From<GitLabMergeRequest> for MergeRequest {
    fn from(mr: GitLabMergeRequest) -> Self {
        MergeRequest {
            iid: mr.iid,
            reference: mr.references.full,
            title: mr.title,
            description: mr.description.unwrap_or_default(),
            state: mr.state,
            author: mr.author.username,
            assignee: mr.assignee.map(|a| a.username),
            source_branch: mr.source_branch,
            target_branch: mr.target_branch,
            created_at: mr.created_at,
            updated_at: mr.updated_at,
            url: mr.web_url,
        }
    }
}

/// GitLab API response for issues.
/// https://docs.gitlab.com/api/issues/
#[derive(Debug, serde::Deserialize)]
struct GitLabIssue {
    iid: u64,
    title: String,
    description: Option<String>,
    state: String,
    labels: Vec<String>,
    author: GitLabUser,
    assignee: Option<GitLabUser>,
    created_at: String,
    updated_at: String,
    web_url: String,
    references: GitLabReferences,
}

impl From<GitLabIssue> for Issue {
    fn from(issue: GitLabIssue) -> Self {
        Issue {
            iid: issue.iid,
            reference: issue.references.full,
            title: issue.title,
            description: issue.description.unwrap_or_default(),
            state: issue.state,
            author: issue.author.username,
            assignee: issue.assignee.map(|a| a.username),
            labels: issue.labels,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            url: issue.web_url,
        }
    }
}
