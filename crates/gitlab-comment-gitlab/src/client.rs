//! GitLab API client.
//!
//! Talks to the merge request notes endpoints of GitLab REST API v4 with a
//! `PRIVATE-TOKEN` header. Projects are addressed by their URL-encoded
//! `org/repo` path.

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use gitlab_comment_core::{
    CommentId, CommentPage, CommentStore, MergeRequestRef, RemoteComment, StoreError, StoreResult,
};

use crate::error::{ClientError, Result};

pub const DEFAULT_BASE_URL: &str = "https://gitlab.com";

#[derive(Debug, Clone)]
pub struct GitLabClientConfig {
    /// Base URL of the GitLab instance (e.g., `https://gitlab.com`).
    pub base_url: String,
    pub token: String,
    pub timeout_secs: u64,
}

impl Default for GitLabClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitLabClient {
    client: Client,
    config: GitLabClientConfig,
}

/// GitLab note from API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabNote {
    pub id: i64,
    pub body: String,
    /// Set on notes GitLab writes itself (pushes, approvals, label changes)
    #[serde(default)]
    pub system: bool,
}

/// Merge request as listed by the commit endpoint. Only the iid is used.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabMergeRequest {
    pub iid: u64,
}

impl From<GitLabNote> for RemoteComment {
    fn from(note: GitLabNote) -> Self {
        RemoteComment {
            id: note.id,
            body: note.body,
        }
    }
}

/// Notes live on merge requests; there is no commit-level equivalent here.
fn require_merge_request(mr: &MergeRequestRef) -> StoreResult<()> {
    if mr.mr_number == 0 {
        return Err(StoreError::NotSupported(
            "commenting without a merge request".to_string(),
        ));
    }
    Ok(())
}

impl GitLabClient {
    pub fn new(config: GitLabClientConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let token_value =
            header::HeaderValue::from_str(&config.token).map_err(|_| ClientError::InvalidToken)?;
        headers.insert("PRIVATE-TOKEN", token_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v4{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    fn notes_endpoint(mr: &MergeRequestRef) -> String {
        format!(
            "/projects/{}/merge_requests/{}/notes",
            urlencoding::encode(&mr.project_path()),
            mr.mr_number
        )
    }

    /// `x-next-page` is empty on the last page.
    fn next_page(response: &Response) -> Option<u32> {
        response
            .headers()
            .get("x-next-page")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ClientError::Decode {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                });
        }

        let body = response.text().await.unwrap_or_default();
        // GitLab returns errors as {"message": "..."} or {"error": "..."}
        let body_message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error"))
                    .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
            });
        let message = match (status, body_message) {
            (StatusCode::UNAUTHORIZED, _) => "token is invalid, expired or revoked".to_string(),
            (StatusCode::FORBIDDEN, _) => "Access denied".to_string(),
            (StatusCode::NOT_FOUND, _) => "Resource not found".to_string(),
            (StatusCode::TOO_MANY_REQUESTS, _) => "Rate limit exceeded".to_string(),
            (_, Some(msg)) => msg,
            _ => format!("Request failed ({}): {}", status.as_u16(), body),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
            message,
        })
    }

    /// One page of notes on a merge request, plus the next page number.
    pub async fn list_notes(
        &self,
        mr: &MergeRequestRef,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<GitLabNote>, Option<u32>)> {
        let endpoint = Self::notes_endpoint(mr);
        debug!(event = "gitlab.request", method = "GET", endpoint = %endpoint, page = page);
        let response = self
            .client
            .get(self.api_url(&endpoint))
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await?;
        let next = Self::next_page(&response);
        let notes = self.handle_response(response, &endpoint).await?;
        Ok((notes, next))
    }

    pub async fn create_note(&self, mr: &MergeRequestRef, body: &str) -> Result<GitLabNote> {
        let endpoint = Self::notes_endpoint(mr);
        debug!(event = "gitlab.request", method = "POST", endpoint = %endpoint);
        let response = self
            .client
            .post(self.api_url(&endpoint))
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;
        self.handle_response(response, &endpoint).await
    }

    pub async fn update_note(
        &self,
        mr: &MergeRequestRef,
        note_id: i64,
        body: &str,
    ) -> Result<GitLabNote> {
        let endpoint = format!("{}/{}", Self::notes_endpoint(mr), note_id);
        debug!(event = "gitlab.request", method = "PUT", endpoint = %endpoint);
        let response = self
            .client
            .put(self.api_url(&endpoint))
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;
        self.handle_response(response, &endpoint).await
    }

    /// Merge requests containing `sha`, in GitLab's order.
    pub async fn merge_requests_for_commit(
        &self,
        project_path: &str,
        sha: &str,
    ) -> Result<Vec<GitLabMergeRequest>> {
        let endpoint = format!(
            "/projects/{}/repository/commits/{}/merge_requests",
            urlencoding::encode(project_path),
            urlencoding::encode(sha)
        );
        debug!(event = "gitlab.request", method = "GET", endpoint = %endpoint);
        let response = self.client.get(self.api_url(&endpoint)).send().await?;
        self.handle_response(response, &endpoint).await
    }
}

#[async_trait]
impl CommentStore for GitLabClient {
    async fn list_comments(
        &self,
        mr: &MergeRequestRef,
        page: u32,
        per_page: u32,
    ) -> StoreResult<CommentPage> {
        let (notes, next) = self.list_notes(mr, page, per_page).await?;
        Ok(CommentPage {
            comments: notes
                .into_iter()
                .filter(|note| !note.system)
                .map(RemoteComment::from)
                .collect(),
            has_next_page: next.is_some(),
        })
    }

    async fn create_comment(&self, mr: &MergeRequestRef, body: &str) -> StoreResult<CommentId> {
        require_merge_request(mr)?;
        Ok(self.create_note(mr, body).await?.id)
    }

    async fn edit_comment(
        &self,
        mr: &MergeRequestRef,
        id: CommentId,
        body: &str,
    ) -> StoreResult<()> {
        require_merge_request(mr)?;
        self.update_note(mr, id, body).await?;
        Ok(())
    }

    async fn find_mr_for_commit(
        &self,
        org: &str,
        repo: &str,
        sha: &str,
    ) -> StoreResult<Option<u64>> {
        let mrs = self
            .merge_requests_for_commit(&format!("{org}/{repo}"), sha)
            .await?;
        Ok(mrs.first().map(|mr| mr.iid))
    }

    async fn hide_comment(&self, _mr: &MergeRequestRef, _id: CommentId) -> StoreResult<()> {
        Err(StoreError::NotSupported(
            "GitLab notes cannot be hidden".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> GitLabClient {
        GitLabClient::new(GitLabClientConfig {
            base_url: base_url.to_string(),
            token: "test-token".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_api_url_construction() {
        let c = client("https://gitlab.example.com/");
        assert_eq!(c.api_url("/user"), "https://gitlab.example.com/api/v4/user");
    }

    #[test]
    fn test_notes_endpoint_encodes_project_path() {
        let mr = MergeRequestRef::new("group/sub", "api", 7);
        assert_eq!(
            GitLabClient::notes_endpoint(&mr),
            "/projects/group%2Fsub%2Fapi/merge_requests/7/notes"
        );
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let err = GitLabClient::new(GitLabClientConfig {
            token: "line\nbreak".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ClientError::InvalidToken));
    }

    #[tokio::test]
    async fn test_writes_without_merge_request_are_not_supported() {
        // Unroutable address: the check must happen before any request.
        let c = client("http://127.0.0.1:9");
        let mr = MergeRequestRef::new("g", "p", 0);
        let err = c.create_comment(&mr, "body").await.unwrap_err();
        assert!(matches!(err, StoreError::NotSupported(_)));
        let err = c.edit_comment(&mr, 3, "body").await.unwrap_err();
        assert!(matches!(err, StoreError::NotSupported(_)));
    }

    #[tokio::test]
    async fn test_hide_is_not_supported() {
        let c = client("https://gitlab.example.com");
        let err = c
            .hide_comment(&MergeRequestRef::new("g", "p", 1), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotSupported(_)));
    }
}
