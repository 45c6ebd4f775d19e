//! Backend-neutral issue tracker contract.
//!
//! Hosts talk to an [`IssueTracker`] and only ever see the plain result
//! shapes defined here. Failures are logged by the implementation and folded
//! into `status_ok`/`op` flags rather than surfaced as errors.

pub mod assembla;

pub use assembla::AssemblaTracker;
pub use assembla_api::{AssemblaConfig, AttachmentFile};

use async_trait::async_trait;
use serde::Serialize;

/// Id reported by [`AddIssueResult`] when no issue was created.
pub const NO_ISSUE_ID: &str = "-1";

/// Generic view of a remote issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub id: String,
    pub summary: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub is_resolved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewBugLink {
    pub link: String,
    pub is_resolved: bool,
    pub op: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ViewLinkOptions {
    pub add_summary: bool,
    pub color_by_status: bool,
}

impl Default for ViewLinkOptions {
    fn default() -> Self {
        Self {
            add_summary: true,
            color_by_status: false,
        }
    }
}

/// Optional fields a host may supply when creating an issue.
#[derive(Debug, Clone, Default)]
pub struct NewIssueOptions {
    pub assigned_to: Option<String>,
    pub estimate: Option<f64>,
    pub milestone: Option<u64>,
    pub reported_by: Option<String>,
    pub attachment: Option<AttachmentFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddIssueResult {
    pub status_ok: bool,
    pub id: String,
    pub msg: String,
}

impl AddIssueResult {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            status_ok: false,
            id: NO_ISSUE_ID.to_string(),
            msg: msg.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddNoteResult {
    pub status_ok: bool,
    pub id: Option<String>,
    pub msg: String,
}

/// True when `issue_id` is a non-empty run of ASCII digits.
pub fn is_numeric_id(issue_id: &str) -> bool {
    !issue_id.is_empty() && issue_id.bytes().all(|b| b.is_ascii_digit())
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    fn name(&self) -> &str;

    /// Short backend identifier used by hosts to pick input forms.
    fn tracker_type(&self) -> &'static str;

    fn is_connected(&self) -> bool;

    fn can_create_via_api(&self) -> bool;

    fn build_view_bug_url(&self, issue_id: &str) -> String;

    async fn build_view_bug_link(&self, issue_id: &str, opts: ViewLinkOptions) -> ViewBugLink;

    async fn get_issue(&self, issue_id: &str) -> Option<Issue>;

    async fn get_issue_status(&self, issue_id: &str) -> Option<String> {
        self.get_issue(issue_id).await.and_then(|issue| issue.status)
    }

    async fn add_issue(
        &self,
        summary: &str,
        description: &str,
        opts: &NewIssueOptions,
    ) -> AddIssueResult;

    async fn add_note(&self, issue_id: &str, note: &str) -> AddNoteResult;

    fn check_bug_id_syntax(&self, issue_id: &str) -> bool {
        is_numeric_id(issue_id)
    }

    async fn check_bug_id_existence(&self, issue_id: &str) -> bool {
        self.get_issue(issue_id).await.is_some()
    }
}
