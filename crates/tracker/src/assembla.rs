use assembla_api::{Assembla, AssemblaConfig, NewTicket, Ticket, DEFAULT_WEB_URL};
use async_trait::async_trait;
use tracing::{error, warn};

use crate::{
    is_numeric_id, AddIssueResult, AddNoteResult, Issue, IssueTracker, NewIssueOptions,
    ViewBugLink, ViewLinkOptions, NO_ISSUE_ID,
};

pub const TRACKER_TYPE: &str = "assembla";

const TICKET_CREATED: &str = "Assembla ticket created";
const TICKET_NOT_FOUND: &str = "Ticket not found";
const NOT_CONNECTED: &str = "Not connected to Assembla";

/// [`IssueTracker`] backed by a single Assembla space.
pub struct AssemblaTracker {
    name: String,
    config: AssemblaConfig,
    client: Option<Assembla>,
}

impl AssemblaTracker {
    /// Connects to the configured space. A failed connection is logged and
    /// leaves the tracker disconnected.
    pub async fn connect(name: impl Into<String>, config: AssemblaConfig) -> Self {
        let name = name.into();
        let client = match Assembla::connect(config.clone()).await {
            Ok(client) => Some(client),
            Err(err) => {
                error!(tracker = %name, error = %err, "Unable to connect to Assembla");
                None
            }
        };

        Self {
            name,
            config,
            client,
        }
    }

    /// Wraps an already connected client.
    pub fn with_client(name: impl Into<String>, config: AssemblaConfig, client: Assembla) -> Self {
        Self {
            name: name.into(),
            config,
            client: Some(client),
        }
    }

    pub fn client(&self) -> Option<&Assembla> {
        self.client.as_ref()
    }

    pub fn config(&self) -> &AssemblaConfig {
        &self.config
    }

    /// Profile snippet an administrator fills in to set up this tracker.
    pub fn cfg_template() -> String {
        [
            "# Template AssemblaTracker",
            "profiles:",
            "  assembla:",
            "    api_key: ASSEMBLA API KEY FOR THE USER CREATING THE ISSUES",
            "    api_key_secret: ASSEMBLA API KEY SECRET FOR THE USER CREATING THE ISSUES",
            "    space_id: NAME OF THE SPACE HOSTING THE PROJECT",
            "",
        ]
        .join("\n")
    }

    fn connected(&self, operation: &str) -> Option<&Assembla> {
        if self.client.is_none() {
            error!(tracker = %self.name, operation, "Not connected");
        }
        self.client.as_ref()
    }

    async fn fetch_ticket(&self, issue_id: &str) -> Option<Ticket> {
        let client = self.connected("get_issue")?;
        let Some(number) = parse_number(issue_id) else {
            warn!(issue_id, "Invalid Assembla ticket number");
            return None;
        };

        match client.get_ticket(number).await {
            Ok(ticket) => ticket,
            Err(err) => {
                warn!(number, error = %err, "Assembla ticket lookup failed");
                None
            }
        }
    }
}

fn parse_number(issue_id: &str) -> Option<u64> {
    let trimmed = issue_id.trim();
    if is_numeric_id(trimmed) {
        trimmed.parse().ok()
    } else {
        None
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

impl From<Ticket> for Issue {
    fn from(ticket: Ticket) -> Self {
        let is_resolved = ticket.is_closed();
        Issue {
            id: ticket.number.to_string(),
            summary: ticket.summary,
            description: ticket.description,
            status: ticket.status,
            is_resolved,
        }
    }
}

#[async_trait]
impl IssueTracker for AssemblaTracker {
    fn name(&self) -> &str {
        &self.name
    }

    fn tracker_type(&self) -> &'static str {
        TRACKER_TYPE
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn can_create_via_api(&self) -> bool {
        self.config.is_complete()
    }

    fn build_view_bug_url(&self, issue_id: &str) -> String {
        let web = self
            .config
            .web_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_WEB_URL);
        let space = self.config.space_id.as_deref().unwrap_or("").trim();

        format!(
            "{}/spaces/{}/tickets/{}",
            web.trim_end_matches('/'),
            space,
            urlencoding::encode(issue_id)
        )
    }

    async fn build_view_bug_link(&self, issue_id: &str, opts: ViewLinkOptions) -> ViewBugLink {
        let Some(ticket) = self.fetch_ticket(issue_id).await else {
            return ViewBugLink {
                link: format!(
                    "Internal Message: get_issue({issue_id}) FAILURE on build_view_bug_link"
                ),
                is_resolved: false,
                op: false,
            };
        };

        let mut link = format!(
            "<a href='{}' target='_blank'>{}",
            self.build_view_bug_url(issue_id),
            ticket.number
        );
        if opts.add_summary && !ticket.summary.is_empty() {
            link.push_str(" : ");
            link.push_str(&escape_html(&ticket.summary));
        }
        link.push_str("</a>");

        ViewBugLink {
            link,
            is_resolved: ticket.is_closed(),
            op: true,
        }
    }

    async fn get_issue(&self, issue_id: &str) -> Option<Issue> {
        self.fetch_ticket(issue_id).await.map(Issue::from)
    }

    async fn add_issue(
        &self,
        summary: &str,
        description: &str,
        opts: &NewIssueOptions,
    ) -> AddIssueResult {
        let Some(client) = self.connected("add_issue") else {
            return AddIssueResult::failed(NOT_CONNECTED);
        };

        let ticket = NewTicket {
            description: Some(description.to_string()),
            assigned_to_id: opts.assigned_to.clone(),
            estimate: opts.estimate,
            milestone_id: opts.milestone,
            reporter_id: opts.reported_by.clone(),
            ..NewTicket::new(summary)
        };

        let created = match client.create_ticket(&ticket).await {
            Ok(created) => created,
            Err(err) => {
                let msg = format!("Create Assembla ticket FAILURE => {err}");
                warn!("{msg}");
                let serialized = serde_json::to_string(&ticket).unwrap_or_default();
                return AddIssueResult::failed(format!("{msg} - ticket: {serialized}"));
            }
        };

        let mut result = AddIssueResult {
            status_ok: true,
            id: created.number.to_string(),
            msg: TICKET_CREATED.to_string(),
        };

        if let Some(attachment) = &opts.attachment {
            if let Err(err) = client.add_attachment(created.id, attachment).await {
                warn!(
                    number = created.number,
                    error = %err,
                    "Attachment upload failed for new ticket"
                );
                result.msg = format!("{TICKET_CREATED}, attachment upload FAILURE => {err}");
            }
        }

        result
    }

    async fn add_note(&self, issue_id: &str, note: &str) -> AddNoteResult {
        let Some(client) = self.connected("add_note") else {
            return AddNoteResult {
                status_ok: false,
                id: None,
                msg: NOT_CONNECTED.to_string(),
            };
        };

        let Some(number) = parse_number(issue_id) else {
            return AddNoteResult {
                status_ok: false,
                id: None,
                msg: TICKET_NOT_FOUND.to_string(),
            };
        };

        match client.add_comment(number, note).await {
            Ok(Some(comment)) => AddNoteResult {
                status_ok: true,
                id: Some(comment.ticket_id.to_string()),
                msg: format!("Comment added to ticket #{issue_id}"),
            },
            Ok(None) => AddNoteResult {
                status_ok: false,
                id: None,
                msg: TICKET_NOT_FOUND.to_string(),
            },
            Err(err) => {
                let msg = format!("Add Assembla ticket comment FAILURE => {err}");
                warn!("{msg}");
                AddNoteResult {
                    status_ok: false,
                    id: Some(NO_ISSUE_ID.to_string()),
                    msg,
                }
            }
        }
    }
}
