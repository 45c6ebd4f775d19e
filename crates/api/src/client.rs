use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use tracing::{debug, info};

use crate::error::{ApiError, Result};
use crate::models::{
    AttachmentFile, CommentBody, CommentEnvelope, Document, Milestone, NewTicket, Ticket,
    TicketComment, TicketEnvelope, TicketUpdate, User,
};
use crate::ApiClient;

pub const DEFAULT_API_URL: &str = "https://api.assembla.com/v1/";
pub const DEFAULT_WEB_URL: &str = "https://www.assembla.com/";

/// Timeout for user, milestone, comment and document calls.
const EXTENDED_TIMEOUT: Duration = Duration::from_secs(50);

/// Connection settings for one Assembla space.
#[derive(Debug, Clone, Default)]
pub struct AssemblaConfig {
    pub api_key: Option<String>,
    pub api_key_secret: Option<String>,
    pub space_id: Option<String>,
    pub base_url: Option<String>,
    pub web_url: Option<String>,
}

impl AssemblaConfig {
    pub fn new(
        api_key: impl Into<String>,
        api_key_secret: impl Into<String>,
        space_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key: Some(api_key.into()),
            api_key_secret: Some(api_key_secret.into()),
            space_id: Some(space_id.into()),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_web_url(mut self, web_url: impl Into<String>) -> Self {
        self.web_url = Some(web_url.into());
        self
    }

    /// True when all three credentials needed to create tickets are present.
    pub fn is_complete(&self) -> bool {
        [&self.space_id, &self.api_key, &self.api_key_secret]
            .iter()
            .all(|v| v.as_deref().map(str::trim).is_some_and(|s| !s.is_empty()))
    }
}

fn required(value: &Option<String>, field: &'static str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or(ApiError::MissingConfig { field })
}

/// Ticket, comment, document, user and milestone operations scoped to a space.
pub struct Assembla {
    client: ApiClient,
    extended: ApiClient,
    space_id: String,
    users: BTreeMap<String, String>,
    milestones: BTreeMap<u64, String>,
}

impl Assembla {
    /// Validates the configuration without touching the network.
    pub fn new(config: AssemblaConfig) -> Result<Self> {
        let space_id = required(&config.space_id, "space_id")?;
        let api_key = required(&config.api_key, "api_key")?;
        let api_key_secret = required(&config.api_key_secret, "api_key_secret")?;

        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_API_URL);

        let client = ApiClient::new(base_url)?.with_api_key(api_key, api_key_secret);
        let extended = client.clone().with_timeout(EXTENDED_TIMEOUT);

        Ok(Self {
            client,
            extended,
            space_id,
            users: BTreeMap::new(),
            milestones: BTreeMap::new(),
        })
    }

    /// Validates the configuration and loads the user and milestone caches.
    pub async fn connect(config: AssemblaConfig) -> Result<Self> {
        let mut assembla = Self::new(config)?;
        assembla.refresh_users().await?;
        assembla.refresh_milestones().await?;
        info!(
            space = %assembla.space_id,
            users = assembla.users.len(),
            milestones = assembla.milestones.len(),
            "Connected to Assembla space"
        );
        Ok(assembla)
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    pub fn api(&self) -> &ApiClient {
        &self.client
    }

    pub fn users(&self) -> &BTreeMap<String, String> {
        &self.users
    }

    pub fn user_name(&self, id: &str) -> Option<&str> {
        self.users.get(id).map(String::as_str)
    }

    pub fn milestones(&self) -> &BTreeMap<u64, String> {
        &self.milestones
    }

    pub fn milestone_title(&self, id: u64) -> Option<&str> {
        self.milestones.get(&id).map(String::as_str)
    }

    pub async fn refresh_users(&mut self) -> Result<&BTreeMap<String, String>> {
        let users: Vec<User> = self
            .extended
            .get_list(&self.space_path("users.json"))
            .await?;
        self.users = users
            .iter()
            .map(|u| (u.id.clone(), u.display_name().to_string()))
            .collect();
        debug!(count = self.users.len(), "Loaded space users");
        Ok(&self.users)
    }

    pub async fn refresh_milestones(&mut self) -> Result<&BTreeMap<u64, String>> {
        let milestones: Vec<Milestone> = self
            .extended
            .get_list(&self.space_path("milestones/all.json"))
            .await?;
        self.milestones = milestones.into_iter().map(|m| (m.id, m.title)).collect();
        debug!(count = self.milestones.len(), "Loaded space milestones");
        Ok(&self.milestones)
    }

    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket> {
        let created: Ticket = self
            .client
            .post(
                &self.space_path("tickets.json"),
                &TicketEnvelope { ticket },
            )
            .await?;
        info!(number = created.number, id = created.id, "Ticket created");
        Ok(created)
    }

    pub async fn update_ticket(&self, number: u64, update: &TicketUpdate) -> Result<()> {
        self.client
            .request_empty(
                Method::PUT,
                &self.ticket_path(number),
                Some(&TicketEnvelope { ticket: update }),
            )
            .await?;
        info!(number, "Ticket updated");
        Ok(())
    }

    /// Fetches a ticket by number. A missing ticket is `Ok(None)`.
    pub async fn get_ticket(&self, number: u64) -> Result<Option<Ticket>> {
        match self.client.get(&self.ticket_path(number)).await {
            Ok(ticket) => Ok(Some(ticket)),
            Err(err) if err.is_not_found() => {
                debug!(number, "Ticket not found");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Adds a comment to a ticket. Returns `Ok(None)` when the ticket does not exist.
    pub async fn add_comment(&self, number: u64, comment: &str) -> Result<Option<TicketComment>> {
        if self.get_ticket(number).await?.is_none() {
            return Ok(None);
        }

        let body = CommentEnvelope {
            ticket_comment: CommentBody { comment },
        };
        let created: TicketComment = self
            .extended
            .post(
                &self.space_path(&format!("tickets/{number}/ticket_comments.json")),
                &body,
            )
            .await?;
        info!(number, comment_id = created.id, "Comment added");
        Ok(Some(created))
    }

    /// Uploads a file as a document attached to the ticket with internal id `ticket_id`.
    pub async fn add_attachment(&self, ticket_id: u64, file: &AttachmentFile) -> Result<Document> {
        let content = tokio::fs::read(&file.path)
            .await
            .map_err(|source| ApiError::Attachment {
                path: file.path.display().to_string(),
                source,
            })?;

        let mut part = Part::bytes(content).file_name(file.file_name());
        if let Some(mime) = file.mime_type.as_deref() {
            part = part.mime_str(mime)?;
        }

        let form = Form::new()
            .part("document[file]", part)
            .text("document[attachable_type]", "Ticket")
            .text("document[attachable_id]", ticket_id.to_string());

        let document: Document = self
            .extended
            .post_multipart(&self.space_path("documents.json"), form)
            .await?;
        info!(ticket_id, document = %document.id, "Attachment uploaded");
        Ok(document)
    }

    fn space_path(&self, rest: &str) -> String {
        format!("spaces/{}/{}", self.space_id, rest)
    }

    fn ticket_path(&self, number: u64) -> String {
        self.space_path(&format!("tickets/{number}.json"))
    }
}
