use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use assembla_api::{Assembla, AttachmentFile, Ticket, TicketUpdate};
use assembla_output::OutputRenderer;
use assembla_tracker::{AssemblaTracker, IssueTracker, NewIssueOptions, ViewLinkOptions};
use clap::Subcommand;
use serde::Serialize;

#[derive(Subcommand, Debug, Clone)]
pub enum TicketCommand {
    /// Fetch a single ticket
    Get {
        /// Ticket number
        number: u64,
    },

    /// Create a new ticket
    Create {
        /// Ticket summary
        #[arg(long)]
        summary: String,
        /// Ticket description
        #[arg(long, default_value = "")]
        description: String,
        /// Assignee user id or name
        #[arg(long)]
        assignee: Option<String>,
        /// Estimate in hours
        #[arg(long)]
        estimate: Option<f64>,
        /// Milestone id
        #[arg(long)]
        milestone: Option<u64>,
        /// Reporter user id or name
        #[arg(long)]
        reporter: Option<String>,
        /// File to attach to the new ticket
        #[arg(long)]
        attach: Option<PathBuf>,
        /// MIME type of the attached file
        #[arg(long, requires = "attach")]
        mime: Option<String>,
    },

    /// Update fields of an existing ticket
    Update {
        /// Ticket number
        number: u64,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Status name (e.g. New, Accepted, Fixed)
        #[arg(long)]
        status: Option<String>,
        /// Assignee user id or name
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        milestone: Option<u64>,
        #[arg(long)]
        estimate: Option<f64>,
        /// 1 (highest) to 5 (lowest)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        priority: Option<u8>,
    },

    /// Add a comment to a ticket
    Comment {
        /// Ticket number
        number: String,
        /// Comment text
        text: String,
    },

    /// Upload a file and attach it to a ticket
    Attach {
        /// Ticket number
        number: u64,
        /// File to upload
        file: PathBuf,
        /// MIME type of the file
        #[arg(long)]
        mime: Option<String>,
    },

    /// Print an HTML link to a ticket
    Link {
        /// Ticket number
        number: String,
        /// Omit the ticket summary from the link text
        #[arg(long)]
        no_summary: bool,
    },

    /// Print the web URL of a ticket
    Url {
        /// Ticket number
        number: String,
    },

    /// Print the status of a ticket
    Status {
        /// Ticket number
        number: String,
    },

    /// Check whether a ticket exists
    Exists {
        /// Ticket number
        number: String,
    },
}

pub async fn execute(
    command: TicketCommand,
    tracker: &AssemblaTracker,
    renderer: &OutputRenderer,
) -> Result<()> {
    let client = tracker
        .client()
        .ok_or_else(|| anyhow!("Not connected to Assembla"))?;

    match command {
        TicketCommand::Get { number } => view_ticket(tracker, client, renderer, number).await,
        TicketCommand::Create {
            summary,
            description,
            assignee,
            estimate,
            milestone,
            reporter,
            attach,
            mime,
        } => {
            let opts = NewIssueOptions {
                assigned_to: assignee.map(|a| resolve_user(client, &a)),
                estimate,
                milestone,
                reported_by: reporter.map(|r| resolve_user(client, &r)),
                attachment: attach.map(|path| attachment(path, mime)),
            };
            create_ticket(tracker, renderer, &summary, &description, &opts).await
        }
        TicketCommand::Update {
            number,
            summary,
            description,
            status,
            assignee,
            milestone,
            estimate,
            priority,
        } => {
            let update = TicketUpdate {
                summary,
                description,
                status,
                priority,
                assigned_to_id: assignee.map(|a| resolve_user(client, &a)),
                milestone_id: milestone,
                estimate,
            };
            update_ticket(client, renderer, number, &update).await
        }
        TicketCommand::Comment { number, text } => {
            let result = tracker.add_note(&number, &text).await;
            if !result.status_ok {
                renderer.failure(&result.msg);
                bail!("Unable to comment on ticket #{number}");
            }
            renderer.success(&result.msg);
            Ok(())
        }
        TicketCommand::Attach { number, file, mime } => {
            attach_file(client, renderer, number, attachment(file, mime)).await
        }
        TicketCommand::Link { number, no_summary } => {
            let opts = ViewLinkOptions {
                add_summary: !no_summary,
                ..Default::default()
            };
            let link = tracker.build_view_bug_link(&number, opts).await;
            if !link.op {
                bail!(link.link);
            }
            println!("{}", link.link);
            Ok(())
        }
        TicketCommand::Url { number } => {
            if !tracker.check_bug_id_syntax(&number) {
                bail!("Invalid ticket number: {number}");
            }
            println!("{}", tracker.build_view_bug_url(&number));
            Ok(())
        }
        TicketCommand::Status { number } => {
            let status = tracker
                .get_issue_status(&number)
                .await
                .ok_or_else(|| anyhow!("Ticket #{number} not found"))?;
            println!("{status}");
            Ok(())
        }
        TicketCommand::Exists { number } => {
            #[derive(Serialize)]
            struct Existence<'a> {
                number: &'a str,
                exists: bool,
            }

            let exists = tracker.check_bug_id_syntax(&number)
                && tracker.check_bug_id_existence(&number).await;
            renderer.render(&Existence {
                number: &number,
                exists,
            })
        }
    }
}

fn attachment(path: PathBuf, mime: Option<String>) -> AttachmentFile {
    let file = AttachmentFile::new(path);
    match mime {
        Some(mime) => file.with_mime_type(mime),
        None => file,
    }
}

/// Maps a user id or display name to a user id using the cached space users.
/// Unknown values are passed through unchanged.
pub fn resolve_user(client: &Assembla, value: &str) -> String {
    let users = client.users();
    if users.contains_key(value) {
        return value.to_string();
    }

    users
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(value))
        .map(|(id, _)| id.clone())
        .unwrap_or_else(|| value.to_string())
}

#[derive(Serialize)]
struct TicketView<'a> {
    number: u64,
    summary: &'a str,
    status: &'a str,
    priority: Option<u8>,
    assignee: Option<&'a str>,
    milestone: Option<&'a str>,
    estimate: Option<f64>,
    created_on: Option<String>,
    url: String,
    description: &'a str,
}

fn ticket_view<'a>(
    tracker: &AssemblaTracker,
    client: &'a Assembla,
    ticket: &'a Ticket,
) -> TicketView<'a> {
    TicketView {
        number: ticket.number,
        summary: &ticket.summary,
        status: ticket.status.as_deref().unwrap_or(""),
        priority: ticket.priority,
        assignee: ticket
            .assigned_to_id
            .as_deref()
            .map(|id| client.user_name(id).unwrap_or(id)),
        milestone: ticket
            .milestone_id
            .and_then(|id| client.milestone_title(id)),
        estimate: ticket.estimate,
        created_on: ticket.created_on.map(|d| d.format("%Y-%m-%d %H:%M").to_string()),
        url: tracker.build_view_bug_url(&ticket.number.to_string()),
        description: ticket.description.as_deref().unwrap_or(""),
    }
}

async fn view_ticket(
    tracker: &AssemblaTracker,
    client: &Assembla,
    renderer: &OutputRenderer,
    number: u64,
) -> Result<()> {
    let ticket = client
        .get_ticket(number)
        .await
        .with_context(|| format!("Failed to fetch ticket #{number}"))?
        .ok_or_else(|| anyhow!("Ticket #{number} not found"))?;

    renderer.render(&ticket_view(tracker, client, &ticket))
}

async fn create_ticket(
    tracker: &AssemblaTracker,
    renderer: &OutputRenderer,
    summary: &str,
    description: &str,
    opts: &NewIssueOptions,
) -> Result<()> {
    let result = tracker.add_issue(summary, description, opts).await;
    if !result.status_ok {
        bail!(result.msg);
    }

    tracing::info!(number = %result.id, "Ticket created");
    renderer.success(&format!("{} (#{})", result.msg, result.id));
    renderer.render(&result)
}

async fn update_ticket(
    client: &Assembla,
    renderer: &OutputRenderer,
    number: u64,
    update: &TicketUpdate,
) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update. Pass at least one field such as --status or --summary.");
    }

    client
        .update_ticket(number, update)
        .await
        .with_context(|| format!("Failed to update ticket #{number}"))?;

    renderer.success(&format!("Updated ticket #{number}"));
    Ok(())
}

async fn attach_file(
    client: &Assembla,
    renderer: &OutputRenderer,
    number: u64,
    file: AttachmentFile,
) -> Result<()> {
    let ticket = client
        .get_ticket(number)
        .await
        .with_context(|| format!("Failed to fetch ticket #{number}"))?
        .ok_or_else(|| anyhow!("Ticket #{number} not found"))?;

    let document = client
        .add_attachment(ticket.id, &file)
        .await
        .with_context(|| format!("Failed to attach {} to ticket #{number}", file.path.display()))?;

    renderer.success(&format!("Attached {} to ticket #{number}", file.file_name()));
    renderer.render(&document)
}
