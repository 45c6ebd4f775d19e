use anyhow::{anyhow, Result};
use assembla_output::OutputRenderer;
use assembla_tracker::AssemblaTracker;
use serde::Serialize;

pub fn list_users(tracker: &AssemblaTracker, renderer: &OutputRenderer) -> Result<()> {
    let client = tracker
        .client()
        .ok_or_else(|| anyhow!("Not connected to Assembla"))?;

    #[derive(Serialize)]
    struct Row<'a> {
        id: &'a str,
        name: &'a str,
    }

    let rows: Vec<Row<'_>> = client
        .users()
        .iter()
        .map(|(id, name)| Row { id, name })
        .collect();

    if rows.is_empty() {
        tracing::info!(space = %client.space_id(), "Space has no users");
    }

    renderer.render(&rows)
}

pub fn list_milestones(tracker: &AssemblaTracker, renderer: &OutputRenderer) -> Result<()> {
    let client = tracker
        .client()
        .ok_or_else(|| anyhow!("Not connected to Assembla"))?;

    #[derive(Serialize)]
    struct Row<'a> {
        id: u64,
        title: &'a str,
    }

    let rows: Vec<Row<'_>> = client
        .milestones()
        .iter()
        .map(|(id, title)| Row { id: *id, title })
        .collect();

    if rows.is_empty() {
        tracing::info!(space = %client.space_id(), "Space has no milestones");
    }

    renderer.render(&rows)
}
