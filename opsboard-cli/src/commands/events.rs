//! Calendar event commands.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use owo_colors::OwoColorize;

use opsboard_core::{CollectionKind, Event, Item};

use crate::client::HttpCollection;
use crate::commands::{finish, parse_date};
use crate::coordinator::SyncCoordinator;

#[derive(Subcommand)]
pub enum EventsAction {
    /// List all events
    List,
    /// Add an event
    Add {
        title: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// Mark as an all-day event
        #[arg(long)]
        all_day: bool,
    },
    /// Remove an event by id
    Rm { id: String },
    /// Replace all events with the contents of a JSON file
    Import { path: PathBuf },
}

pub async fn run(server: &str, action: EventsAction) -> Result<()> {
    let remote = HttpCollection::new(server, CollectionKind::Events)?;
    let mut coordinator = SyncCoordinator::new(CollectionKind::Events, remote);
    coordinator
        .rehydrate()
        .await
        .context("failed to load events from the server")?;

    match action {
        EventsAction::List => {
            render(coordinator.cache().items());
            Ok(())
        }
        EventsAction::Add {
            title,
            start,
            end,
            all_day,
        } => {
            let event = Event {
                title: title.clone(),
                start: parse_date(&start)?,
                end: end.as_deref().map(parse_date).transpose()?,
                all_day: all_day.then_some(true),
            };
            let provisional = coordinator.create(event.into_fields());
            let report = finish(&mut coordinator).await?;

            let id = report
                .created
                .iter()
                .find(|(local, _)| *local == provisional)
                .map(|(_, server)| server.clone())
                .unwrap_or(provisional);
            println!("Added event '{title}' ({id})");
            Ok(())
        }
        EventsAction::Rm { id } => {
            if !coordinator.delete(&id) {
                bail!("no event with id '{id}'");
            }
            finish(&mut coordinator).await?;
            println!("Deleted event {id}");
            Ok(())
        }
        EventsAction::Import { path } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let items: Vec<Item> =
                serde_json::from_str(&raw).context("import file must be a JSON array of events")?;
            let count = items.len();
            coordinator.push_replace(items).await?;
            println!("Replaced events with {count} item(s) from {}", path.display());
            Ok(())
        }
    }
}

fn render(items: &[Item]) {
    if items.is_empty() {
        println!("No events.");
        return;
    }
    println!(
        "{:<38} {:<12} {}",
        "ID".bold(),
        "START".bold(),
        "TITLE".bold()
    );
    for item in items {
        println!(
            "{:<38} {:<12} {}",
            item.id,
            item.field_str("start"),
            item.field_str("title")
        );
    }
}
