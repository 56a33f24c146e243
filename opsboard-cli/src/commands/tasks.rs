//! Daily-task reporting commands.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use owo_colors::OwoColorize;

use opsboard_core::{CollectionKind, Item, Task};

use crate::client::HttpCollection;
use crate::commands::{finish, parse_date, parse_set_args};
use crate::coordinator::SyncCoordinator;

#[derive(Subcommand)]
pub enum TasksAction {
    /// List all tasks
    List,
    /// Add a task row
    Add {
        description: String,

        /// What is to be done
        #[arg(long)]
        task: String,

        /// Planned steps
        #[arg(long, default_value = "")]
        action_plan: String,

        /// Person in charge
        #[arg(long, default_value = "")]
        pic: String,

        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        target_date: String,

        /// Completion percentage (clamped to 0-100)
        #[arg(long, default_value_t = 0)]
        percentage: i64,
    },
    /// Edit fields of a task, e.g. --set percentage=60 --set pic=Sam
    Edit {
        id: String,

        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
    /// Remove a task by id
    Rm { id: String },
    /// Replace all tasks with the contents of a JSON file
    Import { path: PathBuf },
}

pub async fn run(server: &str, action: TasksAction) -> Result<()> {
    let remote = HttpCollection::new(server, CollectionKind::Tasks)?;
    let mut coordinator = SyncCoordinator::new(CollectionKind::Tasks, remote);
    coordinator
        .rehydrate()
        .await
        .context("failed to load tasks from the server")?;

    match action {
        TasksAction::List => {
            render(coordinator.cache().items());
            Ok(())
        }
        TasksAction::Add {
            description,
            task,
            action_plan,
            pic,
            target_date,
            percentage,
        } => {
            let row = Task {
                description: description.clone(),
                task,
                action_plan,
                pic,
                target_date: parse_date(&target_date)?,
                completion_date: None,
                percentage,
            };
            let provisional = coordinator.create(row.into_fields());
            let report = finish(&mut coordinator).await?;

            let id = report
                .created
                .iter()
                .find(|(local, _)| *local == provisional)
                .map(|(_, server)| server.clone())
                .unwrap_or(provisional);
            println!("Added task '{description}' ({id})");
            Ok(())
        }
        TasksAction::Edit { id, set } => {
            let fields = parse_set_args(&set)?;
            if !coordinator.update(&id, fields) {
                bail!("no task with id '{id}'");
            }
            finish(&mut coordinator).await?;
            println!("Updated task {id}");
            Ok(())
        }
        TasksAction::Rm { id } => {
            if !coordinator.delete(&id) {
                bail!("no task with id '{id}'");
            }
            finish(&mut coordinator).await?;
            println!("Deleted task {id}");
            Ok(())
        }
        TasksAction::Import { path } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let items: Vec<Item> =
                serde_json::from_str(&raw).context("import file must be a JSON array of tasks")?;
            let count = items.len();
            coordinator.push_replace(items).await?;
            println!("Replaced tasks with {count} item(s) from {}", path.display());
            Ok(())
        }
    }
}

fn render(items: &[Item]) {
    if items.is_empty() {
        println!("No tasks.");
        return;
    }
    println!(
        "{:<38} {:>4} {:<12} {:<12} {}",
        "ID".bold(),
        "%".bold(),
        "TARGET".bold(),
        "PIC".bold(),
        "DESCRIPTION".bold()
    );
    for item in items {
        println!(
            "{:<38} {:>4} {:<12} {:<12} {}",
            item.id,
            item.field_str("percentage"),
            item.field_str("targetDate"),
            item.field_str("pic"),
            item.field_str("description")
        );
    }
}
