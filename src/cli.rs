//! Command-line interface over a loaded [`ShoppingSession`]

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use basket_sync::model::{
    is_palette_color, ItemPatch, ItemStatus, NewFolder, NewItem, ShoppingItem, DEFAULT_FOLDER_COLOR,
};
use basket_sync::{Folder, FolderFilter, ShoppingSession};

#[derive(Parser)]
#[command(name = "basket")]
#[command(about = "A Supabase-backed shopping list", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List items grouped by status
    List {
        /// Only show items with this status
        #[arg(long)]
        status: Option<ItemStatus>,
        /// Only show items in this folder (name or id prefix)
        #[arg(long, conflicts_with = "unfiled")]
        folder: Option<String>,
        /// Only show items without a folder
        #[arg(long)]
        unfiled: bool,
    },
    /// Add an item
    Add {
        name: String,
        /// Where to buy it
        #[arg(long)]
        link: Option<String>,
        /// Picture of the item
        #[arg(long)]
        image: Option<String>,
        /// Folder name or id prefix
        #[arg(long)]
        folder: Option<String>,
    },
    /// Rename an item
    Rename { item: String, name: String },
    /// Move an item into a folder, or out of any folder when omitted
    Move { item: String, folder: Option<String> },
    /// Mark an item as bought
    Complete { item: String },
    /// Mark an item as no longer needed
    Cancel { item: String },
    /// Put a completed or cancelled item back on the list
    Restore { item: String },
    /// Delete an item
    Remove { item: String },
    /// List folders
    Folders,
    /// Create a folder
    AddFolder {
        name: String,
        #[arg(long, default_value = DEFAULT_FOLDER_COLOR)]
        color: String,
    },
    /// Delete a folder; its items keep a dangling folder reference
    RemoveFolder { folder: String },
}

pub async fn run(session: &ShoppingSession, user_id: Uuid, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::List {
            status,
            folder,
            unfiled,
        } => {
            let filter = match (folder, unfiled) {
                (Some(folder), _) => FolderFilter::Folder(resolve_folder(session, &folder)?.id),
                (None, true) => FolderFilter::Unfiled,
                (None, false) => FolderFilter::All,
            };
            list_items(session, filter, status);
        }
        Commands::Add {
            name,
            link,
            image,
            folder,
        } => {
            let folder_id = folder
                .map(|f| resolve_folder(session, &f).map(|f| f.id))
                .transpose()?;
            let draft = NewItem::new(user_id, name)
                .in_folder(folder_id)
                .with_purchase_link(link)
                .with_image_url(image);
            let item = session.items.add(draft).await?;
            println!("Added {} ({})", item.name, short_id(item.id));
        }
        Commands::Rename { item, name } => {
            let item = resolve_item(session, &item)?;
            let item = session.items.update(item.id, ItemPatch::name(name)).await?;
            println!("Renamed to {}", item.name);
        }
        Commands::Move { item, folder } => {
            let item = resolve_item(session, &item)?;
            let folder = folder.map(|f| resolve_folder(session, &f)).transpose()?;
            session
                .items
                .update(item.id, ItemPatch::move_to_folder(folder.as_ref().map(|f| f.id)))
                .await?;
            match folder {
                Some(folder) => println!("Moved {} to {}", item.name, folder.name),
                None => println!("Moved {} out of its folder", item.name),
            }
        }
        Commands::Complete { item } => {
            let item = resolve_item(session, &item)?;
            session.items.complete(item.id).await?;
            println!("Bought {}", item.name);
        }
        Commands::Cancel { item } => {
            let item = resolve_item(session, &item)?;
            session.items.cancel(item.id).await?;
            println!("Cancelled {}", item.name);
        }
        Commands::Restore { item } => {
            let item = resolve_item(session, &item)?;
            session.items.restore(item.id).await?;
            println!("Restored {}", item.name);
        }
        Commands::Remove { item } => {
            let item = resolve_item(session, &item)?;
            session.items.remove(item.id).await?;
            println!("Removed {}", item.name);
        }
        Commands::Folders => list_folders(session),
        Commands::AddFolder { name, color } => {
            if !is_palette_color(&color) {
                eprintln!("Note: {} is not one of the palette colors", color);
            }
            let folder = session
                .folders
                .add(NewFolder::new(user_id, name).with_color(color))
                .await?;
            println!("Created folder {} ({})", folder.name, short_id(folder.id));
        }
        Commands::RemoveFolder { folder } => {
            let folder = resolve_folder(session, &folder)?;
            session.folders.remove(folder.id).await?;
            println!("Removed folder {}", folder.name);
        }
    }

    Ok(())
}

fn list_items(session: &ShoppingSession, filter: FolderFilter, status: Option<ItemStatus>) {
    let statuses = match status {
        Some(status) => vec![status],
        None => ItemStatus::ALL.to_vec(),
    };

    let counts = session.items.status_counts(filter);
    if counts.total() == 0 {
        println!("Your shopping list is empty");
        return;
    }

    for status in statuses {
        let items = session.items.filtered(filter, Some(status));
        if items.is_empty() {
            continue;
        }
        let heading = match status {
            ItemStatus::Pending => "To buy",
            ItemStatus::Completed => "Bought",
            ItemStatus::Cancelled => "Cancelled",
        };
        println!("{} ({})", heading, items.len());
        for item in &items {
            println!("  {}", describe_item(session, item));
        }
    }
}

fn describe_item(session: &ShoppingSession, item: &ShoppingItem) -> String {
    let mut line = format!("{}  {}", short_id(item.id), item.name);
    if let Some(folder_id) = item.folder_id {
        match session.folders.get(folder_id) {
            Some(folder) => line.push_str(&format!("  [{}]", folder.name)),
            None => line.push_str("  [missing folder]"),
        }
    }
    if let Some(link) = &item.purchase_link {
        line.push_str(&format!("  {}", link));
    }
    line
}

fn list_folders(session: &ShoppingSession) {
    let folders = session.folders.rows();
    if folders.is_empty() {
        println!("No folders");
        return;
    }
    for folder in folders {
        let count = session.items.by_folder(FolderFilter::Folder(folder.id)).len();
        println!("{}  {}  {}  ({} items)", short_id(folder.id), folder.color, folder.name, count);
    }
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Find a loaded item by id prefix
fn resolve_item(session: &ShoppingSession, key: &str) -> anyhow::Result<ShoppingItem> {
    let matches: Vec<ShoppingItem> = session
        .items
        .rows()
        .into_iter()
        .filter(|item| id_matches(item.id, key))
        .collect();
    single(matches, key).context("resolving item")
}

/// Find a loaded folder by exact name (case-insensitive) or id prefix
fn resolve_folder(session: &ShoppingSession, key: &str) -> anyhow::Result<Folder> {
    if let Some(folder) = session.folders.find_by_name(key) {
        return Ok(folder);
    }
    let matches: Vec<Folder> = session
        .folders
        .rows()
        .into_iter()
        .filter(|folder| id_matches(folder.id, key))
        .collect();
    single(matches, key).context("resolving folder")
}

fn id_matches(id: Uuid, key: &str) -> bool {
    let key = key.trim().to_ascii_lowercase().replace('-', "");
    !key.is_empty() && id.simple().to_string().starts_with(&key)
}

fn single<T>(mut matches: Vec<T>, key: &str) -> anyhow::Result<T> {
    match matches.len() {
        0 => Err(anyhow!("nothing matches {:?}", key)),
        1 => Ok(matches.remove(0)),
        n => bail!("{:?} is ambiguous ({} matches)", key, n),
    }
}
