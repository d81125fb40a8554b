//! Shopping list domain models as stored in Supabase

pub mod folder;
pub mod item;

pub use folder::{is_palette_color, Folder, FolderPatch, NewFolder, DEFAULT_FOLDER_COLOR, FOLDER_COLORS};
pub use item::{ItemPatch, ItemStatus, NewItem, ShoppingItem};

/// Trim a free-text value, treating blank input as absent
pub(crate) fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
