//! Folders used to group shopping items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Folder color palette offered when creating a folder
pub const FOLDER_COLORS: [&str; 8] = [
    "#3B82F6", // Blue
    "#10B981", // Green
    "#F59E0B", // Yellow
    "#EF4444", // Red
    "#8B5CF6", // Purple
    "#F97316", // Orange
    "#06B6D4", // Cyan
    "#84CC16", // Lime
];

pub const DEFAULT_FOLDER_COLOR: &str = FOLDER_COLORS[0];

/// Whether `color` is one of the palette entries (case-insensitive).
/// Advisory only: any stored string is accepted as a folder color.
pub fn is_palette_color(color: &str) -> bool {
    FOLDER_COLORS.iter().any(|c| c.eq_ignore_ascii_case(color))
}

/// A row of the `folders` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New folder for insertion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewFolder {
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
}

impl NewFolder {
    pub fn new(user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into().trim().to_string(),
            color: DEFAULT_FOLDER_COLOR.to_string(),
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

/// Sparse folder update
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FolderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl FolderPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into().trim().to_string()),
            color: None,
        }
    }

    pub fn recolor(color: impl Into<String>) -> Self {
        Self {
            name: None,
            color: Some(color.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_folder_defaults_to_first_palette_color() {
        let folder = NewFolder::new(Uuid::new_v4(), " Groceries ");
        assert_eq!(folder.name, "Groceries");
        assert_eq!(folder.color, "#3B82F6");
    }

    #[test]
    fn test_palette_check_is_advisory() {
        assert!(is_palette_color("#84cc16"));
        assert!(!is_palette_color("rebeccapurple"));
        // Off-palette colors still make a valid draft
        let folder = NewFolder::new(Uuid::new_v4(), "Misc").with_color("rebeccapurple");
        assert_eq!(folder.color, "rebeccapurple");
    }
}
