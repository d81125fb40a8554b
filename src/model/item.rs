//! Shopping items and their status lifecycle

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::blank_to_none;

/// Item status as stored in the `status` column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 3] = [Self::Pending, Self::Completed, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the status shortcuts allow moving from `self` to `next`.
    ///
    /// Completed and cancelled are only left through an explicit restore to
    /// pending; there is no direct completed <-> cancelled move. Staying in
    /// the same state is always allowed.
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, _) | (Self::Completed, Self::Pending | Self::Completed)
                | (Self::Cancelled, Self::Pending | Self::Cancelled)
        )
    }

    /// Completed or cancelled
    pub fn is_closed(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown item status: {other}")),
        }
    }
}

/// A row of the `shopping_items` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Weak reference; the folder may no longer exist
    #[serde(default)]
    pub folder_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub purchase_link: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New item for insertion (id and timestamps are assigned by the server)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewItem {
    pub user_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub name: String,
    pub purchase_link: Option<String>,
    pub image_url: Option<String>,
    /// Left out of the insert body when absent so the column default applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

impl NewItem {
    pub fn new(user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            user_id,
            folder_id: None,
            name: name.into().trim().to_string(),
            purchase_link: None,
            image_url: None,
            status: None,
        }
    }

    pub fn in_folder(mut self, folder_id: Option<Uuid>) -> Self {
        self.folder_id = folder_id;
        self
    }

    pub fn with_purchase_link(mut self, link: Option<String>) -> Self {
        self.purchase_link = blank_to_none(link);
        self
    }

    pub fn with_image_url(mut self, url: Option<String>) -> Self {
        self.image_url = blank_to_none(url);
        self
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Sparse item update.
///
/// Nullable columns use `Option<Option<_>>`: `None` leaves the column alone,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_link: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

impl ItemPatch {
    /// Patch touching only the status column
    pub fn status(status: ItemStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into().trim().to_string()),
            ..Self::default()
        }
    }

    /// Edit-form style patch: blank links clear the column
    pub fn details(name: impl Into<String>, purchase_link: Option<String>, image_url: Option<String>) -> Self {
        Self {
            name: Some(name.into().trim().to_string()),
            purchase_link: Some(blank_to_none(purchase_link)),
            image_url: Some(blank_to_none(image_url)),
            ..Self::default()
        }
    }

    pub fn move_to_folder(folder_id: Option<Uuid>) -> Self {
        Self {
            folder_id: Some(folder_id),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_transitions() {
        use ItemStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Completed.can_transition_to(Pending));
        assert!(Cancelled.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Completed));
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_value(ItemStatus::Cancelled).unwrap(), json!("cancelled"));
        assert_eq!("Completed".parse::<ItemStatus>().unwrap(), ItemStatus::Completed);
        assert!("done".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn test_new_item_omits_absent_status() {
        let user_id = Uuid::new_v4();
        let draft = NewItem::new(user_id, "  Milk ")
            .with_purchase_link(Some("   ".to_string()))
            .with_image_url(Some(" https://img.example/milk.png ".to_string()));

        let body = serde_json::to_value(&draft).unwrap();
        assert_eq!(body["name"], "Milk");
        assert_eq!(body["purchase_link"], serde_json::Value::Null);
        assert_eq!(body["image_url"], "https://img.example/milk.png");
        assert!(body.get("status").is_none());
    }

    #[test]
    fn test_patch_distinguishes_clear_from_untouched() {
        let patch = ItemPatch::details("Bread", Some(String::new()), None);
        let body = serde_json::to_value(&patch).unwrap();
        assert_eq!(body, json!({ "name": "Bread", "purchase_link": null, "image_url": null }));

        let body = serde_json::to_value(ItemPatch::status(ItemStatus::Completed)).unwrap();
        assert_eq!(body, json!({ "status": "completed" }));
    }

    #[test]
    fn test_row_without_optional_columns_decodes() {
        let row = json!({
            "id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "name": "Eggs",
            "created_at": "2024-05-01T10:00:00.123456+00:00",
            "updated_at": "2024-05-01T10:00:00.123456+00:00"
        });
        let item: ShoppingItem = serde_json::from_value(row).unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(item.folder_id.is_none());
    }
}
