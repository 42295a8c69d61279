//! Fragment tags: categorized time intervals attached to a media file.

use serde::{Deserialize, Serialize};

use crate::category::CategoryPath;
use crate::interval::Interval;
use crate::types::{Color, FileId, FragmentTagId};

/// Display colors of a fragment tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagStyle {
    pub font_color: Color,
    pub background_color: Color,
}

impl Default for TagStyle {
    fn default() -> Self {
        Self {
            font_color: Color(String::from("#ffffff")),
            background_color: Color(String::from("#6b7280")),
        }
    }
}

/// A time-interval annotation under a category, owned by one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentTag {
    pub id: FragmentTagId,
    pub category: CategoryPath,
    pub interval: Interval,
    #[serde(default)]
    pub style: TagStyle,
}

impl FragmentTag {
    /// The sibling group this tag's interval must not overlap within.
    #[must_use]
    pub fn group(&self) -> CategoryPath {
        self.category.parent()
    }
}

/// A media file as known to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: FileId,
    /// Length of the media in seconds.
    pub duration: f64,
    #[serde(default)]
    pub tags: Vec<FragmentTag>,
    /// Identifier the next attached tag receives, if the repository keeps one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_tag_id: Option<FragmentTagId>,
}
