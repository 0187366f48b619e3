//! Data shapes the host hands to the window.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One table entry as produced by the host's table parser.
///
/// Only the directory name and image paths are interpreted here; everything
/// else is passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    #[serde(rename = "tableDirName", default, deserialize_with = "lenient_name")]
    pub table_dir_name: String,
    #[serde(rename = "fullPathTable", default, deserialize_with = "lenient_path")]
    pub full_path_table: Option<String>,
    #[serde(rename = "fullPathVPXfile", default, deserialize_with = "lenient_path")]
    pub full_path_vpx_file: Option<String>,
    #[serde(rename = "TableImagePath", default, deserialize_with = "lenient_path")]
    pub table_image_path: Option<String>,
    #[serde(rename = "BGImagePath", default, deserialize_with = "lenient_path")]
    pub bg_image_path: Option<String>,
    #[serde(rename = "DMDImagePath", default, deserialize_with = "lenient_path")]
    pub dmd_image_path: Option<String>,
    #[serde(rename = "WheelImagePath", default, deserialize_with = "lenient_path")]
    pub wheel_image_path: Option<String>,
    #[serde(rename = "CabImagePath", default, deserialize_with = "lenient_path")]
    pub cab_image_path: Option<String>,
    /// Parsed meta.ini sections
    #[serde(default)]
    pub meta: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Display geometry reported by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    #[serde(default)]
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Free-form filter criteria carried by a `TableDataChange` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default, deserialize_with = "lenient_string")]
    pub letter: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub theme: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub table_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub manufacturer: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: Option<String>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.letter.is_none()
            && self.theme.is_none()
            && self.table_type.is_none()
            && self.manufacturer.is_none()
            && self.year.is_none()
    }

    /// Positional arguments of the host's `apply_filters`
    pub fn to_args(&self) -> Vec<Value> {
        [
            &self.letter,
            &self.theme,
            &self.table_type,
            &self.manufacturer,
            &self.year,
        ]
        .into_iter()
        .map(|field| match field {
            Some(v) => Value::String(v.clone()),
            None => Value::Null,
        })
        .collect()
    }
}

// Years arrive as numbers from some menus and as strings from others
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// A path that is not a non-empty string is treated as missing so the asset
// falls back instead of failing the whole table list
fn lenient_path<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    })
}

fn lenient_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}
