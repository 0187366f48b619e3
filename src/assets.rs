//! Maps local table artwork paths onto the host's static asset server.
//!
//! ```text
//! /home/pin/tables/Attack From Mars/medias/bg.png
//!   └──► http://127.0.0.1:8000/tables/Attack%20From%20Mars/medias/bg.png
//! ```

use crate::host::TableRecord;
use tracing::debug;

/// Returned whenever a path cannot be mapped
pub const MISSING_ASSET_URL: &str = "../../images/file_missing.png";

pub const ASSET_HOST: &str = "127.0.0.1";

/// Nested folder some tables keep their artwork in
const MEDIA_DIR: &str = "medias";

/// Artwork slots carried by a table record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Table,
    Backglass,
    Dmd,
    Wheel,
    Cabinet,
}

impl ImageKind {
    pub fn path_of(self, table: &TableRecord) -> Option<&str> {
        match self {
            ImageKind::Table => table.table_image_path.as_deref(),
            ImageKind::Backglass => table.bg_image_path.as_deref(),
            ImageKind::Dmd => table.dmd_image_path.as_deref(),
            ImageKind::Wheel => table.wheel_image_path.as_deref(),
            ImageKind::Cabinet => table.cab_image_path.as_deref(),
        }
    }
}

/// Derives the asset server url for a local file path.
///
/// The table folder is the parent directory of the file, or its grandparent
/// when the file sits in a `medias` subfolder. Folder and file name are
/// percent-encoded independently. Anything that cannot be mapped yields
/// [`MISSING_ASSET_URL`].
pub fn asset_url(local_path: Option<&str>, port: u16) -> String {
    let Some(path) = local_path.map(str::trim).filter(|p| !p.is_empty()) else {
        return MISSING_ASSET_URL.to_string();
    };

    let parts: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect();

    let (file, parents) = match parts.split_last() {
        Some((file, parents)) if !parents.is_empty() => (*file, parents),
        _ => {
            debug!("Cannot map asset path without a table folder: {}", path);
            return MISSING_ASSET_URL.to_string();
        }
    };

    let parent = parents[parents.len() - 1];
    let base = format!("http://{}:{}/tables", ASSET_HOST, port);

    if parent == MEDIA_DIR && parents.len() >= 2 {
        let folder = parents[parents.len() - 2];
        format!(
            "{}/{}/{}/{}",
            base,
            urlencoding::encode(folder),
            MEDIA_DIR,
            urlencoding::encode(file)
        )
    } else {
        format!(
            "{}/{}/{}",
            base,
            urlencoding::encode(parent),
            urlencoding::encode(file)
        )
    }
}
