// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

/// A downloadable entry in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Absolute path of the file on disk
    pub file_path:    PathBuf,
    /// Name presented to clients; may contain non-ASCII characters
    pub display_name: String,
    /// Free-form category tags
    #[serde(default)]
    pub category:     Vec<String>,
    /// Human-readable description
    #[serde(default)]
    pub description:  String,
}

/// Read-only list of downloadable resources, loaded once at startup.
///
/// Resources are addressed by their position in the list. Catalog editing,
/// pagination, and search live outside this system.
pub struct ResourceCatalog {
    resources: Vec<Resource>,
}

impl ResourceCatalog {
    /// Load the catalog from a JSON file.
    ///
    /// A missing file yields an empty catalog; an unparsable one yields an
    /// empty catalog with a warning. Neither is fatal.
    pub async fn load(path: &Path) -> Self {
        let resources = match fs::read_to_string(path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "resource catalog unparsable, serving empty list");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        Self { resources }
    }

    #[must_use]
    pub const fn from_resources(resources: Vec<Resource>) -> Self { Self { resources } }

    /// Resolve a resource id to its catalog entry.
    #[must_use]
    pub fn resolve(&self, id: usize) -> Option<&Resource> { self.resources.get(id) }

    #[must_use]
    pub fn list(&self) -> &[Resource] { &self.resources }

    #[must_use]
    pub fn len(&self) -> usize { self.resources.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.resources.is_empty() }
}
