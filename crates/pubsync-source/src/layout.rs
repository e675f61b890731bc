use pubsync_types::Category;
use serde::{Deserialize, Serialize};

/// Which folder of the source tree each category is listed from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderLayout {
    pub assets: String,
    pub stylesheets: String,
    pub templates: String,
}

impl FolderLayout {
    pub fn folder(&self, category: Category) -> &str {
        match category {
            Category::Assets => &self.assets,
            Category::Stylesheets => &self.stylesheets,
            Category::Templates => &self.templates,
        }
    }

    /// Prefix a listed path must start with to belong to `category`.
    pub fn prefix(&self, category: Category) -> String {
        format!("{}/", self.folder(category).trim_end_matches('/'))
    }
}

impl Default for FolderLayout {
    fn default() -> Self {
        Self {
            assets: Category::Assets.default_folder().into(),
            stylesheets: Category::Stylesheets.default_folder().into(),
            templates: Category::Templates.default_folder().into(),
        }
    }
}
