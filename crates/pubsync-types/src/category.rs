use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Logical category of a published file.
///
/// Categories are always processed in [`Category::ORDERED`] order: templates
/// reference addresses resolved for stylesheets and assets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Assets,
    Stylesheets,
    Templates,
}

impl Category {
    /// Processing order for a synchronization pass.
    pub const ORDERED: [Category; 3] = [Self::Assets, Self::Stylesheets, Self::Templates];

    /// Source folder the category is listed from unless configured otherwise.
    pub fn default_folder(&self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Stylesheets => "css",
            Self::Templates => "templates",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Stylesheets => "stylesheets",
            Self::Templates => "templates",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assets" => Ok(Self::Assets),
            "stylesheets" => Ok(Self::Stylesheets),
            "templates" => Ok(Self::Templates),
            other => Err(TypeError::UnknownCategory(other.to_string())),
        }
    }
}
