/// Supported gallery sites
use std::fmt;

/// A remote gallery site that favorites are mirrored from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum Provider {
    /// HTML-scraped site with cookie credentials and link-based pagination
    #[value(name = "furaffinity")]
    FurAffinity,

    /// JSON API site with a session id, rid/page pagination and pools
    #[value(name = "inkbunny")]
    Inkbunny,
}

impl Provider {
    /// Every supported provider, in a stable order
    pub const ALL: [Provider; 2] = [Provider::FurAffinity, Provider::Inkbunny];

    /// Converts to the string stored in the database and used for directory names
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::FurAffinity => "furaffinity",
            Self::Inkbunny => "inkbunny",
        }
    }

    /// Parses a database string back into a provider
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "furaffinity" => Some(Self::FurAffinity),
            "inkbunny" => Some(Self::Inkbunny),
            _ => None,
        }
    }

    /// Name of the directory holding this provider's thumbnails
    pub fn thumbnail_dir_name(&self) -> String {
        format!("{}-thumbnails", self.to_db_string())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
