use serde::{Deserialize, Serialize};

/// Collections attached to every record coming out of the vendor feed.
pub const FEED_COLLECTIONS: [&str; 3] = ["HEP", "Citeable", "Published"];

/// Uniform bibliographic record produced for one harvested XML record.
///
/// Every field is independently optional except `collections`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dois: Vec<String>,
    #[serde(default, skip_serializing_if = "Journal::is_empty")]
    pub journal: Journal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<Copyright>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_files: Vec<AdditionalFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub collections: Vec<String>,
}

impl NormalizedRecord {
    /// A record with nothing but the fixed collection tags.
    pub fn empty() -> Self {
        Self {
            authors: Vec::new(),
            title: None,
            abstract_text: None,
            date_published: None,
            page_count: None,
            dois: Vec::new(),
            journal: Journal::default(),
            copyright: None,
            license: None,
            urls: Vec::new(),
            file_urls: Vec::new(),
            additional_files: Vec::new(),
            source: None,
            collections: FEED_COLLECTIONS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub raw_name: Option<String>,
    pub affiliations: Vec<Affiliation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affiliation {
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
}

impl Journal {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.volume.is_none()
            && self.year.is_none()
            && self.issue.is_none()
            && self.pages.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Copyright {
    pub statement: String,
    pub year: Option<String>, // digits of the statement, concatenated
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub value: String,
    pub url: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub license_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalFile {
    pub access: String,
    pub description: String,
    pub url: String,
    #[serde(rename = "type")]
    pub file_type: String,
}
