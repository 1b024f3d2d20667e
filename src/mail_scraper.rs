use serde::{Deserialize, Serialize};

pub mod display;
pub mod imap;
pub mod message;

// Folders the Gmail dashboard exposes by default; list_folders returns the
// server's real list when a session is open.
pub const WELL_KNOWN_FOLDERS: &[&str] = &[
    "INBOX",
    "Sent",
    "[Gmail]/All Mail",
    "[Gmail]/Spam",
    "[Gmail]/Trash",
];

// One decoded message, one row of the scrape result. Serialized under the
// column names the result table exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedMessage {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "Attachments")]
    pub attachments: String,
}

// Server-side search parameters for one scrape run. A lookback of zero days
// drops the date clause, an empty keyword/sender drops that clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeFilter {
    pub folder: String,
    pub lookback_days: u32,
    pub keyword: Option<String>,
    pub sender: Option<String>,
    pub max_messages: usize,
}

impl Default for ScrapeFilter {
    fn default() -> Self {
        Self {
            folder: "INBOX".to_string(),
            lookback_days: 7,
            keyword: None,
            sender: None,
            max_messages: 100,
        }
    }
}
