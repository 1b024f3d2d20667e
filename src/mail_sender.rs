use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub mod smtp;
pub mod template;

// One row of the recipient table: free-form personalization fields keyed by
// column name. Only "email" is required, and only at send time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(flatten)]
    pub fields: HashMap<String, String>,
}

impl Recipient {
    pub fn email(&self) -> Option<&str> {
        self.fields.get("email").map(String::as_str)
    }

    pub fn name(&self) -> &str {
        self.fields.get("name").map(String::as_str).unwrap_or("N/A")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Recipient {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendStatus {
    Sent,
    Failed,
}

// Outcome of one bulk-send row, recorded whether the send worked or not.
// Serialized under the column names the result table exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Status")]
    pub status: SendStatus,
    #[serde(rename = "Message")]
    pub message: String,
}
