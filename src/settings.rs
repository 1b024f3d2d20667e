use serde::Deserialize;

use anyhow::{Context, Result};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// Main configuration struct
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub imap: MailboxConfig,
    pub smtp: SubmissionConfig,
}

// IMAP endpoint of the mailbox to scrape
#[derive(Debug, Deserialize, Clone)]
pub struct MailboxConfig {
    pub server: String,
    pub port: u16,
}

// SMTP submission endpoint for outgoing mail
#[derive(Debug, Deserialize, Clone)]
pub struct SubmissionConfig {
    pub server: String,
    pub port: u16,
}

// Credential pair handed to each connect call. Nothing in the crate keeps a
// copy of it outside the session that authenticated with it.
#[derive(Clone, Deserialize)]
pub struct Account {
    pub email: String,
    pub password: String,
}

impl Account {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            imap: MailboxConfig {
                server: "imap.gmail.com".to_string(),
                port: 993,
            },
            smtp: SubmissionConfig {
                server: "smtp.gmail.com".to_string(),
                port: 587,
            },
        }
    }
}

pub fn load_settings(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("cannot open settings file {}", path.display()))?;

    let reader = BufReader::new(file);

    // Parse the YAML file into the Config struct
    let config = serde_yaml::from_reader(reader)
        .with_context(|| format!("cannot deserialize settings from {}", path.display()))?;

    Ok(config)
}
