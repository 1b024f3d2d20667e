use std::collections::HashSet;

use anyhow::{Context, Result};
use async_imap::{Client, Session};
use chrono::{Duration, Local};
use futures::TryStreamExt;
use log::{debug, error, info, warn};
use tokio::net::TcpStream;

use crate::mail_scraper::message::decode_batch;
use crate::mail_scraper::{ScrapeFilter, ScrapedMessage};
use crate::settings::{Account, MailboxConfig};

type ImapSession = Session<tokio_native_tls::TlsStream<TcpStream>>;

// Owns at most one authenticated IMAP session. Connect, scrape as often as
// needed, disconnect; a failed connect leaves the scraper without a session.
pub struct MailScraper {
    config: MailboxConfig,
    session: Option<ImapSession>,
}

impl MailScraper {
    pub fn new(config: MailboxConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub async fn connect(&mut self, account: &Account) -> Result<()> {
        let tls_stream = connect_to_server(&self.config.server, self.config.port).await?;
        let client = Client::new(tls_stream);

        let session = client
            .login(&account.email, &account.password)
            .await
            .map_err(|e| e.0)
            .with_context(|| format!("IMAP login failed for {}", account.email))?;

        info!("-- logged in as {}", account.email);
        self.session = Some(session);
        Ok(())
    }

    // Every folder the server reports; degrades to INBOX when the listing
    // cannot be obtained
    pub async fn list_folders(&mut self) -> Vec<String> {
        let fallback = || vec!["INBOX".to_string()];

        let Some(session) = self.session.as_mut() else {
            return fallback();
        };

        let names = match session.list(Some(""), Some("*")).await {
            Ok(stream) => stream.try_collect::<Vec<_>>().await,
            Err(e) => Err(e),
        };

        match names {
            Ok(names) => names.iter().map(|name| name.name().to_string()).collect(),
            Err(e) => {
                error!("cannot list folders: {}", e);
                fallback()
            }
        }
    }

    pub async fn scrape(&mut self, filter: &ScrapeFilter) -> Result<Vec<ScrapedMessage>> {
        let session = self
            .session
            .as_mut()
            .context("not connected to the IMAP server")?;

        // An unknown folder is an empty scrape, not a failure
        if let Err(e) = session.select(&filter.folder).await {
            warn!("cannot select folder {}: {}", filter.folder, e);
            return Ok(Vec::new());
        }
        info!("-- {} selected", filter.folder);

        let query = build_search_query(filter);
        debug!("searching with query {}", query);
        let ids = session
            .search(&query)
            .await
            .with_context(|| format!("search '{}' failed in {}", query, filter.folder))?;
        let ids = newest_ids(ids, filter.max_messages);

        // One bad message must not abort the batch: fetch failures are
        // skipped here, decode failures inside decode_batch
        let mut raws = Vec::with_capacity(ids.len());
        for id in ids {
            match fetch_raw_message(session, id).await {
                Ok(Some(raw)) => raws.push((id, raw)),
                Ok(None) => warn!("message {} came back without a body", id),
                Err(e) => error!("error fetching message {}: {}", id, e),
            }
        }

        Ok(decode_batch(raws))
    }

    // Close the selected folder and log out. Errors are logged and
    // discarded: teardown must work on a broken or never-opened session.
    pub async fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                debug!("error closing the selected folder: {}", e);
            }
            if let Err(e) = session.logout().await {
                debug!("error logging out: {}", e);
            }
            info!("-- logged out");
        }
    }
}

// Establish a TLS-encrypted connection to the IMAP server
async fn connect_to_server(server: &str, port: u16) -> Result<tokio_native_tls::TlsStream<TcpStream>> {
    let imap_addr = (server, port);
    let tcp_stream = TcpStream::connect(imap_addr)
        .await
        .with_context(|| format!("cannot reach {}:{}", server, port))?;
    let tls = tokio_native_tls::TlsConnector::from(native_tls::TlsConnector::new()?);
    let tls_stream = tls
        .connect(server, tcp_stream)
        .await
        .with_context(|| format!("TLS handshake with {} failed", server))?;

    info!("-- connected to {}:{}", server, port);
    Ok(tls_stream)
}

// SINCE / SUBJECT / FROM terms concatenated with IMAP's implicit AND;
// an unfiltered scrape degenerates to ALL
pub(crate) fn build_search_query(filter: &ScrapeFilter) -> String {
    let mut terms = Vec::new();

    if filter.lookback_days > 0 {
        let since = Local::now() - Duration::days(filter.lookback_days as i64);
        terms.push(format!("SINCE {}", since.format("%d-%b-%Y")));
    }

    if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.is_empty()) {
        terms.push(format!("SUBJECT \"{}\"", keyword));
    }

    if let Some(sender) = filter.sender.as_deref().filter(|s| !s.is_empty()) {
        terms.push(format!("FROM \"{}\"", sender));
    }

    if terms.is_empty() {
        "ALL".to_string()
    } else {
        terms.join(" ")
    }
}

// Keep the last `max` sequence numbers in ascending order. Sequence numbers
// are assignment order, not delivery date; when a date-range search matches
// more than `max` messages the oldest ones are dropped.
pub(crate) fn newest_ids(ids: HashSet<u32>, max: usize) -> Vec<u32> {
    let mut ids: Vec<u32> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.split_off(ids.len().saturating_sub(max))
}

async fn fetch_raw_message(session: &mut ImapSession, id: u32) -> Result<Option<Vec<u8>>> {
    let stream = session.fetch(id.to_string(), "(RFC822 BODY.PEEK[])").await?;
    let fetches: Vec<_> = stream.try_collect().await?;

    Ok(fetches
        .iter()
        .find_map(|fetch| fetch.body().map(|body| body.to_vec())))
}
