use crate::mail_scraper::ScrapedMessage;
use log::{error, info};

// Dump a scraped batch through the log facade, one JSON document per row
pub fn display_messages(messages: &[ScrapedMessage]) {
    info!("-- {} messages scraped", messages.len());

    messages.iter().for_each(|message| {
        match serde_json::to_string_pretty(message) {
            Ok(json) => info!("{}", json),
            Err(e) => error!("Error converting to JSON: {}", e),
        }
        info!("---");
    });
}
