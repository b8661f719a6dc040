//! Ingest command handler.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use sheltercache::ShelterCacheService;

/// Ingest a chat response file, optionally binding it to a chat id.
pub(crate) async fn cmd_ingest(
    service: &ShelterCacheService,
    file: &Path,
    chat: Option<&str>,
) -> Result<()> {
    let data = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let response: Value = serde_json::from_str(&data)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let batch = service
        .ingest_response(&response)
        .await
        .with_context(|| "Failed to ingest chat response")?;

    let Some(id) = batch.result_set_id.as_ref() else {
        println!("No shelters found in {}.", file.display());
        return Ok(());
    };

    println!("Ingested {} shelter(s) as result set {}.", batch.records.len(), id);
    if let Some(chat) = chat {
        service
            .bind_session(chat, id)
            .await
            .with_context(|| format!("Failed to bind chat '{}'", chat))?;
        println!("Bound to chat '{}'.", chat);
    }
    Ok(())
}
