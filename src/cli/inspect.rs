//! Read-only command handlers: lookup, stats, snapshot.

use anyhow::Result;

use sheltercache::ShelterCacheService;

pub(crate) async fn cmd_lookup(service: &ShelterCacheService, chat: &str, json: bool) -> Result<()> {
    let Some(records) = service.lookup(chat).await else {
        println!("No shelters bound to chat '{}'.", chat);
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!("{} shelter(s) for chat '{}':", records.len(), chat);
    for record in &records {
        let location = match record.coordinates() {
            Some((lat, lng)) => format!("{:.5}, {:.5}", lat, lng),
            None => "no location".to_string(),
        };
        println!(
            "- {} [{}] ({}) {}",
            record.name, record.status, location, record.extra.address
        );
    }
    Ok(())
}

pub(crate) async fn cmd_stats(service: &ShelterCacheService) {
    let stats = service.stats().await;
    println!("{:<24} {}", "Shelters cached", stats.total_shelters_cached);
    println!("{:<24} {}", "Chat mappings", stats.total_chat_mappings);
    println!("{:<24} {}", "Result sets", stats.total_processed_groups);
}

pub(crate) async fn cmd_snapshot(service: &ShelterCacheService) -> Result<()> {
    let snapshot = service.debug_snapshot().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
