use std::path::Path;

use crate::commands::common::{format_collection_lines, open_service, CollectionItem};
use crate::error::CliError;

pub async fn run_collections(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path).await?;
    let items = service
        .collection_summaries()
        .await?
        .iter()
        .map(CollectionItem::from)
        .collect::<Vec<_>>();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for line in format_collection_lines(&items) {
        println!("{line}");
    }
    Ok(())
}
