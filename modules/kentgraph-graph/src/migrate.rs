use dgraph_client::DgraphError;
use tracing::info;

use crate::GraphClient;

/// Predicate schema every query depends on. External ids need an index for
/// `eq()` lookups and `@upsert` so concurrent inserts of the same id conflict
/// instead of silently creating duplicates.
pub const SCHEMA: &str = "\
scrape.id: int @index(int) @upsert .
scrape.last_scraped: datetime .
scrape.found_event: [uid] .

event.id: string @index(exact) @upsert .
event.title: string .
event.description: string .
event.start_date: datetime .
event.end_date: datetime .
event.organiser: uid .
event.part_of_module: uid .
event.location: uid .

location.id: string @index(exact) @upsert .
location.name: string .
location.disabled_access: bool .

person.name: string @index(exact) .
module.code: string @index(exact) .
";

/// Apply the predicate schema. Safe to run repeatedly.
pub async fn migrate(client: &GraphClient) -> Result<(), DgraphError> {
    info!("Applying Dgraph schema...");
    client.dgraph.alter(SCHEMA).await?;
    info!("Dgraph schema applied");
    Ok(())
}
