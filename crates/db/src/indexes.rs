use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Users
    create_indexes(db, "users", vec![index(bson::doc! { "role": 1 })]).await?;

    // Rooms: one room per clinician/patient pair
    create_indexes(
        db,
        "rooms",
        vec![
            index_unique(bson::doc! { "clinician_id": 1, "patient_id": 1 }),
            index(bson::doc! { "patient_id": 1 }),
        ],
    )
    .await?;

    // Sessions: the active lookup is hot (invite accept, expiry sweep)
    create_indexes(
        db,
        "sessions",
        vec![
            index(bson::doc! { "room_id": 1, "active": 1 }),
            index(bson::doc! { "active": 1, "started_at": 1 }),
        ],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
