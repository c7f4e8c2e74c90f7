pub mod entities;
pub mod enums;
pub mod services;
pub mod store;

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Schema};
use tracing::info;

use entities::{cycle_audit, listing};

/// Creates the listing and audit tables when they do not exist yet.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut listings = schema.create_table_from_entity(listing::Entity);
    listings.if_not_exists();
    db.execute(backend.build(&listings)).await?;

    let mut audits = schema.create_table_from_entity(cycle_audit::Entity);
    audits.if_not_exists();
    db.execute(backend.build(&audits)).await?;

    info!("Database schema is up to date.");
    Ok(())
}
