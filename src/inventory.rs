//! Inventory CRUD.
//!
//! Every operation is scoped to a dealership. Reading or mutating another
//! dealership's row fails with [`ShowroomError::Forbidden`]; a missing row is
//! [`ShowroomError::NotFound`]. Any mutation drops the row's embedding so the
//! indexer picks it up as pending.

use anyhow::Result;
use chrono::Datelike;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::db::now_ts;
use crate::error::ShowroomError;
use crate::models::{NewVehicle, Vehicle, VehicleStatus, VehicleUpdate};

/// Column list for `FROM inventory i`, readable by [`vehicle_from_row`].
pub(crate) const VEHICLE_COLUMNS: &str = "i.id AS id, i.dealership_id AS dealership_id, \
     i.make AS make, i.model AS model, i.year AS year, i.price AS price, \
     i.mileage AS mileage, i.description AS description, i.features AS features, \
     i.condition AS condition, i.status AS status, \
     i.created_at AS created_at, i.updated_at AS updated_at";

pub(crate) fn vehicle_from_row(row: &SqliteRow) -> Result<Vehicle> {
    let status: String = row.get("status");
    Ok(Vehicle {
        id: row.get("id"),
        dealership_id: row.get("dealership_id"),
        make: row.get("make"),
        model: row.get("model"),
        year: row.get("year"),
        price: row.get("price"),
        mileage: row.get("mileage"),
        description: row.get("description"),
        features: row.get("features"),
        condition: row.get("condition"),
        status: status.parse()?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn validate_fields(make: &str, model: &str, year: i64, mileage: Option<i64>) -> Result<()> {
    if make.trim().is_empty() {
        return Err(ShowroomError::invalid("make must not be empty"));
    }
    if model.trim().is_empty() {
        return Err(ShowroomError::invalid("model must not be empty"));
    }
    let max_year = chrono::Utc::now().year() as i64 + 1;
    if !(1900..=max_year).contains(&year) {
        return Err(ShowroomError::invalid(format!(
            "year must be between 1900 and {}",
            max_year
        )));
    }
    if mileage.is_some_and(|m| m < 0) {
        return Err(ShowroomError::invalid("mileage must not be negative"));
    }
    Ok(())
}

pub async fn create_vehicle(
    pool: &SqlitePool,
    dealership_id: &str,
    new: NewVehicle,
) -> Result<Vehicle> {
    validate_fields(&new.make, &new.model, new.year, new.mileage)?;

    let now = now_ts();
    let vehicle = Vehicle {
        id: uuid::Uuid::new_v4().to_string(),
        dealership_id: dealership_id.to_string(),
        make: new.make.trim().to_string(),
        model: new.model.trim().to_string(),
        year: new.year,
        price: new.price.trim().to_string(),
        mileage: new.mileage,
        description: new.description,
        features: new.features,
        condition: new.condition,
        status: new.status,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO inventory (id, dealership_id, make, model, year, price, mileage, \
         description, features, condition, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&vehicle.id)
    .bind(&vehicle.dealership_id)
    .bind(&vehicle.make)
    .bind(&vehicle.model)
    .bind(vehicle.year)
    .bind(&vehicle.price)
    .bind(vehicle.mileage)
    .bind(&vehicle.description)
    .bind(&vehicle.features)
    .bind(&vehicle.condition)
    .bind(vehicle.status.as_str())
    .bind(vehicle.created_at)
    .bind(vehicle.updated_at)
    .execute(pool)
    .await?;

    info!(id = %vehicle.id, dealership_id, title = %vehicle.title(), "vehicle created");
    Ok(vehicle)
}

/// Vehicles of a dealership, newest first, optionally by status.
pub async fn list_vehicles(
    pool: &SqlitePool,
    dealership_id: &str,
    status: Option<VehicleStatus>,
) -> Result<Vec<Vehicle>> {
    let sql = format!(
        "SELECT {} FROM inventory i WHERE i.dealership_id = ? AND (? IS NULL OR i.status = ?) \
         ORDER BY i.created_at DESC, i.id ASC",
        VEHICLE_COLUMNS
    );
    let status = status.map(|s| s.as_str());
    let rows = sqlx::query(&sql)
        .bind(dealership_id)
        .bind(status)
        .bind(status)
        .fetch_all(pool)
        .await?;

    rows.iter().map(vehicle_from_row).collect()
}

/// Fetch a row regardless of dealership.
pub(crate) async fn find_vehicle(pool: &SqlitePool, id: &str) -> Result<Option<Vehicle>> {
    let sql = format!("SELECT {} FROM inventory i WHERE i.id = ?", VEHICLE_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(vehicle_from_row).transpose()
}

pub async fn get_vehicle(pool: &SqlitePool, dealership_id: &str, id: &str) -> Result<Vehicle> {
    let vehicle = find_vehicle(pool, id)
        .await?
        .ok_or_else(|| ShowroomError::not_found(format!("vehicle {}", id)))?;
    if vehicle.dealership_id != dealership_id {
        return Err(ShowroomError::forbidden(format!(
            "vehicle {} belongs to another dealership",
            id
        )));
    }
    Ok(vehicle)
}

/// Apply the fields present in `update`.
pub async fn update_vehicle(
    pool: &SqlitePool,
    dealership_id: &str,
    id: &str,
    update: VehicleUpdate,
) -> Result<Vehicle> {
    let mut vehicle = get_vehicle(pool, dealership_id, id).await?;

    if let Some(make) = update.make {
        vehicle.make = make.trim().to_string();
    }
    if let Some(model) = update.model {
        vehicle.model = model.trim().to_string();
    }
    if let Some(year) = update.year {
        vehicle.year = year;
    }
    if let Some(price) = update.price {
        vehicle.price = price.trim().to_string();
    }
    if let Some(mileage) = update.mileage {
        vehicle.mileage = mileage;
    }
    if let Some(description) = update.description {
        vehicle.description = description;
    }
    if let Some(features) = update.features {
        vehicle.features = features;
    }
    if let Some(condition) = update.condition {
        vehicle.condition = condition;
    }
    if let Some(status) = update.status {
        vehicle.status = status;
    }
    validate_fields(&vehicle.make, &vehicle.model, vehicle.year, vehicle.mileage)?;
    vehicle.updated_at = now_ts();

    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE inventory SET make = ?, model = ?, year = ?, price = ?, mileage = ?, \
         description = ?, features = ?, condition = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&vehicle.make)
    .bind(&vehicle.model)
    .bind(vehicle.year)
    .bind(&vehicle.price)
    .bind(vehicle.mileage)
    .bind(&vehicle.description)
    .bind(&vehicle.features)
    .bind(&vehicle.condition)
    .bind(vehicle.status.as_str())
    .bind(vehicle.updated_at)
    .bind(&vehicle.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM vehicle_embeddings WHERE inventory_id = ?")
        .bind(&vehicle.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(id = %vehicle.id, dealership_id, "vehicle updated");
    Ok(vehicle)
}

pub async fn delete_vehicle(pool: &SqlitePool, dealership_id: &str, id: &str) -> Result<()> {
    get_vehicle(pool, dealership_id, id).await?;

    // vehicle_embeddings rows go with it (ON DELETE CASCADE)
    sqlx::query("DELETE FROM inventory WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    info!(id, dealership_id, "vehicle deleted");
    Ok(())
}
