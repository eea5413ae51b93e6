//! Database query functions for the `travel_plans` table.
//!
//! Nested collections live in JSONB columns; every mutation here touches
//! either scalar date fields or a single JSONB key, so concurrent writers
//! editing different parts of the plan never clobber each other.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{Booking, DayPlan, TravelPlan};

/// Row shape of `travel_plans`, with JSONB columns wrapped for decoding.
#[derive(Debug, FromRow)]
struct PlanRow {
    id: String,
    owner_identity: String,
    member_identities: Vec<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    total_days: i32,
    daily_plans: Json<BTreeMap<String, DayPlan>>,
    flights: Json<BTreeMap<Uuid, Booking>>,
    stays: Json<BTreeMap<Uuid, Booking>>,
    skipped_days: Json<BTreeSet<String>>,
    created_at: DateTime<Utc>,
}

impl From<PlanRow> for TravelPlan {
    fn from(row: PlanRow) -> Self {
        Self {
            id: row.id,
            owner: row.owner_identity,
            members: row.member_identities,
            start_date: row.start_date,
            end_date: row.end_date,
            total_days: row.total_days,
            daily_plans: row.daily_plans.0,
            flights: row.flights.0,
            stays: row.stays.0,
            skipped_days: row.skipped_days.0,
            created_at: row.created_at,
        }
    }
}

/// Insert a new plan row. Fails on a duplicate id.
pub async fn insert_plan(pool: &PgPool, plan: &TravelPlan) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO travel_plans \
         (id, owner_identity, member_identities, start_date, end_date, total_days, \
          daily_plans, flights, stays, skipped_days, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(&plan.id)
    .bind(&plan.owner)
    .bind(&plan.members)
    .bind(plan.start_date)
    .bind(plan.end_date)
    .bind(plan.total_days)
    .bind(Json(&plan.daily_plans))
    .bind(Json(&plan.flights))
    .bind(Json(&plan.stays))
    .bind(Json(&plan.skipped_days))
    .bind(plan.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a plan by its id.
pub async fn get_plan(pool: &PgPool, id: &str) -> Result<Option<TravelPlan>, sqlx::Error> {
    let row = sqlx::query_as::<_, PlanRow>("SELECT * FROM travel_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(TravelPlan::from))
}

/// List all plans, newest first.
pub async fn list_plans(pool: &PgPool) -> Result<Vec<TravelPlan>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PlanRow>("SELECT * FROM travel_plans ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(TravelPlan::from).collect())
}

/// Whether an identity may read a plan: member of the plan, or holder of a
/// temporary access grant for it.
pub async fn can_read_plan(
    pool: &PgPool,
    plan_id: &str,
    identity: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS( \
             SELECT 1 FROM travel_plans \
             WHERE id = $1 AND member_identities @> ARRAY[$2] \
         ) OR EXISTS( \
             SELECT 1 FROM invite_auth WHERE plan_id = $1 AND identity = $2 \
         )",
    )
    .bind(plan_id)
    .bind(identity)
    .fetch_one(pool)
    .await
}

/// Merge-write the date fields and derived day count.
pub async fn set_dates(
    pool: &PgPool,
    plan_id: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    total_days: i32,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE travel_plans SET start_date = $2, end_date = $3, total_days = $4 WHERE id = $1",
    )
    .bind(plan_id)
    .bind(start)
    .bind(end)
    .bind(total_days)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Replace the whole `daily_plans` map.
pub async fn set_daily_plans(
    pool: &PgPool,
    plan_id: &str,
    daily_plans: &BTreeMap<String, DayPlan>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE travel_plans SET daily_plans = $2 WHERE id = $1")
        .bind(plan_id)
        .bind(Json(daily_plans))
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Merge-write a single day under its label.
pub async fn set_day_plan(
    pool: &PgPool,
    plan_id: &str,
    label: &str,
    day: &DayPlan,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE travel_plans \
         SET daily_plans = jsonb_set(daily_plans, ARRAY[$2]::text[], $3) \
         WHERE id = $1",
    )
    .bind(plan_id)
    .bind(label)
    .bind(Json(day))
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Replace the skipped-days set.
pub async fn set_skipped_days(
    pool: &PgPool,
    plan_id: &str,
    days: &BTreeSet<String>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE travel_plans SET skipped_days = $2 WHERE id = $1")
        .bind(plan_id)
        .bind(Json(days))
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Merge-write one booking into the named JSONB map column.
///
/// `column` is interpolated from a fixed caller-supplied name, never user
/// input.
async fn put_booking(
    pool: &PgPool,
    column: &str,
    plan_id: &str,
    booking: &Booking,
) -> Result<u64, sqlx::Error> {
    let stmt = format!(
        "UPDATE travel_plans SET {column} = jsonb_set({column}, ARRAY[$2]::text[], $3) \
         WHERE id = $1"
    );
    let result = sqlx::query(&stmt)
        .bind(plan_id)
        .bind(booking.id.to_string())
        .bind(Json(booking))
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Delete one booking key from the named JSONB map column.
async fn remove_booking(
    pool: &PgPool,
    column: &str,
    plan_id: &str,
    id: Uuid,
) -> Result<u64, sqlx::Error> {
    let stmt = format!("UPDATE travel_plans SET {column} = {column} - $2 WHERE id = $1");
    let result = sqlx::query(&stmt)
        .bind(plan_id)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn put_flight(pool: &PgPool, plan_id: &str, flight: &Booking) -> Result<u64, sqlx::Error> {
    put_booking(pool, "flights", plan_id, flight).await
}

pub async fn remove_flight(pool: &PgPool, plan_id: &str, id: Uuid) -> Result<u64, sqlx::Error> {
    remove_booking(pool, "flights", plan_id, id).await
}

pub async fn put_stay(pool: &PgPool, plan_id: &str, stay: &Booking) -> Result<u64, sqlx::Error> {
    put_booking(pool, "stays", plan_id, stay).await
}

pub async fn remove_stay(pool: &PgPool, plan_id: &str, id: Uuid) -> Result<u64, sqlx::Error> {
    remove_booking(pool, "stays", plan_id, id).await
}

/// Union `identity` into the plan's membership.
///
/// Returns the number of rows changed: 0 when the plan does not exist or
/// the identity is already a member (callers disambiguate with
/// [`get_plan`]).
pub async fn add_member(
    pool: &PgPool,
    plan_id: &str,
    identity: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE travel_plans \
         SET member_identities = array_append(member_identities, $2) \
         WHERE id = $1 AND NOT (member_identities @> ARRAY[$2])",
    )
    .bind(plan_id)
    .bind(identity)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
