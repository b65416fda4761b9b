//! Per-year offer numbering.
use std::sync::Mutex;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::AppError;
use crate::models::OfferCounter;

const COUNTER_KEY: &str = "offer_number_counter";
const MAX_RETRIES: u32 = 5;

#[async_trait]
pub trait SequenceProvider: Send + Sync {
    /// Draw the next offer number of `year`. Numbering restarts at 1 each year.
    async fn next_number(&self, year: i32) -> Result<u64, AppError>;
}

/// Value that follows `current` in `year`.
pub fn advance_counter(current: Option<&OfferCounter>, year: i32) -> u64 {
    match current {
        None => 1,
        Some(counter) => match counter.counter_year {
            Some(stored) if stored != year => 1,
            _ => counter.counter_value + 1,
        },
    }
}

/// Number used when the counter store is unreachable: the last four digits
/// of the `HHMMSS` clock.
pub fn fallback_number(now: DateTime<Utc>) -> u64 {
    let stamp = u64::from(now.hour() * 10_000 + now.minute() * 100 + now.second());
    (stamp % 10_000).max(1)
}

/// Draw a number, degrading to [`fallback_number`] on any provider failure.
pub async fn draw_number(provider: &dyn SequenceProvider, now: DateTime<Utc>) -> u64 {
    match provider.next_number(now.year()).await {
        Ok(number) => number,
        Err(e) => {
            let fallback = fallback_number(now);
            tracing::warn!(error = %e, fallback, "Offer counter unavailable, using a time-derived number");
            fallback
        }
    }
}

/// Process-local counter for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemorySequence {
    state: Mutex<Option<OfferCounter>>,
}

impl InMemorySequence {
    pub fn starting_at(counter_value: u64, counter_year: i32) -> Self {
        Self {
            state: Mutex::new(Some(OfferCounter { counter_value, counter_year: Some(counter_year) })),
        }
    }
}

#[async_trait]
impl SequenceProvider for InMemorySequence {
    async fn next_number(&self, year: i32) -> Result<u64, AppError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::ExternalResource("Offer counter lock is poisoned".to_string()))?;
        let next = advance_counter(state.as_ref(), year);
        *state = Some(OfferCounter { counter_value: next, counter_year: Some(year) });
        Ok(next)
    }
}

/// Condition asserting the item still holds `current`, with its values.
/// The year is part of it so `{1, 2025}` and `{1, 2026}` never match each other.
fn update_condition(current: Option<&OfferCounter>) -> (&'static str, Vec<(&'static str, AttributeValue)>) {
    match current {
        None => ("attribute_not_exists(counter_value)", Vec::new()),
        Some(OfferCounter { counter_value, counter_year: None }) => (
            "counter_value = :old AND attribute_not_exists(counter_year)",
            vec![(":old", AttributeValue::N(counter_value.to_string()))],
        ),
        Some(OfferCounter { counter_value, counter_year: Some(stored_year) }) => (
            "counter_value = :old AND counter_year = :old_year",
            vec![
                (":old", AttributeValue::N(counter_value.to_string())),
                (":old_year", AttributeValue::N(stored_year.to_string())),
            ],
        ),
    }
}

/// Counter item in DynamoDB, advanced with optimistic locking.
///
/// # Database Interactions
/// - **Read**: consistent `GetItem` of `pk = "offer_number_counter"`.
/// - **Update**: `UpdateItem` conditioned on the value and year read
///   (`counter_value = :old AND counter_year = :old_year`), or on the item
///   not existing yet.
///
/// A concurrent writer makes the condition fail; the whole read/update cycle
/// is then retried up to 5 times.
pub struct DynamoDbSequence {
    client: DynamoDbClient,
    table: String,
}

impl DynamoDbSequence {
    pub fn new(client: DynamoDbClient, table: impl Into<String>) -> Self {
        Self { client, table: table.into() }
    }

    async fn read_counter(&self) -> Result<Option<OfferCounter>, AppError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("pk", AttributeValue::S(COUNTER_KEY.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| AppError::ExternalResource(format!("Failed to read offer counter: {:?}", e)))?;

        output
            .item
            .map(|item| {
                serde_dynamo::from_item(item)
                    .map_err(|e| AppError::ExternalResource(format!("Failed to parse offer counter: {:?}", e)))
            })
            .transpose()
    }
}

#[async_trait]
impl SequenceProvider for DynamoDbSequence {
    async fn next_number(&self, year: i32) -> Result<u64, AppError> {
        let mut retry_count = 0;

        loop {
            let current = self.read_counter().await?;
            let next = advance_counter(current.as_ref(), year);

            let (condition, values) = update_condition(current.as_ref());
            let mut update = self
                .client
                .update_item()
                .table_name(&self.table)
                .key("pk", AttributeValue::S(COUNTER_KEY.to_string()))
                .update_expression("SET counter_value = :new, counter_year = :year")
                .condition_expression(condition)
                .expression_attribute_values(":new", AttributeValue::N(next.to_string()))
                .expression_attribute_values(":year", AttributeValue::N(year.to_string()));
            for (name, value) in values {
                update = update.expression_attribute_values(name, value);
            }

            match update.send().await {
                Ok(_) => {
                    tracing::info!(offer_number = next, year, "Offer counter advanced");
                    return Ok(next);
                }
                Err(e) => {
                    if let Some(service_err) = e.as_service_error()
                        && service_err.is_conditional_check_failed_exception()
                        && retry_count < MAX_RETRIES
                    {
                        retry_count += 1;
                        tracing::info!(retry_count, "Offer counter changed concurrently, retrying");
                        continue;
                    }
                    return Err(AppError::ExternalResource(format!("Failed to update offer counter: {:?}", e)));
                }
            }
        }
    }
}
