//! Idempotency keys for mutating calls.
//!
//! Keys are sent as `externalId`; the provider uses them to recognise a
//! repeated submission of the same payment.

use chrono::Utc;

const FALLBACK_OPERATION: &str = "momo";

/// Build an idempotency key from an operation name and a caller-chosen discriminator.
///
/// Identical inputs always produce the same key, so a retry that reuses the
/// discriminator (for example the timestamp of the first attempt) is
/// de-duplicated by the provider. An empty discriminator degrades to the
/// operation name alone; the result is never empty.
pub fn generate_idempotency_key(operation_name: &str, discriminator: &str) -> String {
    let operation = match operation_name.trim() {
        "" => FALLBACK_OPERATION,
        name => name,
    };
    match discriminator.trim() {
        "" => operation.to_string(),
        discriminator => format!("{}-{}", operation, discriminator),
    }
}

/// Key discriminated by the current UTC second (`%Y%m%d%H%M%S`).
pub fn timestamped_idempotency_key(operation_name: &str) -> String {
    generate_idempotency_key(
        operation_name,
        &Utc::now().format("%Y%m%d%H%M%S").to_string(),
    )
}
