//! I/O utilities for backing store operations.

use std::io::ErrorKind;

use crate::error::DbError;

/// Wraps an I/O error as a storage error, keeping the failing context.
pub fn classify_io_error(error: std::io::Error, context: &str) -> DbError {
    match error.kind() {
        ErrorKind::StorageFull | ErrorKind::OutOfMemory => {
            DbError::StorageIo(format!("{}: disk full: {}", context, error))
        }
        _ => DbError::StorageIo(format!("{}: {}", context, error)),
    }
}

/// Returns `true` for I/O failures that may succeed when simply repeated.
pub fn is_transient(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

/// Retries a read-only operation that may fail with transient I/O errors.
///
/// Only reads go through here: a state write that failed half way is
/// surfaced to the caller instead of being repeated.
pub fn retry_io_operation<F, T>(
    operation: F,
    max_retries: u32,
    retry_delay_ms: u64,
    context: &str,
) -> Result<T, DbError>
where
    F: Fn() -> Result<T, std::io::Error>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(err) => {
                attempt += 1;
                if attempt > max_retries || !is_transient(&err) {
                    return Err(classify_io_error(err, context));
                }

                tracing::warn!(
                    "Transient I/O error in {} (attempt {}/{}): {}",
                    context,
                    attempt,
                    max_retries,
                    err
                );

                if retry_delay_ms > 0 {
                    std::thread::sleep(std::time::Duration::from_millis(retry_delay_ms));
                }
            }
        }
    }
}
