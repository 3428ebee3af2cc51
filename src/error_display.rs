//! User-facing error message formatting.
//!
//! Uses typed error matching (ColumnError, PolarsError variants, io::ErrorKind) rather than
//! string parsing where a type is available.

use polars::prelude::PolarsError;
use std::io;

use crate::columns::ColumnError;

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!(
            "Column not found: {}. Check the column names in the [columns] section of the config.",
            msg
        ),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}. Is the source empty?", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::ComputeError(msg) => simplify_compute_message(msg),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::ConnectionRefused => "Connection refused.".to_string(),
        ErrorKind::ConnectionReset => "Connection reset.".to_string(),
        ErrorKind::TimedOut => "Timed out. Try again or raise source.timeout_secs.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data. Check --compression.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::Other => {
            let msg = err.to_string();
            if msg.contains("No space left") {
                return "No space left on device. Free up disk space and try again.".to_string();
            }
            if msg.contains("Is a directory") {
                return "Path is a directory, not a file.".to_string();
            }
            return if context.is_some() {
                format!("I/O error: {}", msg)
            } else {
                msg
            };
        }
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Format a color_eyre Report by downcasting to known error types.
/// Walks the cause chain; context attached above the typed cause is kept as a prefix.
pub fn user_message_from_report(report: &color_eyre::eyre::Report) -> String {
    let outer = report.to_string();
    for (depth, cause) in report.chain().enumerate() {
        let msg = if let Some(ce) = cause.downcast_ref::<ColumnError>() {
            ce.to_string()
        } else if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            user_message_from_polars(pe)
        } else if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            user_message_from_io(io_err, None)
        } else {
            continue;
        };
        return if depth == 0 {
            msg
        } else {
            format!("{}: {}", first_line(&outer), msg)
        };
    }

    first_line(&outer).to_string()
}

fn first_line(s: &str) -> &str {
    s.lines()
        .next()
        .map(str::trim)
        .unwrap_or("An error occurred")
}

/// Light cleanup for ComputeError messages from CSV parsing.
fn simplify_compute_message(msg: &str) -> String {
    let first = first_line(msg);
    if first.contains("could not parse") || msg.contains("infer_schema_length") {
        format!(
            "Could not parse the CSV: {}. Try --infer-schema-length, --null-value or --ignore-errors.",
            first
        )
    } else {
        first.to_string()
    }
}
