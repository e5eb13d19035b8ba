use serde::Serialize;
use std::fmt::Display;

/// Print a result as pretty JSON or as its text rendering.
pub fn emit<T: Serialize + Display>(value: &T, json: bool) -> serde_json::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{value}");
    }
    Ok(())
}

/// Log how a collection ended when it did not run to completion.
pub fn log_partial(what: &str, collected: usize, description: &str) {
    log::warn!("{what}: kept {collected} records, collection {description}");
}
