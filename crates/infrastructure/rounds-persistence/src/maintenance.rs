use std::sync::atomic::{AtomicU64, Ordering};

use camino::Utf8Path;
use chrono::Utc;

use crate::api::ROUNDS_REDB_FILENAME;

/// Move an unreadable database file aside so the next open starts from
/// empty state instead of failing forever.
pub fn quarantine_corrupt_file(path: &Utf8Path) -> std::io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.f").to_string();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let new_name = format!(
        "{}.corrupt.{stamp}.{}.{n}",
        path.file_name().unwrap_or(ROUNDS_REDB_FILENAME),
        std::process::id()
    );
    let new_path = path.with_file_name(new_name);
    tracing::warn!("schedule cache unreadable, quarantining to {}", new_path);
    std::fs::rename(path, &new_path)?;
    Ok(())
}
