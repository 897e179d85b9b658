//! `delete` command: mark a transaction deleted.

use std::path::Path;
use tally_store::LocalStore;
use uuid::Uuid;

pub fn run(db: &Path, user: &str, id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
    let store = LocalStore::open(db)?;
    store.delete(id, user)?;
    println!("Deleted {id} (will propagate on next sync)");
    Ok(())
}
