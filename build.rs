//! Build script for spotify-scrobbler
//!
//! The schema is embedded with `sqlx::migrate!`, so edits to the migration
//! files must trigger a rebuild.

fn main() {
    println!("cargo:rerun-if-changed=migrations");
}
