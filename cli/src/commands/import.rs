use std::path::Path;

use anyhow::Result;

use recipedex_core::db::Database;
use recipedex_core::ingest::{import_file, preview, read_source};

pub fn cmd_import(db: &Database, path: &Path, dry_run: bool, json: bool) -> Result<()> {
    let summary = if dry_run {
        preview(&read_source(path)?)
    } else {
        import_file(db, path)?
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "dry_run": dry_run,
                "recipes_imported": summary.recipes_imported,
                "missing_ratings": summary.missing_ratings,
            })
        );
    } else if dry_run {
        println!("Dry run: no changes made.\n");
        println!("  Recipes to import:    {}", summary.recipes_imported);
        println!("  Without a rating:     {}", summary.missing_ratings);
    } else {
        println!("Import complete.\n");
        println!("  Recipes imported:     {}", summary.recipes_imported);
        println!("  Without a rating:     {}", summary.missing_ratings);
    }

    Ok(())
}
