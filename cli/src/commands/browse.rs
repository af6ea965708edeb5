use anyhow::Result;
use std::process;

use recipedex_core::db::Database;
use recipedex_core::filter::SearchParams;
use recipedex_core::models::Pagination;
use recipedex_core::query::compile;

use super::helpers::print_recipe_table;

pub(crate) fn cmd_list(db: &Database, page: u64, limit: u64, json: bool) -> Result<()> {
    let page = db.list_recipes(Pagination::new(page, limit)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.data.is_empty() {
        eprintln!("No recipes on page {} ({} in total)", page.page, page.total);
        process::exit(2);
    }

    print_recipe_table(&page.data);
    println!(
        "Page {} · {} per page · {} recipes in total",
        page.page, page.limit, page.total
    );
    Ok(())
}

pub(crate) fn cmd_search(db: &Database, params: &SearchParams, json: bool) -> Result<()> {
    let recipes = db.search_recipes(&compile(&params.predicates()))?;

    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes match");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
    } else {
        print_recipe_table(&recipes);
    }

    Ok(())
}
