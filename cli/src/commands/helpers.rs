use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use recipedex_core::models::Recipe;

pub(crate) fn print_recipe_table(recipes: &[Recipe]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Cuisine")]
        cuisine: String,
        #[tabled(rename = "Rating")]
        rating: String,
        #[tabled(rename = "Total min")]
        total_time: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Serves")]
        serves: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            title: r
                .title
                .as_deref()
                .map(|t| truncate(t, 40))
                .unwrap_or_default(),
            cuisine: r
                .cuisine
                .as_deref()
                .map(|c| truncate(c, 20))
                .unwrap_or_default(),
            rating: r.rating.map_or("-".into(), |v| format!("{v:.1}")),
            total_time: r.total_time.map_or("-".into(), |v| v.to_string()),
            calories: r
                .nutrients
                .get("calories")
                .map_or("-".into(), display_nutrient),
            serves: r.serves.clone().unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

fn display_nutrient(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
