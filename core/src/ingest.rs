use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;

use crate::db::Database;
use crate::error::RecipeError;
use crate::models::{ImportSummary, NewRecipe};
use crate::normalize::{clean_f64, clean_i64, clean_text};

/// One record of the bulk source, exactly as found.
#[derive(Debug, Deserialize)]
struct RawRecipe {
    cuisine: Option<Value>,
    title: Option<Value>,
    rating: Option<Value>,
    prep_time: Option<Value>,
    cook_time: Option<Value>,
    total_time: Option<Value>,
    description: Option<Value>,
    nutrients: Option<Value>,
    serves: Option<Value>,
}

impl RawRecipe {
    fn into_new_recipe(self, key: &str) -> NewRecipe {
        let rating = clean_f64(self.rating.as_ref());
        note_dropped(key, "rating", self.rating.as_ref(), rating.is_some());
        let prep_time = clean_i64(self.prep_time.as_ref());
        note_dropped(key, "prep_time", self.prep_time.as_ref(), prep_time.is_some());
        let cook_time = clean_i64(self.cook_time.as_ref());
        note_dropped(key, "cook_time", self.cook_time.as_ref(), cook_time.is_some());
        let total_time = clean_i64(self.total_time.as_ref());
        note_dropped(key, "total_time", self.total_time.as_ref(), total_time.is_some());

        let nutrients = match self.nutrients {
            Some(obj @ Value::Object(_)) => obj.to_string(),
            None | Some(Value::Null) => "{}".to_string(),
            Some(other) => {
                tracing::warn!(key, value = %other, "nutrients is not an object, storing empty map");
                "{}".to_string()
            }
        };

        NewRecipe {
            cuisine: clean_text(self.cuisine.as_ref()),
            title: clean_text(self.title.as_ref()),
            rating,
            prep_time,
            cook_time,
            total_time,
            description: clean_text(self.description.as_ref()),
            nutrients,
            serves: clean_text(self.serves.as_ref()),
        }
    }
}

fn note_dropped(key: &str, field: &str, raw: Option<&Value>, kept: bool) {
    if let Some(raw) = raw.filter(|v| !v.is_null() && !kept) {
        tracing::debug!(key, field, value = %raw, "value stored as absent");
    }
}

/// Rewrite bare `NaN`, `Infinity` and `-Infinity` tokens outside string
/// literals to `null`.
///
/// Dataframe exports emit these for missing or overflowing numbers, which
/// strict JSON parsers reject. Quoted `"NaN"` is left alone.
#[must_use]
pub fn sanitize_non_finite_literals(text: &str) -> Cow<'_, str> {
    const TOKENS: [&[u8]; 3] = [b"-Infinity", b"Infinity", b"NaN"];

    if !text.contains("NaN") && !text.contains("Infinity") {
        return Cow::Borrowed(text);
    }

    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if i == 0 || !is_word_byte(bytes[i - 1]) {
            let token = TOKENS.iter().find(|token| {
                bytes[i..].starts_with(token)
                    && bytes.get(i + token.len()).is_none_or(|&next| !is_word_byte(next))
            });
            if let Some(token) = token {
                out.push_str(&text[start..i]);
                out.push_str("null");
                i += token.len();
                start = i;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&text[start..]);
    Cow::Owned(out)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Parse and clean the bulk source text. Record keys are discarded; source
/// order is kept.
pub fn parse_recipes(text: &str) -> Result<Vec<NewRecipe>> {
    let text = sanitize_non_finite_literals(text);
    let root: Value = serde_json::from_str(&text).context("invalid JSON")?;
    let Value::Object(records) = root else {
        bail!("top level must be an object of recipes keyed by id");
    };

    let mut recipes = Vec::with_capacity(records.len());
    for (key, record) in records {
        if !record.is_object() {
            bail!("record '{key}' is not an object");
        }
        let raw: RawRecipe = serde_json::from_value(record)
            .with_context(|| format!("record '{key}' is malformed"))?;
        recipes.push(raw.into_new_recipe(&key));
    }
    Ok(recipes)
}

/// Read and parse the bulk source file. Nothing is written.
pub fn read_source(path: &Path) -> Result<Vec<NewRecipe>, RecipeError> {
    let unreadable = |reason: String| RecipeError::SourceUnreadable {
        path: path.to_path_buf(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    parse_recipes(&text).map_err(|e| unreadable(format!("{e:#}")))
}

/// What an import of `recipes` would leave in the store.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn preview(recipes: &[NewRecipe]) -> ImportSummary {
    ImportSummary {
        recipes_imported: recipes.len() as i64,
        missing_ratings: recipes.iter().filter(|r| r.rating.is_none()).count() as i64,
    }
}

/// Full-replace import of the file at `path`.
///
/// The whole source is read and validated before the store is touched, so a
/// corrupt file never wipes existing data.
pub fn import_file(db: &Database, path: &Path) -> Result<ImportSummary> {
    tracing::info!(path = %path.display(), "importing recipes");
    let recipes = read_source(path)?;
    tracing::info!(records = recipes.len(), "source parsed, replacing store contents");

    let summary = db.replace_all(&recipes)?;
    tracing::info!(
        recipes = summary.recipes_imported,
        missing_ratings = summary.missing_ratings,
        "import complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pagination;

    const SAMPLE: &str = r#"{
        "0": {
            "cuisine": "Southern Recipes",
            "title": "Sweet Potato Pie",
            "rating": 4.8,
            "prep_time": 15,
            "cook_time": 100,
            "total_time": 115,
            "description": "Shared from a Southern recipe",
            "nutrients": {"calories": "389 kcal", "fatContent": "21 g"},
            "serves": "8 servings"
        },
        "1": {"title": "X", "rating": "nan", "cuisine": "Italian"},
        "2": {"title": "Y", "rating": NaN, "prep_time": NaN, "cook_time": "NaN"}
    }"#;

    fn write_source(dir: &tempfile::TempDir, text: &str) -> std::path::PathBuf {
        let path = dir.path().join("recipes.json");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_parse_recipes_sample() {
        let recipes = parse_recipes(SAMPLE).unwrap();
        assert_eq!(recipes.len(), 3);

        let pie = &recipes[0];
        assert_eq!(pie.title.as_deref(), Some("Sweet Potato Pie"));
        assert_eq!(pie.rating, Some(4.8));
        assert_eq!(pie.total_time, Some(115));
        assert_eq!(pie.serves.as_deref(), Some("8 servings"));
        let nutrients: Value = serde_json::from_str(&pie.nutrients).unwrap();
        assert_eq!(nutrients["calories"], "389 kcal");
    }

    #[test]
    fn test_nan_text_rating_becomes_absent() {
        let recipes = parse_recipes(SAMPLE).unwrap();
        let x = &recipes[1];
        assert_eq!(x.title.as_deref(), Some("X"));
        assert_eq!(x.rating, None);
        assert_eq!(x.cuisine.as_deref(), Some("Italian"));
        assert_eq!(x.nutrients, "{}");
    }

    #[test]
    fn test_bare_nan_literals_become_absent() {
        let recipes = parse_recipes(SAMPLE).unwrap();
        let y = &recipes[2];
        assert_eq!(y.rating, None);
        assert_eq!(y.prep_time, None);
        assert_eq!(y.cook_time, None);
        assert_eq!(y.cuisine, None);
    }

    #[test]
    fn test_numeric_text_is_coerced() {
        let recipes =
            parse_recipes(r#"{"a": {"rating": "4.5", "total_time": "30", "cook_time": "soon"}}"#)
                .unwrap();
        assert_eq!(recipes[0].rating, Some(4.5));
        assert_eq!(recipes[0].total_time, Some(30));
        assert_eq!(recipes[0].cook_time, None);
    }

    #[test]
    fn test_non_object_nutrients_stored_empty() {
        let recipes = parse_recipes(r#"{"a": {"nutrients": "389 kcal"}}"#).unwrap();
        assert_eq!(recipes[0].nutrients, "{}");
    }

    #[test]
    fn test_source_order_is_kept() {
        let recipes =
            parse_recipes(r#"{"9": {"title": "first"}, "1": {"title": "second"}}"#).unwrap();
        assert_eq!(recipes[0].title.as_deref(), Some("first"));
        assert_eq!(recipes[1].title.as_deref(), Some("second"));
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert!(parse_recipes("[1, 2]").is_err());
        assert!(parse_recipes(r#"{"a": 3}"#).is_err());
        assert!(parse_recipes("{not json").is_err());
    }

    #[test]
    fn test_sanitize_leaves_strings_alone() {
        let text = r#"{"title": "NaN bread \"NaN\"", "rating": NaN, "NaNa": 1}"#;
        let clean = sanitize_non_finite_literals(text);
        assert_eq!(
            clean,
            r#"{"title": "NaN bread \"NaN\"", "rating": null, "NaNa": 1}"#
        );
        assert!(matches!(sanitize_non_finite_literals("{}"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_sanitize_array_and_edges() {
        assert_eq!(sanitize_non_finite_literals("[NaN,NaN]"), "[null,null]");
        assert_eq!(sanitize_non_finite_literals("NaN"), "null");
    }

    #[test]
    fn test_sanitize_infinity_tokens() {
        assert_eq!(
            sanitize_non_finite_literals("[Infinity, -Infinity,NaN]"),
            "[null, null,null]"
        );
        assert_eq!(
            sanitize_non_finite_literals(r#"{"a": "Infinity", "Infinityish": -1}"#),
            r#"{"a": "Infinity", "Infinityish": -1}"#
        );
    }

    #[test]
    fn test_infinity_literals_become_absent() {
        let recipes = parse_recipes(
            r#"{"a": {"title": "Z", "rating": Infinity, "total_time": -Infinity, "prep_time": 5}}"#,
        )
        .unwrap();
        assert_eq!(recipes[0].title.as_deref(), Some("Z"));
        assert_eq!(recipes[0].rating, None);
        assert_eq!(recipes[0].total_time, None);
        assert_eq!(recipes[0].prep_time, Some(5));
    }

    #[test]
    fn test_preview_counts() {
        let recipes = parse_recipes(SAMPLE).unwrap();
        let summary = preview(&recipes);
        assert_eq!(summary.recipes_imported, 3);
        assert_eq!(summary.missing_ratings, 2);
    }

    #[test]
    fn test_import_file_replaces_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, SAMPLE);
        let db = Database::open_in_memory().unwrap();

        let summary = import_file(&db, &path).unwrap();
        assert_eq!(summary.recipes_imported, 3);
        assert_eq!(summary.missing_ratings, 2);

        let again = import_file(&db, &path).unwrap();
        assert_eq!(again.recipes_imported, 3);

        let page = db.list_recipes(Pagination::default()).unwrap();
        assert_eq!(page.data[0].title.as_deref(), Some("Sweet Potato Pie"));
        let x = page
            .data
            .iter()
            .find(|r| r.title.as_deref() == Some("X"))
            .unwrap();
        assert_eq!(x.rating, None);
        assert_eq!(x.cuisine.as_deref(), Some("Italian"));
    }

    #[test]
    fn test_corrupt_source_keeps_existing_data() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_source(&dir, SAMPLE);
        let db = Database::open_in_memory().unwrap();
        import_file(&db, &good).unwrap();

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{\"0\": {\"title\": ").unwrap();
        let err = import_file(&db, &bad).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecipeError>(),
            Some(RecipeError::SourceUnreadable { .. })
        ));
        assert_eq!(db.count_recipes().unwrap(), 3);
    }

    #[test]
    fn test_missing_source_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_source(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, RecipeError::SourceUnreadable { .. }));
    }
}
