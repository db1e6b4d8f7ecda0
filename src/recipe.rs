use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::UpstreamError;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Nutrition {
    pub calories: i64,
    pub protein: String,
    pub carbs: String,
    pub fat: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub servings: i64,
    pub prep_time: String,
    pub cook_time: String,
    pub nutrition: Nutrition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeVariant {
    Healthy,
    Mimic,
}

impl RecipeVariant {
    #[must_use]
    pub const fn placeholder_title(self) -> &'static str {
        match self {
            Self::Healthy => "Healthy Version",
            Self::Mimic => "Mimic Version",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Healthy => "healthy_recipe",
            Self::Mimic => "mimic_recipe",
        }
    }

    #[must_use]
    pub fn user_prompt(self, dish: &str) -> String {
        match self {
            Self::Healthy => format!(
                "DISH: {dish}\n\nGOAL: Write a healthier version of this dish. \
                 Keep its character but cut calories, saturated fat, sugar and salt, \
                 and favour whole ingredients and lean proteins."
            ),
            Self::Mimic => format!(
                "DISH: {dish}\n\nGOAL: Write a recipe that mimics this dish as closely as possible, \
                 so the result looks and tastes like the original."
            ),
        }
    }
}

impl Recipe {
    /// Correctly shaped record with every field blank, used when generation fails.
    #[must_use]
    pub fn empty_shell(variant: RecipeVariant) -> Self {
        Self {
            title: variant.placeholder_title().to_string(),
            ..Self::default()
        }
    }

    /// Tolerant conversion of a model reply into a recipe.
    ///
    /// Ingredients may be plain strings or `{quantity, unit, name}` objects;
    /// numbers may arrive as numeric strings; absent optional fields stay blank.
    ///
    /// # Errors
    ///
    /// `Malformed` if the reply is not an object or has neither ingredients nor
    /// instructions.
    pub fn from_llm_json(v: &JsonValue, variant: RecipeVariant) -> Result<Self, UpstreamError> {
        let JsonValue::Object(obj) = v else {
            return Err(UpstreamError::Malformed("recipe reply is not a JSON object".into()));
        };

        let ingredients = normalize_ingredients(obj.get("ingredients"));
        let instructions = normalize_lines(obj.get("instructions"));
        if ingredients.is_empty() && instructions.is_empty() {
            return Err(UpstreamError::Malformed(
                "recipe reply has no ingredients or instructions".into(),
            ));
        }

        let title = text(obj.get("title"));
        let nutrition = obj.get("nutrition");

        Ok(Self {
            title: if title.is_empty() {
                variant.placeholder_title().to_string()
            } else {
                title
            },
            ingredients,
            instructions,
            servings: integer(obj.get("servings")),
            prep_time: text(obj.get("prepTime").or_else(|| obj.get("prep_time"))),
            cook_time: text(obj.get("cookTime").or_else(|| obj.get("cook_time"))),
            nutrition: Nutrition {
                calories: integer(nutrition.and_then(|n| n.get("calories"))),
                protein: text(nutrition.and_then(|n| n.get("protein"))),
                carbs: text(nutrition.and_then(|n| n.get("carbs"))),
                fat: text(nutrition.and_then(|n| n.get("fat"))),
            },
        })
    }
}

fn text(v: Option<&JsonValue>) -> String {
    match v {
        Some(JsonValue::String(s)) => s.trim().to_string(),
        Some(JsonValue::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Integer fields; accepts `4`, `4.0`, `"4"`, `"4 servings"` and `"1,250 kcal"`.
fn integer(v: Option<&JsonValue>) -> i64 {
    match v {
        Some(JsonValue::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        Some(JsonValue::String(s)) => leading_digits(s.trim()).parse().unwrap_or(0),
        _ => 0,
    }
}

/// Leading digits of `s`, skipping `,` `_` or a space that sits between two digits.
fn leading_digits(s: &str) -> String {
    let mut digits = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if matches!(c, ',' | '_' | ' ')
            && !digits.is_empty()
            && chars.peek().is_some_and(char::is_ascii_digit)
        {
            continue;
        } else {
            break;
        }
    }
    digits
}

fn normalize_lines(v: Option<&JsonValue>) -> Vec<String> {
    match v {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|x| match x {
                JsonValue::String(s) => {
                    let t = s.trim();
                    (!t.is_empty()).then(|| t.to_string())
                }
                JsonValue::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(JsonValue::String(s)) => s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn normalize_ingredients(v: Option<&JsonValue>) -> Vec<String> {
    let Some(JsonValue::Array(items)) = v else {
        return normalize_lines(v);
    };
    items
        .iter()
        .filter_map(|x| match x {
            JsonValue::String(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            JsonValue::Object(m) => {
                let name = m
                    .get("name")
                    .and_then(JsonValue::as_str)
                    .map(str::trim)
                    .unwrap_or_default();
                if name.is_empty() {
                    return None;
                }
                let quantity = m
                    .get("quantity")
                    .or_else(|| m.get("amount"))
                    .map(|q| text(Some(q)))
                    .filter(|q| !q.is_empty());
                let unit = m
                    .get("unit")
                    .and_then(JsonValue::as_str)
                    .map(str::trim)
                    .filter(|u| !u.is_empty());
                Some(
                    [quantity.as_deref(), unit, Some(name)]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(" "),
                )
            }
            _ => None,
        })
        .collect()
}
