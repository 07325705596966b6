//! Safety categories and their hard-ceiling cautions.
//!
//! The catalog carries a free-text safety tag per substance. Tags are parsed
//! once into [`SafetyCategory`], and every category that has an upper intake
//! limit maps to its own caution text through an exhaustive match, so adding
//! a category without a caution fails to compile.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum SafetyCategory {
    /// No hard intake ceiling
    #[default]
    General,
    Iron,
    VitaminA,
    Selenium,
    VitaminD,
    Zinc,
    /// Has a ceiling, but no substance-specific caution
    HardLimit,
}

impl SafetyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyCategory::General => "general",
            SafetyCategory::Iron => "iron",
            SafetyCategory::VitaminA => "vitamin_a",
            SafetyCategory::Selenium => "selenium",
            SafetyCategory::VitaminD => "vitamin_d",
            SafetyCategory::Zinc => "zinc",
            SafetyCategory::HardLimit => "hard_limit",
        }
    }

    pub fn has_hard_limit(&self) -> bool {
        self.caution().is_some()
    }

    /// Caution attached when suggesting more of a substance in this category
    pub fn caution(&self) -> Option<&'static str> {
        match self {
            SafetyCategory::General => None,
            SafetyCategory::Iron => Some(
                "Iron has a narrow safety margin. Do not exceed 45 mg/day without testing ferritin first.",
            ),
            SafetyCategory::VitaminA => Some(
                "Preformed vitamin A accumulates in the liver. Stay below 3,000 mcg RAE/day.",
            ),
            SafetyCategory::Selenium => Some(
                "Selenium toxicity begins close to the effective dose. Stay below 400 mcg/day from all sources.",
            ),
            SafetyCategory::VitaminD => Some(
                "Vitamin D is fat-soluble. Stay below 4,000 IU/day unless a recent 25(OH)D test supports more.",
            ),
            SafetyCategory::Zinc => Some(
                "Long-term zinc above 40 mg/day can deplete copper.",
            ),
            SafetyCategory::HardLimit => Some(
                "This substance has an upper intake limit. Check your total daily amount before adding more.",
            ),
        }
    }
}

impl FromStr for SafetyCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "" | "general" | "none" | "standard" => Ok(SafetyCategory::General),
            "iron" => Ok(SafetyCategory::Iron),
            "vitamin_a" | "retinol" => Ok(SafetyCategory::VitaminA),
            "selenium" => Ok(SafetyCategory::Selenium),
            "vitamin_d" => Ok(SafetyCategory::VitaminD),
            "zinc" => Ok(SafetyCategory::Zinc),
            "hard_limit" | "ul" | "upper_limit" => Ok(SafetyCategory::HardLimit),
            _ => Err(normalized),
        }
    }
}

impl From<String> for SafetyCategory {
    fn from(tag: String) -> Self {
        tag.parse().unwrap_or_else(|unknown| {
            tracing::warn!("Unknown safety category '{}', treating as general", unknown);
            SafetyCategory::General
        })
    }
}

impl From<SafetyCategory> for String {
    fn from(category: SafetyCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for SafetyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
