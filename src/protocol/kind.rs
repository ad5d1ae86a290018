use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Closed vocabulary of operations. New kinds are added, never repurposed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ActionKind {
    WriteCell,
    WriteRange,
    ReadCell,
    ReadRange,
    FormatCell,
    FormatRange,
    CreateWorksheet,
    DeleteWorksheet,
    RenameWorksheet,
    InsertFormula,
    CreateChart,
    CreatePivotTable,
    ApplyFilter,
    ApplyConditionalFormatting,
    ApplyDataValidation,
    Custom,
}

impl ActionKind {
    /// Accepts the canonical kebab-case name plus snake_case and camelCase spellings.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::from_str(&normalize_kind_name(raw)).ok()
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn is_mutating(self) -> bool {
        !matches!(self, Self::ReadCell | Self::ReadRange)
    }

    /// Kinds that may be acknowledged with manual instructions when the
    /// document cannot perform them.
    pub fn is_presentational(self) -> bool {
        matches!(
            self,
            Self::FormatCell
                | Self::FormatRange
                | Self::CreateChart
                | Self::CreatePivotTable
                | Self::ApplyFilter
                | Self::ApplyConditionalFormatting
                | Self::ApplyDataValidation
        )
    }
}

fn normalize_kind_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev_lower = false;
    for ch in raw.trim().chars() {
        match ch {
            '_' | ' ' | '-' => {
                if !out.ends_with('-') {
                    out.push('-');
                }
                prev_lower = false;
            }
            c if c.is_ascii_uppercase() => {
                if prev_lower {
                    out.push('-');
                }
                out.push(c.to_ascii_lowercase());
                prev_lower = false;
            }
            c => {
                out.push(c);
                prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            }
        }
    }
    out
}
