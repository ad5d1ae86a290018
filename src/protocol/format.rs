use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Presentation changes for a cell or range. Every field is optional and an
/// absent field leaves the existing value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormattingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<FontSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<BorderSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<AlignmentSpec>,
    #[serde(
        default,
        alias = "number_format",
        skip_serializing_if = "Option::is_none"
    )]
    pub number_format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FillSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
}

impl BorderStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thin => "thin",
            Self::Medium => "medium",
            Self::Thick => "thick",
            Self::Dashed => "dashed",
            Self::Dotted => "dotted",
            Self::Double => "double",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorderSide {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<BorderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Sides to draw; all four when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sides: Option<Vec<BorderSide>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<HorizontalAlign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<VerticalAlign>,
    #[serde(default, alias = "wrap_text", skip_serializing_if = "Option::is_none")]
    pub wrap_text: Option<bool>,
}

impl FormattingSpec {
    pub fn is_empty(&self) -> bool {
        self.font.is_none()
            && self.fill.is_none()
            && self.border.is_none()
            && self.alignment.is_none()
            && self.number_format.is_none()
    }

    /// Layer `other` on top of `self`; fields absent in `other` keep their value.
    pub fn merge(&mut self, other: &FormattingSpec) {
        if let Some(font) = &other.font {
            let base = self.font.get_or_insert_with(FontSpec::default);
            overlay(&mut base.name, &font.name);
            overlay(&mut base.size, &font.size);
            overlay(&mut base.bold, &font.bold);
            overlay(&mut base.italic, &font.italic);
            overlay(&mut base.underline, &font.underline);
            overlay(&mut base.color, &font.color);
        }
        if let Some(fill) = &other.fill {
            let base = self.fill.get_or_insert_with(FillSpec::default);
            overlay(&mut base.color, &fill.color);
        }
        if let Some(border) = &other.border {
            let base = self.border.get_or_insert_with(BorderSpec::default);
            overlay(&mut base.style, &border.style);
            overlay(&mut base.color, &border.color);
            overlay(&mut base.sides, &border.sides);
        }
        if let Some(alignment) = &other.alignment {
            let base = self.alignment.get_or_insert_with(AlignmentSpec::default);
            overlay(&mut base.horizontal, &alignment.horizontal);
            overlay(&mut base.vertical, &alignment.vertical);
            overlay(&mut base.wrap_text, &alignment.wrap_text);
        }
        overlay(&mut self.number_format, &other.number_format);
    }

    /// Normalize colors and expand number format shorthands. Returns the
    /// offending field and message on bad input.
    pub(crate) fn normalized(mut self) -> Result<Self, (&'static str, String)> {
        if let Some(font) = self.font.as_mut()
            && let Some(color) = font.color.as_mut()
        {
            *color = normalize_color(color).ok_or(("format.font.color", bad_color(color)))?;
        }
        if let Some(fill) = self.fill.as_mut()
            && let Some(color) = fill.color.as_mut()
        {
            *color = normalize_color(color).ok_or(("format.fill.color", bad_color(color)))?;
        }
        if let Some(border) = self.border.as_mut()
            && let Some(color) = border.color.as_mut()
        {
            *color = normalize_color(color).ok_or(("format.border.color", bad_color(color)))?;
        }
        if let Some(font) = &self.font
            && let Some(size) = font.size
            && !(1.0..=409.0).contains(&size)
        {
            return Err(("format.font.size", format!("{size} is outside 1-409")));
        }
        if let Some(code) = self.number_format.as_mut() {
            let trimmed = code.trim();
            if trimmed.is_empty() {
                return Err(("format.numberFormat", "must not be empty".to_string()));
            }
            *code = expand_number_format(trimmed).to_string();
        }
        Ok(self)
    }

    /// Short human description used in logs and manual instructions.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(font) = &self.font {
            if font.bold == Some(true) {
                parts.push("bold".to_string());
            }
            if font.italic == Some(true) {
                parts.push("italic".to_string());
            }
            if font.underline == Some(true) {
                parts.push("underline".to_string());
            }
            if let Some(name) = &font.name {
                parts.push(format!("font {name}"));
            }
            if let Some(size) = font.size {
                parts.push(format!("size {size}"));
            }
            if let Some(color) = &font.color {
                parts.push(format!("font color {color}"));
            }
        }
        if let Some(color) = self.fill.as_ref().and_then(|f| f.color.as_ref()) {
            parts.push(format!("fill {color}"));
        }
        if let Some(border) = &self.border {
            let style = border.style.unwrap_or(BorderStyle::Thin).as_str();
            parts.push(format!("{style} border"));
        }
        if let Some(alignment) = &self.alignment {
            if let Some(h) = alignment.horizontal {
                parts.push(format!("align {}", format!("{h:?}").to_lowercase()));
            }
            if let Some(v) = alignment.vertical {
                parts.push(format!("vertical {}", format!("{v:?}").to_lowercase()));
            }
            if alignment.wrap_text == Some(true) {
                parts.push("wrap text".to_string());
            }
        }
        if let Some(code) = &self.number_format {
            parts.push(format!("number format {code}"));
        }
        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

fn overlay<T: Clone>(base: &mut Option<T>, patch: &Option<T>) {
    if let Some(value) = patch {
        *base = Some(value.clone());
    }
}

fn bad_color(raw: &str) -> String {
    format!("'{raw}' is not a hex color (#RGB, #RRGGBB or #AARRGGBB)")
}

/// Uppercase ARGB with an `FF` alpha when none is given.
pub fn normalize_color(raw: &str) -> Option<String> {
    let hex = raw.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let upper = hex.to_ascii_uppercase();
    match upper.len() {
        3 => {
            let expanded: String = upper.chars().flat_map(|c| [c, c]).collect();
            Some(format!("FF{expanded}"))
        }
        6 => Some(format!("FF{upper}")),
        8 => Some(upper),
        _ => None,
    }
}

fn expand_number_format(code: &str) -> &str {
    match code.to_ascii_lowercase().as_str() {
        "currency" => "$#,##0.00",
        "percent" | "percentage" => "0.00%",
        "date" | "date_iso" => "yyyy-mm-dd",
        "accounting" => "_($* #,##0.00_)",
        "integer" => "0",
        "text" => "@",
        _ => code,
    }
}
