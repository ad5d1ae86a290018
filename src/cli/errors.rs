use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub try_this: Option<String>,
}

impl ErrorEnvelope {
    fn new(code: &str, message: String, try_this: Option<&str>) -> Self {
        Self {
            code: code.to_string(),
            message,
            try_this: try_this.map(str::to_string),
        }
    }
}

pub fn envelope_for(error: &anyhow::Error) -> ErrorEnvelope {
    let message = format!("{error:#}");

    if message.contains("does not exist") {
        return ErrorEnvelope::new(
            "FILE_NOT_FOUND",
            message,
            Some("check the path and permissions"),
        );
    }

    if let Some(name) = parse_missing_sheet(&message) {
        return ErrorEnvelope::new(
            "SHEET_NOT_FOUND",
            format!("worksheet '{name}' was not found"),
            Some("pass an existing worksheet with `--sheet` or omit it to use the first one"),
        );
    }

    if message.contains("config")
        || message.contains("max_line_width")
        || message.contains("max_read_cells")
        || message.contains("pivot.")
    {
        return ErrorEnvelope::new(
            "CONFIG_INVALID",
            message,
            Some("fix the setting in the config file, environment or flags"),
        );
    }

    if message.contains("is not a valid range") || message.contains("is not a cell address") {
        return ErrorEnvelope::new(
            "INVALID_ARGUMENT",
            message,
            Some("use A1 notation, for example `B2` or `A1:C10`"),
        );
    }

    if message.contains("failed to parse") || message.contains("is not a JSON grid") {
        return ErrorEnvelope::new(
            "INVALID_JSON",
            message,
            Some("grids are nested arrays like [[1, 2], [3, 4]]"),
        );
    }

    if message.contains("is not an envelope") {
        return ErrorEnvelope::new(
            "INVALID_ENVELOPE",
            message,
            Some("run `sheet-intent schema` to see the accepted shape"),
        );
    }

    ErrorEnvelope::new("COMMAND_FAILED", message, None)
}

fn parse_missing_sheet(message: &str) -> Option<&str> {
    let prefix = "sheet '";
    let start = message.find(prefix)? + prefix.len();
    let rest = &message[start..];
    let end = rest.find("' not found")?;
    Some(&rest[..end])
}
