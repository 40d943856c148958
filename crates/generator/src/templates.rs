//! Template loading and Go-specific filters

use grpc_service_config_common::{PluginError, Result};
use std::collections::HashMap;
use std::fmt::Write;
use tera::{Tera, Value};

/// Name of the Go source template
pub const SERVICE_CONFIG_TEMPLATE: &str = "service_config.go";

/// Load all templates
pub fn load_templates() -> Result<Tera> {
    let mut tera = Tera::default();

    tera.register_filter("go_string", go_string_filter);

    tera.add_raw_template(
        SERVICE_CONFIG_TEMPLATE,
        include_str!("../templates/service_config.go.tera"),
    )
    .map_err(|e| {
        PluginError::Generation(format!("Failed to load service_config.go template: {}", e))
    })?;

    Ok(tera)
}

/// Filter rendering a string as a Go string literal
fn go_string_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("go_string filter expects a string"))?;

    Ok(Value::String(go_string_literal(s)))
}

/// Go literal with the same value as `s`
///
/// Raw strings keep the config readable in the generated file. They cannot
/// hold backquotes, and the Go compiler drops carriage returns from them and
/// rejects NUL and BOM anywhere in source, so those fall back to an
/// interpreted string.
pub fn go_string_literal(s: &str) -> String {
    if s.contains(['`', '\r', '\0', '\u{feff}']) {
        interpreted_literal(s)
    } else {
        format!("`{}`", s)
    }
}

fn interpreted_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{feff}' => out.push_str("\\ufeff"),
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
