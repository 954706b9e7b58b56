// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use crate::common::Error;
use std::path::Path;

/// Split a SQL script into statements.
///
/// Blank lines and lines starting with `--` are skipped. A `DELIMITER <token>`
/// line switches the statement terminator (as in MySQL client scripts); the
/// custom terminator is rewritten to `;` in the returned statements. A trailing
/// statement without a terminator is kept.
pub fn parse_sql_script(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut delimiter = ";".to_string();
    let mut pending = String::new();
    for line in script.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("DELIMITER") {
            if let Some(token) = rest.split_whitespace().next() {
                delimiter = token.to_string();
            }
            continue;
        }
        if !pending.is_empty() {
            pending.push('\n');
        }
        if line.contains(delimiter.as_str()) {
            pending.push_str(&line.replace(delimiter.as_str(), ";"));
            statements.push(pending.trim().to_string());
            pending.clear();
        } else {
            pending.push_str(line);
        }
    }
    if !pending.trim().is_empty() {
        statements.push(pending.trim().to_string());
    }
    statements
}

/// Read and split a SQL script file.
pub async fn read_sql_file(path: impl AsRef<Path>) -> Result<Vec<String>, Error> {
    let path = path.as_ref();
    let script = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Io(e, format!("{}", path.display())))?;
    Ok(parse_sql_script(&script))
}
