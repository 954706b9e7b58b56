// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

/// Split SQL scripts into statements.
mod script;
/// Builders for S3 load and unload statements.
mod statement;
/// Unit tests.
mod tests;
/// Retrying transaction executor.
mod transaction;

pub use self::script::{parse_sql_script, read_sql_file};
pub use self::statement::{DuplicateRows, S3LoadStatement, S3UnloadStatement, TextFormat};
pub use self::transaction::{
    execute_transaction, TransactionError, TransactionPlan, TransactionState, Transactional,
};
