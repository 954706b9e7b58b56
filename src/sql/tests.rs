// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

#[cfg(test)]
mod transaction_tests {
    use crate::common::OobConfig;
    use crate::log::{LogLevel, StringLogger};
    use crate::sql::{execute_transaction, TransactionError, TransactionPlan, Transactional};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::fmt::{Display, Formatter};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
    enum Kind {
        Deadlock,
        Syntax,
    }

    #[derive(Clone, Debug, PartialEq)]
    struct DriverError {
        kind: Kind,
        message: String,
    }

    impl DriverError {
        fn deadlock() -> Self {
            Self {
                kind: Kind::Deadlock,
                message: "deadlock found".to_string(),
            }
        }

        fn syntax() -> Self {
            Self {
                kind: Kind::Syntax,
                message: "syntax error".to_string(),
            }
        }
    }

    impl Display for DriverError {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.message)
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Execute(String, bool),
        Commit,
        Rollback,
    }

    /// Connection whose `execute` results are scripted; unscripted calls succeed.
    #[derive(Default)]
    struct FakeConnection {
        script: VecDeque<Result<(), DriverError>>,
        commit_error: Option<DriverError>,
        commit_failures: usize,
        rollback_error: Option<DriverError>,
        calls: Vec<Call>,
    }

    impl FakeConnection {
        fn scripted(script: Vec<Result<(), DriverError>>) -> Self {
            Self {
                script: script.into(),
                ..Default::default()
            }
        }

        fn count(&self, call: &Call) -> usize {
            self.calls.iter().filter(|c| *c == call).count()
        }

        fn executed(&self) -> Vec<&str> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Execute(s, _) => Some(s.as_str()),
                    _ => None,
                })
                .collect()
        }

        /// Each attempt ends with exactly one commit or rollback, a failed
        /// statement is immediately followed by a rollback.
        fn assert_well_formed(&self) {
            let mut previous: Option<&Call> = None;
            for call in &self.calls {
                if let Some(Call::Execute(_, false)) = previous {
                    assert_eq!(call, &Call::Rollback, "calls: {:?}", self.calls);
                }
                if let (Some(Call::Commit), Call::Rollback) = (previous, call) {
                    // Only a failed commit may be rolled back.
                    assert!(self.commit_failures > 0, "calls: {:?}", self.calls);
                }
                previous = Some(call);
            }
            assert!(matches!(previous, Some(Call::Commit) | Some(Call::Rollback)));
        }
    }

    #[async_trait]
    impl Transactional for FakeConnection {
        type Statement = String;
        type Error = DriverError;
        type ErrorKind = Kind;

        async fn execute(&mut self, statement: &String) -> Result<(), DriverError> {
            let result = self.script.pop_front().unwrap_or(Ok(()));
            self.calls
                .push(Call::Execute(statement.clone(), result.is_ok()));
            result
        }

        async fn commit(&mut self) -> Result<(), DriverError> {
            self.calls.push(Call::Commit);
            match self.commit_error.take() {
                Some(e) => {
                    self.commit_failures += 1;
                    Err(e)
                }
                None => Ok(()),
            }
        }

        async fn rollback(&mut self) -> Result<(), DriverError> {
            self.calls.push(Call::Rollback);
            match self.rollback_error.clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn classify(&self, error: &DriverError) -> Kind {
            error.kind
        }
    }

    /// Paused-clock sleeps land on millisecond ticks.
    fn assert_waited(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed <= expected + Duration::from_millis(5),
            "waited {elapsed:?}, expected {expected:?}"
        );
    }

    fn statements() -> Vec<String> {
        vec![
            "UPDATE accounts SET balance = balance - 10 WHERE id = 1;".to_string(),
            "UPDATE accounts SET balance = balance + 10 WHERE id = 2;".to_string(),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt() {
        let mut conn =
            FakeConnection::scripted(vec![Err(DriverError::deadlock()), Err(DriverError::deadlock())]);
        let plan = TransactionPlan::new(statements())
            .max_retries(2)
            .retry_delay(Duration::from_secs(10))
            .retry_on(Kind::Deadlock);
        let logger = StringLogger::default();

        let start = Instant::now();
        let result = execute_transaction(&mut conn, &plan, &logger).await;
        assert!(result.is_ok());
        assert_waited(start, Duration::from_secs(20));

        assert_eq!(conn.count(&Call::Rollback), 2);
        assert_eq!(conn.count(&Call::Commit), 1);
        assert_eq!(
            conn.executed(),
            vec![
                statements()[0].as_str(),
                statements()[0].as_str(),
                statements()[0].as_str(),
                statements()[1].as_str(),
            ]
        );
        conn.assert_well_formed();
        let starts = logger
            .lines()
            .iter()
            .filter(|(_, line)| line.starts_with("Start SQL transaction"))
            .count();
        assert_eq!(starts, 3);
        assert!(logger.contains_warnings());
        assert_eq!(logger.count_at_least(LogLevel::Error), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_fails_fast() {
        let mut conn = FakeConnection::scripted(vec![Err(DriverError::syntax())]);
        let plan = TransactionPlan::new(statements())
            .max_retries(0)
            .retry_on(Kind::Deadlock);
        let logger = StringLogger::default();

        let start = Instant::now();
        let result = execute_transaction(&mut conn, &plan, &logger).await;
        assert_waited(start, Duration::ZERO);
        match result {
            Err(TransactionError::NonRetryable(e)) => assert_eq!(e, DriverError::syntax()),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(
            conn.calls,
            vec![Call::Execute(statements()[0].clone(), false), Call::Rollback]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_does_not_consume_retries() {
        let mut conn = FakeConnection::scripted(vec![
            Err(DriverError::deadlock()),
            Ok(()),
            Err(DriverError::syntax()),
        ]);
        let plan = TransactionPlan::new(statements())
            .max_retries(5)
            .retry_delay(Duration::from_secs(1))
            .retry_on(Kind::Deadlock);
        let logger = StringLogger::default();

        let start = Instant::now();
        let result = execute_transaction(&mut conn, &plan, &logger).await;
        assert!(matches!(result, Err(TransactionError::NonRetryable(_))));
        assert_waited(start, Duration::from_secs(1));
        assert_eq!(conn.count(&Call::Rollback), 2);
        assert_eq!(conn.count(&Call::Commit), 0);
        conn.assert_well_formed();
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exhausted_returns_last_error() {
        let mut conn = FakeConnection::scripted(vec![Err(DriverError::deadlock()); 3]);
        let plan = TransactionPlan::new(statements())
            .max_retries(2)
            .retry_delay(Duration::from_millis(250))
            .retry_on(Kind::Deadlock);
        let logger = StringLogger::default();

        let start = Instant::now();
        let result = execute_transaction(&mut conn, &plan, &logger).await;
        assert_waited(start, Duration::from_millis(500));
        match result {
            Err(TransactionError::RetriesExhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert_eq!(source, DriverError::deadlock());
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(conn.count(&Call::Rollback), 3);
        assert_eq!(conn.count(&Call::Commit), 0);
        assert_eq!(logger.count_at_least(LogLevel::Error), 1);
        conn.assert_well_formed();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_commit_is_rolled_back_and_retried() {
        let mut conn = FakeConnection {
            commit_error: Some(DriverError::deadlock()),
            ..Default::default()
        };
        let plan = TransactionPlan::new(statements())
            .max_retries(1)
            .retry_delay(Duration::from_secs(3))
            .retry_on(Kind::Deadlock);
        let logger = StringLogger::default();

        let result = execute_transaction(&mut conn, &plan, &logger).await;
        assert!(result.is_ok());
        assert_eq!(conn.count(&Call::Commit), 2);
        assert_eq!(conn.count(&Call::Rollback), 1);
        conn.assert_well_formed();
    }

    #[tokio::test(start_paused = true)]
    async fn rollback_failure_stops_retrying() {
        let mut conn = FakeConnection {
            script: vec![Err(DriverError::deadlock())].into(),
            rollback_error: Some(DriverError::syntax()),
            ..Default::default()
        };
        let plan = TransactionPlan::new(statements())
            .max_retries(3)
            .retry_on(Kind::Deadlock);
        let logger = StringLogger::default();

        let result = execute_transaction(&mut conn, &plan, &logger).await;
        match result {
            Err(TransactionError::RollbackFailed { source, rollback }) => {
                assert_eq!(source, DriverError::deadlock());
                assert_eq!(rollback, DriverError::syntax());
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(conn.count(&Call::Rollback), 1);
    }

    #[tokio::test]
    async fn empty_plan_is_rejected() {
        let mut conn = FakeConnection::default();
        let plan: TransactionPlan<String, Kind> = TransactionPlan::new(Vec::new());
        let result = execute_transaction(&mut conn, &plan, &StringLogger::default()).await;
        assert!(matches!(result, Err(TransactionError::Configuration(_))));
        assert!(conn.calls.is_empty());
    }

    #[tokio::test]
    async fn first_attempt_success_commits_once() {
        let mut conn = FakeConnection::default();
        let plan = TransactionPlan::new(statements()).retry_on(Kind::Deadlock);
        let logger = StringLogger::default();
        execute_transaction(&mut conn, &plan, &logger)
            .await
            .expect("transaction");
        assert_eq!(conn.calls.last(), Some(&Call::Commit));
        assert_eq!(conn.count(&Call::Rollback), 0);
        assert!(!logger.contains_warnings());
    }

    #[test]
    fn plan_from_config() {
        let config = OobConfig::builder()
            .toml_str(
                r#"
                [transaction]
                max_retries = 3
                retry_delay_secs = 2.5
                "#,
            )
            .build()
            .expect("config");
        let plan: TransactionPlan<String, Kind> =
            TransactionPlan::from_config(statements(), &config).expect("plan");
        assert_eq!(plan.get_max_retries(), 3);
        assert_eq!(plan.get_retry_delay(), Duration::from_millis(2500));
        assert_eq!(plan.statements().len(), 2);
        assert!(!plan.is_retryable(&Kind::Deadlock));
    }

    #[test]
    fn plan_defaults_without_config_section() {
        let config = OobConfig::builder()
            .toml_str("[aws]\nprofile = \"p\"")
            .build()
            .expect("config");
        let plan: TransactionPlan<String, Kind> =
            TransactionPlan::from_config(statements(), &config).expect("plan");
        assert_eq!(plan.get_max_retries(), 0);
        assert_eq!(plan.get_retry_delay(), Duration::from_secs(10));
    }

    #[test]
    fn negative_delay_in_config_is_rejected() {
        let config = OobConfig::builder()
            .toml_str("[transaction]\nretry_delay_secs = -1.0")
            .build()
            .expect("config");
        let plan: Result<TransactionPlan<String, Kind>, _> =
            TransactionPlan::from_config(statements(), &config);
        assert!(plan.is_err());
    }
}

#[cfg(test)]
mod script_tests {
    use crate::sql::{parse_sql_script, read_sql_file};

    #[test]
    fn splits_on_semicolons() {
        let script = "-- create\nCREATE TABLE t (\n  id INT\n);\n\nINSERT INTO t VALUES (1);\n";
        assert_eq!(
            parse_sql_script(script),
            vec![
                "CREATE TABLE t (\n  id INT\n);".to_string(),
                "INSERT INTO t VALUES (1);".to_string(),
            ]
        );
    }

    #[test]
    fn honors_delimiter_directive() {
        let script = "DELIMITER $$\nCREATE PROCEDURE p()\nBEGIN\n  SELECT 1;\nEND$$\nDELIMITER ;\nCALL p();";
        assert_eq!(
            parse_sql_script(script),
            vec![
                "CREATE PROCEDURE p()\nBEGIN\n  SELECT 1;\nEND;".to_string(),
                "CALL p();".to_string(),
            ]
        );
    }

    #[test]
    fn keeps_unterminated_tail() {
        assert_eq!(
            parse_sql_script("SELECT 1;\nSELECT 2"),
            vec!["SELECT 1;".to_string(), "SELECT 2".to_string()]
        );
        assert!(parse_sql_script("\n-- only a comment\n").is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        assert!(read_sql_file("/no/such/dir/script.sql").await.is_err());
    }
}

#[cfg(test)]
mod statement_tests {
    use crate::sql::statement::split_header;
    use crate::sql::{DuplicateRows, S3LoadStatement, S3UnloadStatement, TextFormat};

    #[test]
    fn load_statement_with_defaults() {
        let statement = S3LoadStatement::new("landing", "in/users.csv", "users").header("id;name;email\r\n");
        assert_eq!(
            statement.to_string(),
            "LOAD DATA FROM S3 's3://landing/in/users.csv' IGNORE INTO TABLE users \
             CHARACTER SET utf8 FIELDS TERMINATED BY ';' LINES TERMINATED BY '\\n' \
             IGNORE 1 LINES (id,name,email);"
        );
    }

    #[test]
    fn load_statement_with_custom_format() {
        let format = TextFormat {
            fields_delimiter: ",".to_string(),
            lines_delimiter: "\r\n".to_string(),
            encoding: "latin1".to_string(),
        };
        let statement = S3LoadStatement::new("landing", "o'brien.csv", "people")
            .format(format)
            .header("a,b")
            .ignore_lines(0)
            .duplicates(DuplicateRows::Replace);
        assert_eq!(
            statement.to_string(),
            "LOAD DATA FROM S3 's3://landing/o\\'brien.csv' REPLACE INTO TABLE people \
             CHARACTER SET latin1 FIELDS TERMINATED BY ',' LINES TERMINATED BY '\\r\\n' \
             IGNORE 0 LINES (a,b);"
        );
    }

    #[test]
    fn load_statement_without_columns() {
        let statement = S3LoadStatement::new("b", "k", "t").columns(Vec::<String>::new());
        assert!(statement.to_string().ends_with("IGNORE 1 LINES;"));
    }

    #[test]
    fn unload_statement() {
        assert_eq!(
            S3UnloadStatement::new("exports", "2024/users", "users").to_string(),
            "SELECT * FROM users INTO OUTFILE S3 's3://exports/2024/users' \
             CHARACTER SET utf8 FIELDS TERMINATED BY ';' LINES TERMINATED BY '\\n' OVERWRITE ON;"
        );
    }

    #[test]
    fn header_splitting() {
        assert_eq!(split_header("\u{feff}id; name ;;x\n", ";"), vec!["id", "name", "x"]);
        assert!(split_header("", ";").is_empty());
    }
}
