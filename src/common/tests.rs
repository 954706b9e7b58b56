// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

#[cfg(all(test, feature = "toml"))]
mod config_tests {
    use crate::common::{Error, OobConfig};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct AwsSection {
        profile: Option<String>,
        region: Option<String>,
    }

    #[test]
    fn reads_sections() {
        let config = OobConfig::builder()
            .toml_str(
                r#"
                [aws]
                profile = "test_profile"
                "#,
            )
            .debug(true)
            .build()
            .expect("config_tests.toml");
        assert!(config.debug());
        let aws: Option<AwsSection> = config.section("aws").expect("aws section");
        assert_eq!(
            aws,
            Some(AwsSection {
                profile: Some("test_profile".to_string()),
                region: None,
            })
        );
        let missing: Option<AwsSection> = config.section("nope").expect("missing section");
        assert!(missing.is_none());
    }

    #[test]
    fn rejects_bad_toml() {
        let result = OobConfig::builder().toml_str("[aws\nprofile =").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn requires_a_source() {
        assert!(matches!(OobConfig::builder().build(), Err(Error::Config(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = OobConfig::builder()
            .toml_file("no-such-oob-config-file.toml")
            .build();
        assert!(matches!(result, Err(Error::Io(_, _))));
    }

    #[test]
    fn section_type_mismatch_is_a_config_error() {
        let config = OobConfig::builder()
            .toml_str("aws = 3")
            .build()
            .expect("config");
        let result: Result<Option<AwsSection>, Error> = config.section("aws");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
