// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::common::OobConfig;
use aws_config::meta::region::RegionProviderChain;
use aws_config::profile::ProfileFileRegionProvider;
use aws_config::{BehaviorVersion, ConfigLoader, Region, SdkConfig};
use serde::Deserialize;

/// The `[aws]` table of `OobConfig`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct AwsSettings {
    /// Named profile from `~/.aws/config`.
    pub profile: Option<String>,
    /// Overrides the profile's (or environment's) region.
    pub region: Option<String>,
    /// Alternate endpoint, e.g. LocalStack.
    pub endpoint_url: Option<String>,
}

impl AwsSettings {
    /// Reads the `[aws]` table, or defaults if it is absent or malformed.
    pub fn from_config(oob_config: &OobConfig) -> Self {
        match oob_config.section::<AwsSettings>("aws") {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e) => {
                if oob_config.debug() {
                    println!("AWS settings ignored: {e}");
                }
                Self::default()
            }
        }
    }
}

/// Create an AWS config loader with profile, region and endpoint.
pub fn create_aws_config_loader(oob_config: &OobConfig) -> ConfigLoader {
    let AwsSettings {
        profile,
        region,
        endpoint_url,
    } = AwsSettings::from_config(oob_config);
    let mut config_loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(profile_name) = profile {
        if oob_config.debug() {
            println!("AWS using profile name {profile_name}");
        }
        let profile_region = ProfileFileRegionProvider::builder()
            .profile_name(&profile_name)
            .build();
        let region = RegionProviderChain::first_try(region.map(Region::new)).or_else(profile_region);
        config_loader = config_loader.profile_name(&profile_name).region(region);
    } else if let Some(region) = region {
        config_loader = config_loader.region(Region::new(region));
    }
    if let Some(endpoint_url) = endpoint_url {
        if oob_config.debug() {
            println!("AWS using endpoint {endpoint_url}");
        }
        config_loader = config_loader.endpoint_url(endpoint_url);
    }
    config_loader
}

/// Load AWS configuration with profile, region and endpoint.
pub async fn load_aws_config(oob_config: &OobConfig) -> SdkConfig {
    create_aws_config_loader(oob_config).load().await
}
