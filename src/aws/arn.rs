// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::common::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// An Amazon Resource Name, `arn:partition:service:region:account:resource`.
///
/// The resource part may itself contain colons (e.g. `cluster:name`).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Arn {
    /// Usually `aws`.
    pub partition: String,
    /// E.g. `s3`, `sqs`, `sns`.
    pub service: String,
    /// Empty for global services such as S3.
    pub region: String,
    /// Empty for S3 buckets.
    pub account: String,
    /// Service specific resource.
    pub resource: String,
}

impl Arn {
    /// Creates an ARN in the `aws` partition.
    pub fn new(service: &str, region: &str, account: &str, resource: &str) -> Self {
        Self {
            partition: "aws".to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account: account.to_string(),
            resource: resource.to_string(),
        }
    }

    /// Fails unless this ARN belongs to `service`.
    pub fn expect_service(self, service: &str) -> Result<Self, Error> {
        if self.service == service {
            Ok(self)
        } else {
            Err(Error::config(format!("{self}: not an {service} ARN")))
        }
    }
}

impl FromStr for Arn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(6, ':');
        match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some("arn"), Some(partition), Some(service), Some(region), Some(account), Some(resource))
                if !partition.is_empty() && !service.is_empty() && !resource.is_empty() =>
            {
                Ok(Self {
                    partition: partition.to_string(),
                    service: service.to_string(),
                    region: region.to_string(),
                    account: account.to_string(),
                    resource: resource.to_string(),
                })
            }
            _ => Err(Error::config(format!("{s}: invalid ARN"))),
        }
    }
}

impl Display for Arn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}
