// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use crate::common::Error;

/// A convenient alias for SQS message attributes so consuming code doesn't need to add it to `Cargo.toml`
pub type SqsAttributeValue = aws_sdk_sqs::types::MessageAttributeValue;

/// A convenient alias for SNS message attributes so consuming code doesn't need to add it to `Cargo.toml`
pub type SnsAttributeValue = aws_sdk_sns::types::MessageAttributeValue;

/// A typed SQS or SNS message attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum MessageAttribute {
    /// `String` data type.
    String(String),
    /// `Number` data type, kept in its decimal text form.
    Number(String),
    /// `Binary` data type.
    Binary(Vec<u8>),
}

impl MessageAttribute {
    /// The AWS data type name.
    pub fn data_type(&self) -> &'static str {
        match self {
            MessageAttribute::String(_) => "String",
            MessageAttribute::Number(_) => "Number",
            MessageAttribute::Binary(_) => "Binary",
        }
    }

    fn validate(&self, name: &str) -> Result<(), Error> {
        match self {
            MessageAttribute::Number(n) if !n.parse::<f64>().map_or(false, f64::is_finite) => Err(
                Error::config(format!("attribute {name}: {n} is not a finite number")),
            ),
            _ => Ok(()),
        }
    }

    /// Converts to an SQS attribute value.
    pub fn to_sqs(&self, name: &str) -> Result<SqsAttributeValue, Error> {
        self.validate(name)?;
        let builder = SqsAttributeValue::builder().data_type(self.data_type());
        let builder = match self {
            MessageAttribute::String(s) | MessageAttribute::Number(s) => builder.string_value(s),
            MessageAttribute::Binary(b) => {
                builder.binary_value(aws_sdk_sqs::primitives::Blob::new(b.clone()))
            }
        };
        builder
            .build()
            .map_err(|e| Error::Anyhow(e.into(), format!("sqs_attribute({name})")))
    }

    /// Converts to an SNS attribute value.
    pub fn to_sns(&self, name: &str) -> Result<SnsAttributeValue, Error> {
        self.validate(name)?;
        let builder = SnsAttributeValue::builder().data_type(self.data_type());
        let builder = match self {
            MessageAttribute::String(s) | MessageAttribute::Number(s) => builder.string_value(s),
            MessageAttribute::Binary(b) => {
                builder.binary_value(aws_sdk_sns::primitives::Blob::new(b.clone()))
            }
        };
        builder
            .build()
            .map_err(|e| Error::Anyhow(e.into(), format!("sns_attribute({name})")))
    }

    /// Converts a received SQS attribute value. Custom type suffixes such as
    /// `Number.float` are accepted.
    pub fn from_sqs(value: &SqsAttributeValue) -> Option<Self> {
        let data_type = value.data_type.as_str();
        if data_type.starts_with("Binary") {
            value
                .binary_value
                .as_ref()
                .map(|b| MessageAttribute::Binary(b.as_ref().to_vec()))
        } else if data_type.starts_with("Number") {
            value.string_value.clone().map(MessageAttribute::Number)
        } else if data_type.starts_with("String") {
            value.string_value.clone().map(MessageAttribute::String)
        } else {
            None
        }
    }
}

impl From<&str> for MessageAttribute {
    fn from(s: &str) -> Self {
        MessageAttribute::String(s.to_string())
    }
}

impl From<String> for MessageAttribute {
    fn from(s: String) -> Self {
        MessageAttribute::String(s)
    }
}

impl From<i64> for MessageAttribute {
    fn from(n: i64) -> Self {
        MessageAttribute::Number(n.to_string())
    }
}

impl From<u64> for MessageAttribute {
    fn from(n: u64) -> Self {
        MessageAttribute::Number(n.to_string())
    }
}

impl From<f64> for MessageAttribute {
    fn from(n: f64) -> Self {
        MessageAttribute::Number(n.to_string())
    }
}

impl From<Vec<u8>> for MessageAttribute {
    fn from(b: Vec<u8>) -> Self {
        MessageAttribute::Binary(b)
    }
}

impl From<&[u8]> for MessageAttribute {
    fn from(b: &[u8]) -> Self {
        MessageAttribute::Binary(b.to_vec())
    }
}
