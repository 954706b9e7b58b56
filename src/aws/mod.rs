// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

/// Amazon Resource Names.
mod arn;
/// Typed SQS and SNS message attributes.
mod attribute;
/// Shared AWS SDK configuration.
mod config;
/// A wrapper around S3 client.
mod s3;
/// A wrapper around SNS client.
mod sns;
/// A wrapper around SQS client.
mod sqs;

pub use crate::aws::arn::Arn;
pub use crate::aws::attribute::{MessageAttribute, SnsAttributeValue, SqsAttributeValue};
pub use crate::aws::config::{create_aws_config_loader, load_aws_config, AwsSettings};
pub use crate::aws::s3::{
    new_s3_client, S3Bucket, S3Client, S3DeleteSummary, S3KeyLister, S3Object,
    S3ObjectAttributes,
};
pub use crate::aws::sns::{
    new_sns_client, MessageStructure, SnsClient, SnsDestination, SnsMessage, SnsTopic,
};
pub use crate::aws::sqs::{
    new_sqs_client, QueueUrl, ReceiptHandle, SqsClient, SqsMessage, SqsQueue, SQS_MAX_RECEIVE,
};
