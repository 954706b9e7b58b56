// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::{load_aws_config, Arn, MessageAttribute};
use crate::common::{Error, OobConfig};
use aws_sdk_sqs::types::{
    ChangeMessageVisibilityBatchRequestEntry, DeleteMessageBatchRequestEntry, Message,
    MessageSystemAttributeName, QueueAttributeName,
};
use aws_sdk_sqs::Client;
use std::collections::HashMap;

/// A convenient alias for SQS client so consuming code doesn't need to add it to `Cargo.toml`
pub type SqsClient = aws_sdk_sqs::Client;

/// SQS returns at most this many messages per receive call.
pub const SQS_MAX_RECEIVE: usize = 10;

/// Creates an SQS client.
pub async fn new_sqs_client(oob_config: &OobConfig) -> SqsClient {
    let aws_config = load_aws_config(oob_config).await;
    Client::new(&aws_config)
}

/// Queue URL returned by `GetQueueUrl`.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct QueueUrl(pub String);
crate::impl_wrapper_str!(QueueUrl);

/// Handle identifying one receipt of a message.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct ReceiptHandle(pub String);
crate::impl_wrapper_str!(ReceiptHandle);

/// An SQS queue with its URL resolved.
#[derive(Clone, Debug)]
pub struct SqsQueue {
    client: SqsClient,
    arn: Arn,
    url: QueueUrl,
}

impl SqsQueue {
    /// A queue identified by ARN, e.g. `arn:aws:sqs:eu-west-1:123456789012:jobs`.
    pub async fn from_arn(client: &SqsClient, arn: &str) -> Result<Self, Error> {
        let arn = arn.parse::<Arn>()?.expect_service("sqs")?;
        let url = resolve_queue_url(client, &arn.resource, &arn.account).await?;
        Ok(Self {
            client: client.clone(),
            arn,
            url,
        })
    }

    /// A queue identified by region, owning account and name.
    pub async fn new(client: &SqsClient, region: &str, account: &str, name: &str) -> Result<Self, Error> {
        Self::from_arn(client, &Arn::new("sqs", region, account, name).to_string()).await
    }

    /// A queue whose URL is already known. No remote call is made.
    pub fn with_url(client: &SqsClient, arn: Arn, url: QueueUrl) -> Self {
        Self {
            client: client.clone(),
            arn,
            url,
        }
    }

    /// Queue ARN.
    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.arn.resource
    }

    /// Queue URL.
    pub fn url(&self) -> &QueueUrl {
        &self.url
    }

    /// All queue attributes, keyed by attribute name (e.g. `ApproximateNumberOfMessages`).
    pub async fn attributes(&self) -> Result<HashMap<String, String>, Error> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(self.url.as_str())
            .attribute_names(QueueAttributeName::All)
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("get_queue_attributes({})", self.url)))?;
        Ok(output
            .attributes
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name.as_str().to_string(), value))
            .collect())
    }

    /// Approximate number of visible messages.
    pub async fn number_of_messages(&self) -> Result<usize, Error> {
        let attributes = self.attributes().await?;
        Ok(attributes
            .get(QueueAttributeName::ApproximateNumberOfMessages.as_str())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0))
    }

    /// Sends a message with optional attributes and delivery delay (seconds).
    pub async fn send_message(
        &self,
        body: &str,
        attributes: HashMap<String, MessageAttribute>,
        delay_seconds: Option<i32>,
    ) -> Result<SqsMessage, Error> {
        let mut message = SqsMessage::new(self.url.clone(), body);
        message.attributes = attributes;
        message.send(&self.client, delay_seconds).await?;
        Ok(message)
    }

    async fn receive(
        &self,
        max: usize,
        visibility_timeout: Option<i32>,
        wait_time_seconds: i32,
    ) -> Result<Vec<SqsMessage>, Error> {
        let max = i32::try_from(max.clamp(1, SQS_MAX_RECEIVE)).unwrap_or(1);
        let output = self
            .client
            .receive_message()
            .queue_url(self.url.as_str())
            .max_number_of_messages(max)
            .wait_time_seconds(wait_time_seconds)
            .set_visibility_timeout(visibility_timeout)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("receive_message({})", self.url)))?;
        Ok(output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|message| SqsMessage::from_received(self.url.clone(), message))
            .collect())
    }

    /// Receives one message, or `None` if the queue stayed empty for
    /// `wait_time_seconds`.
    pub async fn receive_message(
        &self,
        visibility_timeout: Option<i32>,
        wait_time_seconds: i32,
    ) -> Result<Option<SqsMessage>, Error> {
        Ok(self
            .receive(1, visibility_timeout, wait_time_seconds)
            .await?
            .into_iter()
            .next())
    }

    /// Receives up to `batch_size` messages in calls of at most ten, stopping
    /// early once the queue's approximate size has been received or a call
    /// returns nothing.
    pub async fn receive_message_batch(
        &self,
        batch_size: usize,
        visibility_timeout: Option<i32>,
        wait_time_seconds: i32,
    ) -> Result<Vec<SqsMessage>, Error> {
        let mut batch = ReceiveBatch::new(batch_size, self.number_of_messages().await?);
        while let Some(max) = batch.next_request() {
            batch.record(self.receive(max, visibility_timeout, wait_time_seconds).await?);
        }
        Ok(batch.into_messages())
    }

    /// Deletes a received message.
    pub async fn delete_message(&self, receipt_handle: &ReceiptHandle) -> Result<(), Error> {
        delete_message(&self.client, &self.url, receipt_handle).await
    }

    /// Deletes received messages, ten per call. Returns the receipt handles that failed.
    pub async fn delete_message_batch(
        &self,
        receipt_handles: &[ReceiptHandle],
    ) -> Result<Vec<ReceiptHandle>, Error> {
        let mut failed = Vec::new();
        for chunk in receipt_handles.chunks(SQS_MAX_RECEIVE) {
            let entries = chunk
                .iter()
                .enumerate()
                .map(|(i, handle)| {
                    DeleteMessageBatchRequestEntry::builder()
                        .id(i.to_string())
                        .receipt_handle(handle.as_str())
                        .build()
                        .map_err(|e| Error::Anyhow(e.into(), "delete_message_batch_entry".to_string()))
                })
                .collect::<Result<Vec<_>, Error>>()?;
            let output = self
                .client
                .delete_message_batch()
                .queue_url(self.url.as_str())
                .set_entries(Some(entries))
                .send()
                .await
                .map_err(|e| Error::Anyhow(e.into(), format!("delete_message_batch({})", self.url)))?;
            failed.extend(failed_handles(chunk, output.failed.iter().map(|f| f.id.as_str())));
        }
        Ok(failed)
    }

    /// Empties the queue.
    pub async fn purge(&self) -> Result<(), Error> {
        self.client
            .purge_queue()
            .queue_url(self.url.as_str())
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("purge_queue({})", self.url)))?;
        Ok(())
    }

    /// Changes how long a received message stays invisible.
    pub async fn change_message_visibility(
        &self,
        receipt_handle: &ReceiptHandle,
        visibility_timeout: i32,
    ) -> Result<(), Error> {
        change_visibility(&self.client, &self.url, receipt_handle, visibility_timeout).await
    }

    /// Changes the visibility of received messages, ten per call. Returns the
    /// receipt handles that failed.
    pub async fn change_message_visibility_batch(
        &self,
        receipt_handles: &[ReceiptHandle],
        visibility_timeout: i32,
    ) -> Result<Vec<ReceiptHandle>, Error> {
        let mut failed = Vec::new();
        for chunk in receipt_handles.chunks(SQS_MAX_RECEIVE) {
            let entries = chunk
                .iter()
                .enumerate()
                .map(|(i, handle)| {
                    ChangeMessageVisibilityBatchRequestEntry::builder()
                        .id(i.to_string())
                        .receipt_handle(handle.as_str())
                        .visibility_timeout(visibility_timeout)
                        .build()
                        .map_err(|e| Error::Anyhow(e.into(), "change_visibility_batch_entry".to_string()))
                })
                .collect::<Result<Vec<_>, Error>>()?;
            let output = self
                .client
                .change_message_visibility_batch()
                .queue_url(self.url.as_str())
                .set_entries(Some(entries))
                .send()
                .await
                .map_err(|e| {
                    Error::Anyhow(e.into(), format!("change_message_visibility_batch({})", self.url))
                })?;
            failed.extend(failed_handles(chunk, output.failed.iter().map(|f| f.id.as_str())));
        }
        Ok(failed)
    }
}

/// A message to send, or one received from a queue.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SqsMessage {
    /// URL of the queue the message belongs to.
    pub queue_url: QueueUrl,
    /// Message body.
    pub body: String,
    /// Typed message attributes.
    pub attributes: HashMap<String, MessageAttribute>,
    /// System attributes such as `ApproximateReceiveCount` (received messages only).
    pub system_attributes: HashMap<String, String>,
    /// FIFO queues only.
    pub group_id: Option<String>,
    /// Set once sent or received.
    pub id: Option<String>,
    /// MD5 of the body, set once sent or received.
    pub body_md5: Option<String>,
    /// Received messages only.
    pub receipt_handle: Option<ReceiptHandle>,
    /// FIFO queues only, set once sent.
    pub sequence_number: Option<String>,
}

impl SqsMessage {
    /// A new, unsent message.
    pub fn new(queue_url: QueueUrl, body: &str) -> Self {
        Self {
            queue_url,
            body: body.to_string(),
            ..Default::default()
        }
    }

    /// An unsent copy of `message` (body and attributes) addressed to another queue.
    pub fn duplicate(queue_url: QueueUrl, message: &SqsMessage) -> Self {
        Self {
            queue_url,
            body: message.body.clone(),
            attributes: message.attributes.clone(),
            group_id: message.group_id.clone(),
            ..Default::default()
        }
    }

    pub(crate) fn from_received(queue_url: QueueUrl, message: Message) -> Self {
        let attributes = message
            .message_attributes
            .unwrap_or_default()
            .iter()
            .filter_map(|(name, value)| {
                MessageAttribute::from_sqs(value).map(|attribute| (name.clone(), attribute))
            })
            .collect();
        let system_attributes = message
            .attributes
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name.as_str().to_string(), value))
            .collect();
        Self {
            queue_url,
            body: message.body.unwrap_or_default(),
            attributes,
            system_attributes,
            group_id: None,
            id: message.message_id,
            body_md5: message.md5_of_body,
            receipt_handle: message.receipt_handle.map(ReceiptHandle),
            sequence_number: None,
        }
    }

    /// Sends the message, recording the id, MD5 and sequence number SQS assigns.
    pub async fn send(&mut self, client: &SqsClient, delay_seconds: Option<i32>) -> Result<(), Error> {
        let attributes = self
            .attributes
            .iter()
            .map(|(name, attribute)| Ok((name.clone(), attribute.to_sqs(name)?)))
            .collect::<Result<HashMap<_, _>, Error>>()?;
        let output = client
            .send_message()
            .queue_url(self.queue_url.as_str())
            .message_body(&self.body)
            .set_message_attributes((!attributes.is_empty()).then_some(attributes))
            .set_message_group_id(self.group_id.clone())
            .set_delay_seconds(delay_seconds.filter(|&delay| delay > 0))
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("send_message({})", self.queue_url)))?;
        self.id = output.message_id;
        self.body_md5 = output.md5_of_message_body;
        self.sequence_number = output.sequence_number;
        Ok(())
    }

    fn receipt_handle(&self) -> Result<&ReceiptHandle, Error> {
        self.receipt_handle
            .as_ref()
            .ok_or_else(|| Error::config("message has not been received"))
    }

    /// Deletes the received message from its queue.
    pub async fn delete(&self, client: &SqsClient) -> Result<(), Error> {
        delete_message(client, &self.queue_url, self.receipt_handle()?).await
    }

    /// Changes how long the received message stays invisible.
    pub async fn change_visibility(&self, client: &SqsClient, visibility_timeout: i32) -> Result<(), Error> {
        change_visibility(client, &self.queue_url, self.receipt_handle()?, visibility_timeout).await
    }
}

async fn resolve_queue_url(client: &SqsClient, name: &str, account: &str) -> Result<QueueUrl, Error> {
    let output = client
        .get_queue_url()
        .queue_name(name)
        .set_queue_owner_aws_account_id((!account.is_empty()).then(|| account.to_string()))
        .send()
        .await
        .map_err(|e| Error::Anyhow(e.into(), format!("get_queue_url({name})")))?;
    output
        .queue_url
        .map(QueueUrl)
        .ok_or_else(|| Error::String(format!("get_queue_url({name}): no URL returned")))
}

async fn delete_message(client: &SqsClient, url: &QueueUrl, receipt_handle: &ReceiptHandle) -> Result<(), Error> {
    client
        .delete_message()
        .queue_url(url.as_str())
        .receipt_handle(receipt_handle.as_str())
        .send()
        .await
        .map_err(|e| Error::Anyhow(e.into(), format!("delete_message({url})")))?;
    Ok(())
}

async fn change_visibility(
    client: &SqsClient,
    url: &QueueUrl,
    receipt_handle: &ReceiptHandle,
    visibility_timeout: i32,
) -> Result<(), Error> {
    client
        .change_message_visibility()
        .queue_url(url.as_str())
        .receipt_handle(receipt_handle.as_str())
        .visibility_timeout(visibility_timeout)
        .send()
        .await
        .map_err(|e| Error::Anyhow(e.into(), format!("change_message_visibility({url})")))?;
    Ok(())
}

/// Progress of `SqsQueue::receive_message_batch`.
#[derive(Debug)]
pub(crate) struct ReceiveBatch {
    target: usize,
    messages: Vec<SqsMessage>,
    drained: bool,
}

impl ReceiveBatch {
    /// Aim for `batch_size` messages, but no more than the queue holds.
    pub(crate) fn new(batch_size: usize, approximate_size: usize) -> Self {
        let target = batch_size.min(approximate_size);
        Self {
            target,
            messages: Vec::with_capacity(target),
            drained: false,
        }
    }

    /// Size of the next receive call, or `None` once the batch is done.
    pub(crate) fn next_request(&self) -> Option<usize> {
        if self.drained || self.messages.len() >= self.target {
            None
        } else {
            Some((self.target - self.messages.len()).min(SQS_MAX_RECEIVE))
        }
    }

    /// An empty receive means the queue is drained.
    pub(crate) fn record(&mut self, received: Vec<SqsMessage>) {
        if received.is_empty() {
            self.drained = true;
        }
        let room = self.target.saturating_sub(self.messages.len());
        self.messages.extend(received.into_iter().take(room));
    }

    pub(crate) fn into_messages(self) -> Vec<SqsMessage> {
        self.messages
    }
}

/// Maps batch entry ids (indices into `chunk`) back to receipt handles.
pub(crate) fn failed_handles<'a>(
    chunk: &[ReceiptHandle],
    failed_ids: impl Iterator<Item = &'a str>,
) -> Vec<ReceiptHandle> {
    failed_ids
        .filter_map(|id| id.parse::<usize>().ok())
        .filter_map(|i| chunk.get(i).cloned())
        .collect()
}
