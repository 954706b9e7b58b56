// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::{load_aws_config, Arn, MessageAttribute};
use crate::common::{Error, OobConfig};
use aws_sdk_sns::Client;
use std::collections::HashMap;

/// A convenient alias for SNS client so consuming code doesn't need to add it to `Cargo.toml`
pub type SnsClient = aws_sdk_sns::Client;

/// Creates an SNS client.
pub async fn new_sns_client(oob_config: &OobConfig) -> SnsClient {
    let aws_config = load_aws_config(oob_config).await;
    Client::new(&aws_config)
}

/// How SNS interprets a message body.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MessageStructure {
    /// The same text goes to every protocol.
    #[default]
    Text,
    /// A JSON object with one body per protocol and a mandatory `default` key.
    Json,
}

/// A message to publish.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnsMessage {
    /// Message body.
    pub body: String,
    /// Text or per-protocol JSON.
    pub structure: MessageStructure,
    /// Typed message attributes.
    pub attributes: HashMap<String, MessageAttribute>,
    /// Set once published.
    pub id: Option<String>,
}

impl SnsMessage {
    /// A plain text message.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    /// A per-protocol message, e.g. `{"default": "hi", "sms": "hi!"}`.
    pub fn json(bodies: &serde_json::Value) -> Result<Self, Error> {
        if bodies.get("default").and_then(serde_json::Value::as_str).is_none() {
            return Err(Error::config("JSON message needs a string \"default\" body"));
        }
        Ok(Self {
            body: serde_json::to_string(bodies)?,
            structure: MessageStructure::Json,
            ..Default::default()
        })
    }

    /// Adds an attribute.
    pub fn attribute(mut self, name: &str, value: impl Into<MessageAttribute>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }
}

/// Where a message is published.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SnsDestination {
    /// A topic.
    Topic(Arn),
    /// An SMS phone number in E.164 format.
    Phone(String),
}

/// A topic or phone number plus an optional subject.
#[derive(Clone, Debug)]
pub struct SnsTopic {
    client: SnsClient,
    destination: Option<SnsDestination>,
    subject: Option<String>,
}

impl SnsTopic {
    /// A topic identified by ARN.
    pub fn from_arn(client: &SnsClient, arn: &str) -> Result<Self, Error> {
        let arn = arn.parse::<Arn>()?.expect_service("sns")?;
        Ok(Self {
            client: client.clone(),
            destination: Some(SnsDestination::Topic(arn)),
            subject: None,
        })
    }

    /// SMS to a phone number.
    pub fn phone(client: &SnsClient, phone: &str) -> Self {
        Self {
            client: client.clone(),
            destination: Some(SnsDestination::Phone(phone.to_string())),
            subject: None,
        }
    }

    /// Neither topic nor phone number; publishing fails until one is set.
    pub fn unaddressed(client: &SnsClient) -> Self {
        Self {
            client: client.clone(),
            destination: None,
            subject: None,
        }
    }

    /// Sets the destination.
    pub fn destination(mut self, destination: SnsDestination) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Sets the subject used by email subscriptions.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Current destination.
    pub fn get_destination(&self) -> Option<&SnsDestination> {
        self.destination.as_ref()
    }

    /// Publishes `message`, recording and returning the message id.
    pub async fn publish(&self, message: &mut SnsMessage) -> Result<String, Error> {
        let (topic_arn, phone_number) = match &self.destination {
            Some(SnsDestination::Topic(arn)) => (Some(arn.to_string()), None),
            Some(SnsDestination::Phone(phone)) => (None, Some(phone.clone())),
            None => {
                return Err(Error::config(
                    "a topic ARN or phone number is required to publish",
                ))
            }
        };
        let attributes = message
            .attributes
            .iter()
            .map(|(name, attribute)| Ok((name.clone(), attribute.to_sns(name)?)))
            .collect::<Result<HashMap<_, _>, Error>>()?;
        let target = topic_arn.as_deref().or(phone_number.as_deref()).unwrap_or_default().to_string();
        let output = self
            .client
            .publish()
            .message(&message.body)
            .set_subject(self.subject.clone())
            .set_topic_arn(topic_arn)
            .set_phone_number(phone_number)
            .set_message_attributes((!attributes.is_empty()).then_some(attributes))
            .set_message_structure(
                (message.structure == MessageStructure::Json).then(|| "json".to_string()),
            )
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("publish({target})")))?;
        let id = output
            .message_id
            .ok_or_else(|| Error::String(format!("publish({target}): no message id returned")))?;
        message.id = Some(id.clone());
        Ok(id)
    }
}
