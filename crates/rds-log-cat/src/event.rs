// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The S3 notification payload that triggers an invocation.
//!
//! Only the fields needed to locate each object are modelled; everything
//! else in the notification is ignored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TriggerEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<Notification>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Notification {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct S3Object {
    /// Object key as sent by S3, i.e. form-urlencoded.
    pub key: String,
}

/// A decoded (bucket, key) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

impl TriggerEvent {
    pub fn from_value(value: serde_json::Value) -> Result<Self, PipelineError> {
        serde_json::from_value(value).map_err(|e| PipelineError::InvalidEvent(e.to_string()))
    }

    pub fn from_slice(payload: &[u8]) -> Result<Self, PipelineError> {
        serde_json::from_slice(payload).map_err(|e| PipelineError::InvalidEvent(e.to_string()))
    }

    /// One location per notification, in payload order.
    pub fn objects(&self) -> impl Iterator<Item = Result<ObjectLocation, PipelineError>> + '_ {
        self.records.iter().map(|notification| {
            Ok(ObjectLocation {
                bucket: notification.s3.bucket.name.clone(),
                key: decode_key(&notification.s3.object.key)?,
            })
        })
    }
}

/// Decodes an S3 event key: `+` is a space, then percent escapes as UTF-8.
pub fn decode_key(raw: &str) -> Result<String, PipelineError> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|key| key.into_owned())
        .map_err(|e| PipelineError::InvalidEvent(format!("object key '{raw}' is not valid UTF-8: {e}")))
}
