//! Wire-level message payloads.
//!
//! Every field a push can carry is listed once in [`FIELDS`], together with
//! its wire name, the value the server assumes when it is missing, and the
//! value shown in reconstructed parameter lists. Both the payload mapper and
//! the parameter reconstructor walk this table in declaration order.

use crate::errors::{PushError, Result};
use crate::request::{DEFAULT_VOLUME, PushRequest};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// A field of a push that can appear on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Subtitle,
    Body,
    Sound,
    Url,
    Icon,
    Group,
    Badge,
    Level,
    Volume,
    Call,
    AutoCopy,
    Copy,
    IsArchive,
    Action,
    Image,
    Id,
}

/// Value used for display when a request leaves a field unset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayDefault {
    None,
    Literal(&'static str),
    /// The message body itself.
    Body,
}

/// One row of the field table.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub field: Field,
    pub wire_name: &'static str,
    /// Server-side default. A value equal to it is left off the wire.
    pub wire_default: Option<&'static str>,
    pub display_default: DisplayDefault,
}

const fn spec(field: Field, wire_name: &'static str) -> FieldSpec {
    FieldSpec {
        field,
        wire_name,
        wire_default: None,
        display_default: DisplayDefault::None,
    }
}

/// Sentinel sent for boolean switches such as `call` and `autoCopy`.
pub const SWITCH_ON: &str = "1";

/// Sentinel sent as `action` to suppress the tap action.
pub const ACTION_NONE: &str = "none";

const DEFAULT_VOLUME_TEXT: &str = "5";

pub const FIELDS: &[FieldSpec] = &[
    spec(Field::Title, "title"),
    spec(Field::Subtitle, "subtitle"),
    spec(Field::Body, "body"),
    spec(Field::Sound, "sound"),
    spec(Field::Url, "url"),
    spec(Field::Icon, "icon"),
    spec(Field::Group, "group"),
    spec(Field::Badge, "badge"),
    spec(Field::Level, "level"),
    FieldSpec {
        wire_default: Some(DEFAULT_VOLUME_TEXT),
        ..spec(Field::Volume, "volume")
    },
    spec(Field::Call, "call"),
    FieldSpec {
        display_default: DisplayDefault::Literal(SWITCH_ON),
        ..spec(Field::AutoCopy, "autoCopy")
    },
    FieldSpec {
        display_default: DisplayDefault::Body,
        ..spec(Field::Copy, "copy")
    },
    spec(Field::IsArchive, "isArchive"),
    spec(Field::Action, "action"),
    spec(Field::Image, "image"),
    spec(Field::Id, "id"),
];

// Keep the volume sentinel and its textual form in step.
const _: () = assert!(DEFAULT_VOLUME == 5);

impl Field {
    /// The request's own value for this field, before any omission rule.
    pub fn value(&self, request: &PushRequest) -> Option<JsonValue> {
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(JsonValue::from)
        };
        let switch = |on: bool, sentinel: &str| on.then(|| JsonValue::from(sentinel));

        match self {
            Field::Title => text(&request.title),
            Field::Subtitle => text(&request.subtitle),
            Field::Body => Some(JsonValue::String(request.message.clone())),
            Field::Sound => text(&request.sound),
            Field::Url => text(&request.url),
            Field::Icon => text(&request.icon),
            Field::Group => text(&request.group),
            Field::Badge => request.badge.map(JsonValue::from),
            Field::Level => request.level.map(|l| JsonValue::from(l.as_str())),
            Field::Volume => request.volume.map(|v| JsonValue::from(v.0)),
            Field::Call => switch(request.call, SWITCH_ON),
            Field::AutoCopy => switch(request.auto_copy, SWITCH_ON),
            Field::Copy => text(&request.copy),
            Field::IsArchive => switch(request.is_archive, SWITCH_ON),
            Field::Action => switch(request.no_action, ACTION_NONE),
            Field::Image => text(&request.image),
            Field::Id => Some(JsonValue::String(request.id.clone())),
        }
    }
}

/// Flattened field set placed on the wire, in field table order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MessagePayload {
    fields: IndexMap<String, JsonValue>,
}

impl MessagePayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.fields.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(JsonValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| PushError::PayloadSerialization(e.to_string()))
    }

    /// Field values as query pairs, skipping `exclude`.
    ///
    /// Arrays are comma-joined; every other value is stringified.
    pub fn query_pairs(&self, exclude: &[&str]) -> Vec<(String, String)> {
        self.fields
            .iter()
            .filter(|(key, _)| !exclude.contains(&key.as_str()))
            .filter_map(|(key, value)| stringify(value).map(|v| (key.clone(), v)))
            .collect()
    }
}

/// Render a JSON value the way it appears in a query string or parameter list.
pub fn stringify(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Array(items) => Some(
            items
                .iter()
                .filter_map(stringify)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

/// Map a logical request onto its wire field set.
///
/// Unset fields are dropped and fields equal to their server default are
/// omitted. Transport metadata (API URL, credentials, devices) never appears.
pub fn to_wire_payload(request: &PushRequest) -> MessagePayload {
    let mut payload = MessagePayload::new();

    for spec in FIELDS {
        let Some(value) = spec.field.value(request) else {
            continue;
        };
        if let Some(default) = spec.wire_default {
            if stringify(&value).as_deref() == Some(default) {
                continue;
            }
        }
        payload.insert(spec.wire_name, value);
    }

    payload
}
