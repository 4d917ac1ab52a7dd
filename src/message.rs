//! JSON messages exchanged with a settings panel.
//!
//! Inbound messages look like `{"command": "addFilter", "payload": {...}}`;
//! the outbound update is flat: `{"command": "update", "groups": [...], ...}`.

use crate::core::intent::ToggleField;
use crate::core::model::{FilterGroup, Range};
use crate::highlight::MatchCounts;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "camelCase")]
pub enum InboundMessage {
    WebviewReady,
    UpdateFilter {
        id: String,
        field: String,
        value: Value,
    },
    UpdateGroup {
        name: String,
        enabled: bool,
    },
    UpdateGroupName {
        #[serde(rename = "oldName")]
        old_name: String,
        #[serde(rename = "newName")]
        new_name: String,
    },
    AddFilter {
        #[serde(rename = "groupName")]
        group_name: String,
    },
    AddGroup,
    DeleteGroup {
        #[serde(rename = "groupName")]
        group_name: String,
    },
    #[serde(rename = "toggleFField")]
    ToggleFilterField {
        #[serde(rename = "filterId")]
        filter_id: String,
        field: ToggleField,
    },
    DeleteFilter {
        #[serde(rename = "filterId")]
        filter_id: String,
    },
    MoveFilter {
        #[serde(rename = "filterId")]
        filter_id: String,
        #[serde(rename = "targetGroupName")]
        target_group_name: String,
    },
    UpdateActiveRange {
        #[serde(rename = "activeRangeId")]
        active_range_id: String,
    },
    AddRange {
        start: i64,
        end: i64,
    },
    DeleteRange {
        #[serde(rename = "rangeId")]
        range_id: String,
    },
    RefreshView,
    ExportConfig,
    ImportConfig,
}

impl InboundMessage {
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum OutboundMessage {
    Update {
        groups: Vec<FilterGroup>,
        ranges: Vec<Range>,
        #[serde(rename = "activeRangeId")]
        active_range_id: String,
        #[serde(rename = "matchCounts")]
        match_counts: MatchCounts,
    },
}

impl OutboundMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
