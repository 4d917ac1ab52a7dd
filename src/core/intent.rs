//! Configuration updates as data.
//!
//! Every UI command becomes an [`Intent`]; [`Configuration::apply`] turns a
//! snapshot plus an intent into the next snapshot, or rejects the intent and
//! leaves the snapshot untouched.

use super::model::{Configuration, Filter, FilterGroup, Range, DEFAULT_RANGE_ID};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Boolean filter fields that can be flipped in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToggleField {
    Enabled,
    Regex,
    CaseSensitive,
    Bold,
    Italic,
    HighlightWholeLine,
}

/// A typed assignment to one filter field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterUpdate {
    Pattern(String),
    Foreground(String),
    Background(String),
    Flag(ToggleField, bool),
}

impl FilterUpdate {
    /// Decode the loosely typed `{field, value}` pair sent by a settings UI.
    pub fn from_field(field: &str, value: &Value) -> Result<Self, ConfigError> {
        let text = || {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ConfigError::FieldType {
                    field: field.to_string(),
                    expected: "string",
                })
        };
        let flag = |which: ToggleField| {
            value
                .as_bool()
                .map(|b| FilterUpdate::Flag(which, b))
                .ok_or_else(|| ConfigError::FieldType {
                    field: field.to_string(),
                    expected: "boolean",
                })
        };
        match field {
            "id" => Err(ConfigError::ImmutableField(field.to_string())),
            "pattern" => text().map(FilterUpdate::Pattern),
            "foreground" => text().map(FilterUpdate::Foreground),
            "background" => text().map(FilterUpdate::Background),
            "enabled" => flag(ToggleField::Enabled),
            "regex" => flag(ToggleField::Regex),
            "caseSensitive" => flag(ToggleField::CaseSensitive),
            "bold" => flag(ToggleField::Bold),
            "italic" => flag(ToggleField::Italic),
            "highlightWholeLine" => flag(ToggleField::HighlightWholeLine),
            other => Err(ConfigError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    UpdateFilterField { id: String, update: FilterUpdate },
    ToggleFilterField { id: String, field: ToggleField },
    SetGroupEnabled { name: String, enabled: bool },
    RenameGroup { old_name: String, new_name: String },
    AddFilter { group: String, filter: Filter },
    AddGroup { name: String },
    DeleteGroup { name: String },
    DeleteFilter { id: String },
    MoveFilter { id: String, target_group: String },
    SetActiveRange { id: String },
    AddRange { range: Range },
    DeleteRange { id: String },
    ReplaceGroups { groups: Vec<FilterGroup> },
}

fn flag_mut(filter: &mut Filter, field: ToggleField) -> &mut bool {
    match field {
        ToggleField::Enabled => &mut filter.enabled,
        ToggleField::Regex => &mut filter.regex,
        ToggleField::CaseSensitive => &mut filter.case_sensitive,
        ToggleField::Bold => &mut filter.bold,
        ToggleField::Italic => &mut filter.italic,
        ToggleField::HighlightWholeLine => &mut filter.highlight_whole_line,
    }
}

/// Group names and filter ids must both be unique.
pub fn validate_groups(groups: &[FilterGroup]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    let mut ids = HashSet::new();
    for group in groups {
        if group.name.trim().is_empty() {
            return Err(ConfigError::EmptyGroupName);
        }
        if !names.insert(group.name.as_str()) {
            return Err(ConfigError::DuplicateGroup(group.name.clone()));
        }
        for filter in &group.filters {
            if !ids.insert(filter.id.as_str()) {
                return Err(ConfigError::DuplicateFilterId(filter.id.clone()));
            }
        }
    }
    Ok(())
}

impl Configuration {
    pub fn apply(&self, intent: Intent) -> Result<Configuration, ConfigError> {
        let mut next = self.clone();
        match intent {
            Intent::UpdateFilterField { id, update } => {
                let filter = next
                    .filter_mut(&id)
                    .ok_or(ConfigError::UnknownFilter(id))?;
                match update {
                    FilterUpdate::Pattern(p) => filter.pattern = p,
                    FilterUpdate::Foreground(c) => filter.foreground = c,
                    FilterUpdate::Background(c) => filter.background = c,
                    FilterUpdate::Flag(field, value) => *flag_mut(filter, field) = value,
                }
            }
            Intent::ToggleFilterField { id, field } => {
                let filter = next
                    .filter_mut(&id)
                    .ok_or(ConfigError::UnknownFilter(id))?;
                let flag = flag_mut(filter, field);
                *flag = !*flag;
            }
            Intent::SetGroupEnabled { name, enabled } => {
                next.group_mut(&name)
                    .ok_or(ConfigError::UnknownGroup(name))?
                    .enabled = enabled;
            }
            Intent::RenameGroup { old_name, new_name } => {
                let new_name = new_name.trim().to_string();
                if new_name.is_empty() {
                    return Err(ConfigError::EmptyGroupName);
                }
                if new_name != old_name && next.find_group(&new_name).is_some() {
                    return Err(ConfigError::DuplicateGroup(new_name));
                }
                next.group_mut(&old_name)
                    .ok_or(ConfigError::UnknownGroup(old_name))?
                    .name = new_name;
            }
            Intent::AddFilter { group, filter } => {
                if next.find_filter(&filter.id).is_some() {
                    return Err(ConfigError::DuplicateFilterId(filter.id));
                }
                next.group_mut(&group)
                    .ok_or(ConfigError::UnknownGroup(group))?
                    .filters
                    .push(filter);
            }
            Intent::AddGroup { name } => {
                if name.trim().is_empty() {
                    return Err(ConfigError::EmptyGroupName);
                }
                if next.find_group(&name).is_some() {
                    return Err(ConfigError::DuplicateGroup(name));
                }
                next.groups.push(FilterGroup::new(name));
            }
            Intent::DeleteGroup { name } => {
                let before = next.groups.len();
                next.groups.retain(|g| g.name != name);
                if next.groups.len() == before {
                    return Err(ConfigError::UnknownGroup(name));
                }
            }
            Intent::DeleteFilter { id } => {
                let mut removed = false;
                for group in &mut next.groups {
                    let before = group.filters.len();
                    group.filters.retain(|f| f.id != id);
                    removed |= group.filters.len() != before;
                }
                if !removed {
                    return Err(ConfigError::UnknownFilter(id));
                }
            }
            Intent::MoveFilter { id, target_group } => {
                if next.find_group(&target_group).is_none() {
                    return Err(ConfigError::UnknownGroup(target_group));
                }
                let (gi, fi) = next
                    .groups
                    .iter()
                    .enumerate()
                    .find_map(|(gi, g)| g.filters.iter().position(|f| f.id == id).map(|fi| (gi, fi)))
                    .ok_or(ConfigError::UnknownFilter(id))?;
                let filter = next.groups[gi].filters.remove(fi);
                if let Some(target) = next.group_mut(&target_group) {
                    target.filters.push(filter);
                }
            }
            Intent::SetActiveRange { id } => {
                next.active_range_id = id;
            }
            Intent::AddRange { range } => {
                if range.name.trim().is_empty() {
                    return Err(ConfigError::EmptyRangeName);
                }
                if !Range::is_valid_bounds(range.start, range.end) {
                    return Err(ConfigError::InvalidRange {
                        start: range.start,
                        end: range.end,
                    });
                }
                if range.id == DEFAULT_RANGE_ID || next.find_range(&range.id).is_some() {
                    return Err(ConfigError::DuplicateRange(range.id));
                }
                next.ranges.push(range);
            }
            Intent::DeleteRange { id } => {
                if id == DEFAULT_RANGE_ID {
                    return Err(ConfigError::DefaultRange);
                }
                let before = next.ranges.len();
                next.ranges.retain(|r| r.id != id);
                if next.ranges.len() == before {
                    return Err(ConfigError::UnknownRange(id));
                }
                if next.active_range_id == id {
                    next.active_range_id = DEFAULT_RANGE_ID.to_string();
                }
            }
            Intent::ReplaceGroups { groups } => {
                validate_groups(&groups)?;
                next.groups = groups;
            }
        }
        Ok(next)
    }
}
