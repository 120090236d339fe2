//! Key-Space Convention
//!
//! Cache keys have the shape `<entity>_<scope>_<filters>`, where `<filters>`
//! is the filter object serialized as JSON with object keys sorted at every
//! depth, or `all` when there are no filters. Identical queries therefore
//! always produce byte-identical keys, and `^<entity>_` selects every cached
//! variant of one entity.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder for queries without filters.
pub const ALL: &str = "all";

// == Entity ==
/// Cached query families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Projects,
    Clients,
    DashboardStats,
    Analytics,
    Transactions,
    TeamMembers,
}

impl Entity {
    pub const ALL: [Entity; 6] = [
        Entity::Projects,
        Entity::Clients,
        Entity::DashboardStats,
        Entity::Analytics,
        Entity::Transactions,
        Entity::TeamMembers,
    ];

    /// Key prefix, also used as the entity's own dependency tag.
    pub fn name(self) -> &'static str {
        match self {
            Entity::Projects => "projects",
            Entity::Clients => "clients",
            Entity::DashboardStats => "dashboard_stats",
            Entity::Analytics => "analytics",
            Entity::Transactions => "transactions",
            Entity::TeamMembers => "team_members",
        }
    }

    /// Matches every key built for this entity.
    pub fn key_pattern(self) -> Regex {
        // Entity names are plain identifiers; nothing to escape
        Regex::new(&format!("^{}_", self.name()))
            .expect("entity names are valid regex literals")
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// == Key Construction ==
/// Builds the cache key for `entity` queried in `scope` with `filters`.
///
/// `None`, `null` and empty objects all mean "no filters".
pub fn cache_key(entity: Entity, scope: &str, filters: Option<&Value>) -> String {
    let filters = match filters {
        None | Some(Value::Null) => ALL.to_string(),
        Some(Value::Object(map)) if map.is_empty() => ALL.to_string(),
        Some(value) => canonical_json(value),
    };
    format!("{}_{}_{}", entity.name(), scope, filters)
}

/// Serializes `value` as compact JSON with object keys sorted recursively.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Serializing a string cannot fail
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

// == Named Keys ==
/// Key builders for the studio's common queries.
pub struct CacheKeys;

impl CacheKeys {
    pub fn projects(user_id: &str, filters: Option<&Value>) -> String {
        cache_key(Entity::Projects, user_id, filters)
    }

    pub fn clients(user_id: &str) -> String {
        cache_key(Entity::Clients, user_id, None)
    }

    pub fn dashboard_stats(user_id: &str) -> String {
        cache_key(Entity::DashboardStats, user_id, None)
    }

    pub fn analytics(user_id: &str, timeframe: &str, project_type: Option<&str>) -> String {
        let filters = serde_json::json!({
            "timeframe": timeframe,
            "projectType": project_type.unwrap_or(ALL),
        });
        cache_key(Entity::Analytics, user_id, Some(&filters))
    }

    pub fn transactions(user_id: &str, date_range: Option<&str>) -> String {
        let filters = date_range.map(|range| serde_json::json!({ "dateRange": range }));
        cache_key(Entity::Transactions, user_id, filters.as_ref())
    }

    pub fn team_members(user_id: &str) -> String {
        cache_key(Entity::TeamMembers, user_id, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_without_filters() {
        assert_eq!(cache_key(Entity::Projects, "u1", None), "projects_u1_all");
        assert_eq!(
            cache_key(Entity::Projects, "u1", Some(&Value::Null)),
            "projects_u1_all"
        );
        assert_eq!(
            cache_key(Entity::Projects, "u1", Some(&json!({}))),
            "projects_u1_all"
        );
    }

    #[test]
    fn test_filter_order_does_not_matter() {
        let a: Value =
            serde_json::from_str(r#"{"status":"active","limit":10,"range":{"to":2,"from":1}}"#)
                .unwrap();
        let b: Value =
            serde_json::from_str(r#"{"range":{"from":1,"to":2},"limit":10,"status":"active"}"#)
                .unwrap();

        let key = cache_key(Entity::Projects, "u1", Some(&a));
        assert_eq!(key, cache_key(Entity::Projects, "u1", Some(&b)));
        assert_eq!(
            key,
            r#"projects_u1_{"limit":10,"range":{"from":1,"to":2},"status":"active"}"#
        );
    }

    #[test]
    fn test_different_filters_do_not_alias() {
        let active = cache_key(Entity::Projects, "u1", Some(&json!({"status": "active"})));
        let done = cache_key(Entity::Projects, "u1", Some(&json!({"status": "done"})));
        let other_scope = cache_key(Entity::Projects, "u2", Some(&json!({"status": "active"})));

        assert_ne!(active, done);
        assert_ne!(active, other_scope);
    }

    #[test]
    fn test_canonical_json_escapes_and_arrays() {
        let value = json!({"b": [3, {"z": null, "a": "x\"y"}], "a": true});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":true,"b":[3,{"a":"x\"y","z":null}]}"#
        );
    }

    #[test]
    fn test_entity_patterns_do_not_overlap() {
        for entity in Entity::ALL {
            let pattern = entity.key_pattern();
            for other in Entity::ALL {
                let key = cache_key(other, "u1", None);
                assert_eq!(pattern.is_match(&key), entity == other, "{} vs {}", entity, key);
            }
        }
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(CacheKeys::clients("u1"), "clients_u1_all");
        assert_eq!(CacheKeys::dashboard_stats("u1"), "dashboard_stats_u1_all");
        assert_eq!(CacheKeys::team_members("u1"), "team_members_u1_all");
        assert_eq!(CacheKeys::transactions("u1", None), "transactions_u1_all");
        assert_eq!(
            CacheKeys::transactions("u1", Some("2024-01")),
            r#"transactions_u1_{"dateRange":"2024-01"}"#
        );
        assert_eq!(
            CacheKeys::analytics("u1", "30", None),
            r#"analytics_u1_{"projectType":"all","timeframe":"30"}"#
        );
        assert!(CacheKeys::projects("u1", Some(&json!({"limit": 10}))).starts_with("projects_u1_"));
    }
}
