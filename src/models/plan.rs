//! Post-plan document types
//!
//! Only the parts of the plan JSON the validators consume are modelled;
//! everything else in the document is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanDocument {
    #[serde(default)]
    pub format_version: Option<String>,
    #[serde(default)]
    pub resource_changes: Vec<ResourceChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceChange {
    pub address: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub change: Change,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Change {
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub before: Option<Value>,
    #[serde(default)]
    pub after: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
    Replace,
    Read,
    NoOp,
}

/// Resource counts as shown in a plan summary line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub add: usize,
    pub change: usize,
    pub destroy: usize,
}

impl PlanDocument {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Changes that will exist after apply (creates, updates, replacements)
    pub fn live_changes(&self) -> impl Iterator<Item = &ResourceChange> {
        self.resource_changes.iter().filter(|rc| {
            matches!(
                rc.change.kind(),
                ChangeKind::Create | ChangeKind::Update | ChangeKind::Replace
            )
        })
    }

    /// Every resource of `resource_type` that is not being destroyed,
    /// including unchanged (`no-op`) ones
    pub fn present_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a ResourceChange> + 'a {
        self.resource_changes.iter().filter(move |rc| {
            rc.resource_type == resource_type
                && !matches!(rc.change.kind(), ChangeKind::Delete | ChangeKind::Read)
        })
    }

    pub fn changes_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a ResourceChange> + 'a {
        self.live_changes()
            .filter(move |rc| rc.resource_type == resource_type)
    }

    pub fn summary(&self) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        for rc in &self.resource_changes {
            match rc.change.kind() {
                ChangeKind::Create => summary.add += 1,
                ChangeKind::Update => summary.change += 1,
                ChangeKind::Delete => summary.destroy += 1,
                ChangeKind::Replace => {
                    summary.add += 1;
                    summary.destroy += 1;
                }
                ChangeKind::Read | ChangeKind::NoOp => {}
            }
        }
        summary
    }
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        let has = |a: &str| self.actions.iter().any(|x| x == a);
        match (has("create"), has("delete"), has("update")) {
            (true, true, _) => ChangeKind::Replace,
            (true, false, _) => ChangeKind::Create,
            (false, true, _) => ChangeKind::Delete,
            (false, false, true) => ChangeKind::Update,
            _ if has("read") => ChangeKind::Read,
            _ => ChangeKind::NoOp,
        }
    }

    pub fn after_str(&self, key: &str) -> Option<&str> {
        str_field(self.after.as_ref(), key)
    }

    pub fn before_str(&self, key: &str) -> Option<&str> {
        str_field(self.before.as_ref(), key)
    }

    pub fn after_field(&self, key: &str) -> Option<&Value> {
        self.after.as_ref().and_then(|v| v.get(key)).filter(|v| !v.is_null())
    }
}

fn str_field<'a>(value: Option<&'a Value>, key: &str) -> Option<&'a str> {
    value
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(actions: &[&str]) -> Change {
        Change {
            actions: actions.iter().map(|s| s.to_string()).collect(),
            before: None,
            after: None,
        }
    }

    #[test]
    fn test_change_kind() {
        assert_eq!(change(&["create"]).kind(), ChangeKind::Create);
        assert_eq!(change(&["update"]).kind(), ChangeKind::Update);
        assert_eq!(change(&["delete"]).kind(), ChangeKind::Delete);
        assert_eq!(change(&["delete", "create"]).kind(), ChangeKind::Replace);
        assert_eq!(change(&["create", "delete"]).kind(), ChangeKind::Replace);
        assert_eq!(change(&["read"]).kind(), ChangeKind::Read);
        assert_eq!(change(&["no-op"]).kind(), ChangeKind::NoOp);
    }

    #[test]
    fn test_parse_plan_and_summary() {
        let plan = PlanDocument::from_value(json!({
            "format_version": "1.2",
            "resource_changes": [
                {"address": "aws_instance.web", "type": "aws_instance", "name": "web",
                 "change": {"actions": ["create"], "before": null, "after": {"instance_type": "t3.micro"}}},
                {"address": "aws_instance.old", "type": "aws_instance", "name": "old",
                 "change": {"actions": ["delete"], "before": {"instance_type": "t2.micro"}, "after": null}},
                {"address": "aws_s3_bucket.b", "type": "aws_s3_bucket", "name": "b",
                 "change": {"actions": ["update"]}},
                {"address": "aws_vpc.main", "type": "aws_vpc", "name": "main",
                 "change": {"actions": ["delete", "create"]}}
            ]
        }))
        .unwrap();

        let summary = plan.summary();
        assert_eq!(summary, ChangeSummary { add: 2, change: 1, destroy: 2 });
        assert_eq!(plan.changes_of_type("aws_instance").count(), 1);
        assert_eq!(plan.live_changes().count(), 3);
    }

    #[test]
    fn test_present_of_type_keeps_unchanged_resources() {
        let plan = PlanDocument::from_value(json!({
            "resource_changes": [
                {"address": "aws_s3_bucket_public_access_block.a", "type": "aws_s3_bucket_public_access_block",
                 "name": "a", "change": {"actions": ["no-op"]}},
                {"address": "aws_s3_bucket_public_access_block.b", "type": "aws_s3_bucket_public_access_block",
                 "name": "b", "change": {"actions": ["delete"]}},
                {"address": "aws_s3_bucket_public_access_block.c", "type": "aws_s3_bucket_public_access_block",
                 "name": "c", "change": {"actions": ["update"]}}
            ]
        }))
        .unwrap();

        let names: Vec<&str> = plan
            .present_of_type("aws_s3_bucket_public_access_block")
            .map(|rc| rc.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(plan.changes_of_type("aws_s3_bucket_public_access_block").count(), 1);
    }

    #[test]
    fn test_missing_resource_changes_is_empty() {
        let plan = PlanDocument::from_json("{}").unwrap();
        assert!(plan.resource_changes.is_empty());
    }

    #[test]
    fn test_malformed_plan_is_error() {
        assert!(PlanDocument::from_json("not json").is_err());
        assert!(PlanDocument::from_json(r#"{"resource_changes": 7}"#).is_err());
    }

    #[test]
    fn test_field_accessors_skip_empty_and_null() {
        let c = Change {
            actions: vec!["update".into()],
            before: Some(json!({"instance_type": "t2.micro"})),
            after: Some(json!({"instance_type": "", "ami": null, "tags": {"a": "b"}})),
        };
        assert_eq!(c.before_str("instance_type"), Some("t2.micro"));
        assert_eq!(c.after_str("instance_type"), None);
        assert!(c.after_field("ami").is_none());
        assert!(c.after_field("tags").is_some());
    }
}
