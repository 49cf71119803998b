//! 同窓会参加者リポジトリ（キーは`id`）
use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use tracing::info;

use super::dynamo_support::{
    from_item, s, scan_all, write_error, RepositoryError, ScanFilter,
};
use crate::domain::{Attendee, CheckInActions};

#[async_trait]
pub trait AttendeeRepository: Send + Sync {
    async fn scan_all(&self) -> Result<Vec<Attendee>, RepositoryError>;

    /// 受付・Tシャツ受け取りを記録し、更新後の参加者を返す
    ///
    /// 存在しない参加者は`ConditionFailed`。
    async fn check_in(
        &self,
        attendee_id: &str,
        actions: CheckInActions,
        now: &str,
    ) -> Result<Attendee, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct DynamoAttendeeRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoAttendeeRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }
}

/// 受付操作の更新式と値
pub fn check_in_update(
    actions: CheckInActions,
    now: &str,
) -> (String, HashMap<String, AttributeValue>) {
    let mut assignments = Vec::new();
    let mut values = HashMap::new();

    if actions.check_in {
        assignments.push("checkedIn = :true, checkedInAt = :now");
    }
    if actions.shirt_pickup {
        assignments.push("shirtsPickedUp = :true, shirtsPickedUpAt = :now");
    }
    if !assignments.is_empty() {
        values.insert(":true".to_string(), AttributeValue::Bool(true));
        values.insert(":now".to_string(), s(now));
    }

    (format!("SET {}", assignments.join(", ")), values)
}

#[async_trait]
impl AttendeeRepository for DynamoAttendeeRepository {
    async fn scan_all(&self) -> Result<Vec<Attendee>, RepositoryError> {
        scan_all(&self.client, &self.table_name, ScanFilter::default())
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }

    async fn check_in(
        &self,
        attendee_id: &str,
        actions: CheckInActions,
        now: &str,
    ) -> Result<Attendee, RepositoryError> {
        let (expression, values) = check_in_update(actions, now);

        let output = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", s(attendee_id))
            .update_expression(expression)
            .condition_expression("attribute_exists(id)")
            .set_expression_attribute_values(Some(values))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(write_error)?;

        info!(
            attendee_id = %attendee_id,
            check_in = actions.check_in,
            shirt_pickup = actions.shirt_pickup,
            "参加者受付更新完了"
        );
        from_item(output.attributes.unwrap_or_default())
    }
}
