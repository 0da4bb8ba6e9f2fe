use aws_sdk_dynamodb::Client as DynamoClient;
use protigo_shared::{
    foods, items,
    orders::{self, order_pk},
    types::OrderItem,
    ApiError,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

/// Fill in missing line weights from the current menu. Lines that already carry a weight are left alone.
pub fn backfill_weights(lines: &mut [OrderItem], weights: &HashMap<String, String>) -> bool {
    let mut changed = false;
    for line in lines.iter_mut().filter(|line| line.weight.is_none()) {
        if let Some(weight) = weights.get(&line.food_id) {
            line.weight = Some(weight.clone());
            changed = true;
        }
    }
    changed
}

async fn food_weights(
    client: &DynamoClient,
    table_name: &str,
    food_ids: HashSet<String>,
) -> Result<HashMap<String, String>, ApiError> {
    let mut weights = HashMap::new();
    for food_id in food_ids {
        match foods::fetch_food(client, table_name, &food_id).await? {
            Some(food) => {
                if let Some(weight) = food.weight {
                    weights.insert(food_id, weight);
                }
            }
            None => tracing::warn!(food_id = %food_id, "Food no longer exists, cannot backfill"),
        }
    }
    Ok(weights)
}

pub async fn run(client: &DynamoClient, table_name: &str) -> Result<Value, ApiError> {
    let all_orders = orders::scan_orders(client, table_name, None).await?;
    let missing = all_orders
        .iter()
        .flat_map(|order| order.items.iter())
        .filter(|line| line.weight.is_none())
        .map(|line| line.food_id.clone())
        .collect();
    let weights = food_weights(client, table_name, missing).await?;

    let mut updated = 0;
    for mut order in all_orders.iter().cloned() {
        if !backfill_weights(&mut order.items, &weights) {
            continue;
        }

        client
            .update_item()
            .table_name(table_name)
            .set_key(Some(items::key(order_pk(&order.id), "METADATA")))
            .update_expression("SET #items = :items")
            .expression_attribute_names("#items", "items")
            .expression_attribute_values(":items", items::json_attr(&order.items)?)
            .send()
            .await?;

        tracing::info!(order_id = %order.id, "Backfilled order weights");
        updated += 1;
    }

    tracing::info!(scanned = all_orders.len(), updated, "Backfill complete");
    Ok(json!({
        "ordersScanned": all_orders.len(),
        "ordersUpdated": updated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(food_id: &str, weight: Option<&str>) -> OrderItem {
        OrderItem {
            food_id: food_id.into(),
            name: "Item".into(),
            weight: weight.map(String::from),
            quantity: 1,
            price: 100.0,
        }
    }

    #[test]
    fn test_fills_only_missing_weights() {
        let weights = HashMap::from([
            ("shake".to_string(), "330 ml".to_string()),
            ("bar".to_string(), "60 g".to_string()),
        ]);
        let mut lines = vec![line("shake", None), line("bar", Some("50 g")), line("gone", None)];

        assert!(backfill_weights(&mut lines, &weights));
        assert_eq!(lines[0].weight.as_deref(), Some("330 ml"));
        assert_eq!(lines[1].weight.as_deref(), Some("50 g"));
        assert_eq!(lines[2].weight, None);
    }

    #[test]
    fn test_reports_no_change() {
        let weights = HashMap::from([("shake".to_string(), "330 ml".to_string())]);
        let mut lines = vec![line("shake", Some("330 ml")), line("gone", None)];
        assert!(!backfill_weights(&mut lines, &weights));
    }
}
