use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use protigo_shared::Config;
use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

mod backfill;
mod seed;

/// One-off jobs, invoked directly with a JSON payload such as `{"task": "backfill_order_weights"}`
#[derive(Debug, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
enum MaintenanceTask {
    #[serde(rename_all = "camelCase")]
    Seed {
        admin_password: String,
        customer_password: String,
    },
    BackfillOrderWeights,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env()?;
    let aws_config = aws_config::load_from_env().await;
    let dynamo_client = DynamoClient::new(&aws_config);

    run(service_fn(|event: LambdaEvent<MaintenanceTask>| {
        function_handler(event, &dynamo_client, &config.table_name)
    }))
    .await
}

async fn function_handler(
    event: LambdaEvent<MaintenanceTask>,
    dynamo_client: &DynamoClient,
    table_name: &str,
) -> Result<Value, Error> {
    let task = event.payload;
    tracing::info!(request_id = %event.context.request_id, "Maintenance task received");

    let summary = match task {
        MaintenanceTask::Seed {
            admin_password,
            customer_password,
        } => seed::run(dynamo_client, table_name, &admin_password, &customer_password).await?,
        MaintenanceTask::BackfillOrderWeights => backfill::run(dynamo_client, table_name).await?,
    };

    tracing::info!(summary = %summary, "Maintenance task finished");
    Ok(summary)
}
