pub mod auth;
pub mod cart;
pub mod config;
pub mod error;
pub mod foods;
pub mod items;
pub mod orders;
pub mod responses;
pub mod status;
pub mod types;
pub mod uploads;
pub mod users;

use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;

pub use config::Config;
pub use error::ApiError;

/// Shared application state
pub struct AppState {
    pub dynamo_client: DynamoClient,
    pub s3_client: S3Client,
    pub config: Config,
}

impl AppState {
    pub fn new(dynamo_client: DynamoClient, s3_client: S3Client, config: Config) -> Arc<Self> {
        Arc::new(Self {
            dynamo_client,
            s3_client,
            config,
        })
    }
}
