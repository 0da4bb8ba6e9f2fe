use aws_sdk_dynamodb::{
    types::{Put, TransactWriteItem},
    Client as DynamoClient,
};
use lambda_http::{http::StatusCode, Body, Response};
use serde::Serialize;
use std::collections::HashMap;

use crate::auth::{self, Claims};
use crate::config::Config;
use crate::error::ApiError;
use crate::items::{self, Item, ENTITY_EMAIL, ENTITY_USER};
use crate::responses;
use crate::types::{timestamp, LoginRequest, RegisterRequest, Role, UpdateProfileRequest, User};

pub const MIN_PASSWORD_LEN: usize = 6;
const PROFILE_SK: &str = "PROFILE";
const EMAIL_SK: &str = "EMAIL";

pub fn user_pk(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

fn email_pk(email: &str) -> String {
    format!("EMAIL#{}", normalize_email(email))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Please provide your name".into()));
    }
    let email = normalize_email(&req.email);
    let valid_email = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);
    if !valid_email {
        return Err(ApiError::Validation("Please provide a valid email".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if req.role == Some(Role::Admin) {
        return Err(ApiError::Forbidden("Admin accounts cannot be self-registered".into()));
    }
    Ok(())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn user_to_item(user: &User) -> Result<Item, ApiError> {
    let mut item = items::key(user_pk(&user.id), PROFILE_SK);
    item.insert("entity_type".into(), items::s(ENTITY_USER));
    item.insert("name".into(), items::s(&user.name));
    item.insert("email".into(), items::s(&user.email));
    item.insert("password_hash".into(), items::s(&user.password_hash));
    item.insert("role".into(), items::s(user.role.as_str()));
    if let Some(phone) = &user.phone {
        item.insert("phone".into(), items::s(phone));
    }
    if let Some(address) = &user.address {
        item.insert("address".into(), items::json_attr(address)?);
    }
    item.insert("created_at".into(), items::s(&user.created_at));
    item.insert("updated_at".into(), items::s(&user.updated_at));
    Ok(item)
}

pub fn user_from_item(item: &Item) -> Result<User, ApiError> {
    let pk = items::require_string(item, "PK")?;
    Ok(User {
        id: items::id_from_key(&pk).to_string(),
        name: items::require_string(item, "name")?,
        email: items::require_string(item, "email")?,
        password_hash: items::require_string(item, "password_hash")?,
        role: items::require_string(item, "role")?.parse()?,
        phone: items::get_string(item, "phone"),
        address: items::get_json(item, "address")?,
        created_at: items::get_string(item, "created_at").unwrap_or_default(),
        updated_at: items::get_string(item, "updated_at").unwrap_or_default(),
    })
}

pub fn new_user(
    name: &str,
    email: &str,
    password: &str,
    role: Role,
    phone: Option<String>,
) -> Result<User, ApiError> {
    let now = timestamp(chrono::Utc::now());
    Ok(User {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.trim().to_string(),
        email: normalize_email(email),
        password_hash: auth::hash_password(password)?,
        role,
        phone: blank_to_none(phone),
        address: None,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Store a new user together with its email lock so two accounts can never share an email
pub async fn create_user_record(
    client: &DynamoClient,
    table_name: &str,
    user: &User,
) -> Result<(), ApiError> {
    let mut lock = items::key(email_pk(&user.email), EMAIL_SK);
    lock.insert("entity_type".into(), items::s(ENTITY_EMAIL));
    lock.insert("user_id".into(), items::s(&user.id));

    let result = client
        .transact_write_items()
        .transact_items(
            TransactWriteItem::builder()
                .put(
                    Put::builder()
                        .table_name(table_name)
                        .set_item(Some(lock))
                        .condition_expression("attribute_not_exists(PK)")
                        .build()?,
                )
                .build(),
        )
        .transact_items(
            TransactWriteItem::builder()
                .put(
                    Put::builder()
                        .table_name(table_name)
                        .set_item(Some(user_to_item(user)?))
                        .condition_expression("attribute_not_exists(PK)")
                        .build()?,
                )
                .build(),
        )
        .send()
        .await;

    match result {
        Ok(_) => {
            tracing::info!(user_id = %user.id, role = %user.role, "User created");
            Ok(())
        }
        Err(e)
            if e.as_service_error()
                .map(|se| se.is_transaction_canceled_exception())
                .unwrap_or(false) =>
        {
            Err(ApiError::Conflict("User already exists with this email".into()))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn get_user(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Option<User>, ApiError> {
    let result = client
        .get_item()
        .table_name(table_name)
        .set_key(Some(items::key(user_pk(user_id), PROFILE_SK)))
        .send()
        .await?;

    result.item().map(user_from_item).transpose()
}

/// Who placed an order, as shown on order views
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}

pub async fn fetch_user_summaries<'a>(
    client: &DynamoClient,
    table_name: &str,
    user_ids: impl IntoIterator<Item = &'a str>,
) -> Result<HashMap<String, UserSummary>, ApiError> {
    let mut ids: Vec<&str> = user_ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let keys = ids
        .iter()
        .map(|id| items::key(user_pk(id), PROFILE_SK))
        .collect();
    let raw = items::batch_get(client, table_name, keys).await?;
    Ok(raw
        .iter()
        .filter_map(|item| user_from_item(item).ok())
        .map(|user| (user.id.clone(), UserSummary::from(&user)))
        .collect())
}

pub async fn find_user_by_email(
    client: &DynamoClient,
    table_name: &str,
    email: &str,
) -> Result<Option<User>, ApiError> {
    let result = client
        .get_item()
        .table_name(table_name)
        .set_key(Some(items::key(email_pk(email), EMAIL_SK)))
        .send()
        .await?;

    match result.item().and_then(|item| items::get_string(item, "user_id")) {
        Some(user_id) => get_user(client, table_name, &user_id).await,
        None => Ok(None),
    }
}

fn auth_response(
    status: StatusCode,
    message: &str,
    user: &User,
    config: &Config,
) -> Result<Response<Body>, ApiError> {
    let claims = auth::claims_for(&user.id, user.role, config, chrono::Utc::now().timestamp())?;
    let token = auth::issue_token(&claims, &config.token_secret)?;
    Ok(responses::success(
        status,
        serde_json::json!({
            "message": message,
            "token": token,
            "user": responses::to_value(user)?,
        }),
    ))
}

/// POST /auth/register
pub async fn register(
    client: &DynamoClient,
    config: &Config,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: RegisterRequest = responses::parse_body(body)?;
    validate_registration(&req)?;

    let user = new_user(&req.name, &req.email, &req.password, Role::Customer, req.phone)?;
    create_user_record(client, &config.table_name, &user).await?;

    auth_response(StatusCode::CREATED, "User registered successfully", &user, config)
}

/// POST /auth/login
pub async fn login(
    client: &DynamoClient,
    config: &Config,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: LoginRequest = responses::parse_body(body)?;
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Please provide email and password".into()));
    }

    let invalid = || ApiError::Unauthorized("Invalid email or password".into());
    let user = find_user_by_email(client, &config.table_name, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !auth::verify_password(&req.password, &user.password_hash) {
        tracing::warn!(user_id = %user.id, "Login failed: bad password");
        return Err(invalid());
    }

    tracing::info!(user_id = %user.id, "Login successful");
    auth_response(StatusCode::OK, "Login successful", &user, config)
}

/// GET /auth/profile
pub async fn get_profile(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
) -> Result<Response<Body>, ApiError> {
    let user = get_user(client, table_name, &claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(responses::success(
        StatusCode::OK,
        serde_json::json!({ "user": responses::to_value(&user)? }),
    ))
}

pub fn apply_profile_update(user: &mut User, req: UpdateProfileRequest) -> Result<(), ApiError> {
    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("Name cannot be empty".into()));
        }
        user.name = name.trim().to_string();
    }
    if req.phone.is_some() {
        user.phone = blank_to_none(req.phone);
    }
    if let Some(address) = req.address {
        address.validate()?;
        user.address = Some(address);
    }
    user.updated_at = timestamp(chrono::Utc::now());
    Ok(())
}

/// PUT /auth/profile
pub async fn update_profile(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: UpdateProfileRequest = responses::parse_body(body)?;

    let mut user = get_user(client, table_name, &claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    apply_profile_update(&mut user, req)?;

    client
        .put_item()
        .table_name(table_name)
        .set_item(Some(user_to_item(&user)?))
        .condition_expression("attribute_exists(PK)")
        .send()
        .await?;

    Ok(responses::success(
        StatusCode::OK,
        serde_json::json!({
            "message": "Profile updated successfully",
            "user": responses::to_value(&user)?,
        }),
    ))
}
