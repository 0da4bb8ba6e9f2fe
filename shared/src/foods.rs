use aws_sdk_dynamodb::{operation::put_item::builders::PutItemFluentBuilder, Client as DynamoClient};
use lambda_http::{http::StatusCode, Body, Response};
use serde::Serialize;
use std::collections::HashMap;

use crate::auth::Claims;
use crate::error::ApiError;
use crate::items::{self, Item, ENTITY_FOOD};
use crate::responses;
use crate::types::{
    round_money, timestamp, Category, CreateFoodRequest, Food, FoodImage, NutritionInfo,
    UpdateFoodRequest,
};

pub const DEFAULT_IMAGE_URL: &str = "https://images.pexels.com/photos/1640777/pexels-photo-1640777.jpeg";
const DEFAULT_PREPARATION_MINUTES: u32 = 30;
const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;
const METADATA_SK: &str = "METADATA";

pub fn food_pk(food_id: &str) -> String {
    format!("FOOD#{}", food_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoodSort {
    PriceLow,
    PriceHigh,
    Newest,
}

impl FoodSort {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "price-low" => Some(FoodSort::PriceLow),
            "price-high" => Some(FoodSort::PriceHigh),
            "newest" => Some(FoodSort::Newest),
            _ => None,
        }
    }
}

/// Catalog filters taken from the `GET /foods` query string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoodQuery {
    pub category: Option<Category>,
    pub search: Option<String>,
    pub sort: Option<FoodSort>,
}

impl FoodQuery {
    pub fn from_params(
        category: Option<&str>,
        search: Option<&str>,
        sort: Option<&str>,
    ) -> Result<Self, ApiError> {
        let category = match category.map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(raw.parse()?),
        };
        let search = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let sort = sort.and_then(FoodSort::parse);
        Ok(Self { category, search, sort })
    }

    fn matches(&self, food: &Food) -> bool {
        if let Some(category) = self.category {
            if food.category != category {
                return false;
            }
        }
        match &self.search {
            Some(needle) => {
                food.name.to_lowercase().contains(needle.as_str())
                    || food.description.to_lowercase().contains(needle.as_str())
            }
            None => true,
        }
    }

    pub fn apply(&self, foods: Vec<Food>) -> Vec<Food> {
        let mut foods: Vec<Food> = foods.into_iter().filter(|f| self.matches(f)).collect();
        match self.sort {
            Some(FoodSort::PriceLow) => foods.sort_by(|a, b| a.price.total_cmp(&b.price)),
            Some(FoodSort::PriceHigh) => foods.sort_by(|a, b| b.price.total_cmp(&a.price)),
            Some(FoodSort::Newest) => foods.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            None => {}
        }
        foods
    }
}

fn validate_food(food: &Food) -> Result<(), ApiError> {
    if food.name.is_empty() {
        return Err(ApiError::Validation("Please provide food name".into()));
    }
    if food.name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "Food name cannot exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    if food.description.trim().is_empty() {
        return Err(ApiError::Validation("Please provide food description".into()));
    }
    if food.description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::Validation(format!(
            "Description cannot exceed {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    if !food.price.is_finite() || food.price < 0.0 {
        return Err(ApiError::Validation("Price cannot be negative".into()));
    }
    if food.image.url.trim().is_empty() {
        return Err(ApiError::Validation("Please provide food image".into()));
    }
    Ok(())
}

fn clean_ingredients(ingredients: Vec<String>) -> Vec<String> {
    ingredients
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect()
}

fn clean_weight(weight: Option<String>) -> Option<String> {
    weight
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
}

pub fn new_food(id: String, req: CreateFoodRequest, created_by: &str, now: &str) -> Result<Food, ApiError> {
    let food = Food {
        id,
        name: req.name.trim().to_string(),
        description: req.description,
        price: round_money(req.price),
        weight: clean_weight(req.weight),
        category: req.category,
        image: req.image.unwrap_or_else(|| FoodImage {
            url: DEFAULT_IMAGE_URL.to_string(),
            public_id: None,
        }),
        ingredients: clean_ingredients(req.ingredients.unwrap_or_default()),
        nutrition_info: req.nutrition_info.unwrap_or_default(),
        is_available: req.is_available.unwrap_or(true),
        preparation_time: req.preparation_time.unwrap_or(DEFAULT_PREPARATION_MINUTES),
        created_by: created_by.to_string(),
        created_at: now.to_string(),
        updated_at: now.to_string(),
    };
    validate_food(&food)?;
    Ok(food)
}

pub fn apply_food_update(food: &mut Food, req: UpdateFoodRequest, now: &str) -> Result<(), ApiError> {
    if let Some(name) = req.name {
        food.name = name.trim().to_string();
    }
    if let Some(description) = req.description {
        food.description = description;
    }
    if let Some(price) = req.price {
        food.price = round_money(price);
    }
    if req.weight.is_some() {
        food.weight = clean_weight(req.weight);
    }
    if let Some(category) = req.category {
        food.category = category;
    }
    if let Some(image) = req.image {
        food.image = image;
    }
    if let Some(ingredients) = req.ingredients {
        food.ingredients = clean_ingredients(ingredients);
    }
    if let Some(nutrition_info) = req.nutrition_info {
        food.nutrition_info = nutrition_info;
    }
    if let Some(is_available) = req.is_available {
        food.is_available = is_available;
    }
    if let Some(preparation_time) = req.preparation_time {
        food.preparation_time = preparation_time;
    }
    food.updated_at = now.to_string();
    validate_food(food)
}

pub fn food_to_item(food: &Food) -> Result<Item, ApiError> {
    let mut item = items::key(food_pk(&food.id), METADATA_SK);
    item.insert("entity_type".into(), items::s(ENTITY_FOOD));
    item.insert("name".into(), items::s(&food.name));
    item.insert("description".into(), items::s(&food.description));
    item.insert("price".into(), items::n(food.price));
    if let Some(weight) = &food.weight {
        item.insert("weight".into(), items::s(weight));
    }
    item.insert("category".into(), items::s(food.category.as_str()));
    item.insert("image_url".into(), items::s(&food.image.url));
    if let Some(public_id) = &food.image.public_id {
        item.insert("image_public_id".into(), items::s(public_id));
    }
    item.insert("ingredients".into(), items::json_attr(&food.ingredients)?);
    item.insert("nutrition_info".into(), items::json_attr(&food.nutrition_info)?);
    item.insert(
        "is_available".into(),
        aws_sdk_dynamodb::types::AttributeValue::Bool(food.is_available),
    );
    item.insert("preparation_time".into(), items::n(food.preparation_time));
    item.insert("created_by".into(), items::s(&food.created_by));
    item.insert("created_at".into(), items::s(&food.created_at));
    item.insert("updated_at".into(), items::s(&food.updated_at));
    Ok(item)
}

pub fn food_from_item(item: &Item) -> Result<Food, ApiError> {
    let pk = items::require_string(item, "PK")?;
    Ok(Food {
        id: items::id_from_key(&pk).to_string(),
        name: items::require_string(item, "name")?,
        description: items::get_string(item, "description").unwrap_or_default(),
        price: items::require_f64(item, "price")?,
        weight: items::get_string(item, "weight"),
        category: items::require_string(item, "category")?.parse()?,
        image: FoodImage {
            url: items::get_string(item, "image_url").unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            public_id: items::get_string(item, "image_public_id"),
        },
        ingredients: items::get_json(item, "ingredients")?.unwrap_or_default(),
        nutrition_info: items::get_json(item, "nutrition_info")?.unwrap_or_default(),
        is_available: items::get_bool(item, "is_available").unwrap_or(true),
        preparation_time: items::get_u64(item, "preparation_time")
            .and_then(|m| u32::try_from(m).ok())
            .unwrap_or(DEFAULT_PREPARATION_MINUTES),
        created_by: items::get_string(item, "created_by").unwrap_or_default(),
        created_at: items::get_string(item, "created_at").unwrap_or_default(),
        updated_at: items::get_string(item, "updated_at").unwrap_or_default(),
    })
}

pub async fn fetch_food(
    client: &DynamoClient,
    table_name: &str,
    food_id: &str,
) -> Result<Option<Food>, ApiError> {
    let result = client
        .get_item()
        .table_name(table_name)
        .set_key(Some(items::key(food_pk(food_id), METADATA_SK)))
        .send()
        .await?;

    result.item().map(food_from_item).transpose()
}

/// The menu fields a cart or order line shows next to its own snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodSummary {
    pub id: String,
    pub name: String,
    pub image: FoodImage,
    pub nutrition_info: NutritionInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    pub is_available: bool,
}

impl From<&Food> for FoodSummary {
    fn from(food: &Food) -> Self {
        Self {
            id: food.id.clone(),
            name: food.name.clone(),
            image: food.image.clone(),
            nutrition_info: food.nutrition_info.clone(),
            weight: food.weight.clone(),
            is_available: food.is_available,
        }
    }
}

/// A cart or order line with the current menu entry attached. `food` is null
/// once the food has been deleted.
#[derive(Serialize)]
pub struct WithFood<'a, T> {
    #[serde(flatten)]
    pub line: &'a T,
    pub food: Option<&'a FoodSummary>,
}

/// Summaries for the given food ids, keyed by id. Unknown ids are left out.
pub async fn fetch_food_summaries<'a>(
    client: &DynamoClient,
    table_name: &str,
    food_ids: impl IntoIterator<Item = &'a str>,
) -> Result<HashMap<String, FoodSummary>, ApiError> {
    let mut ids: Vec<&str> = food_ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let keys = ids
        .iter()
        .map(|id| items::key(food_pk(id), METADATA_SK))
        .collect();
    let raw = items::batch_get(client, table_name, keys).await?;
    Ok(raw
        .iter()
        .filter_map(|item| food_from_item(item).ok())
        .map(|food| (food.id.clone(), FoodSummary::from(&food)))
        .collect())
}

/// Every food in store order. Items that fail to decode are skipped and logged.
pub async fn scan_foods(client: &DynamoClient, table_name: &str) -> Result<Vec<Food>, ApiError> {
    let raw = items::scan_entities(client, table_name, ENTITY_FOOD, None).await?;
    Ok(raw
        .iter()
        .filter_map(|item| match food_from_item(item) {
            Ok(food) => Some(food),
            Err(e) => {
                tracing::error!("Skipping unreadable food item: {}", e);
                None
            }
        })
        .collect())
}

pub async fn put_food(client: &DynamoClient, table_name: &str, food: &Food) -> Result<(), ApiError> {
    client
        .put_item()
        .table_name(table_name)
        .set_item(Some(food_to_item(food)?))
        .send()
        .await?;
    Ok(())
}

async fn load_owned_food(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
    food_id: &str,
    denied: &str,
) -> Result<Food, ApiError> {
    let food = fetch_food(client, table_name, food_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Food item not found".into()))?;
    claims.ensure_owner_or_admin(&food.created_by, denied)?;
    Ok(food)
}

/// GET /foods
pub async fn list_foods(
    client: &DynamoClient,
    table_name: &str,
    query: &FoodQuery,
) -> Result<Response<Body>, ApiError> {
    let foods = query.apply(scan_foods(client, table_name).await?);

    Ok(responses::success(
        StatusCode::OK,
        serde_json::json!({
            "count": foods.len(),
            "foods": responses::to_value(&foods)?,
        }),
    ))
}

/// GET /foods/{id}
pub async fn get_food(
    client: &DynamoClient,
    table_name: &str,
    food_id: &str,
) -> Result<Response<Body>, ApiError> {
    let food = fetch_food(client, table_name, food_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Food item not found".into()))?;

    Ok(responses::success(
        StatusCode::OK,
        serde_json::json!({ "food": responses::to_value(&food)? }),
    ))
}

/// POST /foods
pub async fn create_food(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: CreateFoodRequest = responses::parse_body(body)?;
    let now = timestamp(chrono::Utc::now());
    let food = new_food(uuid::Uuid::new_v4().to_string(), req, &claims.sub, &now)?;

    client
        .put_item()
        .table_name(table_name)
        .set_item(Some(food_to_item(&food)?))
        .condition_expression("attribute_not_exists(PK)")
        .send()
        .await?;

    tracing::info!(food_id = %food.id, created_by = %claims.sub, "Food created");

    Ok(responses::success(
        StatusCode::CREATED,
        serde_json::json!({
            "message": "Food item created successfully",
            "food": responses::to_value(&food)?,
        }),
    ))
}

/// Overwrite an existing food. The write fails if the food was deleted meanwhile.
fn food_update_request(
    client: &DynamoClient,
    table_name: &str,
    food: &Food,
) -> Result<PutItemFluentBuilder, ApiError> {
    Ok(client
        .put_item()
        .table_name(table_name)
        .set_item(Some(food_to_item(food)?))
        .condition_expression("attribute_exists(PK)"))
}

/// PUT /foods/{id}
pub async fn update_food(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
    food_id: &str,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: UpdateFoodRequest = responses::parse_body(body)?;
    let mut food = load_owned_food(
        client,
        table_name,
        claims,
        food_id,
        "Access denied. You can only update your own food items",
    )
    .await?;

    apply_food_update(&mut food, req, &timestamp(chrono::Utc::now()))?;

    match food_update_request(client, table_name, &food)?.send().await {
        Ok(_) => {}
        Err(e)
            if e.as_service_error()
                .map(|se| se.is_conditional_check_failed_exception())
                .unwrap_or(false) =>
        {
            return Err(ApiError::NotFound("Food item not found".into()));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(food_id = %food.id, updated_by = %claims.sub, "Food updated");

    Ok(responses::success(
        StatusCode::OK,
        serde_json::json!({
            "message": "Food item updated successfully",
            "food": responses::to_value(&food)?,
        }),
    ))
}

/// DELETE /foods/{id}
pub async fn delete_food(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
    food_id: &str,
) -> Result<Response<Body>, ApiError> {
    load_owned_food(
        client,
        table_name,
        claims,
        food_id,
        "Access denied. You can only delete your own food items",
    )
    .await?;

    client
        .delete_item()
        .table_name(table_name)
        .set_key(Some(items::key(food_pk(food_id), METADATA_SK)))
        .send()
        .await?;

    tracing::info!(food_id, deleted_by = %claims.sub, "Food deleted");

    Ok(responses::success(
        StatusCode::OK,
        serde_json::json!({ "message": "Food item deleted successfully" }),
    ))
}
