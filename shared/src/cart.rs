use aws_sdk_dynamodb::{
    operation::put_item::builders::PutItemFluentBuilder, types::AttributeValue,
    Client as DynamoClient,
};
use lambda_http::{http::StatusCode, Body, Response};
use serde::Serialize;
use std::collections::HashMap;

use crate::auth::Claims;
use crate::error::ApiError;
use crate::foods::{self, FoodSummary, WithFood};
use crate::items::{self, Item, ENTITY_CART};
use crate::responses;
use crate::types::{
    round_money, timestamp, AddToCartRequest, Cart, CartItem, Food, UpdateCartItemRequest,
};
use crate::users::user_pk;

pub const CART_SK: &str = "CART";

/// A user's cart always lives next to their profile, keyed by the token subject
pub fn cart_key(user_id: &str) -> Item {
    items::key(user_pk(user_id), CART_SK)
}

impl Cart {
    pub fn empty(user_id: &str, now: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            items: Vec::new(),
            version: 0,
            updated_at: now.to_string(),
        }
    }

    pub fn total_amount(&self) -> f64 {
        round_money(
            self.items
                .iter()
                .map(|item| item.price * f64::from(item.quantity))
                .sum(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `quantity` of a food. A food already in the cart keeps its line
    /// (and its original price) and only grows in quantity.
    pub fn add_item(&mut self, food: &Food, quantity: i64) -> Result<(), ApiError> {
        let quantity = positive_quantity(quantity)?;
        match self.items.iter_mut().find(|item| item.food_id == food.id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(quantity);
            }
            None => self.items.push(CartItem {
                id: uuid::Uuid::new_v4().to_string(),
                food_id: food.id.clone(),
                name: food.name.clone(),
                weight: food.weight.clone(),
                quantity,
                price: food.price,
            }),
        }
        Ok(())
    }

    /// Set a line's quantity; zero or less removes the line
    pub fn set_quantity(&mut self, item_id: &str, quantity: i64) -> Result<(), ApiError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| ApiError::NotFound("Cart item not found".into()))?;

        if quantity <= 0 {
            self.items.remove(index);
        } else {
            self.items[index].quantity = positive_quantity(quantity)?;
        }
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: &str) {
        self.items.retain(|item| item.id != item_id);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

fn positive_quantity(quantity: i64) -> Result<u32, ApiError> {
    if quantity < 1 {
        return Err(ApiError::Validation("Quantity must be at least 1".into()));
    }
    u32::try_from(quantity).map_err(|_| ApiError::Validation("Quantity is too large".into()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CartView<'a> {
    user_id: &'a str,
    items: Vec<WithFood<'a, CartItem>>,
    total_amount: f64,
    updated_at: &'a str,
}

/// Render a cart with each line's current menu entry attached
pub fn cart_json(cart: &Cart, foods: &HashMap<String, FoodSummary>) -> Result<serde_json::Value, ApiError> {
    responses::to_value(&CartView {
        user_id: &cart.user_id,
        items: cart
            .items
            .iter()
            .map(|line| WithFood {
                line,
                food: foods.get(&line.food_id),
            })
            .collect(),
        total_amount: cart.total_amount(),
        updated_at: &cart.updated_at,
    })
}

pub fn cart_to_item(cart: &Cart) -> Result<Item, ApiError> {
    let mut item = cart_key(&cart.user_id);
    item.insert("entity_type".into(), items::s(ENTITY_CART));
    item.insert("user_id".into(), items::s(&cart.user_id));
    item.insert("items".into(), items::json_attr(&cart.items)?);
    item.insert("version".into(), items::n(cart.version));
    item.insert("updated_at".into(), items::s(&cart.updated_at));
    Ok(item)
}

pub fn cart_from_item(item: &Item) -> Result<Cart, ApiError> {
    Ok(Cart {
        user_id: items::require_string(item, "user_id")?,
        items: items::get_json(item, "items")?.unwrap_or_default(),
        version: items::get_u64(item, "version").unwrap_or(0),
        updated_at: items::get_string(item, "updated_at").unwrap_or_default(),
    })
}

pub async fn fetch_cart(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Option<Cart>, ApiError> {
    let result = client
        .get_item()
        .table_name(table_name)
        .set_key(Some(cart_key(user_id)))
        .consistent_read(true)
        .send()
        .await?;

    result.item().map(cart_from_item).transpose()
}

/// Put `cart`, provided the stored copy is still at version `expected` (or absent)
fn cart_write_request(
    client: &DynamoClient,
    table_name: &str,
    cart: &Cart,
    expected: u64,
) -> Result<PutItemFluentBuilder, ApiError> {
    Ok(client
        .put_item()
        .table_name(table_name)
        .set_item(Some(cart_to_item(cart)?))
        .condition_expression("attribute_not_exists(PK) OR #version = :expected")
        .expression_attribute_names("#version", "version")
        .expression_attribute_values(":expected", AttributeValue::N(expected.to_string())))
}

/// Write `cart` as the next version. Fails with 409 if someone else wrote first.
pub async fn save_cart(client: &DynamoClient, table_name: &str, cart: &mut Cart) -> Result<(), ApiError> {
    let expected = cart.version;
    cart.version += 1;
    cart.updated_at = timestamp(chrono::Utc::now());

    let result = cart_write_request(client, table_name, cart, expected)?.send().await;

    match result {
        Ok(_) => Ok(()),
        Err(e)
            if e.as_service_error()
                .map(|se| se.is_conditional_check_failed_exception())
                .unwrap_or(false) =>
        {
            tracing::warn!(user_id = %cart.user_id, expected, "Cart write lost a race");
            Err(ApiError::Conflict(
                "Cart was modified by another request, please retry".into(),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

fn existing_cart(cart: Option<Cart>) -> Result<Cart, ApiError> {
    cart.ok_or_else(|| ApiError::NotFound("Cart not found".into()))
}

async fn require_cart(client: &DynamoClient, table_name: &str, user_id: &str) -> Result<Cart, ApiError> {
    existing_cart(fetch_cart(client, table_name, user_id).await?)
}

async fn cart_response(
    client: &DynamoClient,
    table_name: &str,
    message: Option<&str>,
    cart: &Cart,
) -> Result<Response<Body>, ApiError> {
    let foods = foods::fetch_food_summaries(
        client,
        table_name,
        cart.items.iter().map(|line| line.food_id.as_str()),
    )
    .await?;
    let mut fields = serde_json::json!({ "cart": cart_json(cart, &foods)? });
    if let Some(message) = message {
        fields["message"] = serde_json::Value::String(message.to_string());
    }
    Ok(responses::success(StatusCode::OK, fields))
}

/// GET /cart - creates an empty cart on first access
pub async fn get_cart(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
) -> Result<Response<Body>, ApiError> {
    let cart = match fetch_cart(client, table_name, &claims.sub).await? {
        Some(cart) => cart,
        None => {
            let mut cart = Cart::empty(&claims.sub, &timestamp(chrono::Utc::now()));
            save_cart(client, table_name, &mut cart).await?;
            tracing::info!(user_id = %claims.sub, "Created empty cart");
            cart
        }
    };
    cart_response(client, table_name, None, &cart).await
}

/// POST /cart/add
pub async fn add_to_cart(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: AddToCartRequest = responses::parse_body(body)?;
    let quantity = req.quantity.unwrap_or(1);

    let food = foods::fetch_food(client, table_name, &req.food_id)
        .await?
        .filter(|food| food.is_available)
        .ok_or_else(|| ApiError::NotFound("Food item not found or unavailable".into()))?;

    let mut cart = fetch_cart(client, table_name, &claims.sub)
        .await?
        .unwrap_or_else(|| Cart::empty(&claims.sub, ""));
    cart.add_item(&food, quantity)?;
    save_cart(client, table_name, &mut cart).await?;

    tracing::info!(user_id = %claims.sub, food_id = %food.id, quantity, "Added to cart");
    cart_response(client, table_name, Some("Item added to cart successfully"), &cart).await
}

/// PUT /cart/item/{itemId}
pub async fn update_cart_item(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
    item_id: &str,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: UpdateCartItemRequest = responses::parse_body(body)?;

    let mut cart = require_cart(client, table_name, &claims.sub).await?;
    cart.set_quantity(item_id, req.quantity)?;
    save_cart(client, table_name, &mut cart).await?;

    cart_response(client, table_name, Some("Cart updated successfully"), &cart).await
}

/// DELETE /cart/item/{itemId}
pub async fn remove_cart_item(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
    item_id: &str,
) -> Result<Response<Body>, ApiError> {
    let mut cart = require_cart(client, table_name, &claims.sub).await?;
    cart.remove_item(item_id);
    save_cart(client, table_name, &mut cart).await?;

    cart_response(client, table_name, Some("Item removed from cart successfully"), &cart).await
}

/// DELETE /cart/clear
pub async fn clear_cart(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
) -> Result<Response<Body>, ApiError> {
    let mut cart = require_cart(client, table_name, &claims.sub).await?;
    cart.clear();
    save_cart(client, table_name, &mut cart).await?;

    cart_response(client, table_name, Some("Cart cleared successfully"), &cart).await
}
