use aws_sdk_dynamodb::{
    operation::update_item::builders::UpdateItemFluentBuilder,
    types::{AttributeValue, Put, ReturnValue, TransactWriteItem, Update},
    Client as DynamoClient,
};
use chrono::{DateTime, Duration, Utc};
use lambda_http::{http::StatusCode, Body, Response};
use serde_json::Value;
use std::collections::HashMap;

use crate::auth::Claims;
use crate::cart::{self, cart_key};
use crate::error::ApiError;
use crate::foods::{self, FoodSummary, WithFood};
use crate::items::{self, Item, ENTITY_ORDER};
use crate::responses;
use crate::users::{self, UserSummary};
use crate::types::{
    timestamp, Cart, CreateOrderRequest, Order, OrderItem, OrderStatus, UpdateOrderStatusRequest,
};

pub const DELIVERY_ESTIMATE_MINUTES: i64 = 45;
const METADATA_SK: &str = "METADATA";

pub fn order_pk(order_id: &str) -> String {
    format!("ORDER#{}", order_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSort {
    Newest,
    Oldest,
}

/// Filters for the admin order list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub sort: Option<OrderSort>,
}

impl OrderQuery {
    pub fn from_params(status: Option<&str>, sort: Option<&str>) -> Result<Self, ApiError> {
        let status = match status.map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(raw.parse()?),
        };
        let sort = match sort {
            Some("newest") => Some(OrderSort::Newest),
            Some("oldest") => Some(OrderSort::Oldest),
            _ => None,
        };
        Ok(Self { status, sort })
    }

    pub fn apply(&self, orders: Vec<Order>) -> Vec<Order> {
        let mut orders: Vec<Order> = orders
            .into_iter()
            .filter(|o| self.status.map(|s| o.status == s).unwrap_or(true))
            .collect();
        match self.sort {
            Some(OrderSort::Newest) => sort_newest_first(&mut orders),
            Some(OrderSort::Oldest) => orders.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            None => {}
        }
        orders
    }
}

fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Snapshot a cart into a new pending order. Prices and weights are copied
/// so later menu edits never change what was ordered.
pub fn order_from_cart(
    id: String,
    cart: &Cart,
    req: CreateOrderRequest,
    now: DateTime<Utc>,
) -> Result<Order, ApiError> {
    if cart.is_empty() {
        return Err(ApiError::EmptyCart);
    }
    req.delivery_address.validate()?;

    let items = cart
        .items
        .iter()
        .map(|item| OrderItem {
            food_id: item.food_id.clone(),
            name: item.name.clone(),
            weight: item.weight.clone(),
            quantity: item.quantity,
            price: item.price,
        })
        .collect();

    let created_at = timestamp(now);
    Ok(Order {
        id,
        user_id: cart.user_id.clone(),
        items,
        total_amount: cart.total_amount(),
        status: OrderStatus::Pending,
        payment_method: req.payment_method,
        delivery_address: req.delivery_address,
        notes: req
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        estimated_delivery_time: timestamp(now + Duration::minutes(DELIVERY_ESTIMATE_MINUTES)),
        created_at: created_at.clone(),
        updated_at: created_at,
    })
}

pub fn order_to_item(order: &Order) -> Result<Item, ApiError> {
    let mut item = items::key(order_pk(&order.id), METADATA_SK);
    item.insert("entity_type".into(), items::s(ENTITY_ORDER));
    item.insert("user_id".into(), items::s(&order.user_id));
    item.insert("items".into(), items::json_attr(&order.items)?);
    item.insert("total_amount".into(), items::n(order.total_amount));
    item.insert("status".into(), items::s(order.status.as_str()));
    item.insert("payment_method".into(), items::s(order.payment_method.as_str()));
    item.insert("delivery_address".into(), items::json_attr(&order.delivery_address)?);
    if let Some(notes) = &order.notes {
        item.insert("notes".into(), items::s(notes));
    }
    item.insert(
        "estimated_delivery_time".into(),
        items::s(&order.estimated_delivery_time),
    );
    item.insert("created_at".into(), items::s(&order.created_at));
    item.insert("updated_at".into(), items::s(&order.updated_at));
    Ok(item)
}

pub fn order_from_item(item: &Item) -> Result<Order, ApiError> {
    let pk = items::require_string(item, "PK")?;
    Ok(Order {
        id: items::id_from_key(&pk).to_string(),
        user_id: items::require_string(item, "user_id")?,
        items: items::get_json(item, "items")?.unwrap_or_default(),
        total_amount: items::require_f64(item, "total_amount")?,
        status: items::require_string(item, "status")?.parse()?,
        payment_method: items::require_string(item, "payment_method")?.parse()?,
        delivery_address: items::get_json(item, "delivery_address")?
            .ok_or_else(|| ApiError::Internal("Stored order is missing 'delivery_address'".into()))?,
        notes: items::get_string(item, "notes"),
        estimated_delivery_time: items::get_string(item, "estimated_delivery_time").unwrap_or_default(),
        created_at: items::get_string(item, "created_at").unwrap_or_default(),
        updated_at: items::get_string(item, "updated_at").unwrap_or_default(),
    })
}

pub async fn fetch_order(
    client: &DynamoClient,
    table_name: &str,
    order_id: &str,
) -> Result<Option<Order>, ApiError> {
    let result = client
        .get_item()
        .table_name(table_name)
        .set_key(Some(items::key(order_pk(order_id), METADATA_SK)))
        .send()
        .await?;

    result.item().map(order_from_item).transpose()
}

pub async fn scan_orders(
    client: &DynamoClient,
    table_name: &str,
    user_id: Option<&str>,
) -> Result<Vec<Order>, ApiError> {
    let filter = user_id.map(|id| ("user_id", items::s(id)));
    let raw = items::scan_entities(client, table_name, ENTITY_ORDER, filter).await?;
    raw.iter().map(order_from_item).collect()
}

/// Persist the order and empty the cart in one transaction. The cart write is
/// conditioned on the version that was read, so a concurrent cart change aborts checkout.
fn checkout_writes(table_name: &str, order: &Order, cart: &Cart) -> Result<(Put, Update), ApiError> {
    let put_order = Put::builder()
        .table_name(table_name)
        .set_item(Some(order_to_item(order)?))
        .condition_expression("attribute_not_exists(PK)")
        .build()?;

    let clear_cart = Update::builder()
        .table_name(table_name)
        .set_key(Some(cart_key(&cart.user_id)))
        .update_expression("SET #items = :items, #version = :next, updated_at = :now")
        .condition_expression("#version = :expected")
        .expression_attribute_names("#items", "items")
        .expression_attribute_names("#version", "version")
        .expression_attribute_values(":items", items::json_attr(&Vec::<OrderItem>::new())?)
        .expression_attribute_values(":next", AttributeValue::N((cart.version + 1).to_string()))
        .expression_attribute_values(":expected", AttributeValue::N(cart.version.to_string()))
        .expression_attribute_values(":now", items::s(&order.created_at))
        .build()?;

    Ok((put_order, clear_cart))
}

async fn place_order(
    client: &DynamoClient,
    table_name: &str,
    order: &Order,
    cart: &Cart,
) -> Result<(), ApiError> {
    let (put_order, clear_cart) = checkout_writes(table_name, order, cart)?;

    let result = client
        .transact_write_items()
        .transact_items(TransactWriteItem::builder().put(put_order).build())
        .transact_items(TransactWriteItem::builder().update(clear_cart).build())
        .send()
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(e)
            if e.as_service_error()
                .map(|se| se.is_transaction_canceled_exception())
                .unwrap_or(false) =>
        {
            tracing::warn!(user_id = %cart.user_id, "Checkout transaction cancelled");
            Err(ApiError::Conflict(
                "Cart changed while placing the order, please review it and try again".into(),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

/// The cart is checked before the body is parsed
fn checkout_input(cart: Option<Cart>, body: &[u8]) -> Result<(Cart, CreateOrderRequest), ApiError> {
    let cart = cart
        .filter(|cart| !cart.is_empty())
        .ok_or(ApiError::EmptyCart)?;
    let req = responses::parse_body(body)?;
    Ok((cart, req))
}

/// POST /orders
pub async fn create_order(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let stored = cart::fetch_cart(client, table_name, &claims.sub).await?;
    let (cart, req) = checkout_input(stored, body)?;

    let order = order_from_cart(uuid::Uuid::new_v4().to_string(), &cart, req, Utc::now())?;

    place_order(client, table_name, &order, &cart).await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %order.user_id,
        total = order.total_amount,
        items = order.items.len(),
        "Order placed"
    );

    Ok(responses::success(
        StatusCode::CREATED,
        serde_json::json!({
            "message": "Order placed successfully",
            "order": order_view(client, table_name, &order).await?,
        }),
    ))
}

/// Render an order with menu entries on its lines and, when known, the customer who placed it
pub fn order_json(
    order: &Order,
    foods: &HashMap<String, FoodSummary>,
    users: Option<&HashMap<String, UserSummary>>,
) -> Result<Value, ApiError> {
    let lines: Vec<_> = order
        .items
        .iter()
        .map(|line| WithFood {
            line,
            food: foods.get(&line.food_id),
        })
        .collect();

    let mut view = responses::to_value(order)?;
    view["items"] = responses::to_value(&lines)?;
    if let Some(users) = users {
        view["user"] = responses::to_value(&users.get(&order.user_id))?;
    }
    Ok(view)
}

/// Look up every food and (optionally) customer the orders refer to in one batch each
async fn order_views(
    client: &DynamoClient,
    table_name: &str,
    orders: &[Order],
    with_users: bool,
) -> Result<Vec<Value>, ApiError> {
    let food_ids: Vec<&str> = orders
        .iter()
        .flat_map(|order| order.items.iter().map(|line| line.food_id.as_str()))
        .collect();
    let foods = foods::fetch_food_summaries(client, table_name, food_ids).await?;
    let users = if with_users {
        let user_ids: Vec<&str> = orders.iter().map(|order| order.user_id.as_str()).collect();
        Some(users::fetch_user_summaries(client, table_name, user_ids).await?)
    } else {
        None
    };

    orders
        .iter()
        .map(|order| order_json(order, &foods, users.as_ref()))
        .collect()
}

async fn order_view(client: &DynamoClient, table_name: &str, order: &Order) -> Result<Value, ApiError> {
    let mut views = order_views(client, table_name, std::slice::from_ref(order), true).await?;
    views
        .pop()
        .ok_or_else(|| ApiError::Internal("Order view missing".into()))
}

fn orders_response(views: Vec<Value>) -> Response<Body> {
    responses::success(
        StatusCode::OK,
        serde_json::json!({
            "count": views.len(),
            "orders": views,
        }),
    )
}

/// GET /orders/my-orders - newest first
pub async fn my_orders(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
) -> Result<Response<Body>, ApiError> {
    let mut orders = scan_orders(client, table_name, Some(&claims.sub)).await?;
    sort_newest_first(&mut orders);
    Ok(orders_response(order_views(client, table_name, &orders, false).await?))
}

/// GET /orders/all
pub async fn all_orders(
    client: &DynamoClient,
    table_name: &str,
    query: &OrderQuery,
) -> Result<Response<Body>, ApiError> {
    let orders = query.apply(scan_orders(client, table_name, None).await?);
    Ok(orders_response(order_views(client, table_name, &orders, true).await?))
}

/// GET /orders/{id} - owner or admin
pub async fn get_order(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
    order_id: &str,
) -> Result<Response<Body>, ApiError> {
    let order = fetch_order(client, table_name, order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".into()))?;
    claims.ensure_owner_or_admin(&order.user_id, "Access denied")?;

    Ok(responses::success(
        StatusCode::OK,
        serde_json::json!({ "order": order_view(client, table_name, &order).await? }),
    ))
}

/// Check the requested status against the one stored on the order.
/// Returns `(current, next)`.
pub fn status_update(
    order: &Order,
    req: &UpdateOrderStatusRequest,
) -> Result<(OrderStatus, OrderStatus), ApiError> {
    let next = order.status.transition(req.status)?;
    Ok((order.status, next))
}

/// The write only lands if the order still has the status that was validated
fn status_update_request(
    client: &DynamoClient,
    table_name: &str,
    order_id: &str,
    current: OrderStatus,
    next: OrderStatus,
    now: DateTime<Utc>,
) -> UpdateItemFluentBuilder {
    client
        .update_item()
        .table_name(table_name)
        .set_key(Some(items::key(order_pk(order_id), METADATA_SK)))
        .update_expression("SET #status = :next, updated_at = :now")
        .condition_expression("#status = :current")
        .expression_attribute_names("#status", "status")
        .expression_attribute_values(":next", items::s(next.as_str()))
        .expression_attribute_values(":current", items::s(current.as_str()))
        .expression_attribute_values(":now", items::s(timestamp(now)))
        .return_values(ReturnValue::AllNew)
}

/// PUT /orders/{id}/status
pub async fn update_order_status(
    client: &DynamoClient,
    table_name: &str,
    claims: &Claims,
    order_id: &str,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: UpdateOrderStatusRequest = responses::parse_body(body)?;

    let order = fetch_order(client, table_name, order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".into()))?;
    let (current, next) = status_update(&order, &req)?;

    let result = status_update_request(client, table_name, order_id, current, next, Utc::now())
        .send()
        .await;

    let updated = match result {
        Ok(output) => output
            .attributes()
            .map(order_from_item)
            .transpose()?
            .ok_or_else(|| ApiError::Internal("Update returned no attributes".into()))?,
        Err(e)
            if e.as_service_error()
                .map(|se| se.is_conditional_check_failed_exception())
                .unwrap_or(false) =>
        {
            return Err(ApiError::Conflict(
                "Order status was changed by someone else, please refresh".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        order_id,
        from = %order.status,
        to = %updated.status,
        admin_id = %claims.sub,
        "Order status updated"
    );

    Ok(responses::success(
        StatusCode::OK,
        serde_json::json!({
            "message": "Order status updated successfully",
            "order": order_view(client, table_name, &updated).await?,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, CartItem, FoodImage, NutritionInfo, PaymentMethod, Role};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    fn address() -> Address {
        Address {
            street: "12 MG Road".into(),
            city: "Pune".into(),
            state: "MH".into(),
            zip_code: "411001".into(),
            country: "India".into(),
        }
    }

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            payment_method: PaymentMethod::Cash,
            delivery_address: address(),
            notes: Some("  leave at door ".into()),
        }
    }

    fn cart_with_items() -> Cart {
        Cart {
            user_id: "cust-1".into(),
            items: vec![
                CartItem {
                    id: "line-1".into(),
                    food_id: "food-1".into(),
                    name: "Whey Protein Shake".into(),
                    weight: Some("330 ml".into()),
                    quantity: 2,
                    price: 416.67,
                },
                CartItem {
                    id: "line-2".into(),
                    food_id: "food-2".into(),
                    name: "Protein Power Bar".into(),
                    weight: None,
                    quantity: 1,
                    price: 333.17,
                },
            ],
            version: 7,
            updated_at: String::new(),
        }
    }

    fn order(id: &str, status: OrderStatus, created_at: &str) -> Order {
        let mut order = order_from_cart(id.into(), &cart_with_items(), request(), now()).unwrap();
        order.status = status;
        order.created_at = created_at.into();
        order
    }

    #[test]
    fn test_empty_cart_rejected() {
        let cart = Cart::empty("cust-1", "");
        assert_eq!(
            order_from_cart("o1".into(), &cart, request(), now()),
            Err(ApiError::EmptyCart)
        );
    }

    #[test]
    fn test_incomplete_address_rejected() {
        let mut req = request();
        req.delivery_address.street = " ".into();
        assert!(matches!(
            order_from_cart("o1".into(), &cart_with_items(), req, now()),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_order_snapshots_cart() {
        let cart = cart_with_items();
        let order = order_from_cart("o1".into(), &cart, request(), now()).unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.user_id, "cust-1");
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].weight.as_deref(), Some("330 ml"));
        assert_eq!(order.items[1].price, 333.17);
        assert_eq!(order.total_amount, cart.total_amount());
        assert_eq!(order.total_amount, 1166.51);
        assert_eq!(order.notes.as_deref(), Some("leave at door"));
        assert_eq!(order.created_at, "2026-05-01T12:00:00.000Z");
        assert_eq!(order.estimated_delivery_time, "2026-05-01T12:45:00.000Z");
    }

    #[test]
    fn test_item_round_trip() {
        let order = order("o1", OrderStatus::Preparing, "2026-05-01T12:00:00.000Z");
        let item = order_to_item(&order).unwrap();
        assert_eq!(items::get_string(&item, "PK").as_deref(), Some("ORDER#o1"));
        assert_eq!(items::get_string(&item, "status").as_deref(), Some("preparing"));
        assert_eq!(order_from_item(&item).unwrap(), order);
    }

    #[test]
    fn test_admin_query() {
        let orders = vec![
            order("a", OrderStatus::Pending, "2026-05-01T10:00:00.000Z"),
            order("b", OrderStatus::Delivered, "2026-05-01T12:00:00.000Z"),
            order("c", OrderStatus::Pending, "2026-05-01T11:00:00.000Z"),
        ];
        let ids = |q: OrderQuery| {
            q.apply(orders.clone())
                .into_iter()
                .map(|o| o.id)
                .collect::<Vec<_>>()
        };

        assert_eq!(ids(OrderQuery::from_params(Some("all"), None).unwrap()), vec!["a", "b", "c"]);
        assert_eq!(
            ids(OrderQuery::from_params(Some("pending"), Some("newest")).unwrap()),
            vec!["c", "a"]
        );
        assert_eq!(
            ids(OrderQuery::from_params(None, Some("oldest")).unwrap()),
            vec!["a", "c", "b"]
        );
        assert!(OrderQuery::from_params(Some("lost"), None).is_err());
    }

    #[test]
    fn test_only_owner_or_admin_sees_order() {
        let order = order("o1", OrderStatus::Pending, "2026-05-01T12:00:00.000Z");
        let owner = Claims { sub: "cust-1".into(), role: Role::Customer, exp: 0 };
        let stranger = Claims { sub: "cust-2".into(), role: Role::Customer, exp: 0 };
        let admin = Claims { sub: "admin-1".into(), role: Role::Admin, exp: 0 };

        assert!(owner.ensure_owner_or_admin(&order.user_id, "Access denied").is_ok());
        assert!(admin.ensure_owner_or_admin(&order.user_id, "Access denied").is_ok());
        assert_eq!(
            stranger.ensure_owner_or_admin(&order.user_id, "Access denied"),
            Err(ApiError::Forbidden("Access denied".into()))
        );
    }

    #[test]
    fn test_stored_status_gates_update() {
        let delivered = order("o1", OrderStatus::Delivered, "2026-05-01T12:00:00.000Z");
        let err = status_update(
            &delivered,
            &UpdateOrderStatusRequest { status: OrderStatus::Cancelled },
        )
        .unwrap_err();
        assert_eq!(
            err,
            ApiError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled,
            }
        );
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let ready = order("o2", OrderStatus::Ready, "2026-05-01T12:00:00.000Z");
        assert_eq!(
            status_update(&ready, &UpdateOrderStatusRequest { status: OrderStatus::Delivered }),
            Ok((OrderStatus::Ready, OrderStatus::Delivered))
        );
    }

    #[test]
    fn test_status_write_is_conditioned_on_read_status() {
        let client = items::offline_client();
        let request = status_update_request(
            &client,
            "protigo",
            "o1",
            OrderStatus::Ready,
            OrderStatus::Delivered,
            now(),
        );
        let input = request.as_input();
        let values = input.get_expression_attribute_values().as_ref().unwrap();

        assert_eq!(input.get_condition_expression().as_deref(), Some("#status = :current"));
        assert_eq!(values.get(":current"), Some(&AttributeValue::S("ready".into())));
        assert_eq!(values.get(":next"), Some(&AttributeValue::S("delivered".into())));
        assert_eq!(
            values.get(":now"),
            Some(&AttributeValue::S("2026-05-01T12:00:00.000Z".into()))
        );
        assert_eq!(
            input.get_key().as_ref().and_then(|key| items::get_string(key, "PK")).as_deref(),
            Some("ORDER#o1")
        );
    }

    #[test]
    fn test_checkout_is_conditioned_on_cart_version() {
        let cart = cart_with_items();
        let order = order_from_cart("o1".into(), &cart, request(), now()).unwrap();
        let (put_order, clear_cart) = checkout_writes("protigo", &order, &cart).unwrap();

        assert_eq!(put_order.condition_expression(), Some("attribute_not_exists(PK)"));
        assert_eq!(put_order.item().get("PK"), Some(&AttributeValue::S("ORDER#o1".into())));

        assert_eq!(clear_cart.condition_expression(), Some("#version = :expected"));
        let values = clear_cart.expression_attribute_values().unwrap();
        assert_eq!(values.get(":expected"), Some(&AttributeValue::N("7".into())));
        assert_eq!(values.get(":next"), Some(&AttributeValue::N("8".into())));
        assert_eq!(values.get(":items"), Some(&AttributeValue::S("[]".into())));
    }

    #[test]
    fn test_cart_checked_before_body() {
        assert_eq!(checkout_input(None, b"").unwrap_err(), ApiError::EmptyCart);
        assert_eq!(
            checkout_input(Some(Cart::empty("cust-1", "")), b"").unwrap_err(),
            ApiError::EmptyCart
        );
        assert_eq!(
            checkout_input(Some(Cart::empty("cust-1", "")), b"not json").unwrap_err(),
            ApiError::EmptyCart
        );
        assert!(matches!(
            checkout_input(Some(cart_with_items()), b""),
            Err(ApiError::Validation(_))
        ));

        let body = br#"{"paymentMethod":"cash","deliveryAddress":{"street":"12 MG Road","city":"Pune","state":"MH","zipCode":"411001","country":"India"}}"#;
        let (cart, req) = checkout_input(Some(cart_with_items()), body).unwrap();
        assert_eq!(cart.version, 7);
        assert_eq!(req.delivery_address, address());
    }

    #[test]
    fn test_order_view_embeds_food_and_customer() {
        let order = order("o1", OrderStatus::Pending, "2026-05-01T12:00:00.000Z");
        let foods = HashMap::from([(
            "food-1".to_string(),
            FoodSummary {
                id: "food-1".into(),
                name: "Whey Protein Shake".into(),
                image: FoodImage {
                    url: "https://img.example/shake.jpg".into(),
                    public_id: None,
                },
                nutrition_info: NutritionInfo {
                    protein: Some(25.0),
                    ..Default::default()
                },
                weight: Some("330 ml".into()),
                is_available: true,
            },
        )]);
        let users = HashMap::from([(
            "cust-1".to_string(),
            UserSummary {
                id: "cust-1".into(),
                name: "Customer User".into(),
                email: "customer@proteinhub.com".into(),
                phone: Some("0987654321".into()),
            },
        )]);

        let view = order_json(&order, &foods, Some(&users)).unwrap();
        assert_eq!(view["items"][0]["price"], 416.67);
        assert_eq!(view["items"][0]["food"]["image"]["url"], "https://img.example/shake.jpg");
        assert!(view["items"][1]["food"].is_null());
        assert_eq!(view["user"]["email"], "customer@proteinhub.com");
        assert_eq!(view["user"]["phone"], "0987654321");
        assert_eq!(view["totalAmount"], 1166.51);

        let without_users = order_json(&order, &foods, None).unwrap();
        assert!(without_users.get("user").is_none());

        let unknown_customer = order_json(&order, &foods, Some(&HashMap::new())).unwrap();
        assert!(unknown_customer["user"].is_null());
    }
}
