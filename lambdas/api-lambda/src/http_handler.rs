use lambda_http::{
    http::{header::ORIGIN, Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use protigo_shared::{
    auth, cart,
    foods::{self, FoodQuery},
    orders::{self, OrderQuery},
    responses,
    types::Role,
    uploads, users, ApiError, AppState,
};
use std::sync::Arc;

/// Main Lambda handler - answers preflights, routes everything else and applies CORS
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let origin = event
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if event.method() == Method::OPTIONS {
        return Ok(responses::preflight(origin.as_deref(), &state.config));
    }

    let response = match route(&event, &state).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };

    Ok(responses::with_cors(response, origin.as_deref(), &state.config))
}

/// Accept both `/api/foods` and `/foods`
fn strip_api_prefix(path: &str) -> &str {
    path.strip_prefix("/api")
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        .unwrap_or(path)
}

fn query_param<'a>(event: &'a Request, name: &str) -> Option<&'a str> {
    event
        .query_string_parameters_ref()
        .and_then(|params| params.first(name))
}

async fn route(event: &Request, state: &AppState) -> Result<Response<Body>, ApiError> {
    let method = event.method();
    let path = strip_api_prefix(event.uri().path());
    let body = event.body();
    let headers = event.headers();
    let config = &state.config;
    let db = &state.dynamo_client;
    let table = config.table_name.as_str();

    tracing::info!(method = %method, path = %path, "API request");

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, parts.as_slice()) {
        (&Method::GET, ["health"]) => Ok(responses::success(
            StatusCode::OK,
            serde_json::json!({ "message": "Server is running!" }),
        )),

        // --- AUTH ---
        (&Method::POST, ["auth", "register"]) => users::register(db, config, body).await,
        (&Method::POST, ["auth", "login"]) => users::login(db, config, body).await,
        (&Method::GET, ["auth", "profile"]) => {
            let claims = auth::authenticate(headers, config)?;
            users::get_profile(db, table, &claims).await
        }
        (&Method::PUT, ["auth", "profile"]) => {
            let claims = auth::authenticate(headers, config)?;
            users::update_profile(db, table, &claims, body).await
        }

        // --- FOODS ---
        (&Method::GET, ["foods"]) => {
            let query = FoodQuery::from_params(
                query_param(event, "category"),
                query_param(event, "search"),
                query_param(event, "sort"),
            )?;
            foods::list_foods(db, table, &query).await
        }
        (&Method::POST, ["foods", "image-upload"]) => {
            auth::authorize(headers, config, Role::Admin)?;
            uploads::presign_food_image(&state.s3_client, &config.image_bucket, body).await
        }
        (&Method::GET, ["foods", food_id]) => foods::get_food(db, table, food_id).await,
        (&Method::POST, ["foods"]) => {
            let claims = auth::authorize(headers, config, Role::Admin)?;
            foods::create_food(db, table, &claims, body).await
        }
        (&Method::PUT, ["foods", food_id]) => {
            let claims = auth::authorize(headers, config, Role::Admin)?;
            foods::update_food(db, table, &claims, food_id, body).await
        }
        (&Method::DELETE, ["foods", food_id]) => {
            let claims = auth::authorize(headers, config, Role::Admin)?;
            foods::delete_food(db, table, &claims, food_id).await
        }

        // --- CART ---
        (&Method::GET, ["cart"]) => {
            let claims = auth::authorize(headers, config, Role::Customer)?;
            cart::get_cart(db, table, &claims).await
        }
        (&Method::POST, ["cart", "add"]) => {
            let claims = auth::authorize(headers, config, Role::Customer)?;
            cart::add_to_cart(db, table, &claims, body).await
        }
        (&Method::PUT, ["cart", "item", item_id]) => {
            let claims = auth::authorize(headers, config, Role::Customer)?;
            cart::update_cart_item(db, table, &claims, item_id, body).await
        }
        (&Method::DELETE, ["cart", "item", item_id]) => {
            let claims = auth::authorize(headers, config, Role::Customer)?;
            cart::remove_cart_item(db, table, &claims, item_id).await
        }
        (&Method::DELETE, ["cart", "clear"]) => {
            let claims = auth::authorize(headers, config, Role::Customer)?;
            cart::clear_cart(db, table, &claims).await
        }

        // --- ORDERS ---
        (&Method::POST, ["orders"]) => {
            let claims = auth::authorize(headers, config, Role::Customer)?;
            orders::create_order(db, table, &claims, body).await
        }
        (&Method::GET, ["orders", "my-orders"]) => {
            let claims = auth::authorize(headers, config, Role::Customer)?;
            orders::my_orders(db, table, &claims).await
        }
        (&Method::GET, ["orders", "all"]) => {
            auth::authorize(headers, config, Role::Admin)?;
            let query = OrderQuery::from_params(query_param(event, "status"), query_param(event, "sort"))?;
            orders::all_orders(db, table, &query).await
        }
        (&Method::GET, ["orders", order_id]) => {
            let claims = auth::authenticate(headers, config)?;
            orders::get_order(db, table, &claims, order_id).await
        }
        (&Method::PUT, ["orders", order_id, "status"]) => {
            let claims = auth::authorize(headers, config, Role::Admin)?;
            orders::update_order_status(db, table, &claims, order_id, body).await
        }

        _ => {
            tracing::warn!(method = %method, path = %path, "No route matched");
            Ok(responses::not_found())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
    use chrono::Utc;
    use protigo_shared::Config;
    use std::collections::HashMap;

    const ORIGIN_OK: &str = "http://localhost:5173";

    fn state() -> Arc<AppState> {
        let dynamo_conf = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "static"))
            .build();
        let s3_conf = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                "test", "test", None, None, "static",
            ))
            .build();
        let config = Config::from_lookup(|key| match key {
            "TOKEN_SECRET" => Some("0123456789abcdef0123456789abcdef".to_string()),
            _ => None,
        })
        .unwrap();

        AppState::new(
            aws_sdk_dynamodb::Client::from_conf(dynamo_conf),
            aws_sdk_s3::Client::from_conf(s3_conf),
            config,
        )
    }

    fn token(state: &AppState, role: Role) -> String {
        let claims = auth::claims_for("user-1", role, &state.config, Utc::now().timestamp()).unwrap();
        format!("Bearer {}", auth::issue_token(&claims, &state.config.token_secret).unwrap())
    }

    fn request(method: &str, uri: &str, auth_header: Option<&str>, body: &str) -> Request {
        let mut builder = lambda_http::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("Origin", ORIGIN_OK)
            .header("Content-Type", "application/json");
        if let Some(value) = auth_header {
            builder = builder.header("Authorization", value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn call(state: &Arc<AppState>, req: Request) -> (StatusCode, serde_json::Value, Response<Body>) {
        let response = function_handler(req, Arc::clone(state)).await.unwrap();
        let json = if response.body().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(response.body()).unwrap()
        };
        (response.status(), json, response)
    }

    #[test]
    fn test_strip_api_prefix() {
        assert_eq!(strip_api_prefix("/api/foods"), "/foods");
        assert_eq!(strip_api_prefix("/foods"), "/foods");
        assert_eq!(strip_api_prefix("/api"), "");
        assert_eq!(strip_api_prefix("/apiary"), "/apiary");
    }

    #[tokio::test]
    async fn test_preflight() {
        let state = state();
        let (status, _, response) = call(&state, request("OPTIONS", "/api/orders", None, "")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            ORIGIN_OK
        );
        assert!(response.headers().get("access-control-allow-methods").is_some());
    }

    #[tokio::test]
    async fn test_health_and_unknown_route() {
        let state = state();
        let (status, json, response) = call(&state, request("GET", "/api/health", None, "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Server is running!");
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            ORIGIN_OK
        );

        let (status, json, _) = call(&state, request("GET", "/api/menu", None, "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Route not found");
    }

    #[tokio::test]
    async fn test_protected_routes_need_token() {
        let state = state();
        let (status, json, _) = call(&state, request("GET", "/api/cart", None, "")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Not authorized, no token");

        let (status, json, _) =
            call(&state, request("GET", "/api/orders/my-orders", Some("Bearer forged.token"), "")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["message"], "Not authorized, token failed");
    }

    #[tokio::test]
    async fn test_role_checks() {
        let state = state();
        let admin = token(&state, Role::Admin);
        let customer = token(&state, Role::Customer);

        let (status, _, _) = call(&state, request("POST", "/api/cart/add", Some(&admin), "{}")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = call(
            &state,
            request("PUT", "/api/orders/o1/status", Some(&customer), r#"{"status":"confirmed"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = call(&state, request("GET", "/api/orders/all", Some(&customer), "")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_malformed_bodies_rejected() {
        let state = state();
        let (status, json, _) = call(&state, request("POST", "/api/auth/register", None, "not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        let admin = token(&state, Role::Admin);
        let (status, _, _) = call(
            &state,
            request("POST", "/api/foods", Some(&admin), r#"{"name":"Shake","price":-1}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let req = request("GET", "/api/foods", None, "").with_query_string_parameters(HashMap::from([(
            "category".to_string(),
            "snacks".to_string(),
        )]));
        let (status, _, _) = call(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_image_upload_presign() {
        let state = state();
        let admin = token(&state, Role::Admin);
        let (status, json, _) = call(
            &state,
            request(
                "POST",
                "/api/foods/image-upload",
                Some(&admin),
                r#"{"fileName":"shake.png","contentType":"image/png"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let key = json["key"].as_str().unwrap();
        assert!(key.starts_with("foods/") && key.ends_with(".png"));
        assert!(json["uploadUrl"].as_str().unwrap().contains("X-Amz-Signature"));
        assert_eq!(
            json["imageUrl"],
            format!("https://protigo-food-images.s3.amazonaws.com/{}", key)
        );
    }
}
