use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, Utc};
use protigo_shared::{
    foods,
    types::{timestamp, Category, CreateFoodRequest, Food, FoodImage, NutritionInfo, Role},
    users::{self, MIN_PASSWORD_LEN},
    ApiError,
};
use serde_json::{json, Value};

pub const ADMIN_EMAIL: &str = "admin@proteinhub.com";
pub const CUSTOMER_EMAIL: &str = "customer@proteinhub.com";

struct SampleFood {
    name: &'static str,
    description: &'static str,
    price: f64,
    weight: &'static str,
    category: Category,
    image: &'static str,
    ingredients: &'static [&'static str],
    // calories, protein, carbs, fat
    nutrition: [f64; 4],
    preparation_time: u32,
}

const SAMPLE_MENU: [SampleFood; 5] = [
    SampleFood {
        name: "Whey Protein Shake",
        description: "Premium whey protein shake with 25g protein per serving, perfect for muscle recovery",
        price: 416.67,
        weight: "330 ml",
        category: Category::ProteinShake,
        image: "https://images.pexels.com/photos/4052384/pexels-photo-4052384.jpeg",
        ingredients: &["Whey protein isolate", "Milk", "Banana", "Honey"],
        nutrition: [180.0, 25.0, 15.0, 2.0],
        preparation_time: 3,
    },
    SampleFood {
        name: "Protein Power Bar",
        description: "High-protein energy bar with nuts and chocolate, 20g protein per bar",
        price: 333.17,
        weight: "60 g",
        category: Category::ProteinBar,
        image: "https://images.pexels.com/photos/46174/pexels-photo-46174.jpeg",
        ingredients: &["Protein blend", "Almonds", "Dark chocolate", "Oats", "Honey"],
        nutrition: [220.0, 20.0, 18.0, 8.0],
        preparation_time: 0,
    },
    SampleFood {
        name: "Grilled Chicken Breast",
        description: "Lean grilled chicken breast with herbs and spices, 30g protein per serving",
        price: 1084.67,
        weight: "250 g",
        category: Category::ProteinMeal,
        image: "https://images.pexels.com/photos/616354/pexels-photo-616354.jpeg",
        ingredients: &["Chicken breast", "Olive oil", "Herbs", "Spices", "Lemon"],
        nutrition: [280.0, 30.0, 2.0, 6.0],
        preparation_time: 20,
    },
    SampleFood {
        name: "Protein Brownie",
        description: "Delicious protein brownie with 12g protein, guilt-free dessert option",
        price: 416.67,
        weight: "80 g",
        category: Category::ProteinDessert,
        image: "https://images.pexels.com/photos/291528/pexels-photo-291528.jpeg",
        ingredients: &["Protein powder", "Dark chocolate", "Almond flour", "Eggs", "Cocoa"],
        nutrition: [180.0, 12.0, 20.0, 8.0],
        preparation_time: 2,
    },
    SampleFood {
        name: "BCAA Supplement",
        description: "Branched-chain amino acid supplement for muscle recovery and growth",
        price: 2504.17,
        weight: "300 g",
        category: Category::ProteinSupplement,
        image: "https://images.pexels.com/photos/4052384/pexels-photo-4052384.jpeg",
        ingredients: &["BCAA blend", "Electrolytes", "Natural flavors"],
        nutrition: [5.0, 5.0, 1.0, 0.0],
        preparation_time: 1,
    },
];

/// The starter menu, attributed to the given admin
pub fn sample_foods(admin_id: &str, now: DateTime<Utc>) -> Result<Vec<Food>, ApiError> {
    let now = timestamp(now);
    SAMPLE_MENU
        .iter()
        .map(|sample| {
            let [calories, protein, carbs, fat] = sample.nutrition;
            let req = CreateFoodRequest {
                name: sample.name.to_string(),
                description: sample.description.to_string(),
                price: sample.price,
                weight: Some(sample.weight.to_string()),
                category: sample.category,
                image: Some(FoodImage {
                    url: sample.image.to_string(),
                    public_id: None,
                }),
                ingredients: Some(sample.ingredients.iter().map(|i| i.to_string()).collect()),
                nutrition_info: Some(NutritionInfo {
                    calories: Some(calories),
                    protein: Some(protein),
                    carbs: Some(carbs),
                    fat: Some(fat),
                }),
                is_available: Some(true),
                preparation_time: Some(sample.preparation_time),
            };
            foods::new_food(uuid::Uuid::new_v4().to_string(), req, admin_id, &now)
        })
        .collect()
}

fn check_password(field: &str, password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "{} must be at least {} characters",
            field, MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Create the account unless the email is already registered. Returns the user id and whether it was created.
async fn ensure_user(
    client: &DynamoClient,
    table_name: &str,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
    phone: &str,
) -> Result<(String, bool), ApiError> {
    if let Some(existing) = users::find_user_by_email(client, table_name, email).await? {
        tracing::info!(email, "Seed user already present");
        return Ok((existing.id, false));
    }

    let user = users::new_user(name, email, password, role, Some(phone.to_string()))?;
    users::create_user_record(client, table_name, &user).await?;
    tracing::info!(email, role = %role, "Seed user created");
    Ok((user.id, true))
}

pub async fn run(
    client: &DynamoClient,
    table_name: &str,
    admin_password: &str,
    customer_password: &str,
) -> Result<Value, ApiError> {
    check_password("adminPassword", admin_password)?;
    check_password("customerPassword", customer_password)?;

    let (admin_id, admin_created) = ensure_user(
        client,
        table_name,
        "Admin User",
        ADMIN_EMAIL,
        admin_password,
        Role::Admin,
        "1234567890",
    )
    .await?;
    let (_, customer_created) = ensure_user(
        client,
        table_name,
        "Customer User",
        CUSTOMER_EMAIL,
        customer_password,
        Role::Customer,
        "0987654321",
    )
    .await?;

    let mut foods_created = 0;
    if foods::scan_foods(client, table_name).await?.is_empty() {
        for food in sample_foods(&admin_id, Utc::now())? {
            foods::put_food(client, table_name, &food).await?;
            foods_created += 1;
        }
        tracing::info!(count = foods_created, "Sample menu created");
    } else {
        tracing::info!("Menu already has foods, skipping sample menu");
    }

    Ok(json!({
        "adminCreated": admin_created,
        "customerCreated": customer_created,
        "foodsCreated": foods_created,
    }))
}
