//! 商品 API 集成测试

use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;
use common::{create_test_app, login_user, register_user, TestRequest};

async fn create_product(app: &axum::Router, token: &str, body: Value) -> Value {
    let res = TestRequest::post("/api/products")
        .bearer(token)
        .json(body)
        .send(app)
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "create failed: {}", res.json);
    res.json["data"].clone()
}

async fn two_users(app: &axum::Router) -> (String, String) {
    register_user(app, "a@x.com", "p1").await;
    register_user(app, "b@x.com", "p1").await;
    let (a, _) = login_user(app, "a@x.com", "p1").await;
    let (b, _) = login_user(app, "b@x.com", "p1").await;
    (a, b)
}

#[tokio::test]
async fn test_create_product_defaults_and_owner() {
    let app = create_test_app();
    let (a, _) = two_users(&app).await;

    let product = create_product(
        &app,
        &a,
        json!({ "name": "  Desk lamp ", "description": "Warm light", "price": 19.5 }),
    )
    .await;

    assert_eq!(product["name"], "Desk lamp");
    assert_eq!(product["stock"], 0);
    assert_eq!(product["user"]["email"], "a@x.com");
    assert_eq!(product["ownerId"], product["user"]["id"]);
}

#[tokio::test]
async fn test_create_product_requires_auth() {
    let app = create_test_app();

    let res = TestRequest::post("/api/products")
        .json(json!({ "name": "Lamp", "price": 1.0 }))
        .send(&app)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_product_rejects_negative_price() {
    let app = create_test_app();
    let (a, _) = two_users(&app).await;

    let res = TestRequest::post("/api/products")
        .bearer(&a)
        .json(json!({ "name": "Lamp", "price": -1.0 }))
        .send(&app)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_uuid_product_id_is_rejected() {
    let app = create_test_app();
    let (a, _) = two_users(&app).await;

    let res = TestRequest::get("/api/products/not-a-uuid").send(&app).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json["error"]["message"], "Invalid identifier");

    let res = TestRequest::delete("/api/products/not-a-uuid")
        .bearer(&a)
        .send(&app)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json["error"]["code"], 400);
}

#[tokio::test]
async fn test_get_product_is_public() {
    let app = create_test_app();
    let (a, _) = two_users(&app).await;
    let product = create_product(&app, &a, json!({ "name": "Lamp", "price": 1.0 })).await;
    let id = product["id"].as_str().unwrap();

    let res = TestRequest::get(&format!("/api/products/{}", id))
        .send(&app)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["data"]["id"], id);

    let res = TestRequest::get(&format!("/api/products/{}", uuid::Uuid::new_v4()))
        .send(&app)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_and_delete_require_owner() {
    let app = create_test_app();
    let (a, b) = two_users(&app).await;
    let product = create_product(&app, &a, json!({ "name": "Lamp", "price": 1.0 })).await;
    let uri = format!("/api/products/{}", product["id"].as_str().unwrap());

    let res = TestRequest::put(&uri)
        .bearer(&b)
        .json(json!({ "price": 2.0 }))
        .send(&app)
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = TestRequest::delete(&uri).bearer(&b).send(&app).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = TestRequest::put(&uri)
        .bearer(&a)
        .json(json!({ "price": 2.0, "stock": 4 }))
        .send(&app)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["data"]["price"], 2.0);
    assert_eq!(res.json["data"]["stock"], 4);
    assert_eq!(res.json["data"]["name"], "Lamp");

    let res = TestRequest::delete(&uri).bearer(&a).send(&app).await;
    assert_eq!(res.status, StatusCode::OK);

    // 已删除：不存在优先于所有权
    let res = TestRequest::delete(&uri).bearer(&b).send(&app).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_products_pagination() {
    let app = create_test_app();
    let (a, b) = two_users(&app).await;
    for i in 0..3 {
        create_product(&app, &a, json!({ "name": format!("Item {}", i), "price": 1.0 })).await;
    }
    create_product(&app, &b, json!({ "name": "Other", "price": 1.0 })).await;

    let res = TestRequest::get("/api/products?limit=2&offset=1")
        .send(&app)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["data"]["total"], 4);
    assert_eq!(res.json["data"]["limit"], 2);
    assert_eq!(res.json["data"]["offset"], 1);
    assert_eq!(res.json["data"]["products"].as_array().unwrap().len(), 2);

    // 非法参数回退到默认值
    let res = TestRequest::get("/api/products?limit=abc&offset=-5")
        .send(&app)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["data"]["limit"], 10);
    assert_eq!(res.json["data"]["offset"], 0);
    assert_eq!(res.json["data"]["products"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_list_products_search() {
    let app = create_test_app();
    let (a, _) = two_users(&app).await;
    create_product(&app, &a, json!({ "name": "Desk lamp", "price": 1.0 })).await;
    create_product(&app, &a, json!({ "name": "Chair", "description": "Oak", "price": 1.0 })).await;

    let res = TestRequest::get("/api/products?q=oak").send(&app).await;
    assert_eq!(res.json["data"]["total"], 1);
    assert_eq!(res.json["data"]["products"][0]["name"], "Chair");
}

#[tokio::test]
async fn test_my_products_only_lists_own() {
    let app = create_test_app();
    let (a, b) = two_users(&app).await;
    create_product(&app, &a, json!({ "name": "Mine", "price": 1.0 })).await;
    create_product(&app, &b, json!({ "name": "Theirs", "price": 1.0 })).await;

    let res = TestRequest::get("/api/products/my-products")
        .bearer(&a)
        .send(&app)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let products = res.json["data"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Mine");
}

#[tokio::test]
async fn test_deleting_account_removes_products() {
    let app = create_test_app();
    let (a, b) = two_users(&app).await;
    let product = create_product(&app, &a, json!({ "name": "Lamp", "price": 1.0 })).await;
    create_product(&app, &b, json!({ "name": "Other", "price": 1.0 })).await;

    let res = TestRequest::delete("/api/users").bearer(&a).send(&app).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = TestRequest::get(&format!("/api/products/{}", product["id"].as_str().unwrap()))
        .send(&app)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = TestRequest::get("/api/products").send(&app).await;
    assert_eq!(res.json["data"]["total"], 1);
}
