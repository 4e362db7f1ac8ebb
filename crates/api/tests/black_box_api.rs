use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use backroom_api::app::services::AppServices;
use backroom_catalog::{Product, ProductId};
use backroom_core::{AggregateId, UserId};

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let services = Arc::new(AppServices::in_memory());
        let app = backroom_api::app::build_app(Arc::clone(&services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            handle,
        }
    }

    fn seed_product(&self, name: &str) -> ProductId {
        let id = ProductId::new(AggregateId::new());
        self.services.catalog().insert(Product {
            id,
            name: name.to_string(),
            stock_quantity: 0,
        });
        id
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn actor() -> String {
    UserId::new().to_string()
}

async fn create_sent_po(
    client: &reqwest::Client,
    srv: &TestServer,
    actor: &str,
    product_id: ProductId,
) -> (String, String) {
    let res = client
        .post(format!("{}/purchases/orders", srv.base_url))
        .header("x-actor-id", actor)
        .json(&json!({
            "supplier_id": AggregateId::new().to_string(),
            "items": [{
                "product_id": product_id.to_string(),
                "quantity": 20,
                "unit_cost": 200,
            }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["status"], "draft");
    // 20 × 2.00 = 40.00, in minor units.
    assert_eq!(created["totals"]["subtotal"], 4000);
    let id = created["id"].as_str().unwrap().to_string();
    let order_number = created["order_number"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/purchases/orders/{}/send", srv.base_url, id))
        .header("x-actor-id", actor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let sent: serde_json::Value = res.json().await.unwrap();
    assert_eq!(sent["status"], "sent");

    (id, order_number)
}

#[tokio::test]
async fn health_is_open() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn actor_header_required_for_domain_routes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/purchases/orders", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/purchases/orders", srv.base_url))
        .header("x-actor-id", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn partial_then_full_receipt_over_http() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = actor();
    let product_id = srv.seed_product("Beans 1kg");

    let (id, order_number) = create_sent_po(&client, &srv, &actor, product_id).await;

    // Receive 15 of 20.
    let res = client
        .post(format!("{}/purchases/orders/{}/receive", srv.base_url, id))
        .header("x-actor-id", &actor)
        .json(&json!({
            "lines": [{ "product_id": product_id.to_string(), "quantity": 15 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["order"]["status"], "partial_received");
    assert_eq!(body["order"]["items"][0]["received_quantity"], 15);
    assert_eq!(body["movements"].as_array().unwrap().len(), 1);
    assert_eq!(body["movements"][0]["previous_stock"], 0);
    assert_eq!(body["movements"][0]["new_stock"], 15);
    assert_eq!(body["movements"][0]["reference"], order_number);

    // Receive the remaining 5.
    let res = client
        .post(format!("{}/purchases/orders/{}/receive", srv.base_url, id))
        .header("x-actor-id", &actor)
        .json(&json!({
            "lines": [{ "product_id": product_id.to_string(), "quantity": 5 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["order"]["status"], "fully_received");
    assert_eq!(body["order"]["items"][0]["received_quantity"], 20);
    assert!(!body["order"]["actual_delivery"].is_null());
    assert_eq!(body["movements"][0]["new_stock"], 20);

    // Ledger query by reference sees both receipts.
    let res = client
        .get(format!(
            "{}/inventory/movements?reference={}",
            srv.base_url, order_number
        ))
        .header("x-actor-id", &actor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn over_receive_is_rejected_with_line_details() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = actor();
    let product_id = srv.seed_product("Beans 1kg");

    let (id, order_number) = create_sent_po(&client, &srv, &actor, product_id).await;

    let res = client
        .post(format!("{}/purchases/orders/{}/receive", srv.base_url, id))
        .header("x-actor-id", &actor)
        .json(&json!({
            "lines": [{ "product_id": product_id.to_string(), "quantity": 25 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "line_conflicts");
    assert_eq!(body["details"].as_array().unwrap().len(), 1);

    // Nothing committed: order untouched, no ledger entries.
    let res = client
        .get(format!("{}/purchases/orders/{}", srv.base_url, id))
        .header("x-actor-id", &actor)
        .send()
        .await
        .unwrap();
    let order: serde_json::Value = res.json().await.unwrap();
    assert_eq!(order["status"], "sent");
    assert_eq!(order["items"][0]["received_quantity"], 0);

    let res = client
        .get(format!(
            "{}/inventory/movements?reference={}",
            srv.base_url, order_number
        ))
        .header("x-actor-id", &actor)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn purchase_order_creation_requires_catalog_products() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = actor();
    let known = srv.seed_product("Beans 1kg");
    let unknown = ProductId::new(AggregateId::new());

    let res = client
        .post(format!("{}/purchases/orders", srv.base_url))
        .header("x-actor-id", &actor)
        .json(&json!({
            "supplier_id": AggregateId::new().to_string(),
            "items": [
                { "product_id": known.to_string(), "quantity": 5, "unit_cost": 200 },
                { "product_id": unknown.to_string(), "quantity": 5, "unit_cost": 200 },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "line_conflicts");
    assert_eq!(body["details"].as_array().unwrap().len(), 1);

    // Nothing was drafted.
    let res = client
        .get(format!("{}/purchases/orders", srv.base_url))
        .header("x-actor-id", &actor)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());

    // Same contract on draft item adds.
    let (id, _) = {
        let res = client
            .post(format!("{}/purchases/orders", srv.base_url))
            .header("x-actor-id", &actor)
            .json(&json!({
                "supplier_id": AggregateId::new().to_string(),
                "items": [{ "product_id": known.to_string(), "quantity": 5, "unit_cost": 200 }],
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let created: serde_json::Value = res.json().await.unwrap();
        (
            created["id"].as_str().unwrap().to_string(),
            created["order_number"].as_str().unwrap().to_string(),
        )
    };
    let res = client
        .post(format!("{}/purchases/orders/{}/items", srv.base_url, id))
        .header("x-actor-id", &actor)
        .json(&json!({
            "product_id": unknown.to_string(),
            "quantity": 3,
            "unit_cost": 100,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "line_conflicts");
}

#[tokio::test]
async fn structural_edits_are_draft_only() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = actor();
    let product_id = srv.seed_product("Beans 1kg");

    let (id, _) = create_sent_po(&client, &srv, &actor, product_id).await;

    let res = client
        .post(format!("{}/purchases/orders/{}/items", srv.base_url, id))
        .header("x-actor-id", &actor)
        .json(&json!({
            "product_id": product_id.to_string(),
            "quantity": 5,
            "unit_cost": 100,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .delete(format!("{}/purchases/orders/{}", srv.base_url, id))
        .header("x-actor-id", &actor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn draft_delete_removes_the_order() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = actor();
    let product_id = srv.seed_product("Beans 1kg");

    let res = client
        .post(format!("{}/purchases/orders", srv.base_url))
        .header("x-actor-id", &actor)
        .json(&json!({
            "supplier_id": AggregateId::new().to_string(),
            "items": [{
                "product_id": product_id.to_string(),
                "quantity": 3,
                "unit_cost": 500,
            }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let res = client
        .delete(format!("{}/purchases/orders/{}", srv.base_url, id))
        .header("x-actor-id", &actor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(format!("{}/purchases/orders/{}", srv.base_url, id))
        .header("x-actor-id", &actor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delivered_order_materializes_exactly_one_sale() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = actor();
    let product_id = srv.seed_product("Grinder");

    let res = client
        .post(format!("{}/orders", srv.base_url))
        .header("x-actor-id", &actor)
        .json(&json!({
            "customer": { "name": "Dana Reyes" },
            "items": [{
                "product_id": product_id.to_string(),
                "quantity": 2,
                "unit_price": 1500,
            }],
            "tax": 240,
            "payment": { "method": "card", "amount": 3240 },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["status"], "pending");
    assert_eq!(created["totals"]["total"], 3240);
    let id = created["id"].as_str().unwrap().to_string();
    let order_number = created["order_number"].as_str().unwrap().to_string();

    let mut sale = serde_json::Value::Null;
    for status in [
        "confirmed",
        "processing",
        "packed",
        "shipped",
        "out_for_delivery",
        "delivered",
    ] {
        let res = client
            .post(format!("{}/orders/{}/status", srv.base_url, id))
            .header("x-actor-id", &actor)
            .json(&json!({ "status": status }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "transition to {status}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["order"]["status"], status);
        sale = body["sale"].clone();
    }

    // Delivery converted the order.
    assert!(!sale.is_null());
    assert_eq!(sale["order_number"], order_number.as_str());
    assert_eq!(sale["totals"]["total"], 3240);
    assert_eq!(
        sale["sale_number"].as_str().unwrap(),
        order_number.replacen("ORD", "SALE", 1)
    );

    let res = client
        .get(format!("{}/sales/{}", srv.base_url, order_number))
        .header("x-actor-id", &actor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: serde_json::Value = res.json().await.unwrap();
    assert_eq!(fetched["sale_number"], sale["sale_number"]);

    // Delivered is terminal; cancellation is refused.
    let res = client
        .post(format!("{}/orders/{}/cancel", srv.base_url, id))
        .header("x-actor-id", &actor)
        .json(&json!({ "reason": "changed mind" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn status_updates_validate_input() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = actor();
    let product_id = srv.seed_product("Grinder");

    let res = client
        .post(format!("{}/orders", srv.base_url))
        .header("x-actor-id", &actor)
        .json(&json!({
            "customer": { "name": "Dana Reyes" },
            "items": [{
                "product_id": product_id.to_string(),
                "quantity": 1,
                "unit_price": 900,
            }],
            "payment": { "method": "cash", "amount": 900 },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    // Unrecognized status.
    let res = client
        .post(format!("{}/orders/{}/status", srv.base_url, id))
        .header("x-actor-id", &actor)
        .json(&json!({ "status": "teleported" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Cancellation does not go through the status endpoint.
    let res = client
        .post(format!("{}/orders/{}/status", srv.base_url, id))
        .header("x-actor-id", &actor)
        .json(&json!({ "status": "cancelled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Unknown order.
    let res = client
        .get(format!("{}/orders/{}", srv.base_url, AggregateId::new()))
        .header("x-actor-id", &actor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancelled_order_history_is_preserved() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = actor();
    let product_id = srv.seed_product("Grinder");

    let res = client
        .post(format!("{}/orders", srv.base_url))
        .header("x-actor-id", &actor)
        .json(&json!({
            "customer": { "name": "Dana Reyes" },
            "items": [{
                "product_id": product_id.to_string(),
                "quantity": 1,
                "unit_price": 900,
            }],
            "payment": { "method": "cash", "amount": 900 },
        }))
        .send()
        .await
        .unwrap();
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/orders/{}/cancel", srv.base_url, id))
        .header("x-actor-id", &actor)
        .json(&json!({ "reason": "customer request" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cancelled: serde_json::Value = res.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");
    let history = cancelled["status_history"].as_array().unwrap();
    assert_eq!(history.first().unwrap()["status"], "pending");
    assert_eq!(history.last().unwrap()["status"], "cancelled");

    // No sale for a cancelled order.
    let order_number = cancelled["order_number"].as_str().unwrap();
    let res = client
        .get(format!("{}/sales/{}", srv.base_url, order_number))
        .header("x-actor-id", &actor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
