//! End-to-end workflow tests against a real Postgres.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`. Every test
//! creates its own users, so they can share one database.

use std::str::FromStr;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::{postgres::PgConnectOptions, PgPool};
use tower::ServiceExt;
use uuid::Uuid;

use pharmora::{create_app, db::init_db, AppState};

struct TestApp {
    app: Router,
    pool: PgPool,
}

impl TestApp {
    async fn new() -> Self {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://postgres@localhost:5432/pharmora_test".to_string());
        let options = PgConnectOptions::from_str(&url).expect("valid DATABASE_URL");
        let pool = init_db(options, 5).await.expect("database available");
        let app = create_app(AppState::new(pool.clone()), &[], "public/images");
        Self { app, pool }
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Request::builder().method(method).uri(uri), body).await
    }

    /// Same as [`TestApp::call`] but signed in as `user_id`.
    async fn call_as(
        &self,
        user_id: i32,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", user_id.to_string());
        self.send(builder, body).await
    }

    async fn send(&self, builder: axum::http::request::Builder, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn user(&self, role: &str) -> i32 {
        sqlx::query_scalar(
            "INSERT INTO users (name, email, password_hash, role)
             VALUES ($1, $2, 'not-a-real-hash', $3)
             RETURNING user_id",
        )
        .bind(format!("Test {}", role))
        .bind(format!("{}@test.pharmora", Uuid::new_v4()))
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    async fn supplier(&self) -> i32 {
        let user_id = self.user("Supplier").await;
        sqlx::query_scalar(
            "INSERT INTO suppliers (user_id, company_name) VALUES ($1, 'Test Supply')
             RETURNING supplier_id",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    async fn medicine(&self, price: i64, stock: i32) -> i32 {
        sqlx::query_scalar(
            "INSERT INTO medicines (name, price, stock) VALUES ($1, $2, $3)
             RETURNING medicine_id",
        )
        .bind(format!("Medicine {}", Uuid::new_v4()))
        .bind(rust_decimal::Decimal::from(price))
        .bind(stock)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    async fn inventory(&self, supplier_id: i32, medicine_id: i32, quantity: i32) {
        sqlx::query(
            "INSERT INTO supplier_inventory (supplier_id, medicine_id, quantity_available, selling_price)
             VALUES ($1, $2, $3, 10)",
        )
        .bind(supplier_id)
        .bind(medicine_id)
        .bind(quantity)
        .execute(&self.pool)
        .await
        .unwrap();
    }

    async fn available(&self, supplier_id: i32, medicine_id: i32) -> i32 {
        sqlx::query_scalar(
            "SELECT quantity_available FROM supplier_inventory
             WHERE supplier_id = $1 AND medicine_id = $2",
        )
        .bind(supplier_id)
        .bind(medicine_id)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    /// Places a one-line order for `patient` through the API.
    async fn order(&self, patient: i32, price: i64, quantity: i32) -> Value {
        let medicine = self.medicine(price, 100).await;
        let (status, _) = self
            .call(
                Method::POST,
                "/api/cart",
                Some(json!({ "user_id": patient, "medicine_id": medicine, "quantity": quantity })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, order) = self
            .call(
                Method::POST,
                "/api/orders",
                Some(json!({ "user_id": patient, "delivery_address": "12 Main St" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", order);
        order
    }

    async fn stock_request(&self, pharmacist: i32, supplier: i32, medicine: i32, quantity: i32) -> i64 {
        let (status, request) = self
            .call(
                Method::POST,
                "/api/stock-requests",
                Some(json!({
                    "pharmacist_id": pharmacist,
                    "supplier_id": supplier,
                    "medicine_id": medicine,
                    "quantity_requested": quantity,
                    "pharmacy_name": "Corner Pharmacy"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", request);
        id(&request, "request_id")
    }

    async fn verify(&self, doctor: i32, prescription_id: i64) {
        let (status, body) = self
            .call(
                Method::PUT,
                &format!("/api/prescriptions/{}/verify", prescription_id),
                Some(json!({ "doctor_id": doctor, "status": "Verified" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
    }

    async fn eligible_ids(&self, patient: i32) -> Vec<i64> {
        let (_, orders) = self
            .call(Method::GET, &format!("/api/patient/{}/eligible-orders", patient), None)
            .await;
        orders
            .as_array()
            .unwrap()
            .iter()
            .map(|o| id(o, "order_id"))
            .collect()
    }

    async fn upload(&self, patient: i32, doctor: i32, order_id: Option<i64>) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/api/prescriptions",
            Some(json!({
                "patient_id": patient,
                "doctor_id": doctor,
                "order_id": order_id,
                "prescription_image": "data:image/png;base64,iVBORw0KGgo=",
                "notes": "Twice daily"
            })),
        )
        .await
    }
}

fn id(value: &Value, key: &str) -> i64 {
    value[key].as_i64().unwrap_or_else(|| panic!("{} missing in {}", key, value))
}

#[tokio::test]
#[ignore]
async fn checkout_prices_the_cart_and_empties_it() {
    let t = TestApp::new().await;
    let patient = t.user("Patient").await;

    let order = t.order(patient, 100, 2).await;
    assert_eq!(order["status"], "Processing");
    assert_eq!(order["total_price"].as_f64(), Some(200.0));
    assert_eq!(order["items"].as_array().unwrap().len(), 1);

    let (status, cart) = t.call(Method::GET, &format!("/api/cart/{}", patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart, json!([]));

    let (status, body) = t
        .call(
            Method::POST,
            "/api/orders",
            Some(json!({ "user_id": patient, "delivery_address": "12 Main St" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Your cart is empty");
}

#[tokio::test]
#[ignore]
async fn linked_orders_leave_the_eligible_list() {
    let t = TestApp::new().await;
    let patient = t.user("Patient").await;
    let doctor = t.user("Doctor").await;
    let order_id = id(&t.order(patient, 50, 1).await, "order_id");

    let eligible_uri = format!("/api/patient/{}/eligible-orders", patient);
    let (_, eligible) = t.call(Method::GET, &eligible_uri, None).await;
    assert!(eligible
        .as_array()
        .unwrap()
        .iter()
        .any(|o| id(o, "order_id") == order_id));

    let (status, prescription) = t.upload(patient, doctor, Some(order_id)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(prescription["status"], "Pending");
    assert_eq!(id(&prescription, "order_id"), order_id);

    let (_, eligible) = t.call(Method::GET, &eligible_uri, None).await;
    assert!(eligible
        .as_array()
        .unwrap()
        .iter()
        .all(|o| id(o, "order_id") != order_id));

    let (status, _) = t.upload(patient, doctor, Some(order_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn assigned_doctor_decides_once() {
    let t = TestApp::new().await;
    let patient = t.user("Patient").await;
    let doctor = t.user("Doctor").await;
    let other_doctor = t.user("Doctor").await;

    let (_, prescription) = t.upload(patient, doctor, None).await;
    let verify_uri = format!("/api/prescriptions/{}/verify", id(&prescription, "prescription_id"));

    let (status, _) = t
        .call(
            Method::PUT,
            &verify_uri,
            Some(json!({ "doctor_id": other_doctor, "status": "Verified" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, verified) = t
        .call(
            Method::PUT,
            &verify_uri,
            Some(json!({ "doctor_id": doctor, "status": "Verified" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["status"], "Verified");

    let (_, listed) = t
        .call(Method::GET, &format!("/api/prescriptions/{}", patient), None)
        .await;
    assert_eq!(listed[0]["status"], "Verified");

    let (status, _) = t
        .call(
            Method::PUT,
            &verify_uri,
            Some(json!({ "doctor_id": doctor, "status": "Rejected" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn payment_requires_a_verified_prescription_and_happens_once() {
    let t = TestApp::new().await;
    let patient = t.user("Patient").await;
    let doctor = t.user("Doctor").await;
    let order_id = id(&t.order(patient, 100, 2).await, "order_id");

    let pay = |amount: i64| {
        json!({
            "order_id": order_id,
            "user_id": patient,
            "amount": amount,
            "method": "card",
            "card_last_four": "4242"
        })
    };

    let (status, body) = t.call(Method::POST, "/api/payments", Some(pay(200))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Order has no linked prescription");

    let (_, prescription) = t.upload(patient, doctor, Some(order_id)).await;
    let (status, _) = t.call(Method::POST, "/api/payments", Some(pay(200))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    t.call(
        Method::PUT,
        &format!("/api/prescriptions/{}/verify", id(&prescription, "prescription_id")),
        Some(json!({ "doctor_id": doctor, "status": "Verified" })),
    )
    .await;

    let (status, _) = t.call(Method::POST, "/api/payments", Some(pay(150))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, payment) = t.call(Method::POST, "/api/payments", Some(pay(200))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["card_last_four"], "4242");

    let (status, body) = t.call(Method::POST, "/api/payments", Some(pay(200))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "This order has already been paid");
}

#[tokio::test]
#[ignore]
async fn accept_is_refused_when_stock_is_short() {
    let t = TestApp::new().await;
    let pharmacist = t.user("Pharmacist").await;
    let supplier = t.supplier().await;
    let medicine = t.medicine(10, 0).await;
    t.inventory(supplier, medicine, 5).await;

    let (status, request) = t
        .call(
            Method::POST,
            "/api/stock-requests",
            Some(json!({
                "pharmacist_id": pharmacist,
                "supplier_id": supplier,
                "medicine_id": medicine,
                "quantity_requested": 10
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "Pending");

    let (status, body) = t
        .call(
            Method::PUT,
            &format!("/api/stock-requests/{}/accept", id(&request, "request_id")),
            Some(json!({ "supplier_id": supplier })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_type"], "insufficient_stock");
    assert_eq!(t.available(supplier, medicine).await, 5);
}

#[tokio::test]
#[ignore]
async fn delivered_stock_is_applied_once() {
    let t = TestApp::new().await;
    let pharmacist = t.user("Pharmacist").await;
    let supplier = t.supplier().await;
    let medicine = t.medicine(10, 7).await;
    t.inventory(supplier, medicine, 5).await;

    let (_, request) = t
        .call(
            Method::POST,
            "/api/stock-requests",
            Some(json!({
                "pharmacist_id": pharmacist,
                "supplier_id": supplier,
                "medicine_id": medicine,
                "quantity_requested": 3
            })),
        )
        .await;
    let request_id = id(&request, "request_id");
    let action = |name: &str| format!("/api/stock-requests/{}/{}", request_id, name);
    let by_supplier = json!({ "supplier_id": supplier });

    let apply = json!({ "pharmacist_id": pharmacist, "request_id": request_id });
    let (status, _) = t
        .call(Method::POST, "/api/pharmacist/add-to-inventory", Some(apply.clone()))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, accepted) = t.call(Method::PUT, &action("accept"), Some(by_supplier.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "Accepted");
    assert_eq!(t.available(supplier, medicine).await, 2);

    let (status, shipped) = t
        .call(
            Method::PUT,
            &action("ship"),
            Some(json!({ "supplier_id": supplier, "tracking_info": "TRK-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shipped["delivery_status"], "Shipped");

    let (status, delivered) = t.call(Method::PUT, &action("complete"), Some(by_supplier.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["status"], "Completed");
    assert_eq!(delivered["delivery_status"], "Delivered");

    for name in ["accept", "reject", "ship", "deliver"] {
        let (status, _) = t.call(Method::PUT, &action(name), Some(by_supplier.clone())).await;
        assert_eq!(status, StatusCode::CONFLICT, "{} after completion", name);
    }

    let (status, applied) = t
        .call(Method::POST, "/api/pharmacist/add-to-inventory", Some(apply.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(applied["medicine"]["stock"], 10);
    assert_eq!(applied["request"]["applied_to_inventory"], true);

    let (status, body) = t
        .call(Method::POST, "/api/pharmacist/add-to-inventory", Some(apply))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Stock request has already been added to inventory");
}

#[tokio::test]
#[ignore]
async fn pending_prescriptions_can_be_relinked_unlinked_and_deleted() {
    let t = TestApp::new().await;
    let patient = t.user("Patient").await;
    let stranger = t.user("Patient").await;
    let doctor = t.user("Doctor").await;
    let second_doctor = t.user("Doctor").await;
    let first_order = id(&t.order(patient, 40, 1).await, "order_id");
    let second_order = id(&t.order(patient, 60, 1).await, "order_id");

    let (_, prescription) = t.upload(patient, doctor, Some(first_order)).await;
    let prescription_id = id(&prescription, "prescription_id");
    let uri = format!("/api/prescriptions/{}", prescription_id);

    let (_, listed) = t
        .call(Method::GET, &format!("/api/doctor/{}/prescriptions", doctor), None)
        .await;
    assert_eq!(listed[0]["patient_name"], "Test Patient");
    assert_eq!(listed[0]["doctor_name"], "Test Doctor");
    assert_eq!(id(&listed[0], "prescription_id"), prescription_id);

    let (status, _) = t
        .call(Method::PUT, &uri, Some(json!({ "patient_id": stranger, "notes": "x" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, relinked) = t
        .call(
            Method::PUT,
            &uri,
            Some(json!({
                "patient_id": patient,
                "doctor_id": second_doctor,
                "order_id": second_order,
                "notes": "Once daily"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", relinked);
    assert_eq!(id(&relinked, "order_id"), second_order);
    assert_eq!(relinked["notes"], "Once daily");
    assert_eq!(relinked["doctor_id"], second_doctor);
    let eligible = t.eligible_ids(patient).await;
    assert!(eligible.contains(&first_order));
    assert!(!eligible.contains(&second_order));

    let (status, unlinked) = t
        .call(Method::PUT, &uri, Some(json!({ "patient_id": patient, "unlink_order": true })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(unlinked["order_id"].is_null());
    let eligible = t.eligible_ids(patient).await;
    assert!(eligible.contains(&first_order) && eligible.contains(&second_order));

    let (status, _) = t
        .call(Method::DELETE, &format!("{}?patient_id={}", uri, stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t
        .call(Method::DELETE, &format!("{}?patient_id={}", uri, patient), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, listed) = t.call(Method::GET, &format!("/api/prescriptions/{}", patient), None).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
#[ignore]
async fn verified_prescriptions_cannot_be_edited_or_deleted() {
    let t = TestApp::new().await;
    let patient = t.user("Patient").await;
    let doctor = t.user("Doctor").await;
    let order_id = id(&t.order(patient, 40, 1).await, "order_id");

    let (_, prescription) = t.upload(patient, doctor, Some(order_id)).await;
    let prescription_id = id(&prescription, "prescription_id");
    t.verify(doctor, prescription_id).await;
    let uri = format!("/api/prescriptions/{}", prescription_id);

    let (status, body) = t
        .call(Method::PUT, &uri, Some(json!({ "patient_id": patient, "notes": "changed" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Only pending prescriptions can be changed");

    let (status, _) = t
        .call(Method::PUT, &uri, Some(json!({ "patient_id": patient, "unlink_order": true })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .call(Method::DELETE, &format!("{}?patient_id={}", uri, patient), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, listed) = t.call(Method::GET, &format!("/api/prescriptions/{}", patient), None).await;
    assert_eq!(listed[0]["status"], "Verified");
    assert_eq!(listed[0]["notes"], "Twice daily");
    assert_eq!(id(&listed[0], "order_id"), order_id);
}

#[tokio::test]
#[ignore]
async fn order_status_only_moves_forward() {
    let t = TestApp::new().await;
    let patient = t.user("Patient").await;
    let pharmacist = t.user("Pharmacist").await;
    let order_id = id(&t.order(patient, 30, 1).await, "order_id");
    let uri = format!("/api/orders/{}/status", order_id);
    let set = |actor: i32, status: &str| json!({ "actor_id": actor, "status": status });

    let (status, _) = t.call(Method::PUT, &uri, Some(set(patient, "Shipped"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.call(Method::PUT, &uri, Some(set(pharmacist, "Delivered"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, order) = t.call(Method::PUT, &uri, Some(set(pharmacist, "Shipped"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "Shipped");

    for back in ["Processing", "Shipped"] {
        let (status, body) = t.call(Method::PUT, &uri, Some(set(pharmacist, back))).await;
        assert_eq!(status, StatusCode::CONFLICT, "{}", back);
        assert_eq!(body["error_type"], "invalid_state");
    }

    let (status, order) = t.call(Method::PUT, &uri, Some(set(pharmacist, "Delivered"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "Delivered");

    let (status, _) = t.call(Method::PUT, &uri, Some(set(pharmacist, "Processing"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn racing_accepts_cannot_oversell_inventory() {
    let t = TestApp::new().await;
    let pharmacist = t.user("Pharmacist").await;
    let supplier = t.supplier().await;
    let medicine = t.medicine(10, 0).await;
    t.inventory(supplier, medicine, 5).await;

    let first = t.stock_request(pharmacist, supplier, medicine, 4).await;
    let second = t.stock_request(pharmacist, supplier, medicine, 4).await;
    let by_supplier = json!({ "supplier_id": supplier });
    let first_uri = format!("/api/stock-requests/{}/accept", first);
    let second_uri = format!("/api/stock-requests/{}/accept", second);

    let ((a, _), (b, _)) = tokio::join!(
        t.call(Method::PUT, &first_uri, Some(by_supplier.clone())),
        t.call(Method::PUT, &second_uri, Some(by_supplier.clone())),
    );

    let mut statuses = [a.as_u16(), b.as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [200, 409]);
    assert_eq!(t.available(supplier, medicine).await, 1);
}

#[tokio::test]
#[ignore]
async fn dashboards_report_counts_names_and_numeric_money() {
    let t = TestApp::new().await;
    let patient = t.user("Patient").await;
    let doctor = t.user("Doctor").await;
    let pharmacist = t.user("Pharmacist").await;
    let supplier = t.supplier().await;

    let (_, first) = t.upload(patient, doctor, None).await;
    t.upload(patient, doctor, None).await;
    t.verify(doctor, id(&first, "prescription_id")).await;

    let (status, stats) = t.call(Method::GET, &format!("/api/doctor/{}/stats", doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_prescriptions"], 2);
    assert_eq!(stats["pending_prescriptions"], 1);
    assert_eq!(stats["total_patients"], 1);
    assert_eq!(stats["assigned_patients"], 1);

    let (status, patients) = t
        .call(Method::GET, &format!("/api/doctor/{}/patients", doctor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patients.as_array().unwrap().len(), 1);
    assert_eq!(patients[0]["user_id"], patient);
    assert_eq!(patients[0]["prescription_count"], 2);
    assert_eq!(patients[0]["pending_prescriptions"], 1);

    let (status, _) = t
        .call(Method::GET, &format!("/api/doctor/{}/stats", patient), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let profile_uri = format!("/api/pharmacist/user/{}", pharmacist);
    let (status, profile) = t.call(Method::GET, &profile_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(profile["pharmacy_name"].is_null());
    assert!(profile.get("password_hash").is_none());

    let medicine = t.medicine(10, 0).await;
    t.inventory(supplier, medicine, 5).await;
    t.stock_request(pharmacist, supplier, medicine, 2).await;

    let (_, profile) = t.call(Method::GET, &profile_uri, None).await;
    assert_eq!(profile["pharmacy_name"], "Corner Pharmacy");
    assert_eq!(profile["user_id"], pharmacist);

    let (status, stats) = t
        .call(Method::GET, &format!("/api/supplier/{}/stats", supplier), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_inventory_value"].as_f64(), Some(50.0));
    assert_eq!(stats["total_inventory_items"], 1);
    assert_eq!(stats["low_stock_items"], 1);
    assert_eq!(stats["pending_requests"], 1);

    let (status, stats) = t
        .call(Method::GET, &format!("/api/pharmacist/{}/stats", pharmacist), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["pending_requests"], 1);
}

#[tokio::test]
#[ignore]
async fn promoting_a_user_to_supplier_creates_the_supplier_profile() {
    let t = TestApp::new().await;
    let admin = t.user("Admin").await;
    let user = t.user("Patient").await;
    let profile_uri = format!("/api/supplier/user/{}", user);

    let (status, _) = t.call(Method::GET, &profile_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, updated) = t
        .call_as(
            admin,
            Method::PUT,
            &format!("/api/admin/users/{}", user),
            Some(json!({ "role": "supplier" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["role"], "Supplier");

    let (status, supplier) = t.call(Method::GET, &profile_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(supplier["company_name"], "Test Patient");

    // A second update leaves the existing row alone.
    let (status, _) = t
        .call_as(
            admin,
            Method::PUT,
            &format!("/api/admin/users/{}", user),
            Some(json!({ "role": "Supplier", "name": "Renamed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, again) = t.call(Method::GET, &profile_uri, None).await;
    assert_eq!(again["supplier_id"], supplier["supplier_id"]);
}

#[tokio::test]
#[ignore]
async fn cart_lines_cannot_grow_past_the_cap() {
    let t = TestApp::new().await;
    let patient = t.user("Patient").await;
    let medicine = t.medicine(5, 100).await;
    let add = |quantity: i32| json!({ "user_id": patient, "medicine_id": medicine, "quantity": quantity });

    let (status, _) = t.call(Method::POST, "/api/cart", Some(add(999))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = t.call(Method::POST, "/api/cart", Some(add(2))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Quantity cannot be more than 1000");

    let (_, cart) = t.call(Method::GET, &format!("/api/cart/{}", patient), None).await;
    assert_eq!(cart[0]["quantity"], 999);
    assert_eq!(cart[0]["price"].as_f64(), Some(5.0));
}
