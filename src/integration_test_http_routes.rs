#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{file_upload::FILE_NAME_HEADER, testing::TestService};

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    async fn get_json(router: &Router, uri: &str) -> Value {
        let (status, body) = send(router, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
        serde_json::from_slice(&body).unwrap()
    }

    async fn post_json(router: &Router, uri: &str, payload: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let (status, body) = send(router, request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn customer(first: &str, last: &str, email: &str) -> Value {
        json!({
            "FirstName": first,
            "LastName": last,
            "Email": email,
            "PhoneNumber": "021 555 0100",
            "Address": "12 Long Street"
        })
    }

    fn is_generated_name(name: &str) -> bool {
        name.strip_prefix("file-")
            .is_some_and(|hex| hex.len() == 32 && hex.chars().all(|c| c.is_ascii_hexdigit()))
    }

    #[tokio::test]
    async fn test_health_check() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        let status = get_json(&router, "/").await;
        assert_eq!(status["message"], "Retail storage API is running!");
        assert!(!status["endpoints"].as_array().unwrap().is_empty());
        assert!(status["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_add_customer_then_list_and_search() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        let (status, created) = post_json(
            &router,
            "/AddCustomers",
            customer("John", "Smith", "john@example.com"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["message"], "Customer added successfully");
        let customer_id = created["customerId"].as_str().unwrap().to_string();
        assert!(!customer_id.is_empty());

        let customers = get_json(&router, "/GetCustomers").await;
        let customers = customers.as_array().unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0]["RowKey"], customer_id.as_str());
        assert_eq!(customers[0]["PartitionKey"], "CUSTOMER");
        assert_eq!(customers[0]["FirstName"], "John");
        assert!(customers[0]["Timestamp"].is_string());

        let found = get_json(&router, "/SearchCustomers?searchTerm=john").await;
        assert_eq!(found.as_array().unwrap().len(), 1);
        assert_eq!(found[0]["RowKey"], customer_id.as_str());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_across_fields() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        for payload in [
            customer("John", "Smith", "john@example.com"),
            customer("Alice", "Jones", "a.smith@x.com"),
            customer("Bob", "Brown", "bob@example.com"),
        ] {
            let (status, _) = post_json(&router, "/AddCustomers", payload).await;
            assert_eq!(status, StatusCode::OK);
        }

        let found = get_json(&router, "/SearchCustomers?searchTerm=SMITH").await;
        let mut first_names: Vec<_> = found
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["FirstName"].as_str().unwrap().to_string())
            .collect();
        first_names.sort();
        assert_eq!(first_names, vec!["Alice", "John"]);
    }

    #[tokio::test]
    async fn test_search_requires_term() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        for uri in ["/SearchCustomers", "/SearchCustomers?searchTerm="] {
            let (status, body) = send(&router, Request::get(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, Bytes::from_static(b"searchTerm parameter is required"));
        }
    }

    #[tokio::test]
    async fn test_add_customer_rejects_bad_bodies() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        let cases: [(&'static str, &str); 3] = [
            ("", "Request body is empty"),
            ("null", "Invalid customer data"),
            ("{\"FirstName\": ", "Invalid customer data: "),
        ];
        for (body, expected) in cases {
            let request = Request::post("/AddCustomers")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap();
            let (status, response) = send(&router, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(
                String::from_utf8_lossy(&response).starts_with(expected),
                "{:?}",
                response
            );
        }

        assert!(get_json(&router, "/GetCustomers").await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_client_keys_are_replaced() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        let mut payload = customer("John", "Smith", "john@example.com");
        payload["PartitionKey"] = json!("ORDER");
        payload["RowKey"] = json!("picked-by-client");

        let (status, created) = post_json(&router, "/AddCustomers", payload).await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(created["customerId"], "picked-by-client");

        let customers = get_json(&router, "/GetCustomers").await;
        assert_eq!(customers[0]["PartitionKey"], "CUSTOMER");
        assert_eq!(customers[0]["RowKey"], created["customerId"]);
    }

    #[tokio::test]
    async fn test_raw_upload_generates_name() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        let request = Request::post("/files/upload")
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from("contract body"))
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        let uploaded: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(uploaded["Message"], "Uploaded");
        let file_name = uploaded["FileName"].as_str().unwrap().to_string();
        assert!(is_generated_name(&file_name), "{}", file_name);

        let files = get_json(&router, "/files/list").await;
        assert_eq!(files, json!([file_name]));

        let stored = test_srv
            .service
            .route_state
            .share_directory
            .read_file(&file_name)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, Bytes::from_static(b"contract body"));
    }

    #[tokio::test]
    async fn test_upload_with_query_name_overwrites() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        for content in ["v1", "v2"] {
            let request = Request::post("/files/upload?fileName=terms.txt")
                .body(Body::from(content))
                .unwrap();
            let (status, body) = send(&router, request).await;
            assert_eq!(status, StatusCode::OK);
            let uploaded: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(uploaded["FileName"], "terms.txt");
        }

        let files = get_json(&router, "/files/list").await;
        assert_eq!(files, json!(["terms.txt"]));
        let stored = test_srv
            .service
            .route_state
            .share_directory
            .read_file("terms.txt")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, Bytes::from_static(b"v2"));
    }

    #[tokio::test]
    async fn test_uploaded_names_are_listed_unchanged() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();
        let names = ["50%off.txt", "a#b~c.txt", "dir/evil.txt", "report[1].pdf"];

        for name in names {
            let request = Request::post("/files/upload")
                .header(FILE_NAME_HEADER, name)
                .body(Body::from("content"))
                .unwrap();
            let (status, body) = send(&router, request).await;
            assert_eq!(status, StatusCode::OK);
            let uploaded: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(uploaded["FileName"], name);
        }

        let files = get_json(&router, "/files/list").await;
        let mut listed: Vec<String> = serde_json::from_value(files).unwrap();
        listed.sort();
        assert_eq!(listed, names);
    }

    #[tokio::test]
    async fn test_multipart_upload_header_name_wins() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        let body = "--BOUNDARY\r\n\
                    Content-Disposition: form-data; name=\"file\"; filename=\"invoice.pdf\"\r\n\
                    Content-Type: application/pdf\r\n\
                    \r\n\
                    %PDF-1.7\r\n\
                    --BOUNDARY--\r\n";
        let request = Request::post("/files/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
            .header(FILE_NAME_HEADER, "chosen.pdf")
            .body(Body::from(body))
            .unwrap();
        let (status, response) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        let uploaded: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(uploaded["FileName"], "chosen.pdf");

        let files = get_json(&router, "/files/list").await;
        assert_eq!(files, json!(["chosen.pdf"]));
        let stored = test_srv
            .service
            .route_state
            .share_directory
            .read_file("chosen.pdf")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, Bytes::from_static(b"%PDF-1.7"));
    }

    #[tokio::test]
    async fn test_multipart_upload_errors() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        let request = Request::post("/files/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data")
            .body(Body::from("--BOUNDARY--\r\n"))
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, Bytes::from_static(b"Missing multipart boundary."));

        let request = Request::post("/files/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(
                "--BOUNDARY\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--BOUNDARY--\r\n",
            ))
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            Bytes::from_static(b"No file found in multipart/form-data parts.")
        );

        let request = Request::post("/files/upload").body(Body::empty()).unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, Bytes::from_static(b"Request body is empty."));

        assert!(get_json(&router, "/files/list").await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blob_uploads_get_unique_names() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        let mut names = Vec::new();
        for _ in 0..2 {
            let request = Request::post("/api/UploadBlob")
                .body(Body::from(vec![7u8; 64]))
                .unwrap();
            let (status, body) = send(&router, request).await;
            assert_eq!(status, StatusCode::OK);
            let text = String::from_utf8(body.to_vec()).unwrap();
            let name = text.strip_prefix("Blob uploaded: ").unwrap().to_string();
            assert!(name.starts_with("file-") && name.ends_with(".txt"), "{}", name);
            names.push(name);
        }
        assert_ne!(names[0], names[1]);

        let blobs = get_json(&router, "/api/ListBlobs").await;
        let mut listed: Vec<String> = serde_json::from_value(blobs).unwrap();
        listed.sort();
        names.sort();
        assert_eq!(listed, names);
    }

    #[tokio::test]
    async fn test_add_order_publishes_to_queue() {
        let mut test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();
        let mut listener = test_srv.queue_listener().unwrap();

        let (status, created) = post_json(
            &router,
            "/AddOrders",
            json!({
                "FirstName": "John",
                "ProductName": "Desk",
                "Quantity": 2,
                "ShippingAddress": "12 Long Street",
                "TotalPrice": 299.5
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let order_id = created["orderId"].as_str().unwrap().to_string();

        let text = tokio::time::timeout(Duration::from_secs(5), listener.process_next())
            .await
            .unwrap()
            .unwrap();
        let message: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(message["RowKey"], order_id.as_str());
        assert_eq!(message["ProductName"], "Desk");
        assert_eq!(message["Status"], "PENDING");

        let orders = get_json(&router, "/GetOrders").await;
        assert_eq!(orders.as_array().unwrap().len(), 1);
        assert_eq!(orders[0]["PartitionKey"], "ORDER");
        assert_eq!(orders[0]["Quantity"], 2);
        assert_eq!(orders[0]["TotalPrice"], 299.5);
    }

    #[tokio::test]
    async fn test_add_and_list_products() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        let (status, created) = post_json(
            &router,
            "/AddProducts",
            json!({
                "ProductName": "Lamp",
                "Description": "Desk lamp",
                "Price": 19.5,
                "StockQuantity": 4,
                "ImageUrl": "https://images.example.com/lamp.png"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["message"], "Product added successfully");

        let products = get_json(&router, "/GetProducts").await;
        assert_eq!(products.as_array().unwrap().len(), 1);
        assert_eq!(products[0]["RowKey"], created["productId"]);
        assert_eq!(products[0]["StockQuantity"], 4);

        let (status, _) = post_json(&router, "/AddProducts", Value::Null).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let test_srv = TestService::new().await.unwrap();
        let router = test_srv.router();

        let doc = get_json(&router, "/docs/openapi.json").await;
        assert!(doc["paths"]["/AddCustomers"]["post"].is_object());
        assert!(doc["paths"]["/files/upload"]["post"].is_object());
        for path in ["/files/upload", "/api/UploadBlob"] {
            assert!(
                doc["paths"][path]["post"]["requestBody"]["content"]["application/octet-stream"]
                    .is_object(),
                "{path}"
            );
        }
    }
}
