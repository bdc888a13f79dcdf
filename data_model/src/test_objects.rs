pub mod tests {
    use crate::{Customer, Order, Product};

    pub fn mock_customer(first_name: &str, last_name: &str, email: &str) -> Customer {
        Customer {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            phone_number: "021 555 0100".to_string(),
            address: "12 Long Street, Cape Town".to_string(),
            ..Default::default()
        }
    }

    pub fn mock_order(first_name: &str, product_name: &str, quantity: i32) -> Order {
        Order {
            first_name: first_name.to_string(),
            product_name: product_name.to_string(),
            quantity,
            shipping_address: "12 Long Street, Cape Town".to_string(),
            total_price: 49.99 * quantity as f64,
            ..Default::default()
        }
    }

    pub fn mock_product(product_name: &str, price: f64) -> Product {
        Product {
            product_name: product_name.to_string(),
            description: format!("{} from the spring catalogue", product_name),
            price,
            stock_quantity: 10,
            image_url: format!("https://images.example.com/{}.png", product_name),
            ..Default::default()
        }
    }
}
