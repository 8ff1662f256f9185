use async_trait::async_trait;
use foodcart_client::{CreateRestaurantRequest, FoodcartClient};
use foodcart_hex::application::Services;
use foodcart_hex::inbound::http::{HttpServer, HttpServerConfig};
use foodcart_repo::memory::InMemoryRepo;
use foodcart_types::domain::catalog::{MenuEntry, NewProduct};
use foodcart_types::domain::geo::{Coordinate, GeocodeError};
use foodcart_types::domain::order::{NewOrder, NewOrderLine, OrderStatus};
use foodcart_types::ports::Geocoder;

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

struct FixedGeocoder;

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, address: &str) -> Result<Vec<Coordinate>, GeocodeError> {
        match address {
            "Moscow, Tverskaya 7" => Ok(vec![Coordinate::new(37.61, 55.76)]),
            "Moscow, Arbat 1" => Ok(vec![Coordinate::new(37.60, 55.752)]),
            "Moscow, Lenina 50" => Ok(vec![Coordinate::new(37.50, 55.65)]),
            _ => Err(GeocodeError::Unavailable("503 Service Unavailable".into())),
        }
    }
}

#[tokio::test]
async fn client_drives_the_full_flow() {
    let port = find_free_port();
    let services = Services::new(InMemoryRepo::new(), FixedGeocoder);
    let server = HttpServer::new(
        services,
        HttpServerConfig {
            port: port.to_string(),
        },
    )
    .await
    .unwrap();
    let handle = tokio::spawn(async move {
        server.run().await.expect("server run");
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let client = FoodcartClient::new(&format!("http://127.0.0.1:{}/", port)).unwrap();

    let category = client.create_category("Pizza").await.unwrap();
    let pizza = client
        .create_product(&NewProduct {
            name: "Margherita".into(),
            price_cents: 590,
            category_id: Some(category.id),
            description: "Tomato, mozzarella".into(),
            image_url: String::new(),
            special_status: true,
        })
        .await
        .unwrap();

    let mut restaurants = Vec::new();
    for (name, address) in [
        ("Lenina", "Moscow, Lenina 50"),
        ("Arbat", "Moscow, Arbat 1"),
        ("Offline", "Moscow, Offline 3"),
    ] {
        let r = client
            .create_restaurant(&CreateRestaurantRequest {
                name: name.into(),
                address: address.into(),
                contact_phone: String::new(),
            })
            .await
            .unwrap();
        client
            .set_menu_entry(MenuEntry {
                restaurant_id: r.id,
                product_id: pizza.id,
                availability: true,
            })
            .await
            .unwrap();
        restaurants.push(r);
    }

    let listed = client.list_restaurants().await.unwrap();
    let names: Vec<_> = listed.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Arbat", "Lenina", "Offline"]);

    let products = client.available_products().await.unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].category.as_ref().map(|c| c.id), Some(category.id));

    let placed = client
        .place_order(&NewOrder {
            firstname: "Olga".into(),
            phonenumber: "+7 495 123-45-67".into(),
            address: "Moscow, Tverskaya 7".into(),
            products: vec![NewOrderLine {
                product: pizza.id,
                quantity: 2,
            }],
            ..NewOrder::default()
        })
        .await
        .unwrap();
    assert!(placed.created);
    assert_eq!(placed.total_cents, 1180);

    let ranked = client.candidates(placed.id).await.unwrap();
    let names: Vec<_> = ranked.iter().map(|c| c.restaurant.name.as_str()).collect();
    assert_eq!(names, vec!["Arbat", "Lenina", "Offline"]);
    assert!(ranked[2].distance.km().is_none());

    let arbat = &restaurants[1];
    client.assign_restaurant(placed.id, arbat.id).await.unwrap();
    let done = client
        .update_status(placed.id, OrderStatus::Ready)
        .await
        .unwrap();
    assert!(done.called_at.is_some());
    assert!(done.delivered_at.is_some());
    assert!(client.order_board().await.unwrap().is_empty());

    let matrix = client.availability_matrix().await.unwrap();
    assert_eq!(matrix.products[0].availability, vec![true, true, true]);

    let back = client.update_status(placed.id, OrderStatus::Cooking).await;
    assert!(back.is_err());

    handle.abort();
}
