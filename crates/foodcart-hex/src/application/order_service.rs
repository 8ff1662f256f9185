use crate::errors::AppError;
use foodcart_types::domain::geo::Coordinate;
use foodcart_types::domain::order::{NewOrder, Order, OrderStatus};
use foodcart_types::domain::ranking::{OrderBoardEntry, RankedCandidate};
use foodcart_types::ports::{Geocoder, Store};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::assignment::{AssignmentError, AssignmentService};
use super::geocoding::CoordinateResolver;

/// Outcome of a customer submission.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    /// `false` when an order for the same phone number already existed.
    pub created: bool,
    pub coordinate: Option<Coordinate>,
    pub geocode_error: Option<String>,
}

pub struct OrderService<R, G> {
    repo: R,
    resolver: Arc<CoordinateResolver<R, G>>,
    assignment: AssignmentService<R, G>,
}

impl<R: Store, G: Geocoder> OrderService<R, G> {
    pub fn new(
        repo: R,
        resolver: Arc<CoordinateResolver<R, G>>,
        assignment: AssignmentService<R, G>,
    ) -> Self {
        Self {
            repo,
            resolver,
            assignment,
        }
    }

    /// Validates and stores a submission, reusing any existing order for
    /// the same phone number.
    ///
    /// The delivery address is geocoded to warm the cache. A geocoding
    /// failure does not fail the order; it is reported in the result.
    pub async fn place_order(&self, input: NewOrder) -> Result<PlacedOrder, AppError> {
        let ids: Vec<Uuid> = input.products.iter().map(|l| l.product).collect();
        let prices: HashMap<Uuid, i64> = self
            .repo
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.price_cents))
            .collect();
        let order = Order::new(input, &prices)?;

        let (order, created) = self.repo.get_or_create_by_phone(order).await?;
        if created {
            info!(order_id = %order.id, lines = order.lines.len(), "order created");
        } else {
            info!(order_id = %order.id, "order already exists for phone number, reusing it");
        }

        let (coordinate, geocode_error) = match self.resolver.resolve(&order.address).await {
            Ok(c) => (Some(c), None),
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "order address could not be geocoded");
                (None, Some(e.to_string()))
            }
        };

        Ok(PlacedOrder {
            order,
            created,
            coordinate,
            geocode_error,
        })
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, AppError> {
        match self.repo.get(id).await? {
            Some(o) => Ok(o),
            None => Err(AppError::NotFound(format!("order {}", id))),
        }
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, AppError> {
        Ok(self.repo.list().await?)
    }

    pub async fn candidates(&self, id: Uuid) -> Result<Vec<RankedCandidate>, AppError> {
        let order = self.get_order(id).await?;
        Ok(self.assignment.rank_candidates(&order).await?)
    }

    /// In-process orders, earliest stage first, each with its ranking.
    pub async fn order_board(&self) -> Result<Vec<OrderBoardEntry>, AppError> {
        let mut orders = self.repo.list_in_process().await?;
        orders.sort_by(|a, b| {
            a.status
                .cmp(&b.status)
                .then(a.registered_at.cmp(&b.registered_at))
        });

        let mut board = Vec::with_capacity(orders.len());
        for order in orders {
            let (candidates, ranking_error) = match self.assignment.rank_candidates(&order).await {
                Ok(c) => (c, None),
                Err(AssignmentError::EmptyOrder) => {
                    warn!(order_id = %order.id, "order without products on the board");
                    (Vec::new(), Some(AssignmentError::EmptyOrder.to_string()))
                }
                Err(e) => return Err(e.into()),
            };
            board.push(OrderBoardEntry {
                total_cents: order.total_cents(),
                order,
                candidates,
                ranking_error,
            });
        }
        Ok(board)
    }

    pub async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, AppError> {
        let mut order = self.get_order(id).await?;
        if order.update_status(status)? {
            self.persist(&order).await?;
            info!(order_id = %id, status = %status, "order status changed");
        }
        Ok(order)
    }

    /// Assigns a restaurant that currently stocks every product of the order.
    pub async fn assign_restaurant(&self, id: Uuid, restaurant_id: Uuid) -> Result<Order, AppError> {
        let mut order = self.get_order(id).await?;
        if self.repo.get_restaurant(restaurant_id).await?.is_none() {
            return Err(AppError::NotFound(format!("restaurant {}", restaurant_id)));
        }
        let candidates = self.assignment.available_restaurants(&order).await?;
        if !candidates.iter().any(|r| r.id == restaurant_id) {
            return Err(AppError::Conflict(format!(
                "restaurant {} does not stock every product of order {}",
                restaurant_id, id
            )));
        }
        order.assign_restaurant(restaurant_id);
        self.persist(&order).await?;
        info!(order_id = %id, restaurant_id = %restaurant_id, "restaurant assigned");
        Ok(order)
    }

    async fn persist(&self, order: &Order) -> Result<(), AppError> {
        if self.repo.save(order).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("order {}", order.id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{restaurant_stocking, FakeGeocoder};
    use crate::application::Services;
    use foodcart_repo::memory::InMemoryRepo;
    use foodcart_types::domain::catalog::{NewProduct, Product};
    use foodcart_types::domain::order::NewOrderLine;
    use foodcart_types::ports::CatalogRepository;

    async fn seeded() -> (InMemoryRepo, Product, Product) {
        let repo = InMemoryRepo::new();
        let mut made = Vec::new();
        for (name, price_cents) in [("Burger", 350), ("Fries", 150)] {
            let p = Product::new(
                NewProduct {
                    name: name.into(),
                    price_cents,
                    category_id: None,
                    description: String::new(),
                    image_url: String::new(),
                    special_status: false,
                },
                None,
            )
            .unwrap();
            made.push(repo.create_product(p).await.unwrap());
        }
        let fries = made.pop().unwrap();
        let burger = made.pop().unwrap();
        (repo, burger, fries)
    }

    fn submission(phone: &str, address: &str, lines: &[(&Product, i64)]) -> NewOrder {
        NewOrder {
            firstname: "Ivan".into(),
            lastname: "Petrov".into(),
            phonenumber: phone.into(),
            address: address.into(),
            products: lines
                .iter()
                .map(|(p, quantity)| NewOrderLine {
                    product: p.id,
                    quantity: *quantity,
                })
                .collect(),
            ..NewOrder::default()
        }
    }

    #[tokio::test]
    async fn place_order_captures_prices_and_geocodes() {
        let (repo, burger, fries) = seeded().await;
        let svc = Services::new(
            repo.clone(),
            FakeGeocoder::new().with("Tverskaya 1", &[(37.61, 55.76)]),
        );

        let placed = svc
            .orders
            .place_order(submission("+79991234567", "Tverskaya 1", &[(&burger, 2), (&fries, 1)]))
            .await
            .unwrap();
        assert!(placed.created);
        assert_eq!(placed.order.total_cents(), 850);
        assert_eq!(placed.coordinate, Some(Coordinate::new(37.61, 55.76)));
        assert!(placed.geocode_error.is_none());

        let got = svc.orders.get_order(placed.order.id).await.unwrap();
        assert_eq!(got.lines.len(), 2);
    }

    #[tokio::test]
    async fn same_phone_twice_stores_one_order() {
        let (repo, burger, _) = seeded().await;
        let svc = Services::new(repo.clone(), FakeGeocoder::new());

        let first = svc
            .orders
            .place_order(submission("+79991234567", "Arbat 1", &[(&burger, 1)]))
            .await
            .unwrap();
        let second = svc
            .orders
            .place_order(submission("8 999 123 45 67", "Arbat 2", &[(&burger, 5)]))
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(second.order.id, first.order.id);
        assert_eq!(second.order.address, "Arbat 1");
        assert_eq!(svc.orders.list_orders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_address_still_places_the_order() {
        let (repo, burger, _) = seeded().await;
        restaurant_stocking(&repo, "X", "x street", &[&burger]).await;
        let svc = Services::new(
            repo.clone(),
            FakeGeocoder::new().with("x street", &[(37.0, 55.0)]),
        );

        let placed = svc
            .orders
            .place_order(submission("+79991234567", "123 Main St", &[(&burger, 1)]))
            .await
            .unwrap();
        assert!(placed.coordinate.is_none());
        assert!(placed.geocode_error.unwrap().contains("123 Main St"));

        let ranked = svc.orders.candidates(placed.order.id).await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].distance.km().is_none());
    }

    #[tokio::test]
    async fn validation_errors_propagate() {
        let (repo, _, _) = seeded().await;
        let svc = Services::new(repo, FakeGeocoder::new());
        let res = svc.orders.place_order(NewOrder::default()).await;
        assert!(matches!(res, Err(AppError::Validation(_))));

        let res = svc
            .orders
            .place_order(submission(
                "+79991234567",
                "Arbat 1",
                &[],
            ))
            .await;
        let Err(AppError::Validation(fields)) = res else {
            panic!("expected validation error");
        };
        assert!(fields.contains("products"));
    }

    #[tokio::test]
    async fn status_moves_forward_only() {
        let (repo, burger, _) = seeded().await;
        let svc = Services::new(repo, FakeGeocoder::new());
        let placed = svc
            .orders
            .place_order(submission("+79991234567", "Arbat 1", &[(&burger, 1)]))
            .await
            .unwrap();
        let id = placed.order.id;

        let cooking = svc.orders.update_status(id, OrderStatus::Cooking).await.unwrap();
        assert_eq!(cooking.status, OrderStatus::Cooking);
        let back = svc
            .orders
            .update_status(id, OrderStatus::ManagerProcessing)
            .await;
        assert!(matches!(back, Err(AppError::Conflict(_))));

        svc.orders.update_status(id, OrderStatus::Ready).await.unwrap();
        assert!(svc.orders.order_board().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_candidates_can_be_assigned() {
        let (repo, burger, fries) = seeded().await;
        let partial = restaurant_stocking(&repo, "Partial", "p street", &[&burger]).await;
        let full = restaurant_stocking(&repo, "Full", "f street", &[&burger, &fries]).await;
        let svc = Services::new(repo, FakeGeocoder::new());
        let placed = svc
            .orders
            .place_order(submission("+79991234567", "Arbat 1", &[(&burger, 1), (&fries, 1)]))
            .await
            .unwrap();
        let id = placed.order.id;

        let refused = svc.orders.assign_restaurant(id, partial.id).await;
        assert!(matches!(refused, Err(AppError::Conflict(_))));
        let missing = svc.orders.assign_restaurant(id, Uuid::new_v4()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let assigned = svc.orders.assign_restaurant(id, full.id).await.unwrap();
        assert_eq!(assigned.restaurant_id, Some(full.id));
    }

    #[tokio::test]
    async fn board_lists_earliest_stage_first() {
        let (repo, burger, _) = seeded().await;
        restaurant_stocking(&repo, "X", "x street", &[&burger]).await;
        let svc = Services::new(repo, FakeGeocoder::new());

        let early = svc
            .orders
            .place_order(submission("+79990000001", "Arbat 1", &[(&burger, 1)]))
            .await
            .unwrap();
        let late = svc
            .orders
            .place_order(submission("+79990000002", "Arbat 2", &[(&burger, 2)]))
            .await
            .unwrap();
        svc.orders
            .update_status(early.order.id, OrderStatus::Cooking)
            .await
            .unwrap();

        let board = svc.orders.order_board().await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].order.id, late.order.id);
        assert_eq!(board[0].total_cents, 700);
        assert_eq!(board[0].candidates.len(), 1);
        assert!(board[0].ranking_error.is_none());
        assert_eq!(board[1].order.id, early.order.id);
    }

    #[tokio::test]
    async fn not_found_paths() {
        let (repo, _, _) = seeded().await;
        let svc = Services::new(repo, FakeGeocoder::new());
        let missing = svc.orders.get_order(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let updated = svc
            .orders
            .update_status(Uuid::new_v4(), OrderStatus::Cooking)
            .await;
        assert!(matches!(updated, Err(AppError::NotFound(_))));

        let ranked = svc.orders.candidates(Uuid::new_v4()).await;
        assert!(matches!(ranked, Err(AppError::NotFound(_))));
    }
}
