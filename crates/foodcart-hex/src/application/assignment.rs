use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use foodcart_types::domain::catalog::Restaurant;
use foodcart_types::domain::geo::{distance_km, Coordinate, GeocodeError};
use foodcart_types::domain::order::Order;
use foodcart_types::domain::ranking::{Distance, RankedCandidate};
use foodcart_types::ports::{CatalogRepository, GeocodeCache, Geocoder, RepoError};
use tracing::{debug, warn};

use super::geocoding::CoordinateResolver;

#[derive(thiserror::Error, Debug)]
pub enum AssignmentError {
    #[error("order has no products")]
    EmptyOrder,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Restaurants that currently stock every distinct product of `order`,
/// ordered by name.
pub async fn available_restaurants<C: CatalogRepository>(
    catalog: &C,
    order: &Order,
) -> Result<Vec<Restaurant>, AssignmentError> {
    let mut seen = HashSet::new();
    let products: Vec<_> = order
        .product_ids()
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect();
    let Some((first, rest)) = products.split_first() else {
        return Err(AssignmentError::EmptyOrder);
    };

    let mut candidates = catalog.restaurants_stocking(*first).await?;
    for product_id in rest {
        if candidates.is_empty() {
            break;
        }
        let stocking: HashSet<_> = catalog
            .restaurants_stocking(*product_id)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        candidates.retain(|r| stocking.contains(&r.id));
    }
    Ok(candidates)
}

/// Ranks candidate restaurants for an order by distance to its delivery
/// address.
pub struct AssignmentService<R, G> {
    catalog: R,
    resolver: Arc<CoordinateResolver<R, G>>,
}

type Memo = HashMap<String, Result<Coordinate, GeocodeError>>;

impl<R, G> AssignmentService<R, G>
where
    R: CatalogRepository + GeocodeCache,
    G: Geocoder,
{
    pub fn new(catalog: R, resolver: Arc<CoordinateResolver<R, G>>) -> Self {
        Self { catalog, resolver }
    }

    pub async fn available_restaurants(
        &self,
        order: &Order,
    ) -> Result<Vec<Restaurant>, AssignmentError> {
        available_restaurants(&self.catalog, order).await
    }

    /// Candidates nearest first. Geocoding failures never fail the ranking:
    /// the affected candidates are kept with an unknown distance, after every
    /// known one.
    pub async fn rank_candidates(
        &self,
        order: &Order,
    ) -> Result<Vec<RankedCandidate>, AssignmentError> {
        let candidates = self.available_restaurants(order).await?;
        if candidates.is_empty() {
            debug!(order_id = %order.id, "no restaurant stocks every product");
            return Ok(Vec::new());
        }

        // Each address is geocoded at most once per ranking, failures included.
        let mut memo = Memo::new();
        let origin = self.resolve(&mut memo, &order.address).await;
        if let Err(e) = &origin {
            warn!(order_id = %order.id, error = %e, "order address could not be geocoded");
        }

        let mut ranked = Vec::with_capacity(candidates.len());
        for restaurant in candidates {
            let destination = self.resolve(&mut memo, &restaurant.address).await;
            let distance = match distance_km(origin.clone().ok(), destination.clone().ok()) {
                Ok(km) => Distance::known(km),
                Err(missing) => {
                    let cause = match (&origin, &destination) {
                        (Err(e), _) => format!("order: {e}"),
                        (_, Err(e)) => format!("restaurant: {e}"),
                        _ => String::new(),
                    };
                    Distance::Unknown {
                        reason: format!("{missing} ({cause})"),
                    }
                }
            };
            ranked.push(RankedCandidate {
                restaurant,
                distance,
            });
        }

        // Vec::sort_by is stable.
        ranked.sort_by(|a, b| a.distance.rank_cmp(&b.distance));
        Ok(ranked)
    }

    async fn resolve(&self, memo: &mut Memo, address: &str) -> Result<Coordinate, GeocodeError> {
        if let Some(hit) = memo.get(address) {
            return hit.clone();
        }
        let resolved = self.resolver.resolve(address).await;
        memo.insert(address.to_owned(), resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{order_with, restaurant_stocking, FakeGeocoder};
    use foodcart_repo::memory::InMemoryRepo;
    use foodcart_types::domain::catalog::{NewProduct, Product};
    use foodcart_types::ports::CatalogRepository;
    use std::sync::atomic::Ordering;

    async fn product(repo: &InMemoryRepo, name: &str) -> Product {
        repo.create_product(
            Product::new(
                NewProduct {
                    name: name.into(),
                    price_cents: 100,
                    category_id: None,
                    description: String::new(),
                    image_url: String::new(),
                    special_status: false,
                },
                None,
            )
            .unwrap(),
        )
        .await
        .unwrap()
    }

    fn service(repo: &InMemoryRepo, geocoder: FakeGeocoder) -> AssignmentService<InMemoryRepo, FakeGeocoder> {
        let resolver = Arc::new(CoordinateResolver::new(repo.clone(), geocoder));
        AssignmentService::new(repo.clone(), resolver)
    }

    #[tokio::test]
    async fn only_restaurants_stocking_every_product_qualify() {
        let repo = InMemoryRepo::new();
        let a = product(&repo, "A").await;
        let b = product(&repo, "B").await;
        restaurant_stocking(&repo, "X", "x street", &[&a]).await;
        let y = restaurant_stocking(&repo, "Y", "y street", &[&a, &b]).await;

        let order = order_with(&[&a, &b]);
        let found = available_restaurants(&repo, &order).await.unwrap();
        assert_eq!(found, vec![y]);
    }

    #[tokio::test]
    async fn unavailable_menu_entries_do_not_count() {
        let repo = InMemoryRepo::new();
        let a = product(&repo, "A").await;
        let x = restaurant_stocking(&repo, "X", "x street", &[&a]).await;
        repo.set_menu_entry(foodcart_types::domain::catalog::MenuEntry {
            restaurant_id: x.id,
            product_id: a.id,
            availability: false,
        })
        .await
        .unwrap();

        let order = order_with(&[&a]);
        assert!(available_restaurants(&repo, &order).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_order_is_rejected() {
        let repo = InMemoryRepo::new();
        let a = product(&repo, "A").await;
        restaurant_stocking(&repo, "X", "x street", &[&a]).await;

        let mut order = order_with(&[&a]);
        order.lines.clear();
        assert!(matches!(
            available_restaurants(&repo, &order).await,
            Err(AssignmentError::EmptyOrder)
        ));
    }

    #[tokio::test]
    async fn nearest_restaurant_ranks_first() {
        let repo = InMemoryRepo::new();
        let a = product(&repo, "A").await;
        // One degree of latitude is ~111.2 km, so these sit ~2 km and ~5 km north.
        restaurant_stocking(&repo, "Far", "far street", &[&a]).await;
        restaurant_stocking(&repo, "Near", "near street", &[&a]).await;
        let geocoder = FakeGeocoder::new()
            .with("Moscow, Arbat 10", &[(37.0, 55.0)])
            .with("near street", &[(37.0, 55.0 + 2.0 / 111.195)])
            .with("far street", &[(37.0, 55.0 + 5.0 / 111.195)]);

        let ranked = service(&repo, geocoder)
            .rank_candidates(&order_with(&[&a]))
            .await
            .unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].restaurant.name, "Near");
        assert_eq!(ranked[1].restaurant.name, "Far");
        let near = ranked[0].distance.km().unwrap();
        let far = ranked[1].distance.km().unwrap();
        assert!((near - 2.0).abs() < 0.01, "near = {near}");
        assert!((far - 5.0).abs() < 0.01, "far = {far}");
    }

    #[tokio::test]
    async fn failed_restaurant_geocode_sorts_last_in_original_order() {
        let repo = InMemoryRepo::new();
        let a = product(&repo, "A").await;
        restaurant_stocking(&repo, "Alpha", "nowhere 1", &[&a]).await;
        restaurant_stocking(&repo, "Beta", "known street", &[&a]).await;
        restaurant_stocking(&repo, "Gamma", "nowhere 2", &[&a]).await;
        let geocoder = FakeGeocoder::new()
            .with("Moscow, Arbat 10", &[(37.0, 55.0)])
            .with("known street", &[(37.0, 55.1)])
            .failing("nowhere 2");

        let ranked = service(&repo, geocoder)
            .rank_candidates(&order_with(&[&a]))
            .await
            .unwrap();
        let names: Vec<_> = ranked.iter().map(|c| c.restaurant.name.as_str()).collect();
        assert_eq!(names, vec!["Beta", "Alpha", "Gamma"]);
        assert!(ranked[0].distance.km().is_some());
        assert!(matches!(ranked[1].distance, Distance::Unknown { .. }));
        assert!(matches!(ranked[2].distance, Distance::Unknown { .. }));
    }

    #[tokio::test]
    async fn unresolvable_order_address_marks_every_candidate_unknown() {
        let repo = InMemoryRepo::new();
        let a = product(&repo, "A").await;
        restaurant_stocking(&repo, "X", "x street", &[&a]).await;
        restaurant_stocking(&repo, "Y", "y street", &[&a]).await;
        let geocoder = FakeGeocoder::new()
            .with("x street", &[(37.0, 55.0)])
            .with("y street", &[(37.1, 55.0)]);

        let mut order = order_with(&[&a]);
        order.address = "123 Main St".into();
        let ranked = service(&repo, geocoder).rank_candidates(&order).await.unwrap();
        assert_eq!(ranked.len(), 2);
        for candidate in &ranked {
            let Distance::Unknown { reason } = &candidate.distance else {
                panic!("expected unknown distance");
            };
            assert!(reason.contains("123 Main St"), "{reason}");
        }
    }

    #[tokio::test]
    async fn shared_addresses_are_geocoded_once() {
        let repo = InMemoryRepo::new();
        let a = product(&repo, "A").await;
        restaurant_stocking(&repo, "X", "food court", &[&a]).await;
        restaurant_stocking(&repo, "Y", "food court", &[&a]).await;
        restaurant_stocking(&repo, "Z", "Moscow, Arbat 10", &[&a]).await;
        let geocoder = FakeGeocoder::new()
            .with("Moscow, Arbat 10", &[(37.0, 55.0)])
            .failing("food court");
        let calls = geocoder.calls();
        let svc = service(&repo, geocoder);

        let ranked = svc.rank_candidates(&order_with(&[&a])).await.unwrap();
        assert_eq!(ranked[0].restaurant.name, "Z");
        assert_eq!(ranked[0].distance.km(), Some(0.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The order address is now cached; the failing one is retried.
        svc.rank_candidates(&order_with(&[&a])).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
