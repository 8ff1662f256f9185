use foodcart_types::domain::geo::{Coordinate, GeocodeError};
use foodcart_types::ports::{GeocodeCache, Geocoder};
use tracing::{debug, info, warn};

/// Address to coordinate lookup, backed by the geocode cache.
///
/// Takes the provider's first match as the answer. Ambiguous addresses
/// therefore resolve to whatever the provider ranks first; no further
/// disambiguation is attempted.
pub struct CoordinateResolver<C, G> {
    cache: C,
    geocoder: G,
}

impl<C: GeocodeCache, G: Geocoder> CoordinateResolver<C, G> {
    pub fn new(cache: C, geocoder: G) -> Self {
        Self { cache, geocoder }
    }

    pub async fn resolve(&self, address: &str) -> Result<Coordinate, GeocodeError> {
        if address.trim().is_empty() {
            return Err(GeocodeError::AddressNotFound(address.to_owned()));
        }

        match self.cache.lookup(address).await {
            Ok(Some(entry)) => {
                debug!(address, "geocode cache hit");
                return Ok(entry.coordinate);
            }
            Ok(None) => {}
            // A broken cache only costs an extra provider call.
            Err(e) => warn!(address, error = %e, "geocode cache lookup failed"),
        }

        let matches = self.geocoder.geocode(address).await?;
        let Some(&most_relevant) = matches.first() else {
            return Err(GeocodeError::AddressNotFound(address.to_owned()));
        };

        match self.cache.store(address, most_relevant).await {
            Ok(stored) => {
                if stored == most_relevant {
                    info!(address, lon = stored.lon, lat = stored.lat, "geocode cached");
                }
                Ok(stored)
            }
            Err(e) => {
                warn!(address, error = %e, "geocode cache store failed");
                Ok(most_relevant)
            }
        }
    }
}
