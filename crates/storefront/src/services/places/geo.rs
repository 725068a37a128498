//! Distance helpers for provider search.

use super::LatLng;
use crate::models::{ProviderApplication, ProviderListing};

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in kilometres.
#[must_use]
pub fn haversine_km(a: LatLng, b: LatLng) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Listings for providers within `radius_km` of `origin`, nearest first.
///
/// Providers without a geocoded location are left out.
#[must_use]
pub fn providers_within_radius(
    origin: LatLng,
    providers: &[ProviderApplication],
    radius_km: f64,
) -> Vec<ProviderListing> {
    let mut hits: Vec<ProviderListing> = providers
        .iter()
        .filter_map(|provider| {
            let distance = haversine_km(origin, provider.location?);
            (distance <= radius_km).then(|| ProviderListing {
                distance_km: Some(distance),
                ..ProviderListing::from(provider)
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use brnno_core::wizard::provider::{ProviderApplicationDraft, ProviderApplicationRecord};
    use brnno_core::{ProviderId, UserId};

    use super::*;

    const PROVO: LatLng = LatLng {
        lat: 40.2338,
        lng: -111.6585,
    };
    const OREM: LatLng = LatLng {
        lat: 40.2969,
        lng: -111.6946,
    };
    const SALT_LAKE: LatLng = LatLng {
        lat: 40.7608,
        lng: -111.8910,
    };

    fn provider(id: &str, location: Option<LatLng>) -> ProviderApplication {
        let draft = ProviderApplicationDraft {
            business_name: Some(format!("Shine {id}")),
            ..ProviderApplicationDraft::default()
        };
        ProviderApplication {
            id: ProviderId::new(id),
            record: ProviderApplicationRecord::new(&draft, UserId::new("u")),
            submitted_at: Utc::now(),
            reviewed_at: None,
            payout_account_id: None,
            location,
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        let km = haversine_km(PROVO, SALT_LAKE);
        assert!((km - 62.0).abs() < 2.0, "got {km}");
        assert!(haversine_km(PROVO, PROVO).abs() < f64::EPSILON);
    }

    #[test]
    fn test_within_radius_sorted_and_filtered() {
        let providers = vec![
            provider("slc", Some(SALT_LAKE)),
            provider("orem", Some(OREM)),
            provider("nowhere", None),
            provider("provo", Some(PROVO)),
        ];
        let hits = providers_within_radius(PROVO, &providers, 25.0);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["provo", "orem"]);
        assert!(hits.iter().all(|h| h.distance_km.is_some()));
    }
}
