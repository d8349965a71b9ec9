//! # Catalog
//!
//! Static reference data: ports, the five demo routes, and the lookup tables
//! that turn free-form port names into regions, UN/LOCODE port codes and
//! country codes.
//!
//! All lookups are case-insensitive substring matches evaluated in table
//! order, so earlier entries win.

use serde::{Deserialize, Serialize};

// =============================================================================
// PORTS
// =============================================================================

/// A port with display name and map coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// UN/LOCODE-style identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Port {
    fn new(id: &str, name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            latitude,
            longitude,
        }
    }
}

/// Ports referenced by the demo routes.
pub fn ports() -> Vec<Port> {
    vec![
        Port::new("TWTPE", "Port of Taipei, Taiwan", 25.155, 121.384),
        Port::new("USLAX", "Port of Los Angeles, USA", 33.740, -118.265),
        Port::new("VNSGN", "Port of Ho Chi Minh City, Vietnam", 10.768, 106.706),
        Port::new("JPTYO", "Port of Tokyo, Japan", 35.617, 139.780),
        Port::new("SGSIN", "Port of Singapore, Singapore", 1.264, 103.840),
        Port::new("CNSHA", "Port of Shanghai, China", 31.230, 121.490),
    ]
}

/// Find a port by identifier.
pub fn port(id: &str) -> Option<Port> {
    ports().into_iter().find(|p| p.id.eq_ignore_ascii_case(id))
}

// =============================================================================
// ROUTES
// =============================================================================

/// Identifier of the primary (direct) route.
pub const PRIMARY_ROUTE_ID: &str = "TW-LA";

/// Transit time of the primary route in days.
pub const PRIMARY_TRANSIT_DAYS: i64 = 14;

/// Freight cost of the primary route in USD.
pub const PRIMARY_COST_USD: i64 = 11_000;

/// A predefined route with fixed deltas against the primary route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub name: String,
    /// Origin port id.
    pub origin: String,
    /// Destination port id.
    pub destination: String,
    /// Intermediate port ids, in order.
    pub stops: Vec<String>,
    /// Extra transit days versus the primary route.
    pub time_delta_days: i64,
    /// Extra cost in USD versus the primary route.
    pub cost_delta_usd: i64,
}

impl Route {
    fn new(id: &str, name: &str, stops: &[&str], time_delta_days: i64, cost_delta_usd: i64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            origin: "TWTPE".to_string(),
            destination: "USLAX".to_string(),
            stops: stops.iter().map(|s| (*s).to_string()).collect(),
            time_delta_days,
            cost_delta_usd,
        }
    }

    /// Whether this is the primary route.
    pub fn is_primary(&self) -> bool {
        self.id == PRIMARY_ROUTE_ID
    }

    /// Total transit days.
    pub fn transit_days(&self) -> i64 {
        PRIMARY_TRANSIT_DAYS + self.time_delta_days
    }

    /// Total cost in USD.
    pub fn cost_usd(&self) -> i64 {
        PRIMARY_COST_USD + self.cost_delta_usd
    }

    /// Port ids from origin through stops to destination.
    pub fn port_sequence(&self) -> Vec<&str> {
        let mut seq = Vec::with_capacity(self.stops.len() + 2);
        seq.push(self.origin.as_str());
        seq.extend(self.stops.iter().map(String::as_str));
        seq.push(self.destination.as_str());
        seq
    }

    /// `[lat, lon]` pairs for drawing the route as a polyline.
    ///
    /// Unknown port ids are skipped.
    pub fn path(&self) -> Vec<[f64; 2]> {
        let catalog = ports();
        self.port_sequence()
            .into_iter()
            .filter_map(|id| catalog.iter().find(|p| p.id == id))
            .map(|p| [p.latitude, p.longitude])
            .collect()
    }
}

/// The five demo routes. The primary route comes first.
pub fn demo_routes() -> Vec<Route> {
    vec![
        Route::new(PRIMARY_ROUTE_ID, "Taiwan → Los Angeles (direct)", &[], 0, 0),
        Route::new("TW-VN-LA", "Taiwan → Ho Chi Minh City → Los Angeles", &["VNSGN"], 1, 4_000),
        Route::new("TW-JP-LA", "Taiwan → Tokyo → Los Angeles", &["JPTYO"], 2, 14_000),
        Route::new("TW-SG-LA", "Taiwan → Singapore → Los Angeles", &["SGSIN"], 3, 7_000),
        Route::new("TW-SH-LA", "Taiwan → Shanghai → Los Angeles", &["CNSHA"], 2, 1_000),
    ]
}

// =============================================================================
// REGION LOOKUPS
// =============================================================================

const PORT_TO_REGION: &[(&str, &str)] = &[
    // Asia-Pacific
    ("taipei", "taiwan"),
    ("taiwan", "taiwan"),
    ("shanghai", "china"),
    ("shenzhen", "china"),
    ("hong kong", "china"),
    ("singapore", "singapore"),
    ("busan", "south korea"),
    ("tokyo", "japan"),
    ("yokohama", "japan"),
    ("ho chi minh", "vietnam"),
    ("vietnam", "vietnam"),
    ("bangkok", "thailand"),
    ("jakarta", "indonesia"),
    ("manila", "philippines"),
    ("mumbai", "india"),
    ("chennai", "india"),
    // Middle East
    ("dubai", "uae"),
    ("jeddah", "saudi arabia"),
    // Europe
    ("rotterdam", "netherlands"),
    ("hamburg", "germany"),
    ("antwerp", "belgium"),
    ("london", "uk"),
    ("felixstowe", "uk"),
    ("le havre", "france"),
    ("genoa", "italy"),
    ("barcelona", "spain"),
    ("piraeus", "greece"),
    // North America
    ("los angeles", "usa"),
    ("long beach", "usa"),
    ("new york", "usa"),
    ("newark", "usa"),
    ("savannah", "usa"),
    ("charleston", "usa"),
    ("houston", "usa"),
    ("vancouver", "canada"),
    // South America
    ("santos", "brazil"),
    ("buenos aires", "argentina"),
    ("callao", "peru"),
    // Africa
    ("durban", "south africa"),
    ("cape town", "south africa"),
    ("lagos", "nigeria"),
];

const PORT_CODES: &[(&str, &str)] = &[
    ("port of los angeles", "USLAX"),
    ("port of long beach", "USLGB"),
    ("port of new york", "USNYC"),
    ("port of singapore", "SGSIN"),
    ("port of shanghai", "CNSHA"),
    ("port of rotterdam", "NLRTM"),
    ("port of hamburg", "DEHAM"),
    ("port of busan", "KRBUS"),
    ("port of tokyo", "JPTYO"),
];

const REGION_TO_COUNTRY_CODE: &[(&str, &str)] = &[
    ("usa", "US"),
    ("united states", "US"),
    ("china", "CN"),
    ("japan", "JP"),
    ("south korea", "KR"),
    ("taiwan", "TW"),
    ("vietnam", "VN"),
    ("singapore", "SG"),
    ("thailand", "TH"),
    ("indonesia", "ID"),
    ("philippines", "PH"),
    ("india", "IN"),
    ("uae", "AE"),
    ("saudi arabia", "SA"),
    ("netherlands", "NL"),
    ("germany", "DE"),
    ("belgium", "BE"),
    ("uk", "GB"),
    ("france", "FR"),
    ("italy", "IT"),
    ("spain", "ES"),
    ("greece", "GR"),
    ("canada", "CA"),
    ("brazil", "BR"),
    ("argentina", "AR"),
    ("peru", "PE"),
    ("south africa", "ZA"),
    ("nigeria", "NG"),
];

const REGION_TO_ACLED_COUNTRY: &[(&str, &str)] = &[
    ("south china sea", "China"),
    ("east china sea", "China"),
    ("taiwan", "Taiwan"),
    ("vietnam", "Vietnam"),
    ("japan", "Japan"),
    ("singapore", "Singapore"),
];

const WAYPOINT_REGIONS: &[(&[&str], &str)] = &[
    (&["vietnam", "ho chi minh"], "vietnam"),
    (&["japan", "tokyo"], "japan"),
    (&["singapore"], "singapore"),
    (&["shanghai", "china"], "china"),
    (&["taiwan", "taipei"], "taiwan"),
];

/// Extract a region (lowercase country) from a port name.
///
/// Falls back to the last comma-separated segment for "Port of X, Country".
pub fn extract_region(port_name: &str) -> Option<String> {
    if port_name.trim().is_empty() {
        return None;
    }
    let lower = port_name.to_lowercase();

    if let Some((_, region)) = PORT_TO_REGION.iter().find(|(key, _)| lower.contains(key)) {
        return Some((*region).to_string());
    }

    let (_, country) = port_name.rsplit_once(',')?;
    let country = country.trim().to_lowercase();
    if country == "united states" {
        return Some("usa".to_string());
    }
    Some(country)
}

/// Extract a port code from a port name, if it is a known port.
pub fn extract_port_code(port_name: &str) -> Option<&'static str> {
    let lower = port_name.to_lowercase();
    PORT_CODES
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, code)| *code)
}

/// ISO-3166 alpha-2 code for a region.
///
/// Unknown regions use their first two letters, uppercased.
pub fn country_code(region: &str) -> String {
    let lower = region.to_lowercase();
    REGION_TO_COUNTRY_CODE
        .iter()
        .find(|(key, _)| *key == lower)
        .map(|(_, code)| (*code).to_string())
        .unwrap_or_else(|| region.to_uppercase().chars().take(2).collect())
}

/// Country name ACLED understands for a region, if there is one.
pub fn acled_country(region: &str) -> Option<&'static str> {
    let lower = region.to_lowercase();
    REGION_TO_ACLED_COUNTRY
        .iter()
        .find(|(key, _)| *key == lower)
        .map(|(_, country)| *country)
}

/// Regions implied by waypoint names. Duplicates are removed, order kept.
pub fn waypoint_regions(waypoints: &[String]) -> Vec<String> {
    let mut regions: Vec<String> = Vec::new();
    for waypoint in waypoints {
        let lower = waypoint.to_lowercase();
        let hit = WAYPOINT_REGIONS
            .iter()
            .find(|(keys, _)| keys.iter().any(|k| lower.contains(k)));
        if let Some((_, region)) = hit
            && !regions.iter().any(|r| r == region)
        {
            regions.push((*region).to_string());
        }
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_region_known_ports() {
        assert_eq!(extract_region("Port of Taipei"), Some("taiwan".into()));
        assert_eq!(extract_region("Los Angeles"), Some("usa".into()));
        assert_eq!(extract_region("HONG KONG"), Some("china".into()));
        assert_eq!(extract_region("Port of Felixstowe"), Some("uk".into()));
    }

    #[test]
    fn extract_region_country_suffix() {
        assert_eq!(extract_region("Port of Nowhere, Chile"), Some("chile".into()));
        assert_eq!(
            extract_region("Port of Somewhere, United States"),
            Some("usa".into())
        );
        assert_eq!(extract_region("Atlantis"), None);
        assert_eq!(extract_region(""), None);
    }

    #[test]
    fn extract_port_code_known_ports() {
        assert_eq!(extract_port_code("Port of Los Angeles, USA"), Some("USLAX"));
        assert_eq!(extract_port_code("port of singapore"), Some("SGSIN"));
        assert_eq!(extract_port_code("Los Angeles"), None);
    }

    #[test]
    fn country_code_lookup_and_fallback() {
        assert_eq!(country_code("Taiwan"), "TW");
        assert_eq!(country_code("uk"), "GB");
        assert_eq!(country_code("chile"), "CH");
    }

    #[test]
    fn acled_country_map() {
        assert_eq!(acled_country("South China Sea"), Some("China"));
        assert_eq!(acled_country("japan"), Some("Japan"));
        assert_eq!(acled_country("asia-pacific"), None);
    }

    #[test]
    fn waypoint_regions_dedup() {
        let waypoints = vec![
            "Port of Ho Chi Minh City, Vietnam".to_string(),
            "Port of Tokyo, Japan".to_string(),
            "Vietnam anchorage".to_string(),
        ];
        assert_eq!(waypoint_regions(&waypoints), vec!["vietnam", "japan"]);
    }

    #[test]
    fn demo_routes_shape() {
        let routes = demo_routes();
        assert_eq!(routes.len(), 5);
        assert!(routes[0].is_primary());
        assert_eq!(routes.iter().filter(|r| r.is_primary()).count(), 1);
        assert_eq!(routes[0].transit_days(), PRIMARY_TRANSIT_DAYS);
        assert_eq!(routes[1].cost_usd(), 15_000);
    }

    #[test]
    fn route_path_uses_port_coordinates() {
        let routes = demo_routes();
        let via_tokyo = routes.iter().find(|r| r.id == "TW-JP-LA").unwrap();
        let path = via_tokyo.path();
        assert_eq!(path.len(), 3);
        assert_eq!(path[1], [35.617, 139.780]);
    }
}
