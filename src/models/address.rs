use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ServiceError;

/// Parsed delivery address. Produced from the free-text address a customer
/// submits with their order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAddress {
    pub locality: String,
    pub street: String,
    pub house: String,
}

/// Common street-type markers, Latin and Cyrillic. Matching any of them is
/// enough to accept the street segment.
static STREET_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\b|^)(ул\.?|улица|просп\.?|проспект|пр-т|пер\.?|переулок|бульвар|б-р|шоссе|наб\.?|набережная|street|st\.?|avenue|ave\.?|road|rd\.?|lane|ln\.?|boulevard|blvd\.?|drive|dr\.?)(\b|\s|$)",
    )
    .expect("street type regex")
});

static ALPHA_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[\p{Alphabetic}]{3,}").expect("alpha token regex"));

/// Heuristic "looks like a real street name" check: either a recognized
/// street-type token, or at least one alphabetic token of length >= 3.
fn street_looks_real(street: &str) -> bool {
    STREET_TYPE_RE.is_match(street) || ALPHA_TOKEN_RE.is_match(street)
}

/// Parses "locality, street, house" out of a free-text address.
///
/// The first comma-separated segment is the locality, the last one the
/// house, everything between belongs to the street.
pub fn parse_delivery_address(raw: &str) -> Result<DeliveryAddress, ServiceError> {
    let segments: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.len() < 3 {
        return Err(ServiceError::InvalidAddress(
            "expected at least 'locality, street, house'".to_string(),
        ));
    }

    let locality = segments[0].to_string();
    let house = segments[segments.len() - 1].to_string();
    let street = segments[1..segments.len() - 1].join(", ");

    if !house.chars().any(|c| c.is_ascii_digit()) {
        return Err(ServiceError::InvalidAddress(
            "house segment must contain a number".to_string(),
        ));
    }

    if !street_looks_real(&street) {
        return Err(ServiceError::InvalidAddress(format!(
            "'{street}' does not look like a street name"
        )));
    }

    Ok(DeliveryAddress {
        locality,
        street,
        house,
    })
}

/// Validates an optional latitude/longitude pair: both or neither, and
/// within valid ranges.
pub fn validate_coordinates(
    lat: Option<f64>,
    lng: Option<f64>,
) -> Result<Option<(f64, f64)>, ServiceError> {
    match (lat, lng) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng)) => {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ServiceError::InvalidCoordinates(format!(
                    "latitude {lat} out of range"
                )));
            }
            if !(-180.0..=180.0).contains(&lng) {
                return Err(ServiceError::InvalidCoordinates(format!(
                    "longitude {lng} out of range"
                )));
            }
            Ok(Some((lat, lng)))
        }
        _ => Err(ServiceError::InvalidCoordinates(
            "latitude and longitude must be supplied together".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_cyrillic_street_address() {
        let parsed = parse_delivery_address("Springfield, ул. Ленина, дом 44").unwrap();
        assert_eq!(parsed.locality, "Springfield");
        assert_eq!(parsed.street, "ул. Ленина");
        assert_eq!(parsed.house, "дом 44");
    }

    #[test]
    fn parses_latin_street_address() {
        let parsed = parse_delivery_address("Springfield, 12 Evergreen Terrace Street, 5").unwrap();
        assert_eq!(parsed.street, "12 Evergreen Terrace Street");
    }

    #[test]
    fn street_without_type_token_falls_back_to_alpha_check() {
        // No street-type marker, but "Ленина" is an alphabetic token of
        // length >= 3, which the fallback accepts.
        let parsed = parse_delivery_address("Springfield, Ленина, 44").unwrap();
        assert_eq!(parsed.street, "Ленина");
    }

    #[test]
    fn rejects_short_addresses() {
        assert_matches!(
            parse_delivery_address("ул. Ленина, 44"),
            Err(ServiceError::InvalidAddress(_))
        );
        assert_matches!(
            parse_delivery_address(""),
            Err(ServiceError::InvalidAddress(_))
        );
    }

    #[test]
    fn rejects_house_without_number() {
        assert_matches!(
            parse_delivery_address("Springfield, ул. Ленина, дом"),
            Err(ServiceError::InvalidAddress(_))
        );
    }

    #[test]
    fn rejects_garbage_street() {
        assert_matches!(
            parse_delivery_address("Springfield, 12 34 !!, 44"),
            Err(ServiceError::InvalidAddress(_))
        );
    }

    #[test]
    fn coordinates_must_come_in_pairs() {
        assert_matches!(
            validate_coordinates(Some(50.0), None),
            Err(ServiceError::InvalidCoordinates(_))
        );
        assert_matches!(
            validate_coordinates(None, Some(30.0)),
            Err(ServiceError::InvalidCoordinates(_))
        );
        assert_eq!(validate_coordinates(None, None).unwrap(), None);
        assert_eq!(
            validate_coordinates(Some(50.45), Some(30.52)).unwrap(),
            Some((50.45, 30.52))
        );
    }

    #[test]
    fn coordinates_out_of_range_rejected() {
        assert_matches!(
            validate_coordinates(Some(91.0), Some(0.0)),
            Err(ServiceError::InvalidCoordinates(_))
        );
        assert_matches!(
            validate_coordinates(Some(0.0), Some(-180.5)),
            Err(ServiceError::InvalidCoordinates(_))
        );
    }
}
