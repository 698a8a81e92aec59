//! GeoIP2 record types
//!
//! The building blocks of the City, Country and Enterprise responses. Every
//! field is optional in the data: a missing key maps to `None`, `false` or
//! an empty collection rather than an error.

use crate::data_section::DataValue;
use crate::locale::select_name;
use ipnetwork::IpNetwork;
use serde::Serialize;
use std::collections::BTreeMap;

/// What a lookup knows besides the decoded record
#[derive(Debug, Clone)]
pub(crate) struct LookupContext<'a> {
    pub ip_address: String,
    pub prefix_len: u8,
    pub network: IpNetwork,
    pub locales: &'a [String],
}

pub(crate) fn string_field(record: Option<&DataValue>, key: &str) -> Option<String> {
    record?.get(key)?.as_str().map(str::to_owned)
}

pub(crate) fn uint_field<T: TryFrom<u64>>(record: Option<&DataValue>, key: &str) -> Option<T> {
    T::try_from(record?.get(key)?.as_u64()?).ok()
}

pub(crate) fn float_field(record: Option<&DataValue>, key: &str) -> Option<f64> {
    record?.get(key)?.as_f64()
}

pub(crate) fn bool_field(record: Option<&DataValue>, key: &str) -> bool {
    record
        .and_then(|r| r.get(key))
        .and_then(DataValue::as_bool)
        .unwrap_or(false)
}

fn names_field(record: Option<&DataValue>) -> BTreeMap<String, String> {
    record
        .and_then(|r| r.get("names"))
        .and_then(DataValue::as_map)
        .map(|names| {
            names
                .iter()
                .filter_map(|(locale, name)| name.as_str().map(|n| (locale.clone(), n.to_owned())))
                .collect()
        })
        .unwrap_or_default()
}

/// Localized names plus the one picked for the reader's locales
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Names {
    /// Name in the first preferred locale the record has
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Every name in the record, keyed by locale code
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub names: BTreeMap<String, String>,
}

impl Names {
    fn from_record(record: Option<&DataValue>, locales: &[String]) -> Self {
        let names = names_field(record);
        Names {
            name: select_name(&names, locales).map(str::to_owned),
            names,
        }
    }
}

/// Continent data
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Continent {
    /// Two-letter continent code, e.g. "EU"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// GeoNames identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    /// Localized names
    #[serde(flatten)]
    pub names: Names,
}

impl Continent {
    pub(crate) fn from_record(record: Option<&DataValue>, locales: &[String]) -> Self {
        Continent {
            code: string_field(record, "code"),
            geoname_id: uint_field(record, "geoname_id"),
            names: Names::from_record(record, locales),
        }
    }

    /// Name in the first preferred locale
    pub fn name(&self) -> Option<&str> {
        self.names.name.as_deref()
    }
}

/// Country data, used for the located, registered and represented country
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Country {
    /// Confidence (0-100) that the country is correct (Enterprise only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    /// GeoNames identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    /// True if the country is a member state of the European Union
    pub is_in_european_union: bool,
    /// ISO 3166-1 alpha-2 code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso_code: Option<String>,
    /// Localized names
    #[serde(flatten)]
    pub names: Names,
}

impl Country {
    pub(crate) fn from_record(record: Option<&DataValue>, locales: &[String]) -> Self {
        Country {
            confidence: uint_field(record, "confidence"),
            geoname_id: uint_field(record, "geoname_id"),
            is_in_european_union: bool_field(record, "is_in_european_union"),
            iso_code: string_field(record, "iso_code"),
            names: Names::from_record(record, locales),
        }
    }

    /// Name in the first preferred locale
    pub fn name(&self) -> Option<&str> {
        self.names.name.as_deref()
    }
}

/// Country represented by users of the address, e.g. a military base
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepresentedCountry {
    /// The country itself
    #[serde(flatten)]
    pub country: Country,
    /// Kind of representation, e.g. "military"
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub represented_type: Option<String>,
}

impl RepresentedCountry {
    pub(crate) fn from_record(record: Option<&DataValue>, locales: &[String]) -> Self {
        RepresentedCountry {
            country: Country::from_record(record, locales),
            represented_type: string_field(record, "type"),
        }
    }
}

/// City data
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct City {
    /// Confidence (0-100) that the city is correct (Enterprise only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    /// GeoNames identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    /// Localized names
    #[serde(flatten)]
    pub names: Names,
}

impl City {
    pub(crate) fn from_record(record: Option<&DataValue>, locales: &[String]) -> Self {
        City {
            confidence: uint_field(record, "confidence"),
            geoname_id: uint_field(record, "geoname_id"),
            names: Names::from_record(record, locales),
        }
    }

    /// Name in the first preferred locale
    pub fn name(&self) -> Option<&str> {
        self.names.name.as_deref()
    }
}

/// Approximate location
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Location {
    /// Radius in kilometers around the coordinates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_radius: Option<u16>,
    /// Average income in US dollars
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_income: Option<u32>,
    /// Approximate latitude
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Approximate longitude
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// US metro code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metro_code: Option<u16>,
    /// People per square kilometer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_density: Option<u32>,
    /// IANA time zone, e.g. "Europe/London"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl Location {
    pub(crate) fn from_record(record: Option<&DataValue>) -> Self {
        Location {
            accuracy_radius: uint_field(record, "accuracy_radius"),
            average_income: uint_field(record, "average_income"),
            latitude: float_field(record, "latitude"),
            longitude: float_field(record, "longitude"),
            metro_code: uint_field(record, "metro_code"),
            population_density: uint_field(record, "population_density"),
            time_zone: string_field(record, "time_zone"),
        }
    }

    /// Latitude and longitude, if both are known
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Postal code data
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Postal {
    /// Postal code, possibly truncated to its first characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Confidence (0-100) that the postal code is correct
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
}

impl Postal {
    pub(crate) fn from_record(record: Option<&DataValue>) -> Self {
        Postal {
            code: string_field(record, "code"),
            confidence: uint_field(record, "confidence"),
        }
    }
}

/// A subdivision (state, province, ...) of the country
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Subdivision {
    /// Confidence (0-100) that the subdivision is correct
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    /// GeoNames identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    /// ISO 3166-2 subdivision code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso_code: Option<String>,
    /// Localized names
    #[serde(flatten)]
    pub names: Names,
}

impl Subdivision {
    pub(crate) fn from_record(record: Option<&DataValue>, locales: &[String]) -> Self {
        Subdivision {
            confidence: uint_field(record, "confidence"),
            geoname_id: uint_field(record, "geoname_id"),
            iso_code: string_field(record, "iso_code"),
            names: Names::from_record(record, locales),
        }
    }

    /// Name in the first preferred locale
    pub fn name(&self) -> Option<&str> {
        self.names.name.as_deref()
    }
}

/// Properties of the address itself rather than its location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Traits {
    /// Autonomous system number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system_number: Option<u32>,
    /// Organization owning the autonomous system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system_organization: Option<String>,
    /// e.g. "Cable/DSL"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    /// Second-level domain, e.g. "example.com"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// The address as it was queried
    pub ip_address: String,
    /// Any of the anonymizer flags below is set
    pub is_anonymous: bool,
    /// Legacy anonymous proxy flag
    pub is_anonymous_proxy: bool,
    /// Belongs to an anonymous VPN provider
    pub is_anonymous_vpn: bool,
    /// Belongs to a hosting or VPN provider
    pub is_hosting_provider: bool,
    /// Corporate or similar proxy
    pub is_legitimate_proxy: bool,
    /// Belongs to a public proxy
    pub is_public_proxy: bool,
    /// Satellite provider with users in several countries
    pub is_satellite_provider: bool,
    /// Tor exit node
    pub is_tor_exit_node: bool,
    /// Internet service provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    /// Network the record was found under
    pub network: IpNetwork,
    /// Organization the address is assigned to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Prefix length of `network`
    pub prefix_len: u8,
    /// e.g. "residential" or "business"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
}

impl Traits {
    pub(crate) fn from_record(record: Option<&DataValue>, ctx: &LookupContext<'_>) -> Self {
        Traits {
            autonomous_system_number: uint_field(record, "autonomous_system_number"),
            autonomous_system_organization: string_field(record, "autonomous_system_organization"),
            connection_type: string_field(record, "connection_type"),
            domain: string_field(record, "domain"),
            ip_address: ctx.ip_address.clone(),
            is_anonymous: bool_field(record, "is_anonymous"),
            is_anonymous_proxy: bool_field(record, "is_anonymous_proxy"),
            is_anonymous_vpn: bool_field(record, "is_anonymous_vpn"),
            is_hosting_provider: bool_field(record, "is_hosting_provider"),
            is_legitimate_proxy: bool_field(record, "is_legitimate_proxy"),
            is_public_proxy: bool_field(record, "is_public_proxy"),
            is_satellite_provider: bool_field(record, "is_satellite_provider"),
            is_tor_exit_node: bool_field(record, "is_tor_exit_node"),
            isp: string_field(record, "isp"),
            network: ctx.network,
            organization: string_field(record, "organization"),
            prefix_len: ctx.prefix_len,
            user_type: string_field(record, "user_type"),
        }
    }
}
