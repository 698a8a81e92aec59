//! GeoIP2 response types
//!
//! One response per database family. City, Country and Enterprise
//! responses are assembled from the records in [`crate::model`]; the
//! single-purpose databases (ISP, Domain, ...) map to flat structs.

use crate::data_section::DataValue;
use crate::model::{
    bool_field, string_field, uint_field, City, Continent, Country, Location, LookupContext,
    Postal, RepresentedCountry, Subdivision, Traits,
};
use ipnetwork::IpNetwork;
use serde::Serialize;

/// Conversion from a decoded root record
pub(crate) trait FromRecord: Sized {
    fn from_record(record: &DataValue, ctx: &LookupContext<'_>) -> Self;
}

/// Response from a City database, also used for Enterprise
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityResponse {
    /// City data
    pub city: City,
    /// Continent data
    pub continent: Continent,
    /// Country where the address is located
    pub country: Country,
    /// Location data
    pub location: Location,
    /// Postal code data
    pub postal: Postal,
    /// Country where the ISP registered the network
    pub registered_country: Country,
    /// Country represented by users of the address
    pub represented_country: RepresentedCountry,
    /// Subdivisions, largest first
    pub subdivisions: Vec<Subdivision>,
    /// Address traits, including the queried address
    pub traits: Traits,
}

/// Response from an Enterprise database
pub type EnterpriseResponse = CityResponse;

impl CityResponse {
    /// The smallest subdivision, e.g. the county within a state
    pub fn most_specific_subdivision(&self) -> Option<&Subdivision> {
        self.subdivisions.last()
    }
}

impl FromRecord for CityResponse {
    fn from_record(record: &DataValue, ctx: &LookupContext<'_>) -> Self {
        let subdivisions = record
            .get("subdivisions")
            .and_then(DataValue::as_array)
            .map(|subs| {
                subs.iter()
                    .map(|sub| Subdivision::from_record(Some(sub), ctx.locales))
                    .collect()
            })
            .unwrap_or_default();

        CityResponse {
            city: City::from_record(record.get("city"), ctx.locales),
            continent: Continent::from_record(record.get("continent"), ctx.locales),
            country: Country::from_record(record.get("country"), ctx.locales),
            location: Location::from_record(record.get("location")),
            postal: Postal::from_record(record.get("postal")),
            registered_country: Country::from_record(record.get("registered_country"), ctx.locales),
            represented_country: RepresentedCountry::from_record(
                record.get("represented_country"),
                ctx.locales,
            ),
            subdivisions,
            traits: Traits::from_record(record.get("traits"), ctx),
        }
    }
}

/// Response from a Country database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryResponse {
    /// Continent data
    pub continent: Continent,
    /// Country where the address is located
    pub country: Country,
    /// Country where the ISP registered the network
    pub registered_country: Country,
    /// Country represented by users of the address
    pub represented_country: RepresentedCountry,
    /// Address traits, including the queried address
    pub traits: Traits,
}

impl FromRecord for CountryResponse {
    fn from_record(record: &DataValue, ctx: &LookupContext<'_>) -> Self {
        CountryResponse {
            continent: Continent::from_record(record.get("continent"), ctx.locales),
            country: Country::from_record(record.get("country"), ctx.locales),
            registered_country: Country::from_record(record.get("registered_country"), ctx.locales),
            represented_country: RepresentedCountry::from_record(
                record.get("represented_country"),
                ctx.locales,
            ),
            traits: Traits::from_record(record.get("traits"), ctx),
        }
    }
}

/// Response from an Anonymous IP database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnonymousIpResponse {
    /// Any of the anonymizer flags is set
    pub is_anonymous: bool,
    /// Belongs to an anonymous VPN provider
    pub is_anonymous_vpn: bool,
    /// Belongs to a hosting or VPN provider
    pub is_hosting_provider: bool,
    /// Belongs to a public proxy
    pub is_public_proxy: bool,
    /// Tor exit node
    pub is_tor_exit_node: bool,
    /// The address as it was queried
    pub ip_address: String,
    /// Network the record was found under
    pub network: IpNetwork,
    /// Prefix length of `network`
    pub prefix_len: u8,
}

impl FromRecord for AnonymousIpResponse {
    fn from_record(record: &DataValue, ctx: &LookupContext<'_>) -> Self {
        let record = Some(record);
        AnonymousIpResponse {
            is_anonymous: bool_field(record, "is_anonymous"),
            is_anonymous_vpn: bool_field(record, "is_anonymous_vpn"),
            is_hosting_provider: bool_field(record, "is_hosting_provider"),
            is_public_proxy: bool_field(record, "is_public_proxy"),
            is_tor_exit_node: bool_field(record, "is_tor_exit_node"),
            ip_address: ctx.ip_address.clone(),
            network: ctx.network,
            prefix_len: ctx.prefix_len,
        }
    }
}

/// Response from a Connection-Type database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionTypeResponse {
    /// e.g. "Dialup", "Cable/DSL", "Corporate", "Cellular"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    /// The address as it was queried
    pub ip_address: String,
    /// Network the record was found under
    pub network: IpNetwork,
    /// Prefix length of `network`
    pub prefix_len: u8,
}

impl FromRecord for ConnectionTypeResponse {
    fn from_record(record: &DataValue, ctx: &LookupContext<'_>) -> Self {
        ConnectionTypeResponse {
            connection_type: string_field(Some(record), "connection_type"),
            ip_address: ctx.ip_address.clone(),
            network: ctx.network,
            prefix_len: ctx.prefix_len,
        }
    }
}

/// Response from a Domain database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainResponse {
    /// Second-level domain, e.g. "example.com"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// The address as it was queried
    pub ip_address: String,
    /// Network the record was found under
    pub network: IpNetwork,
    /// Prefix length of `network`
    pub prefix_len: u8,
}

impl FromRecord for DomainResponse {
    fn from_record(record: &DataValue, ctx: &LookupContext<'_>) -> Self {
        DomainResponse {
            domain: string_field(Some(record), "domain"),
            ip_address: ctx.ip_address.clone(),
            network: ctx.network,
            prefix_len: ctx.prefix_len,
        }
    }
}

/// Response from an ISP database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IspResponse {
    /// Autonomous system number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system_number: Option<u32>,
    /// Organization owning the autonomous system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system_organization: Option<String>,
    /// Internet service provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    /// Organization the address is assigned to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// The address as it was queried
    pub ip_address: String,
    /// Network the record was found under
    pub network: IpNetwork,
    /// Prefix length of `network`
    pub prefix_len: u8,
}

impl FromRecord for IspResponse {
    fn from_record(record: &DataValue, ctx: &LookupContext<'_>) -> Self {
        let record = Some(record);
        IspResponse {
            autonomous_system_number: uint_field(record, "autonomous_system_number"),
            autonomous_system_organization: string_field(record, "autonomous_system_organization"),
            isp: string_field(record, "isp"),
            organization: string_field(record, "organization"),
            ip_address: ctx.ip_address.clone(),
            network: ctx.network,
            prefix_len: ctx.prefix_len,
        }
    }
}

/// Response from an ASN database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AsnResponse {
    /// Autonomous system number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system_number: Option<u32>,
    /// Organization owning the autonomous system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system_organization: Option<String>,
    /// The address as it was queried
    pub ip_address: String,
    /// Network the record was found under
    pub network: IpNetwork,
    /// Prefix length of `network`
    pub prefix_len: u8,
}

impl FromRecord for AsnResponse {
    fn from_record(record: &DataValue, ctx: &LookupContext<'_>) -> Self {
        let record = Some(record);
        AsnResponse {
            autonomous_system_number: uint_field(record, "autonomous_system_number"),
            autonomous_system_organization: string_field(record, "autonomous_system_organization"),
            ip_address: ctx.ip_address.clone(),
            network: ctx.network,
            prefix_len: ctx.prefix_len,
        }
    }
}
