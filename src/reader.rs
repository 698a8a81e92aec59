//! GeoIP2 Database Reader
//!
//! Typed lookups over a [`Database`]. Each method only works against the
//! database family it was written for; calling `country` on a City database
//! fails up front with [`GeoIpError::InvalidOperation`] before the tree is
//! touched.
//!
//! # Examples
//!
//! ```no_run
//! use geoip2::{DatabaseReader, FileAccessMode};
//!
//! let reader = DatabaseReader::builder("GeoIP2-City.mmdb")
//!     .mode(FileAccessMode::Memory)
//!     .locales(["ru", "en"])
//!     .open()?;
//!
//! let response = reader.city("81.2.69.160")?;
//! println!("{:?}", response.city.name());
//!
//! // Unknown addresses are not an error with the try_* variants
//! assert!(reader.try_city("10.10.10.10")?.is_none());
//! # Ok::<(), geoip2::GeoIpError>(())
//! ```

use crate::database::{Database, FileAccessMode};
use crate::error::{GeoIpError, Result};
use crate::locale::default_locales;
use crate::mmdb::Metadata;
use crate::model::LookupContext;
use crate::responses::{
    AnonymousIpResponse, AsnResponse, CityResponse, ConnectionTypeResponse, CountryResponse,
    DomainResponse, EnterpriseResponse, FromRecord, IspResponse,
};
use crate::source::ReadSeek;
use log::{debug, trace};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

/// The typed lookup methods and the database types they accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupMethod {
    /// [`DatabaseReader::city`]
    City,
    /// [`DatabaseReader::country`]
    Country,
    /// [`DatabaseReader::enterprise`]
    Enterprise,
    /// [`DatabaseReader::isp`]
    Isp,
    /// [`DatabaseReader::domain`]
    Domain,
    /// [`DatabaseReader::anonymous_ip`]
    AnonymousIp,
    /// [`DatabaseReader::connection_type`]
    ConnectionType,
    /// [`DatabaseReader::asn`]
    Asn,
}

impl LookupMethod {
    /// Every method, in declaration order
    pub const ALL: [LookupMethod; 8] = [
        LookupMethod::City,
        LookupMethod::Country,
        LookupMethod::Enterprise,
        LookupMethod::Isp,
        LookupMethod::Domain,
        LookupMethod::AnonymousIp,
        LookupMethod::ConnectionType,
        LookupMethod::Asn,
    ];

    /// Name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            LookupMethod::City => "City",
            LookupMethod::Country => "Country",
            LookupMethod::Enterprise => "Enterprise",
            LookupMethod::Isp => "Isp",
            LookupMethod::Domain => "Domain",
            LookupMethod::AnonymousIp => "AnonymousIp",
            LookupMethod::ConnectionType => "ConnectionType",
            LookupMethod::Asn => "Asn",
        }
    }

    /// Substring the database type must contain
    ///
    /// City and Country match any edition: "GeoLite2-City" and
    /// "GeoIP2-City-Europe" both answer `city`, "GeoIP2-Enterprise" does not.
    pub fn required_database_type(self) -> &'static str {
        match self {
            LookupMethod::City => "City",
            LookupMethod::Country => "Country",
            LookupMethod::Enterprise => "Enterprise",
            LookupMethod::Isp => "GeoIP2-ISP",
            LookupMethod::Domain => "GeoIP2-Domain",
            LookupMethod::AnonymousIp => "GeoIP2-Anonymous-IP",
            LookupMethod::ConnectionType => "GeoIP2-Connection-Type",
            LookupMethod::Asn => "GeoLite2-ASN",
        }
    }

    /// True if a database of `database_type` can answer this method
    pub fn accepts(self, database_type: &str) -> bool {
        database_type.contains(self.required_database_type())
    }
}

/// Anything a lookup method accepts as an address
///
/// Text is parsed and kept verbatim for the response's `ip_address`;
/// structured addresses are formatted.
pub trait LookupAddress {
    /// The parsed address and the text to report it as
    fn to_lookup_address(&self) -> Result<(IpAddr, String)>;
}

impl LookupAddress for str {
    fn to_lookup_address(&self) -> Result<(IpAddr, String)> {
        let ip = self
            .parse::<IpAddr>()
            .map_err(|_| GeoIpError::InvalidAddress(self.to_string()))?;
        Ok((ip, self.to_string()))
    }
}

impl LookupAddress for String {
    fn to_lookup_address(&self) -> Result<(IpAddr, String)> {
        self.as_str().to_lookup_address()
    }
}

impl LookupAddress for IpAddr {
    fn to_lookup_address(&self) -> Result<(IpAddr, String)> {
        Ok((*self, self.to_string()))
    }
}

impl LookupAddress for Ipv4Addr {
    fn to_lookup_address(&self) -> Result<(IpAddr, String)> {
        IpAddr::V4(*self).to_lookup_address()
    }
}

impl LookupAddress for Ipv6Addr {
    fn to_lookup_address(&self) -> Result<(IpAddr, String)> {
        IpAddr::V6(*self).to_lookup_address()
    }
}

impl<T: LookupAddress + ?Sized> LookupAddress for &T {
    fn to_lookup_address(&self) -> Result<(IpAddr, String)> {
        (**self).to_lookup_address()
    }
}

/// Options for opening a [`DatabaseReader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// How the file is accessed
    pub mode: FileAccessMode,
    /// Preferred locales for names, most preferred first
    pub locales: Vec<String>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            mode: FileAccessMode::default(),
            locales: default_locales(),
        }
    }
}

/// Builder returned by [`DatabaseReader::builder`]
#[derive(Debug, Clone)]
pub struct ReaderBuilder {
    path: PathBuf,
    options: ReaderOptions,
}

impl ReaderBuilder {
    /// Set the file access mode
    pub fn mode(mut self, mode: FileAccessMode) -> Self {
        self.options.mode = mode;
        self
    }

    /// Set the locale preference list
    pub fn locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.locales = locales.into_iter().map(Into::into).collect();
        self
    }

    /// Replace all options at once
    pub fn options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Open the database
    pub fn open(self) -> Result<DatabaseReader> {
        let database = Database::open_with(&self.path, self.options.mode)?;
        Ok(DatabaseReader::new(database, self.options.locales))
    }
}

/// GeoIP2 database reader
///
/// Safe to share between threads; see [`Database`] for the close semantics.
#[derive(Debug)]
pub struct DatabaseReader {
    database: Database,
    locales: Vec<String>,
}

impl DatabaseReader {
    /// Open a database file with memory mapping and the default locales
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder(path).open()
    }

    /// Start configuring a reader for a database file
    pub fn builder<P: AsRef<Path>>(path: P) -> ReaderBuilder {
        ReaderBuilder {
            path: path.as_ref().to_path_buf(),
            options: ReaderOptions::default(),
        }
    }

    /// Open a database held in memory
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Ok(Self::new(Database::from_bytes(data)?, default_locales()))
    }

    /// Open a database from a seekable stream
    pub fn from_stream<R: ReadSeek + 'static>(stream: R) -> Result<Self> {
        Ok(Self::new(Database::from_stream(stream)?, default_locales()))
    }

    /// Wrap an open database
    pub fn new(database: Database, locales: Vec<String>) -> Self {
        debug!(
            "GeoIP2 reader over {} with locales {:?}",
            database.metadata().database_type,
            locales
        );
        DatabaseReader { database, locales }
    }

    /// Replace the locale preference list
    pub fn with_locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locales = locales.into_iter().map(Into::into).collect();
        self
    }

    /// Locale preference list
    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    /// Database metadata, available even after close
    pub fn metadata(&self) -> &Metadata {
        self.database.metadata()
    }

    /// The underlying raw database
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Release the database; later lookups fail with [`GeoIpError::Disposed`]
    pub fn close(&self) {
        self.database.close();
    }

    /// Look up a City database record
    pub fn city<A: LookupAddress + ?Sized>(&self, address: &A) -> Result<CityResponse> {
        self.require(LookupMethod::City, address)
    }

    /// Like [`city`](Self::city), with `Ok(None)` for unknown addresses
    pub fn try_city<A: LookupAddress + ?Sized>(&self, address: &A) -> Result<Option<CityResponse>> {
        self.find(LookupMethod::City, address)
    }

    /// Look up a Country database record
    pub fn country<A: LookupAddress + ?Sized>(&self, address: &A) -> Result<CountryResponse> {
        self.require(LookupMethod::Country, address)
    }

    /// Like [`country`](Self::country), with `Ok(None)` for unknown addresses
    pub fn try_country<A: LookupAddress + ?Sized>(
        &self,
        address: &A,
    ) -> Result<Option<CountryResponse>> {
        self.find(LookupMethod::Country, address)
    }

    /// Look up an Enterprise database record
    pub fn enterprise<A: LookupAddress + ?Sized>(&self, address: &A) -> Result<EnterpriseResponse> {
        self.require(LookupMethod::Enterprise, address)
    }

    /// Like [`enterprise`](Self::enterprise), with `Ok(None)` for unknown addresses
    pub fn try_enterprise<A: LookupAddress + ?Sized>(
        &self,
        address: &A,
    ) -> Result<Option<EnterpriseResponse>> {
        self.find(LookupMethod::Enterprise, address)
    }

    /// Look up an ISP database record
    pub fn isp<A: LookupAddress + ?Sized>(&self, address: &A) -> Result<IspResponse> {
        self.require(LookupMethod::Isp, address)
    }

    /// Like [`isp`](Self::isp), with `Ok(None)` for unknown addresses
    pub fn try_isp<A: LookupAddress + ?Sized>(&self, address: &A) -> Result<Option<IspResponse>> {
        self.find(LookupMethod::Isp, address)
    }

    /// Look up a Domain database record
    pub fn domain<A: LookupAddress + ?Sized>(&self, address: &A) -> Result<DomainResponse> {
        self.require(LookupMethod::Domain, address)
    }

    /// Like [`domain`](Self::domain), with `Ok(None)` for unknown addresses
    pub fn try_domain<A: LookupAddress + ?Sized>(
        &self,
        address: &A,
    ) -> Result<Option<DomainResponse>> {
        self.find(LookupMethod::Domain, address)
    }

    /// Look up an Anonymous IP database record
    pub fn anonymous_ip<A: LookupAddress + ?Sized>(
        &self,
        address: &A,
    ) -> Result<AnonymousIpResponse> {
        self.require(LookupMethod::AnonymousIp, address)
    }

    /// Like [`anonymous_ip`](Self::anonymous_ip), with `Ok(None)` for unknown addresses
    pub fn try_anonymous_ip<A: LookupAddress + ?Sized>(
        &self,
        address: &A,
    ) -> Result<Option<AnonymousIpResponse>> {
        self.find(LookupMethod::AnonymousIp, address)
    }

    /// Look up a Connection-Type database record
    pub fn connection_type<A: LookupAddress + ?Sized>(
        &self,
        address: &A,
    ) -> Result<ConnectionTypeResponse> {
        self.require(LookupMethod::ConnectionType, address)
    }

    /// Like [`connection_type`](Self::connection_type), with `Ok(None)` for unknown addresses
    pub fn try_connection_type<A: LookupAddress + ?Sized>(
        &self,
        address: &A,
    ) -> Result<Option<ConnectionTypeResponse>> {
        self.find(LookupMethod::ConnectionType, address)
    }

    /// Look up an ASN database record
    pub fn asn<A: LookupAddress + ?Sized>(&self, address: &A) -> Result<AsnResponse> {
        self.require(LookupMethod::Asn, address)
    }

    /// Like [`asn`](Self::asn), with `Ok(None)` for unknown addresses
    pub fn try_asn<A: LookupAddress + ?Sized>(&self, address: &A) -> Result<Option<AsnResponse>> {
        self.find(LookupMethod::Asn, address)
    }

    /// A closed reader fails as disposed before the type check runs
    fn check_method(&self, method: LookupMethod) -> Result<()> {
        if self.database.is_closed() {
            return Err(GeoIpError::Disposed);
        }
        let database_type = &self.metadata().database_type;
        if method.accepts(database_type) {
            Ok(())
        } else {
            Err(GeoIpError::InvalidOperation {
                database_type: database_type.clone(),
                method: method.name(),
                required: method.required_database_type(),
            })
        }
    }

    fn require<T: FromRecord, A: LookupAddress + ?Sized>(
        &self,
        method: LookupMethod,
        address: &A,
    ) -> Result<T> {
        self.check_method(method)?;
        let (ip, text) = address.to_lookup_address()?;
        match self.lookup(ip, &text)? {
            Some(response) => Ok(response),
            None => Err(GeoIpError::AddressNotFound { address: text }),
        }
    }

    fn find<T: FromRecord, A: LookupAddress + ?Sized>(
        &self,
        method: LookupMethod,
        address: &A,
    ) -> Result<Option<T>> {
        self.check_method(method)?;
        let (ip, text) = address.to_lookup_address()?;
        self.lookup(ip, &text)
    }

    fn lookup<T: FromRecord>(&self, ip: IpAddr, text: &str) -> Result<Option<T>> {
        let Some(found) = self.database.lookup(ip)? else {
            trace!("{} not in {}", text, self.metadata().database_type);
            return Ok(None);
        };
        if found.data.as_map().is_none() {
            return Err(GeoIpError::InvalidDatabase(format!(
                "record for {} is a {}, not a map",
                text,
                found.data.type_name()
            )));
        }

        let ctx = LookupContext {
            ip_address: text.to_string(),
            prefix_len: found.prefix_len,
            network: found.network,
            locales: &self.locales,
        };
        Ok(Some(T::from_record(&found.data, &ctx)))
    }
}
