use url::Url;

/// The network authority a mirror is confined to
///
/// Two URLs share an origin when their hosts match and their explicit ports
/// match. The scheme is ignored so an http seed still claims https links on
/// the same host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    host: String,
    port: Option<u16>,
}

impl Origin {
    /// Extracts the origin of a URL, if it has a host
    pub fn of(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_lowercase();
        Some(Self {
            host,
            port: url.port(),
        })
    }

    /// Host part of the origin
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns true if `url` belongs to this origin
    pub fn contains(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => host.eq_ignore_ascii_case(&self.host) && url.port() == self.port,
            None => true,
        }
    }
}
