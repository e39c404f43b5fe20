//! The one request a session makes and the stream it ends up on.

use url::Host;
use url::Url;

use crate::solicit::header::Header;
use crate::solicit::header::Headers;
use crate::solicit::header::PseudoHeaderName;
use crate::solicit::stream_id::StreamId;
use crate::solicit::HttpScheme;

/// Request target with its derived pseudo-header values.
///
/// `stream_id` is unset until the request `HEADERS` frame is about to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor<'a> {
    target: &'a str,
    scheme: HttpScheme,
    /// Host to connect to, without IPv6 brackets.
    host: String,
    port: u16,
    authority: String,
    path: String,
    stream_id: Option<StreamId>,
}

/// Whether anything starting with `/` follows the authority.
fn has_path(target: &str) -> bool {
    let target = target.trim();
    let rest = match target.find("://") {
        Some(pos) => &target[pos + 3..],
        None => return false,
    };
    match rest.find(|c| c == '/' || c == '?' || c == '#') {
        Some(pos) => rest[pos..].starts_with('/'),
        None => false,
    }
}

impl<'a> StreamDescriptor<'a> {
    /// Parse the target URI.
    ///
    /// The port is kept in the authority only when it differs from the
    /// scheme default.
    pub fn parse(target: &'a str) -> crate::Result<StreamDescriptor<'a>> {
        let url = Url::parse(target).map_err(|e| crate::Error::UrlParse(target.to_owned(), e))?;

        let scheme = HttpScheme::from_str(url.scheme())
            .ok_or_else(|| crate::Error::UnsupportedScheme(url.scheme().to_owned()))?;

        let (host, host_str) = match (url.host(), url.host_str()) {
            (Some(Host::Domain(d)), Some(s)) if !d.is_empty() => (d.to_owned(), s),
            (Some(Host::Ipv4(a)), Some(s)) => (a.to_string(), s),
            (Some(Host::Ipv6(a)), Some(s)) => (a.to_string(), s),
            _ => return Err(crate::Error::MissingHost(target.to_owned())),
        };

        // `Url::port` is `None` for the scheme default port
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host_str, port),
            None => host_str.to_owned(),
        };
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        // `url` normalises an absent path to "/", so look at the raw text
        if !has_path(target) {
            return Err(crate::Error::MissingPath(target.to_owned()));
        }
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_owned(),
        };

        Ok(StreamDescriptor {
            target,
            scheme,
            host,
            port,
            authority,
            path,
            stream_id: None,
        })
    }

    pub fn target(&self) -> &'a str {
        self.target
    }

    pub fn scheme(&self) -> HttpScheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn stream_id(&self) -> Option<StreamId> {
        self.stream_id
    }

    /// Record the stream id. Only the first assignment takes effect; returns
    /// whether this call assigned it.
    pub fn assign_stream_id(&mut self, stream_id: StreamId) -> bool {
        match self.stream_id {
            Some(assigned) => {
                warn!(
                    "stream id {} already assigned to {}, ignoring {}",
                    assigned, self.target, stream_id
                );
                false
            }
            None => {
                self.stream_id = Some(stream_id);
                true
            }
        }
    }

    /// `:method`, `:scheme`, `:authority`, `:path`, in that order.
    pub fn request_headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.add_header(Header::pseudo(PseudoHeaderName::Method, "GET"));
        headers.add_header(Header::pseudo(
            PseudoHeaderName::Scheme,
            self.scheme.as_bytes(),
        ));
        headers.add_header(Header::pseudo(
            PseudoHeaderName::Authority,
            self.authority.clone(),
        ));
        headers.add_header(Header::pseudo(PseudoHeaderName::Path, self.path.clone()));
        headers
    }
}
