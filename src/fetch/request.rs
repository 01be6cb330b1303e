//! Turning a [`RequestConfig`] into a reusable request template

use crate::config::{CacheMode, Credentials, ReferrerPolicy, RequestConfig};
use crate::error::{Error, Result};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use url::Url;

/// Headers that only travel when credentials are included
const CREDENTIAL_HEADERS: [HeaderName; 3] = [
    header::AUTHORIZATION,
    header::COOKIE,
    header::PROXY_AUTHORIZATION,
];

/// A validated request template shared by every fetch in a batch
#[derive(Clone, Debug)]
pub struct PreparedRequest {
    method: Method,
    headers: HeaderMap,
    referrer: Option<Url>,
    referrer_policy: ReferrerPolicy,
}

impl RequestConfig {
    /// Validate the options and build a request template
    ///
    /// Fails with [`Error::Config`] on an invalid method, header name or header
    /// value, or an unparseable referrer.
    pub fn prepare(&self) -> Result<PreparedRequest> {
        let method = Method::from_bytes(self.method.trim().as_bytes())
            .map_err(|_| Error::config("request.method", format!("invalid method '{}'", self.method)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                Error::config("request.headers", format!("invalid header name '{}'", name))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                Error::config("request.headers", format!("invalid value for header '{}'", name))
            })?;
            headers.insert(header_name, header_value);
        }

        if self.credentials == Credentials::Omit {
            for name in CREDENTIAL_HEADERS {
                headers.remove(name);
            }
        }

        match self.cache {
            CacheMode::Default => {}
            CacheMode::NoStore => {
                headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            }
            CacheMode::Reload => {
                headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
                headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
            }
            CacheMode::NoCache => {
                headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
            }
            CacheMode::ForceCache => {
                headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-stale"));
            }
        }

        let referrer = self
            .referrer
            .as_deref()
            .map(|r| {
                Url::parse(r).map_err(|e| {
                    Error::config("request.referrer", format!("invalid referrer '{}': {}", r, e))
                })
            })
            .transpose()?;

        Ok(PreparedRequest {
            method,
            headers,
            referrer,
            referrer_policy: self.referrer_policy,
        })
    }
}

impl Default for PreparedRequest {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            referrer: None,
            referrer_policy: ReferrerPolicy::default(),
        }
    }
}

impl PreparedRequest {
    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Headers sent with every request (excluding `Referer`)
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Build a request for one URL
    pub fn build(&self, client: &Client, url: &str) -> RequestBuilder {
        let mut builder = client
            .request(self.method.clone(), url)
            .headers(self.headers.clone());
        if let Some(referrer) = self.referrer_for(url) {
            builder = builder.header(header::REFERER, referrer);
        }
        builder
    }

    /// The `Referer` value for a target URL under the configured policy
    pub fn referrer_for(&self, target: &str) -> Option<String> {
        let referrer = self.referrer.as_ref()?;
        let full = || {
            let mut stripped = referrer.clone();
            stripped.set_fragment(None);
            let _ = stripped.set_username("");
            let _ = stripped.set_password(None);
            stripped.to_string()
        };
        let origin_only = || format!("{}/", referrer.origin().ascii_serialization());

        match self.referrer_policy {
            ReferrerPolicy::NoReferrer => None,
            ReferrerPolicy::UnsafeUrl => Some(full()),
            ReferrerPolicy::Origin => Some(origin_only()),
            ReferrerPolicy::StrictOriginWhenCrossOrigin => {
                let target = Url::parse(target).ok()?;
                if referrer.scheme() == "https" && target.scheme() == "http" {
                    None
                } else if referrer.origin() == target.origin() {
                    Some(full())
                } else {
                    Some(origin_only())
                }
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn with_referrer(policy: ReferrerPolicy) -> PreparedRequest {
        RequestConfig {
            referrer: Some("https://site.example/page?q=1#frag".to_string()),
            referrer_policy: policy,
            ..Default::default()
        }
        .prepare()
        .unwrap()
    }

    #[test]
    fn default_prepares_plain_get() {
        let prepared = RequestConfig::default().prepare().unwrap();
        assert_eq!(prepared.method(), Method::GET);
        assert!(prepared.headers().is_empty());
        assert!(prepared.referrer_for("https://x/1.jpg").is_none());
    }

    #[test]
    fn omit_credentials_strips_authorization_and_cookie() {
        let mut config = RequestConfig::default();
        config
            .headers
            .insert("Authorization".into(), "Bearer secret".into());
        config.headers.insert("Cookie".into(), "session=1".into());
        config.headers.insert("X-Trace".into(), "on".into());

        let prepared = config.prepare().unwrap();
        assert!(prepared.headers().get(header::AUTHORIZATION).is_none());
        assert!(prepared.headers().get(header::COOKIE).is_none());
        assert_eq!(prepared.headers()["x-trace"], "on");
    }

    #[test]
    fn include_credentials_keeps_authorization() {
        let mut config = RequestConfig {
            credentials: Credentials::Include,
            ..Default::default()
        };
        config
            .headers
            .insert("Authorization".into(), "Bearer secret".into());

        let prepared = config.prepare().unwrap();
        assert_eq!(prepared.headers()[header::AUTHORIZATION], "Bearer secret");
    }

    #[test]
    fn cache_modes_map_to_headers() {
        let reload = RequestConfig {
            cache: CacheMode::Reload,
            ..Default::default()
        }
        .prepare()
        .unwrap();
        assert_eq!(reload.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(reload.headers()[header::PRAGMA], "no-cache");

        let no_store = RequestConfig {
            cache: CacheMode::NoStore,
            ..Default::default()
        }
        .prepare()
        .unwrap();
        assert_eq!(no_store.headers()[header::CACHE_CONTROL], "no-store");
    }

    #[test]
    fn invalid_header_name_is_config_error() {
        let mut config = RequestConfig::default();
        config.headers.insert("Bad Header".into(), "x".into());
        assert!(matches!(config.prepare(), Err(Error::Config { .. })));
    }

    #[test]
    fn invalid_referrer_is_config_error() {
        let config = RequestConfig {
            referrer: Some("not a url".into()),
            ..Default::default()
        };
        assert!(matches!(config.prepare(), Err(Error::Config { .. })));
    }

    #[test]
    fn method_is_normalized_from_string() {
        let prepared = RequestConfig {
            method: "HEAD".into(),
            ..Default::default()
        }
        .prepare()
        .unwrap();
        assert_eq!(prepared.method(), Method::HEAD);
    }

    #[test]
    fn strict_origin_policy() {
        let prepared = with_referrer(ReferrerPolicy::StrictOriginWhenCrossOrigin);

        assert_eq!(
            prepared.referrer_for("https://site.example/img/1.png").as_deref(),
            Some("https://site.example/page?q=1")
        );
        assert_eq!(
            prepared.referrer_for("https://cdn.example/1.png").as_deref(),
            Some("https://site.example/")
        );
        assert_eq!(prepared.referrer_for("http://site.example/1.png"), None);
    }

    #[test]
    fn other_policies() {
        assert_eq!(
            with_referrer(ReferrerPolicy::NoReferrer).referrer_for("https://site.example/"),
            None
        );
        assert_eq!(
            with_referrer(ReferrerPolicy::Origin)
                .referrer_for("https://site.example/")
                .as_deref(),
            Some("https://site.example/")
        );
        assert_eq!(
            with_referrer(ReferrerPolicy::UnsafeUrl)
                .referrer_for("http://other.example/")
                .as_deref(),
            Some("https://site.example/page?q=1")
        );
    }
}
