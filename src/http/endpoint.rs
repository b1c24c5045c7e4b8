//! Endpoint resolution and query-string building.

use std::fmt::Display;

use url::Url;

use crate::http::error::FetchError;

fn parse(raw: &str) -> Result<Url, FetchError> {
    Url::parse(raw).map_err(|source| FetchError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

/// Whether `endpoint` already names a full http(s) URL.
pub fn is_absolute(endpoint: &str) -> bool {
    endpoint.starts_with("http://") || endpoint.starts_with("https://")
}

/// Resolve a request endpoint against `base`.
///
/// Absolute endpoints are used unchanged. Anything else is appended to the
/// base, so a base path such as `/v1` is kept: `https://host/v1` +
/// `/themes` gives `https://host/v1/themes`.
pub fn resolve_endpoint(base: &Url, endpoint: &str) -> Result<Url, FetchError> {
    if is_absolute(endpoint) {
        return parse(endpoint);
    }

    let base = base.as_str().trim_end_matches('/');
    let joined = if endpoint.starts_with('/') {
        format!("{base}{endpoint}")
    } else {
        format!("{base}/{endpoint}")
    };
    parse(&joined)
}

/// Resolve `path` against `base` and set query parameters.
///
/// `path` is resolved as a URL reference (an absolute path replaces the
/// base path). Parameters keep the order they are supplied in; `None`
/// values are skipped and a name already present in the query is
/// overwritten in place.
pub fn build_url<I, K, V>(base: &Url, path: &str, params: I) -> Result<Url, FetchError>
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: Display,
{
    let mut url = base.join(path).map_err(|source| FetchError::InvalidUrl {
        url: path.to_string(),
        source,
    })?;

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let mut changed = false;

    for (name, value) in params {
        let Some(value) = value else { continue };
        let name = name.as_ref();
        let value = value.to_string();
        changed = true;

        match pairs.iter().position(|(k, _)| k == name) {
            Some(first) => {
                pairs[first].1 = value;
                let mut index = 0;
                pairs.retain(|(k, _)| {
                    let keep = index <= first || k != name;
                    index += 1;
                    keep
                });
            }
            None => pairs.push((name.to_string(), value)),
        }
    }

    if changed {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:8000").unwrap()
    }

    #[test]
    fn relative_endpoint_is_prefixed() {
        let url = resolve_endpoint(&base(), "/api/themes").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/themes");
    }

    #[test]
    fn base_path_is_preserved() {
        let base = Url::parse("https://api.example.com/v1/").unwrap();
        let url = resolve_endpoint(&base, "/themes").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/themes");

        let url = resolve_endpoint(&base, "stocks/7203").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/stocks/7203");
    }

    #[test]
    fn absolute_endpoint_is_untouched() {
        let url = resolve_endpoint(&base(), "https://other.example.com/x?y=1").unwrap();
        assert_eq!(url.as_str(), "https://other.example.com/x?y=1");
    }

    #[test]
    fn invalid_absolute_endpoint_is_rejected() {
        let err = resolve_endpoint(&base(), "http://").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn params_keep_insertion_order_and_skip_none() {
        let url = build_url(
            &base(),
            "/api/themes",
            [
                ("period", Some("1mo".to_string())),
                ("sector", None),
                ("limit", Some(20.to_string())),
            ],
        )
        .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/themes?period=1mo&limit=20");
    }

    #[test]
    fn no_params_leaves_query_empty() {
        let url = build_url(&base(), "/api/nikkei225", Vec::<(&str, Option<&str>)>::new()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/nikkei225");
    }

    #[test]
    fn existing_param_is_replaced() {
        let url = build_url(
            &base(),
            "/api/heatmap?period=1d&view=sector&period=5d",
            [("period", Some("1mo"))],
        )
        .unwrap();
        assert_eq!(url.query(), Some("period=1mo&view=sector"));
    }

    #[test]
    fn values_are_form_encoded() {
        let url = build_url(&base(), "/search", [("q", Some("トヨタ 自動車"))]).unwrap();
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("q".to_string(), "トヨタ 自動車".to_string())]);
    }
}
