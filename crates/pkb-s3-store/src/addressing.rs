//! URL construction for path-style and virtual-host-style S3 addressing.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingStyle {
    PathStyle,
    VirtualHost,
}

/// Builds the request URL for `key` under the given addressing style.
///
/// The source this crate is modelled on has a known bug here: building the
/// virtual-host URL by string-replacing the endpoint's host component loses
/// the scheme (`https://`) whenever the replacement touches the start of the
/// string, silently downgrading requests to a bare host with no scheme at
/// all. This implementation instead parses the endpoint, then explicitly
/// re-joins scheme + `{bucket}.{host}` + path, so the scheme can never be
/// dropped.
pub fn build_url(style: AddressingStyle, endpoint: &str, bucket: &str, key: &str) -> String {
    match style {
        AddressingStyle::PathStyle => {
            let endpoint = endpoint.trim_end_matches('/');
            format!("{endpoint}/{bucket}/{key}")
        }
        AddressingStyle::VirtualHost => {
            let parsed = url::Url::parse(endpoint).expect("endpoint must be a valid URL");
            let scheme = parsed.scheme();
            let host = parsed.host_str().expect("endpoint must have a host");
            let port = parsed
                .port()
                .map(|p| format!(":{p}"))
                .unwrap_or_default();
            format!("{scheme}://{bucket}.{host}{port}/{key}")
        }
    }
}
