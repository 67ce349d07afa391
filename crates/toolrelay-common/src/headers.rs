/// Header list as carried across crate boundaries, in wire order.
pub type Headers = Vec<(String, String)>;

pub fn header_get<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Hop-by-hop and framing headers; the server sets its own.
pub fn is_hop_by_hop_or_framing_header(name: &str) -> bool {
    const NAMES: [&str; 9] = [
        "content-length",
        "transfer-encoding",
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailer",
        "upgrade",
    ];
    NAMES.iter().any(|candidate| name.eq_ignore_ascii_case(candidate))
}
