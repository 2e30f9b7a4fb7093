//! Naming-convention predicates used in place of type information.
//!
//! Nothing here knows about syntax trees. Both extractors feed plain strings
//! through these functions, so the AST pass and the prose pass agree on what
//! counts as a client call.

/// Container-style method names that are never treated as client calls
pub const DENYLISTED_METHODS: [&str; 10] = [
    "forEach", "map", "filter", "reduce", "some", "every", "push", "pop", "includes", "slice",
];

/// Last identifier token of a receiver expression.
///
/// `this.client` yields `client`, `ctx.glideClient!` yields `glideClient`.
pub fn trailing_identifier(receiver: &str) -> &str {
    receiver
        .split(|c| matches!(c, '.' | '!' | '?'))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .last()
        .unwrap_or("")
}

/// Whether a bare identifier names a client object.
///
/// Accepts letters followed by `client` (`client`, `glideClient`,
/// `clusterClient`) and anything ending in `jsonclient` or `ftclient`,
/// all case-insensitively.
pub fn is_client_identifier(identifier: &str) -> bool {
    let lower = identifier.to_ascii_lowercase();
    match lower.strip_suffix("client") {
        Some(prefix) => {
            prefix.chars().all(|c| c.is_ascii_alphabetic())
                || lower.ends_with("jsonclient")
                || lower.ends_with("ftclient")
        }
        None => false,
    }
}

/// Whether a full receiver expression ends in a client identifier
pub fn is_client_receiver(receiver: &str) -> bool {
    is_client_identifier(trailing_identifier(receiver))
}

pub fn is_denylisted(method: &str) -> bool {
    DENYLISTED_METHODS.contains(&method)
}

/// Whether the text contains something shaped like `/.../`
pub fn looks_like_regex_literal(text: &str) -> bool {
    match text.find('/') {
        Some(open) => text[open + 1..]
            .find('/')
            .map_or(false, |close| close > 0),
        None => false,
    }
}

/// Shared exclusion rules applied after a call has been recognised
pub fn should_skip_call(receiver: &str, method: &str) -> bool {
    if is_denylisted(method) {
        return true;
    }
    method == "test" && looks_like_regex_literal(receiver)
}
