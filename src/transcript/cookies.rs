/// Build a `Cookie` header value from a Netscape-format cookie jar export.
///
/// Each data line is tab separated: domain, subdomain flag, path, secure flag,
/// expiry, name, value. Only `name=value` pairs of complete lines are kept.
pub fn parse_cookie_jar(contents: &str) -> String {
    contents
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let field = |index: usize| fields.get(index).copied().unwrap_or("");
            let (domain, path, name, value) = (field(0), field(2), field(5), field(6));

            if domain.is_empty() || path.is_empty() || name.is_empty() || value.is_empty() {
                return None;
            }
            Some(format!("{}={}", name, value))
        })
        .collect::<Vec<_>>()
        .join("; ")
}
