use super::{Category, Hit, Rule, Severity, built_then_used, is_sink, positional};
use crate::engine::Window;
use crate::tokenizer::{Expr, Fragment, FragmentKind, FragmentKinds, Span};

const REQUEST_SINKS: &[&str] = &[
    // Go
    "http.Get",
    "http.Post",
    "http.Head",
    "http.PostForm",
    "http.NewRequest",
    "http.NewRequestWithContext",
    "client.Get",
    "client.Post",
    // Python
    "requests.get",
    "requests.post",
    "requests.put",
    "requests.patch",
    "requests.delete",
    "requests.head",
    "requests.request",
    "session.get",
    "session.post",
    "httpx.get",
    "httpx.post",
    "urllib.request.urlopen",
    "urllib2.urlopen",
    "urlopen",
    // Rust
    "reqwest.get",
    "reqwest.blocking.get",
    "client.get",
    "client.post",
    "client.put",
    "client.delete",
    "client.request",
    "ureq.get",
    "ureq.post",
    // Node
    "fetch",
    "axios",
    "axios.get",
    "axios.post",
    "axios.put",
    "axios.delete",
    "axios.request",
    "got",
    "http.get",
    "https.get",
    "http.request",
    "https.request",
    // Java / PHP / Ruby
    ".getForObject",
    ".getForEntity",
    ".postForObject",
    ".openConnection",
    "curl_init",
    "Net.HTTP.get",
    "HTTParty.get",
    "URI.open",
];

const REMEDIATION: &str = "Validate outbound URLs against an allow-list of hosts and schemes, \
     and block internal and link-local address ranges.";

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule::builtin(
            "ssrf_dynamic_url",
            Category::Ssrf,
            Severity::High,
            FragmentKinds::CALL,
            "Outbound request to a URL built from untrusted input",
            REMEDIATION,
            dynamic_url,
        ),
        Rule::builtin(
            "ssrf_built_then_requested",
            Category::Ssrf,
            Severity::High,
            FragmentKinds::ASSIGNMENT,
            "URL built from untrusted input is requested",
            REMEDIATION,
            built_then_requested,
        ),
    ]
}

/// Whole words naming an allow-list or a URL check.
const GUARD_WORDS: &[&str] = &[
    "allowed",
    "allowlist",
    "allowlisted",
    "whitelist",
    "whitelisted",
    "safelist",
    "permitted",
];

/// Two-word spellings: `allow_list`, `AllowHosts`.
const GUARD_PAIRS: &[(&str, &str)] = &[
    ("allow", "list"),
    ("white", "list"),
    ("safe", "list"),
    ("allow", "hosts"),
];

/// Validator names, matched against the joined words.
const VALIDATORS: &[&str] = &["validateurl", "validurl", "safeurl", "validatehost"];

/// Lowercase words of an identifier path, split on punctuation and camel case.
fn words(ident: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut prev_lower = false;
    for c in ident.chars() {
        if !c.is_ascii_alphanumeric() {
            if !cur.is_empty() {
                out.push(std::mem::take(&mut cur));
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower {
            out.push(std::mem::take(&mut cur));
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        cur.push(c.to_ascii_lowercase());
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

/// References to an allow-list or a URL validator.
fn is_allow_list(f: &Fragment) -> bool {
    if f.kind == FragmentKind::StringLiteral {
        return false;
    }
    let words = words(&f.text);
    let joined = words.concat();
    words.iter().any(|w| GUARD_WORDS.contains(&w.as_str()))
        || words
            .windows(2)
            .any(|p| GUARD_PAIRS.contains(&(p[0].as_str(), p[1].as_str())))
        || VALIDATORS.iter().any(|v| joined.contains(v))
}

fn guarded(w: &Window<'_>) -> bool {
    // identifiers inside a request call's own arguments are not guards
    let sinks: Vec<Span> = w
        .head
        .iter()
        .filter(|f| is_sink(f, REQUEST_SINKS))
        .map(|f| f.span)
        .collect();
    let in_sink_args = |f: &Fragment| {
        f.kind == FragmentKind::Identifier
            && sinks
                .iter()
                .any(|s| f.span.start > s.start && f.span.end <= s.end)
    };
    w.context().filter(|f| !in_sink_args(*f)).any(is_allow_list)
}

fn dynamic_url(w: &Window<'_>) -> Result<Option<Hit>, String> {
    if guarded(w) {
        return Ok(None);
    }
    Ok(w
        .head
        .iter()
        .find(|f| is_sink(f, REQUEST_SINKS) && positional(f).take(2).any(Expr::splices_dynamic))
        .map(Hit::at))
}

fn looks_like_url(expr: &Expr) -> bool {
    let template = expr.template();
    template.contains("://") || template.starts_with("http") || template.starts_with('/')
}

fn built_then_requested(w: &Window<'_>) -> Result<Option<Hit>, String> {
    if guarded(w) {
        return Ok(None);
    }
    Ok(built_then_used(
        w,
        |rhs| rhs.splices_dynamic() && looks_like_url(rhs),
        |f| is_sink(f, REQUEST_SINKS),
    ))
}

#[cfg(test)]
use super::testing::hits;

#[test]
fn go_get_with_concatenated_url() {
    let src = "resp, err := http.Get(\"http://internal-service/\" + target)\n";
    assert_eq!(hits("ssrf_dynamic_url", "s.go", src, 1).len(), 1);
}

#[test]
fn python_requests_with_fstring() {
    let src = "r = requests.get(f\"https://{host}/api/status\", timeout=5)\n";
    assert_eq!(hits("ssrf_dynamic_url", "s.py", src, 1).len(), 1);
}

#[test]
fn allow_list_check_suppresses() {
    let src = r#"
function proxy(req, res) {
  if (!ALLOWED_HOSTS.includes(req.query.host)) return res.status(403).end();
  return fetch("https://" + req.query.host + "/data");
}
"#;
    assert!(hits("ssrf_dynamic_url", "p.js", src, 1).is_empty());
}

#[test]
fn fixed_urls_are_clean() {
    let src = "resp = requests.get(\"https://api.example.com/v1/status\")\n";
    assert!(hits("ssrf_dynamic_url", "c.py", src, 1).is_empty());
}

#[test]
fn url_built_then_requested() {
    let src = "url := \"http://\" + host + \"/metadata\"\nresp, _ := http.Get(url)\n";
    assert_eq!(hits("ssrf_built_then_requested", "m.go", src, 2).len(), 1);
    assert!(hits("ssrf_dynamic_url", "m.go", src, 2).is_empty());
}

#[test]
fn redirect_keyword_is_not_an_allow_list() {
    let plain = "requests.get(\"http://\" + host + \"/status\")\n";
    assert_eq!(hits("ssrf_dynamic_url", "r.py", plain, 1).len(), 1);

    let redirects = "requests.get(\"http://\" + host + \"/status\", allow_redirects=True)\n";
    assert_eq!(hits("ssrf_dynamic_url", "r.py", redirects, 1).len(), 1);
}

#[test]
fn guard_words_match_whole_words_only() {
    let shallow = r#"
def fetch(host):
    shallow = copy.copy(cfg)
    return requests.get("https://" + host + "/v1")
"#;
    assert_eq!(hits("ssrf_dynamic_url", "s.py", shallow, 1).len(), 1);

    let checked = r#"
def fetch(host):
    if not is_allowed(host):
        raise ValueError(host)
    return requests.get("https://" + host + "/v1")
"#;
    assert!(hits("ssrf_dynamic_url", "s.py", checked, 1).is_empty());
}

#[test]
fn identifier_words_split_on_case_and_underscores() {
    assert_eq!(words("ALLOWED_HOSTS.includes"), vec!["allowed", "hosts", "includes"]);
    assert_eq!(words("isUrlAllowed"), vec!["is", "url", "allowed"]);
    assert_eq!(words("allow_redirects"), vec!["allow", "redirects"]);
}
