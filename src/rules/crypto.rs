use super::{Category, Hit, Rule, Severity, is_credential_name};
use crate::engine::Window;
use crate::tokenizer::{Fragment, FragmentKind, FragmentKinds};

/// Broken digest algorithms, lowercase.
const WEAK_ALGORITHMS: &[&str] = &["md5", "md4", "md2", "sha1", "sha-1"];

const REMEDIATION: &str = "Use SHA-256 or stronger for integrity checks, and a dedicated password \
     hashing function (Argon2, bcrypt, scrypt) for credentials.";

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule::builtin(
            "crypto_weak_hash_credential",
            Category::WeakCrypto,
            Severity::Medium,
            FragmentKinds::CALL,
            "Broken hash algorithm applied to a credential",
            REMEDIATION,
            weak_hash_credential,
        ),
        Rule::builtin(
            "crypto_weak_hash",
            Category::WeakCrypto,
            Severity::Low,
            FragmentKinds::CALL,
            "Use of a broken hash algorithm",
            REMEDIATION,
            weak_hash,
        ),
    ]
}

/// `md5`, `Md5`, `md5Hex`, `SHA1` but not `sha128` or `md5sum_v2`-style
/// digits right after the algorithm name.
fn names_weak_algorithm(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    WEAK_ALGORITHMS.iter().any(|alg| {
        lower.strip_prefix(alg).is_some_and(|rest| {
            !rest.starts_with(|c: char| c.is_ascii_digit())
        })
    })
}

/// The algorithm in use when `call` is a broken digest primitive.
fn weak_primitive(call: &Fragment) -> Option<String> {
    if !call.is_call() {
        return None;
    }
    // md5.Sum, hashlib.sha1, Md5::new, DigestUtils.md5Hex, md5(...)
    if let Some(seg) = call.text.split('.').find(|s| names_weak_algorithm(s)) {
        return Some(seg.to_ascii_uppercase());
    }
    // hashlib.new("md5"), crypto.createHash("sha1"), MessageDigest.getInstance("MD5")
    call.args
        .iter()
        .filter_map(|a| a.sole_literal())
        .find(|lit| WEAK_ALGORITHMS.contains(&lit.to_ascii_lowercase().as_str()))
        .map(str::to_ascii_uppercase)
}

fn mentions_credential(f: &Fragment) -> bool {
    match f.kind {
        FragmentKind::StringLiteral => false,
        FragmentKind::Identifier | FragmentKind::Assignment => is_credential_name(&f.text),
        FragmentKind::Call => f
            .args
            .iter()
            .flat_map(|a| a.idents())
            .any(is_credential_name),
    }
}

fn weak_hash_credential(w: &Window<'_>) -> Result<Option<Hit>, String> {
    let Some((call, alg)) = w
        .head
        .iter()
        .find_map(|f| weak_primitive(f).map(|alg| (f, alg)))
    else {
        return Ok(None);
    };
    if !w.context().any(mentions_credential) {
        return Ok(None);
    }
    Ok(Some(
        Hit::at(call).with_message(format!("{alg} used to hash a credential")),
    ))
}

fn weak_hash(w: &Window<'_>) -> Result<Option<Hit>, String> {
    Ok(w
        .head
        .iter()
        .find_map(|f| weak_primitive(f).map(|alg| Hit::at(f).with_message(format!("Use of broken hash algorithm {alg}")))))
}

#[cfg(test)]
use super::testing::hits;

#[test]
fn md5_over_password() {
    let src = "sum := md5.Sum([]byte(password))\n";
    assert_eq!(hits("crypto_weak_hash_credential", "h.go", src, 1).len(), 1);
    assert_eq!(hits("crypto_weak_hash", "h.go", src, 1).len(), 1);
}

#[test]
fn algorithm_selectors() {
    let py = "h = hashlib.new(\"md5\")\n";
    assert_eq!(hits("crypto_weak_hash", "a.py", py, 1).len(), 1);

    let js = "const h = crypto.createHash('sha1').update(data).digest('hex');\n";
    assert_eq!(hits("crypto_weak_hash", "a.js", js, 1).len(), 1);

    let java = "MessageDigest md = MessageDigest.getInstance(\"MD5\");\n";
    assert_eq!(hits("crypto_weak_hash", "A.java", java, 1).len(), 1);
}

#[test]
fn credential_from_enclosing_function() {
    let src = r#"
def hash_password(pw):
    h = hashlib.md5()
    h.update(pw)
    return h.hexdigest()
"#;
    assert_eq!(
        hits("crypto_weak_hash_credential", "p.py", src, 1),
        vec!["hashlib.md5()"]
    );
}

#[test]
fn strong_hashes_are_clean() {
    let src = "digest := sha256.Sum256(data)\nh = hashlib.sha512(password)\n";
    assert!(hits("crypto_weak_hash", "s.go", src, 1).is_empty());
    assert!(hits("crypto_weak_hash_credential", "s.go", src, 1).is_empty());
}

#[test]
fn names_weak_algorithm_boundaries() {
    assert!(names_weak_algorithm("md5"));
    assert!(names_weak_algorithm("Md5"));
    assert!(names_weak_algorithm("md5Hex"));
    assert!(names_weak_algorithm("SHA1"));
    assert!(!names_weak_algorithm("sha128"));
    assert!(!names_weak_algorithm("sha256"));
    assert!(!names_weak_algorithm("hash"));
}
