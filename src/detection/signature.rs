//! Signature definitions and signature-list loading.
//!
//! A signature list is UTF-8 text with one pattern per line:
//!
//! - `/body/flags` is a regular expression when every flag is one of `i`, `m`,
//!   `s` or `x`; a line such as `/bin/sh` is not in this form
//! - `literal:text` is an exact, case-sensitive byte substring
//! - any other line is a literal when it has no regex metacharacters, and a
//!   case-insensitive regular expression otherwise
//!
//! Blank lines and lines starting with `#` are ignored.

use crate::core::error::{Error, Result};
use regex::bytes::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};

/// Version tag of the compiled-in signature list.
pub const DEFAULT_SIGNATURES_VERSION: &str = "2025.06.2";

/// Compiled regex size cap; keeps a hostile signature file from exhausting memory.
const REGEX_SIZE_LIMIT: usize = 16 * 1024 * 1024;

/// Prefix that forces a line to be read as a literal.
const LITERAL_PREFIX: &str = "literal:";

/// Built-in signatures, in match order.
const DEFAULT_SIGNATURES: &[&str] = &[
    // Script injection
    r#"/<\s*script[^>]*>[^<]{0,200}(eval\s*\(|unescape\s*\(|String\.fromCharCode\s*\()/i"#,
    r#"/<\s*iframe[^>]*\b(width|height)\s*=\s*["']?0+["'\s>]/i"#,
    r#"/document\.write\s*\(\s*unescape\s*\(/i"#,
    // Dangerous calls fed from request input
    r#"/\b(eval|assert|system|shell_exec|passthru|popen|proc_open|pcntl_exec|exec)\s*\(\s*[^)]{0,40}\$_(GET|POST|REQUEST|COOKIE|SERVER|FILES)\b/i"#,
    r#"/\$_(GET|POST|REQUEST|COOKIE)\s*\[[^\]]*\]\s*\(\s*\$/"#,
    r#"/\bassert\s*\(\s*\$/i"#,
    // Dangerous calls with a variable argument
    r#"/\b(eval|system|shell_exec|passthru|popen|proc_open|pcntl_exec|exec)\s*\(\s*\$/i"#,
    r#"/\b(shell_exec|passthru|proc_open|pcntl_exec)\s*\(/i"#,
    r#"/\bbase64_decode\s*\(\s*\$/i"#,
    r#"/\bcreate_function\s*\(/i"#,
    r#"/\bpreg_replace\s*\(\s*['"].*\/e[a-z]*['"]\s*,/i"#,
    // Encoded payload execution
    r#"/\b(eval|assert)\s*\(\s*(base64_decode|gzinflate|gzuncompress|gzdecode|str_rot13|convert_uudecode)\s*\(/i"#,
    r#"/\b(gzinflate|gzuncompress|gzdecode|str_rot13)\s*\(\s*base64_decode\s*\(/i"#,
    r#"/\beval\s*\(\s*(atob|unescape)\s*\(/i"#,
    // Web shell idioms
    r#"/file_put_contents\s*\(\s*["']php:\/\/input["']\s*,/i"#,
    r#"/\b(move_uploaded_file|copy)\s*\(\s*\$_FILES\s*\[\s*['"][^'"]*['"]\s*\]\s*\[\s*['"]tmp_name['"]\s*\]/i"#,
    r#"/\x75\x6E\x61\x6D\x65\x28\x29\x20\x7B\x20\x7D/i"#,
    r#"/\bfsockopen\s*\([^)]*\).{0,200}(\/bin\/sh|cmd\.exe)/is"#,
    "literal:FilesMan",
    // Anti-virus test file
    r"literal:X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*",
];

/// A single content signature.
#[derive(Debug, Clone)]
pub enum Signature {
    /// Regular expression over raw bytes
    Regex {
        /// The line as written in the signature list
        source: String,
        regex: Regex,
    },
    /// Exact byte substring
    Literal(Vec<u8>),
}

impl Signature {
    /// Build a regex signature.
    pub fn regex(pattern: &str, case_insensitive: bool) -> std::result::Result<Self, String> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| e.to_string())?;

        Ok(Signature::Regex {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Build a literal signature.
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Signature::Literal(bytes.into())
    }

    /// Parse one line of a signature list.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        if let Some(text) = line.strip_prefix(LITERAL_PREFIX) {
            if text.is_empty() {
                return Err("empty literal".to_string());
            }
            return Ok(Self::literal(text.as_bytes()));
        }

        if let Some((body, flags)) = split_delimited(line) {
            return Self::delimited(line, body, flags);
        }

        if regex::escape(line) == line {
            Ok(Self::literal(line.as_bytes()))
        } else {
            Self::regex(line, true)
        }
    }

    /// Compile a `/body/flags` regex.
    fn delimited(line: &str, body: &str, flags: &str) -> std::result::Result<Self, String> {
        let mut builder = RegexBuilder::new(body);
        builder.size_limit(REGEX_SIZE_LIMIT);

        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => return Err(format!("unsupported regex flag '{}'", other)),
            };
        }

        let regex = builder.build().map_err(|e| e.to_string())?;
        Ok(Signature::Regex {
            source: line.to_string(),
            regex,
        })
    }

    /// Check whether the signature occurs anywhere in `data`.
    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            Signature::Regex { regex, .. } => regex.is_match(data),
            Signature::Literal(needle) => {
                !needle.is_empty()
                    && data.len() >= needle.len()
                    && data.windows(needle.len()).any(|window| window == needle.as_slice())
            }
        }
    }

    /// Length of a literal signature; regexes have no static bound.
    pub fn literal_len(&self) -> Option<usize> {
        match self {
            Signature::Literal(needle) => Some(needle.len()),
            Signature::Regex { .. } => None,
        }
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signature::Regex { source, .. } => write!(f, "{}", source),
            Signature::Literal(bytes) => {
                write!(f, "{}{}", LITERAL_PREFIX, String::from_utf8_lossy(bytes))
            }
        }
    }
}

/// Regex flags accepted after the closing `/`.
const REGEX_FLAGS: &str = "imsx";

/// Split `/body/flags`; `None` if the line is not in delimited form.
///
/// Only `imsx` count as flags, so paths like `/bin/sh` stay plain text.
fn split_delimited(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let (body, flags) = (&rest[..end], &rest[end + 1..]);

    if body.is_empty() || !flags.chars().all(|c| REGEX_FLAGS.contains(c)) {
        return None;
    }
    Some((body, flags))
}

/// Where a signature set came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureSource {
    /// The compiled-in list
    BuiltIn { version: &'static str },
    /// A user-supplied signature file
    File(PathBuf),
    /// Signatures constructed in code
    Inline,
}

impl std::fmt::Display for SignatureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureSource::BuiltIn { version } => write!(f, "built-in ({})", version),
            SignatureSource::File(path) => write!(f, "{}", path.display()),
            SignatureSource::Inline => write!(f, "inline"),
        }
    }
}

/// Ordered, immutable collection of signatures.
#[derive(Debug, Clone)]
pub struct SignatureSet {
    signatures: Vec<Signature>,
    source: SignatureSource,
}

impl SignatureSet {
    /// Create a set from signatures built in code.
    pub fn new(signatures: Vec<Signature>) -> Self {
        Self {
            signatures,
            source: SignatureSource::Inline,
        }
    }

    /// Load from a signature file, or the built-in list when no path is given.
    ///
    /// A path that cannot be read is an error; it never falls back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default_signatures()),
        }
    }

    /// Load signatures from a file with one pattern per line.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::SignatureLoad(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let signatures = Self::parse_list(&contents)?;
        if signatures.is_empty() {
            return Err(Error::SignatureLoad(format!(
                "No signatures found in {}",
                path.display()
            )));
        }

        log::info!(
            "Loaded {} signatures from {}",
            signatures.len(),
            path.display()
        );

        Ok(Self {
            signatures,
            source: SignatureSource::File(path.to_path_buf()),
        })
    }

    /// Parse signature-list text.
    pub fn parse_list(text: &str) -> Result<Vec<Signature>> {
        let mut signatures = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let signature = Signature::parse(line).map_err(|reason| Error::InvalidSignature {
                line: index + 1,
                reason,
            })?;
            signatures.push(signature);
        }

        Ok(signatures)
    }

    /// The compiled-in signature list.
    pub fn default_signatures() -> Self {
        let signatures = DEFAULT_SIGNATURES
            .iter()
            .filter_map(|line| match Signature::parse(line) {
                Ok(sig) => Some(sig),
                Err(e) => {
                    log::error!("Built-in signature failed to compile: {} ({})", line, e);
                    None
                }
            })
            .collect();

        Self {
            signatures,
            source: SignatureSource::BuiltIn {
                version: DEFAULT_SIGNATURES_VERSION,
            },
        }
    }

    /// Index of the first signature found in `data`.
    pub fn first_match(&self, data: &[u8]) -> Option<usize> {
        self.signatures.iter().position(|sig| sig.matches(data))
    }

    /// Longest literal signature, used to size the streaming carry window.
    pub fn longest_literal(&self) -> usize {
        self.signatures
            .iter()
            .filter_map(Signature::literal_len)
            .max()
            .unwrap_or(0)
    }

    pub fn get(&self, index: usize) -> Option<&Signature> {
        self.signatures.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn source(&self) -> &SignatureSource {
        &self.source
    }
}
