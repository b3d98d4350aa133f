//! Parsing of the comma-separated distinguished name the platform hands out
//! as the required certificate subject, e.g. `OU=OrgUnit,O=Organization,CN=app,`.
//!
//! 解析平台下发的以逗号分隔的证书主题（DN）字符串。

use crate::error::{HandshakeError, Result};
use std::collections::BTreeMap;

pub const COMMON_NAME: &str = "CN";
pub const ORGANIZATION: &str = "O";
pub const ORGANIZATIONAL_UNIT: &str = "OU";
pub const LOCALITY: &str = "L";
pub const PROVINCE: &str = "ST";
pub const COUNTRY: &str = "C";

/// A parsed certificate subject: attribute code to value.
///
/// Codes the CSR generator does not know about are kept, just never read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    attributes: BTreeMap<String, String>,
}

impl Subject {
    /// Value for `code`, or the empty string when the subject has none.
    pub fn get(&self, code: &str) -> &str {
        self.attributes.get(code).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, code: &str) -> bool {
        self.attributes.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parses `subject` into its attributes.
///
/// One trailing `,` is ignored. Every remaining entry must contain `=`; the
/// first `=` separates the code from the value, so values may themselves
/// contain `=`. When a code repeats, the last occurrence wins.
///
/// 解析证书主题。忽略一个结尾逗号；每一项都必须包含 `=`，否则返回
/// [`HandshakeError::InvalidSubjectFormat`]。重复的键以最后一次出现为准。
pub fn parse_subject(subject: &str) -> Result<Subject> {
    let trimmed = subject.strip_suffix(',').unwrap_or(subject);
    let mut attributes = BTreeMap::new();

    if trimmed.trim().is_empty() {
        return Ok(Subject { attributes });
    }

    for entry in trimmed.split(',') {
        let (code, value) = entry.split_once('=').ok_or_else(|| {
            HandshakeError::InvalidSubjectFormat(format!("entry {entry:?} has no '='"))
        })?;
        let code = code.trim();
        if code.is_empty() {
            return Err(HandshakeError::InvalidSubjectFormat(format!(
                "entry {entry:?} has an empty attribute code"
            )));
        }
        attributes.insert(code.to_string(), value.trim().to_string());
    }

    Ok(Subject { attributes })
}
