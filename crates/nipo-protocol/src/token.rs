//! Session token format.
//!
//! A token is an opaque bearer string that can still be read back to the
//! session's sequence number without touching the store:
//!
//! ```text
//! NIPO_AULA_12                     canonical form (hand-typed fallback)
//! NIPO_AULA_12-9f3c01d2aa7e4b60    issued form: canonical + issuance tag
//! └──┘ └──┘ └┘ └──────────────┘
//! prefix type seq  16 lowercase hex
//! ```
//!
//! The issuance tag changes on every issue, so a reissued token never equals
//! the value it replaces. Tokens are not signed; possession is the only
//! credential.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Random bytes in an issuance tag (rendered as twice as many hex chars).
const TAG_BYTES: usize = 8;

/// The fixed literals every token starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenFormat {
    pub prefix: String,
    pub kind: String,
}

impl Default for TokenFormat {
    fn default() -> Self {
        Self {
            prefix: "NIPO".into(),
            kind: "AULA".into(),
        }
    }
}

/// A structurally valid token, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToken {
    pub sequence: u64,
    /// `None` for the canonical form.
    pub tag: Option<String>,
}

impl TokenFormat {
    /// Checks that both literals are non-empty uppercase ASCII alphanumerics.
    ///
    /// Anything else could collide with the `_` and `-` separators.
    pub fn validated(self) -> Result<Self, ProtocolError> {
        for (field, value) in [("prefix", &self.prefix), ("kind", &self.kind)] {
            let ok = !value.is_empty()
                && value
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
            if !ok {
                return Err(ProtocolError::InvalidFormat(format!(
                    "token {field} must be non-empty uppercase ASCII alphanumerics, got {value:?}"
                )));
            }
        }
        Ok(self)
    }

    /// The canonical token for a sequence number: `PREFIX_KIND_<sequence>`.
    pub fn canonical(&self, sequence: u64) -> String {
        format!("{}_{}_{sequence}", self.prefix, self.kind)
    }

    /// A freshly tagged token for a sequence number.
    pub fn issue(&self, sequence: u64) -> String {
        let bytes: [u8; TAG_BYTES] = rand::rng().random();
        let tag: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        format!("{}-{tag}", self.canonical(sequence))
    }

    /// Parses a raw string against this format.
    ///
    /// The match is exact: no surrounding whitespace, no leading zeros in
    /// the sequence, no uppercase hex in the tag. Callers trim input first
    /// if they want leniency.
    pub fn parse(&self, raw: &str) -> Result<ParsedToken, ProtocolError> {
        let malformed = || ProtocolError::MalformedToken(raw.to_string());

        let rest = raw
            .strip_prefix(self.prefix.as_str())
            .and_then(|r| r.strip_prefix('_'))
            .and_then(|r| r.strip_prefix(self.kind.as_str()))
            .and_then(|r| r.strip_prefix('_'))
            .ok_or_else(malformed)?;

        let (digits, tag) = match rest.split_once('-') {
            Some((digits, tag)) => (digits, Some(tag)),
            None => (rest, None),
        };

        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || (digits.len() > 1 && digits.starts_with('0'))
        {
            return Err(malformed());
        }
        // Overflowing u64 is just another malformed input.
        let sequence: u64 = digits.parse().map_err(|_| malformed())?;

        if let Some(tag) = tag {
            let well_formed = tag.len() == TAG_BYTES * 2
                && tag
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
            if !well_formed {
                return Err(malformed());
            }
        }

        Ok(ParsedToken {
            sequence,
            tag: tag.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt() -> TokenFormat {
        TokenFormat::default()
    }

    #[test]
    fn test_canonical_matches_documented_shape() {
        assert_eq!(fmt().canonical(12), "NIPO_AULA_12");
    }

    #[test]
    fn test_parse_canonical_returns_sequence() {
        let parsed = fmt().parse("NIPO_AULA_5").unwrap();
        assert_eq!(parsed.sequence, 5);
        assert_eq!(parsed.tag, None);
    }

    #[test]
    fn test_issue_parses_back_to_same_sequence() {
        let token = fmt().issue(5);
        let parsed = fmt().parse(&token).unwrap();
        assert_eq!(parsed.sequence, 5);
        assert_eq!(parsed.tag.as_deref().map(str::len), Some(16));
        assert!(token.starts_with("NIPO_AULA_5-"));
    }

    #[test]
    fn test_issue_twice_gives_different_tokens() {
        assert_ne!(fmt().issue(5), fmt().issue(5));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for raw in [
            "garbage123",
            "",
            "NIPO_AULA_",
            "NIPO_AULA_x5",
            "NIPO_AULA_-5",
            "NIPO_AULA_+5",
            "NIPO_AULA_05",
            "nipo_aula_5",
            "NIPO_PROVA_5",
            "NIPO__AULA_5",
            " NIPO_AULA_5",
            "NIPO_AULA_5 ",
            "NIPO_AULA_99999999999999999999999",
        ] {
            assert!(
                matches!(fmt().parse(raw), Err(ProtocolError::MalformedToken(_))),
                "{raw:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_rejects_bad_tags() {
        for raw in [
            "NIPO_AULA_5-",
            "NIPO_AULA_5-abc",
            "NIPO_AULA_5-9F3C01D2AA7E4B60",
            "NIPO_AULA_5-9f3c01d2aa7e4b60ff",
            "NIPO_AULA_5-9f3c01d2aa7e4bzz",
        ] {
            assert!(fmt().parse(raw).is_err(), "{raw:?} should be malformed");
        }
    }

    #[test]
    fn test_parse_accepts_zero_sequence() {
        assert_eq!(fmt().parse("NIPO_AULA_0").unwrap().sequence, 0);
    }

    #[test]
    fn test_custom_format_round_trips() {
        let custom = TokenFormat {
            prefix: "UNI".into(),
            kind: "LAB".into(),
        }
        .validated()
        .unwrap();
        let token = custom.issue(40);
        assert_eq!(custom.parse(&token).unwrap().sequence, 40);
        assert!(fmt().parse(&token).is_err());
    }

    #[test]
    fn test_validated_rejects_separator_characters() {
        let bad = TokenFormat {
            prefix: "NI_PO".into(),
            kind: "AULA".into(),
        };
        assert!(matches!(bad.validated(), Err(ProtocolError::InvalidFormat(_))));

        let empty = TokenFormat {
            prefix: "NIPO".into(),
            kind: String::new(),
        };
        assert!(empty.validated().is_err());
    }
}
