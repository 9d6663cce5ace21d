//! Media URL template expansion.
//!
//! From https://dashif.org/docs/DASH-IF-IOP-v4.3.pdf:
//! "For the avoidance of doubt, only %0[width]d is permitted and no other
//! identifiers. The reason is that such a string replacement can be easily
//! implemented without requiring a specific library."
//!
//! Templates are tokenized once at selection time; expansion afterwards is a
//! plain substitution. The standard leaves unrecognized `$...$` identifiers
//! undefined, so they are rejected here instead of being passed through.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DashlingError, DashlingResult};

static FORMAT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^%0([0-9]+)d$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Identifier {
    RepresentationId,
    Number,
    Bandwidth,
    Time,
}

#[derive(Debug, Clone)]
enum Piece {
    Literal(String),
    Substitution {
        identifier: Identifier,
        width: usize,
    },
}

/// Substitution arguments for one segment instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateArgs<'a> {
    pub representation_id: &'a str,
    pub number: u64,
    pub bandwidth: u64,
    /// Segment start in timescale units.
    pub time: u64,
}

#[derive(Debug, Clone)]
pub struct UrlTemplate {
    pieces: Vec<Piece>,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> DashlingResult<Self> {
        let err = |reason: String| DashlingError::Template(format!("{template:?}: {reason}"));

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(pos) = rest.find('$') {
            literal.push_str(&rest[..pos]);
            rest = &rest[pos + 1..];

            // "$$" is an escaped dollar sign.
            if let Some(after) = rest.strip_prefix('$') {
                literal.push('$');
                rest = after;
                continue;
            }

            let end = rest
                .find('$')
                .ok_or_else(|| err("unterminated $Identifier$".to_string()))?;
            let body = &rest[..end];
            rest = &rest[end + 1..];

            let (name, format) = match body.find('%') {
                Some(split) => (&body[..split], Some(&body[split..])),
                None => (body, None),
            };
            let identifier = match name {
                "RepresentationID" => Identifier::RepresentationId,
                "Number" => Identifier::Number,
                "Bandwidth" => Identifier::Bandwidth,
                "Time" => Identifier::Time,
                unknown => return Err(err(format!("unknown identifier {unknown:?}"))),
            };
            let width = match format {
                Some(format) => {
                    let captures = FORMAT_TAG
                        .captures(format)
                        .ok_or_else(|| err(format!("invalid format tag {format:?}")))?;
                    captures[1]
                        .parse::<usize>()
                        .map_err(|_| err(format!("invalid format width {format:?}")))?
                }
                None => 0,
            };

            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Piece::Substitution { identifier, width });
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self { pieces })
    }

    pub fn expand(&self, args: &TemplateArgs) -> DashlingResult<String> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(literal) => out.push_str(literal),
                Piece::Substitution { identifier, width } => {
                    let value = match identifier {
                        Identifier::RepresentationId => {
                            validate_rfc1738(args.representation_id)?;
                            args.representation_id.to_string()
                        }
                        Identifier::Number => args.number.to_string(),
                        Identifier::Bandwidth => args.bandwidth.to_string(),
                        Identifier::Time => args.time.to_string(),
                    };
                    if *width > 0 {
                        out.push_str(&format!("{value:0>width$}", width = *width));
                    } else {
                        out.push_str(&value);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Whether the template substitutes `$Time$` anywhere.
    pub fn uses_time(&self) -> bool {
        self.pieces.iter().any(|piece| {
            matches!(
                piece,
                Piece::Substitution {
                    identifier: Identifier::Time,
                    ..
                }
            )
        })
    }
}

/// A RepresentationID substituted into a URL must only contain RFC 1738
/// unreserved/reserved characters or %-escapes.
fn validate_rfc1738(id: &str) -> DashlingResult<()> {
    let bytes = id.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => {}
            b'$' | b'-' | b'_' | b'.' | b'+' | b'!' | b'*' | b'\'' | b'(' | b')' | b',' => {}
            b';' | b'/' | b'?' | b':' | b'@' | b'=' | b'&' => {}
            b'%' => {
                let valid = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                    && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
                if !valid {
                    return Err(DashlingError::Template(format!(
                        "RepresentationID {id:?} contains an invalid %-escape"
                    )));
                }
                i += 2;
            }
            _ => {
                return Err(DashlingError::Template(format!(
                    "RepresentationID {id:?} contains URL-unsafe characters"
                )))
            }
        }
        i += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> TemplateArgs<'static> {
        TemplateArgs {
            representation_id: "video-1",
            number: 7,
            bandwidth: 128000,
            time: 900000,
        }
    }

    #[test]
    fn test_expand() {
        let template = UrlTemplate::parse("$RepresentationID$/$Number$.m4s").unwrap();
        assert_eq!(template.expand(&args()).unwrap(), "video-1/7.m4s");

        let template = UrlTemplate::parse("seg-$Number%05d$-$Bandwidth$.m4s").unwrap();
        assert_eq!(template.expand(&args()).unwrap(), "seg-00007-128000.m4s");

        let template = UrlTemplate::parse("t/$Time$.m4s").unwrap();
        assert_eq!(template.expand(&args()).unwrap(), "t/900000.m4s");
        assert!(template.uses_time());
    }

    #[test]
    fn test_literal_dollar() {
        let template = UrlTemplate::parse("a$$b/$Number$").unwrap();
        assert_eq!(template.expand(&args()).unwrap(), "a$b/7");

        let template = UrlTemplate::parse("$$").unwrap();
        assert_eq!(template.expand(&args()).unwrap(), "$");
    }

    #[test]
    fn test_unknown_identifier_is_rejected() {
        assert!(UrlTemplate::parse("$SubNumber$.m4s").is_err());
        assert!(UrlTemplate::parse("$number$.m4s").is_err());
        assert!(UrlTemplate::parse("$Number").is_err());
    }

    #[test]
    fn test_format_tag_is_validated() {
        assert!(UrlTemplate::parse("$Number%05d$").is_ok());
        assert!(UrlTemplate::parse("$Number%5d$").is_err());
        assert!(UrlTemplate::parse("$Number%05x$").is_err());
        assert!(UrlTemplate::parse("$Number%05d-extra$").is_err());
    }

    #[test]
    fn test_representation_id_url_safety() {
        let template = UrlTemplate::parse("$RepresentationID$.m4s").unwrap();

        let ok = TemplateArgs {
            representation_id: "audio/en%20us",
            ..args()
        };
        assert!(template.expand(&ok).is_ok());

        let bad = TemplateArgs {
            representation_id: "audio en",
            ..args()
        };
        assert!(template.expand(&bad).is_err());

        let bad_escape = TemplateArgs {
            representation_id: "a%zz",
            ..args()
        };
        assert!(template.expand(&bad_escape).is_err());
    }
}
