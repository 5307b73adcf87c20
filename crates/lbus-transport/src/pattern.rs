use crate::error::{TransportError, TransportResult};

/// A subscription pattern over dot-separated subjects.
///
/// `*` matches exactly one token; `>` (last token only) matches one or more
/// trailing tokens. Everything else matches literally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectPattern {
    tokens: Vec<Token>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Literal(String),
    Single,
    Tail,
}

impl SubjectPattern {
    pub fn parse(pattern: &str) -> TransportResult<Self> {
        let raw: Vec<&str> = pattern.split('.').collect();
        let mut tokens = Vec::with_capacity(raw.len());
        for (i, token) in raw.iter().enumerate() {
            check_token(pattern, token)?;
            tokens.push(match *token {
                "*" => Token::Single,
                ">" if i + 1 == raw.len() => Token::Tail,
                ">" => {
                    return Err(TransportError::InvalidSubject(format!(
                        "'>' must be the last token in {pattern:?}"
                    )))
                }
                literal => Token::Literal(literal.to_string()),
            });
        }
        Ok(Self { tokens })
    }

    pub fn matches(&self, subject: &str) -> bool {
        let mut parts = subject.split('.');
        for token in &self.tokens {
            match token {
                Token::Tail => return parts.next().is_some(),
                Token::Single => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Token::Literal(expected) => {
                    if parts.next() != Some(expected.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }

    pub fn is_literal(&self) -> bool {
        self.tokens.iter().all(|t| matches!(t, Token::Literal(_)))
    }
}

/// Validate a concrete subject for publishing: no wildcards, no empty tokens.
pub fn validate_subject(subject: &str) -> TransportResult<()> {
    for token in subject.split('.') {
        check_token(subject, token)?;
        if token == "*" || token == ">" {
            return Err(TransportError::InvalidSubject(format!(
                "wildcards are not allowed when publishing: {subject:?}"
            )));
        }
    }
    Ok(())
}

fn check_token(subject: &str, token: &str) -> TransportResult<()> {
    if token.is_empty() {
        return Err(TransportError::InvalidSubject(format!("empty token in {subject:?}")));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(TransportError::InvalidSubject(format!("whitespace in {subject:?}")));
    }
    Ok(())
}
