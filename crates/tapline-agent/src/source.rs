// Token source boundary
//
// The physical reader driver lives behind this trait; the agent only sees
// "a token is present" or "no token". StdinSource lets the pipeline run
// without hardware: one token id per line, a blank line lifts the token.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// One poll of the reader surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRead {
    /// A token is present on the reader.
    Token(String),
    /// No token present (the token-removed signal).
    NoToken,
}

#[async_trait]
pub trait TokenSource: Send {
    async fn read(&mut self) -> Result<TokenRead>;
}

/// Suppresses physically-repeated reads: the same token held against the
/// reader yields one tap until a NoToken read clears it. Purely an ergonomic
/// debounce, unrelated to the server-side duplicate check.
#[derive(Debug, Default)]
pub struct Debounce {
    last: Option<String>,
}

impl Debounce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the token id if this read is a new tap.
    pub fn observe(&mut self, read: TokenRead) -> Option<String> {
        match read {
            TokenRead::NoToken => {
                self.last = None;
                None
            }
            TokenRead::Token(id) => {
                if self.last.as_deref() == Some(id.as_str()) {
                    None
                } else {
                    self.last = Some(id.clone());
                    Some(id)
                }
            }
        }
    }
}

/// Line-fed token source for running the agent without a physical reader.
pub struct StdinSource {
    lines: Lines<BufReader<Stdin>>,
    read_timeout: Duration,
}

impl StdinSource {
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            read_timeout,
        }
    }
}

#[async_trait]
impl TokenSource for StdinSource {
    async fn read(&mut self) -> Result<TokenRead> {
        match tokio::time::timeout(self.read_timeout, self.lines.next_line()).await {
            // No input inside the poll window: nothing on the reader
            Err(_) => Ok(TokenRead::NoToken),
            Ok(line) => {
                let line = line?;
                match line.map(|l| l.trim().to_string()) {
                    Some(token) if !token.is_empty() => Ok(TokenRead::Token(token)),
                    _ => Ok(TokenRead::NoToken),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_token_reports_once() {
        let mut debounce = Debounce::new();
        assert_eq!(
            debounce.observe(TokenRead::Token("A".to_string())),
            Some("A".to_string())
        );
        assert_eq!(debounce.observe(TokenRead::Token("A".to_string())), None);
        assert_eq!(debounce.observe(TokenRead::Token("A".to_string())), None);
    }

    #[test]
    fn removal_then_retap_reports_again() {
        let mut debounce = Debounce::new();
        assert!(debounce.observe(TokenRead::Token("A".to_string())).is_some());
        assert_eq!(debounce.observe(TokenRead::NoToken), None);
        assert_eq!(
            debounce.observe(TokenRead::Token("A".to_string())),
            Some("A".to_string())
        );
    }

    #[test]
    fn different_token_reports_without_removal() {
        let mut debounce = Debounce::new();
        assert!(debounce.observe(TokenRead::Token("A".to_string())).is_some());
        assert_eq!(
            debounce.observe(TokenRead::Token("B".to_string())),
            Some("B".to_string())
        );
    }
}
