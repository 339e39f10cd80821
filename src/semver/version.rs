//! SemVer 2.0.0 version parsing and precedence.

use std::cmp::Ordering;
use std::fmt;

use anyhow::Result;

use super::lexer::{semver_err, Lexer, Token};

/// One dotted identifier in a pre-release or build-metadata list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Num(u64),
    AlphaNum(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Num(n) => write!(f, "{n}"),
            Identifier::AlphaNum(s) => write!(f, "{s}"),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Num(a), Identifier::Num(b)) => a.cmp(b),
            // Mixed identifiers compare by their rendered form; digits sort
            // before letters, which keeps numeric < alphanumeric.
            (a, b) => a.to_string().cmp(&b.to_string()),
        }
    }
}

/// Pre-release component (`-alpha.1`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Prerelease {
    pub ident: Vec<Identifier>,
}

impl Prerelease {
    pub fn is_empty(&self) -> bool {
        self.ident.is_empty()
    }

    pub fn parse(s: &str) -> Result<Prerelease> {
        Parser::new(s).parse_pre()
    }
}

impl fmt::Display for Prerelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ident) in self.ident.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{ident}")?;
        }
        Ok(())
    }
}

impl PartialOrd for Prerelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Prerelease {
    fn cmp(&self, other: &Self) -> Ordering {
        // A version without a pre-release tag is greater than any with one.
        match (self.ident.is_empty(), other.ident.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
        for (a, b) in self.ident.iter().zip(&other.ident) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.ident.len().cmp(&other.ident.len())
    }
}

/// Build metadata (`+build.42`). Ignored by SemVer precedence but used
/// here as a secondary key for a deterministic total order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildMetadata {
    pub ident: Vec<Identifier>,
}

impl BuildMetadata {
    pub fn is_empty(&self) -> bool {
        self.ident.is_empty()
    }

    pub fn parse(s: &str) -> Result<BuildMetadata> {
        Parser::new(s).parse_build()
    }
}

impl fmt::Display for BuildMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ident) in self.ident.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{ident}")?;
        }
        Ok(())
    }
}

impl PartialOrd for BuildMetadata {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BuildMetadata {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.ident.iter().zip(&other.ident) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.ident.len().cmp(&other.ident.len())
    }
}

/// A parsed semantic version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Prerelease,
    pub build: BuildMetadata,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            pre: Prerelease::default(),
            build: BuildMetadata::default(),
        }
    }

    pub fn parse(s: &str) -> Result<Version> {
        Parser::new(s).parse_version()
    }

    /// Single-number encoding used by the generated `*_VERSION_NUM` macro.
    pub fn to_num(&self) -> u64 {
        self.major * 100_000 + self.minor * 1_000 + self.patch
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre)?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build)?;
        }
        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
            .then_with(|| self.pre.cmp(&other.pre))
            .then_with(|| self.build.cmp(&other.build))
    }
}

pub(super) struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub(super) fn new(s: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(s),
        }
    }

    fn err_at(&self, tok: &Token<'_>, msg: &str) -> anyhow::Error {
        semver_err(self.lexer.s, self.lexer.pos, tok.width(), msg)
    }

    pub(super) fn parse_version(&mut self) -> Result<Version> {
        if self.lexer.peek()? == Token::Eof {
            return Err(anyhow::anyhow!(
                "invalid semver:\nempty string is not a valid semver"
            ));
        }

        let major = self.parse_num()?;
        self.parse_dot()?;
        let minor = self.parse_num()?;
        self.parse_dot()?;
        let patch = self.parse_num()?;

        let pre = if self.lexer.peek()? == Token::Hyphen {
            self.lexer.step();
            self.parse_pre()?
        } else {
            Prerelease::default()
        };

        let build = if self.lexer.peek()? == Token::Plus {
            self.lexer.step();
            self.parse_build()?
        } else {
            BuildMetadata::default()
        };

        if !self.lexer.is_eof() {
            let tok = self.lexer.peek()?;
            let msg = format!(" unexpected character: `{}`", self.lexer.current_char());
            return Err(self.err_at(&tok, &msg));
        }

        Ok(Version {
            major,
            minor,
            patch,
            pre,
            build,
        })
    }

    fn parse_num(&mut self) -> Result<u64> {
        let tok = self.lexer.peek()?;
        match tok {
            Token::Num(_) => match self.lexer.next()? {
                Token::Num(n) => Ok(n),
                _ => unreachable!(),
            },
            tok => Err(self.err_at(&tok, " expected number")),
        }
    }

    fn parse_dot(&mut self) -> Result<()> {
        let tok = self.lexer.next()?;
        if tok == Token::Dot {
            return Ok(());
        }
        Err(self.err_at(&tok, " expected `.`"))
    }

    // pre ::= numOrIdent ("." numOrIdent)*
    pub(super) fn parse_pre(&mut self) -> Result<Prerelease> {
        let mut idents = vec![self.parse_num_or_ident()?];
        while self.lexer.peek()? == Token::Dot {
            self.lexer.step();
            idents.push(self.parse_num_or_ident()?);
        }
        Ok(Prerelease { ident: idents })
    }

    // numOrIdent ::= num | ident
    fn parse_num_or_ident(&mut self) -> Result<Identifier> {
        let tok = self.lexer.peek()?;
        match tok {
            Token::Num(_) | Token::Ident(_) => match self.lexer.next()? {
                Token::Num(n) => Ok(Identifier::Num(n)),
                Token::Ident(s) => Ok(Identifier::AlphaNum(s.to_string())),
                _ => unreachable!(),
            },
            tok => Err(self.err_at(&tok, " expected number or identifier")),
        }
    }

    // build ::= ident ("." ident)*
    pub(super) fn parse_build(&mut self) -> Result<BuildMetadata> {
        let mut idents = vec![self.parse_ident()?];
        while self.lexer.peek()? == Token::Dot {
            self.lexer.step();
            idents.push(self.parse_ident()?);
        }
        Ok(BuildMetadata { ident: idents })
    }

    // Build identifiers stay textual even when they look numeric, so
    // leading zeros are allowed (`+0851523`).
    fn parse_ident(&mut self) -> Result<Identifier> {
        let tok = self.lexer.peek()?;
        match tok {
            Token::Num(_) | Token::Ident(_) => {
                let start = self.lexer.pos;
                let mut end = start;
                let bytes = self.lexer.s.as_bytes();
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'-')
                {
                    end += 1;
                }
                self.lexer.pos = end;
                Ok(Identifier::AlphaNum(self.lexer.s[start..end].to_string()))
            }
            tok => Err(self.err_at(&tok, " expected identifier")),
        }
    }
}
