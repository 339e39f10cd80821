//! Cargo-style version requirements.
//!
//! Requirements are comma-separated comparators; each comparator is an
//! optional operator followed by a possibly-partial version. System
//! dependencies render requirements into pkg-config's interval syntax
//! via [`VersionReq::to_pkg_config_string`].

use std::fmt;

use anyhow::{bail, Context, Result};

use super::version::{Prerelease, Version};

/// Comparator operator. A bare version behaves like `^` (Cargo default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Op {
    Exact,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Tilde,
    #[default]
    Caret,
    Wildcard,
}

/// One comparator, e.g. `>=1.2` or `^0.4.1-rc.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub major: u64,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    pub pre: Prerelease,
}

impl Comparator {
    fn parse(input: &str) -> Result<Comparator> {
        let s = input.trim();
        if s.is_empty() {
            bail!("empty version requirement comparator");
        }
        if s == "*" {
            return Ok(Comparator {
                op: Op::Wildcard,
                major: 0,
                minor: None,
                patch: None,
                pre: Prerelease::default(),
            });
        }

        let (op, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (Op::GreaterEq, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (Op::LessEq, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (Op::Greater, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (Op::Less, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (Op::Exact, rest)
        } else if let Some(rest) = s.strip_prefix('~') {
            (Op::Tilde, rest)
        } else if let Some(rest) = s.strip_prefix('^') {
            (Op::Caret, rest)
        } else {
            (Op::Caret, s)
        };

        let rest = rest.trim();
        if rest.is_empty() {
            bail!("expected version after operator in `{input}`");
        }

        // Split off a pre-release suffix before splitting on dots; the
        // pre-release part may itself contain dots.
        let (numbers, pre) = match rest.split_once('-') {
            Some((num, pre)) => (
                num,
                Prerelease::parse(pre)
                    .with_context(|| format!("invalid pre-release in `{input}`"))?,
            ),
            None => (rest, Prerelease::default()),
        };

        let mut parts = numbers.split('.');
        let major = parse_part(parts.next(), input)?
            .with_context(|| format!("expected major version in `{input}`"))?;
        let minor = parse_part(parts.next(), input)?;
        let patch = parse_part(parts.next(), input)?;
        if parts.next().is_some() {
            bail!("too many version components in `{input}`");
        }
        if patch.is_some() && minor.is_none() {
            bail!("invalid version in `{input}`");
        }

        Ok(Comparator {
            op,
            major,
            minor,
            patch,
            pre,
        })
    }

    /// Lower bound of this comparator with missing components zeroed.
    fn lower(&self) -> Version {
        Version {
            major: self.major,
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            pre: self.pre.clone(),
            build: Default::default(),
        }
    }

    /// Exclusive upper bound for range-style operators.
    fn upper(&self) -> Version {
        match self.op {
            Op::Caret => {
                if self.major > 0 || self.minor.is_none() {
                    Version::new(self.major + 1, 0, 0)
                } else if self.minor.unwrap_or(0) > 0 || self.patch.is_none() {
                    Version::new(0, self.minor.unwrap_or(0) + 1, 0)
                } else {
                    Version::new(0, 0, self.patch.unwrap_or(0) + 1)
                }
            }
            Op::Tilde => {
                if self.minor.is_some() {
                    Version::new(self.major, self.minor.unwrap_or(0) + 1, 0)
                } else {
                    Version::new(self.major + 1, 0, 0)
                }
            }
            // Partial `=1.2` behaves as the implied range [1.2.0, 1.3.0).
            Op::Exact => {
                if self.minor.is_none() {
                    Version::new(self.major + 1, 0, 0)
                } else {
                    Version::new(self.major, self.minor.unwrap_or(0) + 1, 0)
                }
            }
            _ => unreachable!("upper() only applies to range operators"),
        }
    }

    fn matches(&self, ver: &Version) -> bool {
        let lower = self.lower();
        match self.op {
            Op::Wildcard => true,
            Op::Exact => {
                if self.patch.is_some() {
                    ver.major == lower.major
                        && ver.minor == lower.minor
                        && ver.patch == lower.patch
                        && ver.pre == lower.pre
                } else {
                    *ver >= lower && *ver < self.upper()
                }
            }
            Op::Greater => *ver > lower,
            Op::GreaterEq => *ver >= lower,
            Op::Less => *ver < lower,
            Op::LessEq => *ver <= lower,
            Op::Caret | Op::Tilde => *ver >= lower && *ver < self.upper(),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Op::Exact => "=",
            Op::Greater => ">",
            Op::GreaterEq => ">=",
            Op::Less => "<",
            Op::LessEq => "<=",
            Op::Tilde => "~",
            Op::Caret => "^",
            Op::Wildcard => return write!(f, "*"),
        };
        write!(f, "{op}{}", self.major)?;
        if let Some(minor) = self.minor {
            write!(f, ".{minor}")?;
        }
        if let Some(patch) = self.patch {
            write!(f, ".{patch}")?;
        }
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre)?;
        }
        Ok(())
    }
}

fn parse_part(part: Option<&str>, input: &str) -> Result<Option<u64>> {
    match part {
        None | Some("") => Ok(None),
        Some(p) => {
            let n = p
                .parse::<u64>()
                .with_context(|| format!("invalid version number `{p}` in `{input}`"))?;
            Ok(Some(n))
        }
    }
}

/// A set of comparators, all of which must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReq {
    pub comparators: Vec<Comparator>,
}

impl VersionReq {
    pub fn parse(s: &str) -> Result<VersionReq> {
        let s = s.trim();
        if s.is_empty() {
            bail!("empty version requirement");
        }
        let comparators = s
            .split(',')
            .map(Comparator::parse)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("invalid version requirement `{s}`"))?;
        Ok(VersionReq { comparators })
    }

    pub fn matches(&self, ver: &Version) -> bool {
        // Pre-release versions only match comparators that themselves
        // carry a pre-release on the same version triple.
        if !ver.pre.is_empty() {
            let allowed = self.comparators.iter().any(|c| {
                !c.pre.is_empty()
                    && c.major == ver.major
                    && c.minor.map_or(true, |m| m == ver.minor)
                    && c.patch.map_or(true, |p| p == ver.patch)
            });
            if !allowed {
                return false;
            }
        }
        self.comparators.iter().all(|c| c.matches(ver))
    }

    /// Render into pkg-config's module-list syntax, e.g.
    /// `^1.2` on `fmt` becomes `fmt >= 1.2.0 fmt < 2.0.0`.
    pub fn to_pkg_config_string(&self, name: &str) -> String {
        let mut parts = Vec::new();
        for c in &self.comparators {
            match c.op {
                Op::Wildcard => parts.push(name.to_string()),
                Op::Exact if c.patch.is_some() => {
                    parts.push(format!("{name} = {}", c.lower()));
                }
                Op::Greater => parts.push(format!("{name} > {}", c.lower())),
                Op::GreaterEq => parts.push(format!("{name} >= {}", c.lower())),
                Op::Less => parts.push(format!("{name} < {}", c.lower())),
                Op::LessEq => parts.push(format!("{name} <= {}", c.lower())),
                Op::Caret | Op::Tilde | Op::Exact => {
                    parts.push(format!("{name} >= {}", c.lower()));
                    parts.push(format!("{name} < {}", c.upper()));
                }
            }
        }
        parts.join(" ")
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.comparators.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn req(s: &str) -> VersionReq {
        VersionReq::parse(s).unwrap()
    }

    #[test]
    fn test_parse_operators() {
        assert_eq!(req("1.2.3").comparators[0].op, Op::Caret);
        assert_eq!(req("^1.2.3").comparators[0].op, Op::Caret);
        assert_eq!(req("~1.2").comparators[0].op, Op::Tilde);
        assert_eq!(req("=1.2.3").comparators[0].op, Op::Exact);
        assert_eq!(req(">=1.0").comparators[0].op, Op::GreaterEq);
        assert_eq!(req("<2").comparators[0].op, Op::Less);
        assert_eq!(req("*").comparators[0].op, Op::Wildcard);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(VersionReq::parse("").is_err());
        assert!(VersionReq::parse(">=").is_err());
        assert!(VersionReq::parse("1.2.3.4").is_err());
        assert!(VersionReq::parse("abc").is_err());
        assert!(VersionReq::parse("1..3").is_err());
    }

    #[test]
    fn test_caret_matching() {
        let r = req("^1.2.3");
        assert!(r.matches(&v("1.2.3")));
        assert!(r.matches(&v("1.9.0")));
        assert!(!r.matches(&v("2.0.0")));
        assert!(!r.matches(&v("1.2.2")));

        // Caret on 0.x pins the minor.
        let r = req("^0.4.1");
        assert!(r.matches(&v("0.4.9")));
        assert!(!r.matches(&v("0.5.0")));

        // Caret on 0.0.x pins the patch.
        let r = req("^0.0.3");
        assert!(r.matches(&v("0.0.3")));
        assert!(!r.matches(&v("0.0.4")));
    }

    #[test]
    fn test_tilde_matching() {
        let r = req("~1.2.3");
        assert!(r.matches(&v("1.2.9")));
        assert!(!r.matches(&v("1.3.0")));

        let r = req("~1");
        assert!(r.matches(&v("1.9.9")));
        assert!(!r.matches(&v("2.0.0")));
    }

    #[test]
    fn test_intersection() {
        let r = req(">=1.2, <1.5");
        assert!(r.matches(&v("1.2.0")));
        assert!(r.matches(&v("1.4.9")));
        assert!(!r.matches(&v("1.5.0")));
        assert!(!r.matches(&v("1.1.9")));
    }

    #[test]
    fn test_prerelease_matching() {
        let r = req("^1.2.3-alpha.1");
        assert!(r.matches(&v("1.2.3-alpha.2")));
        assert!(r.matches(&v("1.2.3")));
        // Pre-release of a different triple never matches.
        assert!(!r.matches(&v("1.3.0-alpha.1")));

        let r = req("^1.2.3");
        assert!(!r.matches(&v("1.2.4-alpha.1")));
    }

    #[test]
    fn test_wildcard() {
        let r = req("*");
        assert!(r.matches(&v("0.0.1")));
        assert!(r.matches(&v("99.9.9")));
    }

    #[test]
    fn test_to_pkg_config_string() {
        assert_eq!(
            req("^1.2").to_pkg_config_string("fmt"),
            "fmt >= 1.2.0 fmt < 2.0.0"
        );
        assert_eq!(
            req("~9.1.0").to_pkg_config_string("fmt"),
            "fmt >= 9.1.0 fmt < 9.2.0"
        );
        assert_eq!(
            req("=1.2.3").to_pkg_config_string("fmt"),
            "fmt = 1.2.3"
        );
        assert_eq!(
            req(">=1.0, <2.0").to_pkg_config_string("zlib"),
            "zlib >= 1.0.0 zlib < 2.0.0"
        );
        assert_eq!(req("*").to_pkg_config_string("zlib"), "zlib");
        assert_eq!(
            req("^0.4").to_pkg_config_string("x"),
            "x >= 0.4.0 x < 0.5.0"
        );
    }

    #[test]
    fn test_display_roundtrip() {
        assert_eq!(req("^1.2.3").to_string(), "^1.2.3");
        assert_eq!(req(">=1.0, <2.0").to_string(), ">=1.0, <2.0");
        assert_eq!(req("*").to_string(), "*");
    }
}
