//! Name patterns.
//!
//! A pattern text like `ns::Foo*` splits into qualification segments and
//! an innermost name pattern. The innermost segment supports exact,
//! prefix, and glob matching (case-sensitive or folded); qualification
//! segments always match exactly, compared innermost-outward against a
//! candidate's enclosing scopes.

use std::cmp::Ordering;

/// Case handling for pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    /// Names match exactly.
    Sensitive,
    /// Names match under ASCII case folding.
    Insensitive,
}

/// How the innermost segment matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Whole-name equality.
    Exact,
    /// Candidate name starts with the pattern.
    Prefix,
    /// Glob with `*` and `?`.
    Glob,
}

/// A compiled name pattern.
#[derive(Debug, Clone)]
pub struct NamePattern {
    qualification: Vec<String>,
    name: String,
    mode: MatchMode,
    case_sensitive: bool,
}

impl NamePattern {
    /// Compiles `text`, splitting `::`-separated qualification. A segment
    /// containing `*` or `?` selects glob matching.
    pub fn compile(text: &str, case: CaseMode) -> Self {
        let mut segments: Vec<String> = text.split("::").map(str::to_owned).collect();
        let name = segments.pop().unwrap_or_default();
        let mode = if name.contains(['*', '?']) {
            MatchMode::Glob
        } else {
            MatchMode::Exact
        };
        Self {
            qualification: segments,
            name,
            mode,
            case_sensitive: case == CaseMode::Sensitive,
        }
    }

    /// Upgrades an exact innermost match to a prefix match.
    pub fn prefix(mut self) -> Self {
        if self.mode == MatchMode::Exact {
            self.mode = MatchMode::Prefix;
        }
        self
    }

    /// Innermost name pattern text.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualification segments, outermost first.
    pub fn qualification(&self) -> &[String] {
        &self.qualification
    }

    /// Match mode of the innermost segment.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Whether names match case-sensitively.
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Longest literal prefix of the innermost segment, used to narrow the
    /// index scan before full matching.
    pub fn literal_prefix(&self) -> &str {
        match self.mode {
            MatchMode::Exact | MatchMode::Prefix => &self.name,
            MatchMode::Glob => {
                let end = self
                    .name
                    .find(['*', '?'])
                    .unwrap_or(self.name.len());
                &self.name[..end]
            }
        }
    }

    /// Whether a candidate's innermost name matches.
    pub fn matches_name(&self, candidate: &str) -> bool {
        match self.mode {
            MatchMode::Exact => {
                if self.case_sensitive {
                    candidate == self.name
                } else {
                    candidate.eq_ignore_ascii_case(&self.name)
                }
            }
            MatchMode::Prefix => starts_with(candidate, &self.name, self.case_sensitive),
            MatchMode::Glob => glob_match(&self.name, candidate, self.case_sensitive),
        }
    }

    /// Whether a candidate's enclosing scopes (outermost first) satisfy
    /// the supplied qualification. Every supplied segment must match the
    /// corresponding scope, innermost-outward; an empty qualification
    /// matches automatically.
    pub fn matches_scope(&self, scope: &[String]) -> bool {
        if self.qualification.len() > scope.len() {
            return false;
        }
        self.qualification
            .iter()
            .rev()
            .zip(scope.iter().rev())
            .all(|(wanted, actual)| {
                if self.case_sensitive {
                    wanted == actual
                } else {
                    wanted.eq_ignore_ascii_case(actual)
                }
            })
    }
}

fn starts_with(candidate: &str, prefix: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        candidate.starts_with(prefix)
    } else {
        candidate.len() >= prefix.len()
            && candidate
                .bytes()
                .zip(prefix.bytes())
                .all(|(c, p)| c.to_ascii_lowercase() == p.to_ascii_lowercase())
    }
}

/// Orders a candidate name against a literal prefix the way the index
/// comparator would, treating a proper prefix match as equality.
pub(crate) fn prefix_compare(name: &str, prefix: &str, case_sensitive: bool) -> Ordering {
    let fold = |b: u8| {
        if case_sensitive {
            b
        } else {
            b.to_ascii_lowercase()
        }
    };
    for (n, p) in name.bytes().zip(prefix.bytes()) {
        match fold(n).cmp(&fold(p)) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    if name.len() >= prefix.len() {
        Ordering::Equal
    } else {
        Ordering::Less
    }
}

fn glob_match(pattern: &str, text: &str, case_sensitive: bool) -> bool {
    let pattern: Vec<u8> = pattern.bytes().collect();
    let text: Vec<u8> = text.bytes().collect();
    let eq = |a: u8, b: u8| {
        if case_sensitive {
            a == b
        } else {
            a.to_ascii_lowercase() == b.to_ascii_lowercase()
        }
    };

    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || eq(pattern[p], text[t])) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}
