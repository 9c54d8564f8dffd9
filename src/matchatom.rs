//! The query expression tree: boolean combinators over typed
//! field-predicate leaves, built from a flat command-line token stream
//! and evaluated against one package at a time.

use crate::error::{EixError, Result};
use crate::package::Package;
use regex::Regex;
use std::cell::Cell;

/// Which package field a leaf predicate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Name,
    Category,
    CatName,
    Description,
    Homepage,
    License,
    Provide,
}

impl Selector {
    fn extract<'p>(self, pkg: &'p Package) -> std::borrow::Cow<'p, str> {
        match self {
            Selector::Name => pkg.name.as_str().into(),
            Selector::Category => pkg.category.as_str().into(),
            Selector::CatName => format!("{}/{}", pkg.category, pkg.name).into(),
            Selector::Description => pkg.desc.as_str().into(),
            Selector::Homepage => pkg.homepage.as_str().into(),
            Selector::License => pkg.licenses.as_str().into(),
            Selector::Provide => pkg.provide.as_str().into(),
        }
    }
}

/// Matching strategy applied to the selected field's string.
#[derive(Debug, Clone)]
pub enum Algorithm {
    Exact(String),
    Wildcard(String),
    Regex(Regex),
    Fuzzy { pattern: String, max_distance: usize },
}

impl Algorithm {
    pub fn exact(pattern: impl Into<String>) -> Self {
        Algorithm::Exact(pattern.into())
    }

    pub fn wildcard(pattern: impl Into<String>) -> Self {
        Algorithm::Wildcard(pattern.into())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Algorithm::Regex)
            .map_err(|e| EixError::bad_expression(0, format!("invalid regex /{pattern}/: {e}")))
    }

    pub fn fuzzy(pattern: impl Into<String>, max_distance: usize) -> Self {
        Algorithm::Fuzzy {
            pattern: pattern.into(),
            max_distance,
        }
    }

    /// Evaluate against `haystack`, returning the fuzzy distance when
    /// this is a `Fuzzy` leaf and it matched within its budget.
    fn eval(&self, haystack: &str) -> (bool, Option<usize>) {
        match self {
            Algorithm::Exact(p) => (haystack == p, None),
            Algorithm::Wildcard(p) => (wildcard_match(p, haystack), None),
            Algorithm::Regex(re) => (re.is_match(haystack), None),
            Algorithm::Fuzzy { pattern, max_distance } => {
                let d = levenshtein(pattern, haystack);
                (d <= *max_distance, Some(d))
            }
        }
    }
}

/// Shell-style glob match (`*`, `?`, `[...]`), anchored to the whole
/// string.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    wildcard_rec(&p, &t)
}

fn wildcard_rec(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('*') => wildcard_rec(&p[1..], t) || (!t.is_empty() && wildcard_rec(p, &t[1..])),
        Some('?') => !t.is_empty() && wildcard_rec(&p[1..], &t[1..]),
        Some('[') => {
            let close = p.iter().position(|&c| c == ']').unwrap_or(p.len());
            if close == p.len() || t.is_empty() {
                return false;
            }
            let class = &p[1..close];
            let (negate, class) = match class.first() {
                Some('!') | Some('^') => (true, &class[1..]),
                _ => (false, class),
            };
            let hit = class.contains(&t[0]);
            if hit == negate {
                return false;
            }
            wildcard_rec(&p[close + 1..], &t[1..])
        }
        Some(&c) => !t.is_empty() && t[0] == c && wildcard_rec(&p[1..], &t[1..]),
    }
}

/// Classic dynamic-programming edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        cur[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// The `-I` / `-D` / `-T` leaf modifiers, and `-!` leaf inversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub installed_only: bool,
    pub duplicates_only: bool,
    pub redundant_only: bool,
    pub invert: bool,
}

/// Oracles the leaf-level modifiers need, supplied by the query driver
/// from collaborators outside the core (installed-package database,
/// user config). A package not covered by either oracle answers `false`
/// for the corresponding modifier, matching the "no information means
/// no match" reading of `-I`/`-T`.
pub trait MatchContext {
    fn is_installed(&self, pkg: &Package) -> bool;
    fn has_duplicate_versions(&self, pkg: &Package) -> bool;
    fn is_redundant(&self, pkg: &Package) -> bool;
}

/// A context with every oracle answering `false`; useful for tests and
/// for queries that use none of `-I`/`-D`/`-T`.
pub struct NullContext;

impl MatchContext for NullContext {
    fn is_installed(&self, _pkg: &Package) -> bool {
        false
    }
    fn has_duplicate_versions(&self, _pkg: &Package) -> bool {
        false
    }
    fn is_redundant(&self, _pkg: &Package) -> bool {
        false
    }
}

/// One leaf predicate: a field selector, its matching algorithm, and
/// any modifiers.
#[derive(Debug, Clone)]
pub struct Leaf {
    pub selector: Selector,
    pub algorithm: Algorithm,
    pub modifiers: Modifiers,
    /// Records the fuzzy distance of the most recent match, read back
    /// by the query driver's post-sort. `Cell` because matching takes
    /// `&self`.
    last_distance: Cell<Option<usize>>,
}

impl Leaf {
    pub fn new(selector: Selector, algorithm: Algorithm, modifiers: Modifiers) -> Self {
        Leaf {
            selector,
            algorithm,
            modifiers,
            last_distance: Cell::new(None),
        }
    }

    pub fn last_distance(&self) -> Option<usize> {
        self.last_distance.get()
    }

    fn eval(&self, pkg: &Package, ctx: &dyn MatchContext) -> bool {
        if self.modifiers.installed_only && !ctx.is_installed(pkg) {
            return self.modifiers.invert;
        }
        if self.modifiers.duplicates_only && !ctx.has_duplicate_versions(pkg) {
            return self.modifiers.invert;
        }
        if self.modifiers.redundant_only && !ctx.is_redundant(pkg) {
            return self.modifiers.invert;
        }

        let haystack = self.selector.extract(pkg);
        let (hit, distance) = self.algorithm.eval(&haystack);
        self.last_distance.set(distance);
        hit ^ self.modifiers.invert
    }
}

/// The query expression tree.
#[derive(Debug, Clone)]
pub enum Matchatom {
    And(Box<Matchatom>, Box<Matchatom>),
    Or(Box<Matchatom>, Box<Matchatom>),
    Not(Box<Matchatom>),
    Leaf(Leaf),
}

impl Matchatom {
    /// Evaluate against one package, short-circuiting `And`/`Or` so a
    /// right-hand leaf with side effects (recording a fuzzy distance)
    /// is never touched once the outcome is already decided.
    pub fn matches(&self, pkg: &Package, ctx: &dyn MatchContext) -> bool {
        match self {
            Matchatom::And(l, r) => l.matches(pkg, ctx) && r.matches(pkg, ctx),
            Matchatom::Or(l, r) => l.matches(pkg, ctx) || r.matches(pkg, ctx),
            Matchatom::Not(inner) => !inner.matches(pkg, ctx),
            Matchatom::Leaf(leaf) => leaf.eval(pkg, ctx),
        }
    }

    /// Whether any leaf in the tree uses the fuzzy algorithm — the
    /// driver only sorts matches by distance when this is true.
    pub fn uses_fuzzy(&self) -> bool {
        match self {
            Matchatom::And(l, r) | Matchatom::Or(l, r) => l.uses_fuzzy() || r.uses_fuzzy(),
            Matchatom::Not(inner) => inner.uses_fuzzy(),
            Matchatom::Leaf(leaf) => matches!(leaf.algorithm, Algorithm::Fuzzy { .. }),
        }
    }

    /// The smallest fuzzy distance recorded by any leaf during the most
    /// recent `matches()` call, if the tree contains a fuzzy leaf.
    pub fn best_distance(&self) -> Option<usize> {
        match self {
            Matchatom::And(l, r) | Matchatom::Or(l, r) => {
                let a = l.best_distance();
                let b = r.best_distance();
                match (a, b) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (Some(a), None) => Some(a),
                    (None, b) => b,
                }
            }
            Matchatom::Not(inner) => inner.best_distance(),
            Matchatom::Leaf(leaf) => leaf.last_distance(),
        }
    }

    /// The deepest [`crate::reader::DecodeState`] any leaf in the tree
    /// needs before it can be evaluated correctly. The query driver
    /// decodes each package to exactly this level before calling
    /// `matches` — no further, no less.
    pub fn required_state(&self) -> crate::reader::DecodeState {
        use crate::reader::DecodeState;
        match self {
            Matchatom::And(l, r) | Matchatom::Or(l, r) => l.required_state().max(r.required_state()),
            Matchatom::Not(inner) => inner.required_state(),
            Matchatom::Leaf(leaf) => {
                if leaf.modifiers.installed_only || leaf.modifiers.duplicates_only || leaf.modifiers.redundant_only {
                    return DecodeState::Versions;
                }
                match leaf.selector {
                    Selector::Name | Selector::Category | Selector::CatName => DecodeState::Name,
                    Selector::Description | Selector::Homepage | Selector::License | Selector::Provide => {
                        DecodeState::Description
                    }
                }
            }
        }
    }
}

/// Tokens understood by [`parse_tokens`], already split on whitespace
/// by the caller (the CLI argv, post-`clap`).
#[derive(Debug, Clone)]
pub enum Token {
    Selector(Selector),
    Algo(AlgoToken),
    And,
    Or,
    Invert,
    Pattern(String),
}

#[derive(Debug, Clone, Copy)]
pub enum AlgoToken {
    Exact,
    Wildcard,
    Regex,
    Fuzzy(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    ExpectLeafOrOp,
    ExpectOperand,
}

/// Parse a flat token stream into a `Matchatom` tree, applying the
/// state machine from the expression-language section: `-o`/`-a` only
/// valid after a complete leaf, `-!` only valid before one, default
/// combinator between adjacent leaves is `And`, and `And` binds
/// tighter than `Or`.
pub fn parse_tokens(tokens: &[Token]) -> Result<Matchatom> {
    let mut or_terms: Vec<Matchatom> = Vec::new();
    let mut and_terms: Vec<Matchatom> = Vec::new();

    let mut selector = Selector::Name;
    let mut algo_token = AlgoToken::Exact;
    let mut invert_next = false;
    let mut state = ParseState::ExpectLeafOrOp;

    let mut i = 0usize;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Selector(s) => {
                if state != ParseState::ExpectLeafOrOp {
                    return Err(EixError::bad_expression(i, "selector flag must start a new leaf"));
                }
                selector = *s;
            }
            Token::Algo(a) => {
                if state != ParseState::ExpectLeafOrOp {
                    return Err(EixError::bad_expression(i, "algorithm flag must start a new leaf"));
                }
                algo_token = *a;
            }
            Token::Invert => {
                if state != ParseState::ExpectLeafOrOp {
                    return Err(EixError::bad_expression(i, "-! must precede a leaf"));
                }
                invert_next = true;
            }
            Token::Pattern(pattern) => {
                if state != ParseState::ExpectLeafOrOp {
                    return Err(EixError::bad_expression(i, "unexpected pattern; expected an operator"));
                }
                let algorithm = match algo_token {
                    AlgoToken::Exact => Algorithm::exact(pattern.clone()),
                    AlgoToken::Wildcard => Algorithm::wildcard(pattern.clone()),
                    AlgoToken::Regex => Algorithm::regex(pattern)?,
                    AlgoToken::Fuzzy(k) => Algorithm::fuzzy(pattern.clone(), k),
                };
                let leaf = Leaf::new(
                    selector,
                    algorithm,
                    Modifiers {
                        invert: invert_next,
                        ..Modifiers::default()
                    },
                );
                and_terms.push(Matchatom::Leaf(leaf));
                invert_next = false;
                state = ParseState::ExpectOperand;
            }
            Token::And => {
                if state != ParseState::ExpectOperand {
                    return Err(EixError::bad_expression(i, "-a must follow a complete leaf"));
                }
                state = ParseState::ExpectLeafOrOp;
            }
            Token::Or => {
                if state != ParseState::ExpectOperand {
                    return Err(EixError::bad_expression(i, "-o must follow a complete leaf"));
                }
                let anded = fold_and(&mut and_terms)
                    .ok_or_else(|| EixError::bad_expression(i, "-o with no preceding leaf"))?;
                or_terms.push(anded);
                state = ParseState::ExpectLeafOrOp;
            }
        }
        i += 1;
    }

    if state != ParseState::ExpectOperand {
        return Err(EixError::bad_expression(tokens.len(), "expression ends mid-leaf"));
    }

    let anded = fold_and(&mut and_terms).ok_or_else(|| EixError::bad_expression(tokens.len(), "empty expression"))?;
    or_terms.push(anded);

    let mut iter = or_terms.into_iter();
    let first = iter.next().expect("at least one term always pushed above");
    Ok(iter.fold(first, |acc, term| Matchatom::Or(Box::new(acc), Box::new(term))))
}

fn fold_and(terms: &mut Vec<Matchatom>) -> Option<Matchatom> {
    let mut iter = terms.drain(..);
    let first = iter.next()?;
    Some(iter.fold(first, |acc, term| Matchatom::And(Box::new(acc), Box::new(term))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str, desc: &str) -> Package {
        let mut p = Package::new("sys-apps".into(), name.into());
        p.desc = desc.into();
        p
    }

    #[test]
    fn exact_name_match() {
        let leaf = Matchatom::Leaf(Leaf::new(Selector::Name, Algorithm::exact("eix"), Modifiers::default()));
        assert!(leaf.matches(&pkg("eix", ""), &NullContext));
        assert!(!leaf.matches(&pkg("portage", ""), &NullContext));
    }

    #[test]
    fn not_not_is_identity() {
        let inner = Matchatom::Leaf(Leaf::new(Selector::Name, Algorithm::exact("eix"), Modifiers::default()));
        let double_not = Matchatom::Not(Box::new(Matchatom::Not(Box::new(inner.clone()))));
        let p = pkg("eix", "");
        assert_eq!(inner.matches(&p, &NullContext), double_not.matches(&p, &NullContext));
    }

    #[test]
    fn and_short_circuits_before_touching_right_leaf() {
        let left = Matchatom::Leaf(Leaf::new(Selector::Name, Algorithm::exact("nomatch"), Modifiers::default()));
        let right_leaf = Leaf::new(Selector::Description, Algorithm::fuzzy("xyz", 0), Modifiers::default());
        let right = Matchatom::Leaf(right_leaf.clone());
        let tree = Matchatom::And(Box::new(left), Box::new(right));
        assert!(!tree.matches(&pkg("eix", "xyz"), &NullContext));
        assert_eq!(right_leaf.last_distance(), None, "right side must not run");
    }

    #[test]
    fn wildcard_matches_shell_style_glob() {
        let leaf = Matchatom::Leaf(Leaf::new(Selector::Name, Algorithm::wildcard("ei?"), Modifiers::default()));
        assert!(leaf.matches(&pkg("eix", ""), &NullContext));
        assert!(!leaf.matches(&pkg("eixx", ""), &NullContext));
    }

    #[test]
    fn fuzzy_tracks_best_distance() {
        let leaf = Matchatom::Leaf(Leaf::new(Selector::Name, Algorithm::fuzzy("editor", 2), Modifiers::default()));
        assert!(leaf.matches(&pkg("edutor", ""), &NullContext));
        assert_eq!(leaf.best_distance(), Some(1));
    }

    #[test]
    fn precedence_and_binds_tighter_than_or() {
        // a -a b -o c  ==  Or(And(a,b), c)
        let tokens = vec![
            Token::Pattern("a".into()),
            Token::And,
            Token::Pattern("b".into()),
            Token::Or,
            Token::Pattern("c".into()),
        ];
        let tree = parse_tokens(&tokens).unwrap();
        match tree {
            Matchatom::Or(l, r) => {
                assert!(matches!(*l, Matchatom::And(_, _)));
                assert!(matches!(*r, Matchatom::Leaf(_)));
            }
            _ => panic!("expected Or(And(_,_), Leaf) at the top"),
        }
    }

    #[test]
    fn or_without_preceding_leaf_is_bad_expression() {
        let tokens = vec![Token::Or, Token::Pattern("a".into())];
        let err = parse_tokens(&tokens).unwrap_err();
        assert!(matches!(err, EixError::BadExpression { .. }));
    }

    #[test]
    fn invert_must_precede_a_leaf() {
        let tokens = vec![Token::Pattern("a".into()), Token::Invert];
        let err = parse_tokens(&tokens).unwrap_err();
        assert!(matches!(err, EixError::BadExpression { .. }));
    }

    #[test]
    fn levenshtein_matches_known_distances() {
        assert_eq!(levenshtein("editor", "editor"), 0);
        assert_eq!(levenshtein("editor", "edutor"), 1);
        assert_eq!(levenshtein("editor", "editoz"), 1);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }
}
