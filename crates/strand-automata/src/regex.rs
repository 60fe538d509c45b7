//! Compiler for the regex literals the parser hands down.
//!
//! Supports the fragment the front end normalizes to: literals, escapes,
//! `.`, alternation, grouping, `*`/`+`/`?`, and character classes with
//! ranges and negation. Anchors and bounded repetition do not reach the
//! solver.

use crate::nfa::Nfa;
use crate::{AutomatonError, Result};

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    nfa: Nfa,
}

/// Compile a pattern into an NFA accepting its language.
pub(crate) fn compile(pattern: &str) -> Result<Nfa> {
    let mut parser = Parser {
        bytes: pattern.as_bytes(),
        pos: 0,
        nfa: Nfa::new(),
    };
    let (start, accept) = parser.alternation()?;
    if parser.pos != parser.bytes.len() {
        return Err(AutomatonError::Regex(format!(
            "unexpected {:?} at offset {}",
            parser.bytes[parser.pos] as char, parser.pos
        )));
    }
    parser.nfa.add_start(start);
    parser.nfa.set_accepting(accept);
    Ok(parser.nfa)
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn fragment(&mut self) -> (usize, usize) {
        let start = self.nfa.add_state();
        let accept = self.nfa.add_state();
        (start, accept)
    }

    fn alternation(&mut self) -> Result<(usize, usize)> {
        let mut branches = vec![self.sequence()?];
        while self.peek() == Some(b'|') {
            self.bump();
            branches.push(self.sequence()?);
        }
        if branches.len() == 1 {
            return Ok(branches[0]);
        }
        let (start, accept) = self.fragment();
        for (s, a) in branches {
            self.nfa.add_edge(start, None, s);
            self.nfa.add_edge(a, None, accept);
        }
        Ok((start, accept))
    }

    fn sequence(&mut self) -> Result<(usize, usize)> {
        let mut current: Option<(usize, usize)> = None;
        while let Some(b) = self.peek() {
            if matches!(b, b'|' | b')') {
                break;
            }
            let piece = self.repetition()?;
            current = Some(match current {
                None => piece,
                Some((s, a)) => {
                    self.nfa.add_edge(a, None, piece.0);
                    (s, piece.1)
                }
            });
        }
        Ok(current.unwrap_or_else(|| {
            let (start, accept) = self.fragment();
            self.nfa.add_edge(start, None, accept);
            (start, accept)
        }))
    }

    fn repetition(&mut self) -> Result<(usize, usize)> {
        let mut frag = self.atom()?;
        while let Some(op) = self.peek() {
            match op {
                b'*' => {
                    self.bump();
                    let (start, accept) = self.fragment();
                    self.nfa.add_edge(start, None, frag.0);
                    self.nfa.add_edge(start, None, accept);
                    self.nfa.add_edge(frag.1, None, frag.0);
                    self.nfa.add_edge(frag.1, None, accept);
                    frag = (start, accept);
                }
                b'+' => {
                    self.bump();
                    let (start, accept) = self.fragment();
                    self.nfa.add_edge(start, None, frag.0);
                    self.nfa.add_edge(frag.1, None, frag.0);
                    self.nfa.add_edge(frag.1, None, accept);
                    frag = (start, accept);
                }
                b'?' => {
                    self.bump();
                    let (start, accept) = self.fragment();
                    self.nfa.add_edge(start, None, frag.0);
                    self.nfa.add_edge(start, None, accept);
                    self.nfa.add_edge(frag.1, None, accept);
                    frag = (start, accept);
                }
                _ => break,
            }
        }
        Ok(frag)
    }

    fn atom(&mut self) -> Result<(usize, usize)> {
        match self.bump() {
            None => Err(AutomatonError::Regex("unexpected end of pattern".into())),
            Some(b'(') => {
                let frag = self.alternation()?;
                if self.bump() != Some(b')') {
                    return Err(AutomatonError::Regex("unbalanced parenthesis".into()));
                }
                Ok(frag)
            }
            Some(b'[') => {
                let symbols = self.char_class()?;
                Ok(self.symbol_set(&symbols))
            }
            Some(b'.') => {
                let all: Vec<u8> = (0..=255).collect();
                Ok(self.symbol_set(&all))
            }
            Some(b'\\') => {
                let symbols = self.escape()?;
                Ok(self.symbol_set(&symbols))
            }
            Some(op @ (b'*' | b'+' | b'?' | b')' | b']')) => Err(AutomatonError::Regex(format!(
                "dangling {:?}",
                op as char
            ))),
            Some(literal) => Ok(self.symbol_set(&[literal])),
        }
    }

    fn symbol_set(&mut self, symbols: &[u8]) -> (usize, usize) {
        let (start, accept) = self.fragment();
        for &b in symbols {
            self.nfa.add_edge(start, Some(b), accept);
        }
        (start, accept)
    }

    fn escape(&mut self) -> Result<Vec<u8>> {
        match self.bump() {
            None => Err(AutomatonError::Regex("trailing backslash".into())),
            Some(b'd') => Ok((b'0'..=b'9').collect()),
            Some(b'w') => {
                let mut set: Vec<u8> = (b'a'..=b'z').collect();
                set.extend(b'A'..=b'Z');
                set.extend(b'0'..=b'9');
                set.push(b'_');
                Ok(set)
            }
            Some(b's') => Ok(vec![b' ', b'\t', b'\n', b'\r']),
            Some(b'n') => Ok(vec![b'\n']),
            Some(b't') => Ok(vec![b'\t']),
            Some(literal) => Ok(vec![literal]),
        }
    }

    fn char_class(&mut self) -> Result<Vec<u8>> {
        let negated = if self.peek() == Some(b'^') {
            self.bump();
            true
        } else {
            false
        };
        let mut members = vec![false; 256];
        let mut prev: Option<u8> = None;
        loop {
            match self.bump() {
                None => return Err(AutomatonError::Regex("unterminated character class".into())),
                Some(b']') => break,
                Some(b'-') if prev.is_some() && self.peek() != Some(b']') => {
                    let low = prev.take().expect("range start");
                    let high = match self.bump() {
                        Some(b'\\') => {
                            let set = self.escape()?;
                            if set.len() != 1 {
                                return Err(AutomatonError::Regex(
                                    "class shorthand cannot bound a range".into(),
                                ));
                            }
                            set[0]
                        }
                        Some(b) => b,
                        None => {
                            return Err(AutomatonError::Regex(
                                "unterminated character class".into(),
                            ))
                        }
                    };
                    if low > high {
                        return Err(AutomatonError::Regex(format!(
                            "empty range {:?}-{:?}",
                            low as char, high as char
                        )));
                    }
                    for b in low..=high {
                        members[b as usize] = true;
                    }
                }
                Some(b'\\') => {
                    for b in self.escape()? {
                        members[b as usize] = true;
                    }
                    prev = None;
                }
                Some(b) => {
                    if let Some(p) = prev {
                        members[p as usize] = true;
                    }
                    prev = Some(b);
                }
            }
        }
        if let Some(p) = prev {
            members[p as usize] = true;
        }
        let symbols: Vec<u8> = (0..=255u8)
            .filter(|&b| members[b as usize] != negated)
            .collect();
        if symbols.is_empty() {
            return Err(AutomatonError::Regex("empty character class".into()));
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use crate::StringAutomaton;

    #[test]
    fn literals_and_alternation() {
        let auto = StringAutomaton::make_regex("cat|dog").unwrap();
        assert!(auto.accepts("cat"));
        assert!(auto.accepts("dog"));
        assert!(!auto.accepts("cow"));
    }

    #[test]
    fn repetition_operators() {
        let star = StringAutomaton::make_regex("a*b").unwrap();
        assert!(star.accepts("b"));
        assert!(star.accepts("aaab"));
        assert!(!star.accepts("a"));

        let plus = StringAutomaton::make_regex("a+").unwrap();
        assert!(!plus.accepts(""));
        assert!(plus.accepts("aaa"));

        let opt = StringAutomaton::make_regex("ab?c").unwrap();
        assert!(opt.accepts("ac"));
        assert!(opt.accepts("abc"));
        assert!(!opt.accepts("abbc"));
    }

    #[test]
    fn grouping_and_classes() {
        let auto = StringAutomaton::make_regex("(ab)+").unwrap();
        assert!(auto.accepts("abab"));
        assert!(!auto.accepts("aba"));

        let class = StringAutomaton::make_regex("[a-c]x").unwrap();
        assert!(class.accepts("bx"));
        assert!(!class.accepts("dx"));

        let negated = StringAutomaton::make_regex("[^0-9]").unwrap();
        assert!(negated.accepts("q"));
        assert!(!negated.accepts("7"));

        let digits = StringAutomaton::make_regex("\\d+").unwrap();
        assert!(digits.accepts("2026"));
        assert!(!digits.accepts("20a6"));
    }

    #[test]
    fn dot_matches_any_byte() {
        let auto = StringAutomaton::make_regex("a.c").unwrap();
        assert!(auto.accepts("abc"));
        assert!(auto.accepts("a c"));
        assert!(!auto.accepts("ac"));
    }

    #[test]
    fn malformed_patterns_error() {
        assert!(StringAutomaton::make_regex("(ab").is_err());
        assert!(StringAutomaton::make_regex("*a").is_err());
        assert!(StringAutomaton::make_regex("[z-a]").is_err());
        assert!(StringAutomaton::make_regex("a\\").is_err());
    }
}
