//! Build constraint expressions (`//go:build` and `// +build`).

/// A parsed build constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Tag(String),
    Not(Box<Constraint>),
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
}

impl Constraint {
    /// Evaluate with `tag_ok` deciding whether a single tag is satisfied.
    pub fn eval(&self, tag_ok: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Self::Tag(tag) => tag_ok(tag),
            Self::Not(inner) => !inner.eval(tag_ok),
            Self::And(a, b) => a.eval(tag_ok) && b.eval(tag_ok),
            Self::Or(a, b) => a.eval(tag_ok) || b.eval(tag_ok),
        }
    }

    fn and(a: Self, b: Self) -> Self {
        Self::And(Box::new(a), Box::new(b))
    }

    fn or(a: Self, b: Self) -> Self {
        Self::Or(Box::new(a), Box::new(b))
    }

    /// Parse a `//go:build` expression such as `linux && (amd64 || arm64)`.
    pub fn parse_expr(expr: &str) -> Result<Self, String> {
        let tokens = tokenize(expr)?;
        let mut parser = ExprParser { tokens, pos: 0 };
        let result = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(format!("unexpected token in build expression: {expr}"));
        }
        Ok(result)
    }

    /// Parse the bodies of `// +build` lines: space separated alternatives of
    /// comma separated terms, lines combined with AND.
    pub fn parse_plus_build<S: AsRef<str>>(lines: &[S]) -> Result<Option<Self>, String> {
        let mut all: Option<Self> = None;
        for line in lines {
            let mut any: Option<Self> = None;
            for option in line.as_ref().split_whitespace() {
                let mut term: Option<Self> = None;
                for atom in option.split(',') {
                    let lit = match atom.strip_prefix('!') {
                        Some(tag) => Self::Not(Box::new(Self::Tag(valid_tag(tag)?))),
                        None => Self::Tag(valid_tag(atom)?),
                    };
                    term = Some(match term {
                        Some(t) => Self::and(t, lit),
                        None => lit,
                    });
                }
                if let Some(term) = term {
                    any = Some(match any {
                        Some(a) => Self::or(a, term),
                        None => term,
                    });
                }
            }
            if let Some(any) = any {
                all = Some(match all {
                    Some(a) => Self::and(a, any),
                    None => any,
                });
            }
        }
        Ok(all)
    }
}

fn valid_tag(tag: &str) -> Result<String, String> {
    if !tag.is_empty() && tag.chars().all(is_tag_char) {
        Ok(tag.to_string())
    } else {
        Err(format!("invalid build tag: '{tag}'"))
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExprToken {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(expr: &str) -> Result<Vec<ExprToken>, String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '!' => {
                tokens.push(ExprToken::Not);
                i += 1;
            }
            '(' => {
                tokens.push(ExprToken::Open);
                i += 1;
            }
            ')' => {
                tokens.push(ExprToken::Close);
                i += 1;
            }
            '&' | '|' => {
                if chars.get(i + 1) != Some(&c) {
                    return Err(format!("invalid operator in build expression: {expr}"));
                }
                tokens.push(if c == '&' {
                    ExprToken::And
                } else {
                    ExprToken::Or
                });
                i += 2;
            }
            _ if is_tag_char(c) => {
                let start = i;
                while i < chars.len() && is_tag_char(chars[i]) {
                    i += 1;
                }
                tokens.push(ExprToken::Tag(chars[start..i].iter().collect()));
            }
            _ => return Err(format!("invalid character '{c}' in build expression: {expr}")),
        }
    }

    Ok(tokens)
}

struct ExprParser {
    tokens: Vec<ExprToken>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn or_expr(&mut self) -> Result<Constraint, String> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&ExprToken::Or) {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Constraint::or(left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Constraint, String> {
        let mut left = self.not_expr()?;
        while self.peek() == Some(&ExprToken::And) {
            self.pos += 1;
            let right = self.not_expr()?;
            left = Constraint::and(left, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Constraint, String> {
        if self.peek() == Some(&ExprToken::Not) {
            self.pos += 1;
            return Ok(Constraint::Not(Box::new(self.not_expr()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Constraint, String> {
        match self.tokens.get(self.pos).cloned() {
            Some(ExprToken::Open) => {
                self.pos += 1;
                let inner = self.or_expr()?;
                if self.peek() != Some(&ExprToken::Close) {
                    return Err("missing ')' in build expression".to_string());
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(ExprToken::Tag(tag)) => {
                self.pos += 1;
                Ok(Constraint::Tag(tag))
            }
            _ => Err("expected a build tag".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_tags(tags: &'static [&'static str]) -> impl Fn(&str) -> bool {
        move |t| tags.contains(&t)
    }

    #[test]
    fn test_expr_precedence() {
        let c = Constraint::parse_expr("linux && amd64 || windows").unwrap();
        assert!(c.eval(&with_tags(&["linux", "amd64"])));
        assert!(c.eval(&with_tags(&["windows", "386"])));
        assert!(!c.eval(&with_tags(&["linux", "arm64"])));
    }

    #[test]
    fn test_expr_parens_and_not() {
        let c = Constraint::parse_expr("!windows && (arm64 || go1.18)").unwrap();
        assert!(c.eval(&with_tags(&["linux", "arm64"])));
        assert!(c.eval(&with_tags(&["linux", "go1.18"])));
        assert!(!c.eval(&with_tags(&["windows", "arm64"])));
        assert!(!c.eval(&with_tags(&["linux", "amd64"])));
    }

    #[test]
    fn test_expr_rejects_garbage() {
        assert!(Constraint::parse_expr("linux &").is_err());
        assert!(Constraint::parse_expr("(linux").is_err());
        assert!(Constraint::parse_expr("linux amd64").is_err());
        assert!(Constraint::parse_expr("").is_err());
    }

    #[test]
    fn test_plus_build_lines() {
        let c = Constraint::parse_plus_build(&["linux,amd64 darwin", "!cgo"])
            .unwrap()
            .unwrap();
        assert!(c.eval(&with_tags(&["linux", "amd64"])));
        assert!(c.eval(&with_tags(&["darwin", "arm64"])));
        assert!(!c.eval(&with_tags(&["linux", "arm64"])));
        assert!(!c.eval(&with_tags(&["darwin", "cgo"])));
    }

    #[test]
    fn test_plus_build_empty_is_none() {
        let lines: [&str; 1] = [""];
        assert_eq!(Constraint::parse_plus_build(&lines).unwrap(), None);
    }

    #[test]
    fn test_plus_build_ignore() {
        let c = Constraint::parse_plus_build(&["ignore"]).unwrap().unwrap();
        assert!(!c.eval(&with_tags(&["linux", "amd64", "cgo"])));
    }
}
