//! Go source header parsing.
//!
//! Only the part of a file up to the last import declaration is read: the
//! build constraints above the package clause, the package name, the import
//! paths and the doc comments attached to `import "C"`.

use super::constraint::Constraint;

/// What the header of one Go file declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFile {
    pub package: String,
    pub constraint: Option<Constraint>,
    pub imports: Vec<String>,
    /// Doc comment text of each `import "C"` spec.
    pub cgo_preambles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Comment {
    text: String,
    start_line: u32,
    end_line: u32,
    line_comment: bool,
}

enum Item {
    Token(Token, u32),
    Comment(Comment),
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn next_item(&mut self) -> Result<Option<Item>, String> {
        while let Some(c) = self.peek_at(0) {
            if c.is_whitespace() || c == '\u{feff}' {
                self.bump();
            } else {
                break;
            }
        }

        let Some(c) = self.peek_at(0) else {
            return Ok(None);
        };
        let line = self.line;

        if c == '/' && self.peek_at(1) == Some('/') {
            self.pos += 2;
            let start = self.pos;
            while self.peek_at(0).is_some_and(|c| c != '\n') {
                self.pos += 1;
            }
            let text: String = self.chars[start..self.pos].iter().collect();
            return Ok(Some(Item::Comment(Comment {
                text: text.trim_end_matches('\r').to_string(),
                start_line: line,
                end_line: line,
                line_comment: true,
            })));
        }

        if c == '/' && self.peek_at(1) == Some('*') {
            self.pos += 2;
            let mut text = String::new();
            loop {
                match self.peek_at(0) {
                    None => return Err(format!("comment starting on line {line} not terminated")),
                    Some('*') if self.peek_at(1) == Some('/') => {
                        self.pos += 2;
                        break;
                    }
                    Some(_) => {
                        if let Some(c) = self.bump() {
                            text.push(c);
                        }
                    }
                }
            }
            return Ok(Some(Item::Comment(Comment {
                text,
                start_line: line,
                end_line: self.line,
                line_comment: false,
            })));
        }

        if c == '"' {
            self.pos += 1;
            let mut value = String::new();
            loop {
                match self.bump() {
                    None | Some('\n') => {
                        return Err(format!("string literal on line {line} not terminated"));
                    }
                    Some('"') => break,
                    Some('\\') => match self.bump() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some(esc) => value.push(esc),
                        None => {
                            return Err(format!("string literal on line {line} not terminated"));
                        }
                    },
                    Some(other) => value.push(other),
                }
            }
            return Ok(Some(Item::Token(Token::Str(value), line)));
        }

        if c == '`' {
            self.pos += 1;
            let mut value = String::new();
            loop {
                match self.bump() {
                    None => {
                        return Err(format!("raw string on line {line} not terminated"));
                    }
                    Some('`') => break,
                    Some('\r') => {}
                    Some(other) => value.push(other),
                }
            }
            return Ok(Some(Item::Token(Token::Str(value), line)));
        }

        if c.is_alphabetic() || c == '_' {
            let start = self.pos;
            while self
                .peek_at(0)
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
            {
                self.pos += 1;
            }
            let ident: String = self.chars[start..self.pos].iter().collect();
            return Ok(Some(Item::Token(Token::Ident(ident), line)));
        }

        self.pos += 1;
        Ok(Some(Item::Token(Token::Punct(c), line)))
    }
}

/// Consecutive comments with no blank line between them.
#[derive(Debug, Default)]
struct CommentGroup {
    comments: Vec<Comment>,
}

impl CommentGroup {
    fn end_line(&self) -> u32 {
        self.comments.last().map_or(0, |c| c.end_line)
    }

    fn text(&self) -> String {
        self.comments
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

struct Parser {
    lexer: Lexer,
    /// Closed comment groups seen before the package clause.
    header: Vec<CommentGroup>,
    pending: Option<CommentGroup>,
    in_header: bool,
}

impl Parser {
    /// Next token, with the comment group directly above it (if any).
    fn next_token(&mut self) -> Result<Option<(Token, u32, Option<String>)>, String> {
        loop {
            match self.lexer.next_item()? {
                None => return Ok(None),
                Some(Item::Comment(comment)) => {
                    let adjacent = self
                        .pending
                        .as_ref()
                        .is_some_and(|g| g.end_line() + 1 >= comment.start_line);
                    if !adjacent {
                        self.close_group();
                    }
                    self.pending
                        .get_or_insert_with(CommentGroup::default)
                        .comments
                        .push(comment);
                }
                Some(Item::Token(token, line)) => {
                    // A group ending right above a token is its doc comment, and the
                    // package doc comment never holds constraints.
                    let doc = match self.pending.take() {
                        Some(group) if group.end_line() + 1 == line => Some(group.text()),
                        Some(group) => {
                            if self.in_header {
                                self.header.push(group);
                            }
                            None
                        }
                        None => None,
                    };
                    return Ok(Some((token, line, doc)));
                }
            }
        }
    }

    fn close_group(&mut self) {
        if let Some(group) = self.pending.take() {
            if self.in_header {
                self.header.push(group);
            }
        }
    }

    fn require_token(&mut self, context: &str) -> Result<(Token, Option<String>), String> {
        match self.next_token()? {
            Some((token, _, doc)) => Ok((token, doc)),
            None => Err(format!("unexpected end of file {context}")),
        }
    }

    fn constraint(&self) -> Result<Option<Constraint>, String> {
        let mut go_build: Option<Constraint> = None;
        let mut plus_build: Vec<String> = Vec::new();

        for comment in self.header.iter().flat_map(|g| &g.comments) {
            if !comment.line_comment {
                continue;
            }
            if let Some(expr) = comment.text.strip_prefix("go:build") {
                if go_build.is_some() {
                    return Err("multiple //go:build lines".to_string());
                }
                go_build = Some(Constraint::parse_expr(expr.trim())?);
            } else if let Some(body) = comment.text.trim_start().strip_prefix("+build") {
                if body.is_empty() || body.starts_with(char::is_whitespace) {
                    plus_build.push(body.trim().to_string());
                }
            }
        }

        if go_build.is_some() {
            return Ok(go_build);
        }
        Constraint::parse_plus_build(&plus_build)
    }
}

/// Parse the header of a Go source file.
pub fn parse(source: &str) -> Result<SourceFile, String> {
    let mut parser = Parser {
        lexer: Lexer::new(source),
        header: Vec::new(),
        pending: None,
        in_header: true,
    };

    match parser.next_token()? {
        Some((Token::Ident(kw), _, _)) if kw == "package" => {}
        Some(_) => return Err("expected 'package' clause".to_string()),
        None => return Err("expected 'package' clause, found end of file".to_string()),
    }
    parser.in_header = false;

    let mut file = SourceFile {
        constraint: parser.constraint()?,
        ..SourceFile::default()
    };

    match parser.require_token("after 'package'")? {
        (Token::Ident(name), _) => file.package = name,
        _ => return Err("expected package name".to_string()),
    }

    loop {
        match parser.next_token()? {
            None => break,
            Some((Token::Punct(';'), _, _)) => {}
            Some((Token::Ident(kw), _, doc)) if kw == "import" => {
                parse_import_decl(&mut parser, doc, &mut file)?;
            }
            Some(_) => break,
        }
    }

    Ok(file)
}

fn parse_import_decl(
    parser: &mut Parser,
    decl_doc: Option<String>,
    file: &mut SourceFile,
) -> Result<(), String> {
    let (first, first_doc) = parser.require_token("in import declaration")?;

    let mut specs: Vec<(String, Option<String>)> = Vec::new();
    let grouped = first == Token::Punct('(');
    if grouped {
        loop {
            let (token, doc) = parser.require_token("in import declaration")?;
            match token {
                Token::Punct(')') => break,
                Token::Punct(';') => {}
                token => specs.push((import_spec(parser, token)?, doc)),
            }
        }
    } else {
        specs.push((import_spec(parser, first)?, first_doc));
    }

    let single_spec = !grouped || specs.len() == 1;
    for (path, doc) in specs {
        if path == "C" {
            let doc = if single_spec { doc.or(decl_doc.clone()) } else { doc };
            if let Some(doc) = doc {
                file.cgo_preambles.push(doc);
            }
        }
        file.imports.push(path);
    }
    Ok(())
}

/// Read one import spec: an optional name (`_`, `.` or an identifier)
/// followed by the path literal.
fn import_spec(parser: &mut Parser, token: Token) -> Result<String, String> {
    match token {
        Token::Str(path) => Ok(path),
        Token::Ident(_) | Token::Punct('.') => match parser.require_token("in import spec")? {
            (Token::Str(path), _) => Ok(path),
            _ => Err("expected import path".to_string()),
        },
        other => Err(format!("unexpected {other:?} in import declaration")),
    }
}
