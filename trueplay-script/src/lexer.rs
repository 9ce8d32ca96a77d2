use crate::error::{Result, ScriptError, Span};
use logos::Logos;

/// Tokens of the playground script language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // Keywords
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("var")]
    Var,
    #[token("function")]
    Function,
    #[token("async")]
    Async,
    #[token("await")]
    Await,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("of")]
    Of,
    #[token("in")]
    In,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("throw")]
    Throw,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("new")]
    New,
    #[token("typeof")]
    Typeof,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("undefined")]
    Undefined,

    // Identifiers and literals
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"0[xX][0-9a-fA-F]+", |lex| i64::from_str_radix(&lex.slice()[2..], 16).ok().map(|v| v as f64))]
    Number(f64),

    #[regex(r"[0-9]+n", |lex| {
        let s = lex.slice();
        s[..s.len() - 1].parse::<i128>().ok()
    })]
    BigInt(i128),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| unescape(lex.slice()))]
    StringLiteral(String),

    /// Raw body of a backtick template; interpolations are split by the parser
    #[regex(r"`([^`\\]|\\.)*`", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    TemplateLiteral(String),

    #[regex(r"//[^\n]*", logos::skip)]
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", logos::skip)]
    Comment,

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    StarStar,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("%=")]
    PercentAssign,
    #[token("==")]
    EqEq,
    #[token("===")]
    EqEqEq,
    #[token("!=")]
    NotEq,
    #[token("!==")]
    NotEqEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("??")]
    QuestionQuestion,
    #[token("!")]
    Bang,
    #[token("?")]
    Question,
    #[token("?.")]
    QuestionDot,
    #[token("=>")]
    Arrow,
    #[token("...")]
    Ellipsis,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // Punctuation
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    // End of file
    Eof,
}

impl Token {
    /// Keyword spelling, used where keywords are valid property names
    pub fn keyword_name(&self) -> Option<&'static str> {
        let name = match self {
            Token::Let => "let",
            Token::Const => "const",
            Token::Var => "var",
            Token::Function => "function",
            Token::Async => "async",
            Token::Await => "await",
            Token::Return => "return",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::For => "for",
            Token::Of => "of",
            Token::In => "in",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Throw => "throw",
            Token::Try => "try",
            Token::Catch => "catch",
            Token::Finally => "finally",
            Token::New => "new",
            Token::Typeof => "typeof",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::Undefined => "undefined",
            _ => return None,
        };
        Some(name)
    }

    pub fn is_keyword(&self) -> bool {
        self.keyword_name().is_some()
    }
}

/// Resolve escape sequences of a quoted string literal (quotes included)
fn unescape(quoted: &str) -> Option<String> {
    unescape_body(&quoted[1..quoted.len() - 1])
}

/// Resolve escape sequences in a literal body
pub(crate) fn unescape_body(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            'u' => {
                let rest = chars.as_str();
                let (hex, consumed) = if let Some(braced) = rest.strip_prefix('{') {
                    let end = braced.find('}')?;
                    (&braced[..end], end + 2)
                } else {
                    (rest.get(..4)?, 4)
                };
                let code = u32::from_str_radix(hex, 16).ok()?;
                out.push(char::from_u32(code)?);
                chars = rest[consumed..].chars();
            }
            'x' => {
                let rest = chars.as_str();
                let code = u32::from_str_radix(rest.get(..2)?, 16).ok()?;
                out.push(char::from_u32(code)?);
                chars = rest[2..].chars();
            }
            '\n' => {}
            other => out.push(other),
        }
    }

    Some(out)
}

/// A token with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
    /// A newline separates this token from the previous one
    pub line_break_before: bool,
}

impl SpannedToken {
    pub fn new(token: Token, span: Span) -> Self {
        Self {
            token,
            span,
            line_break_before: false,
        }
    }

    pub fn after_line_break(mut self, line_break: bool) -> Self {
        self.line_break_before = line_break;
        self
    }
}

/// Lexer for script source code
pub struct Lexer<'a> {
    source: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, offset: 0 }
    }

    /// Lexer whose spans are shifted by `offset`, for sources embedded in a
    /// larger text (template literal interpolations)
    pub fn with_offset(source: &'a str, offset: usize) -> Self {
        Self { source, offset }
    }

    /// Tokenize the entire source
    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>> {
        let mut lex = Token::lexer(self.source);
        let mut tokens = Vec::new();
        let mut prev_end = 0;

        while let Some(token_result) = lex.next() {
            let range = lex.span();
            let span = Span::new(range.start + self.offset, range.end + self.offset);
            let line_break = self.source[prev_end..range.start].contains('\n');
            prev_end = range.end;

            match token_result {
                Ok(token) => tokens.push(SpannedToken::new(token, span).after_line_break(line_break)),
                Err(_) => {
                    let text = lex.slice();
                    let message = if text.starts_with('"') || text.starts_with('\'') || text.starts_with('`') {
                        "Invalid or unexpected token: unterminated string".to_string()
                    } else {
                        format!("Invalid or unexpected token: {}", text)
                    };
                    return Err(ScriptError::LexerError { span, message });
                }
            }
        }

        let end = self.source.len() + self.offset;
        let line_break = self.source[prev_end..].contains('\n');
        tokens.push(SpannedToken::new(Token::Eof, Span::new(end, end)).after_line_break(line_break));
        Ok(tokens)
    }
}

/// Helper to tokenize a string slice
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_body(r"a\nb").as_deref(), Some("a\nb"));
        assert_eq!(unescape_body(r"A\u{1F600}").as_deref(), Some("A\u{1F600}"));
        assert_eq!(unescape_body(r"it\'s").as_deref(), Some("it's"));
        assert_eq!(unescape_body(r"\x41").as_deref(), Some("A"));
        assert_eq!(unescape_body(r"\u00"), None);
    }

    #[test]
    fn test_offset_spans() {
        let tokens = Lexer::with_offset("a + b", 10).tokenize().unwrap();
        assert_eq!(tokens[0].span, Span::new(10, 11));
        assert_eq!(tokens[2].span, Span::new(14, 15));
    }
}
