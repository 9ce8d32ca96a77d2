use crate::lexer::*;

#[test]
fn test_tokenize_keywords() {
    let tokens = tokenize("let const function return typeof await").unwrap();
    assert!(matches!(tokens[0].token, Token::Let));
    assert!(matches!(tokens[1].token, Token::Const));
    assert!(matches!(tokens[2].token, Token::Function));
    assert!(matches!(tokens[3].token, Token::Return));
    assert!(matches!(tokens[4].token, Token::Typeof));
    assert!(matches!(tokens[5].token, Token::Await));
    assert!(matches!(tokens[6].token, Token::Eof));
}

#[test]
fn test_tokenize_identifiers() {
    let tokens = tokenize("foo $bar _baz letter").unwrap();
    assert!(matches!(&tokens[0].token, Token::Identifier(s) if s == "foo"));
    assert!(matches!(&tokens[1].token, Token::Identifier(s) if s == "$bar"));
    assert!(matches!(&tokens[2].token, Token::Identifier(s) if s == "_baz"));
    assert!(matches!(&tokens[3].token, Token::Identifier(s) if s == "letter"));
}

#[test]
fn test_tokenize_numbers() {
    let tokens = tokenize("0 42 3.5 1e3 0xff").unwrap();
    assert!(matches!(tokens[0].token, Token::Number(n) if n == 0.0));
    assert!(matches!(tokens[1].token, Token::Number(n) if n == 42.0));
    assert!(matches!(tokens[2].token, Token::Number(n) if n == 3.5));
    assert!(matches!(tokens[3].token, Token::Number(n) if n == 1000.0));
    assert!(matches!(tokens[4].token, Token::Number(n) if n == 255.0));
}

#[test]
fn test_tokenize_bigint() {
    let tokens = tokenize("9007199254740993n").unwrap();
    assert!(matches!(tokens[0].token, Token::BigInt(9007199254740993)));
}

#[test]
fn test_tokenize_strings() {
    let tokens = tokenize(r#""double" 'single' "esc\"aped""#).unwrap();
    assert!(matches!(&tokens[0].token, Token::StringLiteral(s) if s == "double"));
    assert!(matches!(&tokens[1].token, Token::StringLiteral(s) if s == "single"));
    assert!(matches!(&tokens[2].token, Token::StringLiteral(s) if s == "esc\"aped"));
}

#[test]
fn test_tokenize_template() {
    let tokens = tokenize("`a ${b} c`").unwrap();
    assert!(matches!(&tokens[0].token, Token::TemplateLiteral(s) if s == "a ${b} c"));
}

#[test]
fn test_tokenize_operators() {
    let tokens = tokenize("=== !== ** ?? ?. => ... += ++").unwrap();
    assert!(matches!(tokens[0].token, Token::EqEqEq));
    assert!(matches!(tokens[1].token, Token::NotEqEq));
    assert!(matches!(tokens[2].token, Token::StarStar));
    assert!(matches!(tokens[3].token, Token::QuestionQuestion));
    assert!(matches!(tokens[4].token, Token::QuestionDot));
    assert!(matches!(tokens[5].token, Token::Arrow));
    assert!(matches!(tokens[6].token, Token::Ellipsis));
    assert!(matches!(tokens[7].token, Token::PlusAssign));
    assert!(matches!(tokens[8].token, Token::PlusPlus));
}

#[test]
fn test_comments_are_skipped() {
    let tokens = tokenize("a // line\n/* block\n comment */ b").unwrap();
    assert_eq!(tokens.len(), 3);
    assert!(matches!(&tokens[1].token, Token::Identifier(s) if s == "b"));
}

#[test]
fn test_line_breaks_are_recorded() {
    let tokens = tokenize("a\nb c").unwrap();
    assert!(!tokens[0].line_break_before);
    assert!(tokens[1].line_break_before);
    assert!(!tokens[2].line_break_before);
}

#[test]
fn test_spans() {
    let tokens = tokenize("let x").unwrap();
    assert_eq!(tokens[0].span.start, 0);
    assert_eq!(tokens[0].span.end, 3);
    assert_eq!(tokens[1].span.start, 4);
}

#[test]
fn test_unterminated_string() {
    let err = tokenize("'open").unwrap_err();
    assert!(matches!(err, crate::ScriptError::LexerError { .. }));
}
