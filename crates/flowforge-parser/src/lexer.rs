//! Lexical analyzer for flowchart source text.
//!
//! The lexer converts source text into a stream of [`Token`]s for the
//! [`parser`](super::parser). Spaces, tabs, carriage returns and comments are
//! dropped; newlines are kept because they separate statements.
//!
//! The public entry point is [`tokenize`], which recovers from every error and
//! always lexes to the end of the input, appending a final
//! [`TokenKind::Eof`] token.

use log::debug;
use winnow::{
    Parser as _,
    combinator::{alt, cut_err, not, peek, preceded, repeat, terminated},
    error::{ContextError, ErrMode, ModalResult},
    stream::{LocatingSlice, Location as _, Stream},
    token::{none_of, one_of, take_till, take_until, take_while},
};

use flowforge_core::{
    error::{Diagnostic, DiagnosticCode, DiagnosticCollector},
    model::ArrowKind,
    span::{LineIndex, Span},
};

use crate::tokens::{Keyword, Token, TokenKind};

/// Rich diagnostic information for lexer errors.
///
/// Attached to winnow errors via `.context()`; `start` is the offset where the
/// failing construct began.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LexerDiagnostic {
    code: DiagnosticCode,
    message: &'static str,
    help: Option<&'static str>,
    start: usize,
}

/// What a single lexer step produced.
#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    /// Whitespace or a comment.
    Trivia,
    Token(TokenKind, String),
}

type Input<'a> = LocatingSlice<&'a str>;
type IResult<O> = ModalResult<O, ContextError<LexerDiagnostic>>;

/// Spaces, tabs and carriage returns
fn whitespace(input: &mut Input<'_>) -> IResult<Lexeme> {
    take_while(1.., [' ', '\t', '\r'])
        .value(Lexeme::Trivia)
        .parse_next(input)
}

fn newline(input: &mut Input<'_>) -> IResult<Lexeme> {
    '\n'.value(Lexeme::Token(TokenKind::Newline, "\n".to_string()))
        .parse_next(input)
}

fn line_comment(input: &mut Input<'_>) -> IResult<Lexeme> {
    preceded("//", take_while(0.., |c: char| c != '\n'))
        .value(Lexeme::Trivia)
        .parse_next(input)
}

fn block_comment(input: &mut Input<'_>) -> IResult<Lexeme> {
    let start = input.current_token_start();

    preceded(
        "/*",
        cut_err(terminated(take_until(0.., "*/"), "*/")).context(LexerDiagnostic {
            code: DiagnosticCode::FC123,
            message: "unterminated block comment",
            help: Some("close the comment with `*/`"),
            start,
        }),
    )
    .value(Lexeme::Trivia)
    .parse_next(input)
}

/// An escape sequence inside a string, after the backslash.
///
/// `\n` and `\t` are translated; any other escaped character stands for
/// itself, which covers `\"` and `\\`.
fn string_escape(input: &mut Input<'_>) -> IResult<char> {
    preceded('\\', none_of(['\n']))
        .map(|c| match c {
            'n' => '\n',
            't' => '\t',
            other => other,
        })
        .parse_next(input)
}

/// A double-quoted string literal on a single line.
fn string_literal(input: &mut Input<'_>) -> IResult<Lexeme> {
    let start = input.current_token_start();

    let content = repeat(0.., alt((string_escape, none_of(['"', '\\', '\n'])))).fold(
        String::new,
        |mut acc, ch| {
            acc.push(ch);
            acc
        },
    );

    preceded(
        '"',
        cut_err(terminated(content, '"')).context(LexerDiagnostic {
            code: DiagnosticCode::FC121,
            message: "unterminated string literal",
            help: Some("add closing `\"`"),
            start,
        }),
    )
    .map(|value| Lexeme::Token(TokenKind::String, value))
    .parse_next(input)
}

fn arrow(input: &mut Input<'_>) -> IResult<Lexeme> {
    alt((
        "->".value(ArrowKind::Solid),
        "=>".value(ArrowKind::Thick),
        "~>".value(ArrowKind::Dotted),
    ))
    .map(|arrow| Lexeme::Token(TokenKind::Arrow(arrow), arrow.to_string()))
    .parse_next(input)
}

/// `#` followed by 3 to 8 hex digits
fn color_literal(input: &mut Input<'_>) -> IResult<Lexeme> {
    preceded('#', take_while(1.., |c: char| c.is_alphanumeric()))
        .verify(|hex: &str| {
            (3..=8).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit())
        })
        .take()
        .map(|text: &str| Lexeme::Token(TokenKind::Color, text.to_string()))
        .parse_next(input)
}

fn punctuation(input: &mut Input<'_>) -> IResult<Lexeme> {
    alt((
        '{'.value(TokenKind::LeftBrace),
        '}'.value(TokenKind::RightBrace),
        '('.value(TokenKind::LeftParen),
        ')'.value(TokenKind::RightParen),
        '['.value(TokenKind::LeftBracket),
        ']'.value(TokenKind::RightBracket),
        ','.value(TokenKind::Comma),
        ':'.value(TokenKind::Colon),
        ';'.value(TokenKind::Semicolon),
    ))
    .with_taken()
    .map(|(kind, text): (TokenKind, &str)| Lexeme::Token(kind, text.to_string()))
    .parse_next(input)
}

/// A `${...}` splice inside a word, kept verbatim for interpolation.
fn template_segment(input: &mut Input<'_>) -> IResult<()> {
    let start = input.current_token_start();

    preceded(
        "${",
        cut_err(terminated(take_till(0.., ['}', '\n']), '}')).context(LexerDiagnostic {
            code: DiagnosticCode::FC122,
            message: "unterminated template expression",
            help: Some("close the expression with `}`"),
            start,
        }),
    )
    .void()
    .parse_next(input)
}

fn word_head(input: &mut Input<'_>) -> IResult<()> {
    alt((
        one_of(|c: char| c.is_alphanumeric() || c == '_').void(),
        template_segment,
        // Negative numbers in data blocks
        ('-', peek(one_of(|c: char| c.is_ascii_digit()))).void(),
    ))
    .parse_next(input)
}

fn word_tail(input: &mut Input<'_>) -> IResult<()> {
    alt((
        take_while(1.., |c: char| c.is_alphanumeric() || matches!(c, '_' | '.')).void(),
        template_segment,
        // A dash continues the word unless it starts an arrow
        ('-', not('>')).void(),
    ))
    .parse_next(input)
}

/// Identifiers, keywords and numbers.
fn word(input: &mut Input<'_>) -> IResult<Lexeme> {
    (word_head, repeat(0.., word_tail).map(|()| ()))
        .take()
        .map(classify_word)
        .parse_next(input)
}

fn classify_word(text: &str) -> Lexeme {
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return Lexeme::Token(TokenKind::Number, text.to_string());
    }

    let lowered = text.to_lowercase();
    match Keyword::from_lowercase(&lowered) {
        Some(keyword) => Lexeme::Token(TokenKind::Keyword(keyword), lowered),
        None => Lexeme::Token(TokenKind::Identifier, text.to_string()),
    }
}

fn lexeme(input: &mut Input<'_>) -> IResult<Lexeme> {
    alt((
        whitespace,
        newline,
        line_comment,
        block_comment,
        string_literal,
        arrow,
        color_literal,
        punctuation,
        word,
    ))
    .parse_next(input)
}

/// Lexer that accumulates tokens and diagnostics during tokenization.
struct Lexer<'a> {
    source: &'a str,
    lines: LineIndex<'a>,
    tokens: Vec<Token>,
    diagnostics: DiagnosticCollector,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            lines: LineIndex::new(source),
            tokens: Vec::new(),
            diagnostics: DiagnosticCollector::new(),
        }
    }

    fn tokenize(&mut self) {
        let mut input = LocatingSlice::new(self.source);

        while input.eof_offset() > 0 {
            let checkpoint = input.checkpoint();
            let start = input.current_token_start();

            match lexeme(&mut input) {
                Ok(Lexeme::Trivia) => {}
                Ok(Lexeme::Token(kind, value)) => {
                    let end = input.current_token_start();
                    self.push(kind, value, start..end);
                }
                Err(ErrMode::Backtrack(_)) | Err(ErrMode::Incomplete(_)) => {
                    input.reset(&checkpoint);
                    self.skip_unrecognized(&mut input);
                }
                Err(ErrMode::Cut(context)) => self.recover(context, &mut input),
            }
        }

        let end = self.source.len();
        self.push(TokenKind::Eof, String::new(), end..end);
    }

    fn push(&mut self, kind: TokenKind, value: String, range: std::ops::Range<usize>) {
        let location = self.lines.location(range.start);
        let mut token = Token::new(kind, value, Span::new(range), location);
        if kind == TokenKind::Number {
            token.number = token.value.parse().ok();
        }
        self.tokens.push(token);
    }

    /// Report the character at the cursor and step over it.
    fn skip_unrecognized(&mut self, input: &mut Input<'a>) {
        let start = input.current_token_start();
        let Some(unexpected) = input.next_token() else {
            return;
        };
        let end = input.current_token_start();

        self.diagnostics.emit(
            Diagnostic::error(format!("unrecognized character `{unexpected}`"))
                .with_code(DiagnosticCode::FC120)
                .at(self.lines.location(start))
                .with_span(Span::new(start..end)),
        );
    }

    /// Report a committed failure and resynchronize.
    ///
    /// An open block comment swallows the rest of the input; unterminated
    /// strings and template expressions skip to the end of the line.
    fn recover(&mut self, context: ContextError<LexerDiagnostic>, input: &mut Input<'a>) {
        let Some(LexerDiagnostic {
            code,
            message,
            help,
            start,
        }) = context.context().next().cloned()
        else {
            self.skip_unrecognized(input);
            return;
        };

        let remaining = input.eof_offset();
        let skip = if code == DiagnosticCode::FC123 {
            remaining
        } else {
            input.peek_slice(remaining).find('\n').unwrap_or(remaining)
        };
        input.next_slice(skip);
        let end = input.current_token_start();

        let mut diag = Diagnostic::error(message)
            .with_code(code)
            .at(self.lines.location(start))
            .with_span(Span::new(start..end));
        if let Some(help) = help {
            diag = diag.with_help(help);
        }
        self.diagnostics.emit(diag);
    }

    fn finish(self) -> (Vec<Token>, Vec<Diagnostic>) {
        (self.tokens, self.diagnostics.finish())
    }
}

/// Tokenize `source`, collecting every lexical error.
///
/// The token list always ends with a [`TokenKind::Eof`] token, even when
/// diagnostics were produced.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = Lexer::new(source);
    lexer.tokenize();
    let (tokens, diagnostics) = lexer.finish();

    debug!(tokens = tokens.len(), diagnostics = diagnostics.len(); "Tokenized source");
    (tokens, diagnostics)
}

#[cfg(test)]
mod tests {
    use flowforge_core::span::Location;

    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diagnostics) = tokenize(source);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
        tokens.into_iter().map(|token| token.kind).collect()
    }

    fn single(source: &str) -> Token {
        let (mut tokens, diagnostics) = tokenize(source);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
        assert_eq!(tokens.len(), 2, "expected one token plus EOF: {tokens:?}");
        tokens.remove(0)
    }

    fn codes(source: &str) -> Vec<DiagnosticCode> {
        let (_, diagnostics) = tokenize(source);
        diagnostics.iter().filter_map(|diag| diag.code()).collect()
    }

    #[test]
    fn test_empty_source_yields_eof() {
        assert_eq!(kinds(""), [TokenKind::Eof]);
        assert_eq!(kinds("  \t\r "), [TokenKind::Eof]);
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds("{}()[],:;"),
            [
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::Comma,
                TokenKind::Colon,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_arrows() {
        assert_eq!(
            kinds("a -> b => c ~> d"),
            [
                TokenKind::Identifier,
                TokenKind::Arrow(ArrowKind::Solid),
                TokenKind::Identifier,
                TokenKind::Arrow(ArrowKind::Thick),
                TokenKind::Identifier,
                TokenKind::Arrow(ArrowKind::Dotted),
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_arrow_without_spaces_splits_identifiers() {
        let (tokens, _) = tokenize("start->end");
        assert_eq!(tokens[0].value, "start");
        assert_eq!(tokens[1].kind, TokenKind::Arrow(ArrowKind::Solid));
        assert_eq!(tokens[2].value, "end");
    }

    #[test]
    fn test_identifier_characters() {
        assert_eq!(single("api-gateway.v2_x").value, "api-gateway.v2_x");
        assert_eq!(single("_private").kind, TokenKind::Identifier);
        assert_eq!(single("3d").kind, TokenKind::Identifier);
    }

    #[test]
    fn test_negative_number_in_data_lexes_as_word() {
        let token = single("-12");
        assert_eq!(token.kind, TokenKind::Identifier);
        assert_eq!(token.value, "-12");
    }

    #[test]
    fn test_lone_dash_is_unrecognized() {
        assert_eq!(codes("- a"), [DiagnosticCode::FC120]);
    }

    #[test]
    fn test_keywords_are_case_folded() {
        let token = single("NODE");
        assert_eq!(token.kind, TokenKind::Keyword(Keyword::Node));
        assert_eq!(token.value, "node");

        assert_eq!(single("Diagram").kind, TokenKind::Keyword(Keyword::Diagram));
        assert_eq!(single("nodes").kind, TokenKind::Identifier);
        assert_eq!(single("node-a").kind, TokenKind::Identifier);
    }

    #[test]
    fn test_numbers() {
        let token = single("42");
        assert_eq!(token.kind, TokenKind::Number);
        assert_eq!(token.number, Some(42.0));

        let token = single("4.5");
        assert_eq!(token.kind, TokenKind::Identifier);
        assert_eq!(token.number, None);
    }

    #[test]
    fn test_color_literals() {
        for source in ["#fff", "#a1b2c3", "#a1b2c3d4"] {
            let token = single(source);
            assert_eq!(token.kind, TokenKind::Color);
            assert_eq!(token.value, source);
        }
    }

    #[test]
    fn test_invalid_color_is_reported() {
        assert_eq!(codes("#12"), [DiagnosticCode::FC120]);
        assert_eq!(codes("#xyz")[0], DiagnosticCode::FC120);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(single(r#""a\nb""#).value, "a\nb");
        assert_eq!(single(r#""say \"hi\"""#).value, "say \"hi\"");
        assert_eq!(single(r#""back\\slash""#).value, "back\\slash");
        assert_eq!(single(r#""tab\there""#).value, "tab\there");
        assert_eq!(single(r#""\q""#).value, "q");
        assert_eq!(single(r#""""#).value, "");
    }

    #[test]
    fn test_template_expression_is_kept_verbatim() {
        let token = single("svc-${name}.db");
        assert_eq!(token.kind, TokenKind::Identifier);
        assert_eq!(token.value, "svc-${name}.db");

        assert_eq!(single("${n}").value, "${n}");
    }

    #[test]
    fn test_comments_are_dropped() {
        assert_eq!(
            kinds("a // trailing\n/* block\n comment */ b"),
            [
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_skips_to_line_end() {
        let (tokens, diagnostics) = tokenize("\"open\nnode");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), Some(DiagnosticCode::FC121));
        assert_eq!(diagnostics[0].location(), Some(Location::new(1, 1)));

        let kinds: Vec<_> = tokens.iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds,
            [
                TokenKind::Newline,
                TokenKind::Keyword(Keyword::Node),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_template_expression() {
        assert_eq!(codes("node ${name\n"), [DiagnosticCode::FC122]);
    }

    #[test]
    fn test_unterminated_block_comment_consumes_rest() {
        let (tokens, diagnostics) = tokenize("a /* never closed\nb c");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), Some(DiagnosticCode::FC123));
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_lexing_continues_after_errors() {
        let (tokens, diagnostics) = tokenize("a ? b ! c");
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|diag| diag.severity().is_error()));
        let words: Vec<_> = tokens
            .iter()
            .filter(|token| token.kind == TokenKind::Identifier)
            .map(|token| token.value.as_str())
            .collect();
        assert_eq!(words, ["a", "b", "c"]);
    }

    #[test]
    fn test_token_locations() {
        let (tokens, _) = tokenize("node a\n  a -> b");
        let arrow = tokens
            .iter()
            .find(|token| matches!(token.kind, TokenKind::Arrow(_)))
            .unwrap();
        assert_eq!((arrow.line(), arrow.column()), (2, 5));
        assert_eq!(arrow.span, Span::new(11..13));
    }
}

#[cfg(test)]
mod proptest_tests {
    use proptest::prelude::*;

    use super::*;

    fn identifier_strategy() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,16}"
            .prop_filter("avoid keywords", |word| Keyword::from_lowercase(word).is_none())
    }

    proptest! {
        #[test]
        fn identifiers_lex_as_single_token(id in identifier_strategy()) {
            let (tokens, diagnostics) = tokenize(&id);
            prop_assert!(diagnostics.is_empty());
            prop_assert_eq!(tokens.len(), 2);
            prop_assert_eq!(tokens[0].kind, TokenKind::Identifier);
            prop_assert_eq!(&tokens[0].value, &id);
        }

        #[test]
        fn lexing_never_panics_and_ends_with_eof(source in "\\PC{0,64}") {
            let (tokens, _) = tokenize(&source);
            prop_assert_eq!(tokens.last().map(|token| token.kind), Some(TokenKind::Eof));
        }

        #[test]
        fn token_spans_are_ordered(source in "[a-z{}();:#\"\\-> \n]{0,48}") {
            let (tokens, _) = tokenize(&source);
            for pair in tokens.windows(2) {
                prop_assert!(pair[0].span.end() <= pair[1].span.start());
            }
        }
    }
}
