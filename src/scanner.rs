use std::str::Chars;

use peekmore::{PeekMore, PeekMoreIterator};
use substring::Substring;

use crate::error::{ErrorReporter, ScanError};
use crate::literal::Literal;
use crate::token::{Location, Token, Type};

/// Converts source text into a token stream. Never aborts: lexical
/// errors are recorded on the reporter and scanning continues, so a
/// single source can surface every lexical problem it contains in one
/// pass (spec.md §4.1).
pub struct Scanner<'a> {
    source: &'a str,
    chars: PeekMoreIterator<Chars<'a>>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Scanner<'a> {
        Scanner {
            source,
            chars: source.chars().peekmore(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    /// Scans the whole source and returns the resulting tokens, always
    /// terminated by a single `EOF` token.
    pub fn scan_tokens(mut self, reporter: &mut ErrorReporter) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token(reporter);
        }

        self.tokens.push(Token::new(Type::EOF, String::new(), None, Location::new(self.line)));
        self.tokens
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.chars.next().expect("advance called past end of source");
        self.current += 1;
        c
    }

    fn peek(&mut self) -> char {
        self.chars.peek().copied().unwrap_or('\0')
    }

    fn peek_next(&mut self) -> char {
        self.chars.peek_next().copied().unwrap_or('\0')
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn lexeme(&self) -> String {
        self.source.substring(self.start, self.current).to_string()
    }

    fn add_token(&mut self, r#type: Type, literal: Option<Literal>) {
        self.tokens.push(Token::new(r#type, self.lexeme(), literal, Location::new(self.line)));
    }

    fn string(&mut self, reporter: &mut ErrorReporter) {
        let start_line = self.line;

        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            reporter.report(&ScanError { line: start_line, message: "Unterminated string.".to_string() });
            return;
        }

        self.advance(); // The closing quote.

        // Literal excludes the surrounding quotes; the lexeme includes them.
        let value = self.source.substring(self.start + 1, self.current - 1).to_string();
        self.add_token(Type::String, Some(Literal::String(value)));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // Only consume the '.' if it is followed by at least one digit;
        // otherwise it belongs to whatever comes after the number.
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let value: f64 = self.lexeme().parse().expect("scanned digits to form a valid number");
        self.add_token(Type::Number, Some(Literal::Number(value)));
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let lexeme = self.lexeme();
        let r#type = match lexeme.as_str() {
            "and" => Type::And,
            "class" => Type::Class,
            "else" => Type::Else,
            "false" => Type::False,
            "for" => Type::For,
            "fun" => Type::Fun,
            "if" => Type::If,
            "nil" => Type::Nil,
            "or" => Type::Or,
            "print" => Type::Print,
            "return" => Type::Return,
            "super" => Type::Super,
            "this" => Type::This,
            "true" => Type::True,
            "var" => Type::Var,
            "while" => Type::While,
            _ => Type::Identifier,
        };

        self.add_token(r#type, None);
    }

    fn scan_token(&mut self, reporter: &mut ErrorReporter) {
        let c = self.advance();
        match c {
            '(' => self.add_token(Type::LeftParen, None),
            ')' => self.add_token(Type::RightParen, None),
            '{' => self.add_token(Type::LeftBrace, None),
            '}' => self.add_token(Type::RightBrace, None),
            ',' => self.add_token(Type::Comma, None),
            '.' => self.add_token(Type::Dot, None),
            '-' => self.add_token(Type::Minus, None),
            '+' => self.add_token(Type::Plus, None),
            ';' => self.add_token(Type::Semicolon, None),
            '*' => self.add_token(Type::Star, None),

            '!' => {
                let r#type = if self.match_next('=') { Type::BangEqual } else { Type::Bang };
                self.add_token(r#type, None);
            }
            '=' => {
                let r#type = if self.match_next('=') { Type::EqualEqual } else { Type::Equal };
                self.add_token(r#type, None);
            }
            '<' => {
                let r#type = if self.match_next('=') { Type::LessEqual } else { Type::Less };
                self.add_token(r#type, None);
            }
            '>' => {
                let r#type = if self.match_next('=') { Type::GreaterEqual } else { Type::Greater };
                self.add_token(r#type, None);
            }
            '/' => {
                if self.match_next('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(Type::Slash, None);
                }
            }

            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,

            '"' => self.string(reporter),

            c if c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => self.identifier(),

            _ => {
                reporter.report(&ScanError { line: self.line, message: "Unexpected character.".to_string() });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorReporter;

    fn scan(source: &str) -> Vec<Token> {
        let mut reporter = ErrorReporter::stderr();
        let tokens = Scanner::new(source).scan_tokens(&mut reporter);
        assert!(!reporter.had_error(), "unexpected scan error in {source:?}");
        tokens
    }

    #[test]
    fn scans_single_and_double_char_tokens() {
        let tokens = scan("!= == <= >= ! < > = + - * /");
        let kinds: Vec<Type> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(
            kinds,
            vec![
                Type::BangEqual, Type::EqualEqual, Type::LessEqual, Type::GreaterEqual,
                Type::Bang, Type::Less, Type::Greater, Type::Equal,
                Type::Plus, Type::Minus, Type::Star, Type::Slash, Type::EOF,
            ]
        );
    }

    #[test]
    fn scans_keywords_and_identifiers() {
        let tokens = scan("var nilly = nil;");
        assert_eq!(tokens[0].r#type, Type::Var);
        assert_eq!(tokens[1].r#type, Type::Identifier);
        assert_eq!(tokens[1].lexeme, "nilly");
        assert_eq!(tokens[2].r#type, Type::Equal);
        assert_eq!(tokens[3].r#type, Type::Nil);
    }

    #[test]
    fn number_without_fraction_digit_does_not_consume_dot() {
        let tokens = scan("123.");
        assert_eq!(tokens[0].r#type, Type::Number);
        assert_eq!(tokens[0].literal, Some(Literal::Number(123.0)));
        assert_eq!(tokens[1].r#type, Type::Dot);
    }

    #[test]
    fn multiline_string_tracks_line_number() {
        let tokens = scan("\"a\nb\" 1");
        assert_eq!(tokens[0].r#type, Type::String);
        assert_eq!(tokens[0].literal, Some(Literal::String("a\nb".to_string())));
        assert_eq!(tokens[1].location.line, 2);
    }

    #[test]
    fn unterminated_string_reports_error_and_stops_at_eof() {
        let mut reporter = ErrorReporter::stderr();
        let tokens = Scanner::new("\"unterminated").scan_tokens(&mut reporter);
        assert!(reporter.had_error());
        assert_eq!(tokens.last().unwrap().r#type, Type::EOF);
    }

    #[test]
    fn unexpected_character_does_not_stop_scanning() {
        let mut reporter = ErrorReporter::stderr();
        let tokens = Scanner::new("1 @ 2").scan_tokens(&mut reporter);
        assert!(reporter.had_error());
        let kinds: Vec<Type> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(kinds, vec![Type::Number, Type::Number, Type::EOF]);
    }

    #[test]
    fn comment_is_discarded() {
        let tokens = scan("// a comment\n1");
        assert_eq!(tokens[0].r#type, Type::Number);
        assert_eq!(tokens[0].location.line, 2);
    }
}
