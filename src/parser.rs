use crate::error::{ErrorReporter, ParseError};
use crate::expr::{Expr, ExprId};
use crate::literal::Literal;
use crate::stmt::Stmt;
use crate::token::{Token, Type};

type ParseResult<T> = Result<T, ParseError>;

const MAX_ARGS: usize = 255;

/// Returns if the next token is any of the given types.
macro_rules! matches {
    ( $self:ident, $( $type:expr ),+ ) => {
        {
            if $( $self.check($type) ) ||* {
                $self.advance();
                true
            } else {
                false
            }
        }
    }
}

/// Recursive-descent parser over the token stream, precedence climbing
/// from `assignment` down to `primary`.
///
/// - Program     -> Decleration* EOF ;
/// - Block       -> "{" Decleration* "}" ;
/// - Decleration -> FunDecl | VarDecl | Statement ;
/// - FunDecl     -> "fun" Function ;
/// - VarDecl     -> "var" IDENTIFIER ( "=" Expression )? ";" ;
/// - Function    -> IDENTIFIER "(" Parameters? ")" Block ;
/// - Parameters  -> IDENTIFIER ( "," IDENTIFIER )* ;
/// - Statement   -> ExprStmt | ForStmt | IfStmt | PrintStmt | ReturnStmt | WhileStmt | Block ;
/// - ExprStmt    -> Expression ";" ;
/// - ForStmt     -> "for" "(" ( Decleration | ExprStmt | ";" ) Expression? ";" Expression? ")" Statement ;
/// - IfStmt      -> "if" "(" Expression ")" Statement ( "else" Statement )? ;
/// - PrintStmt   -> "print" Expression ";" ;
/// - ReturnStmt  -> "return" Expression? ";" ;
/// - WhileStmt   -> "while" "(" Expression ")" Statement ;
/// - Expression  -> Assignment ;
/// - Assignment  -> IDENTIFIER "=" Assignment | LogicOr ;
/// - LogicOr     -> LogicAnd ( "or" LogicAnd )* ;
/// - LogicAnd    -> Equality ( "and" Equality )* ;
/// - Equality    -> Comparison ( ( "!=" | "==" ) Comparison )* ;
/// - Comparison  -> Term ( ( ">" | ">=" | "<" | "<=" ) Term )* ;
/// - Term        -> Factor ( ( "-" | "+" ) Factor )* ;
/// - Factor      -> Unary ( ( "/" | "*" ) Unary )* ;
/// - Unary       -> ( "!" | "-" ) Unary | Call ;
/// - Call        -> Primary ( "(" Arguments? ")" )* ;
/// - Arguments   -> Expression ( "," Expression )* ;
/// - Primary     -> "true" | "false" | "nil" | NUMBER | STRING | "(" Expression ")" | IDENTIFIER ;
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    next_expr_id: ExprId,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0, next_expr_id: 0 }
    }

    /// Parses the whole token stream into a program. A declaration that
    /// fails to parse is reported and the parser resynchronizes at the
    /// next statement boundary, so a single syntax error does not stop
    /// later, independent errors from also being surfaced.
    pub fn parse(&mut self, reporter: &mut ErrorReporter) -> Vec<Stmt> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    reporter.report(&err);
                    self.synchronize();
                }
            }
        }

        statements
    }

    fn next_id(&mut self) -> ExprId {
        let id = self.next_expr_id;
        self.next_expr_id += 1;
        id
    }

    fn declaration(&mut self) -> ParseResult<Stmt> {
        if matches!(self, Type::Fun) {
            return self.function("function");
        }
        if matches!(self, Type::Var) {
            return self.var_declaration();
        }
        self.statement()
    }

    fn function(&mut self, kind: &str) -> ParseResult<Stmt> {
        let name = self.consume(Type::Identifier, &format!("Expect {kind} name."))?;
        self.consume(Type::LeftParen, &format!("Expect '(' after {kind} name."))?;

        let mut params = Vec::new();
        if !self.check(Type::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    return Err(self.error(self.peek().clone(), &format!("Can't have more than {MAX_ARGS} parameters.")));
                }
                params.push(self.consume(Type::Identifier, "Expect parameter name.")?);
                if !matches!(self, Type::Comma) {
                    break;
                }
            }
        }
        self.consume(Type::RightParen, "Expect ')' after parameters.")?;

        self.consume(Type::LeftBrace, &format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;

        Ok(Stmt::function(name, params, body))
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(Type::Identifier, "Expect variable name.")?;

        let initializer = if matches!(self, Type::Equal) { Some(self.expression()?) } else { None };

        self.consume(Type::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::var(name, initializer))
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if matches!(self, Type::For) {
            return self.for_statement();
        }
        if matches!(self, Type::If) {
            return self.if_statement();
        }
        if matches!(self, Type::Print) {
            return self.print_statement();
        }
        if matches!(self, Type::Return) {
            return self.return_statement();
        }
        if matches!(self, Type::While) {
            return self.while_statement();
        }
        if matches!(self, Type::LeftBrace) {
            return Ok(Stmt::block(self.block()?));
        }
        self.expression_statement()
    }

    /// Desugars into `{ init; while (cond) { body; incr; } }` rather than
    /// adding a dedicated `Stmt::For` — the interpreter and resolver then
    /// need no special case for `for` at all.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(Type::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if matches!(self, Type::Semicolon) {
            None
        } else if matches!(self, Type::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(Type::Semicolon) { None } else { Some(self.expression()?) };
        self.consume(Type::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(Type::RightParen) { None } else { Some(self.expression()?) };
        self.consume(Type::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::block(vec![body, Stmt::expression(increment)]);
        }

        let condition = condition.unwrap_or_else(|| Expr::literal(Literal::Bool(true)));
        body = Stmt::while_stmt(condition, body);

        if let Some(initializer) = initializer {
            body = Stmt::block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(Type::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(Type::RightParen, "Expect ')' after if condition.")?;

        let then_branch = self.statement()?;
        let else_branch = if matches!(self, Type::Else) { Some(self.statement()?) } else { None };

        Ok(Stmt::if_stmt(condition, then_branch, else_branch))
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let value = self.expression()?;
        self.consume(Type::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::print(value))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        let value = if self.check(Type::Semicolon) { None } else { Some(self.expression()?) };
        self.consume(Type::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::return_stmt(keyword, value))
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(Type::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(Type::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;

        Ok(Stmt::while_stmt(condition, body))
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(Type::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(Type::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(Type::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::expression(expr))
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or()?;

        if matches!(self, Type::Equal) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable(data) => Ok(Expr::assign(self.next_id(), data.name, value)),
                _ => Err(self.error(equals, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;

        while matches!(self, Type::Or) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::logical(expr, operator, right);
        }

        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while matches!(self, Type::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::logical(expr, operator, right);
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while matches!(self, Type::BangEqual, Type::EqualEqual) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while matches!(self, Type::Greater, Type::GreaterEqual, Type::Less, Type::LessEqual) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while matches!(self, Type::Minus, Type::Plus) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while matches!(self, Type::Slash, Type::Star) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if matches!(self, Type::Bang, Type::Minus) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::unary(operator, right));
        }

        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if matches!(self, Type::LeftParen) {
                expr = self.finish_call(expr)?;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = Vec::new();

        if !self.check(Type::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    return Err(self.error(self.peek().clone(), &format!("Can't have more than {MAX_ARGS} arguments.")));
                }
                arguments.push(self.expression()?);
                if !matches!(self, Type::Comma) {
                    break;
                }
            }
        }

        let paren = self.consume(Type::RightParen, "Expect ')' after arguments.")?;
        Ok(Expr::call(callee, paren, arguments))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if matches!(self, Type::False) {
            return Ok(Expr::literal(Literal::Bool(false)));
        }
        if matches!(self, Type::True) {
            return Ok(Expr::literal(Literal::Bool(true)));
        }
        if matches!(self, Type::Nil) {
            return Ok(Expr::literal(Literal::Nil));
        }
        if matches!(self, Type::Number, Type::String) {
            let literal = self.previous().literal.clone().expect("scanner to attach a literal to NUMBER/STRING tokens");
            return Ok(Expr::literal(literal));
        }
        if matches!(self, Type::Identifier) {
            let name = self.previous().clone();
            return Ok(Expr::variable(self.next_id(), name));
        }
        if matches!(self, Type::LeftParen) {
            let expr = self.expression()?;
            self.consume(Type::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::grouping(expr));
        }

        Err(self.error(self.peek().clone(), "Expect expression."))
    }

    fn consume(&mut self, r#type: Type, message: &str) -> ParseResult<Token> {
        if self.check(r#type) {
            return Ok(self.advance().clone());
        }
        Err(self.error(self.peek().clone(), message))
    }

    fn error(&self, token: Token, message: &str) -> ParseError {
        ParseError { token, message: message.to_string() }
    }

    /// Discards tokens until a likely statement boundary, so the next
    /// `declaration()` call starts from a clean slate instead of
    /// cascading unrelated errors off the first syntax mistake.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().r#type == Type::Semicolon {
                return;
            }

            match self.peek().r#type {
                Type::Class | Type::Fun | Type::Var | Type::For | Type::If | Type::While | Type::Print | Type::Return => return,
                _ => {}
            }

            self.advance();
        }
    }

    fn check(&self, r#type: Type) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().r#type == r#type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().r#type == Type::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorReporter;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, ErrorReporter) {
        let mut reporter = ErrorReporter::new(Box::new(std::io::sink()));
        let tokens = Scanner::new(source).scan_tokens(&mut reporter);
        let mut parser = Parser::new(tokens);
        let statements = parser.parse(&mut reporter);
        (statements, reporter)
    }

    #[test]
    fn parses_a_print_statement() {
        let (statements, reporter) = parse("print 1 + 2;");
        assert!(!reporter.had_error());
        assert_eq!(statements.len(), 1);
        assert!(std::matches!(statements[0], Stmt::Print(_)));
    }

    #[test]
    fn for_loop_desugars_to_a_block_containing_a_while() {
        let (statements, reporter) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(!reporter.had_error());
        assert_eq!(statements.len(), 1);
        match &statements[0] {
            Stmt::Block(block) => {
                assert_eq!(block.statements.len(), 2);
                assert!(std::matches!(block.statements[1], Stmt::While(_)));
            }
            other => panic!("expected a block, got {other:?}"),
        }
    }

    #[test]
    fn invalid_assignment_target_is_reported_but_does_not_abort_parsing() {
        let (statements, reporter) = parse("1 = 2; print 3;");
        assert!(reporter.had_error());
        assert_eq!(statements.len(), 1, "parser should resynchronize after the bad assignment");
    }

    #[test]
    fn each_variable_reference_gets_a_distinct_id() {
        let (statements, reporter) = parse("var a = 1; a = a + 1;");
        assert!(!reporter.had_error());
        let Stmt::Expression(data) = &statements[1] else { panic!("expected an expression statement") };
        let Expr::Assign(assign) = &data.expr else { panic!("expected an assignment") };
        let Expr::Binary(binary) = assign.value.as_ref() else { panic!("expected a binary expression") };
        let Expr::Variable(var) = binary.left.as_ref() else { panic!("expected a variable reference") };
        assert_ne!(assign.id, var.id);
    }

    #[test]
    fn dangling_dot_is_a_syntax_error_not_a_scan_error() {
        let (_, reporter) = parse("1. + 2;");
        assert!(reporter.had_error());
    }

    #[test]
    fn more_than_255_parameters_is_a_syntax_error() {
        let params = (0..256).map(|i| format!("p{i}")).collect::<Vec<_>>().join(", ");
        let source = format!("fun f({params}) {{}}");
        let (_, reporter) = parse(&source);
        assert!(reporter.had_error());
    }

    #[test]
    fn more_than_255_arguments_is_a_syntax_error() {
        let args = (0..256).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
        let source = format!("f({args});");
        let (_, reporter) = parse(&source);
        assert!(reporter.had_error());
    }
}
