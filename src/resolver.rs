use std::collections::HashMap;
use std::mem;

use crate::error::{ErrorReporter, ResolveError};
use crate::expr::{AssignData, BinaryData, CallData, Expr, ExprVisitor, GroupingData, LiteralData, LogicalData, UnaryData, VariableData};
use crate::interpreter::Interpreter;
use crate::stmt::{BlockData, ExpressionData, FunctionData, IfData, PrintData, ReturnData, Stmt, StmtVisitor, VarData, WhileData};
use crate::token::Token;
use std::rc::Rc;

#[derive(PartialEq, Clone, Copy)]
enum FunctionType {
    None,
    Function,
}

/// A static pass between parsing and evaluation that resolves every
/// variable reference to a scope distance, ahead of time, so the
/// interpreter never has to search the environment chain at runtime and
/// so that each `x` always reads the same binding of `x` regardless of
/// which closures happen to be alive around it (spec.md §3, §4.2).
pub struct Resolver<'a, 'b> {
    interpreter: &'a mut Interpreter,
    reporter: &'b mut ErrorReporter,
    scopes: Vec<HashMap<String, bool>>,
    current_function: FunctionType,
}

impl<'a, 'b> Resolver<'a, 'b> {
    pub fn new(interpreter: &'a mut Interpreter, reporter: &'b mut ErrorReporter) -> Self {
        Resolver { interpreter, reporter, scopes: Vec::new(), current_function: FunctionType::None }
    }

    pub fn resolve(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        stmt.accept(self);
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        expr.accept(self);
    }

    fn resolve_function(&mut self, function: &Rc<FunctionData>, r#type: FunctionType) {
        let enclosing_function = mem::replace(&mut self.current_function, r#type);

        self.begin_scope();
        for param in &function.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve(&function.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else { return };

        if scope.contains_key(&name.lexeme) {
            self.reporter.report(&ResolveError {
                token: name.clone(),
                message: "Already a variable with this name in this scope.".to_string(),
            });
        }
        scope.insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else { return };
        scope.insert(name.lexeme.clone(), true);
    }

    fn resolve_local(&mut self, id: u64, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.interpreter.resolve(id, depth);
                return;
            }
        }
        // Not found in any local scope: left unresolved, so the
        // interpreter falls back to looking it up in globals directly.
    }
}

impl<'a, 'b> ExprVisitor<()> for Resolver<'a, 'b> {
    fn visit_literal(&mut self, _data: &LiteralData) {}

    fn visit_grouping(&mut self, data: &GroupingData) {
        self.resolve_expr(&data.expression);
    }

    fn visit_unary(&mut self, data: &UnaryData) {
        self.resolve_expr(&data.right);
    }

    fn visit_binary(&mut self, data: &BinaryData) {
        self.resolve_expr(&data.left);
        self.resolve_expr(&data.right);
    }

    fn visit_logical(&mut self, data: &LogicalData) {
        self.resolve_expr(&data.left);
        self.resolve_expr(&data.right);
    }

    fn visit_variable(&mut self, data: &VariableData) {
        if let Some(scope) = self.scopes.last() {
            if scope.get(&data.name.lexeme) == Some(&false) {
                self.reporter.report(&ResolveError {
                    token: data.name.clone(),
                    message: "Can't read local variable in its own initializer.".to_string(),
                });
            }
        }

        self.resolve_local(data.id, &data.name);
    }

    fn visit_assign(&mut self, data: &AssignData) {
        self.resolve_expr(&data.value);
        self.resolve_local(data.id, &data.name);
    }

    fn visit_call(&mut self, data: &CallData) {
        self.resolve_expr(&data.callee);
        for argument in &data.arguments {
            self.resolve_expr(argument);
        }
    }
}

impl<'a, 'b> StmtVisitor<()> for Resolver<'a, 'b> {
    fn visit_expression(&mut self, data: &ExpressionData) {
        self.resolve_expr(&data.expr);
    }

    fn visit_print(&mut self, data: &PrintData) {
        self.resolve_expr(&data.expr);
    }

    fn visit_var(&mut self, data: &VarData) {
        self.declare(&data.name);
        if let Some(initializer) = &data.initializer {
            self.resolve_expr(initializer);
        }
        self.define(&data.name);
    }

    fn visit_block(&mut self, data: &BlockData) {
        self.begin_scope();
        self.resolve(&data.statements);
        self.end_scope();
    }

    fn visit_if(&mut self, data: &IfData) {
        self.resolve_expr(&data.condition);
        self.resolve_stmt(&data.then_branch);
        if let Some(else_branch) = &data.else_branch {
            self.resolve_stmt(else_branch);
        }
    }

    fn visit_while(&mut self, data: &WhileData) {
        self.resolve_expr(&data.condition);
        self.resolve_stmt(&data.body);
    }

    fn visit_function(&mut self, data: &Rc<FunctionData>) {
        self.declare(&data.name);
        self.define(&data.name);
        self.resolve_function(data, FunctionType::Function);
    }

    fn visit_return(&mut self, data: &ReturnData) {
        if self.current_function == FunctionType::None {
            self.reporter.report(&ResolveError {
                token: data.keyword.clone(),
                message: "Can't return from top-level code.".to_string(),
            });
        }

        if let Some(value) = &data.value {
            self.resolve_expr(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Literal;
    use crate::token::{Location, Type};

    fn token(kind: Type, lexeme: &str) -> Token {
        Token::new(kind, lexeme.to_string(), None, Location::new(1))
    }

    #[test]
    fn self_referencing_initializer_is_a_resolve_error() {
        let mut interpreter = Interpreter::new(Box::new(std::io::sink()));
        let mut reporter = ErrorReporter::new(Box::new(std::io::sink()));

        // { var a = a; }
        let inner = Stmt::var(
            token(Type::Identifier, "a"),
            Some(Expr::variable(1, token(Type::Identifier, "a"))),
        );
        let program = vec![Stmt::block(vec![inner])];

        let mut resolver = Resolver::new(&mut interpreter, &mut reporter);
        resolver.resolve(&program);
        assert!(reporter.had_error());
    }

    #[test]
    fn top_level_return_is_a_resolve_error() {
        let mut interpreter = Interpreter::new(Box::new(std::io::sink()));
        let mut reporter = ErrorReporter::new(Box::new(std::io::sink()));
        let program = vec![Stmt::return_stmt(token(Type::Return, "return"), Some(Expr::literal(Literal::Nil)))];
        let mut resolver = Resolver::new(&mut interpreter, &mut reporter);
        resolver.resolve(&program);
        assert!(reporter.had_error());
    }

    #[test]
    fn duplicate_declaration_in_the_same_scope_is_a_resolve_error() {
        let mut interpreter = Interpreter::new(Box::new(std::io::sink()));
        let mut reporter = ErrorReporter::new(Box::new(std::io::sink()));

        // { var a = 1; var a = 2; }
        let program = vec![Stmt::block(vec![
            Stmt::var(token(Type::Identifier, "a"), Some(Expr::literal(Literal::Number(1.0)))),
            Stmt::var(token(Type::Identifier, "a"), Some(Expr::literal(Literal::Number(2.0)))),
        ])];

        let mut resolver = Resolver::new(&mut interpreter, &mut reporter);
        resolver.resolve(&program);
        assert!(reporter.had_error());
    }

    #[test]
    fn duplicate_declaration_at_the_global_scope_is_not_an_error() {
        let mut interpreter = Interpreter::new(Box::new(std::io::sink()));
        let mut reporter = ErrorReporter::new(Box::new(std::io::sink()));

        // var a = 1; var a = 2; (no enclosing block, so no scope is pushed)
        let program = vec![
            Stmt::var(token(Type::Identifier, "a"), Some(Expr::literal(Literal::Number(1.0)))),
            Stmt::var(token(Type::Identifier, "a"), Some(Expr::literal(Literal::Number(2.0)))),
        ];

        let mut resolver = Resolver::new(&mut interpreter, &mut reporter);
        resolver.resolve(&program);
        assert!(!reporter.had_error());
    }
}
