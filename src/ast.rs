use crate::expr::{AssignData, BinaryData, CallData, Expr, ExprVisitor, GroupingData, LiteralData, LogicalData, UnaryData, VariableData};
use crate::stmt::{BlockData, ExpressionData, FunctionData, IfData, PrintData, ReturnData, Stmt, StmtVisitor, VarData, WhileData};
use std::rc::Rc;

/// Returns a string representation of the expression in parenthesized
/// prefix notation, e.g. `(+ 1 2)`. Used by tests and the REPL's `--ast`
/// diagnostic, not by the interpreter itself.
macro_rules! parenthesize {
    ( $self:ident, $name:expr, $( $x:expr ),+ ) => {
        {
            let mut string = String::new();
            string += "(";
            string += $name;
            $(
                string += " ";
                string += &$x.accept($self);
            )*
            string += ")";

            string
        }
    };
}

pub struct AstPrinter;

impl AstPrinter {
    pub fn print(&mut self, expr: &Expr) -> String {
        expr.accept(self)
    }
}

impl ExprVisitor<String> for AstPrinter {
    fn visit_literal(&mut self, data: &LiteralData) -> String {
        data.value.to_string()
    }

    fn visit_grouping(&mut self, data: &GroupingData) -> String {
        parenthesize!(self, "group", data.expression)
    }

    fn visit_unary(&mut self, data: &UnaryData) -> String {
        parenthesize!(self, &data.operator.lexeme, data.right)
    }

    fn visit_binary(&mut self, data: &BinaryData) -> String {
        parenthesize!(self, &data.operator.lexeme, data.left, data.right)
    }

    fn visit_logical(&mut self, data: &LogicalData) -> String {
        parenthesize!(self, &data.operator.lexeme, data.left, data.right)
    }

    fn visit_variable(&mut self, data: &VariableData) -> String {
        data.name.lexeme.clone()
    }

    fn visit_assign(&mut self, data: &AssignData) -> String {
        parenthesize!(self, format!("= {}", data.name.lexeme).as_str(), data.value)
    }

    fn visit_call(&mut self, data: &CallData) -> String {
        let mut string = data.callee.accept(self);
        string += "(";
        for arg in &data.arguments {
            string += &arg.accept(self);
            string += " ";
        }
        let string = string.trim_end().to_string();
        string + ")"
    }
}

impl StmtVisitor<String> for AstPrinter {
    fn visit_expression(&mut self, data: &ExpressionData) -> String {
        parenthesize!(self, "expr", data.expr)
    }

    fn visit_print(&mut self, data: &PrintData) -> String {
        parenthesize!(self, "print", data.expr)
    }

    fn visit_var(&mut self, data: &VarData) -> String {
        let mut string = format!("(var {}", data.name.lexeme);
        if let Some(initializer) = &data.initializer {
            string += " = ";
            string += &initializer.accept(self);
        }
        string + ")"
    }

    fn visit_block(&mut self, data: &BlockData) -> String {
        let mut string = String::from("{");
        for stmt in &data.statements {
            string += " ";
            string += &stmt.accept(self);
        }
        string + " }"
    }

    fn visit_if(&mut self, data: &IfData) -> String {
        let mut string = format!("(if {} {}", data.condition.accept(self), data.then_branch.accept(self));
        if let Some(else_branch) = &data.else_branch {
            string += " else ";
            string += &else_branch.accept(self);
        }
        string + ")"
    }

    fn visit_while(&mut self, data: &WhileData) -> String {
        parenthesize!(self, "while", data.condition, data.body)
    }

    fn visit_function(&mut self, data: &Rc<FunctionData>) -> String {
        let params = data.params.iter().map(|p| p.lexeme.as_str()).collect::<Vec<_>>().join(" ");
        let body = data.body.iter().map(|stmt| stmt.accept(self)).collect::<Vec<String>>().join(" ");
        format!("(fun {}({}) {{ {} }})", data.name.lexeme, params, body)
    }

    fn visit_return(&mut self, data: &ReturnData) -> String {
        match &data.value {
            Some(value) => parenthesize!(self, "return", value),
            None => "(return)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Literal;
    use crate::token::{Location, Token, Type};

    #[test]
    fn prints_nested_binary_expression_in_prefix_form() {
        let left = Expr::unary(
            Token::new(Type::Minus, "-".to_string(), None, Location::new(1)),
            Expr::literal(Literal::Number(123.0)),
        );
        let right = Expr::grouping(Expr::literal(Literal::Number(45.67)));
        let expr = Expr::binary(left, Token::new(Type::Star, "*".to_string(), None, Location::new(1)), right);

        assert_eq!(AstPrinter.print(&expr), "(* (- 123) (group 45.67))");
    }
}
