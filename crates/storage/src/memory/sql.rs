//! Query text parser for the in-memory data source.
//!
//! Supports the subset of SQL that query pipelines generate:
//! - `SELECT * FROM table`
//! - `SELECT * FROM table WHERE term AND term ...`
//! - `DELETE FROM table [WHERE ...]`
//!
//! A term is `TRUE`, `FALSE`, or `column op value` where `op` is one of
//! `<`, `<=`, `=`, `<>`, `!=`, `>=`, `>` and `value` is a quoted literal
//! (`''` escapes a quote), a bare number, or `NULL`. Keywords are case
//! insensitive and a trailing `;` is allowed.

use quarry_core::schema::TableSchema;
use quarry_core::{Error, Result, Value};
use std::cmp::Ordering;

/// A parsed command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Select { table: String, filter: Vec<Term> },
    Delete { table: String, filter: Vec<Term> },
}

/// One conjunct of a WHERE clause.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    True,
    False,
    /// `column op literal`; a `None` literal is `NULL`.
    Compare {
        column: String,
        op: CompareOp,
        literal: Option<String>,
    },
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Parser state.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::syntax(
            self.input,
            format!("{} at offset {}", message.into(), self.pos),
        )
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(';') {
            self.advance();
            self.skip_whitespace();
        }
        self.pos == self.input.len()
    }

    fn parse_word(&mut self) -> Option<&'a str> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.advance(),
            _ => return None,
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let input = self.input;
        Some(&input[start..self.pos])
    }

    /// Consumes a keyword if it comes next.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let start = self.pos;
        match self.parse_word() {
            Some(word) if word.eq_ignore_ascii_case(keyword) => true,
            _ => {
                self.pos = start;
                false
            }
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", keyword)))
        }
    }

    fn parse_identifier(&mut self) -> Result<String> {
        self.parse_word()
            .map(str::to_string)
            .ok_or_else(|| self.error("expected identifier"))
    }

    fn parse_operator(&mut self) -> Result<CompareOp> {
        self.skip_whitespace();
        let rest = &self.input[self.pos..];
        let (op, width) = if rest.starts_with("<=") {
            (CompareOp::Le, 2)
        } else if rest.starts_with(">=") {
            (CompareOp::Ge, 2)
        } else if rest.starts_with("<>") || rest.starts_with("!=") {
            (CompareOp::Ne, 2)
        } else if rest.starts_with('<') {
            (CompareOp::Lt, 1)
        } else if rest.starts_with('>') {
            (CompareOp::Gt, 1)
        } else if rest.starts_with('=') {
            (CompareOp::Eq, 1)
        } else {
            return Err(self.error("expected comparison operator"));
        };
        self.pos += width;
        Ok(op)
    }

    fn parse_string_literal(&mut self) -> Result<String> {
        // Opening quote already peeked.
        self.advance();
        let mut literal = String::new();
        while let Some(c) = self.peek() {
            self.advance();
            if c == '\'' {
                if self.peek() == Some('\'') {
                    self.advance();
                    literal.push('\'');
                } else {
                    return Ok(literal);
                }
            } else {
                literal.push(c);
            }
        }
        Err(self.error("unterminated string literal"))
    }

    fn parse_number(&mut self) -> Result<String> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        let number = &self.input[start..self.pos];
        if number.is_empty() || number == "-" {
            return Err(self.error("expected value"));
        }
        Ok(number.to_string())
    }

    fn parse_value(&mut self) -> Result<Option<String>> {
        self.skip_whitespace();
        match self.peek() {
            Some('\'') => self.parse_string_literal().map(Some),
            Some(c) if c.is_ascii_digit() || c == '-' => self.parse_number().map(Some),
            _ if self.eat_keyword("NULL") => Ok(None),
            _ => Err(self.error("expected value")),
        }
    }

    fn parse_term(&mut self) -> Result<Term> {
        if self.eat_keyword("TRUE") {
            return Ok(Term::True);
        }
        if self.eat_keyword("FALSE") {
            return Ok(Term::False);
        }
        let column = self.parse_identifier()?;
        let op = self.parse_operator()?;
        let literal = self.parse_value()?;
        Ok(Term::Compare {
            column,
            op,
            literal,
        })
    }

    fn parse_filter(&mut self) -> Result<Vec<Term>> {
        let mut terms = Vec::new();
        if !self.eat_keyword("WHERE") {
            return Ok(terms);
        }
        terms.push(self.parse_term()?);
        while self.eat_keyword("AND") {
            terms.push(self.parse_term()?);
        }
        Ok(terms)
    }

    fn parse_command(&mut self) -> Result<Command> {
        let command = if self.eat_keyword("SELECT") {
            self.skip_whitespace();
            if self.peek() != Some('*') {
                return Err(self.error("only SELECT * is supported"));
            }
            self.advance();
            self.expect_keyword("FROM")?;
            let table = self.parse_identifier()?;
            let filter = self.parse_filter()?;
            Command::Select { table, filter }
        } else if self.eat_keyword("DELETE") {
            self.expect_keyword("FROM")?;
            let table = self.parse_identifier()?;
            let filter = self.parse_filter()?;
            Command::Delete { table, filter }
        } else {
            return Err(self.error("expected SELECT or DELETE"));
        };
        if !self.at_end() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(command)
    }
}

/// Parses query text into a command.
pub fn parse(text: &str) -> Result<Command> {
    Parser::new(text).parse_command()
}

/// A WHERE clause bound to a table's columns.
#[derive(Debug)]
pub struct Filter {
    terms: Vec<BoundTerm>,
}

#[derive(Debug)]
enum BoundTerm {
    Constant(bool),
    Compare {
        index: usize,
        op: CompareOp,
        value: Value,
    },
}

impl Filter {
    /// Resolves column names and converts literals to each column's kind.
    pub fn bind(terms: &[Term], schema: &TableSchema) -> Result<Self> {
        let terms = terms
            .iter()
            .map(|term| match term {
                Term::True => Ok(BoundTerm::Constant(true)),
                Term::False => Ok(BoundTerm::Constant(false)),
                Term::Compare {
                    column,
                    op,
                    literal,
                } => {
                    let index = schema
                        .get_column_index(column)
                        .ok_or_else(|| Error::column_not_found(schema.name(), column))?;
                    let value = match literal {
                        Some(text) => schema.columns()[index]
                            .kind()
                            .parse_literal(column, text)?,
                        None => Value::Null,
                    };
                    Ok(BoundTerm::Compare {
                        index,
                        op: *op,
                        value,
                    })
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { terms })
    }

    /// Returns true if every term holds for the row. Comparisons involving
    /// null never hold.
    pub fn matches(&self, values: &[Value]) -> bool {
        self.terms.iter().all(|term| match term {
            BoundTerm::Constant(result) => *result,
            BoundTerm::Compare { index, op, value } => match values.get(*index) {
                Some(cell) if !cell.is_null() && !value.is_null() => op.holds(cell.cmp(value)),
                _ => false,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::schema::TableBuilder;
    use quarry_core::ColumnKind;

    fn items() -> TableSchema {
        TableBuilder::new("items")
            .unwrap()
            .add_column("id", ColumnKind::Integer)
            .unwrap()
            .add_column("name", ColumnKind::Text)
            .unwrap()
            .add_column("qty", ColumnKind::Integer)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_select() {
        assert_eq!(
            parse("SELECT * FROM items").unwrap(),
            Command::Select {
                table: "items".into(),
                filter: vec![]
            }
        );
        assert_eq!(
            parse("select * from items where qty > '4' AND TRUE;").unwrap(),
            Command::Select {
                table: "items".into(),
                filter: vec![
                    Term::Compare {
                        column: "qty".into(),
                        op: CompareOp::Gt,
                        literal: Some("4".into())
                    },
                    Term::True
                ]
            }
        );
    }

    #[test]
    fn test_parse_delete() {
        assert_eq!(
            parse("DELETE FROM notes WHERE owner <> NULL").unwrap(),
            Command::Delete {
                table: "notes".into(),
                filter: vec![Term::Compare {
                    column: "owner".into(),
                    op: CompareOp::Ne,
                    literal: None
                }]
            }
        );
    }

    #[test]
    fn test_parse_escaped_quote() {
        let Command::Select { filter, .. } =
            parse("SELECT * FROM items WHERE name = 'O''Hara'").unwrap()
        else {
            panic!("expected select");
        };
        assert_eq!(
            filter[0],
            Term::Compare {
                column: "name".into(),
                op: CompareOp::Eq,
                literal: Some("O'Hara".into())
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("UPDATE items"), Err(Error::Syntax { .. })));
        assert!(parse("SELECT id FROM items").is_err());
        assert!(parse("SELECT * FROM items WHERE name = 'open").is_err());
        assert!(parse("SELECT * FROM items WHERE").is_err());
        assert!(parse("SELECT * FROM items extra").is_err());
    }

    #[test]
    fn test_filter_matches() {
        let schema = items();
        let row = vec![Value::Int32(1), Value::from("apple"), Value::Int32(5)];

        let terms = match parse("SELECT * FROM items WHERE qty > 4 AND name = 'apple'").unwrap() {
            Command::Select { filter, .. } => filter,
            _ => unreachable!(),
        };
        assert!(Filter::bind(&terms, &schema).unwrap().matches(&row));

        let terms = vec![Term::False];
        assert!(!Filter::bind(&terms, &schema).unwrap().matches(&row));
    }

    #[test]
    fn test_filter_null_never_matches() {
        let schema = items();
        let row = vec![Value::Int32(1), Value::Null, Value::Int32(5)];
        for text in ["name = NULL", "name <> 'x'", "qty <> NULL"] {
            let terms = match parse(&format!("SELECT * FROM items WHERE {}", text)).unwrap() {
                Command::Select { filter, .. } => filter,
                _ => unreachable!(),
            };
            assert!(!Filter::bind(&terms, &schema).unwrap().matches(&row), "{}", text);
        }
    }

    #[test]
    fn test_filter_bind_errors() {
        let schema = items();
        let unknown = vec![Term::Compare {
            column: "price".into(),
            op: CompareOp::Eq,
            literal: Some("1".into()),
        }];
        assert!(matches!(
            Filter::bind(&unknown, &schema),
            Err(Error::ColumnNotFound { .. })
        ));

        let mistyped = vec![Term::Compare {
            column: "qty".into(),
            op: CompareOp::Eq,
            literal: Some("lots".into()),
        }];
        assert!(matches!(
            Filter::bind(&mistyped, &schema),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
