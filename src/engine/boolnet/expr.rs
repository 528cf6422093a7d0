//! Boolean update rules
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or     := xor  (("|" | "||" | "OR")  xor)*
//! xor    := and  (("^" | "XOR")        and)*
//! and    := unary (("&" | "&&" | "AND") unary)*
//! unary  := ("!" | "NOT")* atom
//! atom   := NAME | "TRUE" | "FALSE" | "(" or ")"
//! ```
//!
//! Operator chains compile to flat operand lists and negations collapse
//! by parity, so tree depth only grows with parenthesis nesting, which is
//! capped at [`MAX_DEPTH`].

/// Maximum parenthesis nesting in one rule
pub const MAX_DEPTH: usize = 256;

/// A compiled update rule; node references are state bit indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Const(bool),
    Node(usize),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Xor(Vec<Expr>),
}

impl Expr {
    /// Evaluate against a state bitset
    pub fn eval(&self, state: u64) -> bool {
        match self {
            Expr::Const(b) => *b,
            Expr::Node(i) => (state >> i) & 1 == 1,
            Expr::Not(e) => !e.eval(state),
            Expr::And(terms) => terms.iter().all(|e| e.eval(state)),
            Expr::Or(terms) => terms.iter().any(|e| e.eval(state)),
            Expr::Xor(terms) => terms.iter().fold(false, |acc, e| acc ^ e.eval(state)),
        }
    }

    /// Disjunction, appended to `self` when it already is one
    pub fn or(self, other: Expr) -> Expr {
        match self {
            Expr::Or(mut terms) => {
                terms.push(other);
                Expr::Or(terms)
            }
            lhs => Expr::Or(vec![lhs, other]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    True,
    False,
    Not,
    And,
    Or,
    Xor,
    LParen,
    RParen,
}

/// Whether `s` is a valid node name
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if !(c.is_ascii_alphanumeric() || c == '_') {
                    break;
                }
                end = i + c.len_utf8();
                chars.next();
            }
            tokens.push(match &text[start..end] {
                "TRUE" => Token::True,
                "FALSE" => Token::False,
                "NOT" => Token::Not,
                "AND" => Token::And,
                "OR" => Token::Or,
                "XOR" => Token::Xor,
                name => Token::Name(name.to_string()),
            });
            continue;
        }

        chars.next();
        let token = match c {
            '!' => Token::Not,
            '^' => Token::Xor,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '&' | '|' => {
                // `&&` and `||` are the same operators
                if chars.peek().map(|&(_, n)| n) == Some(c) {
                    chars.next();
                }
                if c == '&' {
                    Token::And
                } else {
                    Token::Or
                }
            }
            other => return Err(format!("unexpected character {:?}", other)),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

/// Parse `text`, mapping node names through `resolve`
pub fn parse_expr(text: &str, resolve: &dyn Fn(&str) -> Option<usize>) -> Result<Expr, String> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        resolve,
    };
    let expr = parser.or()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some(token) => Err(format!("unexpected {:?} after expression", token)),
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,

    /// Open parentheses around the current position
    depth: usize,

    resolve: &'a dyn Fn(&str) -> Option<usize>,
}

impl Parser<'_> {
    fn eat(&mut self, token: &Token) -> bool {
        if self.tokens.get(self.pos) == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Parse `operand (op operand)*` into a flat list
    fn chain(
        &mut self,
        op: &Token,
        operand: fn(&mut Self) -> Result<Expr, String>,
        build: fn(Vec<Expr>) -> Expr,
    ) -> Result<Expr, String> {
        let mut terms = vec![operand(self)?];
        while self.eat(op) {
            terms.push(operand(self)?);
        }
        Ok(if terms.len() == 1 {
            terms.swap_remove(0)
        } else {
            build(terms)
        })
    }

    fn or(&mut self) -> Result<Expr, String> {
        self.chain(&Token::Or, Self::xor, Expr::Or)
    }

    fn xor(&mut self) -> Result<Expr, String> {
        self.chain(&Token::Xor, Self::and, Expr::Xor)
    }

    fn and(&mut self) -> Result<Expr, String> {
        self.chain(&Token::And, Self::unary, Expr::And)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        let mut negated = false;
        while self.eat(&Token::Not) {
            negated = !negated;
        }
        let atom = self.atom()?;
        Ok(if negated {
            Expr::Not(Box::new(atom))
        } else {
            atom
        })
    }

    fn atom(&mut self) -> Result<Expr, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "unexpected end of expression".to_string())?;
        self.pos += 1;

        match token {
            Token::True => Ok(Expr::Const(true)),
            Token::False => Ok(Expr::Const(false)),
            Token::Name(name) => (self.resolve)(&name)
                .map(Expr::Node)
                .ok_or_else(|| format!("undefined node {}", name)),
            Token::LParen => {
                if self.depth >= MAX_DEPTH {
                    return Err(format!(
                        "expression nested too deeply (more than {} levels)",
                        MAX_DEPTH
                    ));
                }
                self.depth += 1;
                let inner = self.or()?;
                self.depth -= 1;
                if self.eat(&Token::RParen) {
                    Ok(inner)
                } else {
                    Err("missing closing parenthesis".to_string())
                }
            }
            other => Err(format!("unexpected {:?}", other)),
        }
    }
}
