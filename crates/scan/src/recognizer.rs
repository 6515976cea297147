use anyhow::Result;
use std::path::Path;
use std::rc::Rc;

use diag::DiagSink;
use lex::{Modifier, Scope, Token, TokenBuffer, TokenKind};

use crate::symbols::SymbolTable;
use crate::warn_token;

/* A very simplified bottom-up C recognizer built to find function
declarations and calls. A program is a series of statements of four
varieties: declarations, control statements, and expressions, with
typedefs folded into declarations. Control statements are detected by
their keyword; declarations by a type declarer as the first token;
everything else is an expression.

An unknown identifier followed by an open parenthesis is a function. As
the first identifier of a declaration statement it declares a function or
prototype, otherwise it is a call. Error-handling assumptions are biased
toward parsing something as a call, because reporting an extra call beats
suppressing a genuine one, and each assumption that can affect the results
produces a warning:
  1. Open braces (outside compound type bodies), semicolons (outside
     control arguments and compound type bodies), and control tokens start
     a new statement.
  2. In a declaration, a second identifier or a literal starts the initial
     value; the rest of the statement is treated as an expression.
  3. In expression statements, type symbols are assumed to be casts.
  4. Inside struct/union/enum bodies, types, operators, parentheses,
     identifiers, and semicolons belong to the declaration until the
     matching close brace. Any other symbol cuts the declaration off at
     the preceding separator.
  5. Parameter lists are tracked by counting parentheses. If the token
     after the list is not an open brace, the declaration is a prototype.
  6. Call argument lists that outlive their statement produce a warning.
  7. Control statements complete once the right number of semicolons has
     been seen. */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statement {
    Undetermined,
    Declaration,
    Expression,
    Control,
}

#[derive(Default)]
struct ParseStack(Vec<Token>);

impl ParseStack {
    fn push(&mut self, token: Token) {
        self.0.push(token);
    }

    fn pop(&mut self) -> Token {
        self.0.pop().unwrap_or_default()
    }

    // Pop until the wanted kind surfaces, then pop and return it.
    fn pop_till_kind(&mut self, kind: TokenKind) -> Token {
        while let Some(top) = self.0.last() {
            if top.kind == kind {
                break;
            }
            self.0.pop();
        }
        self.pop()
    }

    fn has_kind(&self, kind: TokenKind) -> bool {
        self.0.iter().any(|t| t.kind == kind)
    }

    fn last_kind(&self) -> TokenKind {
        self.0.last().map(|t| t.kind).unwrap_or(TokenKind::NoToken)
    }

    fn first(&self) -> Token {
        self.0.first().cloned().unwrap_or_default()
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

/// Statement-driven classifier that turns the token stream into function
/// tokens: declarations, prototypes, typedefs, calls, and references.
pub struct Recognizer {
    buffer: TokenBuffer,
    symbols: SymbolTable,
    stack: ParseStack,
    read_next: bool, // input must be reloaded before parsing
    curr: Token,
    funct: Token, // last found function token
    statement: Statement,
    brace_count: i32, // unmatched open braces
    sink: Rc<dyn DiagSink>,
}

impl Recognizer {
    pub fn new(sink: Rc<dyn DiagSink>) -> Self {
        Self {
            buffer: TokenBuffer::new(sink.clone()),
            symbols: SymbolTable::new(sink.clone()),
            stack: ParseStack::default(),
            read_next: true,
            curr: Token::none(),
            funct: Token::none(),
            statement: Statement::Undetermined,
            brace_count: 0,
            sink,
        }
    }

    fn init(&mut self) {
        self.read_next = true;
        self.curr = Token::none();
        self.funct = Token::none();
        self.statement = Statement::Undetermined;
        self.brace_count = 0;
        self.symbols.clear_global_names();
        self.new_statement();
    }

    /// Starts the recognizer on the named file.
    pub fn start(&mut self, path: &Path) -> Result<()> {
        self.init();
        self.buffer.start(path)?;
        self.find_next_function();
        Ok(())
    }

    /// Returns the cached function token and advances to the next one.
    pub fn next_function(&mut self) -> Token {
        let result = self.funct.clone();
        self.find_next_function();
        result
    }

    /// True when no more tokens exist and the cached token was returned.
    pub fn have_eof(&self) -> bool {
        self.buffer.have_eof() && self.funct.is_none()
    }

    /// Flushes the statement state. Any function call still on the stack
    /// never saw the end of its argument list.
    fn new_statement(&mut self) {
        while !self.stack.is_empty() {
            let call = self.stack.pop_till_kind(TokenKind::FunctCall);
            if !call.is_none() {
                warn_token(&*self.sink, &call, "Call of function ", " is incomplete");
            }
        }
        self.statement = Statement::Undetermined;
    }

    /// struct/union/enum: decide whether the compound introduces a
    /// declaration or is used as a type, and in the declaration case skim
    /// the body, which may contain nested compound declarations.
    fn proc_comb_type(&mut self) {
        let mut next = self.buffer.next_lookahead();
        let next2 = self.buffer.next_lookahead();

        /* Inside a control or expression statement the compound must be a
        type use. Otherwise it declares, signaled by `{`, with or without
        a tag. */
        if (next.kind != TokenKind::Identifier && next.kind != TokenKind::OpenBrace)
            || (next.kind == TokenKind::Identifier && next2.kind != TokenKind::OpenBrace)
            || self.statement == Statement::Expression
            || self.statement == Statement::Control
        {
            // Used as a type. With no tag, assume the programmer forgot it.
            if next.kind == TokenKind::Identifier {
                self.buffer.next_token(); // burn the tag
            }
            self.curr.kind = TokenKind::TypeName;
            return;
        }

        /* A declaration. Burn it while the tokens inside are legal; on an
        illegal token assume the declaration ended at the most recent
        separator and commit that much, which matters for the type tokens
        preceding a function. Compound types nest, so brace pairs are
        counted. */
        let mut read_next = if next.kind == TokenKind::Identifier {
            next = next2;
            true
        } else {
            false
        };
        let mut brace_count = 1i32;
        let mut paren_count = 0i32;
        while self.curr.kind == TokenKind::Compound {
            while !matches!(
                next.kind,
                TokenKind::CloseBrace
                    | TokenKind::Semicolon
                    | TokenKind::FunctCall
                    | TokenKind::Control
                    | TokenKind::Reserved
                    | TokenKind::Eof
            ) {
                next = if read_next {
                    self.buffer.next_lookahead()
                } else {
                    self.buffer.last_lookahead()
                };
                read_next = true;

                if next.kind == TokenKind::Identifier {
                    self.symbols.check_for_symbol(&mut next);
                }

                if next.kind == TokenKind::Compound {
                    let mut next2 = self.buffer.next_lookahead();
                    if next2.kind == TokenKind::Identifier {
                        next2 = self.buffer.next_lookahead();
                    }
                    if next2.kind == TokenKind::OpenBrace {
                        // an inner compound declaration
                        next = next2;
                        brace_count += 1;
                    } else {
                        next.kind = TokenKind::TypeName;
                        read_next = false; // not part of this declaration
                    }
                } else if next.kind == TokenKind::Identifier {
                    /* An identifier whose surrounding parentheses all
                    close, followed by an open paren, is a call. */
                    while self.buffer.next_lookahead().kind == TokenKind::CloseParen
                        && paren_count > 0
                    {
                        paren_count -= 1;
                    }
                    if self.buffer.last_lookahead().kind == TokenKind::OpenParen {
                        next.kind = TokenKind::FunctCall;
                    }
                    read_next = false;
                }

                // counted after identifiers, which consume the count
                if next.kind == TokenKind::OpenParen {
                    paren_count += 1;
                } else {
                    paren_count = 0;
                }
            }

            if matches!(next.kind, TokenKind::CloseBrace | TokenKind::Semicolon) {
                // Valid so far: burn the actual tokens.
                self.buffer.next_token(); // burn the previous separator
                while self.buffer.next_lookahead().kind != TokenKind::Semicolon
                    && self.buffer.last_lookahead().kind != TokenKind::CloseBrace
                {
                    self.buffer.next_token();
                }
                if next.kind == TokenKind::CloseBrace {
                    brace_count -= 1;
                    if brace_count <= 0 {
                        self.buffer.next_token(); // burn the closing brace
                        self.curr.kind = TokenKind::TypeName;
                    }
                }
                // the burn invalidated the lookahead
                next = Token::none();
            } else {
                // Early termination: read the separator so the statement
                // is dropped.
                self.curr = self.buffer.next_token();
                /* A close brace here really ends a complete inner struct
                declaration, which would need reprocessing. The case is
                never seen in practice, so rewrite it to a semicolon and
                keep the brace count (which drives scope) undisturbed. */
                if self.curr.kind == TokenKind::CloseBrace {
                    self.curr.kind = TokenKind::Semicolon;
                }
            }
        }
    }

    /// Processes the rest of a declaration statement, collecting declared
    /// variable and parameter names.
    fn proc_declaration(&mut self) {
        let mut decl_token = self.curr.clone();
        let mut var_names: Vec<Token> = Vec::new();
        let have_function;
        let mut inside_params;
        let mut paren_count;

        if self.buffer.last_lookahead().kind == TokenKind::OpenParen {
            have_function = true;
            inside_params = true;
            paren_count = 1i32;
            // burn the paren so it is not confused with argument parens
            self.buffer.next_token();
        } else {
            have_function = false;
            inside_params = false;
            paren_count = 0;
        }

        let mut cons_paren_count = 0i32;
        while self.statement == Statement::Declaration {
            self.curr = self.buffer.next_token();
            if self.curr.kind == TokenKind::Identifier {
                self.symbols.check_for_symbol(&mut self.curr);
            }
            if self.curr.kind == TokenKind::Compound {
                self.proc_comb_type();
            }
            match self.curr.kind {
                TokenKind::Identifier => {
                    // burn parentheses around the identifier
                    while self.buffer.next_lookahead().kind == TokenKind::CloseParen
                        && cons_paren_count > 0
                    {
                        self.buffer.next_token();
                        cons_paren_count -= 1;
                    }
                    if self.buffer.last_lookahead().kind == TokenKind::OpenParen {
                        /* A call: it terminates a function declaration
                        and starts the initial value of a variable. */
                        self.statement = Statement::Expression;
                    } else {
                        /* For functions this is a parameter name, for
                        variables another declared variable. K&R style
                        parameter declarations may sit outside the
                        parameter parentheses. */
                        self.curr.kind = TokenKind::VarName;
                        self.curr.scope = if have_function || self.brace_count > 0 {
                            Scope::Local
                        } else {
                            Scope::File
                        };
                        var_names.push(self.curr.clone());
                        // K&R declarations carry a semicolon to burn
                        if have_function
                            && !inside_params
                            && self.buffer.last_lookahead().kind == TokenKind::Semicolon
                        {
                            self.buffer.next_token();
                        }
                    }
                }
                TokenKind::OpenParen => {
                    paren_count += 1;
                }
                TokenKind::CloseParen => {
                    paren_count -= 1;
                    if inside_params && paren_count <= 0 {
                        inside_params = false;
                    }
                }
                TokenKind::TypedefKw | TokenKind::StaticKw => {
                    if !inside_params {
                        // modifier on the entire declaration
                        self.stack.push(self.curr.clone());
                    }
                }
                TokenKind::Ampersand | TokenKind::OtherSymbol => {
                    /* The initializer list begins here; for a function
                    declaration this is an error. */
                    if have_function {
                        self.statement = Statement::Undetermined;
                    } else {
                        self.statement = Statement::Expression;
                    }
                }
                TokenKind::TypeName | TokenKind::DeclSymbol => {}
                TokenKind::FieldAccess => {
                    // a dot inside the params is the varargs indicator
                    if !inside_params || self.curr.lexeme != "." {
                        self.statement = Statement::Undetermined;
                    }
                }
                _ => {
                    // token not allowed in declarations
                    self.statement = Statement::Undetermined;
                }
            }
            if self.curr.kind == TokenKind::OpenParen {
                cons_paren_count += 1;
            } else {
                cons_paren_count = 0;
            }
        }

        if have_function {
            let next = self.curr.clone();
            self.proc_funct_declaration(&mut decl_token, &next, inside_params);
        } else {
            // variable or type declaration
            decl_token.kind = if self.stack.has_kind(TokenKind::TypedefKw) {
                TokenKind::TypeName
            } else {
                TokenKind::VarName
            };
            decl_token.scope = if self.brace_count > 0 {
                Scope::Local
            } else {
                Scope::File
            };
            self.symbols.update_namespace(&decl_token);
        }

        /* Commit the collected names, unless they belong to a prototype's
        parameter list, which declares nothing. */
        if matches!(decl_token.kind, TokenKind::VarName | TokenKind::FunctDecl) {
            while let Some(name) = var_names.pop() {
                self.symbols.update_namespace(&name);
            }
        }
        self.read_next = false; // reprocess the token that ended this
    }

    /// Classifies a function-like declaration as typedef, declaration, or
    /// prototype, then commits it.
    fn proc_funct_declaration(&mut self, decl: &mut Token, next: &Token, inside_params: bool) {
        /* Typedefs of functions are legal but nearly unused; accept one
        only when it is completely legal to do so. */
        if self.stack.has_kind(TokenKind::TypedefKw)
            && !self.symbols.is_keyword(decl)
            && self.brace_count == 0
        {
            decl.kind = TokenKind::FunctTypedef;
        } else if next.kind == TokenKind::OpenBrace {
            decl.kind = TokenKind::FunctDecl;
        } else {
            decl.kind = TokenKind::FunctProto;
        }

        if inside_params
            || (decl.kind != TokenKind::FunctDecl && next.kind != TokenKind::Semicolon)
        {
            match decl.kind {
                TokenKind::FunctTypedef => {
                    warn_token(&*self.sink, decl, "Function type definition ", " is incomplete")
                }
                TokenKind::FunctDecl => {
                    warn_token(&*self.sink, decl, "Declaration of function ", " is incomplete")
                }
                _ => warn_token(&*self.sink, decl, "Prototype of function ", " is incomplete"),
            }
        }

        decl.scope = if self.stack.has_kind(TokenKind::StaticKw) {
            Scope::File
        } else {
            Scope::Global
        };

        if self.brace_count > 0 {
            if decl.kind == TokenKind::FunctDecl {
                warn_token(&*self.sink, decl, "Declaration of function ",
                    " occurs within another function");
            } else {
                warn_token(&*self.sink, decl, "Prototype of function ",
                    " occurs within another function");
            }
        }

        self.symbols.update_namespace(decl);

        if decl.kind == TokenKind::FunctDecl {
            self.funct = decl.clone();
        }
        self.stack.clear();
    }

    /// Scans forward until the next function token is found and cached,
    /// or the input runs out.
    fn find_next_function(&mut self) {
        let mut con_paren_count = 0i32; // consecutive open parens

        self.funct = Token::none();
        while self.funct.is_none() && !self.buffer.have_eof() {
            if self.read_next {
                self.curr = self.buffer.next_token();
            } else {
                self.read_next = true;
                self.buffer.reset_lookahead();
            }

            if self.curr.kind == TokenKind::Identifier {
                self.symbols.check_for_symbol(&mut self.curr);
            }

            if self.curr.kind == TokenKind::Compound {
                self.proc_comb_type();
            }

            match self.curr.kind {
                TokenKind::Ampersand => {
                    if self.stack.is_empty() || self.stack.last_kind() == TokenKind::OpenParen {
                        // reference operator
                        self.stack.push(self.curr.clone());
                    }
                    // else bitwise AND, or an error; ignore it
                }
                TokenKind::FieldAccess => {
                    if self.statement == Statement::Expression {
                        if self.stack.last_kind() == TokenKind::Ampersand {
                            // assume the struct name was left out
                            self.stack.pop();
                        }
                        self.stack.push(self.curr.clone());
                    }
                    // else the symbol is in error; ignore it
                }
                TokenKind::Semicolon => {
                    /* Either a new statement, or one part of a control
                    statement with multiple parts. The stack is cleared
                    before a control token is pushed, so it sits first. */
                    let held = if self.statement == Statement::Control {
                        self.stack.first()
                    } else {
                        Token::none()
                    };
                    self.new_statement();
                    if held.kind == TokenKind::Control && held.modifier != Modifier::OneArg {
                        self.statement = Statement::Control;
                        let mut control = held;
                        control.modifier = if control.modifier == Modifier::TwoArg {
                            Modifier::OneArg
                        } else {
                            Modifier::TwoArg
                        };
                        let pos = control.location.clone();
                        self.stack.push(control);
                        // replace the paren the flush popped; assuming it
                        // shares the control's line is close enough
                        self.stack.push(Token::new("(", pos, TokenKind::OpenParen));
                    }
                }
                TokenKind::OpenBrace => {
                    self.brace_count += 1;
                    self.new_statement();
                }
                TokenKind::CloseBrace => {
                    if self.brace_count == 1 {
                        // passing from local back to global scope
                        self.symbols.clear_local_names();
                    }
                    if self.brace_count > 0 {
                        self.brace_count -= 1;
                    }
                    self.new_statement();
                }
                TokenKind::OpenParen => {
                    // only expressions may open with a parenthesis
                    if self.statement == Statement::Undetermined && self.stack.is_empty() {
                        self.statement = Statement::Expression;
                    }
                    // declarations care only about the count
                    if self.statement != Statement::Declaration {
                        self.stack.push(self.curr.clone());
                    }
                    con_paren_count += 1;
                }
                TokenKind::CloseParen => {
                    if self.statement != Statement::Declaration {
                        self.stack.pop_till_kind(TokenKind::OpenParen);
                        // a call whose argument list just finished
                        if self.stack.last_kind() == TokenKind::FunctCall {
                            self.stack.pop();
                        }
                        // a control statement just finished
                        if self.stack.last_kind() == TokenKind::Control {
                            self.statement = Statement::Undetermined;
                            self.stack.pop();
                        }
                        if matches!(
                            self.stack.last_kind(),
                            TokenKind::Ampersand | TokenKind::FunctCall
                        ) {
                            self.stack.pop();
                        }
                    }
                }
                TokenKind::DeclSymbol | TokenKind::OtherSymbol => {
                    // in a declaration, assume it was inserted accidentally
                }
                TokenKind::Literal => {
                    if self.statement == Statement::Undetermined {
                        self.statement = Statement::Expression;
                    }
                }
                TokenKind::Identifier => {
                    // burn parentheses around the identifier
                    while self.buffer.next_lookahead().kind == TokenKind::CloseParen
                        && con_paren_count > 0
                    {
                        self.buffer.next_token();
                        con_paren_count -= 1;
                        if self.statement != Statement::Declaration {
                            self.stack.pop();
                        }
                    }
                    if self.statement == Statement::Declaration {
                        self.proc_declaration();
                    } else {
                        // use of a variable or function
                        let mut reference = false;
                        if self.buffer.last_lookahead().kind == TokenKind::OpenParen {
                            self.curr.kind = TokenKind::FunctCall;
                            // scope was set by the symbol lookup
                            if self.stack.last_kind() == TokenKind::Ampersand {
                                self.curr.modifier = Modifier::FuncRef;
                            }
                            if self.stack.last_kind() == TokenKind::FieldAccess {
                                warn_token(&*self.sink, &self.curr, "Function call ",
                                    " is an element of a structured type");
                            }
                        } else if self.stack.last_kind() == TokenKind::Ampersand
                            && self.symbols.is_function_name(&self.curr.lexeme)
                        {
                            // address of a known function: a reference
                            self.curr.kind = TokenKind::FunctCall;
                            self.curr.modifier = Modifier::FuncRef;
                            reference = true;
                        } else {
                            self.curr.kind = TokenKind::VarName;
                            self.curr.scope = if self.brace_count > 0 {
                                Scope::Local
                            } else {
                                Scope::File
                            };
                        }

                        self.symbols.update_namespace(&self.curr);

                        if matches!(
                            self.stack.last_kind(),
                            TokenKind::FieldAccess | TokenKind::Ampersand
                        ) {
                            self.stack.pop();
                        }
                        if self.statement == Statement::Undetermined {
                            self.statement = Statement::Expression;
                        }

                        if self.curr.kind == TokenKind::FunctCall {
                            if !reference {
                                // parse its arguments from the stack; the
                                // paren stays out of the consecutive count
                                self.stack.push(self.curr.clone());
                                let paren = self.buffer.next_token();
                                self.stack.push(paren);
                            }
                            self.funct = self.curr.clone();
                        }
                    }
                }
                TokenKind::TypedefKw | TokenKind::StaticKw => {
                    if self.statement == Statement::Undetermined {
                        self.statement = Statement::Declaration;
                    }
                    if self.statement == Statement::Declaration {
                        self.stack.push(self.curr.clone());
                    }
                }
                TokenKind::TypeName => {
                    if self.statement == Statement::Undetermined {
                        self.statement = Statement::Declaration;
                    }
                }
                TokenKind::FunctTypedef => {
                    /* A function declared through a previously defined
                    function type. Legal, nearly never seen. The next
                    token, ignoring parens, must be an identifier with a
                    matching close paren for every open one. */
                    let mut parens = 0i32;
                    while self.buffer.next_lookahead().kind == TokenKind::OpenParen {
                        parens += 1;
                    }
                    let mut name = self.buffer.last_lookahead();
                    self.symbols.check_for_symbol(&mut name);
                    if name.kind == TokenKind::Identifier {
                        while self.buffer.next_lookahead().kind == TokenKind::CloseParen
                            && parens > 0
                        {
                            parens -= 1;
                        }
                        if parens <= 0 {
                            // a real declaration: consume the parens and
                            // the declared name
                            let mut burned = 0i32;
                            self.curr = self.buffer.next_token();
                            while self.curr.kind == TokenKind::OpenParen {
                                burned += 1;
                                self.curr = self.buffer.next_token();
                            }
                            while burned > 0 {
                                self.buffer.next_token();
                                burned -= 1;
                            }
                            let mut decl = std::mem::take(&mut self.curr);
                            let next = self.buffer.next_lookahead();
                            self.proc_funct_declaration(&mut decl, &next, false);
                            self.curr = decl;
                        }
                    }
                }
                TokenKind::Control => {
                    self.new_statement();
                    self.statement = Statement::Control;
                    self.stack.push(self.curr.clone());
                    // if the next token is not a paren, assume it was
                    // left out
                    if self.buffer.next_lookahead().kind != TokenKind::OpenParen {
                        self.stack.push(Token::new(
                            "(",
                            self.curr.location.clone(),
                            TokenKind::OpenParen,
                        ));
                    }
                }
                TokenKind::Reserved => {
                    self.new_statement();
                }
                _ => {}
            }

            if self.buffer.have_eof() {
                // the last token was read while finding this function
                self.new_statement();
            }
            if self.curr.kind != TokenKind::OpenParen {
                con_paren_count = 0;
            }
        }
    }
}

impl Drop for Recognizer {
    fn drop(&mut self) {
        self.new_statement();
    }
}
