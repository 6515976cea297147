use std::collections::BTreeMap;
use std::rc::Rc;

use diag::DiagSink;
use lex::{Modifier, Scope, Token, TokenKind};

use crate::warn_token;

// Token kinds that name storage rather than functions.
fn have_var_token(token: &Token) -> bool {
    matches!(token.kind, TokenKind::VarName | TokenKind::TypeName)
}

// Token kinds that declare a user defined type.
fn have_type_token(token: &Token) -> bool {
    matches!(token.kind, TokenKind::TypeName | TokenKind::FunctTypedef)
}

/// The named symbol tables: C keywords, global/file scope names of the
/// current translation unit, and names local to the current function
/// body. Within each table lexemes are unique; across tables locals
/// shadow globals shadow keywords.
pub struct SymbolTable {
    keywords: BTreeMap<String, Token>,
    globals: BTreeMap<String, Token>,
    locals: BTreeMap<String, Token>,
    sink: Rc<dyn DiagSink>,
}

impl SymbolTable {
    pub fn new(sink: Rc<dyn DiagSink>) -> Self {
        let mut keywords = BTreeMap::new();
        let mut add = |lexeme: &str, kind: TokenKind, modifier: Modifier| {
            keywords.insert(lexeme.to_string(), Token::keyword(lexeme, kind, modifier));
        };
        add("auto", TokenKind::TypeName, Modifier::None);
        add("break", TokenKind::Reserved, Modifier::None);
        add("case", TokenKind::Reserved, Modifier::None);
        add("char", TokenKind::TypeName, Modifier::None);
        add("const", TokenKind::TypeName, Modifier::None);
        add("continue", TokenKind::Reserved, Modifier::None);
        add("default", TokenKind::Reserved, Modifier::None);
        add("do", TokenKind::Reserved, Modifier::None);
        add("double", TokenKind::TypeName, Modifier::None);
        add("else", TokenKind::Reserved, Modifier::None);
        add("enum", TokenKind::Compound, Modifier::None);
        add("extern", TokenKind::TypeName, Modifier::None);
        add("float", TokenKind::TypeName, Modifier::None);
        add("for", TokenKind::Control, Modifier::ThreeArg);
        add("goto", TokenKind::Reserved, Modifier::None);
        add("if", TokenKind::Control, Modifier::OneArg);
        add("int", TokenKind::TypeName, Modifier::None);
        add("long", TokenKind::TypeName, Modifier::None);
        add("register", TokenKind::TypeName, Modifier::None);
        add("return", TokenKind::Reserved, Modifier::None);
        add("short", TokenKind::TypeName, Modifier::None);
        add("signed", TokenKind::TypeName, Modifier::None);
        add("sizeof", TokenKind::Literal, Modifier::None); // close enough
        add("static", TokenKind::StaticKw, Modifier::None);
        add("struct", TokenKind::Compound, Modifier::None);
        add("switch", TokenKind::Control, Modifier::OneArg);
        add("typedef", TokenKind::TypedefKw, Modifier::None);
        add("union", TokenKind::Compound, Modifier::None);
        add("unsigned", TokenKind::TypeName, Modifier::None);
        add("void", TokenKind::TypeName, Modifier::None);
        add("volatile", TokenKind::TypeName, Modifier::None);
        add("while", TokenKind::Control, Modifier::OneArg);
        Self {
            keywords,
            globals: BTreeMap::new(),
            locals: BTreeMap::new(),
            sink,
        }
    }

    /// Clears the names local to the current function body.
    pub fn clear_local_names(&mut self) {
        self.locals.clear();
    }

    /// Clears every user defined name. A static prototype surviving to
    /// this point was never matched by a declaration, which is an error.
    pub fn clear_global_names(&mut self) {
        self.clear_local_names();
        for token in self.globals.values() {
            if token.kind == TokenKind::FunctProto && token.scope == Scope::File {
                warn_token(
                    &*self.sink,
                    token,
                    "Static prototype of ",
                    " has no matching declaration",
                );
            }
        }
        self.globals.clear();
    }

    /// If the identifier is a known name, rewrites the token's meaning in
    /// place from the keyword, local, or global tables, in that order.
    pub fn check_for_symbol(&self, token: &mut Token) {
        if token.kind != TokenKind::Identifier {
            return;
        }
        if let Some(keyword) = self.keywords.get(&token.lexeme) {
            token.set_meaning(keyword);
            return;
        }
        let mut local_var = false;
        if let Some(local) = self.locals.get(&token.lexeme) {
            if local.kind == TokenKind::TypeName {
                // locally defined typedef
                token.set_meaning(local);
                return;
            }
            local_var = true;
        }
        /* Local vars can shadow function names, and using such a name as
        a call is then an error. The bias is toward believing a call was
        intended, so scope information is fetched even when shadowed. */
        match self.globals.get(&token.lexeme) {
            None => token.scope = Scope::Unknown,
            Some(global) if have_type_token(global) => {
                if !local_var {
                    token.set_meaning(global);
                }
                // else it is shadowed; leave the token alone
            }
            Some(global) if !have_var_token(global) => {
                /* A static prototype is overridden by the scope of the
                actual declaration, so calls cannot be resolved against
                it yet. */
                if global.kind == TokenKind::FunctProto && global.scope == Scope::File {
                    token.scope = Scope::Unknown;
                } else {
                    token.scope = global.scope;
                }
            }
            Some(_) => {}
        }
    }

    /// True if the token is a keyword or any user defined non-variable
    /// name.
    pub fn is_keyword(&self, token: &Token) -> bool {
        if token.kind != TokenKind::Identifier {
            return matches!(
                token.kind,
                TokenKind::Literal
                    | TokenKind::FunctDecl
                    | TokenKind::FunctProto
                    | TokenKind::FunctCall
                    | TokenKind::FunctTypedef
                    | TokenKind::TypeName
                    | TokenKind::TypedefKw
                    | TokenKind::StaticKw
                    | TokenKind::Compound
                    | TokenKind::Control
                    | TokenKind::Reserved
            );
        }
        for table in [&self.keywords, &self.globals, &self.locals] {
            if let Some(found) = table.get(&token.lexeme) {
                if found.kind != TokenKind::VarName {
                    return true;
                }
            }
        }
        false
    }

    /// True if the name is currently known as a function at file or
    /// global scope.
    pub fn is_function_name(&self, lexeme: &str) -> bool {
        matches!(
            self.globals.get(lexeme).map(|t| t.kind),
            Some(TokenKind::FunctDecl | TokenKind::FunctProto | TokenKind::FunctCall)
        )
    }

    /// Commits a resolved token to the right table, reporting collisions
    /// and shadows that can affect the results. The branch order below is
    /// load-bearing; several cases overlap.
    pub fn update_namespace(&mut self, token: &Token) {
        let global = self.globals.get(&token.lexeme).cloned();
        let local = self.locals.get(&token.lexeme).cloned();
        let sink = self.sink.clone();

        if token.scope == Scope::Local {
            // updated if the symbol is new, or a typedef collided with a
            // variable name
            let update = match &local {
                None => true,
                Some(l) => l.kind == TokenKind::VarName && token.kind == TokenKind::TypeName,
            };
            if !update {
                return;
            }
            /* A collision with a global function is now a shadow.
            Shadowing by a type is worse than by a variable, because it is
            much harder to check whether the type name was meant to be
            used as a function. */
            if let Some(g) = &global {
                if !have_var_token(g) {
                    if token.kind == TokenKind::TypeName {
                        if g.kind == TokenKind::FunctTypedef {
                            warn_token(&*sink, token, "Declaration of type ",
                                " shadows function typedef with same name in outer scope");
                        } else {
                            warn_token(&*sink, token, "Declaration of type ",
                                " shadows function with same name in outer scope");
                        }
                    } else if g.kind == TokenKind::FunctTypedef {
                        warn_token(&*sink, token, "Local variable ",
                            " shadows function typedef with same name in outer scope");
                    } else {
                        warn_token(&*sink, token, "Local variable ",
                            " shadows function with same name in outer scope");
                    }
                }
            }
            self.locals.insert(token.lexeme.clone(), token.clone());
        } else if have_var_token(token) {
            // file or global scope variable or type
            match &global {
                None => {
                    self.globals.insert(token.lexeme.clone(), token.clone());
                }
                Some(g) if !have_var_token(g) => {
                    if g.kind == TokenKind::FunctTypedef {
                        if token.kind == TokenKind::VarName {
                            warn_token(&*sink, token, "Variable ",
                                " uses name previously used as typedef for function");
                        } else {
                            warn_token(&*sink, token, "Type declaration ",
                                " uses name previously used as typedef for function");
                        }
                    } else if token.kind == TokenKind::VarName {
                        warn_token(&*sink, token, "Variable ",
                            " uses name previously used as a function");
                    } else {
                        warn_token(&*sink, token, "Type declaration ",
                            " uses name previously used as a function");
                    }
                }
                Some(g) if g.kind == TokenKind::VarName && token.kind == TokenKind::TypeName => {
                    // a var colliding with a typedef loses to the typedef
                    self.globals.insert(token.lexeme.clone(), token.clone());
                }
                Some(_) => {}
            }
        } else {
            // function, prototype, call, or function typedef
            if let Some(l) = &local {
                /* An undeclared call, or a type ignored because of a
                shadow, is assumed to be misuse of the local symbol. */
                let misuse = global.as_ref().is_some_and(have_type_token)
                    || (token.kind == TokenKind::FunctCall
                        && global.as_ref().map_or(true, have_var_token));
                if misuse {
                    if token.kind == TokenKind::FunctTypedef {
                        warn_token(&*sink, token, "Typedef for function ",
                            " uses name previously used as a local variable");
                    } else {
                        warn_token(&*sink, token, "Function ",
                            " uses name previously used as a local variable");
                    }
                } else if global.as_ref().map_or(true, have_var_token) {
                    // the collision is a shadow; warn if it is new
                    if l.kind == TokenKind::TypeName {
                        if token.kind == TokenKind::FunctTypedef {
                            warn_token(&*sink, token, "Declaration of type ",
                                " shadows function typedef with same name in outer scope");
                        } else {
                            warn_token(&*sink, token, "Declaration of type ",
                                " shadows function with same name in outer scope");
                        }
                    } else if token.kind == TokenKind::FunctTypedef {
                        warn_token(&*sink, l, "Local variable ",
                            " shadows function typedef with same name in outer scope");
                    } else {
                        warn_token(&*sink, l, "Local variable ",
                            " shadows function with same name in outer scope");
                    }
                }
            }
            if token.kind == TokenKind::FunctCall {
                match &global {
                    Some(g) if have_type_token(g) => {
                        // call collides with a type: keep the type
                        if local.is_none() {
                            warn_token(&*sink, g, "Type declaration ",
                                " uses name previously used as a function");
                        }
                    }
                    g if g.is_none()
                        || !matches!(
                            g.as_ref().map(|t| t.kind),
                            Some(TokenKind::FunctProto | TokenKind::FunctDecl)
                        ) =>
                    {
                        warn_token(&*sink, token, "Function call ", " has no prototype");
                        match g {
                            None => {
                                self.globals.insert(token.lexeme.clone(), token.clone());
                            }
                            Some(g) if g.kind != TokenKind::FunctCall => {
                                // complain unless the symbol was shadowed
                                if local.is_none() {
                                    warn_token(&*sink, g, "Variable ",
                                        " uses name previously used as a function");
                                }
                                self.globals.insert(token.lexeme.clone(), token.clone());
                            }
                            Some(_) => {}
                        }
                    }
                    _ => {}
                }
            } else {
                // prototype, declaration, or function typedef
                let Some(g) = &global else {
                    self.globals.insert(token.lexeme.clone(), token.clone());
                    return;
                };
                if have_type_token(g) {
                    /* A function declared through a name that shadowed a
                    typedef would have to be declared in local scope,
                    which is almost certainly an error. Lose it. */
                    if local.is_none() {
                        if token.kind == TokenKind::FunctTypedef {
                            if g.kind == TokenKind::FunctTypedef {
                                warn_token(&*sink, token,
                                    "Duplicate declaration of function typedef ", "");
                            } else {
                                warn_token(&*sink, g, "Type declaration ",
                                    " uses name previously used as typedef for function");
                            }
                        } else {
                            warn_token(&*sink, g, "Type declaration ",
                                " uses name previously used as a function");
                        }
                    }
                } else if have_var_token(g) {
                    // function vs variable: believe the function
                    if token.kind == TokenKind::FunctTypedef {
                        warn_token(&*sink, g, "Variable ",
                            " uses name previously used as typedef for function");
                    } else {
                        warn_token(&*sink, g, "Variable ",
                            " uses name previously used as a function");
                    }
                    self.globals.insert(token.lexeme.clone(), token.clone());
                } else if token.kind == TokenKind::FunctTypedef {
                    // typedef vs declaration: believe the declaration
                    warn_token(&*sink, token, "Type declaration ",
                        " uses name previously used as a function");
                } else if g.kind == TokenKind::FunctCall {
                    // the declaration for a previously undeclared call
                    self.globals.insert(token.lexeme.clone(), token.clone());
                } else if token.kind == TokenKind::FunctProto {
                    if g.kind == TokenKind::FunctProto {
                        /* When scope narrows, calls resolved against the
                        earlier prototype may carry the wrong scope. */
                        if token.scope == Scope::File && g.scope == Scope::Global {
                            warn_token(&*sink, token, "Static function ",
                                "occurs after global prototype in same file.");
                            self.globals.insert(token.lexeme.clone(), token.clone());
                        } else {
                            warn_token(&*sink, token, "Duplicate prototype of ", "");
                        }
                    } else {
                        warn_token(&*sink, token, "Prototype for ", " occurs after declaration");
                    }
                } else if g.kind == TokenKind::FunctProto {
                    if token.scope == Scope::File && g.scope == Scope::Global {
                        warn_token(&*sink, token, "Static function ",
                            "occurs after global prototype in same file.");
                    }
                    self.globals.insert(token.lexeme.clone(), token.clone());
                } else if token.scope == g.scope {
                    warn_token(&*sink, token, "Duplicate declaration of ", "");
                } else {
                    warn_token(&*sink, token, "Duplicate declaration of ",
                        ", with different scope. File scope assumed.");
                    // file scope is the one wanted for calls in this file
                    if g.scope == Scope::Global {
                        self.globals.insert(token.lexeme.clone(), token.clone());
                    }
                }
            }
        }
    }
}

impl Drop for SymbolTable {
    fn drop(&mut self) {
        self.clear_global_names();
    }
}
