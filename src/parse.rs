//! Análisis sintáctico y generación de código.
//!
//! El [`Engine`] es un parser de descenso recursivo con un solo token de
//! lookahead: avanza, inspecciona y retrocede si la alternativa no es la
//! correcta. Hay un procedimiento por cada no-terminal de la gramática, y
//! cada uno emite instrucciones de máquina virtual a medida que consume
//! tokens. No se construye un árbol sintáctico intermedio.
//!
//! Los identificadores se resuelven contra la [`SymbolTable`] en el mismo
//! momento en que aparecen. El primer error detiene la compilación de la
//! clase completa, sin ningún intento de resincronización.

use std::{
    fmt::{self, Display},
    io::{self, Write},
};

use thiserror::Error;

use crate::{
    codegen::{runtime, Command, Segment, Writer},
    lex::{Identifier, Keyword, Symbol, Token, TokenStream, INT_MAX},
    source::{Located, Location},
    symbols::{Kind, SymbolTable, Type},
};

/// Construcción que el parser esperaba encontrar.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expected {
    Keyword(Keyword),
    Symbol(Symbol),
    Construct(&'static str),
}

impl Display for Expected {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Keyword(keyword) => write!(fmt, "`{}`", keyword),
            Expected::Symbol(symbol) => write!(fmt, "`{}`", symbol),
            Expected::Construct(construct) => fmt.write_str(construct),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {expected}, found {found}")]
    Expected { expected: Expected, found: Token },

    #[error("Expected {0}, found end of input")]
    UnexpectedEof(Expected),

    #[error("Expected end of input after class body, found {0}")]
    TrailingTokens(Token),

    #[error("Cannot call a subroutine on `{variable}` of primitive type `{typ}`")]
    InvalidCallTarget { variable: Identifier, typ: Type },

    #[error("Undeclared identifier `{0}`")]
    UndeclaredIdentifier(Identifier),

    #[error("`{0}` is already defined in this scope")]
    Redefinition(Identifier),

    #[error("Constant out of range: {0}")]
    ConstantOutOfRange(String),

    #[error("Failed to write VM output")]
    Output(#[from] io::Error),
}

pub type Compile<T> = Result<T, Located<ParserError>>;

/// Tipo de subrutina, que determina su prólogo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Subroutine {
    Constructor,
    Function,
    Method,
}

/// Motor de compilación para una única clase.
pub struct Engine<W: Write> {
    tokens: TokenStream,
    symbols: SymbolTable,
    output: Writer<W>,
    class: Identifier,
    labels: u32,
}

/// Compila una clase completa desde un flujo de tokens.
///
/// En caso de éxito se retorna el sink de salida, ya vaciado.
pub fn compile_class<W: Write>(tokens: TokenStream, output: W) -> Compile<W> {
    Engine::new(tokens, output).compile_class()
}

impl<W: Write> Engine<W> {
    pub fn new(tokens: TokenStream, output: W) -> Self {
        Engine {
            tokens,
            symbols: SymbolTable::new(),
            output: Writer::new(output),
            class: Identifier::from(""),
            labels: 0,
        }
    }

    /// `class` nombre `{` declaraciones* subrutinas* `}`
    pub fn compile_class(mut self) -> Compile<W> {
        self.keyword(Keyword::Class)?;
        self.class = self.identifier("class name")?.into_inner();
        log::debug!("Compiling class {}", self.class);

        self.symbol(Symbol::OpenCurly)?;
        while self.class_var_dec()? {}

        let class_scope = self.symbols.counts().filter(|&(kind, _)| kind.is_class_scope());
        for (kind, count) in class_scope {
            log::trace!("{}: {} {} variables", self.class, count, kind);
        }

        while self.subroutine()? {}
        self.symbol(Symbol::CloseCurly)?;

        if let Some(token) = self.tokens.advance() {
            let (location, token) = token.clone().split();
            return Err(Located::at(ParserError::TrailingTokens(token), location));
        }

        let location = self.tokens.end().clone();
        self.output
            .close()
            .map_err(|error| Located::at(ParserError::Output(error), location))
    }

    /// (`static` | `field`) tipo nombre (`,` nombre)* `;`
    fn class_var_dec(&mut self) -> Compile<bool> {
        let kind = match self.accept_keyword(&[Keyword::Static, Keyword::Field]) {
            Some(Keyword::Static) => Kind::Static,
            Some(_) => Kind::Field,
            None => return Ok(false),
        };

        let typ = self.typ()?;
        self.var_names(typ, kind)?;

        Ok(true)
    }

    /// (`constructor` | `function` | `method`) (`void` | tipo) nombre
    /// `(` parámetros `)` cuerpo
    fn subroutine(&mut self) -> Compile<bool> {
        let keywords = [Keyword::Constructor, Keyword::Function, Keyword::Method];
        let subroutine = match self.accept_keyword(&keywords) {
            Some(Keyword::Constructor) => Subroutine::Constructor,
            Some(Keyword::Function) => Subroutine::Function,
            Some(_) => Subroutine::Method,
            None => return Ok(false),
        };

        self.symbols.start_subroutine();
        if subroutine == Subroutine::Method {
            let receiver = Type::Class(self.class.clone());
            self.symbols
                .define(Identifier::from("this"), receiver, Kind::Parameter);
        }

        if self.accept_keyword(&[Keyword::Void]).is_none() {
            self.typ()?;
        }

        let name = self.identifier("subroutine name")?.into_inner();
        let function = format!("{}.{}", self.class, name);
        log::debug!("Compiling {:?} {}", subroutine, function);

        self.symbol(Symbol::OpenParen)?;
        self.parameter_list()?;
        self.symbol(Symbol::CloseParen)?;

        self.symbol(Symbol::OpenCurly)?;
        while self.var_dec()? {}

        let locals = self.symbols.var_count(Kind::Local);
        self.emit(|out| out.function(&function, locals))?;

        match subroutine {
            Subroutine::Method => self.emit(|out| {
                out.push(Segment::Argument, 0)?;
                out.pop(Segment::Pointer, 0)
            })?,

            Subroutine::Constructor => {
                let fields = self.symbols.var_count(Kind::Field);
                self.emit(|out| {
                    out.push(Segment::Constant, fields)?;
                    out.call(runtime::ALLOC, 1)?;
                    out.pop(Segment::Pointer, 0)
                })?
            }

            Subroutine::Function => (),
        }

        self.statements()?;
        self.symbol(Symbol::CloseCurly)?;

        Ok(true)
    }

    /// ((tipo nombre) (`,` tipo nombre)*)?
    fn parameter_list(&mut self) -> Compile<()> {
        if self.next_is(Symbol::CloseParen) {
            return Ok(());
        }

        loop {
            let typ = self.typ()?;
            let name = self.identifier("parameter name")?;
            self.declare(name, typ, Kind::Parameter)?;

            if !self.accept(Symbol::Comma) {
                break Ok(());
            }
        }
    }

    /// `var` tipo nombre (`,` nombre)* `;`
    fn var_dec(&mut self) -> Compile<bool> {
        if self.accept_keyword(&[Keyword::Var]).is_none() {
            return Ok(false);
        }

        let typ = self.typ()?;
        self.var_names(typ, Kind::Local)?;

        Ok(true)
    }

    fn var_names(&mut self, typ: Type, kind: Kind) -> Compile<()> {
        loop {
            let name = self.identifier("variable name")?;
            self.declare(name, typ.clone(), kind)?;

            if !self.accept(Symbol::Comma) {
                break self.symbol(Symbol::Semicolon);
            }
        }
    }

    fn declare(&mut self, name: Located<Identifier>, typ: Type, kind: Kind) -> Compile<()> {
        let (location, name) = name.split();
        if self.symbols.declares(name.as_ref(), kind) {
            return Err(Located::at(ParserError::Redefinition(name), location));
        }

        match self.symbols.define(name, typ, kind) {
            Some(_) => Ok(()),
            None => {
                let what = format!("more than {} {} variables", INT_MAX, kind);
                Err(Located::at(ParserError::ConstantOutOfRange(what), location))
            }
        }
    }

    /// `int` | `char` | `boolean` | nombre de clase
    fn typ(&mut self) -> Compile<Type> {
        let expected = Expected::Construct("type");
        let typ = match self.next(expected)?.into_inner() {
            Token::Keyword(Keyword::Int) => Type::Int,
            Token::Keyword(Keyword::Char) => Type::Char,
            Token::Keyword(Keyword::Boolean) => Type::Boolean,
            Token::Id(class) => Type::Class(class),
            found => return self.fail(ParserError::Expected { expected, found }),
        };

        Ok(typ)
    }

    /// Secuencia de sentencias, terminada por `}`.
    fn statements(&mut self) -> Compile<()> {
        loop {
            let expected = Expected::Construct("statement or `}`");
            match self.next(expected)?.into_inner() {
                Token::Keyword(Keyword::Let) => self.let_statement()?,
                Token::Keyword(Keyword::If) => self.if_statement()?,
                Token::Keyword(Keyword::While) => self.while_statement()?,
                Token::Keyword(Keyword::Do) => self.do_statement()?,
                Token::Keyword(Keyword::Return) => self.return_statement()?,

                Token::Symbol(Symbol::CloseCurly) => {
                    self.tokens.retreat();
                    break Ok(());
                }

                found => break self.fail(ParserError::Expected { expected, found }),
            }
        }
    }

    /// `let` nombre (`[` expresión `]`)? `=` expresión `;`
    fn let_statement(&mut self) -> Compile<()> {
        let name = self.identifier("variable name")?;
        let (segment, index) = self.resolve(&name)?;

        if self.accept(Symbol::OpenSquare) {
            self.emit(|out| out.push(segment, index))?;
            self.expression()?;
            self.symbol(Symbol::CloseSquare)?;
            self.emit(|out| out.arithmetic(Command::Add))?;

            self.symbol(Symbol::Equal)?;
            self.expression()?;
            self.symbol(Symbol::Semicolon)?;

            // `that` se redirige solo hasta después de evaluar el lado
            // derecho, que puede a su vez acceder a otros arreglos
            self.emit(|out| {
                out.pop(Segment::Temp, 0)?;
                out.pop(Segment::Pointer, 1)?;
                out.push(Segment::Temp, 0)?;
                out.pop(Segment::That, 0)
            })
        } else {
            self.symbol(Symbol::Equal)?;
            self.expression()?;
            self.symbol(Symbol::Semicolon)?;

            self.emit(|out| out.pop(segment, index))
        }
    }

    /// `if` `(` expresión `)` `{` sentencias `}` (`else` `{` sentencias `}`)?
    fn if_statement(&mut self) -> Compile<()> {
        let label = self.next_label();
        let else_label = format!("IF_ELSE{}", label);
        let end_label = format!("IF_END{}", label);

        self.condition()?;
        self.emit(|out| {
            out.arithmetic(Command::Not)?;
            out.if_goto(&else_label)
        })?;

        self.block()?;
        self.emit(|out| {
            out.goto(&end_label)?;
            out.label(&else_label)
        })?;

        if self.accept_keyword(&[Keyword::Else]).is_some() {
            self.block()?;
        }

        self.emit(|out| out.label(&end_label))
    }

    /// `while` `(` expresión `)` `{` sentencias `}`
    fn while_statement(&mut self) -> Compile<()> {
        let label = self.next_label();
        let top_label = format!("WHILE_TOP{}", label);
        let end_label = format!("WHILE_END{}", label);

        self.emit(|out| out.label(&top_label))?;
        self.condition()?;
        self.emit(|out| {
            out.arithmetic(Command::Not)?;
            out.if_goto(&end_label)
        })?;

        self.block()?;
        self.emit(|out| {
            out.goto(&top_label)?;
            out.label(&end_label)
        })
    }

    /// `do` llamada `;`
    fn do_statement(&mut self) -> Compile<()> {
        let name = self.identifier("subroutine or variable name")?;
        self.subroutine_call(name)?;
        self.symbol(Symbol::Semicolon)?;

        // Toda llamada deja un valor, aunque la subrutina sea `void`
        self.emit(|out| out.pop(Segment::Temp, 0))
    }

    /// `return` expresión? `;`
    fn return_statement(&mut self) -> Compile<()> {
        if self.accept(Symbol::Semicolon) {
            self.emit(|out| out.push(Segment::Constant, 0))?;
        } else {
            self.expression()?;
            self.symbol(Symbol::Semicolon)?;
        }

        self.emit(|out| out.ret())
    }

    fn condition(&mut self) -> Compile<()> {
        self.symbol(Symbol::OpenParen)?;
        self.expression()?;
        self.symbol(Symbol::CloseParen)
    }

    fn block(&mut self) -> Compile<()> {
        self.symbol(Symbol::OpenCurly)?;
        self.statements()?;
        self.symbol(Symbol::CloseCurly)
    }

    /// término (operador término)*
    ///
    /// Los operadores se aplican estrictamente de izquierda a derecha,
    /// sin niveles de precedencia.
    fn expression(&mut self) -> Compile<()> {
        self.term()?;

        loop {
            let operator = match self.tokens.advance().map(|token| token.val().symbol()) {
                Some(Some(symbol)) if is_binary_operator(symbol) => symbol,
                Some(_) => {
                    self.tokens.retreat();
                    break Ok(());
                }
                None => break Ok(()),
            };

            self.term()?;
            self.emit(|out| match operator {
                Symbol::Plus => out.arithmetic(Command::Add),
                Symbol::Minus => out.arithmetic(Command::Sub),
                Symbol::Less => out.arithmetic(Command::Lt),
                Symbol::Greater => out.arithmetic(Command::Gt),
                Symbol::Equal => out.arithmetic(Command::Eq),
                Symbol::And => out.arithmetic(Command::And),
                Symbol::Or => out.arithmetic(Command::Or),
                Symbol::Times => out.call(runtime::MULTIPLY, 2),
                _ => out.call(runtime::DIVIDE, 2),
            })?;
        }
    }

    fn term(&mut self) -> Compile<()> {
        let expected = Expected::Construct("term");
        let (location, token) = self.next(expected)?.split();

        match token {
            Token::IntConst(integer) => self.emit(|out| out.push(Segment::Constant, integer)),
            Token::StrConst(string) => self.string_constant(&string, location),

            Token::Keyword(Keyword::True) => self.emit(|out| {
                out.push(Segment::Constant, 0)?;
                out.arithmetic(Command::Not)
            }),

            Token::Keyword(Keyword::False) | Token::Keyword(Keyword::Null) => {
                self.emit(|out| out.push(Segment::Constant, 0))
            }

            Token::Keyword(Keyword::This) => self.emit(|out| out.push(Segment::Pointer, 0)),

            Token::Symbol(Symbol::OpenParen) => {
                self.expression()?;
                self.symbol(Symbol::CloseParen)
            }

            Token::Symbol(Symbol::Minus) => {
                self.term()?;
                self.emit(|out| out.arithmetic(Command::Neg))
            }

            Token::Symbol(Symbol::Tilde) => {
                self.term()?;
                self.emit(|out| out.arithmetic(Command::Not))
            }

            Token::Id(id) => self.identifier_term(Located::at(id, location)),

            found => self.fail(ParserError::Expected { expected, found }),
        }
    }

    /// Variable, acceso indexado o llamada a subrutina.
    fn identifier_term(&mut self, name: Located<Identifier>) -> Compile<()> {
        match self.tokens.peek().map(|token| token.val().symbol()) {
            Some(Some(Symbol::OpenSquare)) => {
                let (segment, index) = self.resolve(&name)?;
                self.symbol(Symbol::OpenSquare)?;

                self.emit(|out| out.push(segment, index))?;
                self.expression()?;
                self.symbol(Symbol::CloseSquare)?;

                self.emit(|out| {
                    out.arithmetic(Command::Add)?;
                    out.pop(Segment::Pointer, 1)?;
                    out.push(Segment::That, 0)
                })
            }

            Some(Some(Symbol::OpenParen)) | Some(Some(Symbol::Period)) => {
                self.subroutine_call(name)
            }

            _ => {
                let (segment, index) = self.resolve(&name)?;
                self.emit(|out| out.push(segment, index))
            }
        }
    }

    /// nombre `(` argumentos `)` | prefijo `.` nombre `(` argumentos `)`
    ///
    /// El primer identificador ya fue consumido por el llamador.
    fn subroutine_call(&mut self, name: Located<Identifier>) -> Compile<()> {
        let expected = Expected::Construct("`(` or `.`");
        let (function, receiver) = match self.next(expected)?.into_inner() {
            // Llamada implícita sobre el objeto actual
            Token::Symbol(Symbol::OpenParen) => {
                self.tokens.retreat();
                self.emit(|out| out.push(Segment::Pointer, 0))?;

                (format!("{}.{}", self.class, name.val()), 1)
            }

            Token::Symbol(Symbol::Period) => {
                let method = self.identifier("subroutine name")?.into_inner();

                match self.symbols.lookup(name.val().as_ref()).cloned() {
                    Some(symbol) if symbol.typ.is_primitive() => {
                        let (location, variable) = name.split();
                        let error = ParserError::InvalidCallTarget {
                            variable,
                            typ: symbol.typ,
                        };

                        return Err(Located::at(error, location));
                    }

                    // Método sobre un objeto declarado
                    Some(symbol) => {
                        let segment = segment_of(symbol.kind);
                        self.emit(|out| out.push(segment, symbol.index))?;

                        (format!("{}.{}", symbol.typ, method), 1)
                    }

                    // En otro caso el prefijo es un nombre de clase
                    None => (format!("{}.{}", name.val(), method), 0),
                }
            }

            found => return self.fail(ParserError::Expected { expected, found }),
        };

        self.symbol(Symbol::OpenParen)?;
        let arguments = self.expression_list()?;
        self.symbol(Symbol::CloseParen)?;

        let arguments = match checked_count(arguments, receiver) {
            Some(arguments) => arguments,
            None => return self.fail(too_many_arguments()),
        };

        self.emit(|out| out.call(&function, arguments))
    }

    /// (expresión (`,` expresión)*)?
    fn expression_list(&mut self) -> Compile<u16> {
        if self.next_is(Symbol::CloseParen) {
            return Ok(0);
        }

        let mut count = 1;
        self.expression()?;

        while self.accept(Symbol::Comma) {
            count = match checked_count(count, 1) {
                Some(count) => count,
                None => return self.fail(too_many_arguments()),
            };

            self.expression()?;
        }

        Ok(count)
    }

    /// Texto literal: `String.new` seguido de un `String.appendChar`
    /// por cada carácter, dejando la referencia en el tope de la pila.
    fn string_constant(&mut self, string: &str, location: Location) -> Compile<()> {
        let out_of_range = |what: String| {
            Located::at(ParserError::ConstantOutOfRange(what), location.clone())
        };

        let count = string.chars().count();
        let length = u16::try_from(count)
            .ok()
            .filter(|&length| length <= INT_MAX)
            .ok_or_else(|| out_of_range(format!("string literal of {} characters", count)))?;

        let codes = string
            .chars()
            .map(|c| {
                u16::try_from(u32::from(c))
                    .ok()
                    .filter(|&code| code <= INT_MAX)
                    .ok_or_else(|| out_of_range(format!("character {:?}", c)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.emit(|out| {
            out.push(Segment::Constant, length)?;
            out.call(runtime::STRING_NEW, 1)?;

            for &code in &codes {
                out.push(Segment::Constant, code)?;
                out.call(runtime::APPEND_CHAR, 2)?;
            }

            Ok(())
        })
    }

    /// Resuelve una variable a su segmento e índice.
    fn resolve(&self, name: &Located<Identifier>) -> Compile<(Segment, u16)> {
        match self.symbols.lookup(name.val().as_ref()) {
            Some(symbol) => Ok((segment_of(symbol.kind), symbol.index)),
            None => Err(Located::at(
                ParserError::UndeclaredIdentifier(name.val().clone()),
                name.location().clone(),
            )),
        }
    }

    fn next_label(&mut self) -> u32 {
        let label = self.labels;
        self.labels += 1;
        label
    }

    /// Ejecuta una secuencia de escrituras, ubicando cualquier error de
    /// E/S en el token actual.
    fn emit<F>(&mut self, write: F) -> Compile<()>
    where
        F: FnOnce(&mut Writer<W>) -> io::Result<()>,
    {
        match write(&mut self.output) {
            Ok(()) => Ok(()),
            Err(error) => self.fail(error.into()),
        }
    }

    fn identifier(&mut self, what: &'static str) -> Compile<Located<Identifier>> {
        let expected = Expected::Construct(what);
        let (location, token) = self.next(expected)?.split();

        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            found => self.fail(ParserError::Expected { expected, found }),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Compile<()> {
        let expected = Expected::Keyword(keyword);
        match self.next(expected)?.into_inner() {
            Token::Keyword(found) if found == keyword => Ok(()),
            found => self.fail(ParserError::Expected { expected, found }),
        }
    }

    fn symbol(&mut self, symbol: Symbol) -> Compile<()> {
        let expected = Expected::Symbol(symbol);
        match self.next(expected)?.into_inner() {
            Token::Symbol(found) if found == symbol => Ok(()),
            found => self.fail(ParserError::Expected { expected, found }),
        }
    }

    /// Consume el siguiente token solo si es el símbolo dado.
    fn accept(&mut self, symbol: Symbol) -> bool {
        let matched = self.next_is(symbol);
        if matched {
            self.tokens.advance();
        }

        matched
    }

    /// Consume el siguiente token solo si es alguna de las palabras clave.
    fn accept_keyword(&mut self, keywords: &[Keyword]) -> Option<Keyword> {
        match self.tokens.advance().map(|token| token.val().keyword()) {
            Some(Some(keyword)) if keywords.contains(&keyword) => Some(keyword),
            Some(_) => {
                self.tokens.retreat();
                None
            }

            None => None,
        }
    }

    fn next_is(&self, symbol: Symbol) -> bool {
        self.tokens
            .peek()
            .map_or(false, |token| token.val() == &Token::Symbol(symbol))
    }

    fn next(&mut self, expected: Expected) -> Compile<Located<Token>> {
        match self.tokens.advance() {
            Some(token) => Ok(token.clone()),
            None => Err(Located::at(
                ParserError::UnexpectedEof(expected),
                self.tokens.end().clone(),
            )),
        }
    }

    /// Falla en la ubicación del token actual.
    fn fail<T>(&self, error: ParserError) -> Compile<T> {
        let location = match self.tokens.current() {
            Some(token) => token.location().clone(),
            None => self.tokens.end().clone(),
        };

        Err(Located::at(error, location))
    }
}

/// Suma de contadores que debe caber en el rango de constantes.
fn checked_count(count: u16, more: u16) -> Option<u16> {
    count.checked_add(more).filter(|&count| count <= INT_MAX)
}

fn too_many_arguments() -> ParserError {
    ParserError::ConstantOutOfRange(format!("more than {} call arguments", INT_MAX))
}

fn is_binary_operator(symbol: Symbol) -> bool {
    use Symbol::*;
    matches!(
        symbol,
        Plus | Minus | Times | Slash | And | Or | Less | Greater | Equal
    )
}

fn segment_of(kind: Kind) -> Segment {
    match kind {
        Kind::Static => Segment::Static,
        Kind::Field => Segment::This,
        Kind::Parameter => Segment::Argument,
        Kind::Local => Segment::Local,
    }
}
