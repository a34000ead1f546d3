//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto de una
//! [`Source`] en unidades léxicas denominadas tokens. Los espacios en
//! blanco y los comentarios (`// ...`, `/* ... */` y `/** ... */`) se
//! descartan durante esta misma pasada, por lo cual los delimitadores de
//! comentario que aparecen dentro de una constante de texto nunca se
//! alteran. Cada token emitido está asociado a una ubicación en el código
//! fuente original.
//!
//! # Categorías
//! Un lexema se clasifica, en orden de prioridad, como palabra clave,
//! símbolo, constante entera, constante de texto o identificador. Las
//! palabras clave solo se reconocen sobre términos completos, de modo que
//! `classy` es un identificador.
//!
//! # Errores
//! A diferencia de fases posteriores, el lexer no intenta recuperarse:
//! el primer error léxico detiene el análisis de la unidad completa.

use crate::source::{Located, Location, Position, Source};
use std::{
    fmt::{self, Display},
    iter::Peekable,
    rc::Rc,
    str::{Chars, FromStr},
};

use thiserror::Error;

/// Literal entero máximo.
pub const INT_MAX: u16 = 32767;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {}]", INT_MAX)]
    IntOverflow,

    /// Una constante de texto no se cerró antes del fin de línea.
    #[error("Unterminated string literal")]
    UnterminatedString,

    /// Un comentario de bloque no se cerró antes del fin de la entrada.
    #[error("Unterminated block comment")]
    UnterminatedComment,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Objeto resultante del análisis léxico.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Palabra clave.
    Keyword(Keyword),

    /// Puntuación u operador.
    Symbol(Symbol),

    /// Literal de entero.
    IntConst(u16),

    /// Literal de texto, sin comillas ni procesamiento de escapes.
    StrConst(String),

    /// Identificador.
    Id(Identifier),
}

impl Token {
    pub fn keyword(&self) -> Option<Keyword> {
        match self {
            Token::Keyword(keyword) => Some(*keyword),
            _ => None,
        }
    }

    pub fn symbol(&self) -> Option<Symbol> {
        match self {
            Token::Symbol(symbol) => Some(*symbol),
            _ => None,
        }
    }

    pub fn identifier(&self) -> Option<&Identifier> {
        match self {
            Token::Id(id) => Some(id),
            _ => None,
        }
    }

    pub fn int_val(&self) -> Option<u16> {
        match self {
            Token::IntConst(integer) => Some(*integer),
            _ => None,
        }
    }

    pub fn string_val(&self) -> Option<&str> {
        match self {
            Token::StrConst(string) => Some(string),
            _ => None,
        }
    }

    /// Reconstruye el texto original del token.
    pub fn lexeme(&self) -> String {
        match self {
            Token::Keyword(keyword) => keyword.to_string(),
            Token::Symbol(symbol) => symbol.to_string(),
            Token::IntConst(integer) => integer.to_string(),
            Token::StrConst(string) => format!("\"{}\"", string),
            Token::Id(id) => id.to_string(),
        }
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            Symbol(symbol) => write!(fmt, "symbol `{}`", symbol),
            IntConst(integer) => write!(fmt, "integer `{}`", integer),
            StrConst(string) => write!(fmt, "string \"{}\"", string),
            Id(id) => write!(fmt, "identifier `{}`", id),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Class,
    Constructor,
    Function,
    Method,
    Field,
    Static,
    Var,
    Int,
    Char,
    Boolean,
    Void,
    True,
    False,
    Null,
    This,
    Let,
    Do,
    If,
    Else,
    While,
    Return,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("class",       Keyword::Class),
    ("constructor", Keyword::Constructor),
    ("function",    Keyword::Function),
    ("method",      Keyword::Method),
    ("field",       Keyword::Field),
    ("static",      Keyword::Static),
    ("var",         Keyword::Var),
    ("int",         Keyword::Int),
    ("char",        Keyword::Char),
    ("boolean",     Keyword::Boolean),
    ("void",        Keyword::Void),
    ("true",        Keyword::True),
    ("false",       Keyword::False),
    ("null",        Keyword::Null),
    ("this",        Keyword::This),
    ("let",         Keyword::Let),
    ("do",          Keyword::Do),
    ("if",          Keyword::If),
    ("else",        Keyword::Else),
    ("while",       Keyword::While),
    ("return",      Keyword::Return),
];

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = KEYWORDS
            .iter()
            .find(|&&(_, keyword)| keyword == *self)
            .map_or("?", |&(name, _)| name);

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Puntuación y operadores.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Symbol {
    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `[`
    OpenSquare,

    /// `]`
    CloseSquare,

    /// `.`
    Period,

    /// `,`
    Comma,

    /// `;`
    Semicolon,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `&`
    And,

    /// `|`
    Or,

    /// `<`
    Less,

    /// `>`
    Greater,

    /// `=`
    Equal,

    /// `~`
    Tilde,
}

impl Symbol {
    /// Clasifica un carácter de puntuación.
    pub fn from_char(c: char) -> Option<Self> {
        use Symbol::*;

        let symbol = match c {
            '{' => OpenCurly,
            '}' => CloseCurly,
            '(' => OpenParen,
            ')' => CloseParen,
            '[' => OpenSquare,
            ']' => CloseSquare,
            '.' => Period,
            ',' => Comma,
            ';' => Semicolon,
            '+' => Plus,
            '-' => Minus,
            '*' => Times,
            '/' => Slash,
            '&' => And,
            '|' => Or,
            '<' => Less,
            '>' => Greater,
            '=' => Equal,
            '~' => Tilde,
            _ => return None,
        };

        Some(symbol)
    }

    pub fn as_char(self) -> char {
        use Symbol::*;

        match self {
            OpenCurly => '{',
            CloseCurly => '}',
            OpenParen => '(',
            CloseParen => ')',
            OpenSquare => '[',
            CloseSquare => ']',
            Period => '.',
            Comma => ',',
            Semicolon => ';',
            Plus => '+',
            Minus => '-',
            Times => '*',
            Slash => '/',
            And => '&',
            Or => '|',
            Less => '<',
            Greater => '>',
            Equal => '=',
            Tilde => '~',
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.as_char())
    }
}

/// Secuencia inmutable de tokens con un cursor.
///
/// El cursor admite avanzar de uno en uno y retroceder exactamente un
/// paso, lo cual basta como lookahead para esta gramática. No existe
/// búsqueda arbitraria.
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Located<Token>>,
    cursor: usize,
    retreatable: bool,
    end: Location,
}

impl TokenStream {
    /// Construye un flujo a partir de tokens y la ubicación de fin de entrada.
    pub fn new(tokens: Vec<Located<Token>>, end: Location) -> Self {
        TokenStream {
            tokens,
            cursor: 0,
            retreatable: false,
            end,
        }
    }

    /// Determina si quedan tokens por consumir.
    pub fn has_more(&self) -> bool {
        self.cursor < self.tokens.len()
    }

    /// Consume el siguiente token, que pasa a ser el token actual.
    ///
    /// Retorna `None` si el flujo está agotado, en cuyo caso el cursor
    /// no se mueve.
    pub fn advance(&mut self) -> Option<&Located<Token>> {
        if !self.has_more() {
            return None;
        }

        self.cursor += 1;
        self.retreatable = true;
        self.tokens.get(self.cursor - 1)
    }

    /// Deshace el `advance()` más reciente.
    pub fn retreat(&mut self) {
        debug_assert!(self.retreatable, "only one token of pushback is available");

        if self.retreatable {
            self.cursor -= 1;
            self.retreatable = false;
        }
    }

    /// Observa el siguiente token sin consumirlo.
    pub fn peek(&self) -> Option<&Located<Token>> {
        self.tokens.get(self.cursor)
    }

    /// El token consumido más recientemente.
    pub fn current(&self) -> Option<&Located<Token>> {
        self.cursor.checked_sub(1).and_then(|index| self.tokens.get(index))
    }

    /// Ubicación inmediatamente posterior al último carácter de la entrada.
    pub fn end(&self) -> &Location {
        &self.end
    }

    /// Todos los tokens, sin importar el cursor.
    pub fn tokens(&self) -> &[Located<Token>] {
        &self.tokens
    }
}

/// Máquina de estados para análisis léxico.
///
/// La salida del lexer, así como su siguiente estado, se define a partir
/// de tanto su estado actual como el siguiente carácter encontrado en el
/// texto de entrada.
pub struct Lexer<'a> {
    origin: &'a Rc<Source>,
    source: Peekable<Chars<'a>>,
    state: State,
    start: Position,
    next: Position,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error, el lexer ya no emite nada más.
    Error,

    /// Estado de completitud; siempre emite el token incluido sin
    /// consumir la entrada actual.
    Complete(Token),

    /// Se encontró `/`, que puede iniciar un comentario o ser un operador.
    Slash,

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    LineComment,

    /// Comentario de bloque.
    BlockComment,

    /// Se encontró `*` dentro de un comentario de bloque.
    BlockStar,

    /// Constante entera.
    ///
    /// Este estado incluirá dígitos en el token mientras que
    /// el siguiente carácter sea un dígito.
    Integer(u16),

    /// Constante de texto, después de la comilla inicial.
    Text(String),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

impl<'a> Lexer<'a> {
    /// Crea un lexer en estado inicial sobre una unidad de código fuente.
    pub fn new(origin: &'a Rc<Source>) -> Self {
        Lexer {
            origin,
            source: origin.text().chars().peekable(),
            state: State::Start,
            start: Position::default(),
            next: Position::default(),
        }
    }

    /// Reduce la entrada completa a un flujo de tokens, o bien al
    /// primer error léxico encontrado.
    pub fn tokenize(mut self) -> Result<TokenStream, Located<LexerError>> {
        let tokens = self.by_ref().collect::<Result<Vec<_>, _>>()?;
        let end = self.origin.locate(self.next..self.next.advance());

        log::trace!("{}: {} tokens", self.origin.name(), tokens.len());
        Ok(TokenStream::new(tokens, end))
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<Token>, LexerError> {
        use State::*;

        loop {
            let next_char = self.source.peek().copied();

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.next;
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                (Error, _) => return Ok(None),

                (Start, None) => return Ok(None),
                (Start, Some('/')) => self.state = Slash,
                (Start, Some('"')) => self.state = Text(String::new()),

                // Ni dígitos ni términos se consumen aquí, ya que sus
                // respectivos estados se encargan de acumularlos
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }

                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(String::new());
                    continue;
                }

                (Start, Some(c)) if c.is_whitespace() => (),
                (Start, Some(c)) => match self::Symbol::from_char(c) {
                    Some(symbol) => self.state = Complete(Token::Symbol(symbol)),
                    None => return Err(LexerError::BadChar(c)),
                },

                // Emisión retardada de tokens cualesquiera
                (Complete(token), _) => {
                    let token = std::mem::replace(token, Token::IntConst(0));
                    return Ok(Some(token));
                }

                // `/` puede ser división o el inicio de un comentario
                (Slash, Some('/')) => self.state = LineComment,
                (Slash, Some('*')) => self.state = BlockComment,
                (Slash, _) => return Ok(Some(Token::Symbol(self::Symbol::Slash))),

                (LineComment, Some('\n')) | (LineComment, None) => self.state = Start,
                (LineComment, Some(_)) => (),

                (BlockComment, Some('*')) => self.state = BlockStar,
                (BlockComment, Some(_)) => (),
                (BlockStar, Some('/')) => self.state = Start,
                (BlockStar, Some('*')) => (),
                (BlockStar, Some(_)) => self.state = BlockComment,
                (BlockComment, None) | (BlockStar, None) => {
                    return Err(LexerError::UnterminatedComment)
                }

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = digit as u16 - '0' as u16;

                    match accumulated
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(digit))
                        .filter(|&n| n <= INT_MAX)
                    {
                        Some(result) => *accumulated = result,
                        None => return Err(LexerError::IntOverflow),
                    }
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Integer(integer), _) => return Ok(Some(Token::IntConst(*integer))),

                // El contenido se toma tal cual, sin secuencias de escape
                (Text(text), Some('"')) => {
                    self.state = Complete(Token::StrConst(std::mem::take(text)))
                }

                (Text(_), Some('\n')) | (Text(_), None) => {
                    return Err(LexerError::UnterminatedString)
                }

                (Text(text), Some(c)) => text.push(c),

                // Extensión de términos
                (Word(word), Some(c)) if is_word_char(c) => word.push(c),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    let token = match self::Keyword::from_str(word) {
                        Ok(keyword) => Token::Keyword(keyword),
                        Err(()) => Token::Id(Identifier::from(word.as_str())),
                    };

                    return Ok(Some(token));
                }
            }

            // Si no hubo `continue` ni `return`, aquí se consume el carácter
            // que se observó con lookahead anteriormente
            if let Some(c) = self.source.next() {
                self.next = self.next.after(c);
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,
            Ok(Some(token)) => {
                self.state = State::Start;

                let location = self.origin.locate(self.start..self.next);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;

                let location = self.origin.locate(self.next..self.next.advance());
                Some(Err(Located::at(error, location)))
            }
        }
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> Vec<Token> {
        let source = Source::new("<test>", text);
        Lexer::new(&source)
            .tokenize()
            .unwrap()
            .tokens()
            .iter()
            .map(|token| token.val().clone())
            .collect()
    }

    #[test]
    fn slash_is_division_unless_followed_by_comment() {
        assert_eq!(
            lex("a/b"),
            vec![
                Token::Id(Identifier::from("a")),
                Token::Symbol(Symbol::Slash),
                Token::Id(Identifier::from("b")),
            ]
        );
    }

    #[test]
    fn keyword_lookup_roundtrips_names() {
        for &(name, keyword) in KEYWORDS {
            assert_eq!(Keyword::from_str(name), Ok(keyword));
            assert_eq!(keyword.to_string(), name);
        }
    }

    #[test]
    fn token_locations_cover_their_lexemes() {
        let source = Source::new("Main.jack", "let  count = 10;");
        let stream = Lexer::new(&source).tokenize().unwrap();

        let count = &stream.tokens()[1];
        assert_eq!(count.location().start(), Position::new(1, 6));
        assert_eq!(count.location().end(), Position::new(1, 11));
        assert_eq!(count.location().to_string(), "Main.jack:[1:6-1:10]");
    }

    #[test]
    fn cursor_supports_one_step_of_pushback() {
        let source = Source::new("<test>", "a b");
        let mut stream = Lexer::new(&source).tokenize().unwrap();

        assert!(stream.current().is_none());
        assert_eq!(stream.advance().unwrap().val().lexeme(), "a");
        assert_eq!(stream.advance().unwrap().val().lexeme(), "b");
        assert!(stream.advance().is_none());

        stream.retreat();
        assert_eq!(stream.current().unwrap().val().lexeme(), "a");
        assert_eq!(stream.peek().unwrap().val().lexeme(), "b");
        assert!(stream.has_more());
    }
}
