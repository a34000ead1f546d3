//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los tokens y los errores que el compilador construye llevan
//! cuenta de posiciones o rangos de ubicaciones en el código fuente
//! original, lo cual permite señalar el punto exacto en donde ocurre
//! un error léxico o sintáctico.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Range,
    rc::Rc,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Una unidad de código fuente: nombre de origen y texto completo.
pub struct Source {
    name: String,
    text: String,
}

impl Source {
    /// Construye una unidad compartida a partir de su nombre y contenido.
    pub fn new<N, T>(name: N, text: T) -> Rc<Self>
    where
        N: Into<String>,
        T: Into<String>,
    {
        Rc::new(Source {
            name: name.into(),
            text: text.into(),
        })
    }

    /// Nombre de origen, usualmente una ruta.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Texto completo de la unidad.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Aplica una operación de formato sobre una línea (1-based) del texto.
    ///
    /// Las líneas inexistentes se omiten.
    pub fn with_line<F>(&self, line: u32, format: F) -> fmt::Result
    where
        F: FnOnce(&str) -> fmt::Result,
    {
        let index = (line as usize).saturating_sub(1);
        self.text.lines().nth(index).map_or(Ok(()), format)
    }

    /// Ubicación de un rango de posiciones en esta unidad.
    pub fn locate(self: &Rc<Self>, position: Range<Position>) -> Location {
        Location {
            from: Rc::clone(self),
            position,
        }
    }
}

impl Debug for Source {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.name)
    }
}

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T: Display> Display for Located<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.location, self.value)
    }
}

impl<E: std::error::Error> std::error::Error for Located<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.value.source()
    }
}

/// Una ubicación está conformada por un origen y un rango de posiciones.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.position.start
    }

    /// Obtiene la posición de fin (exclusiva).
    pub fn end(&self) -> Position {
        self.position.end
    }

    /// Obtiene la unidad de origen.
    pub fn source(&self) -> &Source {
        &self.from
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.from.name)?;

        let Range { start, end } = self.position;
        if end.line != start.line || end.column <= start.column + 1 {
            // Solo se señala una columna en específico
            write!(formatter, "{}", start)
        } else {
            write!(formatter, "[{}-{}]", start, end.back())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Construye una posición arbitraria.
    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }

    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Decrementa el número de columna.
    pub fn back(self) -> Position {
        Position {
            line: self.line,
            column: self.column.saturating_sub(1).max(1),
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    /// Ajusta la posición a la siguiente columna de tabulador.
    pub fn tab(self) -> Position {
        let column = 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP;
        Position {
            line: self.line,
            column,
        }
    }

    /// Posición que sigue a un carácter ubicado en esta posición.
    pub fn after(self, c: char) -> Position {
        match c {
            '\n' => self.newline(),
            '\t' => self.tab(),
            _ => self.advance(),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_follow_newlines_and_tabs() {
        let start = Position::default();
        assert_eq!(start.after('a'), Position::new(1, 2));
        assert_eq!(start.after('\n'), Position::new(2, 1));
        assert_eq!(start.after('\t'), Position::new(1, 5));
        assert_eq!(Position::new(1, 3).after('\t'), Position::new(1, 5));
        assert_eq!(Position::new(1, 5).after('\t'), Position::new(1, 9));
    }

    #[test]
    fn locations_render_single_columns_and_ranges() {
        let source = Source::new("Main.jack", "class Main {}\n");

        let single = source.locate(Position::new(1, 12)..Position::new(1, 13));
        assert_eq!(single.to_string(), "Main.jack:1:12");

        let range = source.locate(Position::new(1, 1)..Position::new(1, 6));
        assert_eq!(range.to_string(), "Main.jack:[1:1-1:5]");
    }

    #[test]
    fn missing_lines_are_skipped() {
        let source = Source::new("<test>", "first\nsecond");
        let mut seen = String::new();
        source
            .with_line(2, |line| {
                seen.push_str(line);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, "second");

        source.with_line(7, |_| panic!("no such line")).unwrap();
    }
}
