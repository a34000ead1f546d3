//! Tabla de símbolos.
//!
//! La tabla mantiene dos ámbitos independientes. El ámbito de clase
//! contiene variables `static` y `field`, y vive durante toda la clase.
//! El ámbito de subrutina contiene parámetros y variables locales, y se
//! vacía al inicio de cada subrutina. Cada símbolo recibe un índice
//! secuencial dentro de su categoría: 0, 1, 2, ...
//!
//! Las búsquedas consultan primero el ámbito de subrutina, por lo cual
//! un parámetro o una local ocultan a un campo del mismo nombre.

use std::{
    collections::HashMap,
    fmt::{self, Display},
};

use crate::lex::{Identifier, INT_MAX};

/// Categoría de almacenamiento de una variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Static,
    Field,
    Parameter,
    Local,
}

impl Kind {
    const ALL: [Kind; 4] = [Kind::Static, Kind::Field, Kind::Parameter, Kind::Local];

    /// Determina si la categoría pertenece al ámbito de clase.
    pub fn is_class_scope(self) -> bool {
        matches!(self, Kind::Static | Kind::Field)
    }

    fn counter(self) -> usize {
        match self {
            Kind::Static => 0,
            Kind::Field => 1,
            Kind::Parameter => 2,
            Kind::Local => 3,
        }
    }
}

impl Display for Kind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            Kind::Static => "static",
            Kind::Field => "field",
            Kind::Parameter => "parameter",
            Kind::Local => "local",
        };

        fmt.write_str(string)
    }
}

/// Tipo declarado de una variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Char,
    Boolean,
    Class(Identifier),
}

impl Type {
    /// Los tipos primitivos no admiten llamadas a métodos.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Type::Class(_))
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => fmt.write_str("int"),
            Type::Char => fmt.write_str("char"),
            Type::Boolean => fmt.write_str("boolean"),
            Type::Class(name) => Display::fmt(name, fmt),
        }
    }
}

/// Entrada de la tabla.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub typ: Type,
    pub kind: Kind,
    pub index: u16,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    class: HashMap<Identifier, Symbol>,
    subroutine: HashMap<Identifier, Symbol>,
    counts: [u16; 4],
}

impl SymbolTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Inicia un nuevo ámbito de subrutina.
    ///
    /// Los contadores de parámetros y locales vuelven a cero, mientras
    /// que los de `static` y `field` se preservan.
    pub fn start_subroutine(&mut self) {
        self.subroutine.clear();
        self.counts[Kind::Parameter.counter()] = 0;
        self.counts[Kind::Local.counter()] = 0;
    }

    /// Define un símbolo en el ámbito que corresponde a su categoría y
    /// retorna el índice asignado.
    ///
    /// Tanto los índices como los contadores deben caber en el rango de
    /// constantes de la máquina virtual. Si la categoría ya está llena,
    /// no se define nada y se retorna `None`.
    pub fn define(&mut self, name: Identifier, typ: Type, kind: Kind) -> Option<u16> {
        let count = &mut self.counts[kind.counter()];
        let index = *count;
        if index >= INT_MAX {
            return None;
        }

        *count += 1;

        let scope = if kind.is_class_scope() {
            &mut self.class
        } else {
            &mut self.subroutine
        };

        scope.insert(name, Symbol { typ, kind, index });
        Some(index)
    }

    /// Determina si un nombre ya existe en el ámbito al que se
    /// enrutaría una definición de la categoría dada.
    pub fn declares(&self, name: &str, kind: Kind) -> bool {
        if kind.is_class_scope() {
            self.class.contains_key(name)
        } else {
            self.subroutine.contains_key(name)
        }
    }

    /// Cantidad de símbolos definidos para una categoría.
    pub fn var_count(&self, kind: Kind) -> u16 {
        self.counts[kind.counter()]
    }

    /// Resuelve un nombre, primero en el ámbito de subrutina.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.subroutine.get(name).or_else(|| self.class.get(name))
    }

    pub fn kind_of(&self, name: &str) -> Option<Kind> {
        self.lookup(name).map(|symbol| symbol.kind)
    }

    pub fn type_of(&self, name: &str) -> Option<&Type> {
        self.lookup(name).map(|symbol| &symbol.typ)
    }

    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.lookup(name).map(|symbol| symbol.index)
    }

    /// Itera sobre todos los contadores, útil para trazas.
    pub fn counts(&self) -> impl Iterator<Item = (Kind, u16)> + '_ {
        Kind::ALL.iter().map(move |&kind| (kind, self.var_count(kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_resolves_nothing() {
        let table = SymbolTable::new();

        assert_eq!(table.kind_of("x"), None);
        assert_eq!(table.type_of("x"), None);
        assert_eq!(table.index_of("x"), None);
        assert!(table.counts().all(|(_, count)| count == 0));
    }

    #[test]
    fn class_and_subroutine_counters_are_independent() {
        let mut table = SymbolTable::new();

        assert_eq!(table.define("a".into(), Type::Int, Kind::Field), Some(0));
        assert_eq!(table.define("b".into(), Type::Int, Kind::Static), Some(0));
        assert_eq!(table.define("c".into(), Type::Int, Kind::Parameter), Some(0));
        assert_eq!(table.define("d".into(), Type::Int, Kind::Field), Some(1));

        assert!(table.declares("a", Kind::Static));
        assert!(!table.declares("a", Kind::Local));
        assert!(table.declares("c", Kind::Local));
    }

    #[test]
    fn full_categories_reject_definitions() {
        let mut table = SymbolTable::new();
        table.counts[Kind::Local.counter()] = INT_MAX - 1;

        assert_eq!(table.define("last".into(), Type::Int, Kind::Local), Some(INT_MAX - 1));
        assert_eq!(table.define("extra".into(), Type::Int, Kind::Local), None);
        assert_eq!(table.var_count(Kind::Local), INT_MAX);
        assert_eq!(table.kind_of("extra"), None);

        assert_eq!(table.define("other".into(), Type::Int, Kind::Parameter), Some(0));
    }
}
